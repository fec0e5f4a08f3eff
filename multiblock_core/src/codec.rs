//! Binary encoding of a single [`MultiblockState`].
//!
//! A blob is a little-endian `u32` body length followed by a bincode body.
//! The anchor is not part of the blob; it is the key the blob is stored under.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::BlockPos;
use crate::state::MultiblockState;
use crate::world::WorldContext;

pub const FORMAT_VERSION: u16 = 1;
const LEN_PREFIX: usize = 4;

#[derive(Serialize, Deserialize)]
struct StoredState {
    version: u16,
    definition: String,
    members: Vec<i64>,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("blob of {len} bytes is too short for a length prefix")]
    Truncated { len: usize },
    #[error("blob declares a {declared} byte body but carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("failed to encode multiblock state: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode multiblock state: {0}")]
    Decode(#[source] bincode::Error),
    #[error("unsupported multiblock state format version {0}")]
    UnsupportedVersion(u16),
    #[error("member {pos} lies outside build height [{min}, {max})")]
    OutOfWorld { pos: BlockPos, min: i32, max: i32 },
    #[error("position {pos} cannot be linearized without loss")]
    OutOfRange { pos: BlockPos },
}

/// Linearizes `pos`, refusing coordinates the packed layout would truncate.
pub fn pack(pos: BlockPos) -> Result<i64, CodecError> {
    pos.checked_long().ok_or(CodecError::OutOfRange { pos })
}

pub fn encode(state: &MultiblockState) -> Result<Vec<u8>, CodecError> {
    let stored = StoredState {
        version: FORMAT_VERSION,
        definition: state.definition().to_string(),
        members: state
            .cache()
            .iter()
            .map(|pos| pack(*pos))
            .collect::<Result<_, _>>()?,
    };
    let body = bincode::serialize(&stored).map_err(CodecError::Encode)?;

    let mut blob = Vec::with_capacity(LEN_PREFIX + body.len());
    blob.extend_from_slice(&(body.len() as u32).to_le_bytes());
    blob.extend_from_slice(&body);
    Ok(blob)
}

/// Rebuilds the state stored under `anchor`.
///
/// `world` is only consulted while this call runs.
pub fn decode(
    bytes: &[u8],
    world: &dyn WorldContext,
    anchor: BlockPos,
) -> Result<MultiblockState, CodecError> {
    if bytes.len() < LEN_PREFIX {
        return Err(CodecError::Truncated { len: bytes.len() });
    }
    let (prefix, body) = bytes.split_at(LEN_PREFIX);
    let declared = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if declared != body.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: body.len(),
        });
    }

    let stored: StoredState = bincode::deserialize(body).map_err(CodecError::Decode)?;
    if stored.version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(stored.version));
    }

    let min = world.min_build_height();
    let max = world.max_build_height();
    let mut members = Vec::with_capacity(stored.members.len());
    for packed in stored.members {
        let pos = BlockPos::from_long(packed);
        if pos.y < min || pos.y >= max {
            return Err(CodecError::OutOfWorld { pos, min, max });
        }
        members.push(pos);
    }

    Ok(MultiblockState::new(anchor, stored.definition, members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{DimensionId, StaticWorld};

    fn world() -> StaticWorld {
        StaticWorld::new(DimensionId::overworld())
    }

    fn sample(members: usize) -> MultiblockState {
        let anchor = BlockPos::new(-40, 64, 12);
        MultiblockState::new(
            anchor,
            "multiblocked:blast_furnace",
            (0..members as i32).map(|i| anchor.offset(i % 5, i / 25, (i / 5) % 5)),
        )
    }

    #[test]
    fn decode_restores_encoded_state() {
        for members in [0, 1, 27, 125] {
            let state = sample(members);
            let blob = encode(&state).unwrap();
            let decoded = decode(&blob, &world(), state.anchor()).unwrap();
            assert_eq!(decoded, state, "member count {members}");
        }
    }

    #[test]
    fn blob_is_self_delimiting() {
        let blob = encode(&sample(3)).unwrap();
        let declared = u32::from_le_bytes(blob[..4].try_into().unwrap()) as usize;
        assert_eq!(declared, blob.len() - 4);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let blob = encode(&sample(4)).unwrap();
        assert!(matches!(
            decode(&blob[..2], &world(), BlockPos::ORIGIN),
            Err(CodecError::Truncated { len: 2 })
        ));
        assert!(matches!(
            decode(&blob[..blob.len() - 1], &world(), BlockPos::ORIGIN),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn garbage_body_is_rejected() {
        let mut blob = vec![8, 0, 0, 0];
        blob.extend_from_slice(&[0xff; 8]);
        assert!(decode(&blob, &world(), BlockPos::ORIGIN).is_err());
    }

    #[test]
    fn members_outside_build_height_are_rejected() {
        let state = MultiblockState::new(
            BlockPos::ORIGIN,
            "multiblocked:tower",
            [BlockPos::new(0, 300, 0)],
        );
        let blob = encode(&state).unwrap();
        let err = decode(&blob, &world(), BlockPos::ORIGIN).unwrap_err();
        assert!(matches!(err, CodecError::OutOfWorld { max: 256, .. }));

        let tall = world().with_height(-64, 320);
        assert!(decode(&blob, &tall, BlockPos::ORIGIN).is_ok());
    }

    #[test]
    fn unpackable_member_fails_to_encode() {
        let far = BlockPos::new(40_000_000, 10, 0);
        let state = MultiblockState::new(
            BlockPos::ORIGIN,
            "multiblocked:bridge",
            [BlockPos::ORIGIN, far],
        );
        match encode(&state) {
            Err(CodecError::OutOfRange { pos }) => assert_eq!(pos, far),
            other => panic!("expected OutOfRange, got {other:?}"),
        }

        let tall = MultiblockState::new(
            BlockPos::ORIGIN,
            "multiblocked:spire",
            [BlockPos::new(0, 2048, 0)],
        );
        assert!(matches!(encode(&tall), Err(CodecError::OutOfRange { .. })));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let body = bincode::serialize(&StoredState {
            version: FORMAT_VERSION + 1,
            definition: String::new(),
            members: Vec::new(),
        })
        .unwrap();
        let mut blob = (body.len() as u32).to_le_bytes().to_vec();
        blob.extend_from_slice(&body);
        assert!(matches!(
            decode(&blob, &world(), BlockPos::ORIGIN),
            Err(CodecError::UnsupportedVersion(2))
        ));
    }
}
