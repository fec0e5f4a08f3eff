use std::fmt;

use serde::{Deserialize, Serialize};

const X_BITS: u32 = 26;
const Y_BITS: u32 = 12;
const Z_BITS: u32 = 26;
const Y_SHIFT: u32 = Z_BITS;
const X_SHIFT: u32 = Y_SHIFT + Y_BITS;
const X_MASK: i64 = (1 << X_BITS) - 1;
const Y_MASK: i64 = (1 << Y_BITS) - 1;
const Z_MASK: i64 = (1 << Z_BITS) - 1;

/// Side length of a chunk column in blocks.
pub const CHUNK_SIZE: i32 = 16;
const CHUNK_SHIFT: i32 = 4;

/// Integer block coordinate inside one world dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const ORIGIN: BlockPos = BlockPos { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Packs the position into a single `i64`.
    ///
    /// Layout is 26 bits of X, 12 bits of Y and 26 bits of Z, high to low.
    /// The packing is lossless for X/Z in `[-2^25, 2^25)` and Y in
    /// `[-2048, 2048)`; out-of-range components are truncated, see
    /// [`BlockPos::checked_long`].
    pub fn to_long(self) -> i64 {
        ((self.x as i64 & X_MASK) << X_SHIFT)
            | ((self.y as i64 & Y_MASK) << Y_SHIFT)
            | (self.z as i64 & Z_MASK)
    }

    /// Like [`BlockPos::to_long`], but `None` when a component does not fit
    /// its field.
    pub fn checked_long(self) -> Option<i64> {
        let fits = |value: i32, bits: u32| {
            let half = 1i64 << (bits - 1);
            (-half..half).contains(&(value as i64))
        };
        if fits(self.x, X_BITS) && fits(self.y, Y_BITS) && fits(self.z, Z_BITS) {
            Some(self.to_long())
        } else {
            None
        }
    }

    /// Inverse of [`BlockPos::to_long`], sign-extending every component.
    pub fn from_long(packed: i64) -> Self {
        let x = packed >> X_SHIFT;
        let y = (packed << (64 - Y_SHIFT - Y_BITS)) >> (64 - Y_BITS);
        let z = (packed << (64 - Z_BITS)) >> (64 - Z_BITS);
        Self {
            x: x as i32,
            y: y as i32,
            z: z as i32,
        }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn chunk(self) -> ChunkPos {
        ChunkPos::from(self)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A 16x16 column partition of the world, spanning every Y level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Lowest-corner block of the chunk at Y = 0.
    pub fn min_block(self) -> BlockPos {
        BlockPos::new(self.x * CHUNK_SIZE, 0, self.z * CHUNK_SIZE)
    }
}

impl From<BlockPos> for ChunkPos {
    fn from(pos: BlockPos) -> Self {
        Self {
            x: pos.x >> CHUNK_SHIFT,
            z: pos.z >> CHUNK_SHIFT,
        }
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_is_reversible_at_range_edges() {
        let samples = [
            BlockPos::ORIGIN,
            BlockPos::new(1, 2, 3),
            BlockPos::new(-1, -1, -1),
            BlockPos::new(33_554_431, 2047, -33_554_432),
            BlockPos::new(-33_554_432, -2048, 33_554_431),
            BlockPos::new(-30_000_000, 64, 29_999_999),
        ];
        for pos in samples {
            assert_eq!(BlockPos::from_long(pos.to_long()), pos, "pos {pos}");
        }
    }

    #[test]
    fn checked_long_rejects_unpackable_components() {
        assert_eq!(
            BlockPos::new(33_554_431, -2048, -33_554_432).checked_long(),
            Some(BlockPos::new(33_554_431, -2048, -33_554_432).to_long())
        );
        assert_eq!(BlockPos::new(33_554_432, 0, 0).checked_long(), None);
        assert_eq!(BlockPos::new(0, 2048, 0).checked_long(), None);
        assert_eq!(BlockPos::new(0, 0, -33_554_433).checked_long(), None);
        assert_eq!(BlockPos::new(40_000_000, 10, 0).checked_long(), None);
    }

    #[test]
    fn distinct_positions_pack_to_distinct_keys() {
        let a = BlockPos::new(0, 1, 0).to_long();
        let b = BlockPos::new(0, 0, 1).to_long();
        let c = BlockPos::new(1, 0, 0).to_long();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn chunk_of_negative_coordinates_floors() {
        assert_eq!(ChunkPos::from(BlockPos::new(-1, 70, -16)), ChunkPos::new(-1, -1));
        assert_eq!(ChunkPos::from(BlockPos::new(-17, 0, 15)), ChunkPos::new(-2, 0));
        assert_eq!(ChunkPos::from(BlockPos::new(31, -40, 32)), ChunkPos::new(1, 2));
    }

    #[test]
    fn min_block_lies_inside_chunk() {
        let chunk = ChunkPos::new(-3, 7);
        assert_eq!(chunk.min_block().chunk(), chunk);
    }
}
