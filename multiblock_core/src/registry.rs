use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::active::{ActiveSet, ComponentHandle, ControllerTransition};
use crate::capability::{Controller, PeriodToken};
use crate::chunk_index::ChunkIndex;
use crate::codec::{self, CodecError};
use crate::config::RegistryConfig;
use crate::position::{BlockPos, ChunkPos};
use crate::scanner::Scanner;
use crate::state::MultiblockState;
use crate::store::{RecordStore, SavedRecord, StoreError};
use crate::world::{DimensionId, WorldContext};

/// Why one saved entry was left out of a load.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("key {0:?} is not a linearized block position")]
    BadKey(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<(String, EntryError)>,
}

/// Every formed multiblock in one dimension.
///
/// Owned and mutated by the simulation thread. The only state shared with
/// the scanner thread is the controller set inside [`ActiveSet`].
pub struct MultiblockWorldData {
    dimension: DimensionId,
    record_name: String,
    mapping: HashMap<BlockPos, Arc<MultiblockState>>,
    chunks: ChunkIndex,
    active: ActiveSet,
    scanner: Scanner,
    dirty: bool,
}

impl MultiblockWorldData {
    pub fn new(dimension: DimensionId, config: &RegistryConfig) -> Self {
        let active = ActiveSet::new();
        let scanner = Scanner::new(active.controllers().clone(), config);
        Self {
            record_name: config.record_name(&dimension),
            dimension,
            mapping: HashMap::new(),
            chunks: ChunkIndex::new(),
            active,
            scanner,
            dirty: false,
        }
    }

    /// Opens the dimension's saved record, or starts empty if none exists.
    pub fn load_or_create(
        store: &dyn RecordStore,
        world: &dyn WorldContext,
        config: &RegistryConfig,
    ) -> Result<(Self, LoadReport), StoreError> {
        let mut data = Self::new(world.dimension().clone(), config);
        let report = match store.read(&data.record_name)? {
            Some(record) => data.load(&record, world),
            None => {
                debug!(
                    target: "multiblocked::registry",
                    record = %data.record_name,
                    "registry.created"
                );
                LoadReport::default()
            }
        };
        Ok((data, report))
    }

    pub fn dimension(&self) -> &DimensionId {
        &self.dimension
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    /// Registers `state`, replacing whatever was stored at its anchor.
    ///
    /// When the owning controller is supplied it is also marked as loaded,
    /// which starts the scanner if it is the first one.
    pub fn add_mapping(
        &mut self,
        state: MultiblockState,
        controller: Option<Arc<dyn Controller>>,
    ) -> Arc<MultiblockState> {
        let state = Arc::new(state);
        self.index(Arc::clone(&state));
        self.dirty = true;

        if let Some(controller) = controller {
            if controller.pos() != state.anchor() {
                warn!(
                    target: "multiblocked::registry",
                    anchor = %state.anchor(),
                    controller = %controller.pos(),
                    "registry.controller_mismatch"
                );
            }
            self.add_loading(ComponentHandle::Controller(controller));
        }
        state
    }

    /// Unregisters the structure anchored at `anchor`; absent anchors are ignored.
    pub fn remove_mapping(&mut self, anchor: BlockPos) -> Option<Arc<MultiblockState>> {
        let removed = self.mapping.remove(&anchor)?;
        self.chunks.remove(&removed);
        self.dirty = true;
        Some(removed)
    }

    pub fn get(&self, anchor: BlockPos) -> Option<&Arc<MultiblockState>> {
        self.mapping.get(&anchor)
    }

    /// Structures with at least one member in `chunk`, ordered by anchor.
    ///
    /// The returned list is a copy; the registry is unaffected by what the
    /// caller does with it.
    pub fn controllers_in_chunk(&self, chunk: ChunkPos) -> Vec<Arc<MultiblockState>> {
        self.chunks
            .anchors_in(chunk)
            .into_iter()
            .filter_map(|anchor| self.mapping.get(&anchor).cloned())
            .collect()
    }

    /// Structures owning the block at `pos`.
    pub fn structures_at(&self, pos: BlockPos) -> Vec<Arc<MultiblockState>> {
        self.controllers_in_chunk(pos.chunk())
            .into_iter()
            .filter(|state| state.contains(pos))
            .collect()
    }

    pub fn states(&self) -> impl Iterator<Item = &Arc<MultiblockState>> {
        self.mapping.values()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Loaded components, for inspection only.
    pub fn loading(&self) -> &ActiveSet {
        &self.active
    }

    pub fn add_loading(&mut self, component: ComponentHandle) {
        if self.active.insert(component) == ControllerTransition::FirstLoaded {
            self.scanner.start();
        }
    }

    pub fn remove_loading(&mut self, pos: BlockPos) {
        match self.active.remove(pos) {
            ControllerTransition::LastUnloaded => self.scanner.stop(),
            // A start that raced a stop can leave controllers without a loop.
            _ if !self.active.controllers().is_empty() => self.scanner.start(),
            _ => {}
        }
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn period(&self) -> PeriodToken {
        self.scanner.period()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Encodes every registered structure without touching the dirty flag.
    ///
    /// Fails rather than letting an anchor that does not pack losslessly
    /// collide with another one's key.
    pub fn to_record(&self) -> Result<SavedRecord, CodecError> {
        let mut record = SavedRecord::new();
        for (anchor, state) in &self.mapping {
            record.insert(codec::pack(*anchor)?.to_string(), codec::encode(state)?);
        }
        Ok(record)
    }

    /// Encodes every registered structure and marks the registry clean.
    pub fn save(&mut self) -> Result<SavedRecord, CodecError> {
        let record = self.to_record()?;
        self.dirty = false;
        Ok(record)
    }

    /// Writes the record if anything changed since the last save.
    /// Returns whether a write happened.
    pub fn flush(&mut self, store: &dyn RecordStore) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }
        let record = self.to_record()?;
        store.write(&self.record_name, &record)?;
        self.dirty = false;
        info!(
            target: "multiblocked::registry",
            record = %self.record_name,
            structures = record.len(),
            "registry.saved"
        );
        Ok(true)
    }

    /// Registers every decodable entry of `record`.
    ///
    /// `world` is borrowed for this call only. Entries that fail are skipped
    /// and listed in the report; the rest still load.
    pub fn load(&mut self, record: &SavedRecord, world: &dyn WorldContext) -> LoadReport {
        let mut report = LoadReport::default();
        for (key, blob) in record.iter() {
            match decode_entry(key, blob, world) {
                Ok(state) => {
                    self.index(Arc::new(state));
                    report.loaded += 1;
                }
                Err(err) => {
                    warn!(
                        target: "multiblocked::registry",
                        record = %self.record_name,
                        key,
                        error = %err,
                        "registry.load_skipped"
                    );
                    report.skipped.push((key.to_string(), err));
                }
            }
        }
        info!(
            target: "multiblocked::registry",
            record = %self.record_name,
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "registry.loaded"
        );
        report
    }

    /// Whether the chunk index equals a fresh rebuild from the member caches.
    pub fn chunk_index_consistent(&self) -> bool {
        self.chunks.matches(self.mapping.values().map(Arc::as_ref))
    }

    /// Stops the scanner and waits for its thread to exit.
    pub fn shutdown(&mut self) {
        self.scanner.shutdown();
    }

    fn index(&mut self, state: Arc<MultiblockState>) {
        if let Some(previous) = self.mapping.insert(state.anchor(), Arc::clone(&state)) {
            self.chunks.remove(&previous);
        }
        self.chunks.insert(&state);
    }
}

impl Drop for MultiblockWorldData {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn decode_entry(
    key: &str,
    blob: &[u8],
    world: &dyn WorldContext,
) -> Result<MultiblockState, EntryError> {
    let packed: i64 = key
        .parse()
        .map_err(|_| EntryError::BadKey(key.to_string()))?;
    Ok(codec::decode(blob, world, BlockPos::from_long(packed))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::StaticWorld;

    fn registry() -> MultiblockWorldData {
        MultiblockWorldData::new(DimensionId::overworld(), &RegistryConfig::default())
    }

    fn state(anchor: BlockPos, members: &[BlockPos]) -> MultiblockState {
        MultiblockState::new(anchor, "multiblocked:test", members.iter().copied())
    }

    #[test]
    fn chunk_queries_match_worked_example() {
        let mut data = registry();
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(0, 0, 32);
        data.add_mapping(state(a, &[a, BlockPos::new(1, 0, 0)]), None);
        data.add_mapping(state(b, &[b]), None);

        let anchors = |chunk| -> Vec<BlockPos> {
            data.controllers_in_chunk(chunk)
                .iter()
                .map(|s| s.anchor())
                .collect()
        };
        assert_eq!(anchors(BlockPos::new(1, 0, 0).chunk()), vec![a]);
        assert_eq!(anchors(b.chunk()), vec![b]);
        assert!(anchors(ChunkPos::new(40, -3)).is_empty());
    }

    #[test]
    fn re_registration_replaces_and_drops_stale_chunks() {
        let mut data = registry();
        let anchor = BlockPos::new(0, 0, 0);
        data.add_mapping(state(anchor, &[anchor, BlockPos::new(20, 0, 0)]), None);
        data.add_mapping(state(anchor, &[anchor]), None);

        assert_eq!(data.len(), 1);
        assert!(data.controllers_in_chunk(ChunkPos::new(1, 0)).is_empty());
        assert_eq!(data.get(anchor).unwrap().cache().len(), 1);
        assert!(data.chunk_index_consistent());
    }

    #[test]
    fn removing_absent_anchor_is_a_clean_no_op() {
        let mut data = registry();
        assert!(data.remove_mapping(BlockPos::new(5, 5, 5)).is_none());
        assert!(!data.is_dirty());
    }

    #[test]
    fn mutations_mark_dirty_and_save_clears_it() {
        let mut data = registry();
        let anchor = BlockPos::new(3, 4, 5);
        data.add_mapping(state(anchor, &[anchor]), None);
        assert!(data.is_dirty());

        let record = data.save().unwrap();
        assert!(!data.is_dirty());
        assert!(record.get(&anchor.to_long().to_string()).is_some());

        data.remove_mapping(anchor);
        assert!(data.is_dirty());
    }

    #[test]
    fn unpackable_anchors_fail_the_save_instead_of_colliding() {
        let mut data = registry();
        let low = BlockPos::new(0, 10, 0);
        let high = BlockPos::new(0, 4106, 0);
        assert_eq!(low.to_long(), high.to_long());
        data.add_mapping(state(low, &[low]), None);
        data.add_mapping(state(high, &[]), None);

        match data.save() {
            Err(CodecError::OutOfRange { pos }) => assert_eq!(pos, high),
            other => panic!("expected OutOfRange, got {other:?}"),
        }
        assert!(data.is_dirty());
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn structures_at_filters_by_membership() {
        let mut data = registry();
        let anchor = BlockPos::new(2, 0, 2);
        data.add_mapping(state(anchor, &[anchor, BlockPos::new(3, 0, 2)]), None);
        assert_eq!(data.structures_at(BlockPos::new(3, 0, 2)).len(), 1);
        assert!(data.structures_at(BlockPos::new(4, 0, 2)).is_empty());
    }

    #[test]
    fn load_skips_bad_keys() {
        let world = StaticWorld::new(DimensionId::overworld());
        let anchor = BlockPos::new(9, 9, 9);
        let mut record = SavedRecord::new();
        record.insert(
            anchor.to_long().to_string(),
            codec::encode(&state(anchor, &[anchor])).unwrap(),
        );
        record.insert("not-a-pos", codec::encode(&state(anchor, &[])).unwrap());

        let mut data = registry();
        let report = data.load(&record, &world);
        assert_eq!(report.loaded, 1);
        assert!(matches!(report.skipped[0].1, EntryError::BadKey(_)));
        assert!(!data.is_dirty());
        assert_eq!(data.controllers_in_chunk(anchor.chunk()).len(), 1);
    }
}
