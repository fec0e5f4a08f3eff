use std::collections::{HashMap, HashSet};

use crate::position::{BlockPos, ChunkPos};
use crate::state::MultiblockState;

/// Reverse index from chunk to the anchors of structures with a member in it.
#[derive(Debug, Default)]
pub struct ChunkIndex {
    buckets: HashMap<ChunkPos, HashSet<BlockPos>>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: &MultiblockState) {
        for chunk in state.chunks() {
            self.buckets.entry(chunk).or_default().insert(state.anchor());
        }
    }

    /// Drops `state` from every bucket its members occupy.
    ///
    /// Registered states are immutable, so the member cache names exactly
    /// the buckets the anchor was inserted into.
    pub fn remove(&mut self, state: &MultiblockState) {
        for chunk in state.chunks() {
            if let Some(bucket) = self.buckets.get_mut(&chunk) {
                bucket.remove(&state.anchor());
                if bucket.is_empty() {
                    self.buckets.remove(&chunk);
                }
            }
        }
    }

    /// Anchors touching `chunk`, sorted.
    pub fn anchors_in(&self, chunk: ChunkPos) -> Vec<BlockPos> {
        let mut anchors: Vec<BlockPos> = self
            .buckets
            .get(&chunk)
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default();
        anchors.sort_unstable();
        anchors
    }

    pub fn chunk_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Rebuilds the expected index from `states` and compares it with this one.
    pub fn matches<'a>(&self, states: impl IntoIterator<Item = &'a MultiblockState>) -> bool {
        let mut expected = ChunkIndex::new();
        for state in states {
            expected.insert(state);
        }
        expected.buckets == self.buckets
    }
}
