use std::collections::BTreeSet;

use crate::position::{BlockPos, ChunkPos};

/// One formed multiblock structure, keyed by the position of its controller.
///
/// Once handed to the registry a state is shared behind an `Arc` and never
/// mutated; a formation change re-registers a fresh value at the same anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiblockState {
    anchor: BlockPos,
    definition: String,
    cache: BTreeSet<BlockPos>,
}

impl MultiblockState {
    pub fn new(
        anchor: BlockPos,
        definition: impl Into<String>,
        cache: impl IntoIterator<Item = BlockPos>,
    ) -> Self {
        Self {
            anchor,
            definition: definition.into(),
            cache: cache.into_iter().collect(),
        }
    }

    pub fn anchor(&self) -> BlockPos {
        self.anchor
    }

    /// Identifier of the multiblock definition this structure was matched against.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Every block position that belongs to the structure.
    pub fn cache(&self) -> &BTreeSet<BlockPos> {
        &self.cache
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.cache.contains(&pos)
    }

    /// Distinct chunks touched by the member cache.
    pub fn chunks(&self) -> BTreeSet<ChunkPos> {
        self.cache.iter().map(|pos| pos.chunk()).collect()
    }
}
