use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for one world dimension.
///
/// The suffix is appended to the record prefix to name the dimension's saved
/// record, so it must never change for an existing save.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DimensionId {
    name: String,
    suffix: String,
}

impl DimensionId {
    pub fn new(name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffix: suffix.into(),
        }
    }

    pub fn overworld() -> Self {
        Self::new("overworld", "")
    }

    pub fn nether() -> Self {
        Self::new("the_nether", "_nether")
    }

    pub fn end() -> Self {
        Self::new("the_end", "_end")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl fmt::Display for DimensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Borrowed view of the world handed to decoding.
///
/// Implementations are only ever borrowed for the duration of a single
/// decode call; the registry keeps no reference to the world.
pub trait WorldContext {
    fn dimension(&self) -> &DimensionId;

    /// Lowest valid block Y, inclusive.
    fn min_build_height(&self) -> i32 {
        0
    }

    /// Highest valid block Y, exclusive.
    fn max_build_height(&self) -> i32 {
        256
    }
}

/// Plain [`WorldContext`] for tools and tests that have no live world.
#[derive(Debug, Clone)]
pub struct StaticWorld {
    pub dimension: DimensionId,
    pub min_y: i32,
    pub max_y: i32,
}

impl StaticWorld {
    pub fn new(dimension: DimensionId) -> Self {
        Self {
            dimension,
            min_y: 0,
            max_y: 256,
        }
    }

    pub fn with_height(mut self, min_y: i32, max_y: i32) -> Self {
        self.min_y = min_y;
        self.max_y = max_y;
        self
    }
}

impl WorldContext for StaticWorld {
    fn dimension(&self) -> &DimensionId {
        &self.dimension
    }

    fn min_build_height(&self) -> i32 {
        self.min_y
    }

    fn max_build_height(&self) -> i32 {
        self.max_y
    }
}
