use std::collections::btree_map::{BTreeMap, Entry};
use std::sync::Arc;

use bevy_ecs::prelude::Resource;

use crate::config::RegistryConfig;
use crate::registry::MultiblockWorldData;
use crate::store::{RecordStore, StoreError};
use crate::world::{DimensionId, WorldContext};

/// One [`MultiblockWorldData`] per loaded dimension.
#[derive(Resource)]
pub struct DimensionRegistries {
    config: Arc<RegistryConfig>,
    worlds: BTreeMap<DimensionId, MultiblockWorldData>,
}

impl DimensionRegistries {
    pub fn new(config: Arc<RegistryConfig>) -> Self {
        Self {
            config,
            worlds: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the registry for `world`'s dimension, loading its saved record
    /// on first access.
    pub fn get_or_load(
        &mut self,
        world: &dyn WorldContext,
        store: &dyn RecordStore,
    ) -> Result<&mut MultiblockWorldData, StoreError> {
        match self.worlds.entry(world.dimension().clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let (data, _report) =
                    MultiblockWorldData::load_or_create(store, world, &self.config)?;
                Ok(entry.insert(data))
            }
        }
    }

    pub fn get(&self, dimension: &DimensionId) -> Option<&MultiblockWorldData> {
        self.worlds.get(dimension)
    }

    pub fn get_mut(&mut self, dimension: &DimensionId) -> Option<&mut MultiblockWorldData> {
        self.worlds.get_mut(dimension)
    }

    /// Writes every dirty dimension. Stops at the first failing write.
    pub fn flush_all(&mut self, store: &dyn RecordStore) -> Result<usize, StoreError> {
        let mut written = 0;
        for data in self.worlds.values_mut() {
            if data.flush(store)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Saves and drops the dimension's registry, joining its scanner.
    ///
    /// A failed write leaves the registry loaded and dirty.
    pub fn unload(
        &mut self,
        dimension: &DimensionId,
        store: &dyn RecordStore,
    ) -> Result<bool, StoreError> {
        let Some(data) = self.worlds.get_mut(dimension) else {
            return Ok(false);
        };
        data.flush(store)?;
        if let Some(mut data) = self.worlds.remove(dimension) {
            data.shutdown();
        }
        Ok(true)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &DimensionId> {
        self.worlds.keys()
    }
}
