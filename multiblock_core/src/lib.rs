//! Per-world registry of formed multiblock structures.
//!
//! Tracks every structure by its controller position, indexes members by
//! chunk for area queries, persists the set into one saved record per
//! dimension, and runs a background [`Scanner`] that polls loaded
//! controllers' capability proxies for changes nobody reported.

mod active;
pub mod capability;
mod chunk_index;
pub mod codec;
pub mod config;
mod dimensions;
mod position;
mod registry;
pub mod scanner;
mod state;
pub mod store;
mod world;

pub use active::{ActiveSet, Component, ComponentHandle, ControllerSet, ControllerTransition};
pub use capability::{CapabilityProxy, ChangeTracker, Controller, PeriodToken, ProxyError};
pub use chunk_index::ChunkIndex;
pub use codec::CodecError;
pub use config::{load_registry_config_from_env, RegistryConfig, RegistryConfigError};
pub use dimensions::DimensionRegistries;
pub use position::{BlockPos, ChunkPos, CHUNK_SIZE};
pub use registry::{EntryError, LoadReport, MultiblockWorldData};
pub use scanner::{Scanner, ScannerState, TickReport};
pub use state::MultiblockState;
pub use store::{DirectoryStore, MemoryStore, RecordStore, SavedRecord, StoreError};
pub use world::{DimensionId, StaticWorld, WorldContext};
