//! Fixture components shared by the integration tests under `tests/`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use multiblock_core::{
    BlockPos, CapabilityProxy, ChangeTracker, Component, Controller, MultiblockState,
    PeriodToken, ProxyError,
};

/// Proxy that counts evaluations and can be switched into a failing mode.
#[derive(Default)]
pub struct ProbeProxy {
    tracker: ChangeTracker,
    evaluations: AtomicUsize,
    failing: AtomicBool,
}

impl ProbeProxy {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let proxy = Self::default();
        proxy.failing.store(true, Ordering::SeqCst);
        Arc::new(proxy)
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    pub fn last_period(&self) -> Option<PeriodToken> {
        self.tracker.last_period()
    }
}

impl CapabilityProxy for ProbeProxy {
    fn refresh(&self, period: PeriodToken) -> Result<(), ProxyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProxyError::Refresh("probe configured to fail".to_string()));
        }
        if self.tracker.claim(period) {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Controller whose proxy table can be edited while the scanner runs.
pub struct ProbeController {
    pos: BlockPos,
    proxies: RwLock<Vec<Arc<dyn CapabilityProxy>>>,
}

impl ProbeController {
    pub fn new(pos: BlockPos) -> Arc<Self> {
        Arc::new(Self {
            pos,
            proxies: RwLock::new(Vec::new()),
        })
    }

    pub fn with_proxies(pos: BlockPos, proxies: Vec<Arc<dyn CapabilityProxy>>) -> Arc<Self> {
        Arc::new(Self {
            pos,
            proxies: RwLock::new(proxies),
        })
    }

    pub fn attach(&self, proxy: Arc<dyn CapabilityProxy>) {
        self.proxies.write().push(proxy);
    }

    pub fn detach_all(&self) {
        self.proxies.write().clear();
    }
}

impl Controller for ProbeController {
    fn pos(&self) -> BlockPos {
        self.pos
    }

    fn proxies(&self) -> Vec<Arc<dyn CapabilityProxy>> {
        self.proxies.read().clone()
    }

    fn has_proxies(&self) -> bool {
        !self.proxies.read().is_empty()
    }
}

/// Controller that blows up whenever it is asked for its proxies.
pub struct BrokenController(pub BlockPos);

impl Controller for BrokenController {
    fn pos(&self) -> BlockPos {
        self.0
    }

    fn proxies(&self) -> Vec<Arc<dyn CapabilityProxy>> {
        panic!("controller at {} lost its world", self.0);
    }
}

/// Non-controller member block.
pub struct Casing(pub BlockPos);

impl Component for Casing {
    fn pos(&self) -> BlockPos {
        self.0
    }
}

/// A solid `side`³ cube of members starting at `anchor`.
pub fn cube(anchor: BlockPos, side: i32) -> MultiblockState {
    let mut members = Vec::new();
    for dx in 0..side {
        for dy in 0..side {
            for dz in 0..side {
                members.push(anchor.offset(dx, dy, dz));
            }
        }
    }
    MultiblockState::new(anchor, "multiblocked:cube", members)
}
