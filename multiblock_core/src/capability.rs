//! Contracts between the scanner and the structures it polls.
//!
//! Proxies are shared handles refreshed through `&self`. Each proxy owns
//! whatever synchronization its state needs, and controllers hand the scanner
//! a cloned list of handles so no controller lock is held while refreshing.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::position::BlockPos;

/// Identifies one scan pass. Advances once per completed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodToken(pub u64);

impl PeriodToken {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for PeriodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("capability proxy at {pos} is detached from its block")]
    Detached { pos: BlockPos },
    #[error("capability proxy refresh failed: {0}")]
    Refresh(String),
}

/// One externally observable feature of a structure (an item handler, a
/// fluid tank, an energy buffer) whose backing block can change underneath it.
pub trait CapabilityProxy: Send + Sync {
    /// Re-evaluates change-detection state for the scan pass `period`.
    fn refresh(&self, period: PeriodToken) -> Result<(), ProxyError>;
}

/// The component that owns a formed structure and exposes its proxies.
pub trait Controller: Send + Sync {
    fn pos(&self) -> BlockPos;

    /// Snapshot of the proxies currently attached to this controller.
    fn proxies(&self) -> Vec<Arc<dyn CapabilityProxy>>;

    fn has_proxies(&self) -> bool {
        !self.proxies().is_empty()
    }
}

/// Remembers the last period a proxy was evaluated in.
///
/// A proxy reachable through several controllers calls [`ChangeTracker::claim`]
/// first and skips the work when it returns `false`.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last: Mutex<Option<PeriodToken>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time it is called with `period`.
    pub fn claim(&self, period: PeriodToken) -> bool {
        let mut last = self.last.lock();
        if *last == Some(period) {
            return false;
        }
        *last = Some(period);
        true
    }

    pub fn last_period(&self) -> Option<PeriodToken> {
        *self.last.lock()
    }
}
