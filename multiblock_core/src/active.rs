use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::capability::Controller;
use crate::position::BlockPos;

/// Any loaded block entity that takes part in a multiblock.
pub trait Component: Send + Sync {
    fn pos(&self) -> BlockPos;
}

/// A loaded structure-bearing component, as reported by the world.
#[derive(Clone)]
pub enum ComponentHandle {
    Part(Arc<dyn Component>),
    Controller(Arc<dyn Controller>),
}

impl ComponentHandle {
    pub fn pos(&self) -> BlockPos {
        match self {
            Self::Part(part) => part.pos(),
            Self::Controller(controller) => controller.pos(),
        }
    }

    pub fn is_controller(&self) -> bool {
        matches!(self, Self::Controller(_))
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Part(part) => f.debug_tuple("Part").field(&part.pos()).finish(),
            Self::Controller(controller) => {
                f.debug_tuple("Controller").field(&controller.pos()).finish()
            }
        }
    }
}

/// How a lifecycle event changed the number of loaded controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerTransition {
    Unchanged,
    FirstLoaded,
    LastUnloaded,
}

/// Loaded controllers, shared with the scanner thread.
///
/// Writers take the lock briefly per insert/remove; the scanner clones the
/// handles out under a read lock and iterates the copy.
#[derive(Clone, Default)]
pub struct ControllerSet {
    inner: Arc<RwLock<BTreeMap<BlockPos, Arc<dyn Controller>>>>,
}

impl ControllerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the controller at its position.
    /// Returns `true` when the set was empty beforehand.
    pub fn insert(&self, controller: Arc<dyn Controller>) -> bool {
        let mut guard = self.inner.write();
        let was_empty = guard.is_empty();
        guard.insert(controller.pos(), controller);
        was_empty
    }

    /// Removes the controller at `pos`.
    /// Returns `true` when this removal emptied the set.
    pub fn remove(&self, pos: BlockPos) -> bool {
        let mut guard = self.inner.write();
        guard.remove(&pos).is_some() && guard.is_empty()
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.inner.read().contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Copies the current handles out, ordered by position.
    pub fn snapshot(&self) -> Vec<Arc<dyn Controller>> {
        self.inner.read().values().cloned().collect()
    }
}

impl fmt::Debug for ControllerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.read().keys()).finish()
    }
}

/// Every loaded multiblock component in one world, keyed by position.
#[derive(Debug, Default)]
pub struct ActiveSet {
    loading: HashMap<BlockPos, ComponentHandle>,
    controllers: ControllerSet,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: ComponentHandle) -> ControllerTransition {
        let pos = handle.pos();
        let previous = self.loading.insert(pos, handle.clone());

        match handle {
            ComponentHandle::Controller(controller) => {
                if self.controllers.insert(controller) {
                    ControllerTransition::FirstLoaded
                } else {
                    ControllerTransition::Unchanged
                }
            }
            ComponentHandle::Part(_) => match previous {
                Some(ComponentHandle::Controller(_)) if self.controllers.remove(pos) => {
                    ControllerTransition::LastUnloaded
                }
                _ => ControllerTransition::Unchanged,
            },
        }
    }

    pub fn remove(&mut self, pos: BlockPos) -> ControllerTransition {
        match self.loading.remove(&pos) {
            Some(ComponentHandle::Controller(_)) if self.controllers.remove(pos) => {
                ControllerTransition::LastUnloaded
            }
            _ => ControllerTransition::Unchanged,
        }
    }

    pub fn get(&self, pos: BlockPos) -> Option<&ComponentHandle> {
        self.loading.get(&pos)
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.loading.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.loading.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loading.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentHandle> {
        self.loading.values()
    }

    pub fn controllers(&self) -> &ControllerSet {
        &self.controllers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityProxy;

    struct Part(BlockPos);

    impl Component for Part {
        fn pos(&self) -> BlockPos {
            self.0
        }
    }

    struct Bare(BlockPos);

    impl Controller for Bare {
        fn pos(&self) -> BlockPos {
            self.0
        }

        fn proxies(&self) -> Vec<Arc<dyn CapabilityProxy>> {
            Vec::new()
        }
    }

    fn controller(x: i32) -> ComponentHandle {
        ComponentHandle::Controller(Arc::new(Bare(BlockPos::new(x, 0, 0))))
    }

    fn part(x: i32) -> ComponentHandle {
        ComponentHandle::Part(Arc::new(Part(BlockPos::new(x, 0, 0))))
    }

    #[test]
    fn parts_never_change_controller_count() {
        let mut active = ActiveSet::new();
        assert_eq!(active.insert(part(1)), ControllerTransition::Unchanged);
        assert_eq!(active.remove(BlockPos::new(1, 0, 0)), ControllerTransition::Unchanged);
        assert!(active.controllers().is_empty());
    }

    #[test]
    fn first_and_last_controller_transitions() {
        let mut active = ActiveSet::new();
        assert_eq!(active.insert(controller(0)), ControllerTransition::FirstLoaded);
        assert_eq!(active.insert(controller(1)), ControllerTransition::Unchanged);
        assert_eq!(active.insert(controller(1)), ControllerTransition::Unchanged);
        assert_eq!(active.controllers().len(), 2);

        assert_eq!(active.remove(BlockPos::new(0, 0, 0)), ControllerTransition::Unchanged);
        assert_eq!(active.remove(BlockPos::new(1, 0, 0)), ControllerTransition::LastUnloaded);
        assert_eq!(active.remove(BlockPos::new(1, 0, 0)), ControllerTransition::Unchanged);
        assert!(active.is_empty());
    }

    #[test]
    fn part_replacing_controller_unloads_it() {
        let mut active = ActiveSet::new();
        active.insert(controller(4));
        assert_eq!(active.insert(part(4)), ControllerTransition::LastUnloaded);
        assert!(!active.controllers().contains(BlockPos::new(4, 0, 0)));
        assert!(active.contains(BlockPos::new(4, 0, 0)));
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let set = ControllerSet::new();
        set.insert(Arc::new(Bare(BlockPos::new(0, 0, 0))));
        let snapshot = set.snapshot();
        set.remove(BlockPos::new(0, 0, 0));
        assert_eq!(snapshot.len(), 1);
        assert!(set.is_empty());
    }
}
