//! Entities: bags of components with change notification
//!
//! An [`Entity`] is a cheap, clonable handle. Every mutation is reported
//! synchronously to the single [`EntityListener`] fixed when the entity was
//! created, which is the owning [`Context`](crate::Context).

use crate::component::{component_ref, downcast, Component, ComponentId, ComponentRef};
use crate::context::ContextId;
use crate::detached::DetachedEntity;
use crate::violation::{ContractViolation, SharedViolationHandler};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Receives every component change of an entity
pub trait EntityListener {
    fn component_added(&self, entity: &Entity, component: &ComponentRef);

    /// Called after the component was removed; `component` is the removed value
    fn component_removed(&self, entity: &Entity, component: &ComponentRef);
}

/// Thread-safe address of an entity
///
/// `epoch` counts the resets of the owning context, so an address taken
/// before a reset never resolves to an entity created after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub context: ContextId,
    pub epoch: u64,
    pub creation_index: usize,
}

struct EntityInner {
    creation_index: usize,
    context: ContextId,
    epoch: u64,
    components: RefCell<FxHashMap<ComponentId, ComponentRef>>,
    listener: Weak<dyn EntityListener>,
    violations: SharedViolationHandler,
}

/// Handle to a live (or destroyed) entity
#[derive(Clone)]
pub struct Entity {
    inner: Rc<EntityInner>,
}

impl Entity {
    pub(crate) fn new(
        creation_index: usize,
        context: ContextId,
        epoch: u64,
        listener: Weak<dyn EntityListener>,
        violations: SharedViolationHandler,
    ) -> Self {
        Self {
            inner: Rc::new(EntityInner {
                creation_index,
                context,
                epoch,
                components: RefCell::new(FxHashMap::default()),
                listener,
                violations,
            }),
        }
    }

    pub fn creation_index(&self) -> usize {
        self.inner.creation_index
    }

    pub fn context_id(&self) -> ContextId {
        self.inner.context
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef {
            context: self.inner.context,
            epoch: self.inner.epoch,
            creation_index: self.inner.creation_index,
        }
    }

    /// True if both handles point to the same entity instance
    pub fn ptr_eq(a: &Entity, b: &Entity) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Add a component that the entity must not have yet
    ///
    /// Setting a type that is already present is an illegal overwrite: it is
    /// reported to the violation handler and the overwrite then happens anyway.
    pub fn set<C: Component>(&self, component: C) -> &Self {
        self.set_component(component_ref(component), false)
    }

    /// Add or overwrite a component
    pub fn replace<C: Component>(&self, component: C) -> &Self {
        self.set_component(component_ref(component), true)
    }

    /// Type-erased set
    ///
    /// An existing value is removed first (with its removal notification),
    /// then the new value is installed and the add notification fires.
    pub fn set_component(&self, component: ComponentRef, overwrite: bool) -> &Self {
        let id = component.component_id();
        let contains = self.inner.components.borrow().contains_key(&id);

        if contains && !overwrite {
            self.inner
                .violations
                .handle(&ContractViolation::IllegalOverwrite {
                    entity: self.inner.creation_index,
                    component: id,
                });
        }

        if contains {
            self.remove_component(id);
        }

        self.inner
            .components
            .borrow_mut()
            .insert(id, Arc::clone(&component));

        if let Some(listener) = self.inner.listener.upgrade() {
            listener.component_added(self, &component);
        }
        self
    }

    /// Remove a component; nothing happens if it is absent
    pub fn remove<C: Component>(&self) -> Option<Arc<C>> {
        self.remove_component(C::id())
            .and_then(|removed| downcast::<C>(&removed))
    }

    /// Type-erased remove, returning the removed value
    pub fn remove_component(&self, id: ComponentId) -> Option<ComponentRef> {
        let removed = self.inner.components.borrow_mut().remove(&id)?;

        if let Some(listener) = self.inner.listener.upgrade() {
            listener.component_removed(self, &removed);
        }
        Some(removed)
    }

    /// Remove every component one at a time, each with its own notification
    pub fn remove_all_components(&self) {
        let ids: SmallVec<[ComponentId; 8]> =
            self.inner.components.borrow().keys().copied().collect();
        for id in ids {
            self.remove_component(id);
        }
    }

    // =========================================================================
    // ACCESS
    // =========================================================================

    pub fn get<C: Component>(&self) -> Option<Arc<C>> {
        self.inner
            .components
            .borrow()
            .get(&C::id())
            .and_then(downcast::<C>)
    }

    pub fn get_component(&self, id: ComponentId) -> Option<ComponentRef> {
        self.inner.components.borrow().get(&id).cloned()
    }

    pub fn has<C: Component>(&self) -> bool {
        self.has_component(C::id())
    }

    pub fn has_component(&self, id: ComponentId) -> bool {
        self.inner.components.borrow().contains_key(&id)
    }

    pub fn component_count(&self) -> usize {
        self.inner.components.borrow().len()
    }

    /// Current components, in no particular order
    pub fn components(&self) -> Vec<ComponentRef> {
        self.inner.components.borrow().values().cloned().collect()
    }

    /// Current component ids, sorted
    pub fn component_ids(&self) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self.inner.components.borrow().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Snapshot the components into an independently mutable [`DetachedEntity`]
    ///
    /// Every call yields a new snapshot. Serializing concurrent detach/sync
    /// pairs on the same entity is up to the caller.
    pub fn detach(&self) -> DetachedEntity {
        DetachedEntity::new(
            self.entity_ref(),
            self.inner.components.borrow().clone(),
            Arc::clone(&self.inner.violations),
        )
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.inner.creation_index == other.inner.creation_index
            && self.inner.context == other.inner.context
            && self.inner.epoch == other.inner.epoch
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.context.hash(state);
        self.inner.epoch.hash(state);
        self.inner.creation_index.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components = self.inner.components.borrow();
        let mut values: Vec<&ComponentRef> = components.values().collect();
        values.sort_by_key(|c| c.component_id().short_name());
        write!(
            f,
            "Entity({})@{}: {:?}",
            self.inner.creation_index, self.inner.context, values
        )
    }
}
