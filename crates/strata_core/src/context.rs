//! The context: owner of entities, groups and reverse indexes
//!
//! The context is the listener of every entity it creates. When a component
//! changes, it looks the component id up in three reverse indexes and only
//! revisits the groups whose matcher mentions that id:
//!
//! - `any_index`: ids in a matcher's `any_of` clause
//! - `all_index`: ids in a matcher's `all_of` clause
//! - `none_index`: ids in a matcher's `none_of` clause
//!
//! Groups whose matcher accepts an entity without components are kept in a
//! separate list so that creation and destruction keep them exact as well.
//! Whatever the path, a group always equals a full scan of the live entities
//! with its matcher.

use crate::component::{ComponentId, ComponentRef};
use crate::config::ContextConfig;
use crate::detached::{SyncBatch, SyncOp};
use crate::entity::{Entity, EntityListener};
use crate::group::Group;
use crate::hooks::ContextHooks;
use crate::matcher::Matcher;
use crate::violation::{ContractViolation, SharedViolationHandler};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-wide unique identifier of a context
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

type GroupList = SmallVec<[Group; 4]>;
type GroupIndex = RefCell<FxHashMap<ComponentId, GroupList>>;

struct ContextInner {
    id: ContextId,
    name: Option<String>,
    violations: SharedViolationHandler,
    entity_capacity: usize,
    entities: RefCell<FxHashMap<usize, Entity>>,
    next_creation_index: Cell<usize>,
    /// Bumped by every reset
    epoch: Cell<u64>,
    groups: RefCell<FxHashMap<Matcher, Group>>,
    any_index: GroupIndex,
    all_index: GroupIndex,
    none_index: GroupIndex,
    /// Groups whose matcher accepts an entity without components
    vacuous: RefCell<GroupList>,
    hooks: RefCell<Option<Rc<dyn ContextHooks>>>,
}

fn lookup(index: &GroupIndex, id: ComponentId) -> GroupList {
    index.borrow().get(&id).cloned().unwrap_or_default()
}

fn register(index: &GroupIndex, ids: &[ComponentId], group: &Group) {
    let mut index = index.borrow_mut();
    for &id in ids {
        index.entry(id).or_default().push(group.clone());
    }
}

impl ContextInner {
    fn hooks(&self) -> Option<Rc<dyn ContextHooks>> {
        self.hooks.borrow().clone()
    }

    fn is_live(&self, entity: &Entity) -> bool {
        self.entities
            .borrow()
            .get(&entity.creation_index())
            .is_some_and(|live| Entity::ptr_eq(live, entity))
    }

    /// Bring one group's membership in line with the entity's current state
    fn refresh(&self, group: &Group, entity: &Entity, live: bool, cause: &ComponentRef) {
        if live && group.matcher().matches(entity) {
            group.add_entity(entity);
        } else {
            group.remove_entity(entity, Some(cause));
        }
    }
}

impl EntityListener for ContextInner {
    fn component_added(&self, entity: &Entity, component: &ComponentRef) {
        let id = component.component_id();
        let live = self.is_live(entity);

        for group in lookup(&self.any_index, id) {
            // one listed id is enough for a pure any-matcher
            if live && group.matcher().is_pure_any() && entity.has_component(id) {
                group.add_entity(entity);
            } else {
                self.refresh(&group, entity, live, component);
            }
        }
        for group in lookup(&self.all_index, id) {
            self.refresh(&group, entity, live, component);
        }
        for group in lookup(&self.none_index, id) {
            self.refresh(&group, entity, live, component);
        }

        if let Some(hooks) = self.hooks() {
            hooks.component_added(entity, component);
        }
    }

    fn component_removed(&self, entity: &Entity, component: &ComponentRef) {
        let id = component.component_id();
        let live = self.is_live(entity);

        for group in lookup(&self.all_index, id) {
            self.refresh(&group, entity, live, component);
        }
        for group in lookup(&self.any_index, id) {
            self.refresh(&group, entity, live, component);
        }
        for group in lookup(&self.none_index, id) {
            self.refresh(&group, entity, live, component);
        }

        if let Some(hooks) = self.hooks() {
            hooks.component_removed(entity, component);
        }
    }
}

/// Owner of entities and cached groups
///
/// Cloning a `Context` yields another handle to the same store. A context is
/// single-threaded; only [`DetachedEntity`](crate::DetachedEntity) snapshots
/// and [`SyncBatch`]es cross threads.
///
/// ```rust
/// use strata_core::{Component, Context, Matcher};
///
/// #[derive(Debug)] struct Name(&'static str);
/// #[derive(Debug)] struct Age(u32);
/// impl Component for Name {}
/// impl Component for Age {}
///
/// let context = Context::new();
/// let adults = context.entity_group(Matcher::all([Name::id(), Age::id()]));
///
/// let e = context.create_entity();
/// e.set(Name("Maxim")).set(Age(33));
/// assert_eq!(adults.len(), 1);
///
/// e.remove::<Age>();
/// assert!(adults.is_empty());
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                id: ContextId::next(),
                name: config.name,
                violations: config.violation_handler,
                entity_capacity: config.entity_capacity,
                entities: RefCell::new(FxHashMap::with_capacity_and_hasher(
                    config.entity_capacity,
                    Default::default(),
                )),
                next_creation_index: Cell::new(0),
                epoch: Cell::new(0),
                groups: RefCell::new(FxHashMap::default()),
                any_index: RefCell::new(FxHashMap::default()),
                all_index: RefCell::new(FxHashMap::default()),
                none_index: RefCell::new(FxHashMap::default()),
                vacuous: RefCell::new(SmallVec::new()),
                hooks: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn violation_handler(&self) -> &SharedViolationHandler {
        &self.inner.violations
    }

    pub(crate) fn report(&self, violation: ContractViolation) {
        self.inner.violations.handle(&violation);
    }

    // =========================================================================
    // ENTITIES
    // =========================================================================

    /// Create an entity with the next creation index
    pub fn create_entity(&self) -> Entity {
        let creation_index = self.inner.next_creation_index.get();
        self.inner.next_creation_index.set(creation_index + 1);

        let weak = Rc::downgrade(&self.inner);
        let listener: Weak<dyn EntityListener> = weak;
        let entity = Entity::new(
            creation_index,
            self.inner.id,
            self.inner.epoch.get(),
            listener,
            self.inner.violations.clone(),
        );
        self.inner
            .entities
            .borrow_mut()
            .insert(creation_index, entity.clone());
        tracing::trace!(context = %self.inner.id, creation_index, "entity created");

        let vacuous = self.inner.vacuous.borrow().clone();
        for group in vacuous {
            group.add_entity(&entity);
        }

        if let Some(hooks) = self.inner.hooks() {
            hooks.entity_created(&entity);
        }
        entity
    }

    /// Destroy an entity owned by this context; anything else is a no-op
    ///
    /// The entity leaves the live set first, then loses its components one by
    /// one, which vacates every group it belonged to.
    pub fn destroy_entity(&self, entity: &Entity) {
        if !self.inner.is_live(entity) {
            return;
        }
        self.inner
            .entities
            .borrow_mut()
            .remove(&entity.creation_index());

        entity.remove_all_components();

        let vacuous = self.inner.vacuous.borrow().clone();
        for group in vacuous {
            group.remove_entity(entity, None);
        }
        tracing::debug!(
            context = %self.inner.id,
            creation_index = entity.creation_index(),
            "entity destroyed"
        );

        if let Some(hooks) = self.inner.hooks() {
            hooks.entity_destroyed(entity);
        }
    }

    /// Live entity with the given creation index
    pub fn entity(&self, creation_index: usize) -> Option<Entity> {
        self.inner.entities.borrow().get(&creation_index).cloned()
    }

    /// Live entities in ascending creation order
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.inner.entities.borrow().values().cloned().collect();
        entities.sort_unstable_by_key(Entity::creation_index);
        entities
    }

    pub fn has_entity(&self, entity: &Entity) -> bool {
        self.inner.is_live(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.inner.entities.borrow().len()
    }

    // =========================================================================
    // GROUPS
    // =========================================================================

    /// Cached group for `matcher`, created and seeded on first request
    ///
    /// Matchers that compare equal always yield the same group instance.
    pub fn entity_group(&self, matcher: Matcher) -> Group {
        if let Some(group) = self.inner.groups.borrow().get(&matcher) {
            return group.clone();
        }

        let group = Group::new(matcher.clone());
        for entity in self.entities() {
            if matcher.matches(&entity) {
                group.add_entity(&entity);
            }
        }

        register(&self.inner.any_index, matcher.any_ids(), &group);
        register(&self.inner.all_index, matcher.all_ids(), &group);
        register(&self.inner.none_index, matcher.none_ids(), &group);
        if matcher.matches_empty() {
            self.inner.vacuous.borrow_mut().push(group.clone());
        }

        tracing::trace!(context = %self.inner.id, %matcher, members = group.len(), "group created");
        self.inner.groups.borrow_mut().insert(matcher, group.clone());
        group
    }

    /// Number of cached groups
    pub fn group_count(&self) -> usize {
        self.inner.groups.borrow().len()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Drop every entity, group and index and restart creation indices at 0
    ///
    /// Nobody is notified. Handles obtained before the reset are stale.
    pub fn reset(&self) {
        let inner = &self.inner;
        *inner.entities.borrow_mut() =
            FxHashMap::with_capacity_and_hasher(inner.entity_capacity, Default::default());
        inner.next_creation_index.set(0);
        inner.epoch.set(inner.epoch.get() + 1);
        inner.groups.borrow_mut().clear();
        inner.any_index.borrow_mut().clear();
        inner.all_index.borrow_mut().clear();
        inner.none_index.borrow_mut().clear();
        inner.vacuous.borrow_mut().clear();
        tracing::debug!(context = %inner.id, epoch = inner.epoch.get(), "context reset");
    }

    /// Replay a batch produced by [`DetachedEntity::sync`](crate::DetachedEntity::sync)
    ///
    /// Returns false when the batch targets another context, an entity from
    /// before the last reset, or an entity that is no longer live; such
    /// batches are dropped.
    pub fn apply_sync(&self, batch: SyncBatch) -> bool {
        if batch.target.context != self.inner.id {
            tracing::debug!(context = %self.inner.id, target = %batch.target.context, "sync batch for another context dropped");
            return false;
        }
        if batch.target.epoch != self.inner.epoch.get() {
            tracing::debug!(
                context = %self.inner.id,
                creation_index = batch.target.creation_index,
                "sync batch from before reset dropped"
            );
            return false;
        }
        let Some(entity) = self.entity(batch.target.creation_index) else {
            tracing::debug!(
                context = %self.inner.id,
                creation_index = batch.target.creation_index,
                "sync batch for destroyed entity dropped"
            );
            return false;
        };

        for (id, op) in batch.ops {
            match op {
                SyncOp::Set(component) => {
                    entity.set_component(component, true);
                }
                SyncOp::Remove => {
                    entity.remove_component(id);
                }
            }
        }
        true
    }

    // =========================================================================
    // HOOKS
    // =========================================================================

    /// Install diagnostic hooks, replacing any previous ones
    pub fn set_hooks(&self, hooks: Rc<dyn ContextHooks>) {
        *self.inner.hooks.borrow_mut() = Some(hooks);
    }

    pub fn clear_hooks(&self) {
        self.inner.hooks.borrow_mut().take();
    }

    /// Run a named system through the installed hooks
    pub fn run_system(&self, name: &str, mut system: impl FnMut()) {
        match self.inner.hooks() {
            Some(hooks) => hooks.run_system(name, &mut system),
            None => system(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("groups", &self.group_count())
            .field("entities", &self.entities())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::group::GroupObserver;
    use crate::violation::CountViolations;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Name(&'static str);
    #[derive(Debug)]
    struct Age(u32);
    #[derive(Debug)]
    struct Flag;

    impl Component for Name {}
    impl Component for Age {}
    impl Component for Flag {}

    fn indices(group: &Group) -> Vec<usize> {
        group
            .sorted_entities()
            .iter()
            .map(Entity::creation_index)
            .collect()
    }

    #[test]
    fn test_creation_indices() {
        let context = Context::new();
        let e0 = context.create_entity();
        let e1 = context.create_entity();
        let e2 = context.create_entity();

        assert_eq!(
            [e0.creation_index(), e1.creation_index(), e2.creation_index()],
            [0, 1, 2]
        );
        assert_eq!(context.entity_count(), 3);
    }

    #[test]
    fn test_entities_of_different_contexts_differ() {
        let a = Context::new();
        let b = Context::new();

        assert_ne!(a.create_entity(), b.create_entity());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_group_cache() {
        let context = Context::new();
        let g1 = context.entity_group(Matcher::all([Name::id(), Age::id()]));
        let g2 = context.entity_group(Matcher::all([Age::id(), Name::id()]));
        let g3 = context.entity_group(Matcher::any([Age::id(), Name::id()]));

        assert!(Group::ptr_eq(&g1, &g2));
        assert!(!Group::ptr_eq(&g1, &g3));
        assert_eq!(context.group_count(), 2);
    }

    #[test]
    fn test_any_group_keeps_entity_while_one_id_remains() {
        let context = Context::new();
        let group = context.entity_group(Matcher::any([Name::id(), Age::id()]));
        let e = context.create_entity();

        e.set(Name("Max")).set(Age(3));
        assert_eq!(indices(&group), vec![0]);

        e.remove::<Name>();
        assert_eq!(indices(&group), vec![0]);

        e.remove::<Age>();
        assert!(group.is_empty());
    }

    #[test]
    fn test_none_of_clause() {
        let context = Context::new();
        let group = context.entity_group(Matcher::all_of([Name::id()]).none_of([Flag::id()]));
        let e = context.create_entity();

        e.set(Name("Max"));
        assert_eq!(indices(&group), vec![0]);

        e.set(Flag);
        assert!(group.is_empty());

        e.remove::<Flag>();
        assert_eq!(indices(&group), vec![0]);
    }

    #[test]
    fn test_vacuous_group_tracks_creation_and_destruction() {
        let context = Context::new();
        let everything = context.entity_group(Matcher::default());
        let unflagged = context.entity_group(Matcher::default().none_of([Flag::id()]));

        let e0 = context.create_entity();
        let e1 = context.create_entity();
        e1.set(Flag);

        assert_eq!(indices(&everything), vec![0, 1]);
        assert_eq!(indices(&unflagged), vec![0]);

        context.destroy_entity(&e0);
        context.destroy_entity(&e1);
        assert!(everything.is_empty());
        assert!(unflagged.is_empty());
    }

    #[test]
    fn test_destroy_foreign_entity_is_noop() {
        let a = Context::new();
        let b = Context::new();
        let group = a.entity_group(Name::matcher());

        let e = a.create_entity();
        e.set(Name("Max"));
        b.destroy_entity(&e);

        assert_eq!(group.len(), 1);
        assert!(a.has_entity(&e));

        a.destroy_entity(&e);
        a.destroy_entity(&e);
        assert!(group.is_empty());
        assert!(!a.has_entity(&e));
    }

    /// Counts membership events
    #[derive(Default)]
    struct Counter {
        added: Cell<usize>,
        removed: Cell<usize>,
    }

    impl GroupObserver for Counter {
        fn entity_added(&self, _entity: &Entity) {
            self.added.set(self.added.get() + 1);
        }

        fn entity_removed(&self, _entity: &Entity, _component: Option<&ComponentRef>) {
            self.removed.set(self.removed.get() + 1);
        }
    }

    #[test]
    fn test_reset() {
        let context = Context::new();
        let group = context.entity_group(Name::matcher());
        let counter = Rc::new(Counter::default());
        group.add_observer(counter.clone());
        let old = context.create_entity();
        old.set(Name("Max"));

        context.reset();

        // reset notifies nobody
        assert_eq!(counter.added.get(), 1);
        assert_eq!(counter.removed.get(), 0);
        assert_eq!(group.len(), 1);

        assert_eq!(context.entity_count(), 0);
        assert_eq!(context.group_count(), 0);
        let fresh = context.create_entity();
        assert_eq!(fresh.creation_index(), 0);

        // the discarded group is not fed anymore
        fresh.set(Name("Timo"));
        assert_eq!(group.len(), 1);
        assert!(!Group::ptr_eq(&group, &context.entity_group(Name::matcher())));
        assert_eq!(context.entity_group(Name::matcher()).len(), 1);

        // stale handles do not leak into new groups
        old.remove::<Name>();
        old.set(Name("Ghost"));
        let names = context.entity_group(Name::matcher()).sorted_entities();
        assert_eq!(names.len(), 1);
        assert!(Entity::ptr_eq(&names[0], &fresh));
        assert_eq!(names[0].get::<Name>().map(|n| n.0), Some("Timo"));
        assert_ne!(old, fresh);
    }

    #[test]
    fn test_stale_handle_cannot_evict_live_entity() {
        let context = Context::new();
        let old = context.create_entity();
        old.set(Name("Max"));

        context.reset();
        let fresh = context.create_entity();
        fresh.set(Name("Timo"));
        let group = context.entity_group(Name::matcher());
        assert_eq!(group.len(), 1);

        old.remove::<Name>();

        assert!(group.contains(&fresh));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_sync_from_before_reset_is_dropped() {
        let context = Context::new();
        let queue = crate::SyncQueue::new();
        let old = context.create_entity();

        let mut detached = old.detach();
        detached.set(Flag);
        detached.sync(&queue);

        context.reset();
        let fresh = context.create_entity();
        assert_eq!(fresh.creation_index(), old.creation_index());

        assert_eq!(queue.run_pending(&context), 1);
        assert!(!fresh.has::<Flag>());
        assert!(!old.has::<Flag>());
    }

    #[test]
    fn test_overwrite_policy_from_config() {
        let violations = Arc::new(CountViolations::new());
        let context = Context::with_config(
            ContextConfig::new().with_shared_violation_handler(violations.clone()),
        );
        let group = context.entity_group(Age::matcher());

        let e = context.create_entity();
        e.set(Age(1));
        e.set(Age(2));

        assert_eq!(violations.count(), 1);
        assert_eq!(e.get::<Age>().map(|a| a.0), Some(2));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_apply_sync_rejects_foreign_and_dead_targets() {
        let a = Context::new();
        let b = Context::new();
        let e = a.create_entity();

        let mut detached = e.detach();
        detached.set(Flag);
        let queue = crate::SyncQueue::new();
        detached.sync(&queue);
        let batch = queue.take_pending().remove(0);

        assert!(!b.apply_sync(batch.clone()));
        a.destroy_entity(&e);
        assert!(!a.apply_sync(batch));
        assert!(!e.has::<Flag>());
    }

    #[test]
    fn test_run_system_without_hooks() {
        let context = Context::new();
        let mut runs = 0;
        context.run_system("count", || runs += 1);
        assert_eq!(runs, 1);
    }
}
