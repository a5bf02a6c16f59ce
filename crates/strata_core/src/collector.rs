//! Collectors: buffered, pull-drained logs of group membership changes
//!
//! A [`Collector`] observes one group and queues entities according to its
//! [`CollectionPolicy`]. Application code drains the queue whenever it likes
//! with [`Collector::pull`], [`Collector::pull_all`] or
//! [`Collector::pull_first`].
//!
//! ```rust
//! use strata_core::{CollectionPolicy, Collector, Component, Context};
//!
//! #[derive(Debug)] struct Position(i32, i32);
//! impl Component for Position {}
//!
//! let context = Context::new();
//! let moved = Collector::new(&context.entity_group(Position::matcher()), CollectionPolicy::Added);
//!
//! context.create_entity().set(Position(1, 2));
//! context.create_entity().set(Position(3, 4));
//!
//! assert_eq!(moved.pull(1).len(), 1);
//! assert_eq!(moved.pull_all().len(), 1);
//! assert!(moved.pull_first().is_none());
//! ```

use crate::component::ComponentRef;
use crate::entity::Entity;
use crate::group::{Group, GroupObserver, ObserverHandle};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Which membership changes a collector retains
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionPolicy {
    /// Entities that entered the group; they stay queued if they leave again
    Added,
    /// Entities that left the group; they stay queued if they come back
    Removed,
    /// Entities that entered or left the group
    AddedAndRemoved,
    /// Entities that entered the group and are still in it
    AddedOnly,
    /// Entities that left the group and did not come back
    RemovedOnly,
}

impl CollectionPolicy {
    fn keeps_added(self) -> bool {
        matches!(self, Self::Added | Self::AddedAndRemoved | Self::AddedOnly)
    }

    fn keeps_removed(self) -> bool {
        matches!(self, Self::Removed | Self::AddedAndRemoved | Self::RemovedOnly)
    }
}

#[derive(Default)]
struct Queue {
    entities: Vec<Entity>,
    /// Creation index -> position recorded when the entity was enqueued;
    /// holds a key for exactly the entities in `entities`
    positions: FxHashMap<usize, usize>,
}

impl Queue {
    fn contains(&self, entity: &Entity) -> bool {
        self.positions.contains_key(&entity.creation_index())
    }

    fn enqueue(&mut self, entity: &Entity) {
        if self.contains(entity) {
            return;
        }
        self.entities.push(entity.clone());
        self.positions
            .insert(entity.creation_index(), self.entities.len() - 1);
    }

    /// Remove by recorded position
    ///
    /// Positions are not rewritten when earlier entries leave the queue, so
    /// after a partial pull or an earlier dequeue the recorded position may
    /// point past the entity it was recorded for. An out of range position
    /// leaves the queue untouched. Otherwise whichever entity sits at the
    /// position leaves, and only its key is dropped.
    fn dequeue(&mut self, entity: &Entity) {
        let Some(&position) = self.positions.get(&entity.creation_index()) else {
            return;
        };
        if position >= self.entities.len() {
            tracing::warn!(
                creation_index = entity.creation_index(),
                position,
                len = self.entities.len(),
                "collector position out of range, entry kept"
            );
            return;
        }

        let removed = self.entities.remove(position);
        self.positions.remove(&removed.creation_index());
        if !Entity::ptr_eq(&removed, entity) {
            tracing::warn!(
                creation_index = entity.creation_index(),
                removed = removed.creation_index(),
                position,
                "collector position stale, dequeued another entity"
            );
        }
    }

    fn drain(&mut self, amount: usize) -> Vec<Entity> {
        let bound = amount.min(self.entities.len());
        let pulled: Vec<Entity> = self.entities.drain(..bound).collect();
        for entity in &pulled {
            self.positions.remove(&entity.creation_index());
        }
        pulled
    }

    fn clear(&mut self) {
        self.entities.clear();
        self.positions.clear();
    }
}

/// Group observer that queues membership changes for later processing
pub struct Collector {
    policy: CollectionPolicy,
    group: Group,
    handle: Cell<Option<ObserverHandle>>,
    queue: RefCell<Queue>,
}

impl Collector {
    /// Create a collector and register it on `group`
    pub fn new(group: &Group, policy: CollectionPolicy) -> Rc<Self> {
        let collector = Rc::new(Self {
            policy,
            group: group.clone(),
            handle: Cell::new(None),
            queue: RefCell::new(Queue::default()),
        });
        collector.activate();
        collector
    }

    pub fn policy(&self) -> CollectionPolicy {
        self.policy
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Resume observing the group; a no-op when already active
    pub fn activate(self: &Rc<Self>) {
        if self.handle.get().is_none() {
            let handle = self.group.add_observer(Rc::new(Registration(Rc::downgrade(self))));
            self.handle.set(Some(handle));
        }
    }

    /// Stop observing the group; queued entities are kept
    pub fn deactivate(&self) {
        if let Some(handle) = self.handle.take() {
            self.group.remove_observer_by_handle(handle);
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `amount` of the earliest queued entities, removed from the queue
    pub fn pull(&self, amount: usize) -> Vec<Entity> {
        if amount == 0 {
            return Vec::new();
        }
        self.queue.borrow_mut().drain(amount)
    }

    /// Every queued entity in enqueue order; the queue is left empty
    pub fn pull_all(&self) -> Vec<Entity> {
        let mut queue = self.queue.borrow_mut();
        queue.positions.clear();
        std::mem::take(&mut queue.entities)
    }

    pub fn pull_first(&self) -> Option<Entity> {
        self.pull(1).into_iter().next()
    }

    /// Drop everything queued without returning it
    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
    }
}

impl GroupObserver for Collector {
    fn entity_added(&self, entity: &Entity) {
        let mut queue = self.queue.borrow_mut();
        match self.policy {
            CollectionPolicy::RemovedOnly => queue.dequeue(entity),
            policy if policy.keeps_added() => queue.enqueue(entity),
            _ => {}
        }
    }

    fn entity_removed(&self, entity: &Entity, _component: Option<&ComponentRef>) {
        let mut queue = self.queue.borrow_mut();
        match self.policy {
            CollectionPolicy::AddedOnly => queue.dequeue(entity),
            policy if policy.keeps_removed() => queue.enqueue(entity),
            _ => {}
        }
    }
}

/// What the group holds, so that dropping the collector unregisters it
struct Registration(Weak<Collector>);

impl GroupObserver for Registration {
    fn entity_added(&self, entity: &Entity) {
        if let Some(collector) = self.0.upgrade() {
            collector.entity_added(entity);
        }
    }

    fn entity_removed(&self, entity: &Entity, component: Option<&ComponentRef>) {
        if let Some(collector) = self.0.upgrade() {
            collector.entity_removed(entity, component);
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("policy", &self.policy)
            .field("matcher", self.group.matcher())
            .field("queued", &self.len())
            .field("active", &self.is_active())
            .finish()
    }
}
