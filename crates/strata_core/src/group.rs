//! Groups: incrementally maintained views over one matcher
//!
//! A [`Group`] holds exactly the live entities of its context that satisfy its
//! [`Matcher`]. Groups are created and cached by
//! [`Context::entity_group`](crate::Context::entity_group) and kept up to date
//! by the context as components change; user code only reads them and
//! registers [`GroupObserver`]s.

use crate::component::ComponentRef;
use crate::entity::Entity;
use crate::matcher::Matcher;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

new_key_type! {
    /// Handle returned by [`Group::add_observer`]
    pub struct ObserverHandle;
}

/// Receives membership changes of a group
pub trait GroupObserver {
    fn entity_added(&self, entity: &Entity);

    /// `component` is the component whose change evicted the entity
    ///
    /// It is `None` when the entity was destroyed while matching only
    /// vacuously (a matcher with empty `all_of` and `any_of`).
    fn entity_removed(&self, entity: &Entity, component: Option<&ComponentRef>);
}

// =============================================================================
// OBSERVER LIST
// =============================================================================

struct ObserverNode {
    observer: Rc<dyn GroupObserver>,
    prev: Option<ObserverHandle>,
    next: Option<ObserverHandle>,
}

/// Registration-ordered observers with O(1) removal by handle
#[derive(Default)]
struct ObserverList {
    nodes: SlotMap<ObserverHandle, ObserverNode>,
    head: Option<ObserverHandle>,
    tail: Option<ObserverHandle>,
}

impl ObserverList {
    fn push(&mut self, observer: Rc<dyn GroupObserver>) -> ObserverHandle {
        let handle = self.nodes.insert(ObserverNode {
            observer,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        handle
    }

    fn remove(&mut self, handle: ObserverHandle) -> bool {
        let Some(node) = self.nodes.remove(handle) else {
            return false;
        };
        match node.prev {
            Some(prev) => self.nodes[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        true
    }

    fn find(&self, ptr: *const ()) -> Option<ObserverHandle> {
        let mut cursor = self.head;
        while let Some(handle) = cursor {
            let node = &self.nodes[handle];
            if Rc::as_ptr(&node.observer) as *const () == ptr {
                return Some(handle);
            }
            cursor = node.next;
        }
        None
    }

    fn snapshot(&self) -> SmallVec<[Rc<dyn GroupObserver>; 4]> {
        let mut observers = SmallVec::new();
        let mut cursor = self.head;
        while let Some(handle) = cursor {
            let node = &self.nodes[handle];
            observers.push(Rc::clone(&node.observer));
            cursor = node.next;
        }
        observers
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }
}

// =============================================================================
// GROUP
// =============================================================================

struct GroupInner {
    matcher: Matcher,
    members: RefCell<FxHashMap<usize, Entity>>,
    sorted: RefCell<Option<Rc<[Entity]>>>,
    observers: RefCell<ObserverList>,
}

/// Cached, observable set of entities matching one matcher
#[derive(Clone)]
pub struct Group {
    inner: Rc<GroupInner>,
}

impl Group {
    pub(crate) fn new(matcher: Matcher) -> Self {
        Self {
            inner: Rc::new(GroupInner {
                matcher,
                members: RefCell::new(FxHashMap::default()),
                sorted: RefCell::new(None),
                observers: RefCell::new(ObserverList::default()),
            }),
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.inner.matcher
    }

    /// True if both handles refer to the same group instance
    pub fn ptr_eq(a: &Group, b: &Group) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        self.inner
            .members
            .borrow()
            .get(&entity.creation_index())
            .is_some_and(|member| Entity::ptr_eq(member, entity))
    }

    /// Members in ascending creation order
    ///
    /// Built lazily after each membership change and cached until the next
    /// one. The returned slice is a snapshot, safe to hold while mutating.
    pub fn sorted_entities(&self) -> Rc<[Entity]> {
        if let Some(sorted) = self.inner.sorted.borrow().as_ref() {
            return Rc::clone(sorted);
        }

        let mut entities: Vec<Entity> = self.inner.members.borrow().values().cloned().collect();
        entities.sort_unstable_by_key(Entity::creation_index);
        let sorted: Rc<[Entity]> = entities.into();
        *self.inner.sorted.borrow_mut() = Some(Rc::clone(&sorted));
        sorted
    }

    /// Members in no particular order
    pub fn unsorted_entities(&self) -> Vec<Entity> {
        self.inner.members.borrow().values().cloned().collect()
    }

    /// Snapshot iterator over the members, in no particular order
    pub fn iter(&self) -> std::vec::IntoIter<Entity> {
        self.unsorted_entities().into_iter()
    }

    // =========================================================================
    // MEMBERSHIP (driven by the context)
    // =========================================================================

    /// Insert and notify; duplicates are ignored
    pub(crate) fn add_entity(&self, entity: &Entity) {
        {
            let mut members = self.inner.members.borrow_mut();
            if members.contains_key(&entity.creation_index()) {
                return;
            }
            members.insert(entity.creation_index(), entity.clone());
        }
        self.inner.sorted.replace(None);

        let observers = self.inner.observers.borrow().snapshot();
        for observer in observers {
            observer.entity_added(entity);
        }
    }

    /// Delete and notify; non-members are ignored
    ///
    /// A member only leaves for its own handle, never for another entity
    /// that happens to share its creation index.
    pub(crate) fn remove_entity(&self, entity: &Entity, component: Option<&ComponentRef>) {
        {
            let mut members = self.inner.members.borrow_mut();
            let is_member = members
                .get(&entity.creation_index())
                .is_some_and(|member| Entity::ptr_eq(member, entity));
            if !is_member {
                return;
            }
            members.remove(&entity.creation_index());
        }
        self.inner.sorted.replace(None);

        let observers = self.inner.observers.borrow().snapshot();
        for observer in observers {
            observer.entity_removed(entity, component);
        }
    }

    // =========================================================================
    // OBSERVERS
    // =========================================================================

    /// Register an observer; observers are notified in registration order
    pub fn add_observer(&self, observer: Rc<dyn GroupObserver>) -> ObserverHandle {
        self.inner.observers.borrow_mut().push(observer)
    }

    /// Unregister by handle in O(1)
    pub fn remove_observer_by_handle(&self, handle: ObserverHandle) -> bool {
        self.inner.observers.borrow_mut().remove(handle)
    }

    /// Unregister the first registration of this observer instance
    pub fn remove_observer<O: GroupObserver + ?Sized>(&self, observer: &Rc<O>) -> bool {
        let ptr = Rc::as_ptr(observer) as *const ();
        let mut observers = self.inner.observers.borrow_mut();
        match observers.find(ptr) {
            Some(handle) => observers.remove(handle),
            None => false,
        }
    }

    pub fn remove_all_observers(&self) {
        self.inner.observers.borrow_mut().clear();
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().nodes.len()
    }
}

impl IntoIterator for &Group {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("matcher", &self.inner.matcher)
            .field("len", &self.len())
            .field("observers", &self.observer_count())
            .finish()
    }
}
