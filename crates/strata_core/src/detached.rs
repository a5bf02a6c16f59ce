//! Detached entities and deferred sync
//!
//! [`Entity::detach`](crate::Entity::detach) copies an entity's components
//! into a [`DetachedEntity`], which is `Send` and can be mutated on another
//! thread without notifying anybody. [`DetachedEntity::sync`] hands the
//! recorded changes to a [`SyncExecutor`]; the owning thread later replays
//! them onto the live entity with [`Context::apply_sync`](crate::Context::apply_sync).
//!
//! Replay is last-writer-wins: changes made to the live entity between
//! detach and replay are overwritten for every component type in the batch.
//!
//! ```rust
//! use strata_core::{Component, Context, SyncQueue};
//!
//! #[derive(Debug)] struct Score(u32);
//! impl Component for Score {}
//!
//! let context = Context::new();
//! let queue = SyncQueue::new();
//! let entity = context.create_entity();
//!
//! let mut detached = entity.detach();
//! let sender = queue.clone();
//! std::thread::spawn(move || {
//!     detached.set(Score(10));
//!     detached.sync(&sender);
//! })
//! .join()
//! .unwrap();
//!
//! assert!(!entity.has::<Score>());
//! queue.run_pending(&context);
//! assert_eq!(entity.get::<Score>().map(|s| s.0), Some(10));
//! ```

use crate::component::{component_ref, downcast, Component, ComponentId, ComponentRef};
use crate::entity::EntityRef;
use crate::violation::{ContractViolation, SharedViolationHandler};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A recorded change to one component type
#[derive(Clone, Debug)]
pub enum SyncOp {
    /// Set the component with overwrite
    Set(ComponentRef),
    /// Remove the component
    Remove,
}

/// All changes of one `sync` call, addressed to one entity
#[derive(Clone, Debug)]
pub struct SyncBatch {
    pub target: EntityRef,
    pub ops: Vec<(ComponentId, SyncOp)>,
}

impl SyncBatch {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Execution context that replay work is handed to
///
/// Implementations must preserve FIFO order between batches.
pub trait SyncExecutor: Send + Sync {
    fn schedule(&self, batch: SyncBatch);
}

/// Point-in-time snapshot of an entity, mutable off the owning thread
pub struct DetachedEntity {
    source: EntityRef,
    components: FxHashMap<ComponentId, ComponentRef>,
    dirty: FxHashMap<ComponentId, SyncOp>,
    violations: SharedViolationHandler,
}

impl DetachedEntity {
    pub(crate) fn new(
        source: EntityRef,
        components: FxHashMap<ComponentId, ComponentRef>,
        violations: SharedViolationHandler,
    ) -> Self {
        Self {
            source,
            components,
            dirty: FxHashMap::default(),
            violations,
        }
    }

    /// Address of the live entity this snapshot was taken from
    pub fn source(&self) -> EntityRef {
        self.source
    }

    /// Add a component to the snapshot
    ///
    /// Same overwrite contract as [`Entity::set`](crate::Entity::set).
    pub fn set<C: Component>(&mut self, component: C) -> &mut Self {
        self.set_component(component_ref(component), false)
    }

    /// Add or overwrite a component in the snapshot
    pub fn replace<C: Component>(&mut self, component: C) -> &mut Self {
        self.set_component(component_ref(component), true)
    }

    pub fn set_component(&mut self, component: ComponentRef, overwrite: bool) -> &mut Self {
        let id = component.component_id();
        if self.components.contains_key(&id) && !overwrite {
            self.violations
                .handle(&ContractViolation::IllegalOverwrite {
                    entity: self.source.creation_index,
                    component: id,
                });
        }

        self.components.insert(id, Arc::clone(&component));
        self.dirty.insert(id, SyncOp::Set(component));
        self
    }

    pub fn get<C: Component>(&self) -> Option<Arc<C>> {
        self.components.get(&C::id()).and_then(downcast::<C>)
    }

    pub fn has<C: Component>(&self) -> bool {
        self.components.contains_key(&C::id())
    }

    pub fn has_component(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    /// Remove a component from the snapshot; nothing happens if it is absent
    pub fn remove<C: Component>(&mut self) -> &mut Self {
        self.remove_component(C::id())
    }

    pub fn remove_component(&mut self, id: ComponentId) -> &mut Self {
        if self.components.remove(&id).is_some() {
            self.dirty.insert(id, SyncOp::Remove);
        }
        self
    }

    /// Number of component types changed since detach or the last sync
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Hand the recorded changes to `executor` and forget them
    ///
    /// The dirty set is cleared before this returns, so the snapshot can be
    /// dropped or reused right away. Nothing is scheduled when it was empty.
    pub fn sync(&mut self, executor: &(impl SyncExecutor + ?Sized)) {
        if self.dirty.is_empty() {
            return;
        }

        let batch = SyncBatch {
            target: self.source,
            ops: self.dirty.drain().collect(),
        };
        executor.schedule(batch);
    }
}

impl fmt::Debug for DetachedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachedEntity")
            .field("source", &self.source)
            .field("components", &self.components.len())
            .field("dirty", &self.dirty.len())
            .finish()
    }
}

// =============================================================================
// EXECUTORS
// =============================================================================

/// Cloneable FIFO queue of sync batches
///
/// Any thread may schedule; the thread owning the context drains it with
/// [`SyncQueue::run_pending`].
#[derive(Clone, Default)]
pub struct SyncQueue {
    batches: Arc<Mutex<VecDeque<SyncBatch>>>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every queued batch in FIFO order
    pub fn take_pending(&self) -> Vec<SyncBatch> {
        self.lock().drain(..).collect()
    }

    /// Replay every queued batch onto `context`, returning how many ran
    pub fn run_pending(&self, context: &crate::Context) -> usize {
        let batches = self.take_pending();
        let count = batches.len();
        for batch in batches {
            context.apply_sync(batch);
        }
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<SyncBatch>> {
        // A panic while holding the lock cannot leave the deque half-updated
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SyncExecutor for SyncQueue {
    fn schedule(&self, batch: SyncBatch) {
        self.lock().push_back(batch);
    }
}

impl SyncExecutor for std::sync::mpsc::Sender<SyncBatch> {
    fn schedule(&self, batch: SyncBatch) {
        if self.send(batch).is_err() {
            tracing::debug!("sync receiver dropped, batch discarded");
        }
    }
}

#[cfg(feature = "tokio")]
impl SyncExecutor for tokio::sync::mpsc::UnboundedSender<SyncBatch> {
    fn schedule(&self, batch: SyncBatch) {
        if self.send(batch).is_err() {
            tracing::debug!("sync receiver dropped, batch discarded");
        }
    }
}
