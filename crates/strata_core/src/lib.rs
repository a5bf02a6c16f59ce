//! Strata Core
//!
//! A reactive entity/component store. Entities carry at most one component
//! per type; groups are cached, incrementally maintained views of all
//! entities matching a predicate.
//!
//! - **Entities**: component bags that report every change to their context
//! - **Matchers**: `all_of` / `any_of` / `none_of` predicates, equal by content
//! - **Groups**: materialized views that always equal a full scan
//! - **Collectors**: pull-drained logs of group membership changes
//! - **Detached entities**: `Send` snapshots replayed through a [`SyncExecutor`]
//!
//! # Example
//!
//! ```rust
//! use strata_core::prelude::*;
//!
//! #[derive(Debug)]
//! struct Position(f32, f32);
//! #[derive(Debug)]
//! struct Velocity(f32, f32);
//!
//! impl Component for Position {}
//! impl Component for Velocity {}
//!
//! let context = Context::new();
//! let movers = context.entity_group(Matcher::all([Position::id(), Velocity::id()]));
//! let moved = Collector::new(&movers, CollectionPolicy::Added);
//!
//! let e = context.create_entity();
//! e.set(Position(0.0, 0.0)).set(Velocity(1.0, 0.5));
//!
//! for entity in moved.pull_all() {
//!     let (Some(p), Some(v)) = (entity.get::<Position>(), entity.get::<Velocity>()) else {
//!         continue;
//!     };
//!     entity.replace(Position(p.0 + v.0, p.1 + v.1));
//! }
//!
//! assert_eq!(movers.len(), 1);
//! assert_eq!(e.get::<Position>().map(|p| p.0), Some(1.0));
//! ```

pub mod collector;
pub mod component;
pub mod config;
pub mod context;
pub mod detached;
pub mod entity;
pub mod group;
pub mod hooks;
pub mod matcher;
pub mod violation;

mod unique;


pub use collector::{CollectionPolicy, Collector};
pub use component::{component_ref, AnyComponent, Component, ComponentId, ComponentRef};
pub use config::ContextConfig;
pub use context::{Context, ContextId};
pub use detached::{DetachedEntity, SyncBatch, SyncExecutor, SyncOp, SyncQueue};
pub use entity::{Entity, EntityListener, EntityRef};
pub use group::{Group, GroupObserver, ObserverHandle};
pub use hooks::ContextHooks;
pub use matcher::{ComponentIds, Matcher, MatcherKind};
pub use violation::{
    default_handler, ContractViolation, CountViolations, LogViolation, PanicOnViolation,
    SharedViolationHandler, ViolationHandler,
};

/// Common imports for application code
pub mod prelude {
    pub use crate::collector::{CollectionPolicy, Collector};
    pub use crate::component::{Component, ComponentId};
    pub use crate::context::Context;
    pub use crate::detached::{DetachedEntity, SyncExecutor, SyncQueue};
    pub use crate::entity::Entity;
    pub use crate::group::{Group, GroupObserver};
    pub use crate::matcher::Matcher;
}
