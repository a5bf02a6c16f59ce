//! Contract violations
//!
//! A contract violation is never returned to the caller. It is reported to a
//! [`ViolationHandler`] before the operation completes, and the operation then
//! proceeds deterministically: an illegal overwrite still overwrites, a
//! non-unique query still returns the first entity by creation order.

use crate::component::ComponentId;
use crate::matcher::Matcher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A broken usage contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// A component type was set again without asking for an overwrite
    #[error("Illegal overwrite of component {component} on entity {entity}")]
    IllegalOverwrite {
        entity: usize,
        component: ComponentId,
    },

    /// A query expected at most one entity but found more
    #[error("Found {count} entities for unique matcher {matcher}")]
    NotUnique { matcher: Matcher, count: usize },
}

/// Receives contract violations
pub trait ViolationHandler: Send + Sync {
    fn handle(&self, violation: &ContractViolation);
}

impl<F> ViolationHandler for F
where
    F: Fn(&ContractViolation) + Send + Sync,
{
    fn handle(&self, violation: &ContractViolation) {
        self(violation)
    }
}

/// Shared violation handler
pub type SharedViolationHandler = Arc<dyn ViolationHandler>;

/// Halts on the first violation
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicOnViolation;

impl ViolationHandler for PanicOnViolation {
    fn handle(&self, violation: &ContractViolation) {
        panic!("{violation}");
    }
}

/// Reports violations as `tracing` errors
#[derive(Debug, Default, Clone, Copy)]
pub struct LogViolation;

impl ViolationHandler for LogViolation {
    fn handle(&self, violation: &ContractViolation) {
        tracing::error!("{violation}");
    }
}

/// Counts violations
#[derive(Debug, Default)]
pub struct CountViolations {
    count: AtomicUsize,
}

impl CountViolations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ViolationHandler for CountViolations {
    fn handle(&self, _violation: &ContractViolation) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handler used when none is configured
///
/// Traps in builds with debug assertions, logs otherwise.
pub fn default_handler() -> SharedViolationHandler {
    if cfg!(debug_assertions) {
        Arc::new(PanicOnViolation)
    } else {
        Arc::new(LogViolation)
    }
}
