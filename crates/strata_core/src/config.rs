//! Context configuration

use crate::violation::{default_handler, SharedViolationHandler, ViolationHandler};
use std::fmt;
use std::sync::Arc;

/// Settings for a [`Context`](crate::Context)
///
/// ```rust
/// use std::sync::Arc;
/// use strata_core::{Context, ContextConfig, LogViolation};
///
/// let context = Context::with_config(
///     ContextConfig::default()
///         .with_name("game")
///         .with_violation_handler(LogViolation)
///         .with_entity_capacity(1024),
/// );
/// assert_eq!(context.name(), Some("game"));
/// ```
#[derive(Clone)]
pub struct ContextConfig {
    /// Optional name for debugging
    pub name: Option<String>,
    /// Receives illegal overwrites and multiplicity violations
    pub violation_handler: SharedViolationHandler,
    /// Number of entities to preallocate room for
    pub entity_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            name: None,
            violation_handler: default_handler(),
            entity_capacity: 0,
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_violation_handler(mut self, handler: impl ViolationHandler + 'static) -> Self {
        self.violation_handler = Arc::new(handler);
        self
    }

    /// Share one handler between several contexts
    pub fn with_shared_violation_handler(mut self, handler: SharedViolationHandler) -> Self {
        self.violation_handler = handler;
        self
    }

    pub fn with_entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextConfig")
            .field("name", &self.name)
            .field("entity_capacity", &self.entity_capacity)
            .finish_non_exhaustive()
    }
}
