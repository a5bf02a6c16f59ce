//! Extension points for diagnostic layers
//!
//! A [`ContextHooks`] implementation is told about entity lifecycle and
//! component changes after the context has finished routing them, and can
//! wrap named system runs. Every method has a no-op default, and a context
//! without hooks behaves identically.

use crate::component::ComponentRef;
use crate::entity::Entity;

/// Overridable hook points of a [`Context`](crate::Context)
pub trait ContextHooks {
    fn entity_created(&self, _entity: &Entity) {}

    /// Called after the entity left the context and lost its components
    fn entity_destroyed(&self, _entity: &Entity) {}

    fn component_added(&self, _entity: &Entity, _component: &ComponentRef) {}

    fn component_removed(&self, _entity: &Entity, _component: &ComponentRef) {}

    /// Wrap the execution of a named system
    ///
    /// Implementations must call `system` exactly once.
    fn run_system(&self, _name: &str, system: &mut dyn FnMut()) {
        system();
    }
}
