//! Singleton-style access on top of groups
//!
//! Some components are meant to exist on at most one entity per context (the
//! current score, the player, a configuration record). These helpers look
//! them up through the cached group of their matcher and report a
//! [`ContractViolation::NotUnique`] when more than one entity qualifies.

use crate::component::{component_ref, Component};
use crate::context::Context;
use crate::entity::Entity;
use crate::matcher::Matcher;
use crate::violation::ContractViolation;
use std::sync::Arc;

impl Context {
    /// The single entity matching `matcher`
    ///
    /// With several candidates the violation handler is invoked and the one
    /// with the lowest creation index is returned.
    pub fn unique_entity(&self, matcher: Matcher) -> Option<Entity> {
        let group = self.entity_group(matcher);
        let entities = group.sorted_entities();
        if entities.len() > 1 {
            self.report(ContractViolation::NotUnique {
                matcher: group.matcher().clone(),
                count: entities.len(),
            });
        }
        entities.first().cloned()
    }

    pub fn unique_component<C: Component>(&self) -> Option<Arc<C>> {
        self.unique_entity(C::matcher())?.get::<C>()
    }

    pub fn has_unique_component<C: Component>(&self) -> bool {
        self.unique_component::<C>().is_some()
    }

    /// Overwrite the component on its unique entity, or create that entity
    pub fn set_unique_component<C: Component>(&self, component: C) -> Entity {
        match self.unique_entity(C::matcher()) {
            Some(entity) => {
                entity.set_component(component_ref(component), true);
                entity
            }
            None => {
                let entity = self.create_entity();
                entity.set(component);
                entity
            }
        }
    }

    /// Destroy the unique entity for `matcher`, if there is one
    pub fn destroy_unique_entity(&self, matcher: Matcher) {
        if let Some(entity) = self.unique_entity(matcher) {
            self.destroy_entity(&entity);
        }
    }
}
