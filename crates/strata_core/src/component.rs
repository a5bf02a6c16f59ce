//! Component identity and type-erased component values
//!
//! A component is an immutable value attached to an entity, at most one per
//! type. Identity comes from the Rust type, never from the value:
//!
//! ```rust
//! use strata_core::{Component, ComponentId};
//!
//! #[derive(Debug)]
//! struct Name(String);
//!
//! impl Component for Name {}
//!
//! assert_eq!(Name::id(), ComponentId::of::<Name>());
//! ```

use crate::matcher::Matcher;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Process-wide identifier of a component type
///
/// Equality, ordering and hashing only look at the `TypeId`; the type name is
/// carried along for diagnostics.
#[derive(Clone, Copy)]
pub struct ComponentId {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentId {
    /// Identifier for the component type `C`
    pub fn of<C: Component>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        }
    }

    /// Full type name of the component
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Type name without the module path
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for ComponentId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentId {}

impl Hash for ComponentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for ComponentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_id.cmp(&other.type_id)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Trait for all components
///
/// Components are plain immutable values. They must be `Send + Sync` so a
/// [`DetachedEntity`](crate::DetachedEntity) snapshot can cross threads.
///
/// # Example
///
/// ```rust
/// use strata_core::{Component, Context};
///
/// #[derive(Debug)]
/// struct Age(u32);
///
/// impl Component for Age {}
///
/// let context = Context::new();
/// let entity = context.create_entity();
/// entity.set(Age(33));
/// assert_eq!(entity.get::<Age>().map(|a| a.0), Some(33));
/// ```
pub trait Component: fmt::Debug + Send + Sync + 'static {
    /// Identifier of this component type
    fn id() -> ComponentId
    where
        Self: Sized,
    {
        ComponentId::of::<Self>()
    }

    /// Matcher selecting every entity that has this component
    fn matcher() -> Matcher
    where
        Self: Sized,
    {
        Matcher::all([Self::id()])
    }
}

/// Type-erased view of a stored component
///
/// Blanket-implemented for every [`Component`]; user code never implements it.
pub trait AnyComponent: fmt::Debug + Send + Sync {
    /// Identifier of the concrete component type
    fn component_id(&self) -> ComponentId;

    /// Get as Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Convert into a shareable Any for owned downcasting
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<C: Component> AnyComponent for C {
    fn component_id(&self) -> ComponentId {
        ComponentId::of::<C>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Shared handle to a stored component value
pub type ComponentRef = Arc<dyn AnyComponent>;

/// Wrap a component value into a [`ComponentRef`]
pub fn component_ref<C: Component>(component: C) -> ComponentRef {
    Arc::new(component)
}

/// Downcast a stored component to its concrete type
pub(crate) fn downcast<C: Component>(component: &ComponentRef) -> Option<Arc<C>> {
    Arc::clone(component).into_any().downcast::<C>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[derive(Debug, PartialEq)]
    struct Position {
        x: i32,
        y: i32,
    }

    impl Component for Position {}

    #[derive(Debug)]
    struct Flag;

    impl Component for Flag {}

    #[test]
    fn test_id_depends_on_type_only() {
        let a = component_ref(Position { x: 1, y: 2 });
        let b = component_ref(Position { x: 9, y: 9 });

        assert_eq!(a.component_id(), b.component_id());
        assert_eq!(a.component_id(), Position::id());
        assert_ne!(Position::id(), Flag::id());
    }

    #[test]
    fn test_id_hashing() {
        let mut ids = FxHashSet::default();
        ids.insert(Position::id());
        ids.insert(ComponentId::of::<Position>());
        ids.insert(Flag::id());
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_downcast() {
        let stored = component_ref(Position { x: 3, y: 4 });

        let position = downcast::<Position>(&stored).unwrap();
        assert_eq!(*position, Position { x: 3, y: 4 });
        assert!(downcast::<Flag>(&stored).is_none());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(Position::id().short_name(), "Position");
        assert_eq!(format!("{:?}", Flag::id()), "Flag");
    }
}
