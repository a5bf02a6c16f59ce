//! Matcher predicate algebra
//!
//! A [`Matcher`] is an immutable predicate over the set of component types an
//! entity currently has. It is also the cache key for groups, so two matchers
//! built from the same id sets in any order are equal and hash the same.
//!
//! The canonical form has three clauses, each vacuously satisfied when empty:
//!
//! - `all_of`: the entity has every listed component
//! - `any_of`: the entity has at least one listed component
//! - `none_of`: the entity has none of the listed components
//!
//! `Matcher::all` and `Matcher::any` are the two-clause special cases.
//!
//! ```rust
//! use strata_core::{Component, Matcher};
//!
//! #[derive(Debug)] struct Name;
//! #[derive(Debug)] struct Age;
//! impl Component for Name {}
//! impl Component for Age {}
//!
//! let a = Matcher::all([Name::id(), Age::id()]);
//! let b = Matcher::all([Age::id(), Name::id()]);
//! assert_eq!(a, b);
//! ```

use crate::component::ComponentId;
use crate::entity::Entity;
use smallvec::SmallVec;
use std::fmt;

/// Sorted, deduplicated set of component ids
pub type ComponentIds = SmallVec<[ComponentId; 4]>;

/// Shape of a matcher, for introspection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatcherKind {
    /// Only `all_of` is constrained
    All,
    /// Only `any_of` is constrained
    Any,
    /// `none_of` or more than one clause is constrained
    Composite,
}

/// Immutable predicate over component ids, used as the group cache key
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Matcher {
    all_of: ComponentIds,
    any_of: ComponentIds,
    none_of: ComponentIds,
}

fn normalize(ids: impl IntoIterator<Item = ComponentId>) -> ComponentIds {
    let mut ids: ComponentIds = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

impl Matcher {
    /// Matches entities having every listed component
    pub fn all(ids: impl IntoIterator<Item = ComponentId>) -> Self {
        Self::all_of(ids)
    }

    /// Matches entities having at least one listed component
    pub fn any(ids: impl IntoIterator<Item = ComponentId>) -> Self {
        Self {
            any_of: normalize(ids),
            ..Self::default()
        }
    }

    /// Start a composite matcher with its `all_of` clause
    pub fn all_of(ids: impl IntoIterator<Item = ComponentId>) -> Self {
        Self {
            all_of: normalize(ids),
            ..Self::default()
        }
    }

    /// Replace the `any_of` clause
    pub fn any_of(mut self, ids: impl IntoIterator<Item = ComponentId>) -> Self {
        self.any_of = normalize(ids);
        self
    }

    /// Replace the `none_of` clause
    pub fn none_of(mut self, ids: impl IntoIterator<Item = ComponentId>) -> Self {
        self.none_of = normalize(ids);
        self
    }

    pub fn all_ids(&self) -> &[ComponentId] {
        &self.all_of
    }

    pub fn any_ids(&self) -> &[ComponentId] {
        &self.any_of
    }

    pub fn none_ids(&self) -> &[ComponentId] {
        &self.none_of
    }

    /// Every id referenced by any clause, sorted, without duplicates
    pub fn component_ids(&self) -> ComponentIds {
        normalize(
            self.all_of
                .iter()
                .chain(self.any_of.iter())
                .chain(self.none_of.iter())
                .copied(),
        )
    }

    pub fn kind(&self) -> MatcherKind {
        match (
            self.all_of.is_empty(),
            self.any_of.is_empty(),
            self.none_of.is_empty(),
        ) {
            (_, true, true) => MatcherKind::All,
            (true, false, true) => MatcherKind::Any,
            _ => MatcherKind::Composite,
        }
    }

    /// True when the matcher only constrains `any_of`
    ///
    /// For such matchers the presence of one listed id is sufficient.
    pub(crate) fn is_pure_any(&self) -> bool {
        self.all_of.is_empty() && self.none_of.is_empty() && !self.any_of.is_empty()
    }

    /// True when an entity without components satisfies the matcher
    pub fn matches_empty(&self) -> bool {
        self.all_of.is_empty() && self.any_of.is_empty()
    }

    /// Evaluate the predicate against an entity's current components
    pub fn matches(&self, entity: &Entity) -> bool {
        self.matches_with(|id| entity.has_component(id))
    }

    /// Evaluate the predicate against an arbitrary presence test
    pub fn matches_with(&self, has: impl Fn(ComponentId) -> bool) -> bool {
        let all = self.all_of.iter().all(|&id| has(id));
        let any = self.any_of.is_empty() || self.any_of.iter().any(|&id| has(id));
        let none = !self.none_of.iter().any(|&id| has(id));
        all && any && none
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            MatcherKind::All => write!(f, "All({:?})", self.all_of.as_slice()),
            MatcherKind::Any => write!(f, "Any({:?})", self.any_of.as_slice()),
            MatcherKind::Composite => write!(
                f,
                "AllOf({:?}).AnyOf({:?}).NoneOf({:?})",
                self.all_of.as_slice(),
                self.any_of.as_slice(),
                self.none_of.as_slice()
            ),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
