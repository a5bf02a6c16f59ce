//! Strata Debug
//!
//! Lifecycle and timing logs for a strata [`Context`]. [`DebugHooks`] plugs
//! into the context's hook points and reports:
//!
//! - entity creation with its offset from context start
//! - entity destruction with the entity's age
//! - component additions and removals (minus an ignore list)
//! - named system runs that changed state, with their duration
//!
//! Lines are emitted through `tracing` under the `strata::debug` target and,
//! optionally, handed to a printer closure.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use strata_core::Component;
//! use strata_debug::{DebugConfig, DebugContext};
//!
//! #[derive(Debug)]
//! struct Health(u32);
//! impl Component for Health {}
//!
//! let lines = Rc::new(RefCell::new(Vec::new()));
//! let sink = lines.clone();
//! let context = DebugContext::new(
//!     DebugConfig::default().with_printer(move |line| sink.borrow_mut().push(line.to_string())),
//! );
//!
//! context.run_system("spawn", || {
//!     context.create_entity().set(Health(10));
//! });
//!
//! assert!(lines.borrow().iter().any(|l| l.starts_with("-------- did execute spawn")));
//! ```

use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::time::{Duration, Instant};
use strata_core::{ComponentId, ComponentRef, Context, ContextConfig, ContextHooks, Entity};

/// Receives every formatted debug line
pub type Printer = Box<dyn Fn(&str)>;

/// Settings for [`DebugHooks`] and [`DebugContext`]
#[derive(Default)]
pub struct DebugConfig {
    /// Configuration of the wrapped context
    pub context: ContextConfig,
    /// Component types whose changes are not logged
    pub ignored: FxHashSet<ComponentId>,
    /// Optional sink besides `tracing`
    pub printer: Option<Printer>,
}

impl DebugConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_config(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    /// Do not log changes of these component types
    pub fn with_ignored(mut self, ids: impl IntoIterator<Item = ComponentId>) -> Self {
        self.ignored.extend(ids);
        self
    }

    pub fn with_printer(mut self, printer: impl Fn(&str) + 'static) -> Self {
        self.printer = Some(Box::new(printer));
        self
    }
}

impl fmt::Debug for DebugConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugConfig")
            .field("context", &self.context)
            .field("ignored", &self.ignored)
            .field("printer", &self.printer.is_some())
            .finish()
    }
}

// =============================================================================
// HOOKS
// =============================================================================

/// [`ContextHooks`] implementation that logs everything it sees
pub struct DebugHooks {
    started: Instant,
    creation_offsets: RefCell<FxHashMap<usize, Duration>>,
    ignored: FxHashSet<ComponentId>,
    printer: Option<Printer>,
    state_change: Cell<bool>,
}

impl DebugHooks {
    pub fn new(ignored: FxHashSet<ComponentId>, printer: Option<Printer>) -> Self {
        Self {
            started: Instant::now(),
            creation_offsets: RefCell::new(FxHashMap::default()),
            ignored,
            printer,
            state_change: Cell::new(false),
        }
    }

    /// Time since these hooks were created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether something changed since the last system run
    pub fn state_changed(&self) -> bool {
        self.state_change.get()
    }

    fn emit(&self, line: &str) {
        tracing::info!(target: "strata::debug", "{line}");
        if let Some(printer) = &self.printer {
            printer(line);
        }
    }

    fn component_line(&self, verb: &str, entity: &Entity, component: &ComponentRef) {
        if self.ignored.contains(&component.component_id()) {
            return;
        }
        self.emit(&format!(
            "Entity: {} {verb} Component: {component:?}. ({:?})",
            entity.creation_index(),
            self.elapsed()
        ));
        self.state_change.set(true);
    }
}

impl ContextHooks for DebugHooks {
    fn entity_created(&self, entity: &Entity) {
        let offset = self.elapsed();
        self.creation_offsets
            .borrow_mut()
            .insert(entity.creation_index(), offset);
        self.emit(&format!(
            "Entity: {} created. ({offset:?})",
            entity.creation_index()
        ));
        self.state_change.set(true);
    }

    fn entity_destroyed(&self, entity: &Entity) {
        let now = self.elapsed();
        let created = self
            .creation_offsets
            .borrow_mut()
            .remove(&entity.creation_index())
            .unwrap_or_default();
        self.emit(&format!(
            "Entity: {} destroyed. Age: {:?} ({now:?})",
            entity.creation_index(),
            now.saturating_sub(created)
        ));
        self.state_change.set(true);
    }

    fn component_added(&self, entity: &Entity, component: &ComponentRef) {
        self.component_line("added", entity, component);
    }

    fn component_removed(&self, entity: &Entity, component: &ComponentRef) {
        self.component_line("removed", entity, component);
    }

    fn run_system(&self, name: &str, system: &mut dyn FnMut()) {
        if self.state_change.replace(false) {
            self.emit("-------- Changes were applied outside system loop");
        }

        let start = Instant::now();
        system();

        if self.state_change.replace(false) {
            let millis = start.elapsed().as_secs_f64() * 1000.0;
            self.emit(&format!("-------- did execute {name} : in {millis:.3}ms"));
        }
    }
}

impl fmt::Debug for DebugHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugHooks")
            .field("elapsed", &self.elapsed())
            .field("tracked_entities", &self.creation_offsets.borrow().len())
            .field("ignored", &self.ignored)
            .field("state_change", &self.state_change.get())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// DEBUG CONTEXT
// =============================================================================

/// A [`Context`] with [`DebugHooks`] installed
///
/// Derefs to the wrapped context, so it is used exactly like one.
pub struct DebugContext {
    context: Context,
    hooks: Rc<DebugHooks>,
}

impl DebugContext {
    pub fn new(config: DebugConfig) -> Self {
        let context = Context::with_config(config.context);
        let hooks = Rc::new(DebugHooks::new(config.ignored, config.printer));
        context.set_hooks(hooks.clone());
        tracing::debug!(target: "strata::debug", context = %context.id(), "debug hooks installed");
        Self { context, hooks }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn hooks(&self) -> &DebugHooks {
        &self.hooks
    }

    /// Remove the hooks and hand back the plain context
    pub fn into_inner(self) -> Context {
        self.context.clear_hooks();
        self.context
    }
}

impl Default for DebugContext {
    fn default() -> Self {
        Self::new(DebugConfig::default())
    }
}

impl Deref for DebugContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.context
    }
}

impl fmt::Debug for DebugContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugContext")
            .field("context", &self.context)
            .field("hooks", &self.hooks)
            .finish()
    }
}
