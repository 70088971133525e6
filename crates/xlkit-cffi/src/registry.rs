//! Function descriptors and lifecycle hooks collected by an add-in's setup.

use std::cell::Cell;
use std::error::Error;
use std::fmt;

use parking_lot::ReentrantMutex;
use tracing::debug;
use xlkit_common::{Number, XllError};

use crate::function::{Function, FunctionDescriptor};
use crate::host::Host;

/// Host-driven lifecycle events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    Open,
    Close,
    Add,
    Remove,
    Free,
}

impl Event {
    pub const ALL: [Event; 5] = [Event::Open, Event::Close, Event::Add, Event::Remove, Event::Free];

    /// Name of the exported entry point that raises this event.
    pub fn entry_point(self) -> &'static str {
        match self {
            Event::Open => "xlAutoOpen",
            Event::Close => "xlAutoClose",
            Event::Add => "xlAutoAdd",
            Event::Remove => "xlAutoRemove",
            Event::Free => "xlAutoFree12",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

/// Stage of a lifecycle invocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Before,
    Body,
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Before => "before",
            Phase::Body => "body",
            Phase::After => "after",
        })
    }
}

pub type HookError = Box<dyn Error + Send + Sync>;
pub type Hook = Box<dyn Fn(&Context<'_>) -> Result<(), HookError> + Send + Sync>;
pub type ErrorHandler = Box<dyn Fn(&str) + Send + Sync>;

/// What a hook sees while it runs.
pub struct Context<'a> {
    pub event: Event,
    pub registry: &'a Registry,
    pub host: &'a dyn Host,
}

#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) before: Vec<Hook>,
    pub(crate) after: Vec<Hook>,
    pub(crate) on_error: Vec<ErrorHandler>,
}

/// Adds hooks for one event.
pub struct HookSet<'a> {
    hooks: &'a mut Hooks,
}

impl HookSet<'_> {
    pub fn before<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Context<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.before.push(Box::new(hook));
        self
    }

    pub fn after<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Context<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.after.push(Box::new(hook));
        self
    }

    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hooks.on_error.push(Box::new(handler));
        self
    }
}

/// The add-in's declared functions and hooks.
///
/// Populated once by the setup function and read-only afterwards.
pub struct Registry {
    name: String,
    functions: Vec<FunctionDescriptor>,
    hooks: [Hooks; 5],
    announcing: ReentrantMutex<Cell<bool>>,
}

/// Clears the in-progress flag even when the host panics mid-registration.
struct Announcing<'a>(&'a Cell<bool>);

impl Drop for Announcing<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Registry {
    pub const DEFAULT_NAME: &'static str = "NONAME";

    pub fn new() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_owned(),
            functions: Vec::new(),
            hooks: Default::default(),
            announcing: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// Set the name shown in the host's add-in manager.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn register(&mut self, function: impl Into<FunctionDescriptor>) -> &mut Self {
        self.functions.push(function.into());
        self
    }

    /// Declared functions, in registration order.
    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    pub fn on(&mut self, event: Event) -> HookSet<'_> {
        HookSet {
            hooks: &mut self.hooks[event.index()],
        }
    }

    pub(crate) fn hooks(&self, event: Event) -> &Hooks {
        &self.hooks[event.index()]
    }

    pub fn has_error_handlers(&self, event: Event) -> bool {
        !self.hooks(event).on_error.is_empty()
    }

    /// Announce every declared function to the host, in order. Stops at the
    /// first rejection. Callers on other threads wait for a running
    /// registration to finish; a re-entrant call from the registering
    /// thread is a no-op.
    pub fn register_with(&self, host: &dyn Host) -> Result<(), XllError> {
        let in_progress = self.announcing.lock();
        if in_progress.replace(true) {
            debug!("registration already in progress");
            return Ok(());
        }
        let _announcing = Announcing(&in_progress);
        let module = host.module_path()?;
        for descriptor in &self.functions {
            let args = descriptor.register_arguments(&module)?;
            let answer = host.register(&args)?;
            if !answer.holds::<Number, _>() {
                return Err(XllError::RegistrationFailure {
                    function: descriptor.name.clone(),
                });
            }
            debug!(
                function = %descriptor.name,
                procedure = descriptor.procedure(),
                signature = %descriptor.signature(),
                "registered function"
            );
        }
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("functions", &self.functions.len())
            .finish_non_exhaustive()
    }
}

/// Shorthand used by setup functions: `registry.register(function(..))`.
pub fn function(name: impl Into<String>) -> Function {
    Function::new(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{AlertKind, RegisterResult};
    use parking_lot::Mutex;
    use xlkit_common::{AnyValue, XlString};

    #[test]
    fn defaults() {
        let r = Registry::new();
        assert_eq!(r.display_name(), "NONAME");
        assert!(r.functions().is_empty());
        for event in Event::ALL {
            assert!(!r.has_error_handlers(event));
        }
    }

    #[test]
    fn functions_keep_insertion_order() {
        let mut r = Registry::new();
        r.name("Demo")
            .register(function("B.SECOND"))
            .register(Function::new("A.FIRST").build());
        let names: Vec<_> = r.functions().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["B.SECOND", "A.FIRST"]);
        assert_eq!(r.display_name(), "Demo");
    }

    #[test]
    fn hooks_are_grouped_per_event() {
        let mut r = Registry::new();
        r.on(Event::Open).before(|_| Ok(())).after(|_| Ok(())).on_error(|_| {});
        r.on(Event::Close).before(|_| Ok(()));
        assert_eq!(r.hooks(Event::Open).before.len(), 1);
        assert_eq!(r.hooks(Event::Open).after.len(), 1);
        assert!(r.has_error_handlers(Event::Open));
        assert!(!r.has_error_handlers(Event::Close));
        assert_eq!(r.hooks(Event::Close).before.len(), 1);
        assert!(r.hooks(Event::Free).before.is_empty());
    }

    struct NestedHost<'a> {
        registry: &'a Registry,
        nested: Mutex<Vec<Result<(), String>>>,
    }

    impl Host for NestedHost<'_> {
        fn module_path(&self) -> Result<XlString, XllError> {
            XlString::new("nested.xll")
        }

        fn register(&self, _: &[AnyValue]) -> Result<RegisterResult, XllError> {
            let inner = self.registry.register_with(self).map_err(|e| e.to_string());
            self.nested.lock().push(inner);
            Ok(RegisterResult::new(Number::new(1.0)))
        }

        fn alert(&self, _: &str, _: AlertKind) {}
    }

    #[test]
    fn reentrant_registration_is_a_no_op() {
        let mut r = Registry::new();
        r.register(function("ONE")).register(function("TWO"));
        let host = NestedHost {
            registry: &r,
            nested: Mutex::new(Vec::new()),
        };
        r.register_with(&host).unwrap();
        assert_eq!(*host.nested.lock(), [Ok(()), Ok(())]);
        // The flag is cleared afterwards.
        r.register_with(&host).unwrap();
        assert_eq!(host.nested.lock().len(), 4);
    }

    #[test]
    fn event_names() {
        assert_eq!(Event::Open.to_string(), "xlAutoOpen");
        assert_eq!(Event::Free.entry_point(), "xlAutoFree12");
        assert_eq!(Phase::After.to_string(), "after");
    }
}
