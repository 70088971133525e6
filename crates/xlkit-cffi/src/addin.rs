//! Running lifecycle events: hooks, bodies and fault reporting.

use std::any::Any;
use std::ffi::c_int;
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::OnceCell;
use tracing::{error, trace};
use xlkit_common::{AnyValue, ExcelError, Int, Value, XlOper, XlString, XllError, into_host};

use crate::free::free_record;
use crate::host::{AlertKind, Host};
use crate::registry::{Context, Event, HookError, Phase, Registry};

/// Status returned to the host for a handled event.
pub const XLL_SUCCESS: c_int = 1;
/// Status returned to the host when an event failed.
pub const XLL_FAILURE: c_int = 0;

/// An add-in: a host connection plus the registry its setup builds.
///
/// The setup function runs exactly once, on the first lifecycle event.
pub struct AddIn<H: Host> {
    host: H,
    setup: fn(&mut Registry),
    registry: OnceCell<Registry>,
}

impl<H: Host> AddIn<H> {
    pub fn new(host: H, setup: fn(&mut Registry)) -> Self {
        Self {
            host,
            setup,
            registry: OnceCell::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn registry(&self) -> &Registry {
        self.registry.get_or_init(|| {
            let mut registry = Registry::new();
            (self.setup)(&mut registry);
            trace!(functions = registry.functions().len(), "add-in set up");
            registry
        })
    }

    /// `xlAutoOpen`: run the Open hooks around function registration.
    pub fn open(&self) -> c_int {
        self.run(Event::Open, |cx| cx.registry.register_with(cx.host))
    }

    pub fn close(&self) -> c_int {
        self.run(Event::Close, |_| Ok(()))
    }

    pub fn add(&self) -> c_int {
        self.run(Event::Add, |_| Ok(()))
    }

    pub fn remove(&self) -> c_int {
        self.run(Event::Remove, |_| Ok(()))
    }

    /// `xlAutoFree12`: run the Free hooks around releasing `px`.
    ///
    /// # Safety
    /// See [`free_record`].
    pub unsafe fn free(&self, px: *mut XlOper) {
        self.run(Event::Free, |_| {
            // SAFETY: forwarded contract.
            unsafe { free_record(px) };
            Ok(())
        });
    }

    /// `xlAddInManagerInfo12`: the display name for action 1, `#N/A`
    /// otherwise. Faults are alerted and also answer `#N/A`.
    pub fn manager_info(&self, action: &XlOper) -> AnyValue {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<AnyValue, XllError> {
            if Int::from_oper(action)?.value() == 1 {
                Ok(AnyValue::new(XlString::new(self.registry().display_name())?))
            } else {
                Ok(AnyValue::new(ExcelError::NA))
            }
        }));
        match outcome {
            Ok(Ok(info)) => info,
            Ok(Err(fault)) => {
                self.alert_fault("xlAddInManagerInfo12", &fault.to_string());
                AnyValue::new(ExcelError::NA)
            }
            Err(payload) => {
                self.alert_fault("xlAddInManagerInfo12", &panic_message(payload.as_ref()));
                AnyValue::new(ExcelError::NA)
            }
        }
    }

    /// [`AddIn::manager_info`] for a raw host pointer, boxed for the host.
    ///
    /// # Safety
    /// `action` must be null or point to a valid record.
    pub unsafe fn manager_info_raw(&self, action: *const XlOper) -> *mut XlOper {
        // SAFETY: checked for null; validity is the caller's contract.
        let info = match unsafe { action.as_ref() } {
            Some(action) => self.manager_info(action),
            None => AnyValue::new(ExcelError::NA),
        };
        into_host(info)
    }

    /// Before hooks, body, after hooks; the first fault skips the rest and
    /// is reported.
    pub fn run<F>(&self, event: Event, body: F) -> c_int
    where
        F: FnOnce(&Context<'_>) -> Result<(), XllError>,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.phases(event, body)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(XllError::UnknownLifecycleFault {
                event: event.entry_point(),
                message: panic_message(payload.as_ref()),
            }),
        };
        match result {
            Ok(()) => XLL_SUCCESS,
            Err(fault) => {
                self.report(event, &fault);
                XLL_FAILURE
            }
        }
    }

    fn phases<F>(&self, event: Event, body: F) -> Result<(), XllError>
    where
        F: FnOnce(&Context<'_>) -> Result<(), XllError>,
    {
        let registry = self.registry();
        let cx = Context {
            event,
            registry,
            host: &self.host,
        };
        let hooks = registry.hooks(event);
        let hook_fault = |phase: Phase, e: HookError| {
            let message = e.to_string();
            XllError::UnknownLifecycleFault {
                event: event.entry_point(),
                message: if message.is_empty() {
                    format!("{phase} hook failed")
                } else {
                    message
                },
            }
        };

        trace!(%event, phase = %Phase::Before, "lifecycle");
        for hook in &hooks.before {
            hook(&cx).map_err(|e| hook_fault(Phase::Before, e))?;
        }
        trace!(%event, phase = %Phase::Body, "lifecycle");
        body(&cx)?;
        trace!(%event, phase = %Phase::After, "lifecycle");
        for hook in &hooks.after {
            hook(&cx).map_err(|e| hook_fault(Phase::After, e))?;
        }
        Ok(())
    }

    /// Route a fault to the event's error handlers, or alert the user once
    /// when there are none.
    fn report(&self, event: Event, fault: &XllError) {
        let message = fault.to_string();
        error!(%event, error = %fault, "lifecycle fault");
        let handled = panic::catch_unwind(AssertUnwindSafe(|| {
            let Some(registry) = self.registry.get() else {
                return false;
            };
            let handlers = &registry.hooks(event).on_error;
            for handler in handlers {
                handler(&message);
            }
            !handlers.is_empty()
        }));
        if !matches!(handled, Ok(true)) {
            self.alert_fault(event.entry_point(), &message);
        }
    }

    fn alert_fault(&self, origin: &str, message: &str) {
        let text = format!("{origin}: {message}");
        let _ = panic::catch_unwind(AssertUnwindSafe(|| self.host.alert(&text, AlertKind::Error)));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Run a worksheet function body and box its result for the host.
///
/// Faults and panics never cross into the host: they are logged and the
/// cell receives `#VALUE!`.
pub fn host_result<T, F>(body: F) -> *mut XlOper
where
    T: Value,
    F: FnOnce() -> Result<T, XllError>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => into_host(value),
        Ok(Err(fault)) => {
            error!(error = %fault, "worksheet function fault");
            into_host(ExcelError::VALUE)
        }
        Err(payload) => {
            error!(panic = %panic_message(payload.as_ref()), "worksheet function panicked");
            into_host(ExcelError::VALUE)
        }
    }
}
