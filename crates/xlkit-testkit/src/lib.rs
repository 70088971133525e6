//! Host doubles for driving add-ins in tests.

use parking_lot::Mutex;
use xlkit_cffi::{AlertKind, Host, RegisterResult};
use xlkit_common::{AnyValue, ExcelError, Number, ValueRef, XlString, XllError};

/// One `REGISTER` call as the host received it, every argument rendered as
/// text. Nil arguments render as `<nil>`.
pub type RegisterCall = Vec<String>;

/// A [`Host`] that records what the add-in asks of it.
///
/// Registration succeeds with increasing ids unless the function name was
/// passed to [`RecordingHost::reject`].
pub struct RecordingHost {
    module: String,
    rejected: Vec<String>,
    registered: Mutex<Vec<RegisterCall>>,
    alerts: Mutex<Vec<(String, AlertKind)>>,
}

impl RecordingHost {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            rejected: Vec::new(),
            registered: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
        }
    }

    /// Answer `#VALUE!` when `function` is registered.
    pub fn reject(mut self, function: impl Into<String>) -> Self {
        self.rejected.push(function.into());
        self
    }

    pub fn registered(&self) -> Vec<RegisterCall> {
        self.registered.lock().clone()
    }

    /// Registered function names (the fourth `REGISTER` argument).
    pub fn registered_names(&self) -> Vec<String> {
        self.registered
            .lock()
            .iter()
            .filter_map(|call| call.get(3).cloned())
            .collect()
    }

    pub fn alerts(&self) -> Vec<(String, AlertKind)> {
        self.alerts.lock().clone()
    }
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new("C:\\addins\\test.xll")
    }
}

pub fn render(value: &AnyValue) -> String {
    value
        .visit(|v| match v {
            ValueRef::String(s) => s.to_string_lossy(),
            ValueRef::Int(i) => i.value().to_string(),
            ValueRef::Number(n) => n.value().to_string(),
            ValueRef::Bool(b) => b.value().to_string(),
            ValueRef::Error(e) => e.to_string(),
            ValueRef::Nil => "<nil>".to_owned(),
        })
        .unwrap_or_else(|e| format!("<{e}>"))
}

impl Host for RecordingHost {
    fn module_path(&self) -> Result<XlString, XllError> {
        XlString::new(&self.module)
    }

    fn register(&self, args: &[AnyValue]) -> Result<RegisterResult, XllError> {
        let call: RegisterCall = args.iter().map(render).collect();
        let rejected = call
            .get(3)
            .is_some_and(|name| self.rejected.iter().any(|r| r == name));
        let mut registered = self.registered.lock();
        if rejected {
            return Ok(RegisterResult::new(ExcelError::VALUE));
        }
        registered.push(call);
        Ok(RegisterResult::new(Number::new(registered.len() as f64)))
    }

    fn alert(&self, message: &str, kind: AlertKind) {
        self.alerts.lock().push((message.to_owned(), kind));
    }
}
