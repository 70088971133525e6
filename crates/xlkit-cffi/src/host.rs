//! The host application as seen from the add-in.

use std::ffi::c_int;
use std::ptr;

use parking_lot::RwLock;
use tracing::{trace, warn};
use xlkit_common::{
    AnyValue, Array, Bool, ExcelError, Int, Nil, Number, Overlay, Value, Variant, XlOper,
    XlString, XllError,
};

/// Host callback number for `REGISTER`.
pub const XLF_REGISTER: c_int = 149;
/// Host callback number for `GET.WORKSPACE`.
pub const XLF_GET_WORKSPACE: c_int = 186;
/// Host callback number for `xlFree`.
pub const XL_FREE: c_int = 0x4000;
/// Host callback number for `xlGetName`.
pub const XL_GET_NAME: c_int = 0x4009;
/// Host callback number for the `ALERT` command.
pub const XLC_ALERT: c_int = 0x8076;

/// Host return code for a successful callback.
pub const XLRET_SUCCESS: c_int = 0;

/// Signature of the host's `MdCallBack12` entry point.
pub type Excel12Proc = unsafe extern "system" fn(
    xlfn: c_int,
    count: c_int,
    opers: *mut *mut XlOper,
    result: *mut XlOper,
) -> c_int;

/// What the host answers to a registration request: the registration id,
/// an error, or nothing.
pub type RegisterResult = Variant<(Nil, Number, ExcelError)>;

/// Items `GET.WORKSPACE` can report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Workspace {
    EnvironmentName = 1,
    ExcelVersion = 2,
    DecimalCount = 3,
    R1C1Mode = 4,
    ScrollBarsVisible = 5,
    LocaleData = 37,
}

/// A `GET.WORKSPACE` answer: a bare value for most items, a row of settings
/// for [`Workspace::LocaleData`].
pub type WorkspaceInfo = Array<Variant<(Nil, XlString, Number, Bool)>>;

/// Icon and buttons of a host alert dialog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AlertKind {
    None = 0,
    Question = 1,
    Information = 2,
    Error = 3,
}

/// Services the add-in needs from the host.
pub trait Host: Send + Sync {
    /// Full path of the loaded add-in module.
    fn module_path(&self) -> Result<XlString, XllError>;

    /// Announce one function; `args` follow the `REGISTER` argument order.
    fn register(&self, args: &[AnyValue]) -> Result<RegisterResult, XllError>;

    /// Fire-and-forget notification to the user.
    fn alert(&self, message: &str, kind: AlertKind);
}

/// [`Host`] backed by the callback the host hands over in
/// `SetExcel12EntryPt`.
pub struct CallbackHost {
    entry: RwLock<Option<Excel12Proc>>,
}

impl CallbackHost {
    pub fn new() -> Self {
        Self {
            entry: RwLock::new(None),
        }
    }

    pub fn set_entry_point(&self, entry: Excel12Proc) {
        *self.entry.write() = Some(entry);
    }

    pub fn is_connected(&self) -> bool {
        self.entry.read().is_some()
    }

    /// Invoke a host function and copy its result into an owned view,
    /// releasing host-owned result memory afterwards.
    pub fn call<T: Value>(&self, xlfn: c_int, args: &[&XlOper]) -> Result<T, XllError> {
        let result = self.raw_call(xlfn, args)?;
        let value = T::from_oper(&result);
        let released = if result.has_xl_free() {
            self.raw_call(XL_FREE, &[&result]).map(drop)
        } else {
            Ok(())
        };
        if let Err(error) = released {
            warn!(%error, xlfn, "host result could not be released");
        }
        value
    }

    /// Query the host environment.
    pub fn workspace(&self, item: Workspace) -> Result<WorkspaceInfo, XllError> {
        let item = Int::new(item as i32);
        self.call(XLF_GET_WORKSPACE, &[item.as_oper()])
    }

    fn raw_call(&self, xlfn: c_int, args: &[&XlOper]) -> Result<XlOper, XllError> {
        let Some(entry) = *self.entry.read() else {
            return Err(XllError::HostCall {
                function: xlfn,
                code: -1,
            });
        };
        // The host reads its arguments through mutable pointers but never
        // writes them.
        let mut opers: Vec<*mut XlOper> = args
            .iter()
            .map(|oper| ptr::from_ref(*oper).cast_mut())
            .collect();
        let mut result = XlOper::nil();
        trace!(xlfn, count = opers.len(), "host callback");
        // SAFETY: the entry point was supplied by the host and every argument
        // pointer is valid for the duration of the call.
        let code = unsafe {
            entry(
                xlfn,
                opers.len() as c_int,
                opers.as_mut_ptr(),
                &mut result,
            )
        };
        if code != XLRET_SUCCESS {
            return Err(XllError::HostCall {
                function: xlfn,
                code,
            });
        }
        Ok(result)
    }
}

impl Default for CallbackHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for CallbackHost {
    fn module_path(&self) -> Result<XlString, XllError> {
        self.call(XL_GET_NAME, &[])
    }

    fn register(&self, args: &[AnyValue]) -> Result<RegisterResult, XllError> {
        let opers: Vec<&XlOper> = args.iter().map(Overlay::as_oper).collect();
        self.call(XLF_REGISTER, &opers)
    }

    fn alert(&self, message: &str, kind: AlertKind) {
        let sent = XlString::new(message).and_then(|text| {
            let kind = Int::new(kind as i32);
            self.call::<AnyValue>(XLC_ALERT, &[text.as_oper(), kind.as_oper()])
        });
        if let Err(error) = sent {
            warn!(%error, message, "alert could not be shown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    static SEEN: Mutex<Vec<c_int>> = Mutex::new(Vec::new());

    unsafe extern "system" fn refuses_to_free(
        xlfn: c_int,
        _count: c_int,
        _opers: *mut *mut XlOper,
        result: *mut XlOper,
    ) -> c_int {
        SEEN.lock().push(xlfn);
        if xlfn == XL_FREE {
            return 1;
        }
        let mut answer = XlOper::number(7.0);
        answer.set_xl_free();
        unsafe { *result = answer };
        XLRET_SUCCESS
    }

    type Locale = Variant<(Nil, XlString, Number, Bool)>;

    static LENT: Mutex<Option<usize>> = Mutex::new(None);

    unsafe extern "system" fn locale_host(
        xlfn: c_int,
        count: c_int,
        opers: *mut *mut XlOper,
        result: *mut XlOper,
    ) -> c_int {
        if xlfn == XL_FREE {
            if let Some(px) = LENT.lock().take() {
                // SAFETY: the only record this host lends out.
                drop(unsafe { xlkit_common::reclaim::<Array<Locale>>(px as *mut XlOper) });
            }
            return XLRET_SUCCESS;
        }
        if xlfn != XLF_GET_WORKSPACE || count != 1 {
            return 1;
        }
        let item = unsafe { (**opers).w() };
        let mut answer = match item {
            Some(37) => {
                let settings = Array::from_values(vec![
                    Locale::new(Number::new(1.0)),
                    Locale::new(XlString::new(".").unwrap()),
                    Locale::new(Bool::new(true)),
                ])
                .unwrap();
                let px = xlkit_common::into_host(settings);
                LENT.lock().replace(px as usize);
                let mut lent = unsafe { *px };
                lent.clear_dll_free();
                lent
            }
            Some(2) => XlOper::number(16.0),
            _ => XlOper::error(ExcelError::VALUE.code()),
        };
        answer.set_xl_free();
        unsafe { *result = answer };
        XLRET_SUCCESS
    }

    #[test]
    fn workspace_answers_are_copied_and_released() {
        let host = CallbackHost::new();
        host.set_entry_point(locale_host);

        let locale = host.workspace(Workspace::LocaleData).unwrap();
        assert_eq!(locale.size(), 3);
        assert_eq!(locale[1].get::<XlString, _>().unwrap(), ".");
        assert!(locale[2].holds::<Bool, _>());
        assert!(LENT.lock().is_none());

        let version = host.workspace(Workspace::ExcelVersion).unwrap();
        assert_eq!(version.size(), 1);
        assert_eq!(version[0].get::<Number, _>().unwrap().value(), 16.0);

        assert!(host.workspace(Workspace::DecimalCount).is_err());
    }

    #[test]
    fn failed_release_keeps_the_answer() {
        let host = CallbackHost::new();
        assert!(!host.is_connected());
        assert!(host.call::<Number>(XLF_REGISTER, &[]).is_err());

        host.set_entry_point(refuses_to_free);
        let answer = host.call::<Number>(XLF_REGISTER, &[]).unwrap();
        assert_eq!(answer.value(), 7.0);
        assert_eq!(*SEEN.lock(), [XLF_REGISTER, XL_FREE]);
    }
}
