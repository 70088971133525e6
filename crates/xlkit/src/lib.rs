//! Meta crate that re-exports the xlkit building blocks. Depend on it with
//! default features to get both the value views and the add-in plumbing, or
//! opt into `common` alone when only the XLOPER12 types are needed.

#[cfg(feature = "common")]
pub use xlkit_common as common;

#[cfg(feature = "cffi")]
pub use xlkit_cffi as cffi;

#[cfg(feature = "common")]
pub use xlkit_common::{
    AnyValue, Array, ArrayShape, Bool, CellRange, ExcelError, ExcelErrorKind, ExpBool, ExpInt,
    ExpNumber, ExpString, Expected, Int, Missing, Nil, Number, SingleRef, Unexpected, Value,
    Variant, XlOper, XlString, XllError,
};

#[cfg(feature = "cffi")]
pub use xlkit_cffi::{
    AddIn, CallbackHost, Event, Function, FunctionDescriptor, Host, Registry, Workspace,
    XLL_FAILURE, XLL_SUCCESS, declare_addin, host_result,
};
