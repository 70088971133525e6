#![allow(clippy::missing_safety_doc)]

//! XLL add-in plumbing on top of [`xlkit_common`]: a function descriptor
//! builder, a registry of lifecycle hooks, the Free hook, and a macro that
//! exports the entry points the host looks for.

pub mod addin;
pub mod free;
pub mod function;
pub mod host;
mod macros;
pub mod registry;

pub use addin::*;
pub use free::*;
pub use function::*;
pub use host::*;
pub use registry::*;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
    pub use xlkit_common::XlOper;
}
