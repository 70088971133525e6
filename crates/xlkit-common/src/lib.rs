//! Typed, value-semantic views over the host spreadsheet's `XLOPER12` record.

pub mod array;
pub mod codec;
pub mod error;
pub mod expected;
pub mod record;
pub mod reference;
pub mod scalar;
pub mod string;
pub mod value;
pub mod variant;

pub use array::*;
pub use error::*;
pub use expected::*;
pub use record::*;
pub use reference::*;
pub use scalar::*;
pub use string::*;
pub use value::*;
pub use variant::*;
