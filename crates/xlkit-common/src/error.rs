//! Fault taxonomy shared by every layer of the add-in stack.
//!
//! These are *implementation* faults: contract violations, codec failures,
//! corrupted tags and host refusals. Domain errors that must reach a cell
//! (`#VALUE!`, `#N/A`, ...) travel as [`ExcelError`](crate::ExcelError)
//! values inside [`Expected`](crate::Expected) instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XllError {
    /// A view was built from a record whose tag it does not accept.
    #[error("{view} cannot be built from a record tagged {found:#06x}")]
    InvalidTag { view: &'static str, found: u32 },

    /// Host-native text could not be transcoded.
    #[error("string encoding failed: {0}")]
    Encoding(String),

    /// Text does not fit the host's length-prefixed string limit.
    #[error("string of {units} code units exceeds the host limit of {max}")]
    StringTooLong { units: usize, max: usize },

    #[error("index {index} out of range for an array of {len} elements")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cell ({row}, {col}) out of range for a {rows}x{cols} array")]
    CellOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("cannot shape {size} elements as {rows}x{cols}")]
    ShapeMismatch { rows: usize, cols: usize, size: usize },

    /// The requested alternative is not the active one, or the tag was
    /// corrupted outside the variant's guarantees.
    #[error("bad variant access: {requested} is not the active alternative (tag {found:#06x})")]
    BadVariantAccess { requested: &'static str, found: u32 },

    #[error("bad expected access: {0}")]
    BadExpectedAccess(&'static str),

    #[error("host rejected registration of function '{function}'")]
    RegistrationFailure { function: String },

    #[error("host callback {function:#06x} failed with code {code}")]
    HostCall { function: i32, code: i32 },

    #[error("unknown fault in {event}: {message}")]
    UnknownLifecycleFault { event: &'static str, message: String },
}

impl XllError {
    /// True for either flavour of array bounds violation.
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            XllError::IndexOutOfRange { .. } | XllError::CellOutOfRange { .. }
        )
    }

    /// True for codec failures, including over-long strings.
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            XllError::Encoding(_) | XllError::StringTooLong { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_never_empty() {
        let errors = [
            XllError::InvalidTag {
                view: "Number",
                found: 0x0002,
            },
            XllError::Encoding("unpaired surrogate".into()),
            XllError::IndexOutOfRange { index: 4, len: 4 },
            XllError::ShapeMismatch {
                rows: 3,
                cols: 3,
                size: 4,
            },
            XllError::BadExpectedAccess("value() on an error"),
            XllError::UnknownLifecycleFault {
                event: "xlAutoOpen",
                message: "boom".into(),
            },
        ];
        for e in errors {
            assert!(!e.to_string().is_empty());
        }
    }

    #[test]
    fn invalid_tag_renders_hex_tag() {
        let e = XllError::InvalidTag {
            view: "Int",
            found: 0x0002,
        };
        assert_eq!(e.to_string(), "Int cannot be built from a record tagged 0x0002");
    }

    #[test]
    fn classification_helpers() {
        assert!(XllError::CellOutOfRange { row: 2, col: 0, rows: 2, cols: 2 }.is_out_of_range());
        assert!(XllError::StringTooLong { units: 40_000, max: 32_767 }.is_encoding());
        assert!(!XllError::BadExpectedAccess("x").is_encoding());
    }
}
