use std::fmt;

use crate::error::XllError;
use crate::record::{Overlay, XlOper};

/// A typed, owning view over one host record.
///
/// Every view is layout-identical to [`XlOper`] and can therefore be
/// stored inline in host arrays, returned to the host, or overlaid onto a
/// record the host handed in.
pub trait Value: Overlay + Clone + Default + fmt::Debug {
    /// Human-readable name used in fault messages.
    const TYPE_NAME: &'static str;

    /// Build an owning copy from a record, validating (and where allowed,
    /// converting) its tag.
    fn from_oper(oper: &XlOper) -> Result<Self, XllError>;

    /// Copy of the underlying record. Ownership of any buffer stays with
    /// `self`.
    fn oper(&self) -> XlOper {
        *self.as_oper()
    }
}
