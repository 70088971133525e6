//! Single-area references to the active sheet.

use std::fmt;

use crate::error::XllError;
use crate::record::{CellRange, Overlay, XlOper, XlType};
use crate::value::Value;

/// A `xltypeSRef` record: one rectangular block on the sheet the host is
/// currently evaluating.
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct SingleRef {
    oper: XlOper,
}

impl SingleRef {
    pub fn new(range: CellRange) -> Self {
        Self {
            oper: XlOper::single_ref(range),
        }
    }

    /// A reference to one cell.
    pub fn cell(row: i32, col: i32) -> Self {
        Self::new(CellRange {
            first_row: row,
            last_row: row,
            first_col: col,
            last_col: col,
        })
    }

    pub fn range(&self) -> CellRange {
        self.oper.sref().unwrap_or_default()
    }

    pub fn first_row(&self) -> i32 {
        self.range().first_row
    }

    pub fn last_row(&self) -> i32 {
        self.range().last_row
    }

    pub fn first_col(&self) -> i32 {
        self.range().first_col
    }

    pub fn last_col(&self) -> i32 {
        self.range().last_col
    }

    /// `(rows, cols)` covered by the block.
    pub fn dims(&self) -> (usize, usize) {
        let r = self.range();
        let span = |first: i32, last: i32| usize::try_from(last - first + 1).unwrap_or(0);
        (span(r.first_row, r.last_row), span(r.first_col, r.last_col))
    }
}

impl Default for SingleRef {
    fn default() -> Self {
        Self::new(CellRange::default())
    }
}

impl PartialEq for SingleRef {
    fn eq(&self, other: &Self) -> bool {
        self.range() == other.range()
    }
}

impl Eq for SingleRef {}

impl fmt::Debug for SingleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingleRef({self})")
    }
}

/// R1C1 notation, one-based.
impl fmt::Display for SingleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.range();
        write!(f, "R{}C{}", r.first_row + 1, r.first_col + 1)?;
        if (r.first_row, r.first_col) != (r.last_row, r.last_col) {
            write!(f, ":R{}C{}", r.last_row + 1, r.last_col + 1)?;
        }
        Ok(())
    }
}

// SAFETY: repr(transparent) over XlOper.
unsafe impl Overlay for SingleRef {
    fn as_oper(&self) -> &XlOper {
        &self.oper
    }
}

impl Value for SingleRef {
    const TYPE_NAME: &'static str = "SingleRef";

    fn from_oper(oper: &XlOper) -> Result<Self, XllError> {
        match oper.sref() {
            Some(range) => Ok(Self::new(range)),
            None => Err(XllError::InvalidTag {
                view: Self::TYPE_NAME,
                found: oper.raw_type(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_and_dims() {
        let r = SingleRef::new(CellRange {
            first_row: 1,
            last_row: 3,
            first_col: 0,
            last_col: 1,
        });
        assert_eq!((r.first_row(), r.last_row()), (1, 3));
        assert_eq!((r.first_col(), r.last_col()), (0, 1));
        assert_eq!(r.dims(), (3, 2));
        assert_eq!(r.to_string(), "R2C1:R4C2");
        assert_eq!(SingleRef::cell(0, 0).to_string(), "R1C1");
        assert_eq!(SingleRef::default().dims(), (1, 1));
    }

    #[test]
    fn from_oper_accepts_only_references() {
        let source = XlOper::single_ref(CellRange {
            first_row: 5,
            last_row: 5,
            first_col: 2,
            last_col: 7,
        });
        let r = SingleRef::from_oper(&source).unwrap();
        assert_eq!(r.dims(), (1, 6));
        assert_eq!(r.as_oper().tag(), Some(XlType::SRef));

        let err = SingleRef::from_oper(&XlOper::int(3)).unwrap_err();
        assert_eq!(
            err,
            XllError::InvalidTag {
                view: "SingleRef",
                found: 0x0800
            }
        );
    }
}
