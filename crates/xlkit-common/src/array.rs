//! Row-major two-dimensional arrays of views.
//!
//! An [`Array<T>`] is a single record in one of three states:
//!
//! * **Empty**: a 0x0 multi record without a buffer.
//! * **Singular**: the element's own record stored inline, the way the
//!   host hands back a bare scalar instead of a 1x1 array. It always reads
//!   as a one-element sequence. Elements that can be empty (Nil, Missing,
//!   variants) are kept in a 1x1 multi record instead, since a bare empty
//!   record reads back as an Empty array.
//! * **Multi**: a multi record owning `rows * cols` contiguous elements.
//!
//! Cloning copies every element; [`std::mem::take`] moves the buffer out and
//! leaves the source Empty.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::slice;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::XllError;
use crate::expected::{Expectable, Expected};
use crate::record::{Overlay, XlOper, XlType, adopt, overlay, overlay_mut, surrender};
use crate::scalar::{Bool, ExcelError, Int, Number, Scalar, ScalarKind};
use crate::string::XlString;
use crate::value::Value;
use crate::variant::{Alternatives, Variant};

/// Rows in a host worksheet.
pub const MAX_ROWS: usize = 1_048_576;
/// Columns in a host worksheet.
pub const MAX_COLS: usize = 16_384;

/// Views that can be stored as array elements.
pub trait Element: Value {
    /// Whether a lone element may be stored inline as a bare record.
    #[doc(hidden)]
    const INLINE: bool = true;
}

impl<K: ScalarKind> Element for Scalar<K> {
    const INLINE: bool = !matches!(K::TAG, XlType::Nil | XlType::Missing);
}
impl Element for XlString {}
impl<S: Alternatives> Element for Variant<S> {
    const INLINE: bool = false;
}
impl<T: Expectable> Element for Expected<T> {}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArrayShape {
    Empty,
    Singular,
    Horizontal,
    Vertical,
    TwoDimensional,
}

#[repr(transparent)]
pub struct Array<T: Element> {
    oper: XlOper,
    elements: PhantomData<T>,
}

fn check_grid(rows: usize, cols: usize, size: usize) -> Result<(), XllError> {
    let zero_mismatch = (rows == 0) != (cols == 0);
    if rows > MAX_ROWS || cols > MAX_COLS || zero_mismatch || rows * cols != size {
        return Err(XllError::ShapeMismatch { rows, cols, size });
    }
    Ok(())
}

impl<T: Element> Array<T> {
    fn from_raw(oper: XlOper) -> Self {
        Self {
            oper,
            elements: PhantomData,
        }
    }

    /// Assemble from row-major elements whose count matches the grid.
    fn from_parts(rows: usize, cols: usize, mut values: Vec<T>) -> Self {
        match values.len() {
            0 => Self::default(),
            1 if T::INLINE => match values.pop() {
                Some(value) => Self::from_raw(surrender(value)),
                None => Self::default(),
            },
            _ => Self::from_raw(XlOper::from_elements(values.into_boxed_slice(), rows, cols)),
        }
    }

    /// A `rows x cols` array of default elements.
    pub fn new(rows: usize, cols: usize) -> Result<Self, XllError> {
        let size = rows.saturating_mul(cols);
        check_grid(rows, cols, size)?;
        Ok(Self::from_parts(rows, cols, vec![T::default(); size]))
    }

    /// A single row.
    pub fn from_values(values: Vec<T>) -> Result<Self, XllError> {
        let cols = values.len();
        Self::from_shape(usize::from(cols > 0), cols, values)
    }

    /// A single column.
    pub fn from_column(values: Vec<T>) -> Result<Self, XllError> {
        let rows = values.len();
        Self::from_shape(rows, usize::from(rows > 0), values)
    }

    /// A `rows x cols` array from row-major values.
    pub fn from_shape(rows: usize, cols: usize, values: Vec<T>) -> Result<Self, XllError> {
        check_grid(rows, cols, values.len())?;
        Ok(Self::from_parts(rows, cols, values))
    }

    pub fn rows(&self) -> usize {
        match self.oper.multi_dims() {
            Some((rows, _)) => rows,
            None => 1,
        }
    }

    pub fn cols(&self) -> usize {
        match self.oper.multi_dims() {
            Some((_, cols)) => cols,
            None => 1,
        }
    }

    pub fn size(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn shape(&self) -> ArrayShape {
        match (self.rows(), self.cols()) {
            (0, _) | (_, 0) => ArrayShape::Empty,
            (1, 1) => ArrayShape::Singular,
            (1, _) => ArrayShape::Horizontal,
            (_, 1) => ArrayShape::Vertical,
            _ => ArrayShape::TwoDimensional,
        }
    }

    fn is_singular(&self) -> bool {
        !self.oper.is(XlType::Multi)
    }

    pub fn as_slice(&self) -> &[T] {
        if self.is_singular() {
            slice::from_ref(overlay::<T>(&self.oper))
        } else {
            self.oper.multi_elements::<T>().unwrap_or(&[])
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.is_singular() {
            slice::from_mut(overlay_mut::<T>(&mut self.oper))
        } else {
            self.oper.multi_elements_mut::<T>().unwrap_or(&mut [])
        }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Element at a row-major linear index.
    pub fn get(&self, index: usize) -> Result<&T, XllError> {
        let slice = self.as_slice();
        slice.get(index).ok_or(XllError::IndexOutOfRange {
            index,
            len: slice.len(),
        })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut T, XllError> {
        let slice = self.as_mut_slice();
        let len = slice.len();
        slice
            .get_mut(index)
            .ok_or(XllError::IndexOutOfRange { index, len })
    }

    fn linear(&self, row: usize, col: usize) -> Result<usize, XllError> {
        let (rows, cols) = (self.rows(), self.cols());
        if row >= rows || col >= cols {
            return Err(XllError::CellOutOfRange {
                row,
                col,
                rows,
                cols,
            });
        }
        Ok(row * cols + col)
    }

    pub fn at(&self, row: usize, col: usize) -> Result<&T, XllError> {
        let index = self.linear(row, col)?;
        self.get(index)
    }

    pub fn at_mut(&mut self, row: usize, col: usize) -> Result<&mut T, XllError> {
        let index = self.linear(row, col)?;
        self.get_mut(index)
    }

    /// Change the dimensions, keeping the elements in row-major order.
    /// On failure the array is left untouched.
    pub fn reshape(&mut self, rows: usize, cols: usize) -> Result<(), XllError> {
        check_grid(rows, cols, self.size())?;
        self.oper.set_multi_dims(rows, cols);
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    /// Copy the elements into any container of a convertible element type.
    pub fn to<C, E>(&self) -> C
    where
        C: FromIterator<E>,
        E: From<T>,
    {
        self.iter().cloned().map(E::from).collect()
    }
}

impl<T: Element> Default for Array<T> {
    fn default() -> Self {
        Self::from_raw(XlOper::empty_multi())
    }
}

impl<T: Element> Clone for Array<T> {
    fn clone(&self) -> Self {
        Self::from_parts(self.rows(), self.cols(), self.to_vec())
    }
}

impl<T: Element> Drop for Array<T> {
    fn drop(&mut self) {
        if self.is_singular() {
            // SAFETY: a singular array owns the inline `T`.
            drop(unsafe { adopt::<T>(self.oper) });
            self.oper = XlOper::empty_multi();
        } else {
            // SAFETY: the buffer was installed by `from_elements::<T>`.
            unsafe { self.oper.release_elements::<T>() }
        }
    }
}

impl<T: Element + PartialEq> PartialEq for Array<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rows() == other.rows() && self.cols() == other.cols() && self.as_slice() == other.as_slice()
    }
}

impl<T: Element> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("rows", &self.rows())
            .field("cols", &self.cols())
            .field("elements", &self.as_slice())
            .finish()
    }
}

impl<T: Element> Index<usize> for Array<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<T: Element> IndexMut<usize> for Array<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<T: Element> Index<(usize, usize)> for Array<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        match self.at(row, col) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<T: Element> IndexMut<(usize, usize)> for Array<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        match self.at_mut(row, col) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<'a, T: Element> IntoIterator for &'a Array<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// SAFETY: repr(transparent) over XlOper plus a zero-sized marker.
unsafe impl<T: Element> Overlay for Array<T> {
    fn as_oper(&self) -> &XlOper {
        &self.oper
    }
}

impl<T: Element> Value for Array<T> {
    const TYPE_NAME: &'static str = "Array";

    /// Deep copy of a host record: multi records are validated element by
    /// element, a bare Nil or Missing becomes Empty, anything else a
    /// Singular array.
    fn from_oper(oper: &XlOper) -> Result<Self, XllError> {
        match oper.tag() {
            Some(XlType::Multi) => {
                let (rows, cols) = oper.multi_dims().unwrap_or((0, 0));
                let values = oper
                    .multi_elements::<XlOper>()
                    .unwrap_or(&[])
                    .iter()
                    .map(T::from_oper)
                    .collect::<Result<Vec<_>, _>>()?;
                if values.is_empty() {
                    return Ok(Self::default());
                }
                Self::from_shape(rows, cols, values)
            }
            Some(XlType::Nil | XlType::Missing) => Ok(Self::default()),
            _ => T::from_oper(oper).map(|value| Self::from_raw(surrender(value))),
        }
    }
}

/// Natives that have a view counterpart.
pub trait IntoView {
    type View: Expectable;

    fn into_view(self) -> Result<Self::View, XllError>;
}

impl IntoView for f64 {
    type View = Number;
    fn into_view(self) -> Result<Number, XllError> {
        Ok(Number::new(self))
    }
}

impl IntoView for i32 {
    type View = Int;
    fn into_view(self) -> Result<Int, XllError> {
        Ok(Int::new(self))
    }
}

impl IntoView for bool {
    type View = Bool;
    fn into_view(self) -> Result<Bool, XllError> {
        Ok(Bool::new(self))
    }
}

impl IntoView for String {
    type View = XlString;
    fn into_view(self) -> Result<XlString, XllError> {
        XlString::new(&self)
    }
}

impl IntoView for &str {
    type View = XlString;
    fn into_view(self) -> Result<XlString, XllError> {
        XlString::new(self)
    }
}

/// Column of per-element results; failed elements become `#NULL!`.
pub fn make_array<V, E>(items: Vec<Result<V, E>>) -> Result<Array<Expected<V::View>>, XllError>
where
    V: IntoView,
{
    let values = items
        .into_iter()
        .map(|item| match item {
            Ok(value) => value.into_view().map(Expected::new),
            Err(_) => Ok(Expected::from_error(ExcelError::NULL)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Array::from_column(values)
}
