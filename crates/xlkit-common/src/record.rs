//! The host's fixed-layout tagged record (`XLOPER12`) and every piece of
//! unsafe reinterpretation the crate performs.
//!
//! Nothing outside this module reads the union payload or touches raw
//! buffers. Views reach the payload through the tag-checked accessors below
//! and reinterpret whole records only through [`Overlay`], whose implementors
//! are `#[repr(transparent)]` wrappers around [`XlOper`].

use std::mem::ManuallyDrop;
use std::{fmt, ptr, slice};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Host-native text code unit.
pub type XChar = u16;

/* ───────────────────────── type word ───────────────────────── */

pub const XLTYPE_NUM: u32 = 0x0001;
pub const XLTYPE_STR: u32 = 0x0002;
pub const XLTYPE_BOOL: u32 = 0x0004;
pub const XLTYPE_REF: u32 = 0x0008;
pub const XLTYPE_ERR: u32 = 0x0010;
pub const XLTYPE_FLOW: u32 = 0x0020;
pub const XLTYPE_MULTI: u32 = 0x0040;
pub const XLTYPE_MISSING: u32 = 0x0080;
pub const XLTYPE_NIL: u32 = 0x0100;
pub const XLTYPE_SREF: u32 = 0x0400;
pub const XLTYPE_INT: u32 = 0x0800;

/// The host allocated the payload and must be asked to free it.
pub const XLBIT_XL_FREE: u32 = 0x1000;
/// The add-in allocated the payload; the host hands it back through the
/// free entry point.
pub const XLBIT_DLL_FREE: u32 = 0x4000;

const OWNERSHIP_BITS: u32 = XLBIT_XL_FREE | XLBIT_DLL_FREE;

/// Discriminant of a record once the ownership bits are stripped.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum XlType {
    Num = XLTYPE_NUM,
    Str = XLTYPE_STR,
    Bool = XLTYPE_BOOL,
    Ref = XLTYPE_REF,
    Err = XLTYPE_ERR,
    Flow = XLTYPE_FLOW,
    Multi = XLTYPE_MULTI,
    Missing = XLTYPE_MISSING,
    Nil = XLTYPE_NIL,
    SRef = XLTYPE_SREF,
    Int = XLTYPE_INT,
}

impl XlType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw & !OWNERSHIP_BITS {
            XLTYPE_NUM => Self::Num,
            XLTYPE_STR => Self::Str,
            XLTYPE_BOOL => Self::Bool,
            XLTYPE_REF => Self::Ref,
            XLTYPE_ERR => Self::Err,
            XLTYPE_FLOW => Self::Flow,
            XLTYPE_MULTI => Self::Multi,
            XLTYPE_MISSING => Self::Missing,
            XLTYPE_NIL => Self::Nil,
            XLTYPE_SREF => Self::SRef,
            XLTYPE_INT => Self::Int,
            _ => return None,
        })
    }

    #[inline(always)]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for XlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Num => "xltypeNum",
            Self::Str => "xltypeStr",
            Self::Bool => "xltypeBool",
            Self::Ref => "xltypeRef",
            Self::Err => "xltypeErr",
            Self::Flow => "xltypeFlow",
            Self::Multi => "xltypeMulti",
            Self::Missing => "xltypeMissing",
            Self::Nil => "xltypeNil",
            Self::SRef => "xltypeSRef",
            Self::Int => "xltypeInt",
        })
    }
}

/* ───────────────────────── the record ───────────────────────── */

#[repr(C)]
#[derive(Copy, Clone)]
struct MultiPayload {
    lparray: *mut XlOper,
    rows: i32,
    columns: i32,
}

/// Corners of a rectangular cell block on the active sheet, zero-based
/// and inclusive.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub first_row: i32,
    pub last_row: i32,
    pub first_col: i32,
    pub last_col: i32,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct SRefPayload {
    count: u16,
    range: CellRange,
}

#[repr(C)]
#[derive(Copy, Clone)]
union Payload {
    num: f64,
    str: *mut XChar,
    xbool: i32,
    err: i32,
    w: i32,
    array: MultiPayload,
    sref: SRefPayload,
    // Pins the union at the host's 24 bytes.
    raw: [u64; 3],
}

/// Raw `XLOPER12`. A plain, non-owning record: copying it never clones a
/// buffer and dropping it never frees one. Ownership lives in the views.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct XlOper {
    val: Payload,
    xltype: u32,
}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(std::mem::size_of::<XlOper>() == 32);

impl XlOper {
    const ZERO: Payload = Payload { raw: [0; 3] };

    pub const fn number(value: f64) -> Self {
        Self {
            val: Payload { num: value },
            xltype: XLTYPE_NUM,
        }
    }

    pub const fn int(value: i32) -> Self {
        Self {
            val: Payload { w: value },
            xltype: XLTYPE_INT,
        }
    }

    pub const fn boolean(value: bool) -> Self {
        Self {
            val: Payload {
                xbool: value as i32,
            },
            xltype: XLTYPE_BOOL,
        }
    }

    pub const fn error(code: i32) -> Self {
        Self {
            val: Payload { err: code },
            xltype: XLTYPE_ERR,
        }
    }

    pub const fn nil() -> Self {
        Self {
            val: Self::ZERO,
            xltype: XLTYPE_NIL,
        }
    }

    pub const fn missing() -> Self {
        Self {
            val: Self::ZERO,
            xltype: XLTYPE_MISSING,
        }
    }

    /// Reference to a cell block on the active sheet.
    pub const fn single_ref(range: CellRange) -> Self {
        Self {
            val: Payload {
                sref: SRefPayload { count: 1, range },
            },
            xltype: XLTYPE_SREF,
        }
    }

    /// A 0x0 multi record with no buffer.
    pub const fn empty_multi() -> Self {
        Self {
            val: Payload {
                array: MultiPayload {
                    lparray: ptr::null_mut(),
                    rows: 0,
                    columns: 0,
                },
            },
            xltype: XLTYPE_MULTI,
        }
    }

    /// Type word including ownership bits.
    #[inline(always)]
    pub fn raw_type(&self) -> u32 {
        self.xltype
    }

    #[inline(always)]
    pub fn tag(&self) -> Option<XlType> {
        XlType::from_raw(self.xltype)
    }

    #[inline(always)]
    pub fn is(&self, tag: XlType) -> bool {
        self.tag() == Some(tag)
    }

    pub fn has_dll_free(&self) -> bool {
        self.xltype & XLBIT_DLL_FREE != 0
    }

    pub fn has_xl_free(&self) -> bool {
        self.xltype & XLBIT_XL_FREE != 0
    }

    /// Mark a record as host-owned memory the add-in must hand back with
    /// `xlFree`.
    pub fn set_xl_free(&mut self) {
        self.xltype |= XLBIT_XL_FREE;
    }

    pub fn set_dll_free(&mut self) {
        self.xltype |= XLBIT_DLL_FREE;
    }

    pub fn clear_dll_free(&mut self) {
        self.xltype &= !XLBIT_DLL_FREE;
    }

    /* ── tag-checked payload reads ── */

    pub fn num(&self) -> Option<f64> {
        // SAFETY: the tag names `num` as the live member.
        self.is(XlType::Num).then(|| unsafe { self.val.num })
    }

    pub fn w(&self) -> Option<i32> {
        // SAFETY: the tag names `w` as the live member.
        self.is(XlType::Int).then(|| unsafe { self.val.w })
    }

    pub fn xbool(&self) -> Option<bool> {
        // SAFETY: the tag names `xbool` as the live member.
        self.is(XlType::Bool).then(|| unsafe { self.val.xbool != 0 })
    }

    pub fn err(&self) -> Option<i32> {
        // SAFETY: the tag names `err` as the live member.
        self.is(XlType::Err).then(|| unsafe { self.val.err })
    }

    /// Any numeric-like payload promoted to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self.tag()? {
            XlType::Num => self.num(),
            XlType::Int => self.w().map(f64::from),
            XlType::Bool => self.xbool().map(|b| if b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Text code units (without length prefix and terminator). A null
    /// buffer reads as the empty string.
    pub fn str_units(&self) -> Option<&[XChar]> {
        if !self.is(XlType::Str) {
            return None;
        }
        // SAFETY: tag is Str, so `str` is live; a non-null buffer starts
        // with its unit count and holds at least that many units after it.
        unsafe {
            let p = self.val.str;
            if p.is_null() {
                return Some(&[]);
            }
            let count = usize::from(*p);
            Some(slice::from_raw_parts(p.add(1), count))
        }
    }

    pub fn sref(&self) -> Option<CellRange> {
        // SAFETY: the tag names `sref` as the live member.
        self.is(XlType::SRef).then(|| unsafe { self.val.sref.range })
    }

    /// `(rows, cols)` of a multi record.
    pub fn multi_dims(&self) -> Option<(usize, usize)> {
        if !self.is(XlType::Multi) {
            return None;
        }
        // SAFETY: tag is Multi, so `array` is live.
        let a = unsafe { self.val.array };
        Some((
            usize::try_from(a.rows).unwrap_or(0),
            usize::try_from(a.columns).unwrap_or(0),
        ))
    }

    /// Elements of a multi record, reinterpreted as `T`.
    ///
    /// Callers choose `T` so that every element's tag is valid for it; with
    /// `T = XlOper` any host-built array can be read.
    pub fn multi_elements<T: Overlay>(&self) -> Option<&[T]> {
        let (rows, cols) = self.multi_dims()?;
        // SAFETY: tag is Multi; the buffer holds rows*cols records laid out
        // as `T` (an `XlOper` wrapper).
        unsafe {
            let p = self.val.array.lparray;
            if p.is_null() || rows * cols == 0 {
                return Some(&[]);
            }
            Some(slice::from_raw_parts(p.cast::<T>(), rows * cols))
        }
    }

    pub(crate) fn multi_elements_mut<T: Overlay>(&mut self) -> Option<&mut [T]> {
        let (rows, cols) = self.multi_dims()?;
        // SAFETY: as for `multi_elements`, with unique access through `&mut`.
        unsafe {
            let p = self.val.array.lparray;
            if p.is_null() || rows * cols == 0 {
                return Some(&mut []);
            }
            Some(slice::from_raw_parts_mut(p.cast::<T>(), rows * cols))
        }
    }

    /// Overwrite the dimensions of a multi record without touching its buffer.
    pub(crate) fn set_multi_dims(&mut self, rows: usize, cols: usize) {
        // Callers have checked that rows*cols equals the buffer length.
        if self.is(XlType::Multi) {
            self.val.array.rows = rows as i32;
            self.val.array.columns = cols as i32;
        }
    }

    /* ── owned buffers ── */

    /// Hand a length-prefixed buffer (`[count, units.., 0]`) to a Str record.
    pub(crate) fn from_string_buffer(buffer: Box<[XChar]>) -> Self {
        debug_assert_eq!(buffer.len(), usize::from(buffer[0]) + 2);
        let p = Box::into_raw(buffer).cast::<XChar>();
        Self {
            val: Payload { str: p },
            xltype: XLTYPE_STR,
        }
    }

    /// Free a buffer installed by [`XlOper::from_string_buffer`] and null the
    /// pointer.
    ///
    /// # Safety
    /// The record must own its buffer (built by this crate, never by the host).
    pub(crate) unsafe fn release_string_buffer(&mut self) {
        if !self.is(XlType::Str) {
            return;
        }
        // SAFETY: per the contract the buffer came from `Box<[XChar]>` of
        // length count + 2.
        unsafe {
            let p = self.val.str;
            if !p.is_null() {
                let len = usize::from(*p) + 2;
                drop(Box::from_raw(ptr::slice_from_raw_parts_mut(p, len)));
            }
            self.val.str = ptr::null_mut();
        }
    }

    /// Hand a boxed slice of records to a multi record.
    pub(crate) fn from_elements<T: Overlay>(elements: Box<[T]>, rows: usize, cols: usize) -> Self {
        debug_assert_eq!(elements.len(), rows * cols);
        let p = Box::into_raw(elements).cast::<XlOper>();
        Self {
            val: Payload {
                array: MultiPayload {
                    lparray: p,
                    rows: rows as i32,
                    columns: cols as i32,
                },
            },
            xltype: XLTYPE_MULTI,
        }
    }

    /// Drop every element as `T`, free the buffer and reset to 0x0.
    ///
    /// # Safety
    /// The buffer must have been installed by [`XlOper::from_elements`] with
    /// elements whose layout and tags are valid for `T`.
    pub(crate) unsafe fn release_elements<T: Overlay>(&mut self) {
        let Some((rows, cols)) = self.multi_dims() else {
            return;
        };
        // SAFETY: per the contract the buffer is a `Box<[T]>` of rows*cols.
        unsafe {
            let p = self.val.array.lparray;
            if !p.is_null() {
                let len = rows * cols;
                drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                    p.cast::<T>(),
                    len,
                )));
            }
        }
        *self = Self::empty_multi();
    }
}

impl Default for XlOper {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for XlOper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("XlOper");
        d.field("xltype", &format_args!("{:#06x}", self.xltype));
        match self.tag() {
            Some(XlType::Num) => d.field("num", &self.num()),
            Some(XlType::Int) => d.field("w", &self.w()),
            Some(XlType::Bool) => d.field("xbool", &self.xbool()),
            Some(XlType::Err) => d.field("err", &self.err()),
            Some(XlType::Str) => d.field("units", &self.str_units().map(<[XChar]>::len)),
            Some(XlType::Multi) => d.field("dims", &self.multi_dims()),
            Some(XlType::SRef) => d.field("sref", &self.sref()),
            _ => &mut d,
        };
        d.finish()
    }
}

/* ───────────────────────── overlays ───────────────────────── */

/// A typed view that is layout-identical to [`XlOper`].
///
/// # Safety
/// Implementors must be `#[repr(transparent)]` over `XlOper` (plus
/// zero-sized markers) so a record can be reinterpreted as `Self` in place.
pub unsafe trait Overlay: Sized {
    fn as_oper(&self) -> &XlOper;
}

// SAFETY: trivially layout-identical.
unsafe impl Overlay for XlOper {
    fn as_oper(&self) -> &XlOper {
        self
    }
}

/// Borrow a record as `T`. Callers check the tag first.
pub(crate) fn overlay<T: Overlay>(oper: &XlOper) -> &T {
    // SAFETY: `T: Overlay` guarantees identical layout.
    unsafe { &*(oper as *const XlOper).cast::<T>() }
}

pub(crate) fn overlay_mut<T: Overlay>(oper: &mut XlOper) -> &mut T {
    // SAFETY: `T: Overlay` guarantees identical layout.
    unsafe { &mut *(oper as *mut XlOper).cast::<T>() }
}

/// Take ownership of a record as `T`.
///
/// # Safety
/// The record's tag and payload must satisfy `T`'s invariants, and nothing
/// else may own the payload afterwards.
pub(crate) unsafe fn adopt<T: Overlay>(oper: XlOper) -> T {
    let oper = ManuallyDrop::new(oper);
    // SAFETY: identical layout per `Overlay`; the source is never dropped.
    unsafe { ptr::read((&*oper as *const XlOper).cast::<T>()) }
}

/// Give up ownership of `value`, returning its raw record. The payload is
/// leaked unless re-adopted.
pub fn surrender<T: Overlay>(value: T) -> XlOper {
    let value = ManuallyDrop::new(value);
    *value.as_oper()
}

/// Box `value` for the host and mark it for the free entry point.
pub fn into_host<T: Overlay>(value: T) -> *mut XlOper {
    let raw = Box::into_raw(Box::new(value)).cast::<XlOper>();
    // SAFETY: freshly boxed, layout-identical to `XlOper`.
    unsafe { (*raw).set_dll_free() };
    raw
}

/// Reclaim a record previously passed out by [`into_host`], after its
/// DLL-free bit has been cleared.
///
/// # Safety
/// `px` must come from [`into_host`] and be reclaimed exactly once, with a
/// `T` whose layout and invariants match the boxed value.
pub unsafe fn reclaim<T: Overlay>(px: *mut XlOper) -> Box<T> {
    // SAFETY: forwarded contract.
    unsafe { Box::from_raw(px.cast::<T>()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_host_sized() {
        assert_eq!(std::mem::size_of::<XlOper>(), 32);
        assert_eq!(std::mem::align_of::<XlOper>(), 8);
    }

    #[test]
    fn accessors_are_tag_checked() {
        let n = XlOper::number(2.5);
        assert_eq!(n.num(), Some(2.5));
        assert_eq!(n.w(), None);
        assert_eq!(n.err(), None);
        assert!(n.str_units().is_none());

        let b = XlOper::boolean(true);
        assert_eq!(b.xbool(), Some(true));
        assert_eq!(b.as_f64(), Some(1.0));
        assert_eq!(XlOper::int(-3).as_f64(), Some(-3.0));
        assert_eq!(XlOper::error(42).as_f64(), None);
    }

    #[test]
    fn ownership_bits_do_not_change_tag() {
        let mut n = XlOper::int(7);
        n.set_dll_free();
        assert!(n.has_dll_free());
        assert_eq!(n.tag(), Some(XlType::Int));
        assert_eq!(n.w(), Some(7));
        n.clear_dll_free();
        assert_eq!(n.raw_type(), XLTYPE_INT);
    }

    #[test]
    fn unknown_type_word_has_no_tag() {
        assert_eq!(XlType::from_raw(0), None);
        assert_eq!(XlType::from_raw(0x0003), None);
        assert_eq!(XlType::from_raw(XLTYPE_NIL | XLBIT_XL_FREE), Some(XlType::Nil));
    }

    #[test]
    fn single_ref_keeps_its_corners() {
        let range = CellRange {
            first_row: 2,
            last_row: 4,
            first_col: 1,
            last_col: 1,
        };
        let r = XlOper::single_ref(range);
        assert_eq!(r.tag(), Some(XlType::SRef));
        assert_eq!(r.sref(), Some(range));
        assert_eq!(XlOper::number(1.0).sref(), None);
    }

    #[test]
    fn empty_multi_has_no_elements() {
        let m = XlOper::empty_multi();
        assert_eq!(m.multi_dims(), Some((0, 0)));
        assert_eq!(m.multi_elements::<XlOper>().map(<[XlOper]>::len), Some(0));
    }

    #[test]
    fn multi_dims_rewrite_keeps_the_buffer() {
        let cells = vec![XlOper::number(1.0), XlOper::number(2.0)].into_boxed_slice();
        let mut m = XlOper::from_elements(cells, 1, 2);
        m.set_multi_dims(2, 1);
        assert_eq!(m.multi_dims(), Some((2, 1)));
        assert_eq!(m.multi_elements::<XlOper>().map(|e| e[1].num()), Some(Some(2.0)));

        let mut n = XlOper::number(3.0);
        n.set_multi_dims(4, 4);
        assert_eq!(n.multi_dims(), None);
        unsafe { m.release_elements::<XlOper>() };
        assert_eq!(m.multi_dims(), Some((0, 0)));
    }

    #[test]
    fn string_buffer_roundtrip_and_release() {
        let buffer: Box<[XChar]> = vec![2, 'h' as u16, 'i' as u16, 0].into_boxed_slice();
        let mut s = XlOper::from_string_buffer(buffer);
        assert_eq!(s.str_units(), Some(&['h' as u16, 'i' as u16][..]));
        unsafe { s.release_string_buffer() };
        assert_eq!(s.str_units(), Some(&[][..]));
    }

    #[test]
    fn host_boxing_sets_and_keeps_bit() {
        let px = into_host(XlOper::number(1.0));
        unsafe {
            assert!((*px).has_dll_free());
            (*px).clear_dll_free();
            let back = reclaim::<XlOper>(px);
            assert_eq!(back.num(), Some(1.0));
        }
    }
}
