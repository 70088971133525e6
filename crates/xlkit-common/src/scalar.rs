//! Scalar views: one generic record wrapper specialised by a kind marker.
//!
//! A [`Scalar<K>`] is a bare [`XlOper`] whose tag is always `K::TAG`.
//! Construction from a record accepts `K::TAG` plus the host's coercible
//! tags (`K::ACCEPTS`) and normalises them; any other tag is rejected with
//! [`XllError::InvalidTag`].
//!
//! | view          | tag     | also accepts  | native |
//! |---------------|---------|---------------|--------|
//! | [`Number`]    | Num     | Int, Bool     | `f64`  |
//! | [`Int`]       | Int     | Num, Bool     | `i32`  |
//! | [`Bool`]      | Bool    | Int, Num      | `bool` |
//! | [`ExcelError`]| Err     | -             | `i32`  |
//! | [`Nil`]       | Nil     | -             | `()`   |
//! | [`Missing`]   | Missing | -             | `()`   |
//!
//! Arithmetic and ordering exist only for the numeric kinds; mixed
//! operands are promoted to `f64` and the result converted back to the
//! left operand's kind.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::XllError;
use crate::record::{Overlay, XlOper, XlType};
use crate::value::Value;

/// Compile-time description of one scalar kind.
pub trait ScalarKind: 'static {
    const TAG: XlType;
    /// Foreign tags the host may coerce into this kind.
    const ACCEPTS: &'static [XlType];
    const NAME: &'static str;

    type Native: Copy + PartialEq + fmt::Debug;
    const DEFAULT: Self::Native;

    /// Read a record already tagged `TAG`.
    fn read(oper: &XlOper) -> Option<Self::Native>;
    fn write(value: Self::Native) -> XlOper;

    /// Convert a record carrying one of the `ACCEPTS` tags.
    fn convert(_oper: &XlOper) -> Option<Self::Native> {
        None
    }

    fn fmt_native(value: Self::Native, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    fn coerce(oper: &XlOper) -> Option<Self::Native> {
        let tag = oper.tag()?;
        if tag == Self::TAG {
            Self::read(oper)
        } else if Self::ACCEPTS.contains(&tag) {
            Self::convert(oper)
        } else {
            None
        }
    }
}

/// Kinds that take part in arithmetic through `f64` promotion.
pub trait Numeric: ScalarKind {
    fn to_f64(value: Self::Native) -> f64;
    fn from_f64(value: f64) -> Self::Native;
}

pub enum NumberKind {}
pub enum IntKind {}
pub enum BoolKind {}
pub enum ErrKind {}
pub enum NilKind {}
pub enum MissingKind {}

impl ScalarKind for NumberKind {
    const TAG: XlType = XlType::Num;
    const ACCEPTS: &'static [XlType] = &[XlType::Int, XlType::Bool];
    const NAME: &'static str = "Number";
    type Native = f64;
    const DEFAULT: f64 = 0.0;

    fn read(oper: &XlOper) -> Option<f64> {
        oper.num()
    }
    fn write(value: f64) -> XlOper {
        XlOper::number(value)
    }
    fn convert(oper: &XlOper) -> Option<f64> {
        oper.as_f64()
    }
    fn fmt_native(value: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&value, f)
    }
}

impl Numeric for NumberKind {
    fn to_f64(value: f64) -> f64 {
        value
    }
    fn from_f64(value: f64) -> f64 {
        value
    }
}

impl ScalarKind for IntKind {
    const TAG: XlType = XlType::Int;
    const ACCEPTS: &'static [XlType] = &[XlType::Num, XlType::Bool];
    const NAME: &'static str = "Int";
    type Native = i32;
    const DEFAULT: i32 = 0;

    fn read(oper: &XlOper) -> Option<i32> {
        oper.w()
    }
    fn write(value: i32) -> XlOper {
        XlOper::int(value)
    }
    fn convert(oper: &XlOper) -> Option<i32> {
        oper.as_f64().map(Self::from_f64)
    }
    fn fmt_native(value: i32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&value, f)
    }
}

impl Numeric for IntKind {
    fn to_f64(value: i32) -> f64 {
        f64::from(value)
    }
    // Truncates toward zero; saturates outside the i32 range.
    fn from_f64(value: f64) -> i32 {
        value as i32
    }
}

impl ScalarKind for BoolKind {
    const TAG: XlType = XlType::Bool;
    const ACCEPTS: &'static [XlType] = &[XlType::Int, XlType::Num];
    const NAME: &'static str = "Bool";
    type Native = bool;
    const DEFAULT: bool = false;

    fn read(oper: &XlOper) -> Option<bool> {
        oper.xbool()
    }
    fn write(value: bool) -> XlOper {
        XlOper::boolean(value)
    }
    fn convert(oper: &XlOper) -> Option<bool> {
        oper.as_f64().map(Self::from_f64)
    }
    fn fmt_native(value: bool, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if value { "TRUE" } else { "FALSE" })
    }
}

impl Numeric for BoolKind {
    fn to_f64(value: bool) -> f64 {
        if value { 1.0 } else { 0.0 }
    }
    fn from_f64(value: f64) -> bool {
        value != 0.0
    }
}

impl ScalarKind for ErrKind {
    const TAG: XlType = XlType::Err;
    const ACCEPTS: &'static [XlType] = &[];
    const NAME: &'static str = "ExcelError";
    type Native = i32;
    const DEFAULT: i32 = 0;

    fn read(oper: &XlOper) -> Option<i32> {
        oper.err()
    }
    fn write(value: i32) -> XlOper {
        XlOper::error(value)
    }
    fn fmt_native(value: i32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match ExcelErrorKind::from_code(value) {
            Some(kind) => fmt::Display::fmt(&kind, f),
            None => write!(f, "UNKNOWN_ERROR#{value}"),
        }
    }
}

impl ScalarKind for NilKind {
    const TAG: XlType = XlType::Nil;
    const ACCEPTS: &'static [XlType] = &[];
    const NAME: &'static str = "Nil";
    type Native = ();
    const DEFAULT: () = ();

    fn read(oper: &XlOper) -> Option<()> {
        oper.is(XlType::Nil).then_some(())
    }
    fn write(_: ()) -> XlOper {
        XlOper::nil()
    }
    fn fmt_native(_: (), _: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

impl ScalarKind for MissingKind {
    const TAG: XlType = XlType::Missing;
    const ACCEPTS: &'static [XlType] = &[];
    const NAME: &'static str = "Missing";
    type Native = ();
    const DEFAULT: () = ();

    fn read(oper: &XlOper) -> Option<()> {
        oper.is(XlType::Missing).then_some(())
    }
    fn write(_: ()) -> XlOper {
        XlOper::missing()
    }
    fn fmt_native(_: (), _: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

/* ───────────────────────── the view ───────────────────────── */

#[repr(transparent)]
pub struct Scalar<K: ScalarKind> {
    oper: XlOper,
    kind: PhantomData<fn() -> K>,
}

pub type Number = Scalar<NumberKind>;
pub type Int = Scalar<IntKind>;
pub type Bool = Scalar<BoolKind>;
pub type ExcelError = Scalar<ErrKind>;
pub type Nil = Scalar<NilKind>;
pub type Missing = Scalar<MissingKind>;

impl<K: ScalarKind> Scalar<K> {
    pub fn new(value: K::Native) -> Self {
        Self {
            oper: K::write(value),
            kind: PhantomData,
        }
    }

    pub fn value(&self) -> K::Native {
        K::read(&self.oper).unwrap_or(K::DEFAULT)
    }

    pub fn set(&mut self, value: K::Native) {
        self.oper = K::write(value);
    }

    /// Tags this view can be built from.
    pub fn accepts(tag: XlType) -> bool {
        tag == K::TAG || K::ACCEPTS.contains(&tag)
    }
}

impl<K: Numeric> Scalar<K> {
    pub fn to_f64(&self) -> f64 {
        K::to_f64(self.value())
    }

    pub fn from_f64(value: f64) -> Self {
        Self::new(K::from_f64(value))
    }
}

impl<K: ScalarKind> Clone for Scalar<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: ScalarKind> Copy for Scalar<K> {}

impl<K: ScalarKind> Default for Scalar<K> {
    fn default() -> Self {
        Self::new(K::DEFAULT)
    }
}

impl<K: ScalarKind> fmt::Debug for Scalar<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", K::NAME, self.value())
    }
}

impl<K: ScalarKind> fmt::Display for Scalar<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        K::fmt_native(self.value(), f)
    }
}

// SAFETY: repr(transparent) over XlOper plus a zero-sized marker.
unsafe impl<K: ScalarKind> Overlay for Scalar<K> {
    fn as_oper(&self) -> &XlOper {
        &self.oper
    }
}

impl<K: ScalarKind> Value for Scalar<K> {
    const TYPE_NAME: &'static str = K::NAME;

    fn from_oper(oper: &XlOper) -> Result<Self, XllError> {
        K::coerce(oper).map(Self::new).ok_or(XllError::InvalidTag {
            view: K::NAME,
            found: oper.raw_type(),
        })
    }
}

/* ───────────────────────── arithmetic ───────────────────────── */

macro_rules! numeric_ops {
    ($($op:ident $method:ident $assign:ident $assign_method:ident => $sym:tt;)*) => {$(
        impl<K: Numeric, R: Numeric> $op<Scalar<R>> for Scalar<K> {
            type Output = Scalar<K>;
            fn $method(self, rhs: Scalar<R>) -> Self::Output {
                Scalar::from_f64(self.to_f64() $sym rhs.to_f64())
            }
        }

        impl<K: Numeric> $op<f64> for Scalar<K> {
            type Output = Scalar<K>;
            fn $method(self, rhs: f64) -> Self::Output {
                Scalar::from_f64(self.to_f64() $sym rhs)
            }
        }

        impl<K: Numeric> $op<i32> for Scalar<K> {
            type Output = Scalar<K>;
            fn $method(self, rhs: i32) -> Self::Output {
                Scalar::from_f64(self.to_f64() $sym f64::from(rhs))
            }
        }

        impl<K: Numeric, R: Numeric> $assign<Scalar<R>> for Scalar<K> {
            fn $assign_method(&mut self, rhs: Scalar<R>) {
                *self = *self $sym rhs;
            }
        }

        impl<K: Numeric> $assign<f64> for Scalar<K> {
            fn $assign_method(&mut self, rhs: f64) {
                *self = *self $sym rhs;
            }
        }

        impl<K: Numeric> $assign<i32> for Scalar<K> {
            fn $assign_method(&mut self, rhs: i32) {
                *self = *self $sym rhs;
            }
        }
    )*};
}

numeric_ops! {
    Add add AddAssign add_assign => +;
    Sub sub SubAssign sub_assign => -;
    Mul mul MulAssign mul_assign => *;
    Div div DivAssign div_assign => /;
}

impl<K: Numeric, R: Numeric> PartialEq<Scalar<R>> for Scalar<K> {
    fn eq(&self, other: &Scalar<R>) -> bool {
        self.to_f64() == other.to_f64()
    }
}

impl<K: Numeric, R: Numeric> PartialOrd<Scalar<R>> for Scalar<K> {
    fn partial_cmp(&self, other: &Scalar<R>) -> Option<Ordering> {
        self.to_f64().partial_cmp(&other.to_f64())
    }
}

impl<K: Numeric> PartialEq<f64> for Scalar<K> {
    fn eq(&self, other: &f64) -> bool {
        self.to_f64() == *other
    }
}

impl<K: Numeric> PartialOrd<f64> for Scalar<K> {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.to_f64().partial_cmp(other)
    }
}

impl<K: Numeric> PartialEq<i32> for Scalar<K> {
    fn eq(&self, other: &i32) -> bool {
        self.to_f64() == f64::from(*other)
    }
}

impl<K: Numeric> PartialOrd<i32> for Scalar<K> {
    fn partial_cmp(&self, other: &i32) -> Option<Ordering> {
        self.to_f64().partial_cmp(&f64::from(*other))
    }
}

impl Int {
    pub fn increment(&mut self) {
        self.set(self.value().wrapping_add(1));
    }

    pub fn decrement(&mut self) {
        self.set(self.value().wrapping_sub(1));
    }

    /// Integer remainder; `None` for a zero divisor.
    pub fn checked_rem(self, rhs: Int) -> Option<Int> {
        self.value().checked_rem(rhs.value()).map(Int::new)
    }
}

/* ───────────────────────── conversions ───────────────────────── */

macro_rules! widen {
    ($($from:ident => $to:ident),* $(,)?) => {$(
        impl From<$from> for $to {
            fn from(value: $from) -> Self {
                Self::from_f64(value.to_f64())
            }
        }
    )*};
}

widen! {
    Int => Number,
    Bool => Number,
    Number => Int,
    Bool => Int,
    Int => Bool,
    Number => Bool,
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<i32> for Int {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl From<bool> for Bool {
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}

impl<K: Numeric> From<Scalar<K>> for f64 {
    fn from(value: Scalar<K>) -> Self {
        value.to_f64()
    }
}

impl From<Int> for i32 {
    fn from(value: Int) -> Self {
        value.value()
    }
}

impl From<Bool> for bool {
    fn from(value: Bool) -> Self {
        value.value()
    }
}

/* ───────────────────────── error view ───────────────────────── */

/// Error codes the host understands.
///
/// `Display` renders them exactly as the host shows them (`#DIV/0!`, ...).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExcelErrorKind {
    Null = 0,
    Div0 = 7,
    Value = 15,
    Ref = 23,
    Name = 29,
    Num = 36,
    Na = 42,
    GettingData = 43,
}

impl ExcelErrorKind {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Null,
            7 => Self::Div0,
            15 => Self::Value,
            23 => Self::Ref,
            29 => Self::Name,
            36 => Self::Num,
            42 => Self::Na,
            43 => Self::GettingData,
            _ => return None,
        })
    }
}

impl fmt::Display for ExcelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "#NULL!",
            Self::Div0 => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
            Self::GettingData => "#GETTING_DATA",
        })
    }
}

impl ExcelError {
    pub const NULL: Self = Self::from_code(0);
    pub const DIV0: Self = Self::from_code(7);
    pub const VALUE: Self = Self::from_code(15);
    pub const REF: Self = Self::from_code(23);
    pub const NAME: Self = Self::from_code(29);
    pub const NUM: Self = Self::from_code(36);
    pub const NA: Self = Self::from_code(42);

    pub const fn from_code(code: i32) -> Self {
        Self {
            oper: XlOper::error(code),
            kind: PhantomData,
        }
    }

    pub fn code(&self) -> i32 {
        self.value()
    }

    /// `None` for codes the host does not define.
    pub fn kind(&self) -> Option<ExcelErrorKind> {
        ExcelErrorKind::from_code(self.code())
    }
}

impl From<ExcelErrorKind> for ExcelError {
    fn from(kind: ExcelErrorKind) -> Self {
        Self::from_code(kind.code())
    }
}

impl PartialEq for ExcelError {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for ExcelError {}

impl PartialEq<ExcelErrorKind> for ExcelError {
    fn eq(&self, other: &ExcelErrorKind) -> bool {
        self.code() == other.code()
    }
}

/* ───────────────────────── empty markers ───────────────────────── */

impl PartialEq for Nil {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl PartialEq for Missing {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl From<Missing> for Nil {
    fn from(_: Missing) -> Self {
        Nil::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_records() -> Vec<XlOper> {
        vec![
            XlOper::number(1.5),
            XlOper::int(2),
            XlOper::boolean(true),
            XlOper::error(42),
            XlOper::nil(),
            XlOper::missing(),
            XlOper::empty_multi(),
        ]
    }

    fn check_view<K: ScalarKind>() {
        for oper in all_records() {
            let tag = oper.tag().unwrap();
            let built = Scalar::<K>::from_oper(&oper);
            if Scalar::<K>::accepts(tag) {
                let view = built.unwrap();
                assert_eq!(view.as_oper().tag(), Some(K::TAG));
            } else {
                assert!(
                    matches!(built, Err(XllError::InvalidTag { view, .. }) if view == K::NAME),
                    "{} accepted {tag}",
                    K::NAME
                );
            }
        }
    }

    #[test]
    fn every_view_rejects_foreign_tags() {
        check_view::<NumberKind>();
        check_view::<IntKind>();
        check_view::<BoolKind>();
        check_view::<ErrKind>();
        check_view::<NilKind>();
        check_view::<MissingKind>();
    }

    #[test]
    fn accepted_tags_are_normalised() {
        let n = Number::from_oper(&XlOper::boolean(true)).unwrap();
        assert_eq!(n.value(), 1.0);

        let i = Int::from_oper(&XlOper::number(2.9)).unwrap();
        assert_eq!(i.value(), 2);
        assert_eq!(i.as_oper().tag(), Some(XlType::Int));

        let b = Bool::from_oper(&XlOper::int(0)).unwrap();
        assert!(!b.value());
        assert!(Bool::from_oper(&XlOper::number(-0.5)).unwrap().value());
    }

    #[test]
    fn ownership_bits_do_not_leak_into_views() {
        let mut oper = XlOper::number(3.0);
        oper.set_dll_free();
        let n = Number::from_oper(&oper).unwrap();
        assert!(!n.as_oper().has_dll_free());
    }

    #[test]
    fn defaults_are_zero_values() {
        assert_eq!(Number::default().value(), 0.0);
        assert_eq!(Int::default().value(), 0);
        assert!(!Bool::default().value());
        assert_eq!(ExcelError::default(), ExcelError::NULL);
    }

    #[test]
    fn mixed_arithmetic_follows_the_left_operand() {
        let i = Int::new(1) + Number::new(1.5);
        assert_eq!(i.value(), 2);

        let n = Number::new(1.5) + Int::new(1);
        assert_eq!(n.value(), 2.5);

        let mut acc = Number::new(10.0);
        acc -= 4;
        acc *= Bool::new(true);
        acc /= 2.0;
        assert_eq!(acc, 3.0);

        assert_eq!((Int::new(7) / 2).value(), 3);
    }

    #[test]
    fn numeric_views_compare_across_kinds() {
        assert_eq!(Int::new(1), Bool::new(true));
        assert_eq!(Number::new(2.0), Int::new(2));
        assert!(Int::new(3) > Number::new(2.5));
        assert!(Number::new(-1.0) < 0);
        assert!(Number::new(f64::NAN).partial_cmp(&Number::new(0.0)).is_none());
    }

    #[test]
    fn int_extras() {
        let mut i = Int::new(5);
        i.increment();
        i.increment();
        i.decrement();
        assert_eq!(i.value(), 6);
        assert_eq!(i.checked_rem(Int::new(4)), Some(Int::new(2)));
        assert_eq!(i.checked_rem(Int::new(0)), None);
    }

    #[test]
    fn infallible_conversions() {
        assert_eq!(Number::from(Int::new(4)).value(), 4.0);
        assert_eq!(Int::from(Number::new(-3.7)).value(), -3);
        assert!(Bool::from(Number::new(0.1)).value());
        assert_eq!(f64::from(Bool::new(true)), 1.0);
        assert_eq!(i32::from(Int::from(9)), 9);
    }

    #[test]
    fn error_rendering_and_identity() {
        assert_eq!(ExcelError::DIV0.to_string(), "#DIV/0!");
        assert_eq!(ExcelError::NA.to_string(), "#N/A");
        assert_eq!(ExcelError::from_code(99).to_string(), "UNKNOWN_ERROR#99");
        assert_eq!(ExcelError::from_code(99).kind(), None);
        assert_eq!(ExcelError::from(ExcelErrorKind::Num), ExcelError::NUM);
        assert_eq!(ExcelError::VALUE, ExcelErrorKind::Value);
        assert_ne!(ExcelError::REF, ExcelError::NAME);
    }

    #[test]
    fn display_of_scalars() {
        assert_eq!(Bool::new(true).to_string(), "TRUE");
        assert_eq!(Int::new(-4).to_string(), "-4");
        assert_eq!(Number::new(0.25).to_string(), "0.25");
        assert_eq!(Nil::default().to_string(), "");
        assert_eq!(format!("{:?}", Int::new(3)), "Int(3)");
    }

    #[test]
    fn missing_converts_to_nil() {
        let nil: Nil = Missing::default().into();
        assert_eq!(nil.as_oper().tag(), Some(XlType::Nil));
        assert!(Nil::from_oper(&XlOper::missing()).is_err());
    }
}
