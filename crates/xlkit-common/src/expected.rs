//! `Expected<T>`: a success view XOR a host error code, in one record.
//!
//! This is the channel for domain errors that must reach a cell. An
//! `Expected<Number>` either carries a `Number` (record tagged Num) or an
//! [`ExcelError`] (record tagged Err). Nil and Missing inputs degrade to the
//! default error (`#NULL!`), so optional arguments must be checked with
//! [`Expected::has_value`].

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;

use crate::error::XllError;
use crate::record::{Overlay, XlOper, XlType, adopt, overlay, overlay_mut, surrender};
use crate::scalar::{Bool, ExcelError, Int, Missing, Nil, Number};
use crate::string::XlString;
use crate::value::Value;
use crate::variant::Alternative;

/// Success types an [`Expected`] can carry.
pub trait Expectable: Alternative {}

impl Expectable for Bool {}
impl Expectable for Int {}
impl Expectable for Number {}
impl Expectable for XlString {}

/// Marks an error destined for an [`Expected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unexpected(pub ExcelError);

#[repr(transparent)]
pub struct Expected<T: Expectable> {
    oper: XlOper,
    value: PhantomData<fn() -> T>,
}

pub type ExpNumber = Expected<Number>;
pub type ExpString = Expected<XlString>;
pub type ExpInt = Expected<Int>;
pub type ExpBool = Expected<Bool>;

impl<T: Expectable> Expected<T> {
    fn from_raw(oper: XlOper) -> Self {
        Self {
            oper,
            value: PhantomData,
        }
    }

    pub fn new(value: T) -> Self {
        Self::from_raw(surrender(value))
    }

    pub fn from_error(error: ExcelError) -> Self {
        Self::from_raw(error.oper())
    }

    pub fn has_value(&self) -> bool {
        self.oper.is(T::TAG)
    }

    pub fn value(&self) -> Result<&T, XllError> {
        if self.has_value() {
            Ok(overlay(&self.oper))
        } else {
            Err(XllError::BadExpectedAccess("value() called on an error"))
        }
    }

    pub fn value_mut(&mut self) -> Result<&mut T, XllError> {
        if self.has_value() {
            Ok(overlay_mut(&mut self.oper))
        } else {
            Err(XllError::BadExpectedAccess("value_mut() called on an error"))
        }
    }

    pub fn error(&self) -> Result<ExcelError, XllError> {
        if self.has_value() {
            Err(XllError::BadExpectedAccess("error() called on a value"))
        } else {
            Ok(*overlay::<ExcelError>(&self.oper))
        }
    }

    pub fn value_or(self, default: T) -> T {
        self.into_result().unwrap_or(default)
    }

    pub fn error_or(&self, default: ExcelError) -> ExcelError {
        self.error().unwrap_or(default)
    }

    pub fn into_result(self) -> Result<T, ExcelError> {
        let this = ManuallyDrop::new(self);
        if this.has_value() {
            // SAFETY: the record holds a `T` and `this` is never dropped.
            Ok(unsafe { adopt(this.oper) })
        } else {
            Err(*overlay::<ExcelError>(&this.oper))
        }
    }

    pub fn to_result(&self) -> Result<T, ExcelError> {
        self.clone().into_result()
    }

    pub fn and_then<U: Expectable>(self, f: impl FnOnce(T) -> Expected<U>) -> Expected<U> {
        match self.into_result() {
            Ok(value) => f(value),
            Err(error) => Expected::from_error(error),
        }
    }

    pub fn transform<U: Expectable>(self, f: impl FnOnce(T) -> U) -> Expected<U> {
        match self.into_result() {
            Ok(value) => Expected::new(f(value)),
            Err(error) => Expected::from_error(error),
        }
    }

    pub fn or_else(self, f: impl FnOnce(ExcelError) -> Expected<T>) -> Expected<T> {
        match self.into_result() {
            Ok(value) => Expected::new(value),
            Err(error) => f(error),
        }
    }

    pub fn transform_error(self, f: impl FnOnce(ExcelError) -> ExcelError) -> Expected<T> {
        match self.into_result() {
            Ok(value) => Expected::new(value),
            Err(error) => Expected::from_error(f(error)),
        }
    }
}

impl<T: Expectable> Default for Expected<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Expectable> Clone for Expected<T> {
    fn clone(&self) -> Self {
        if self.has_value() {
            Self::new(overlay::<T>(&self.oper).clone())
        } else {
            Self::from_raw(self.oper)
        }
    }
}

impl<T: Expectable> Drop for Expected<T> {
    fn drop(&mut self) {
        if self.has_value() {
            // SAFETY: the record holds an owned `T`.
            drop(unsafe { adopt::<T>(self.oper) });
        }
    }
}

impl<T: Expectable> From<T> for Expected<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Expectable> From<Unexpected> for Expected<T> {
    fn from(Unexpected(error): Unexpected) -> Self {
        Self::from_error(error)
    }
}

impl<T: Expectable> From<Nil> for Expected<T> {
    fn from(_: Nil) -> Self {
        Self::from_error(ExcelError::default())
    }
}

impl<T: Expectable> From<Missing> for Expected<T> {
    fn from(_: Missing) -> Self {
        Self::from_error(ExcelError::default())
    }
}

impl<T: Expectable> From<Result<T, ExcelError>> for Expected<T> {
    fn from(result: Result<T, ExcelError>) -> Self {
        match result {
            Ok(value) => Self::new(value),
            Err(error) => Self::from_error(error),
        }
    }
}

impl<T: Expectable + PartialEq> PartialEq for Expected<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.value(), other.value()) {
            (Ok(a), Ok(b)) => a == b,
            (Err(_), Err(_)) => self.error().ok() == other.error().ok(),
            _ => false,
        }
    }
}

impl<T: Expectable> fmt::Debug for Expected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Ok(value) => write!(f, "Expected({value:?})"),
            Err(_) => write!(f, "Unexpected({})", overlay::<ExcelError>(&self.oper)),
        }
    }
}

// SAFETY: repr(transparent) over XlOper plus a zero-sized marker.
unsafe impl<T: Expectable> Overlay for Expected<T> {
    fn as_oper(&self) -> &XlOper {
        &self.oper
    }
}

impl<T: Expectable> Value for Expected<T> {
    const TYPE_NAME: &'static str = "Expected";

    fn from_oper(oper: &XlOper) -> Result<Self, XllError> {
        match oper.tag() {
            Some(XlType::Err) => Ok(Self::from_error(ExcelError::from_oper(oper)?)),
            Some(XlType::Nil | XlType::Missing) => Ok(Self::from_error(ExcelError::default())),
            _ => T::from_oper(oper)
                .map(Self::new)
                .map_err(|_| XllError::InvalidTag {
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
    fn nil_input_is_the_default_error() {
        let e = ExpNumber::from(Nil::default());
        assert!(!e.has_value());
        assert_eq!(e.error().unwrap(), ExcelError::default());
        assert_eq!(e.error().unwrap(), ExcelError::NULL);

        let m = ExpNumber::from_oper(&XlOper::missing()).unwrap();
        assert!(!m.has_value());
    }

    #[test]
    fn accessors_fail_on_the_wrong_side() {
        let ok = ExpInt::new(Int::new(3));
        assert!(matches!(ok.error(), Err(XllError::BadExpectedAccess(_))));
        assert_eq!(ok.value().unwrap().value(), 3);

        let err = ExpInt::from(Unexpected(ExcelError::VALUE));
        assert!(matches!(err.value(), Err(XllError::BadExpectedAccess(_))));
        assert_eq!(err.error_or(ExcelError::NA), ExcelError::VALUE);
        assert_eq!(err.value_or(Int::new(9)).value(), 9);
    }

    #[test]
    fn and_then_skips_on_error() {
        let mut called = false;
        let out = ExpNumber::from_error(ExcelError::DIV0).and_then(|n| {
            called = true;
            ExpNumber::new(n * 2.0)
        });
        assert!(!called);
        assert_eq!(out.error().unwrap(), ExcelError::DIV0);
    }

    #[test]
    fn and_then_chains_values() {
        let out = ExpNumber::new(Number::new(9.0)).and_then(|n| {
            if n.value() < 0.0 {
                ExpNumber::from_error(ExcelError::NUM)
            } else {
                ExpNumber::new(Number::new(n.value().sqrt()))
            }
        });
        assert_eq!(out.value().unwrap().value(), 3.0);
    }

    #[test]
    fn transform_maps_values_and_kinds() {
        let out: ExpString = ExpNumber::new(Number::new(1.5))
            .transform(|n| XlString::new(&n.to_string()).unwrap_or_default());
        assert_eq!(*out.value().unwrap(), "1.5");

        let err = ExpNumber::from_error(ExcelError::NA).transform(Int::from);
        assert_eq!(err.error().unwrap(), ExcelError::NA);
    }

    #[test]
    fn error_side_mirrors() {
        let mut called = false;
        let untouched = ExpBool::new(Bool::new(true)).or_else(|_| {
            called = true;
            ExpBool::default()
        });
        assert!(!called);
        assert!(untouched.value().unwrap().value());

        let recovered = ExpBool::from_error(ExcelError::REF).or_else(|_| ExpBool::new(Bool::new(false)));
        assert!(recovered.has_value());

        let remapped = ExpBool::from_error(ExcelError::REF).transform_error(|_| ExcelError::NA);
        assert_eq!(remapped.error().unwrap(), ExcelError::NA);

        let kept = ExpBool::new(Bool::new(true)).transform_error(|_| ExcelError::NA);
        assert!(kept.has_value());
    }

    #[test]
    fn string_payloads_are_owned() {
        let s = ExpString::new(XlString::new("held").unwrap());
        let copy = s.clone();
        drop(s);
        assert_eq!(copy.to_result().unwrap(), "held");
        let moved: XlString = copy.into_result().unwrap();
        assert_eq!(moved, "held");
    }

    #[test]
    fn from_oper_coerces_or_rejects() {
        let e = ExpNumber::from_oper(&XlOper::int(4)).unwrap();
        assert_eq!(e.value().unwrap().value(), 4.0);

        let err = ExpNumber::from_oper(&XlOper::error(42)).unwrap();
        assert_eq!(err.error().unwrap(), ExcelError::NA);

        let bad = ExpString::from_oper(&XlOper::number(1.0)).unwrap_err();
        assert!(matches!(bad, XllError::InvalidTag { view: "Expected", .. }));
    }

    #[test]
    fn default_holds_a_default_value() {
        let e = ExpInt::default();
        assert!(e.has_value());
        assert_eq!(e.value().unwrap().value(), 0);
    }

    #[test]
    fn results_convert_both_ways() {
        let ok: ExpInt = Ok(Int::new(5)).into();
        assert_eq!(ok.into_result().unwrap().value(), 5);
        let err: ExpInt = Err(ExcelError::NAME).into();
        assert_eq!(err.into_result().unwrap_err(), ExcelError::NAME);
    }
}
