//! Closed sums over scalar views.
//!
//! `Variant<(A, B, ..)>` stores exactly one of its alternatives inline in a
//! single record, discriminated by the record's own tag. The alternative
//! set is a tuple of up to six [`Alternative`] types; at monomorphisation
//! time it is checked for unique tags and for exactly one [`Nil`].

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;

use crate::error::XllError;
use crate::record::{Overlay, XlOper, XlType, adopt, overlay, overlay_mut, surrender};
use crate::scalar::{Bool, ExcelError, Int, Missing, Nil, Number};
use crate::string::XlString;
use crate::value::Value;

mod sealed {
    pub trait Sealed {}
}

/// A scalar view that may appear in a [`Variant`].
pub trait Alternative: Value + sealed::Sealed + 'static {
    const TAG: XlType;

    fn matches(tag: XlType) -> bool {
        tag == Self::TAG
    }

    /// Owning copy of a record for which [`Alternative::matches`] holds.
    fn copy_from(oper: &XlOper) -> Result<Self, XllError> {
        Self::from_oper(oper)
    }
}

macro_rules! alternative {
    ($($ty:ty => $tag:ident),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}
        impl Alternative for $ty {
            const TAG: XlType = XlType::$tag;
        }
    )*};
}

alternative! {
    Bool => Bool,
    Int => Int,
    Number => Num,
    XlString => Str,
    ExcelError => Err,
}

impl sealed::Sealed for Nil {}

// The only empty alternative; a missing argument lands here too.
impl Alternative for Nil {
    const TAG: XlType = XlType::Nil;

    fn matches(tag: XlType) -> bool {
        matches!(tag, XlType::Nil | XlType::Missing)
    }

    fn copy_from(_: &XlOper) -> Result<Self, XllError> {
        Ok(Nil::default())
    }
}

/// A tuple of alternatives.
pub trait Alternatives: 'static {
    /// Tags in declaration order.
    const TAGS: &'static [XlType];

    #[doc(hidden)]
    fn copy_active(oper: &XlOper) -> Option<Result<XlOper, XllError>>;

    #[doc(hidden)]
    fn clone_active(oper: &XlOper) -> XlOper;

    /// # Safety
    /// `oper` must be owned by a variant over this set.
    #[doc(hidden)]
    unsafe fn release_active(oper: &mut XlOper);
}

/// Type-level proof that `U` is one of the alternatives of `Self`; `I` is
/// its position and is always inferred.
pub trait Member<U: Alternative, I> {}

pub enum P0 {}
pub enum P1 {}
pub enum P2 {}
pub enum P3 {}
pub enum P4 {}
pub enum P5 {}

macro_rules! alternatives {
    ($ts:tt; $($p:ident => $u:ident),+) => {
        $( alternatives!(@member $ts $p $u); )+
        alternatives!(@set $ts);
    };
    (@member [$($t:ident),+] $p:ident $u:ident) => {
        impl<$($t: Alternative),+> Member<$u, $p> for ($($t,)+) {}
    };
    (@set [$($t:ident),+]) => {
        impl<$($t: Alternative),+> Alternatives for ($($t,)+) {
            const TAGS: &'static [XlType] = &[$($t::TAG),+];

            fn copy_active(oper: &XlOper) -> Option<Result<XlOper, XllError>> {
                let tag = oper.tag()?;
                $(
                    if $t::matches(tag) {
                        return Some($t::copy_from(oper).map(surrender));
                    }
                )+
                None
            }

            fn clone_active(oper: &XlOper) -> XlOper {
                if let Some(tag) = oper.tag() {
                    $(
                        if $t::matches(tag) {
                            return surrender(overlay::<$t>(oper).clone());
                        }
                    )+
                }
                *oper
            }

            unsafe fn release_active(oper: &mut XlOper) {
                if let Some(tag) = oper.tag() {
                    $(
                        if $t::matches(tag) {
                            // SAFETY: the variant owns a `$t` in this record.
                            drop(unsafe { adopt::<$t>(*oper) });
                            *oper = XlOper::nil();
                            return;
                        }
                    )+
                }
            }
        }
    };
}

alternatives!([A]; P0 => A);
alternatives!([A, B]; P0 => A, P1 => B);
alternatives!([A, B, C]; P0 => A, P1 => B, P2 => C);
alternatives!([A, B, C, D]; P0 => A, P1 => B, P2 => C, P3 => D);
alternatives!([A, B, C, D, E]; P0 => A, P1 => B, P2 => C, P3 => D, P4 => E);
alternatives!([A, B, C, D, E, F]; P0 => A, P1 => B, P2 => C, P3 => D, P4 => E, P5 => F);

const fn well_formed(tags: &[XlType]) -> bool {
    let mut nils = 0;
    let mut i = 0;
    while i < tags.len() {
        if tags[i] as u32 == XlType::Nil as u32 {
            nils += 1;
        }
        let mut j = i + 1;
        while j < tags.len() {
            if tags[i] as u32 == tags[j] as u32 {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    nils == 1
}

/// Borrowed view of the active alternative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'a> {
    Bool(&'a Bool),
    Int(&'a Int),
    Number(&'a Number),
    String(&'a XlString),
    Error(&'a ExcelError),
    Nil,
}

#[repr(transparent)]
pub struct Variant<S: Alternatives> {
    oper: XlOper,
    set: PhantomData<fn() -> S>,
}

/// Every value kind the host can hand to a scalar argument.
pub type AnyValue = Variant<(Nil, Bool, Int, Number, XlString, ExcelError)>;

impl<S: Alternatives> Variant<S> {
    const WELL_FORMED: () = assert!(
        well_formed(S::TAGS),
        "variant alternatives need unique tags and exactly one Nil"
    );

    fn from_raw(oper: XlOper) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::WELL_FORMED;
        Self {
            oper,
            set: PhantomData,
        }
    }

    pub fn new<U: Alternative, I>(value: U) -> Self
    where
        S: Member<U, I>,
    {
        Self::from_raw(surrender(value))
    }

    /// Tag of the active alternative.
    pub fn tag(&self) -> XlType {
        self.oper.tag().unwrap_or(XlType::Nil)
    }

    pub fn holds<U: Alternative, I>(&self) -> bool
    where
        S: Member<U, I>,
    {
        self.oper.tag().is_some_and(U::matches)
    }

    pub fn is_nil(&self) -> bool {
        self.oper.is(XlType::Nil)
    }

    pub fn get<U: Alternative, I>(&self) -> Result<&U, XllError>
    where
        S: Member<U, I>,
    {
        if self.holds::<U, I>() {
            Ok(overlay(&self.oper))
        } else {
            Err(self.bad_access::<U>())
        }
    }

    pub fn get_mut<U: Alternative, I>(&mut self) -> Result<&mut U, XllError>
    where
        S: Member<U, I>,
    {
        if self.holds::<U, I>() {
            Ok(overlay_mut(&mut self.oper))
        } else {
            Err(self.bad_access::<U>())
        }
    }

    /// Move the active alternative out if it is `U`.
    pub fn into_inner<U: Alternative, I>(self) -> Result<U, XllError>
    where
        S: Member<U, I>,
    {
        if !self.holds::<U, I>() {
            return Err(self.bad_access::<U>());
        }
        let this = ManuallyDrop::new(self);
        // SAFETY: the tag says the record holds a `U`; `this` is never dropped.
        Ok(unsafe { adopt(this.oper) })
    }

    /// Replace the active alternative, dropping the old one first.
    pub fn set<U: Alternative, I>(&mut self, value: U)
    where
        S: Member<U, I>,
    {
        *self = Self::new(value);
    }

    pub fn as_value_ref(&self) -> Result<ValueRef<'_>, XllError> {
        let tag = self.oper.tag();
        let active = S::TAGS.iter().copied().find(|t| Some(*t) == tag);
        Ok(match active {
            Some(XlType::Bool) => ValueRef::Bool(overlay(&self.oper)),
            Some(XlType::Int) => ValueRef::Int(overlay(&self.oper)),
            Some(XlType::Num) => ValueRef::Number(overlay(&self.oper)),
            Some(XlType::Str) => ValueRef::String(overlay(&self.oper)),
            Some(XlType::Err) => ValueRef::Error(overlay(&self.oper)),
            Some(XlType::Nil) => ValueRef::Nil,
            _ => {
                return Err(XllError::BadVariantAccess {
                    requested: "any declared alternative",
                    found: self.oper.raw_type(),
                });
            }
        })
    }

    /// Dispatch on the active alternative.
    pub fn visit<R>(&self, f: impl FnOnce(ValueRef<'_>) -> R) -> Result<R, XllError> {
        self.as_value_ref().map(f)
    }

    fn bad_access<U: Alternative>(&self) -> XllError {
        XllError::BadVariantAccess {
            requested: U::TYPE_NAME,
            found: self.oper.raw_type(),
        }
    }
}

/// Free-function form of [`Variant::visit`].
pub fn visit<S: Alternatives, R>(
    variant: &Variant<S>,
    f: impl FnOnce(ValueRef<'_>) -> R,
) -> Result<R, XllError> {
    variant.visit(f)
}

impl<S: Alternatives> Default for Variant<S> {
    fn default() -> Self {
        Self::from_raw(XlOper::nil())
    }
}

impl<S: Alternatives> From<Missing> for Variant<S> {
    fn from(_: Missing) -> Self {
        Self::default()
    }
}

impl<S: Alternatives> Clone for Variant<S> {
    fn clone(&self) -> Self {
        Self::from_raw(S::clone_active(&self.oper))
    }
}

impl<S: Alternatives> Drop for Variant<S> {
    fn drop(&mut self) {
        // SAFETY: `oper` is owned by this variant.
        unsafe { S::release_active(&mut self.oper) }
    }
}

impl<S: Alternatives> PartialEq for Variant<S> {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_value_ref(), other.as_value_ref()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl<S: Alternatives> fmt::Debug for Variant<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_value_ref() {
            Ok(v) => write!(f, "Variant({v:?})"),
            Err(_) => write!(f, "Variant(<tag {:#06x}>)", self.oper.raw_type()),
        }
    }
}

impl<S: Alternatives> fmt::Display for Variant<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_value_ref() {
            Ok(ValueRef::Bool(v)) => fmt::Display::fmt(v, f),
            Ok(ValueRef::Int(v)) => fmt::Display::fmt(v, f),
            Ok(ValueRef::Number(v)) => fmt::Display::fmt(v, f),
            Ok(ValueRef::String(v)) => fmt::Display::fmt(v, f),
            Ok(ValueRef::Error(v)) => fmt::Display::fmt(v, f),
            Ok(ValueRef::Nil) | Err(_) => Ok(()),
        }
    }
}

// SAFETY: repr(transparent) over XlOper plus a zero-sized marker.
unsafe impl<S: Alternatives> Overlay for Variant<S> {
    fn as_oper(&self) -> &XlOper {
        &self.oper
    }
}

impl<S: Alternatives> Value for Variant<S> {
    const TYPE_NAME: &'static str = "Variant";

    fn from_oper(oper: &XlOper) -> Result<Self, XllError> {
        match S::copy_active(oper) {
            Some(copied) => copied.map(Self::from_raw),
            None => Err(XllError::InvalidTag {
                view: Self::TYPE_NAME,
                found: oper.raw_type(),
            }),
        }
    }
}
