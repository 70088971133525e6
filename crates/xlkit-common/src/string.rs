//! Owning, length-prefixed host text.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;

use crate::codec::{self, MAX_STRING_UNITS};
use crate::error::XllError;
use crate::record::{Overlay, XChar, XlOper};
use crate::value::Value;

/// Host text value.
///
/// Owns a `[count, units.., 0]` buffer of UTF-16 code units. The empty
/// string is the two-unit sentinel `[0, 0]`. Cloning copies the buffer;
/// moving out with [`std::mem::take`] leaves the sentinel behind.
#[repr(transparent)]
pub struct XlString {
    oper: XlOper,
}

impl XlString {
    pub fn new(text: &str) -> Result<Self, XllError> {
        let units = codec::encode(text)?;
        Ok(Self::from_units_unchecked(&units))
    }

    /// Build from raw host code units; no decoding is attempted.
    pub fn from_units(units: &[XChar]) -> Result<Self, XllError> {
        if units.len() > MAX_STRING_UNITS {
            return Err(XllError::StringTooLong {
                units: units.len(),
                max: MAX_STRING_UNITS,
            });
        }
        Ok(Self::from_units_unchecked(units))
    }

    fn from_units_unchecked(units: &[XChar]) -> Self {
        Self {
            oper: XlOper::from_string_buffer(codec::length_prefixed(units)),
        }
    }

    /// Code units without prefix or terminator.
    pub fn units(&self) -> &[XChar] {
        self.oper.str_units().unwrap_or(&[])
    }

    /// Length in code units.
    pub fn len(&self) -> usize {
        self.units().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units().is_empty()
    }

    pub fn to_utf8(&self) -> Result<String, XllError> {
        codec::decode(self.units())
    }

    pub fn to_string_lossy(&self) -> String {
        codec::decode_lossy(self.units())
    }

    pub fn concat(&self, other: &XlString) -> Result<XlString, XllError> {
        let mut text = self.to_utf8()?;
        text.push_str(&other.to_utf8()?);
        XlString::new(&text)
    }

    pub fn concat_str(&self, other: &str) -> Result<XlString, XllError> {
        let mut text = self.to_utf8()?;
        text.push_str(other);
        XlString::new(&text)
    }

    /// Copy with leading and trailing whitespace removed.
    pub fn trim(&self) -> Result<XlString, XllError> {
        XlString::new(self.to_utf8()?.trim())
    }

    pub fn to_upper(&self) -> Result<XlString, XllError> {
        XlString::new(&self.to_utf8()?.to_uppercase())
    }

    /// Scalar values in order; an unpaired surrogate stands for itself and
    /// sorts after every scalar value.
    fn chars(&self) -> impl Iterator<Item = Result<char, u16>> + '_ {
        char::decode_utf16(self.units().iter().copied())
            .map(|c| c.map_err(|e| e.unpaired_surrogate()))
    }
}

impl Default for XlString {
    fn default() -> Self {
        Self::from_units_unchecked(&[])
    }
}

impl Clone for XlString {
    fn clone(&self) -> Self {
        Self::from_units_unchecked(self.units())
    }
}

impl Drop for XlString {
    fn drop(&mut self) {
        // SAFETY: every XlString owns a buffer built by `from_string_buffer`.
        unsafe { self.oper.release_string_buffer() }
    }
}

// SAFETY: repr(transparent) over XlOper.
unsafe impl Overlay for XlString {
    fn as_oper(&self) -> &XlOper {
        &self.oper
    }
}

impl Value for XlString {
    const TYPE_NAME: &'static str = "String";

    fn from_oper(oper: &XlOper) -> Result<Self, XllError> {
        match oper.str_units() {
            Some(units) => Self::from_units(units),
            None => Err(XllError::InvalidTag {
                view: Self::TYPE_NAME,
                found: oper.raw_type(),
            }),
        }
    }
}

impl fmt::Display for XlString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for XlString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XlString({:?})", self.to_string_lossy())
    }
}

impl PartialEq for XlString {
    fn eq(&self, other: &Self) -> bool {
        self.units() == other.units()
    }
}

impl Eq for XlString {}

impl PartialOrd for XlString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for XlString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chars().cmp(other.chars())
    }
}

impl Hash for XlString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.units().hash(state);
    }
}

impl PartialEq<str> for XlString {
    fn eq(&self, other: &str) -> bool {
        self.units().iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for XlString {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl PartialEq<XlString> for &str {
    fn eq(&self, other: &XlString) -> bool {
        *other == **self
    }
}

impl PartialOrd<&str> for XlString {
    fn partial_cmp(&self, other: &&str) -> Option<Ordering> {
        Some(self.chars().cmp(other.chars().map(Ok)))
    }
}

impl TryFrom<&str> for XlString {
    type Error = XllError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::new(text)
    }
}

impl TryFrom<String> for XlString {
    type Error = XllError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new(&text)
    }
}

impl TryFrom<&XlString> for String {
    type Error = XllError;

    fn try_from(s: &XlString) -> Result<Self, Self::Error> {
        s.to_utf8()
    }
}

impl Add<&XlString> for &XlString {
    type Output = Result<XlString, XllError>;

    fn add(self, rhs: &XlString) -> Self::Output {
        self.concat(rhs)
    }
}

impl Add<&str> for &XlString {
    type Output = Result<XlString, XllError>;

    fn add(self, rhs: &str) -> Self::Output {
        self.concat_str(rhs)
    }
}
