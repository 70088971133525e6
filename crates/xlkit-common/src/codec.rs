//! UTF-8 <-> host text (UTF-16 code units) conversion.

use crate::error::XllError;
use crate::record::XChar;

/// Longest text the host's length-prefixed strings can carry.
pub const MAX_STRING_UNITS: usize = 32_767;

/// Encode UTF-8 text as host code units, without prefix or terminator.
pub fn encode(text: &str) -> Result<Box<[XChar]>, XllError> {
    let units: Box<[XChar]> = text.encode_utf16().collect();
    if units.len() > MAX_STRING_UNITS {
        return Err(XllError::StringTooLong {
            units: units.len(),
            max: MAX_STRING_UNITS,
        });
    }
    Ok(units)
}

/// Decode host code units to UTF-8. Unpaired surrogates are an error.
pub fn decode(units: &[XChar]) -> Result<String, XllError> {
    String::from_utf16(units).map_err(|e| XllError::Encoding(e.to_string()))
}

/// Decode, substituting U+FFFD for unpaired surrogates.
pub fn decode_lossy(units: &[XChar]) -> String {
    String::from_utf16_lossy(units)
}

/// Build the host's `[count, units.., 0]` buffer.
pub(crate) fn length_prefixed(units: &[XChar]) -> Box<[XChar]> {
    debug_assert!(units.len() <= MAX_STRING_UNITS);
    let mut buffer = Vec::with_capacity(units.len() + 2);
    buffer.push(units.len() as XChar);
    buffer.extend_from_slice(units);
    buffer.push(0);
    buffer.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ascii_and_empty() {
        assert!(encode("").unwrap().is_empty());
        assert_eq!(&*encode("ab").unwrap(), &[0x61, 0x62]);
        assert_eq!(decode(&[]).unwrap(), "");
    }

    #[test]
    fn astral_text_uses_surrogate_pairs() {
        let units = encode("🧮").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(decode(&units).unwrap(), "🧮");
    }

    #[test]
    fn unpaired_surrogate_is_an_encoding_error() {
        let err = decode(&[0xD800]).unwrap_err();
        assert!(err.is_encoding());
        assert_eq!(decode_lossy(&[0xD800]), "\u{FFFD}");
    }

    #[test]
    fn length_limit_is_inclusive() {
        let at_limit = "x".repeat(MAX_STRING_UNITS);
        assert_eq!(encode(&at_limit).unwrap().len(), MAX_STRING_UNITS);

        let over = "x".repeat(MAX_STRING_UNITS + 1);
        assert_eq!(
            encode(&over).unwrap_err(),
            XllError::StringTooLong {
                units: MAX_STRING_UNITS + 1,
                max: MAX_STRING_UNITS
            }
        );
    }

    #[test]
    fn prefixed_buffer_layout() {
        let buf = length_prefixed(&[0x41, 0x42]);
        assert_eq!(&*buf, &[2, 0x41, 0x42, 0]);
        assert_eq!(&*length_prefixed(&[]), &[0, 0]);
    }

    proptest! {
        #[test]
        fn any_short_text_survives_the_host_encoding(s in "\\PC{0,200}") {
            let units = encode(&s).unwrap();
            prop_assert_eq!(decode(&units).unwrap(), s);
        }
    }
}
