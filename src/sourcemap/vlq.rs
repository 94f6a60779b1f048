//! Base64 VLQ digits as used by the `mappings` field of a v3 source map.
//!
//! Each digit carries five value bits and a continuation bit. The first digit's
//! lowest value bit is the sign.
use crate::types::errors::VlqError;

const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_BASE_MASK: u64 = (1 << VLQ_BASE_SHIFT) - 1;
const VLQ_CONTINUATION_BIT: u64 = 1 << VLQ_BASE_SHIFT;
/// Source maps carry 32-bit signed values; anything wider is corrupt.
const MAX_SHIFT: u32 = 32;

fn base64_value(byte: u8) -> Option<u64> {
    let value = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(u64::from(value))
}

/// Decode every value of one comma-separated segment into `out`.
pub fn decode_segment(segment: &str, out: &mut Vec<i64>) -> Result<(), VlqError> {
    let mut accum = 0u64;
    let mut shift = 0u32;

    for byte in segment.bytes() {
        let digit = base64_value(byte).ok_or(VlqError::InvalidDigit(char::from(byte)))?;
        if shift > MAX_SHIFT {
            return Err(VlqError::Overflow(segment.to_string()));
        }
        accum |= (digit & VLQ_BASE_MASK) << shift;

        if digit & VLQ_CONTINUATION_BIT != 0 {
            shift += VLQ_BASE_SHIFT;
            continue;
        }

        let magnitude = i64::try_from(accum >> 1)
            .map_err(|_| VlqError::Overflow(segment.to_string()))?;
        out.push(if accum & 1 == 1 { -magnitude } else { magnitude });
        accum = 0;
        shift = 0;
    }

    if shift != 0 {
        return Err(VlqError::Unterminated(segment.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(segment: &str) -> Result<Vec<i64>, VlqError> {
        let mut out = Vec::new();
        decode_segment(segment, &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_single_digit_values() {
        assert_eq!(decode("AAAA").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(decode("CDEF").unwrap(), vec![1, -1, 2, -2]);
        assert_eq!(decode("e").unwrap(), vec![15]);
    }

    #[test]
    fn test_continuation_digits() {
        // 16 needs a second digit: 'g' is 0 with continuation, 'B' is 1.
        assert_eq!(decode("gB").unwrap(), vec![16]);
        assert_eq!(decode("hB").unwrap(), vec![-16]);
        assert_eq!(decode("SAASA").unwrap(), vec![9, 0, 0, 9, 0]);
    }

    #[test]
    fn test_invalid_digit() {
        assert_eq!(decode("AA*A"), Err(VlqError::InvalidDigit('*')));
    }

    #[test]
    fn test_unterminated_continuation() {
        assert!(matches!(decode("Ag"), Err(VlqError::Unterminated(_))));
    }

    #[test]
    fn test_overflow() {
        assert!(matches!(decode("gggggggggB"), Err(VlqError::Overflow(_))));
    }
}
