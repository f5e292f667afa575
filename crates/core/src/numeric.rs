//! Sortable string encoding for numeric field values
//!
//! Numeric fields are indexed as a single fixed-width hex term whose
//! lexicographic order matches numeric order. The sign bit is flipped so
//! negative values sort before positive ones. Range queries compare these
//! encoded terms directly.

use crate::field::NumericKind;

/// Marker prepended to encoded 32-bit values.
const INT_MARKER: char = 'i';
/// Marker prepended to encoded 64-bit values.
const LONG_MARKER: char = 'l';

/// Encode a 32-bit integer as an order-preserving term.
pub fn encode_int(value: i32) -> String {
    format!("{}{:08x}", INT_MARKER, (value as u32) ^ 0x8000_0000)
}

/// Decode a term produced by [`encode_int`].
pub fn decode_int(term: &str) -> Option<i32> {
    let hex = term.strip_prefix(INT_MARKER)?;
    if hex.len() != 8 {
        return None;
    }
    let bits = u32::from_str_radix(hex, 16).ok()?;
    Some((bits ^ 0x8000_0000) as i32)
}

/// Encode a 64-bit integer as an order-preserving term.
pub fn encode_long(value: i64) -> String {
    format!("{}{:016x}", LONG_MARKER, (value as u64) ^ (1u64 << 63))
}

/// Decode a term produced by [`encode_long`].
pub fn decode_long(term: &str) -> Option<i64> {
    let hex = term.strip_prefix(LONG_MARKER)?;
    if hex.len() != 16 {
        return None;
    }
    let bits = u64::from_str_radix(hex, 16).ok()?;
    Some((bits ^ (1u64 << 63)) as i64)
}

/// Lowest and highest terms bracketing every encoded value of `kind`.
///
/// Open range bounds use these so that placeholder terms such as `-`,
/// which sort outside the encoded block, never fall inside a range.
pub fn term_limits(kind: NumericKind) -> (String, String) {
    let (marker, next) = match kind {
        NumericKind::Int => (INT_MARKER, 'j'),
        NumericKind::Long => (LONG_MARKER, 'm'),
    };
    (marker.to_string(), next.to_string())
}
