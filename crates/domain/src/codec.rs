//! Byte and hex-string codecs shared by the send path and the script sandbox.
//!
//! Decoders never fail: out-of-range reads yield `0`, and malformed hex
//! yields `None` (strict) or the decodable prefix (lenient).

/// Remove every character that is not an ASCII hex digit.
#[must_use]
pub fn strip_non_hex(value: &str) -> String {
    value.chars().filter(char::is_ascii_hexdigit).collect()
}

/// Strictly decode a hex string after stripping separators.
///
/// Returns `None` when nothing is left after stripping or when the digit
/// count is odd.
#[must_use]
pub fn decode_hex(value: &str) -> Option<Vec<u8>> {
    let clean = strip_non_hex(value);
    if clean.is_empty() || clean.len() % 2 != 0 {
        return None;
    }
    Some(decode_pairs(&clean))
}

/// Decode as many complete digit pairs as the stripped input holds.
///
/// A trailing unpaired digit is ignored.
#[must_use]
pub fn decode_hex_lenient(value: &str) -> Vec<u8> {
    decode_pairs(&strip_non_hex(value))
}

fn decode_pairs(clean: &str) -> Vec<u8> {
    clean
        .as_bytes()
        .chunks_exact(2)
        .map(|pair| (nibble(pair[0]) << 4) | nibble(pair[1]))
        .collect()
}

fn nibble(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}

/// Format bytes as space-separated two-digit hex (`48 65 6c`).
#[must_use]
pub fn encode_hex(bytes: &[u8], uppercase: bool) -> String {
    bytes
        .iter()
        .map(|b| {
            if uppercase {
                format!("{b:02X}")
            } else {
                format!("{b:02x}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode an unsigned integer of `len` bytes (1..=4) starting at `offset`.
///
/// Returns `0` when the range falls outside `bytes` or `len` is unsupported.
#[must_use]
pub fn bytes_to_u32(bytes: &[u8], offset: usize, len: usize, big_endian: bool) -> u32 {
    if len == 0 || len > 4 {
        return 0;
    }
    let Some(window) = offset.checked_add(len).and_then(|end| bytes.get(offset..end)) else {
        return 0;
    };
    let fold = |acc: u32, b: &u8| (acc << 8) | u32::from(*b);
    if big_endian {
        window.iter().fold(0, fold)
    } else {
        window.iter().rev().fold(0, fold)
    }
}

/// Decode an IEEE-754 single-precision float from four bytes at `offset`.
///
/// Returns `0.0` when fewer than four bytes are available.
#[must_use]
pub fn bytes_to_f32(bytes: &[u8], offset: usize, big_endian: bool) -> f32 {
    let Some(window) = offset.checked_add(4).and_then(|end| bytes.get(offset..end)) else {
        return 0.0;
    };
    let mut raw = [0u8; 4];
    raw.copy_from_slice(window);
    if big_endian {
        f32::from_be_bytes(raw)
    } else {
        f32::from_le_bytes(raw)
    }
}
