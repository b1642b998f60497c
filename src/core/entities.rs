//! Opt-in entity reference decoding.
//!
//! Tokenizer output carries references verbatim; callers decode spans they
//! care about with [`decode`]. Named references resolve against a sorted
//! compile-time table; numeric references (`&#NNN;` and `&#xHH;`) accept
//! code points up to `0x1FFFFF` and are encoded to UTF-8 bytes directly,
//! which admits values `char` would reject (surrogates, planes past
//! Unicode). Anything malformed or unknown is passed through verbatim;
//! decoding never fails.

use std::borrow::Cow;

use memchr::memchr;

use crate::core::entity_table::ENTITIES;

/// Largest code point a numeric reference may carry.
const MAX_CODE_POINT: u32 = 0x1F_FFFF;

/// Decodes entity references in `input`. Borrows the input untouched when
/// it contains no `&`.
pub fn decode(input: &[u8]) -> Cow<'_, [u8]> {
    let Some(first) = memchr(b'&', input) else {
        return Cow::Borrowed(input);
    };

    let mut out = Vec::with_capacity(input.len());
    out.extend_from_slice(&input[..first]);
    let mut pos = first;
    while pos < input.len() {
        debug_assert_eq!(input[pos], b'&');
        match decode_ref(&input[pos..], &mut out) {
            Some(consumed) => pos += consumed,
            None => {
                out.push(b'&');
                pos += 1;
            }
        }
        match memchr(b'&', &input[pos..]) {
            Some(next) => {
                out.extend_from_slice(&input[pos..pos + next]);
                pos += next;
            }
            None => {
                out.extend_from_slice(&input[pos..]);
                break;
            }
        }
    }
    Cow::Owned(out)
}

/// Convenience wrapper producing a `String`, replacing invalid UTF-8.
pub fn decode_to_string(input: &[u8]) -> String {
    String::from_utf8_lossy(&decode(input)).into_owned()
}

/// Attempts to decode one reference at the start of `input` (which begins
/// with `&`). On success appends the replacement to `out` and returns the
/// number of input bytes consumed, terminator included.
fn decode_ref(input: &[u8], out: &mut Vec<u8>) -> Option<usize> {
    let body = &input[1..];
    if body.first() == Some(&b'#') {
        let digits = &body[1..];
        let (radix, digits, skip) = match digits.first() {
            Some(&b'x') | Some(&b'X') => (16u32, &digits[1..], 3usize),
            _ => (10u32, digits, 2usize),
        };
        let mut value: u32 = 0;
        let mut used = 0;
        for &b in digits {
            if b == b';' {
                break;
            }
            let digit = (b as char).to_digit(radix)?;
            value = value.saturating_mul(radix).saturating_add(digit);
            if value > MAX_CODE_POINT {
                return None;
            }
            used += 1;
        }
        if used == 0 || digits.get(used) != Some(&b';') {
            return None;
        }
        push_utf8(value, out);
        return Some(skip + used + 1);
    }

    // Named reference: everything up to the nearest ';'.
    let semi = memchr(b';', body)?;
    let name = std::str::from_utf8(&body[..semi]).ok()?;
    let index = ENTITIES
        .binary_search_by(|(entry, _)| entry.cmp(&name))
        .ok()?;
    out.extend_from_slice(ENTITIES[index].1.as_bytes());
    Some(semi + 2)
}

/// Encodes `cp` as UTF-8 without going through `char`, so code points past
/// the Unicode range (up to [`MAX_CODE_POINT`]) still produce bytes.
fn push_utf8(cp: u32, out: &mut Vec<u8>) {
    if cp < 0x80 {
        out.push(cp as u8);
    } else if cp < 0x800 {
        out.push(0xC0 | (cp >> 6) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else if cp < 0x1_0000 {
        out.push(0xE0 | (cp >> 12) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else {
        out.push(0xF0 | (cp >> 18) as u8);
        out.push(0x80 | ((cp >> 12) & 0x3F) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    }
}
