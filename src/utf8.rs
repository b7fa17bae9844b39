//! String codec for string-typed fields.
//!
//! Decoding is lenient: malformed input never fails, it degrades to U+FFFD.
//! A lead byte that does not start a complete, minimal, non-surrogate
//! sequence of at most U+10FFFF produces one replacement character and
//! scanning resumes at the byte right after that lead. Stray continuation
//! bytes and `0xf8..=0xff` are invalid leads of their own.
//!
//! Ranges longer than [`NATIVE_UTF8_THRESHOLD`] are first handed to
//! `core::str::from_utf8`. Valid input is returned borrowed; invalid input
//! falls back to the hand-rolled state machine, so both paths yield the
//! same text.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;

/// Below this many bytes the hand-rolled paths beat the native ones.
pub const NATIVE_UTF8_THRESHOLD: usize = 16;

pub const REPLACEMENT: char = '\u{fffd}';

trait Sink {
    fn push_char(&mut self, c: char);
}

impl Sink for String {
    #[inline(always)]
    fn push_char(&mut self, c: char) {
        self.push(c);
    }
}

impl Sink for Vec<u16> {
    #[inline(always)]
    fn push_char(&mut self, c: char) {
        let mut units = [0u16; 2];
        self.extend_from_slice(c.encode_utf16(&mut units));
    }
}

#[inline(always)]
fn continuation(bytes: &[u8], index: usize) -> Option<u32> {
    let b = *bytes.get(index)?;
    if b >> 6 == 0b10 {
        Some((b & 0b0011_1111) as u32)
    } else {
        None
    }
}

// Decodes the sequence starting at bytes[0], returning the codepoint and its
// width, or None if the lead byte is invalid.
#[inline(always)]
fn decode_sequence(bytes: &[u8]) -> Option<(char, usize)> {
    let b1 = bytes[0];
    match b1 {
        0x00..=0x7f => Some((b1 as char, 1)),
        0xc0..=0xdf => {
            let codepoint = ((b1 & 0b0001_1111) as u32) << 6 | continuation(bytes, 1)?;
            if codepoint < 0x80 {
                return None;
            }
            Some((char::from_u32(codepoint)?, 2))
        }
        0xe0..=0xef => {
            let codepoint = ((b1 & 0b0000_1111) as u32) << 12
                | continuation(bytes, 1)? << 6
                | continuation(bytes, 2)?;
            // Overlong, or a surrogate (0xd800..=0xdfff) which RFC 3629 forbids.
            if codepoint < 0x800 || codepoint >> 11 == 0b11011 {
                return None;
            }
            Some((char::from_u32(codepoint)?, 3))
        }
        0xf0..=0xf7 => {
            let codepoint = ((b1 & 0b0000_0111) as u32) << 18
                | continuation(bytes, 1)? << 12
                | continuation(bytes, 2)? << 6
                | continuation(bytes, 3)?;
            if !(0x10000..=0x10ffff).contains(&codepoint) {
                return None;
            }
            Some((char::from_u32(codepoint)?, 4))
        }
        _ => None,
    }
}

fn decode_into<S: Sink>(bytes: &[u8], out: &mut S) {
    let mut offset = 0;
    while offset < bytes.len() {
        match decode_sequence(&bytes[offset..]) {
            Some((c, width)) => {
                out.push_char(c);
                offset += width;
            }
            None => {
                out.push_char(REPLACEMENT);
                offset += 1;
            }
        }
    }
}

fn decode_hand_rolled(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    decode_into(bytes, &mut out);
    out
}

/// Decodes `buffer[start..end]`.
///
/// # Panics
///
/// Panics if `start..end` is not a valid range of `buffer`.
pub fn decode_string(buffer: &[u8], start: usize, end: usize) -> Cow<'_, str> {
    let bytes = &buffer[start..end];
    if bytes.len() > NATIVE_UTF8_THRESHOLD {
        if let Ok(s) = core::str::from_utf8(bytes) {
            return Cow::Borrowed(s);
        }
    }
    Cow::Owned(decode_hand_rolled(bytes))
}

/// Decodes `buffer[start..end]` into UTF-16 code units. Codepoints above
/// U+FFFF become surrogate pairs.
///
/// # Panics
///
/// Panics if `start..end` is not a valid range of `buffer`.
pub fn decode_utf16(buffer: &[u8], start: usize, end: usize) -> Vec<u16> {
    let bytes = &buffer[start..end];
    if bytes.len() > NATIVE_UTF8_THRESHOLD {
        if let Ok(s) = core::str::from_utf8(bytes) {
            return s.encode_utf16().collect();
        }
    }
    let mut out = Vec::with_capacity(bytes.len());
    decode_into(bytes, &mut out);
    out
}

#[inline(always)]
fn codepoint_width(codepoint: u32) -> usize {
    match codepoint {
        0..=0x7f => 1,
        0x80..=0x7ff => 2,
        0x800..=0xffff => 3,
        _ => 4,
    }
}

#[inline(always)]
fn write_codepoint(buffer: &mut [u8], offset: usize, codepoint: u32) -> Option<usize> {
    let width = codepoint_width(codepoint);
    let end = offset.checked_add(width)?;
    let out = buffer.get_mut(offset..end)?;
    match width {
        1 => out[0] = codepoint as u8,
        2 => {
            out[0] = 0b1100_0000 | (codepoint >> 6) as u8;
            out[1] = 0b1000_0000 | (codepoint & 0x3f) as u8;
        }
        3 => {
            out[0] = 0b1110_0000 | (codepoint >> 12) as u8;
            out[1] = 0b1000_0000 | ((codepoint >> 6) & 0x3f) as u8;
            out[2] = 0b1000_0000 | (codepoint & 0x3f) as u8;
        }
        _ => {
            out[0] = 0b1111_0000 | (codepoint >> 18) as u8;
            out[1] = 0b1000_0000 | ((codepoint >> 12) & 0x3f) as u8;
            out[2] = 0b1000_0000 | ((codepoint >> 6) & 0x3f) as u8;
            out[3] = 0b1000_0000 | (codepoint & 0x3f) as u8;
        }
    }
    Some(end)
}

pub fn string_byte_length(value: &str) -> usize {
    if value.len() > NATIVE_UTF8_THRESHOLD {
        return value.len();
    }
    value.chars().map(|c| codepoint_width(c as u32)).sum()
}

/// Writes `value` at `buffer[offset..]` and returns the offset past it, or
/// `None` if the buffer is too small.
pub fn encode_string_into(value: &str, buffer: &mut [u8], offset: usize) -> Option<usize> {
    if value.len() > NATIVE_UTF8_THRESHOLD {
        let end = offset.checked_add(value.len())?;
        buffer.get_mut(offset..end)?.copy_from_slice(value.as_bytes());
        return Some(end);
    }
    let mut offset = offset;
    for c in value.chars() {
        offset = write_codepoint(buffer, offset, c as u32)?;
    }
    Some(offset)
}

// Yields one codepoint per scalar value; an unpaired surrogate yields U+FFFD.
fn utf16_codepoints(units: &[u16]) -> impl Iterator<Item = u32> + '_ {
    let mut index = 0;
    core::iter::from_fn(move || {
        let unit = *units.get(index)? as u32;
        index += 1;
        match unit {
            0xd800..=0xdbff => match units.get(index).map(|&u| u as u32) {
                Some(low @ 0xdc00..=0xdfff) => {
                    index += 1;
                    Some(0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00))
                }
                _ => Some(REPLACEMENT as u32),
            },
            0xdc00..=0xdfff => Some(REPLACEMENT as u32),
            _ => Some(unit),
        }
    })
}

/// Byte length of `value` once encoded. Each unpaired surrogate counts as
/// the three bytes of U+FFFD, exactly as [`encode_utf16_into`] writes it.
pub fn utf16_byte_length(value: &[u16]) -> usize {
    utf16_codepoints(value).map(codepoint_width).sum()
}

pub fn encode_utf16_into(value: &[u16], buffer: &mut [u8], offset: usize) -> Option<usize> {
    let mut offset = offset;
    for codepoint in utf16_codepoints(value) {
        offset = write_codepoint(buffer, offset, codepoint)?;
    }
    Some(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: char = REPLACEMENT;

    fn decode(bytes: &[u8]) -> String {
        decode_string(bytes, 0, bytes.len()).into_owned()
    }

    // Pads with ASCII on both sides so the same bytes take the native path.
    fn decode_long(bytes: &[u8]) -> String {
        let pad = [b'.'; NATIVE_UTF8_THRESHOLD];
        let padded = [&pad[..], bytes, &pad[..]].concat();
        let decoded = decode(&padded);
        decoded[pad.len()..decoded.len() - pad.len()].to_string()
    }

    fn check(bytes: &[u8], expected: &str) {
        assert_eq!(decode(bytes), expected, "short path {bytes:x?}");
        assert_eq!(decode_long(bytes), expected, "long path {bytes:x?}");
    }

    fn encode(value: &str) -> Vec<u8> {
        let mut buf = vec![0u8; string_byte_length(value)];
        assert_eq!(encode_string_into(value, &mut buf, 0), Some(buf.len()));
        buf
    }

    fn encode16(value: &[u16]) -> Vec<u8> {
        let mut buf = vec![0u8; utf16_byte_length(value)];
        assert_eq!(encode_utf16_into(value, &mut buf, 0), Some(buf.len()));
        buf
    }

    #[test]
    fn empty_range() {
        assert_eq!(decode_string(&[1, 2, 3], 0, 0), "");
        assert_eq!(decode_string(&[1, 2, 3], 3, 3), "");
    }

    #[test]
    fn one_byte() {
        check(&[0x00, 0x7f], "\x00\x7f");
    }

    #[test]
    fn two_bytes() {
        check(&[0b1100_0010, 0b1000_0000, 0b1101_1111, 0b1011_1111], "\u{80}\u{7ff}");
    }

    #[test]
    fn two_bytes_invalid() {
        // The lead is replaced, then the second byte is scanned as a lead.
        check(&[0b1100_0010, 0b1100_0001], "\u{fffd}\u{fffd}");
        check(&[0b1100_0010, b'a'], "\u{fffd}a");
    }

    #[test]
    fn two_bytes_overlong() {
        check(&[0b1100_0000, 0b1010_0000], "\u{fffd}\u{fffd}");
    }

    #[test]
    fn three_bytes() {
        check(
            &[
                0b1110_0000, 0b1010_0000, 0b1000_0000, 0b1110_1101, 0b1001_1111, 0b1011_1111,
                0b1110_1110, 0b1000_0000, 0b1000_0000, 0b1110_1111, 0b1011_1111, 0b1011_1111,
            ],
            "\u{800}\u{d7ff}\u{e000}\u{ffff}",
        );
    }

    #[test]
    fn three_bytes_surrogate() {
        let expected: String = [R; 6].iter().collect();
        check(
            &[
                0b1110_1101, 0b1010_0000, 0b1000_0000, // d800
                0b1110_1101, 0b1011_1111, 0b1011_1111, // dfff
            ],
            &expected,
        );
    }

    #[test]
    fn three_bytes_overlong() {
        check(&[0b1110_0000, 0b1000_0000, 0b1000_0000], "\u{fffd}\u{fffd}\u{fffd}");
    }

    #[test]
    fn four_bytes() {
        check(
            &[
                0b1111_0000, 0b1001_0000, 0b1000_0000, 0b1000_0000, // 10000
                0b1111_0100, 0b1000_1111, 0b1011_1111, 0b1011_1111, // 10ffff
            ],
            "\u{10000}\u{10ffff}",
        );
        check(&[0xf0, 0x9f, 0x98, 0xb1], "😱");
    }

    #[test]
    fn four_bytes_out_of_range() {
        check(&[0b1111_0111, 0b1011_1111, 0b1011_1111, 0b1011_1111], "\u{fffd}\u{fffd}\u{fffd}\u{fffd}");
        check(&[0b1111_0000, 0b1000_0000, 0b1000_0000, 0b1000_0000], "\u{fffd}\u{fffd}\u{fffd}\u{fffd}");
    }

    #[test]
    fn truncated_sequence() {
        check(&[b'a', 0xf0, 0x9f, 0x98], "a\u{fffd}\u{fffd}\u{fffd}");
        check(&[0xe2, 0x82], "\u{fffd}\u{fffd}");
    }

    #[test]
    fn invalid_leads() {
        check(&[0b1111_1100, 0b1111_1111], "\u{fffd}\u{fffd}");
        check(&[0x80, b'x'], "\u{fffd}x");
    }

    #[test]
    fn long_valid_string_is_borrowed() {
        let text = " ".repeat(10000);
        let decoded = decode_string(text.as_bytes(), 0, text.len());
        assert!(matches!(decoded, Cow::Borrowed(_)));
        assert_eq!(decoded, text);
    }

    #[test]
    fn utf16_output_uses_surrogate_pairs() {
        let bytes = [0xf0, 0x90, 0x80, 0x80, 0xf4, 0x8f, 0xbf, 0xbf];
        assert_eq!(
            decode_utf16(&bytes, 0, bytes.len()),
            vec![0xd800, 0xdc00, 0xdbff, 0xdfff]
        );
        assert_eq!(decode_utf16(&[0xc0, b'a'], 0, 2), vec![0xfffd, b'a' as u16]);
    }

    #[test]
    fn byte_lengths() {
        assert_eq!(string_byte_length(""), 0);
        assert_eq!(string_byte_length("hello\x7f"), 6);
        assert_eq!(string_byte_length("\u{80}\u{7ff}"), 4);
        assert_eq!(string_byte_length("\u{800}\u{d7ff}\u{e000}\u{ffff}"), 12);
        assert_eq!(utf16_byte_length(&[0xd800, 0xdc00, 0xdbff, 0xdfff]), 8);
    }

    #[test]
    fn unpaired_surrogates_encode_as_replacement() {
        assert_eq!(utf16_byte_length(&[0xd800, b'a' as u16]), 4);
        assert_eq!(utf16_byte_length(&[0xdc00, b'a' as u16]), 4);
        assert_eq!(utf16_byte_length(&[0xd800]), 3);
        assert_eq!(encode16(&[0xd800, b'a' as u16]), vec![0xef, 0xbf, 0xbd, b'a']);
        let encoded = encode16(&[0xdc00, 0xd800]);
        assert_eq!(encoded.len(), 6);
        assert_eq!(decode_utf16(&encoded, 0, encoded.len()), vec![0xfffd, 0xfffd]);
    }

    #[test]
    fn encode_reports_short_buffer() {
        let mut buf = [0u8; 2];
        assert_eq!(encode_string_into("abc", &mut buf, 0), None);
        assert_eq!(encode_string_into("é", &mut buf, 1), None);
        assert_eq!(encode_string_into("é", &mut buf, 0), Some(2));
        let long = "x".repeat(NATIVE_UTF8_THRESHOLD + 1);
        assert_eq!(encode_string_into(&long, &mut buf, 0), None);
    }

    #[test]
    fn encode_known_strings() {
        assert_eq!(encode("proto"), b"proto");
        assert_eq!(encode("😱"), vec![0xf0, 0x9f, 0x98, 0xb1]);
        let long = "p".repeat(129);
        assert_eq!(encode(&long), long.as_bytes());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn hand_rolled_matches_native_on_valid_input(s in any::<String>()) {
                prop_assert_eq!(decode_hand_rolled(s.as_bytes()), s.clone());
                prop_assert_eq!(decode(s.as_bytes()), s);
            }

            #[test]
            fn both_paths_agree(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
                prop_assert_eq!(decode(&bytes), decode_hand_rolled(&bytes));
                if let Ok(s) = core::str::from_utf8(&bytes) {
                    prop_assert_eq!(decode_hand_rolled(&bytes), s);
                }
            }

            #[test]
            fn str_length_matches_encoding(s in any::<String>()) {
                prop_assert_eq!(string_byte_length(&s), s.len());
                let encoded = encode(&s);
                prop_assert_eq!(&encoded[..], s.as_bytes());
            }

            #[test]
            fn utf16_length_matches_encoding(units in proptest::collection::vec(any::<u16>(), 0..32)) {
                let encoded = encode16(&units);
                prop_assert_eq!(encoded.len(), utf16_byte_length(&units));
                let decoded = decode_utf16(&encoded, 0, encoded.len());
                match String::from_utf16(&units) {
                    Ok(_) => {
                        prop_assert_eq!(decoded, units);
                    }
                    Err(_) => {
                        prop_assert!(decoded.contains(&0xfffd));
                    }
                }
            }
        }
    }
}
