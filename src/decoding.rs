use alloc::borrow::Cow;
use alloc::vec::Vec;

use crate::descriptor::{self, Encoding, FieldDescriptor, SizeClass};
use crate::error::DecodeError;
use crate::utf8;
use crate::wire::{ReadCursor, WireType, zigzag_decode, zigzag_decode32};

/// A byte range into the buffer that was decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// # Panics
    ///
    /// Panics if the span does not lie within `buffer`.
    pub fn slice<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.start..self.end]
    }
}

/// A single decoded field occurrence. The variant is fixed by the field's
/// descriptor, never by the bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<'a> {
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(Cow<'a, str>),
    Bytes(&'a [u8]),
    /// Payload of a nested message, left for the caller to decode with the
    /// nested type's descriptors.
    Message(Span),
    /// A field the descriptors do not know, including its tag, so it can
    /// be forwarded verbatim.
    Unknown(Span),
}

/// Decodes all of `buffer`. See [`decode_range`].
pub fn decode<'a, F>(
    buffer: &'a [u8],
    descriptors: &[FieldDescriptor],
    callback: F,
) -> Result<(), DecodeError>
where
    F: FnMut(u32, Value<'a>) -> Result<(), DecodeError>,
{
    decode_range(buffer, descriptors, 0, buffer.len(), callback)
}

/// Decodes `buffer[start..end]`, invoking `callback` once per field
/// occurrence in buffer order. Repeated and packed fields produce one call
/// per element; nothing is aggregated.
///
/// Stops at the first error, returned as is, including errors from the
/// callback.
pub fn decode_range<'a, F>(
    buffer: &'a [u8],
    descriptors: &[FieldDescriptor],
    start: usize,
    end: usize,
    mut callback: F,
) -> Result<(), DecodeError>
where
    F: FnMut(u32, Value<'a>) -> Result<(), DecodeError>,
{
    let mut cursor = ReadCursor::new(buffer, start, end)?;
    decode_loop(&mut cursor, descriptors, None, &mut callback)
}

/// Collects every `(field_id, value)` pair of `buffer`.
pub fn decode_to_vec<'a>(
    buffer: &'a [u8],
    descriptors: &[FieldDescriptor],
) -> Result<Vec<(u32, Value<'a>)>, DecodeError> {
    let mut fields = Vec::new();
    decode(buffer, descriptors, |field_id, value| {
        fields.push((field_id, value));
        Ok(())
    })?;
    Ok(fields)
}

// With `packed_tag` set, no tags are read: every element reuses it. This is
// how packed repeated content is replayed through the normal value path.
fn decode_loop<'a, F>(
    cursor: &mut ReadCursor<'a>,
    descriptors: &[FieldDescriptor],
    packed_tag: Option<u32>,
    callback: &mut F,
) -> Result<(), DecodeError>
where
    F: FnMut(u32, Value<'a>) -> Result<(), DecodeError>,
{
    while !cursor.is_at_end() {
        let tag_start = cursor.position();
        let tag = match packed_tag {
            Some(tag) => tag,
            None => cursor.read_tag()?,
        };
        decode_field(cursor, descriptors, tag, tag_start, callback)?;
    }
    Ok(())
}

fn decode_field<'a, F>(
    cursor: &mut ReadCursor<'a>,
    descriptors: &[FieldDescriptor],
    tag: u32,
    tag_start: usize,
    callback: &mut F,
) -> Result<(), DecodeError>
where
    F: FnMut(u32, Value<'a>) -> Result<(), DecodeError>,
{
    let field_id = tag >> 3;
    if field_id == 0 {
        return Err(DecodeError::ZeroFieldNumber { offset: tag_start });
    }
    let descriptor = descriptor::lookup(descriptors, field_id);
    let Some((size, encoding)) = descriptor.classes() else {
        return Err(DecodeError::InvalidDescriptor {
            field_id,
            bits: descriptor.bits(),
        });
    };
    let mismatch = || DecodeError::TypeMismatch {
        field_id,
        wire_type: tag & 7,
        descriptor,
    };

    let value = match WireType::from_tag(tag) {
        Some(WireType::Varint) => match (size, encoding) {
            (SizeClass::Varint32, Encoding::Signed) => Value::Int32(cursor.read_varint32()? as i32),
            (SizeClass::Varint32, Encoding::RSigned) => {
                Value::Int32(zigzag_decode32(cursor.read_varint32()?))
            }
            (SizeClass::Varint32, Encoding::Unsigned) => Value::UInt32(cursor.read_varint32()?),
            (SizeClass::Varint64, Encoding::Signed) => Value::Int64(cursor.read_varint64()? as i64),
            (SizeClass::Varint64, Encoding::RSigned) => {
                Value::Int64(zigzag_decode(cursor.read_varint64()?))
            }
            (SizeClass::Varint64, Encoding::Unsigned) => Value::UInt64(cursor.read_varint64()?),
            (SizeClass::Varint32 | SizeClass::Varint64, Encoding::Bool) => {
                decode_bool(field_id, cursor.read_varint64()?)?
            }
            (SizeClass::Unknown, Encoding::Unknown) => {
                cursor.read_varint64()?;
                unknown(field_id, tag_start, cursor.position())
            }
            _ => return Err(mismatch()),
        },
        Some(WireType::Len) => {
            let len = cursor.read_size()?;
            let start = cursor.position();
            let content = cursor.read_slice(len)?;
            let end = cursor.position();
            match (size, encoding) {
                (SizeClass::Unknown, Encoding::String) => {
                    Value::String(utf8::decode_string(cursor.buffer(), start, end))
                }
                (SizeClass::Unknown, Encoding::Bytes) => Value::Bytes(content),
                (SizeClass::Unknown, Encoding::Message) => Value::Message(Span { start, end }),
                (SizeClass::Unknown, Encoding::Unknown) => unknown(field_id, tag_start, end),
                (SizeClass::Unknown, _) => return Err(mismatch()),
                _ => {
                    let Some(element_wire_type) = descriptor.wire_type() else {
                        return Err(mismatch());
                    };
                    // Checked before replay so an empty envelope is rejected too.
                    if !is_scalar(size, encoding) {
                        return Err(mismatch());
                    }
                    let mut packed = ReadCursor::new(cursor.buffer(), start, end)?;
                    let packed_tag = element_wire_type.tag(field_id);
                    return decode_loop(&mut packed, descriptors, Some(packed_tag), callback);
                }
            }
        }
        Some(WireType::I32) => match (size, encoding) {
            (SizeClass::Fixed32, Encoding::Unsigned) => Value::UInt32(cursor.read_fixed32()?),
            (SizeClass::Fixed32, Encoding::Signed) => Value::Int32(cursor.read_fixed32()? as i32),
            (SizeClass::Fixed32, Encoding::Ieee754) => {
                Value::Float(f32::from_bits(cursor.read_fixed32()?))
            }
            (SizeClass::Unknown, Encoding::Unknown) => {
                cursor.read_fixed32()?;
                unknown(field_id, tag_start, cursor.position())
            }
            _ => return Err(mismatch()),
        },
        Some(WireType::I64) => match (size, encoding) {
            (SizeClass::Fixed64, Encoding::Unsigned) => Value::UInt64(cursor.read_fixed64()?),
            (SizeClass::Fixed64, Encoding::Signed) => Value::Int64(cursor.read_fixed64()? as i64),
            (SizeClass::Fixed64, Encoding::Ieee754) => {
                Value::Double(f64::from_bits(cursor.read_fixed64()?))
            }
            (SizeClass::Unknown, Encoding::Unknown) => {
                cursor.read_fixed64()?;
                unknown(field_id, tag_start, cursor.position())
            }
            _ => return Err(mismatch()),
        },
        // Groups are not supported.
        Some(WireType::StartGroup | WireType::EndGroup) | None => {
            return Err(DecodeError::UnsupportedWireType {
                wire_type: tag & 7,
                offset: tag_start,
            });
        }
    };
    callback(field_id, value)
}

fn is_scalar(size: SizeClass, encoding: Encoding) -> bool {
    matches!(
        (size, encoding),
        (
            SizeClass::Varint32 | SizeClass::Varint64,
            Encoding::Signed | Encoding::Unsigned | Encoding::RSigned | Encoding::Bool
        ) | (
            SizeClass::Fixed32 | SizeClass::Fixed64,
            Encoding::Signed | Encoding::Unsigned | Encoding::Ieee754
        )
    )
}

#[inline(always)]
fn decode_bool<'a>(field_id: u32, value: u64) -> Result<Value<'a>, DecodeError> {
    match value {
        0 => Ok(Value::Bool(false)),
        1 => Ok(Value::Bool(true)),
        _ => Err(DecodeError::InvalidBool { field_id, value }),
    }
}

fn unknown<'a>(field_id: u32, start: usize, end: usize) -> Value<'a> {
    tracing::trace!(field_id, start, end, "captured unknown field");
    Value::Unknown(Span { start, end })
}
