//! Two-pass encoder. [`byte_length`] walks the field list once, validating
//! every value against its descriptor and recording the payload length of
//! each length-delimited value in a [`LengthPlan`]. [`write`] walks it again
//! and consumes the plan in the same order, so no length is computed twice.

use alloc::vec;
use alloc::vec::Vec;

use crate::descriptor::{Encoding, FieldDescriptor, SizeClass};
use crate::error::EncodeError;
use crate::utf8;
use crate::wire::{
    MAX_FIELD_ID, MAX_LENGTH, WireType, WriteCursor, varint_size, varint32_size, zigzag_encode,
    zigzag_encode32,
};

/// One field occurrence to encode. Repeated fields are simply listed once
/// per element, or as a single [`EncodeValue::Packed`].
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeField<'a> {
    pub id: u32,
    pub descriptor: FieldDescriptor,
    pub value: EncodeValue<'a>,
}

impl<'a> EncodeField<'a> {
    pub fn new(id: u32, descriptor: FieldDescriptor, value: EncodeValue<'a>) -> Self {
        EncodeField {
            id,
            descriptor,
            value,
        }
    }

    /// Pre-encoded bytes, tag included, copied to the output as is.
    pub fn raw(bytes: &'a [u8]) -> Self {
        EncodeField {
            id: 0,
            descriptor: FieldDescriptor::default(),
            value: EncodeValue::Raw(bytes),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EncodeValue<'a> {
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Bool(bool),
    Float(f32),
    Double(f64),
    Str(&'a str),
    /// A string held as UTF-16 code units. Unpaired surrogates are written
    /// as U+FFFD.
    Utf16(&'a [u16]),
    Bytes(&'a [u8]),
    Message(Vec<EncodeField<'a>>),
    /// Scalars written as one length-delimited run.
    Packed(Vec<EncodeValue<'a>>),
    Raw(&'a [u8]),
}

/// Output of the size pass: the exact encoded size and the payload length
/// of every length-delimited value, in pre-order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LengthPlan {
    total: usize,
    lengths: Vec<u32>,
}

impl LengthPlan {
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn lengths(&self) -> &[u32] {
        &self.lengths
    }
}

#[derive(Clone, Copy, Debug)]
enum Scalar {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
}

impl Scalar {
    fn size(self) -> usize {
        match self {
            Scalar::Varint(n) => varint_size(n),
            Scalar::Fixed32(_) => 4,
            Scalar::Fixed64(_) => 8,
        }
    }

    fn write(self, cursor: &mut WriteCursor<'_>) -> Option<()> {
        match self {
            Scalar::Varint(n) => cursor.write_varint(n),
            Scalar::Fixed32(n) => cursor.write_fixed32(n),
            Scalar::Fixed64(n) => cursor.write_fixed64(n),
        }
    }
}

// Negative int32 values are sign extended to ten bytes, as other protobuf
// encoders write them. sint32 and uint32 stay within five.
fn scalar(
    field_id: u32,
    descriptor: FieldDescriptor,
    size: SizeClass,
    encoding: Encoding,
    value: &EncodeValue<'_>,
) -> Result<Scalar, EncodeError> {
    let scalar = match (size, encoding, value) {
        (SizeClass::Varint32, Encoding::Signed, &EncodeValue::Int32(v)) => {
            Scalar::Varint(v as i64 as u64)
        }
        (SizeClass::Varint32, Encoding::RSigned, &EncodeValue::Int32(v)) => {
            Scalar::Varint(zigzag_encode32(v) as u64)
        }
        (SizeClass::Varint32, Encoding::Unsigned, &EncodeValue::UInt32(v)) => {
            Scalar::Varint(v as u64)
        }
        (SizeClass::Varint64, Encoding::Signed, &EncodeValue::Int64(v)) => Scalar::Varint(v as u64),
        (SizeClass::Varint64, Encoding::RSigned, &EncodeValue::Int64(v)) => {
            Scalar::Varint(zigzag_encode(v))
        }
        (SizeClass::Varint64, Encoding::Unsigned, &EncodeValue::UInt64(v)) => Scalar::Varint(v),
        (SizeClass::Varint32 | SizeClass::Varint64, Encoding::Bool, &EncodeValue::Bool(v)) => {
            Scalar::Varint(v as u64)
        }
        (SizeClass::Fixed32, Encoding::Unsigned, &EncodeValue::UInt32(v)) => Scalar::Fixed32(v),
        (SizeClass::Fixed32, Encoding::Signed, &EncodeValue::Int32(v)) => Scalar::Fixed32(v as u32),
        (SizeClass::Fixed32, Encoding::Ieee754, &EncodeValue::Float(v)) => {
            Scalar::Fixed32(v.to_bits())
        }
        (SizeClass::Fixed64, Encoding::Unsigned, &EncodeValue::UInt64(v)) => Scalar::Fixed64(v),
        (SizeClass::Fixed64, Encoding::Signed, &EncodeValue::Int64(v)) => Scalar::Fixed64(v as u64),
        (SizeClass::Fixed64, Encoding::Ieee754, &EncodeValue::Double(v)) => {
            Scalar::Fixed64(v.to_bits())
        }
        _ => {
            return Err(EncodeError::ValueMismatch {
                field_id,
                descriptor,
            });
        }
    };
    Ok(scalar)
}

enum Shape<'f, 'a> {
    Raw(&'a [u8]),
    Scalar(Scalar),
    Str(&'a str),
    Utf16(&'a [u16]),
    Bytes(&'a [u8]),
    Message(&'f [EncodeField<'a>]),
    Packed(SizeClass, Encoding, &'f [EncodeValue<'a>]),
}

// Validation shared by both passes. Returns the tag to write (none for raw
// bytes) and what to write after it.
fn classify<'f, 'a>(field: &'f EncodeField<'a>) -> Result<(u32, Shape<'f, 'a>), EncodeError> {
    let EncodeField {
        id, descriptor, ..
    } = *field;
    let mismatch = EncodeError::ValueMismatch {
        field_id: id,
        descriptor,
    };
    if let EncodeValue::Raw(bytes) = field.value {
        if id != 0 || !descriptor.is_unknown() {
            return Err(mismatch);
        }
        return Ok((0, Shape::Raw(bytes)));
    }
    if id == 0 || id > MAX_FIELD_ID {
        return Err(EncodeError::InvalidFieldId(id));
    }
    let (Some((size, encoding)), Some(wire_type)) = (descriptor.classes(), descriptor.wire_type())
    else {
        return Err(EncodeError::InvalidDescriptor {
            field_id: id,
            bits: descriptor.bits(),
        });
    };
    let len_tag = WireType::Len.tag(id);
    let classified = match (&field.value, size, encoding) {
        (EncodeValue::Str(s), SizeClass::Unknown, Encoding::String) => (len_tag, Shape::Str(*s)),
        (EncodeValue::Utf16(s), SizeClass::Unknown, Encoding::String) => {
            (len_tag, Shape::Utf16(*s))
        }
        (EncodeValue::Bytes(b), SizeClass::Unknown, Encoding::Bytes) => (len_tag, Shape::Bytes(*b)),
        (EncodeValue::Message(fields), SizeClass::Unknown, Encoding::Message) => {
            (len_tag, Shape::Message(fields))
        }
        (EncodeValue::Packed(values), size, encoding) if size != SizeClass::Unknown => {
            (len_tag, Shape::Packed(size, encoding, values))
        }
        (
            EncodeValue::Str(_)
            | EncodeValue::Utf16(_)
            | EncodeValue::Bytes(_)
            | EncodeValue::Message(_)
            | EncodeValue::Packed(_)
            | EncodeValue::Raw(_),
            _,
            _,
        ) => return Err(mismatch),
        (value, size, encoding) => (
            wire_type.tag(id),
            Shape::Scalar(scalar(id, descriptor, size, encoding, value)?),
        ),
    };
    Ok(classified)
}

fn payload_length(len: usize) -> Result<u32, EncodeError> {
    if len > MAX_LENGTH {
        return Err(EncodeError::LengthOverflow(len));
    }
    Ok(len as u32)
}

fn packed_length(
    field: &EncodeField<'_>,
    size: SizeClass,
    encoding: Encoding,
    values: &[EncodeValue<'_>],
) -> Result<usize, EncodeError> {
    let mut len = 0;
    for value in values {
        len += scalar(field.id, field.descriptor, size, encoding, value)?.size();
    }
    Ok(len)
}

fn size_fields(fields: &[EncodeField<'_>], lengths: &mut Vec<u32>) -> Result<usize, EncodeError> {
    let mut total = 0usize;
    for field in fields {
        let (tag, shape) = classify(field)?;
        let payload = match shape {
            Shape::Raw(bytes) => {
                total += bytes.len();
                continue;
            }
            Shape::Scalar(scalar) => {
                total += varint32_size(tag) + scalar.size();
                continue;
            }
            Shape::Str(s) => utf8::string_byte_length(s),
            Shape::Utf16(s) => utf8::utf16_byte_length(s),
            Shape::Bytes(b) => b.len(),
            Shape::Message(children) => {
                // Reserve the slot so the parent precedes its children.
                let slot = lengths.len();
                lengths.push(0);
                let len = size_fields(children, lengths)?;
                lengths[slot] = payload_length(len)?;
                total += varint32_size(tag) + varint_size(len as u64) + len;
                continue;
            }
            Shape::Packed(size, encoding, values) => packed_length(field, size, encoding, values)?,
        };
        let len = payload_length(payload)?;
        lengths.push(len);
        total += varint32_size(tag) + varint32_size(len) + payload;
    }
    Ok(total)
}

/// Size pass. Validates every field and returns the plan [`write`] needs.
pub fn byte_length(fields: &[EncodeField<'_>]) -> Result<LengthPlan, EncodeError> {
    let mut lengths = Vec::new();
    let total = size_fields(fields, &mut lengths)?;
    Ok(LengthPlan { total, lengths })
}

struct Writer<'p, 'b> {
    cursor: WriteCursor<'b>,
    lengths: core::slice::Iter<'p, u32>,
    expected: usize,
}

impl Writer<'_, '_> {
    fn invariant(&self) -> EncodeError {
        let actual = self.cursor.position();
        tracing::error!(expected = self.expected, actual, "encoder passes disagree");
        EncodeError::InvalidOutputLength {
            expected: self.expected,
            actual,
        }
    }

    fn check(&self, written: Option<()>) -> Result<(), EncodeError> {
        written.ok_or_else(|| self.invariant())
    }

    fn next_length(&mut self) -> Result<u32, EncodeError> {
        match self.lengths.next() {
            Some(&len) => Ok(len),
            None => Err(self.invariant()),
        }
    }

    fn length_prefixed(&mut self, tag: u32) -> Result<usize, EncodeError> {
        let len = self.next_length()?;
        let written = self.cursor.write_tag(tag).and_then(|()| self.cursor.write_varint32(len));
        self.check(written)?;
        Ok(len as usize)
    }

    // The cached length must match what was actually written.
    fn expect_payload(&self, start: usize, len: usize) -> Result<(), EncodeError> {
        if self.cursor.position() - start != len {
            return Err(self.invariant());
        }
        Ok(())
    }

    fn fields(&mut self, fields: &[EncodeField<'_>]) -> Result<(), EncodeError> {
        for field in fields {
            let (tag, shape) = classify(field)?;
            match shape {
                Shape::Raw(bytes) => {
                    let written = self.cursor.write_slice(bytes);
                    self.check(written)?;
                }
                Shape::Scalar(scalar) => {
                    let written = self
                        .cursor
                        .write_tag(tag)
                        .and_then(|()| scalar.write(&mut self.cursor));
                    self.check(written)?;
                }
                Shape::Str(s) => {
                    let len = self.length_prefixed(tag)?;
                    let start = self.cursor.position();
                    let written = self.cursor.write_str(s);
                    self.check(written)?;
                    self.expect_payload(start, len)?;
                }
                Shape::Utf16(s) => {
                    let len = self.length_prefixed(tag)?;
                    let start = self.cursor.position();
                    let written = self.cursor.write_utf16(s);
                    self.check(written)?;
                    self.expect_payload(start, len)?;
                }
                Shape::Bytes(b) => {
                    let len = self.length_prefixed(tag)?;
                    if len != b.len() {
                        return Err(self.invariant());
                    }
                    let written = self.cursor.write_slice(b);
                    self.check(written)?;
                }
                Shape::Message(children) => {
                    let len = self.length_prefixed(tag)?;
                    let start = self.cursor.position();
                    self.fields(children)?;
                    self.expect_payload(start, len)?;
                }
                Shape::Packed(size, encoding, values) => {
                    let len = self.length_prefixed(tag)?;
                    let start = self.cursor.position();
                    for value in values {
                        let scalar = scalar(field.id, field.descriptor, size, encoding, value)?;
                        let written = scalar.write(&mut self.cursor);
                        self.check(written)?;
                    }
                    self.expect_payload(start, len)?;
                }
            }
        }
        Ok(())
    }
}

/// Write pass. Writes `fields` to `buffer` starting at `offset` and returns
/// the offset just past the last byte written. `plan` must come from
/// [`byte_length`] on the same fields, and `buffer` must have room for
/// `plan.total()` bytes after `offset`.
pub fn write(
    fields: &[EncodeField<'_>],
    plan: &LengthPlan,
    buffer: &mut [u8],
    offset: usize,
) -> Result<usize, EncodeError> {
    let expected = offset.saturating_add(plan.total);
    if expected > buffer.len() {
        return Err(EncodeError::InvalidOutputLength {
            expected,
            actual: buffer.len(),
        });
    }
    let mut writer = Writer {
        cursor: WriteCursor::new(buffer, offset),
        lengths: plan.lengths.iter(),
        expected,
    };
    writer.fields(fields)?;
    if writer.cursor.position() != expected || writer.lengths.next().is_some() {
        return Err(writer.invariant());
    }
    Ok(expected)
}

/// Encodes `fields` into a buffer of exactly the right size.
pub fn encode(fields: &[EncodeField<'_>]) -> Result<Vec<u8>, EncodeError> {
    let plan = byte_length(fields)?;
    let mut buffer = vec![0; plan.total];
    let end = write(fields, &plan, &mut buffer, 0)?;
    if end != plan.total {
        tracing::error!(expected = plan.total, actual = end, "encoder passes disagree");
        return Err(EncodeError::InvalidOutputLength {
            expected: plan.total,
            actual: end,
        });
    }
    Ok(buffer)
}
