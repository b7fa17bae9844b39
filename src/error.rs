//! Error types for decoding and encoding.

use thiserror::Error;

use crate::descriptor::FieldDescriptor;

/// The piece of the wire format being parsed when an error occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Part {
    Tag,
    Varint32,
    Varint64,
    Length,
    Content,
    Fixed32,
    Fixed64,
}

impl core::fmt::Display for Part {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Part::Tag => "tag",
            Part::Varint32 => "32-bit varint",
            Part::Varint64 => "64-bit varint",
            Part::Length => "length prefix",
            Part::Content => "length-delimited content",
            Part::Fixed32 => "fixed32 value",
            Part::Fixed64 => "fixed64 value",
        };
        f.write_str(name)
    }
}

/// A fatal error while decoding a buffer. No partial result is produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("{part} truncated at offset {offset}")]
    Truncated { part: Part, offset: usize },

    #[error("{part} overflows its width at offset {offset}")]
    Overflow { part: Part, offset: usize },

    #[error("wire type {wire_type} does not match descriptor {descriptor:?} of field {field_id}")]
    TypeMismatch {
        field_id: u32,
        wire_type: u32,
        descriptor: FieldDescriptor,
    },

    #[error("descriptor bits {bits:#06x} of field {field_id} are not a valid field type")]
    InvalidDescriptor { field_id: u32, bits: u16 },

    #[error("invalid boolean value {value} for field {field_id}")]
    InvalidBool { field_id: u32, value: u64 },

    #[error("zero field number at offset {offset}")]
    ZeroFieldNumber { offset: usize },

    #[error("unsupported wire type {wire_type} at offset {offset}")]
    UnsupportedWireType { wire_type: u32, offset: usize },

    #[error("message tree too deep at offset {offset}")]
    DepthExceeded { offset: usize },

    #[error("range {start}..{end} is outside a buffer of {len} bytes")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
}

/// A fatal error while encoding a field list.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    #[error("value does not match descriptor {descriptor:?} of field {field_id}")]
    ValueMismatch {
        field_id: u32,
        descriptor: FieldDescriptor,
    },

    #[error("descriptor bits {bits:#06x} of field {field_id} are not a valid field type")]
    InvalidDescriptor { field_id: u32, bits: u16 },

    #[error("field id {0} cannot be encoded")]
    InvalidFieldId(u32),

    #[error("payload of {0} bytes exceeds the length prefix range")]
    LengthOverflow(usize),

    /// The write pass disagreed with the size pass. This is a codec bug,
    /// never a property of the input.
    #[error("encoder wrote {actual} bytes but sized the output at {expected}")]
    InvalidOutputLength { expected: usize, actual: usize },
}

/// A malformed field list handed to [`crate::descriptor::build_table`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("field id {0} is out of range")]
    InvalidFieldId(u32),

    #[error("field id {0} is declared twice")]
    DuplicateFieldId(u32),
}
