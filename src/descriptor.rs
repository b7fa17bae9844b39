//! Field descriptors: one small integer per declared field, packing the
//! wire-size class and the value-encoding class into disjoint bit ranges.
//!
//! A descriptor array is indexed by `field_id - 1`. It is produced by the
//! schema compiler and consumed verbatim by the decoder and the encoder, so
//! nothing here assumes the bits are well formed. [`FieldDescriptor::size`]
//! and [`FieldDescriptor::encoding`] return `None` for patterns that are not
//! exactly one class, and the codec rejects those where they are used.

use alloc::vec::Vec;

use crate::error::DescriptorError;
use crate::wire::{MAX_FIELD_ID, WireType};

pub const SIZE_32: u16 = 1 << 0;
pub const SIZE_64: u16 = 1 << 1;
pub const SIZE_FIXED_32: u16 = 1 << 2;
pub const SIZE_FIXED_64: u16 = 1 << 3;
pub const SIZE_UNKNOWN: u16 = 1 << 4;
pub const SIZE_MASK: u16 = 0x001f;

pub const ENC_SIGNED: u16 = 1 << 5;
pub const ENC_UNSIGNED: u16 = 1 << 6;
pub const ENC_RSIGNED: u16 = 1 << 7;
pub const ENC_BOOL: u16 = 1 << 8;
pub const ENC_IEEE754: u16 = 1 << 9;
pub const ENC_BYTES: u16 = 1 << 10;
pub const ENC_STRING: u16 = 1 << 11;
pub const ENC_MESSAGE: u16 = 1 << 12;
pub const ENC_UNKNOWN: u16 = 1 << 13;
pub const ENC_MASK: u16 = 0x3fe0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SizeClass {
    /// Varint interpreted as 32 bits.
    Varint32,
    /// Varint interpreted as 64 bits.
    Varint64,
    Fixed32,
    Fixed64,
    /// Length-delimited, or a field that is not statically known.
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Encoding {
    Signed,
    Unsigned,
    /// Zigzag.
    RSigned,
    Bool,
    Ieee754,
    Bytes,
    String,
    Message,
    Unknown,
}

#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDescriptor(pub u16);

impl FieldDescriptor {
    pub const fn new(size: u16, encoding: u16) -> Self {
        FieldDescriptor((size & SIZE_MASK) | (encoding & ENC_MASK))
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn size(self) -> Option<SizeClass> {
        match self.0 & SIZE_MASK {
            SIZE_32 => Some(SizeClass::Varint32),
            SIZE_64 => Some(SizeClass::Varint64),
            SIZE_FIXED_32 => Some(SizeClass::Fixed32),
            SIZE_FIXED_64 => Some(SizeClass::Fixed64),
            SIZE_UNKNOWN => Some(SizeClass::Unknown),
            _ => None,
        }
    }

    pub const fn encoding(self) -> Option<Encoding> {
        match self.0 & ENC_MASK {
            ENC_SIGNED => Some(Encoding::Signed),
            ENC_UNSIGNED => Some(Encoding::Unsigned),
            ENC_RSIGNED => Some(Encoding::RSigned),
            ENC_BOOL => Some(Encoding::Bool),
            ENC_IEEE754 => Some(Encoding::Ieee754),
            ENC_BYTES => Some(Encoding::Bytes),
            ENC_STRING => Some(Encoding::String),
            ENC_MESSAGE => Some(Encoding::Message),
            ENC_UNKNOWN => Some(Encoding::Unknown),
            _ => None,
        }
    }

    /// Both classes, or `None` if either bit range is malformed.
    pub const fn classes(self) -> Option<(SizeClass, Encoding)> {
        match (self.size(), self.encoding()) {
            (Some(size), Some(encoding)) => Some((size, encoding)),
            _ => None,
        }
    }

    /// The wire type a single (unpacked) value of this field is written with.
    pub const fn wire_type(self) -> Option<WireType> {
        match self.size() {
            Some(SizeClass::Varint32 | SizeClass::Varint64) => Some(WireType::Varint),
            Some(SizeClass::Fixed32) => Some(WireType::I32),
            Some(SizeClass::Fixed64) => Some(WireType::I64),
            Some(SizeClass::Unknown) => Some(WireType::Len),
            None => None,
        }
    }

    pub const fn is_unknown(self) -> bool {
        self.0 == FIELD_UNKNOWN.0
    }

    /// The descriptor for a proto scalar type name such as `"sint64"`.
    /// Enums and messages are resolved by the schema compiler, not here.
    pub fn from_scalar_name(name: &str) -> Option<Self> {
        let descriptor = match name {
            "int32" => FIELD_INT32,
            "uint32" => FIELD_UINT32,
            "sint32" => FIELD_SINT32,
            "int64" => FIELD_INT64,
            "uint64" => FIELD_UINT64,
            "sint64" => FIELD_SINT64,
            "bool" => FIELD_BOOL,
            "fixed32" => FIELD_FIXED32,
            "sfixed32" => FIELD_SFIXED32,
            "float" => FIELD_FLOAT,
            "fixed64" => FIELD_FIXED64,
            "sfixed64" => FIELD_SFIXED64,
            "double" => FIELD_DOUBLE,
            "string" => FIELD_STRING,
            "bytes" => FIELD_BYTES,
            _ => return None,
        };
        Some(descriptor)
    }
}

impl core::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.classes() {
            Some((size, encoding)) => write!(f, "FieldDescriptor({size:?}, {encoding:?})"),
            None => write!(f, "FieldDescriptor({:#06x})", self.0),
        }
    }
}

impl Default for FieldDescriptor {
    fn default() -> Self {
        FIELD_UNKNOWN
    }
}

pub const FIELD_INT32: FieldDescriptor = FieldDescriptor::new(SIZE_32, ENC_SIGNED);
pub const FIELD_UINT32: FieldDescriptor = FieldDescriptor::new(SIZE_32, ENC_UNSIGNED);
pub const FIELD_SINT32: FieldDescriptor = FieldDescriptor::new(SIZE_32, ENC_RSIGNED);
pub const FIELD_INT64: FieldDescriptor = FieldDescriptor::new(SIZE_64, ENC_SIGNED);
pub const FIELD_UINT64: FieldDescriptor = FieldDescriptor::new(SIZE_64, ENC_UNSIGNED);
pub const FIELD_SINT64: FieldDescriptor = FieldDescriptor::new(SIZE_64, ENC_RSIGNED);
pub const FIELD_BOOL: FieldDescriptor = FieldDescriptor::new(SIZE_32, ENC_BOOL);
/// Unknown enum values are legal and decode as plain integers.
pub const FIELD_ENUM: FieldDescriptor = FIELD_UINT32;

pub const FIELD_FIXED32: FieldDescriptor = FieldDescriptor::new(SIZE_FIXED_32, ENC_UNSIGNED);
pub const FIELD_SFIXED32: FieldDescriptor = FieldDescriptor::new(SIZE_FIXED_32, ENC_SIGNED);
pub const FIELD_FLOAT: FieldDescriptor = FieldDescriptor::new(SIZE_FIXED_32, ENC_IEEE754);

pub const FIELD_FIXED64: FieldDescriptor = FieldDescriptor::new(SIZE_FIXED_64, ENC_UNSIGNED);
pub const FIELD_SFIXED64: FieldDescriptor = FieldDescriptor::new(SIZE_FIXED_64, ENC_SIGNED);
pub const FIELD_DOUBLE: FieldDescriptor = FieldDescriptor::new(SIZE_FIXED_64, ENC_IEEE754);

pub const FIELD_STRING: FieldDescriptor = FieldDescriptor::new(SIZE_UNKNOWN, ENC_STRING);
pub const FIELD_BYTES: FieldDescriptor = FieldDescriptor::new(SIZE_UNKNOWN, ENC_BYTES);
pub const FIELD_MESSAGE: FieldDescriptor = FieldDescriptor::new(SIZE_UNKNOWN, ENC_MESSAGE);
pub const FIELD_UNKNOWN: FieldDescriptor = FieldDescriptor::new(SIZE_UNKNOWN, ENC_UNKNOWN);

/// Descriptor of `field_id`, or [`FIELD_UNKNOWN`] if the array has no entry.
#[inline(always)]
pub fn lookup(descriptors: &[FieldDescriptor], field_id: u32) -> FieldDescriptor {
    let Some(index) = (field_id as usize).checked_sub(1) else {
        return FIELD_UNKNOWN;
    };
    descriptors.get(index).copied().unwrap_or(FIELD_UNKNOWN)
}

/// Lays out `(field_id, descriptor)` pairs as the dense array the codec
/// consumes, filling undeclared ids with [`FIELD_UNKNOWN`].
pub fn build_table(
    fields: &[(u32, FieldDescriptor)],
) -> Result<Vec<FieldDescriptor>, DescriptorError> {
    let mut table = Vec::new();
    let mut declared = Vec::new();
    for &(id, descriptor) in fields {
        if id == 0 || id > MAX_FIELD_ID {
            return Err(DescriptorError::InvalidFieldId(id));
        }
        let index = (id - 1) as usize;
        if index >= table.len() {
            table.resize(index + 1, FIELD_UNKNOWN);
            declared.resize(index + 1, false);
        }
        if declared[index] {
            return Err(DescriptorError::DuplicateFieldId(id));
        }
        declared[index] = true;
        table[index] = descriptor;
    }
    Ok(table)
}
