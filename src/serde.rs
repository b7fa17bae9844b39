use serde::ser::SerializeStruct;

use crate::decoding::{Span, Value};
use crate::descriptor::FieldDescriptor;

// Descriptor tables travel as their raw bits. Malformed bits are accepted
// here and rejected by the codec when the field is used.
impl serde::Serialize for FieldDescriptor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.bits())
    }
}

impl<'de> serde::Deserialize<'de> for FieldDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        <u16 as serde::Deserialize>::deserialize(deserializer).map(FieldDescriptor)
    }
}

impl serde::Serialize for Span {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut struct_serializer = serializer.serialize_struct("Span", 2)?;
        struct_serializer.serialize_field("start", &self.start)?;
        struct_serializer.serialize_field("end", &self.end)?;
        struct_serializer.end()
    }
}

impl serde::Serialize for Value<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::UInt32(v) => serializer.serialize_u32(*v),
            Value::UInt64(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v.as_ref()),
            Value::Bytes(v) => serializer.serialize_bytes(v),
            Value::Message(span) | Value::Unknown(span) => span.serialize(serializer),
        }
    }
}
