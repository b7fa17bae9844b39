// Automatically generated Rust code from protobuf definitions.
//
// message Test {
//   int32 x = 1;
//   sint64 y = 2;
//   string name = 3;
//   bytes payload = 4;
//   fixed32 checksum = 5;
//   double ratio = 6;
//   bool flag = 7;
//   repeated int32 values = 8;
//   Test child = 9;
// }

#![allow(dead_code)]

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate as protolite;
use protolite::descriptor::*;
use protolite::{DecodeError, EncodeField, EncodeValue, Message, Value};

static DESCRIPTORS: [FieldDescriptor; 9] = [
    FIELD_INT32,
    FIELD_SINT64,
    FIELD_STRING,
    FIELD_BYTES,
    FIELD_FIXED32,
    FIELD_DOUBLE,
    FIELD_BOOL,
    FIELD_INT32,
    FIELD_MESSAGE,
];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Test {
    x: i32,
    y: i64,
    name: String,
    payload: Vec<u8>,
    checksum: u32,
    ratio: f64,
    flag: bool,
    values: Vec<i32>,
    child: Option<Box<Test>>,
    unknown_fields: Vec<u8>,
}

impl Test {
    pub fn x(&self) -> i32 {
        self.x
    }
    pub fn set_x(&mut self, value: i32) {
        self.x = value;
    }
    pub fn y(&self) -> i64 {
        self.y
    }
    pub fn set_y(&mut self, value: i64) {
        self.y = value;
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn set_name(&mut self, value: &str) {
        self.name.clear();
        self.name.push_str(value);
    }
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
    pub fn set_payload(&mut self, value: &[u8]) {
        self.payload.clear();
        self.payload.extend_from_slice(value);
    }
    pub fn checksum(&self) -> u32 {
        self.checksum
    }
    pub fn set_checksum(&mut self, value: u32) {
        self.checksum = value;
    }
    pub fn ratio(&self) -> f64 {
        self.ratio
    }
    pub fn set_ratio(&mut self, value: f64) {
        self.ratio = value;
    }
    pub fn flag(&self) -> bool {
        self.flag
    }
    pub fn set_flag(&mut self, value: bool) {
        self.flag = value;
    }
    pub fn values(&self) -> &[i32] {
        &self.values
    }
    pub fn values_mut(&mut self) -> &mut Vec<i32> {
        &mut self.values
    }
    pub fn child(&self) -> Option<&Test> {
        self.child.as_deref()
    }
    pub fn child_mut(&mut self) -> &mut Test {
        self.child.get_or_insert_default()
    }
    pub fn clear_child(&mut self) {
        self.child = None;
    }
    pub fn unknown_fields(&self) -> &[u8] {
        &self.unknown_fields
    }
}

impl Message for Test {
    fn descriptors() -> &'static [FieldDescriptor] {
        &DESCRIPTORS
    }

    fn merge_field(
        &mut self,
        buffer: &[u8],
        field_id: u32,
        value: Value<'_>,
        depth: usize,
    ) -> Result<(), DecodeError> {
        match (field_id, value) {
            (1, Value::Int32(v)) => self.x = v,
            (2, Value::Int64(v)) => self.y = v,
            (3, Value::String(v)) => self.name = v.into_owned(),
            (4, Value::Bytes(v)) => self.set_payload(v),
            (5, Value::UInt32(v)) => self.checksum = v,
            (6, Value::Double(v)) => self.ratio = v,
            (7, Value::Bool(v)) => self.flag = v,
            (8, Value::Int32(v)) => self.values.push(v),
            (9, Value::Message(span)) => self.child_mut().merge_nested(buffer, span, depth)?,
            (_, Value::Unknown(span)) => self.unknown_fields.extend_from_slice(span.slice(buffer)),
            _ => {}
        }
        Ok(())
    }

    fn fields(&self) -> Vec<EncodeField<'_>> {
        let mut fields = Vec::new();
        if self.x != 0 {
            fields.push(EncodeField::new(1, FIELD_INT32, EncodeValue::Int32(self.x)));
        }
        if self.y != 0 {
            fields.push(EncodeField::new(2, FIELD_SINT64, EncodeValue::Int64(self.y)));
        }
        if !self.name.is_empty() {
            fields.push(EncodeField::new(3, FIELD_STRING, EncodeValue::Str(&self.name)));
        }
        if !self.payload.is_empty() {
            fields.push(EncodeField::new(4, FIELD_BYTES, EncodeValue::Bytes(&self.payload)));
        }
        if self.checksum != 0 {
            fields.push(EncodeField::new(5, FIELD_FIXED32, EncodeValue::UInt32(self.checksum)));
        }
        if self.ratio.to_bits() != 0 {
            fields.push(EncodeField::new(6, FIELD_DOUBLE, EncodeValue::Double(self.ratio)));
        }
        if self.flag {
            fields.push(EncodeField::new(7, FIELD_BOOL, EncodeValue::Bool(self.flag)));
        }
        if !self.values.is_empty() {
            let values = self.values.iter().map(|&v| EncodeValue::Int32(v)).collect();
            fields.push(EncodeField::new(8, FIELD_INT32, EncodeValue::Packed(values)));
        }
        if let Some(child) = &self.child {
            fields.push(EncodeField::new(9, FIELD_MESSAGE, EncodeValue::Message(child.fields())));
        }
        if !self.unknown_fields.is_empty() {
            fields.push(EncodeField::raw(&self.unknown_fields));
        }
        fields
    }
}
