#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use protolite::descriptor::FieldDescriptor;
use protolite::{EncodeField, Value, decode_to_vec, encode};

#[derive(Arbitrary, Debug)]
struct ForwardInput {
    descriptors: Vec<u16>,
    data: Vec<u8>,
}

fuzz_target!(|input: ForwardInput| {
    let descriptors: Vec<FieldDescriptor> =
        input.descriptors.iter().map(|&bits| FieldDescriptor(bits)).collect();
    if decode_to_vec(&input.data, &descriptors).is_err() {
        return;
    }
    // With no descriptors every field is unknown, and forwarding the spans
    // must reproduce the input byte for byte.
    let fields = decode_to_vec(&input.data, &[]).expect("unknown fields always decode");
    let raw: Vec<EncodeField<'_>> = fields
        .iter()
        .map(|(_, value)| match value {
            Value::Unknown(span) => EncodeField::raw(span.slice(&input.data)),
            other => panic!("known value {other:?} without descriptors"),
        })
        .collect();
    assert_eq!(encode(&raw).expect("raw fields encode"), input.data);
});
