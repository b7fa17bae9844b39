#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;

pub mod descriptor;
pub mod error;
pub mod utf8;
pub mod wire;

pub mod decoding;
pub mod encoding;

pub mod test;

#[cfg(feature = "serde_support")]
pub mod serde;

pub use decoding::{Span, Value, decode, decode_range, decode_to_vec};
pub use descriptor::FieldDescriptor;
pub use encoding::{EncodeField, EncodeValue, LengthPlan, byte_length, encode, write};
pub use error::{DecodeError, DescriptorError, EncodeError};

/// The surface generated message types implement. Generated code owns the
/// typed record; the codec only sees descriptors, decoded values and the
/// flattened field list.
pub trait Message: Default + core::fmt::Debug {
    fn descriptors() -> &'static [FieldDescriptor];

    /// Applies one decoded field. `buffer` is the buffer being decoded, so
    /// nested message and unknown field spans can be resolved against it.
    /// Nested messages are merged with [`Message::merge_nested`], passing
    /// `depth` on unchanged.
    fn merge_field(
        &mut self,
        buffer: &[u8],
        field_id: u32,
        value: Value<'_>,
        depth: usize,
    ) -> Result<(), DecodeError>;

    /// The fields to encode, in the order they are written.
    fn fields(&self) -> Vec<EncodeField<'_>>;

    /// Merges the message encoded in `buffer[start..end]` into `self`.
    /// At most `depth` further levels of nested messages are entered.
    fn merge(
        &mut self,
        buffer: &[u8],
        start: usize,
        end: usize,
        depth: usize,
    ) -> Result<(), DecodeError> {
        decoding::decode_range(buffer, Self::descriptors(), start, end, |field_id, value| {
            self.merge_field(buffer, field_id, value, depth)
        })
    }

    /// Merges a nested message span, spending one level of `depth`.
    fn merge_nested(
        &mut self,
        buffer: &[u8],
        span: Span,
        depth: usize,
    ) -> Result<(), DecodeError> {
        let Some(depth) = depth.checked_sub(1) else {
            return Err(DecodeError::DepthExceeded { offset: span.start });
        };
        self.merge(buffer, span.start, span.end, depth)
    }
}

pub trait MessageExt: Message {
    /// Decodes `buf` into `self`, entering at most `STACK_DEPTH` levels of
    /// nested messages.
    fn decode_flat<const STACK_DEPTH: usize>(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        if let Err(err) = self.merge(buf, 0, buf.len(), STACK_DEPTH) {
            tracing::debug!(%err, len = buf.len(), "message decode failed");
            return Err(err.into());
        }
        Ok(())
    }

    /// Reads the whole of `reader` and decodes it. Input longer than `limit`
    /// bytes is rejected without being decoded.
    #[cfg(feature = "std")]
    fn decode_from_read<const STACK_DEPTH: usize>(
        &mut self,
        reader: impl std::io::Read,
        limit: usize,
    ) -> anyhow::Result<()> {
        use std::io::Read;

        let mut buffer = Vec::new();
        reader
            .take((limit as u64).saturating_add(1))
            .read_to_end(&mut buffer)?;
        if buffer.len() > limit {
            return Err(anyhow::anyhow!("Message exceeds limit of {limit} bytes"));
        }
        self.decode_flat::<STACK_DEPTH>(&buffer)
    }

    #[cfg(feature = "std")]
    fn decode_from_async_read<const STACK_DEPTH: usize>(
        &mut self,
        reader: &mut (impl futures::io::AsyncRead + Unpin),
        limit: usize,
    ) -> impl core::future::Future<Output = anyhow::Result<()>> {
        use futures::io::AsyncReadExt;

        async move {
            let mut buffer = Vec::new();
            reader
                .take((limit as u64).saturating_add(1))
                .read_to_end(&mut buffer)
                .await?;
            if buffer.len() > limit {
                return Err(anyhow::anyhow!("Message exceeds limit of {limit} bytes"));
            }
            self.decode_flat::<STACK_DEPTH>(&buffer)
        }
    }

    fn encode_flat<'a>(&self, buffer: &'a mut [u8]) -> anyhow::Result<&'a [u8]> {
        let fields = self.fields();
        let plan = encoding::byte_length(&fields)?;
        if plan.total() > buffer.len() {
            return Err(anyhow::anyhow!("Buffer too small for message"));
        }
        let end = encoding::write(&fields, &plan, buffer, 0)?;
        Ok(&buffer[..end])
    }

    fn encode_vec(&self) -> anyhow::Result<Vec<u8>> {
        match encoding::encode(&self.fields()) {
            Ok(buffer) => Ok(buffer),
            Err(err) => {
                tracing::debug!(%err, "message encode failed");
                Err(err.into())
            }
        }
    }
}

impl<T: Message> MessageExt for T {}

#[cfg(feature = "std")]
pub mod tests {
    use crate::{Message, MessageExt};

    pub fn assert_roundtrip<T: Message>(msg: &T) {
        let data = msg.encode_vec().expect("msg should encode");

        let mut roundtrip_msg = T::default();
        roundtrip_msg
            .decode_flat::<32>(&data)
            .expect("encoded msg should decode");

        println!("Roundtrip message: {:#?}", roundtrip_msg);

        let roundtrip_data = roundtrip_msg.encode_vec().expect("msg should encode");

        assert_eq!(roundtrip_data, data);
    }

    #[cfg(test)]
    fn sample() -> crate::test::Test {
        let mut child = crate::test::Test::default();
        child.set_name("child");
        *child.values_mut() = vec![-1, 0, 1];

        let mut msg = crate::test::Test::default();
        msg.set_x(150);
        msg.set_y(-65);
        msg.set_name("hello, wörld");
        msg.set_payload(&[0, 1, 0xff]);
        msg.set_checksum(0xf403_0201);
        msg.set_ratio(1.2345);
        msg.set_flag(true);
        *msg.values_mut() = vec![1, 2, 3, i32::MIN];
        *msg.child_mut() = child;
        msg
    }

    #[test]
    fn message_roundtrip() {
        assert_roundtrip(&sample());
        assert_roundtrip(&crate::test::Test::default());
    }

    #[test]
    fn known_encoding() {
        let mut msg = crate::test::Test::default();
        msg.set_x(150);
        msg.set_flag(true);
        *msg.values_mut() = vec![1, 2, 3];
        assert_eq!(
            msg.encode_vec().unwrap(),
            [0x08, 0x96, 0x01, 0x38, 0x01, 0x42, 0x03, 0x01, 0x02, 0x03]
        );
    }

    #[test]
    fn decode_merges_into_existing_message() {
        let mut msg = crate::test::Test::default();
        // Unpacked and packed occurrences of field 8 accumulate.
        msg.decode_flat::<32>(&[0x40, 0x07, 0x42, 0x02, 0x08, 0x09]).unwrap();
        msg.decode_flat::<32>(&[0x4a, 0x02, 0x08, 0x05]).unwrap();
        msg.decode_flat::<32>(&[0x4a, 0x02, 0x10, 0x03]).unwrap();
        assert_eq!(msg.values(), &[7, 8, 9]);
        let child = msg.child().unwrap();
        assert_eq!((child.x(), child.y()), (5, -2));
    }

    #[test]
    fn unknown_fields_survive() {
        let data = [
            0x08, 0x01, // x
            0x78, 0x2a, // field 15, varint
            0x82, 0x01, 0x02, 0xaa, 0xbb, // field 16, bytes
        ];
        let mut msg = crate::test::Test::default();
        msg.decode_flat::<32>(&data).unwrap();
        assert_eq!(msg.unknown_fields(), &data[2..]);
        assert_eq!(msg.encode_vec().unwrap(), data);
    }

    #[test]
    fn decode_errors_are_typed() {
        let mut msg = crate::test::Test::default();
        let err = msg.decode_flat::<32>(&[0x38, 0x02]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<crate::DecodeError>(),
            Some(&crate::DecodeError::InvalidBool {
                field_id: 7,
                value: 2
            })
        );
        // A string tagged as fixed32 does not match field 3.
        assert!(msg.decode_flat::<32>(&[0x1d, 0, 0, 0, 0]).is_err());
    }

    // `levels` nested children, the innermost carrying x = 1.
    #[cfg(test)]
    fn nested(levels: usize) -> Vec<u8> {
        let mut reversed = vec![0x01, 0x08];
        for _ in 0..levels {
            let mut prefix = [0u8; 10];
            let mut writer = crate::wire::WriteCursor::new(&mut prefix, 0);
            writer.write_varint(reversed.len() as u64).unwrap();
            let prefix_len = writer.position();
            reversed.extend(prefix[..prefix_len].iter().rev());
            reversed.push(0x4a);
        }
        reversed.reverse();
        reversed
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let data = nested(3);
        assert_eq!(data, [0x4a, 0x06, 0x4a, 0x04, 0x4a, 0x02, 0x08, 0x01]);

        let mut msg = crate::test::Test::default();
        msg.decode_flat::<3>(&data).unwrap();
        let innermost = msg.child().and_then(|c| c.child()).and_then(|c| c.child());
        assert_eq!(innermost.map(|c| c.x()), Some(1));

        let mut msg = crate::test::Test::default();
        let err = msg.decode_flat::<2>(&data).unwrap_err();
        assert_eq!(
            err.downcast_ref::<crate::DecodeError>(),
            Some(&crate::DecodeError::DepthExceeded { offset: 6 })
        );
    }

    #[test]
    fn very_deep_input_fails_without_recursing() {
        let data = nested(200_000);
        let mut msg = crate::test::Test::default();
        let err = msg.decode_flat::<100>(&data).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::DecodeError>(),
            Some(crate::DecodeError::DepthExceeded { .. })
        ));
    }

    #[test]
    fn encode_flat_into_buffer() {
        let msg = sample();
        let expected = msg.encode_vec().unwrap();
        let mut buffer = vec![0u8; 1024];
        assert_eq!(msg.encode_flat(&mut buffer).unwrap(), expected.as_slice());
        let mut small = vec![0u8; expected.len() - 1];
        assert!(msg.encode_flat(&mut small).is_err());
    }

    #[test]
    fn decode_from_read_respects_limit() {
        let data = sample().encode_vec().unwrap();
        let mut msg = crate::test::Test::default();
        msg.decode_from_read::<32>(data.as_slice(), data.len()).unwrap();
        assert_eq!(msg.encode_vec().unwrap(), data);

        let mut msg = crate::test::Test::default();
        assert!(msg.decode_from_read::<32>(data.as_slice(), data.len() - 1).is_err());
    }

    #[test]
    fn decode_from_async_read() {
        let data = sample().encode_vec().unwrap();
        let mut msg = crate::test::Test::default();
        let mut reader = futures::io::Cursor::new(data.clone());
        futures::executor::block_on(msg.decode_from_async_read::<32>(&mut reader, 1 << 20))
            .unwrap();
        assert_eq!(msg.encode_vec().unwrap(), data);

        let mut reader = futures::io::Cursor::new(data.clone());
        let mut msg = crate::test::Test::default();
        let limited = msg.decode_from_async_read::<32>(&mut reader, 4);
        assert!(futures::executor::block_on(limited).is_err());
    }
}
