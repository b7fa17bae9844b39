use crate::error::{DecodeError, Part};
use crate::utf8;

/// Largest field id whose tag still fits the decoder's 5-byte tag limit.
pub const MAX_FIELD_ID: u32 = (1 << 28) - 1;

/// Payload lengths are limited to what a length prefix can carry.
pub const MAX_LENGTH: usize = i32::MAX as usize;

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WireType {
    Varint = 0,
    I64 = 1,
    Len = 2,
    StartGroup = 3,
    EndGroup = 4,
    I32 = 5,
}

impl WireType {
    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag & 7 {
            0 => Some(WireType::Varint),
            1 => Some(WireType::I64),
            2 => Some(WireType::Len),
            3 => Some(WireType::StartGroup),
            4 => Some(WireType::EndGroup),
            5 => Some(WireType::I32),
            _ => None,
        }
    }

    pub const fn tag(self, field_id: u32) -> u32 {
        (field_id << 3) | self as u32
    }
}

pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}

pub fn zigzag_encode(n: i64) -> u64 {
    ((n as u64) << 1) ^ ((n >> 63) as u64)
}

pub fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ (-((n & 1) as i32))
}

pub fn zigzag_encode32(n: i32) -> u32 {
    ((n as u32) << 1) ^ ((n >> 31) as u32)
}

/// Number of bytes `n` occupies as a minimal varint.
pub fn varint_size(n: u64) -> usize {
    let log2 = (n | 1).ilog2();
    ((log2 * 9 + 64 + 9) / 64) as usize
}

pub fn varint32_size(n: u32) -> usize {
    varint_size(n as u64)
}

/// Forward reader over `buf[pos..end]`. Every read is bounds checked
/// against `end`, never against the whole buffer.
#[derive(Clone, Debug)]
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> ReadCursor<'a> {
    pub fn new(buf: &'a [u8], start: usize, end: usize) -> Result<Self, DecodeError> {
        if start > end || end > buf.len() {
            return Err(DecodeError::RangeOutOfBounds {
                start,
                end,
                len: buf.len(),
            });
        }
        Ok(ReadCursor {
            buf,
            pos: start,
            end,
        })
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn is_at_end(&self) -> bool {
        self.pos == self.end
    }

    #[inline(always)]
    fn next_byte(&mut self, part: Part) -> Result<u8, DecodeError> {
        if self.pos >= self.end {
            return Err(DecodeError::Truncated {
                part,
                offset: self.pos,
            });
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    // Single byte varints dominate real traffic.
    #[inline(always)]
    fn read_small(&mut self) -> Option<u8> {
        if self.pos < self.end {
            let b = self.buf[self.pos];
            if b < 0x80 {
                self.pos += 1;
                return Some(b);
            }
        }
        None
    }

    // The last permitted byte may carry at most `last_max` so the value
    // fits the width; anything larger is an overflow, not a truncation.
    #[inline(never)]
    fn read_varint_limited(
        &mut self,
        max_bytes: usize,
        last_max: u8,
        part: Part,
    ) -> Result<u64, DecodeError> {
        let start = self.pos;
        let mut result = 0u64;
        for i in 0..max_bytes {
            let b = self.next_byte(part)?;
            if i == max_bytes - 1 && b > last_max {
                break;
            }
            result |= ((b & 0x7f) as u64) << (7 * i);
            if b < 0x80 {
                return Ok(result);
            }
        }
        Err(DecodeError::Overflow {
            part,
            offset: start,
        })
    }

    #[inline(always)]
    pub fn read_tag(&mut self) -> Result<u32, DecodeError> {
        if let Some(b) = self.read_small() {
            return Ok(b as u32);
        }
        Ok(self.read_varint_limited(5, 0x07, Part::Tag)? as u32)
    }

    // Reads a length prefix limited to i32::MAX
    #[inline(always)]
    pub fn read_size(&mut self) -> Result<usize, DecodeError> {
        if let Some(b) = self.read_small() {
            return Ok(b as usize);
        }
        Ok(self.read_varint_limited(5, 0x07, Part::Length)? as usize)
    }

    // Encoders sign extend negative int32 values to ten bytes, so the full
    // 64-bit width is accepted and truncated to the low 32 bits.
    #[inline(always)]
    pub fn read_varint32(&mut self) -> Result<u32, DecodeError> {
        if let Some(b) = self.read_small() {
            return Ok(b as u32);
        }
        Ok(self.read_varint_limited(10, 0x01, Part::Varint32)? as u32)
    }

    #[inline(always)]
    pub fn read_varint64(&mut self) -> Result<u64, DecodeError> {
        if let Some(b) = self.read_small() {
            return Ok(b as u64);
        }
        self.read_varint_limited(10, 0x01, Part::Varint64)
    }

    fn take(&mut self, len: usize, part: Part) -> Result<&'a [u8], DecodeError> {
        let start = self.pos;
        match start.checked_add(len) {
            Some(end) if end <= self.end => {
                self.pos = end;
                Ok(&self.buf[start..end])
            }
            _ => Err(DecodeError::Truncated {
                part,
                offset: start,
            }),
        }
    }

    fn read_array<const N: usize>(&mut self, part: Part) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, part)?);
        Ok(out)
    }

    pub fn read_fixed32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array(Part::Fixed32)?))
    }

    pub fn read_fixed64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array(Part::Fixed64)?))
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.take(len, Part::Content)
    }
}

/// Forward writer into a buffer that was sized in advance. Writes past the
/// end fail with `None` instead of growing the buffer.
#[derive(Debug)]
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    pub fn new(buf: &'a mut [u8], offset: usize) -> Self {
        WriteCursor { buf, pos: offset }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    fn put(&mut self, b: u8) -> Option<()> {
        *self.buf.get_mut(self.pos)? = b;
        self.pos += 1;
        Some(())
    }

    #[inline(always)]
    pub fn write_varint32(&mut self, n: u32) -> Option<()> {
        if n < 0x80 {
            return self.put(n as u8);
        }
        if n < 0x4000 {
            self.put(n as u8 | 0x80)?;
            return self.put((n >> 7) as u8);
        }
        self.write_varint(n as u64)
    }

    pub fn write_varint(&mut self, mut n: u64) -> Option<()> {
        while n >= 0x80 {
            self.put(n as u8 | 0x80)?;
            n >>= 7;
        }
        self.put(n as u8)
    }

    pub fn write_tag(&mut self, tag: u32) -> Option<()> {
        self.write_varint32(tag)
    }

    pub fn write_fixed32(&mut self, n: u32) -> Option<()> {
        self.write_slice(&n.to_le_bytes())
    }

    pub fn write_fixed64(&mut self, n: u64) -> Option<()> {
        self.write_slice(&n.to_le_bytes())
    }

    pub fn write_slice(&mut self, slice: &[u8]) -> Option<()> {
        let end = self.pos.checked_add(slice.len())?;
        self.buf.get_mut(self.pos..end)?.copy_from_slice(slice);
        self.pos = end;
        Some(())
    }

    pub fn write_str(&mut self, value: &str) -> Option<()> {
        self.pos = utf8::encode_string_into(value, self.buf, self.pos)?;
        Some(())
    }

    pub fn write_utf16(&mut self, value: &[u16]) -> Option<()> {
        self.pos = utf8::encode_utf16_into(value, self.buf, self.pos)?;
        Some(())
    }
}
