use anyhow::{ensure, Context as _, Result};
use bytes::{Buf, BufMut};

use super::{Deserialize, Serialize, WireSize};

/// UNSIGNED_VARINT
///
/// Represents an unsigned 32-bit integer in the variable-length encoding from
/// Google Protocol Buffers: seven payload bits per byte, LSB group first, the
/// high bit marking continuation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct UnsignedVarInt(pub u32);

impl WireSize for UnsignedVarInt {
    fn wire_size(&self) -> usize {
        match self.0 {
            0x0..=0x7f => 1,
            0x80..=0x3fff => 2,
            0x4000..=0x1fffff => 3,
            0x200000..=0xfffffff => 4,
            0x10000000..=0xffffffff => 5,
        }
    }
}

impl Serialize for UnsignedVarInt {
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        let mut value = self.0;
        while value >= 0x80 {
            buf.put_u8((value as u8) | 0x80);
            value >>= 7;
        }
        buf.put_u8(value as u8);
    }
}

impl Deserialize for UnsignedVarInt {
    fn decode<B: Buf>(buf: &mut B) -> Result<(Self, usize)> {
        let mut value = 0;
        let mut bytes = 0;
        for i in 0..5 {
            ensure!(buf.has_remaining(), "not enough bytes left");
            let b = buf.get_u8() as u32;
            value |= (b & 0x7F) << (i * 7);
            bytes += 1;
            if b < 0x80 {
                break;
            }
        }
        Ok((Self(value), bytes))
    }
}

/// UNSIGNED_VARLONG
///
/// The 64-bit counterpart of [`UnsignedVarInt`], same encoding.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct UnsignedVarLong(pub u64);

impl WireSize for UnsignedVarLong {
    fn wire_size(&self) -> usize {
        match self.0 {
            0x0..=0x7f => 1,
            0x80..=0x3fff => 2,
            0x4000..=0x1fffff => 3,
            0x200000..=0xfffffff => 4,
            0x10000000..=0x7ffffffff => 5,
            0x800000000..=0x3ffffffffff => 6,
            0x40000000000..=0x1ffffffffffff => 7,
            0x2000000000000..=0xffffffffffffff => 8,
            0x100000000000000..=0x7fffffffffffffff => 9,
            0x8000000000000000..=0xffffffffffffffff => 10,
        }
    }
}

impl Serialize for UnsignedVarLong {
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        let mut value = self.0;
        while value >= 0x80 {
            buf.put_u8((value as u8) | 0x80);
            value >>= 7;
        }
        buf.put_u8(value as u8);
    }
}

impl Deserialize for UnsignedVarLong {
    fn decode<B: Buf>(buf: &mut B) -> Result<(Self, usize)> {
        let mut value = 0;
        let mut bytes = 0;
        for i in 0..10 {
            ensure!(buf.has_remaining(), "not enough bytes left");
            let b = buf.get_u8() as u64;
            value |= (b & 0x7F) << (i * 7);
            bytes += 1;
            if b < 0x80 {
                break;
            }
        }
        Ok((Self(value), bytes))
    }
}

/// Nullable UTF-8 string: i16 length prefix, `-1` encoding null.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Str(pub Option<String>);

impl From<&str> for Str {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Some(s.to_string()))
    }
}

impl WireSize for Str {
    const SIZE: usize = 2;

    #[inline]
    fn wire_size(&self) -> usize {
        Self::SIZE + self.0.as_ref().map_or(0, String::len)
    }
}

impl Serialize for Str {
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        match &self.0 {
            Some(s) => {
                buf.put_i16(s.len() as i16);
                buf.put_slice(s.as_bytes());
            }
            None => buf.put_i16(-1),
        }
    }
}

impl Deserialize for Str {
    fn decode<B: Buf>(buf: &mut B) -> Result<(Self, usize)> {
        ensure!(buf.remaining() >= 2, "not enough bytes left");
        let len = buf.get_i16();

        if len < 0 {
            return Ok((Self(None), 2));
        }

        let len = len as usize;
        ensure!(
            buf.remaining() >= len,
            "string declares {len}B, {}B left",
            buf.remaining()
        );

        let s = String::from_utf8(buf.copy_to_bytes(len).to_vec()).context("string contents")?;
        Ok((Self(Some(s)), 2 + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for value in [0u32, 1, 0x7f, 0x80, 0x3fff, 0x4000, u32::MAX] {
            let varint = UnsignedVarInt(value);
            let mut buf = Vec::new();
            varint.put_into(&mut buf);
            assert_eq!(buf.len(), varint.wire_size());

            let (decoded, n) = UnsignedVarInt::decode(&mut buf.as_slice()).expect("decode");
            assert_eq!(decoded.0, value);
            assert_eq!(n, buf.len());
        }
    }

    #[test]
    fn varlong_boundaries() {
        for value in [0u64, 0x7f, 0x80, 0xffffffff, 1 << 56, u64::MAX] {
            let varlong = UnsignedVarLong(value);
            let mut buf = Vec::new();
            varlong.put_into(&mut buf);
            assert_eq!(buf.len(), varlong.wire_size());

            let (decoded, n) = UnsignedVarLong::decode(&mut buf.as_slice()).expect("decode");
            assert_eq!(decoded.0, value);
            assert_eq!(n, buf.len());
        }
    }

    #[test]
    fn nullable_string() {
        let mut buf = Vec::new();
        Str::from("root").put_into(&mut buf);
        assert_eq!(buf, b"\x00\x04root");

        let (s, n) = Str::decode(&mut buf.as_slice()).expect("decode");
        assert_eq!(s, Str::from("root"));
        assert_eq!(n, 6);

        let mut buf = b"\xff\xff".as_slice();
        let (s, n) = Str::decode(&mut buf).expect("decode null");
        assert_eq!(s, Str(None));
        assert_eq!(n, 2);
    }
}
