use anyhow::{bail, ensure, Context as _, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::types::{UnsignedVarInt, UnsignedVarLong};
use super::{Deserialize, Serialize, WireSize};

/// Tag byte for field 1 (`value`), wire type 2 (length-delimited).
const VALUE_TAG: u8 = 0x0a;
/// Tag byte for field 2 (`offset`), wire type 0 (varint).
const OFFSET_TAG: u8 = 0x10;

/// One log record: an opaque payload plus the absolute offset the log
/// assigned to it at append time.
///
/// The encoding is a compact tagged serialization shared by the store frames
/// and the transport bodies. Fields follow proto3 conventions: an empty value
/// and a zero offset are omitted entirely.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    pub value: Bytes,
    pub offset: u64,
}

impl Record {
    #[inline]
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: value.into(),
            offset: 0,
        }
    }

    /// Encode into a standalone buffer (the payload of one store frame).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.put_into(&mut buf);
        buf.freeze()
    }

    /// Decode a record, consuming the remainder of `buf`.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<(Self, usize)> {
        let mut record = Record::default();
        let mut size = 0;

        while buf.has_remaining() {
            let tag = buf.get_u8();
            size += 1;

            match tag {
                VALUE_TAG => {
                    let (UnsignedVarInt(len), n) =
                        UnsignedVarInt::decode(buf).context("value length")?;
                    size += n;

                    let len = len as usize;
                    ensure!(
                        buf.remaining() >= len,
                        "record value declares {len}B, {}B left",
                        buf.remaining()
                    );

                    record.value = buf.copy_to_bytes(len);
                    size += len;
                }

                OFFSET_TAG => {
                    let (UnsignedVarLong(offset), n) =
                        UnsignedVarLong::decode(buf).context("record offset")?;
                    size += n;
                    record.offset = offset;
                }

                tag => bail!("unknown record field tag {tag:#04x}"),
            }
        }

        Ok((record, size))
    }
}

impl WireSize for Record {
    fn wire_size(&self) -> usize {
        let mut size = 0;
        if !self.value.is_empty() {
            size += 1 + UnsignedVarInt(self.value.len() as u32).wire_size() + self.value.len();
        }
        if self.offset != 0 {
            size += 1 + UnsignedVarLong(self.offset).wire_size();
        }
        size
    }
}

impl Serialize for Record {
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        if !self.value.is_empty() {
            buf.put_u8(VALUE_TAG);
            UnsignedVarInt(self.value.len() as u32).put_into(buf);
            buf.put_slice(&self.value);
        }
        if self.offset != 0 {
            buf.put_u8(OFFSET_TAG);
            UnsignedVarLong(self.offset).put_into(buf);
        }
    }
}

impl Deserialize for Record {
    #[inline]
    fn decode<B: Buf>(buf: &mut B) -> Result<(Self, usize)> {
        Record::decode(buf)
    }
}
