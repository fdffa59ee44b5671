use anyhow::{ensure, Result};
use bytes::{Buf, BufMut};

use crate::wire::api::{ApiKey, ApiVersion};
use crate::wire::error::{ErrorCode, WireError};
use crate::wire::record::Record;
use crate::wire::types::Str;
use crate::wire::{Deserialize, Serialize, WireSize};

#[derive(Debug)]
pub struct RequestHeader {
    /// Identifies the requested operation.
    pub api_key: ApiKey,

    /// The version of the API to use for the request.
    pub api_version: ApiVersion,

    /// A unique identifier for the request, echoed back in the response.
    pub correlation_id: i32,

    /// A string identifying the client; doubles as the authorization subject.
    /// Null (or empty) denotes unauthenticated access.
    pub client_id: Option<String>,
}

impl RequestHeader {
    // NOTE: failures after the first 8 bytes carry the correlation id as a
    // WireError so the server can still answer the request.
    pub fn read_from<B: Buf>(buf: &mut B) -> Result<(Self, usize)> {
        ensure!(
            buf.remaining() >= 8,
            "request header has at least 8B, got {}B",
            buf.remaining()
        );

        let api_key = buf.get_i16();
        let api_version = buf.get_i16();
        let correlation_id = buf.get_i32();

        let mut header_bytes = 2 + 2 + 4;

        let wire_err = |error_code| WireError {
            error_code,
            api_key,
            correlation_id,
        };

        let request_api_key = ApiKey::try_from(api_key).map_err(wire_err)?;
        let api_version = ApiVersion::parse(request_api_key, api_version).map_err(wire_err)?;

        let (Str(client_id), n) =
            Str::decode(buf).map_err(|_| wire_err(ErrorCode::InvalidRequest))?;
        header_bytes += n;

        let header = Self {
            api_key: request_api_key,
            api_version,
            correlation_id,
            client_id,
        };

        Ok((header, header_bytes))
    }

    /// The authorization subject this request acts as.
    #[inline]
    pub fn subject(&self) -> &str {
        self.client_id.as_deref().unwrap_or("")
    }
}

impl WireSize for RequestHeader {
    const SIZE: usize = 8;

    fn wire_size(&self) -> usize {
        Self::SIZE + Str::SIZE + self.client_id.as_ref().map_or(0, String::len)
    }
}

impl Serialize for RequestHeader {
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        buf.put_i16(self.api_key as i16);
        buf.put_i16(self.api_version.into_inner());
        buf.put_i32(self.correlation_id);
        Str(self.client_id.clone()).put_into(buf);
    }
}

#[derive(Debug)]
pub struct RequestMessage {
    pub header: RequestHeader,
    pub body: RequestBody,
}

impl WireSize for RequestMessage {
    fn wire_size(&self) -> usize {
        self.header.wire_size() + self.body.wire_size()
    }
}

impl Serialize for RequestMessage {
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        self.header.put_into(buf);
        self.body.put_into(buf);
    }
}

#[derive(Debug)]
pub enum RequestBody {
    Produce(Produce),
    Consume(Consume),
    ProduceStream(Produce),
    ConsumeStream(Consume),
}

impl RequestBody {
    pub fn decode<B: Buf>(buf: &mut B, api_key: ApiKey) -> Result<(Self, usize)> {
        match api_key {
            ApiKey::Produce => Produce::decode(buf).map(|(body, n)| (Self::Produce(body), n)),
            ApiKey::Consume => Consume::decode(buf).map(|(body, n)| (Self::Consume(body), n)),
            ApiKey::ProduceStream => {
                Produce::decode(buf).map(|(body, n)| (Self::ProduceStream(body), n))
            }
            ApiKey::ConsumeStream => {
                Consume::decode(buf).map(|(body, n)| (Self::ConsumeStream(body), n))
            }
        }
    }
}

impl WireSize for RequestBody {
    fn wire_size(&self) -> usize {
        match self {
            Self::Produce(body) | Self::ProduceStream(body) => body.wire_size(),
            Self::Consume(body) | Self::ConsumeStream(body) => body.wire_size(),
        }
    }
}

impl Serialize for RequestBody {
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        match self {
            Self::Produce(body) | Self::ProduceStream(body) => body.put_into(buf),
            Self::Consume(body) | Self::ConsumeStream(body) => body.put_into(buf),
        }
    }
}

/// Body of a Produce(Stream) request: the record to append. Any
/// client-provided offset is overwritten by the log.
#[derive(Debug)]
pub struct Produce {
    pub record: Record,
}

impl WireSize for Produce {
    #[inline]
    fn wire_size(&self) -> usize {
        self.record.wire_size()
    }
}

impl Serialize for Produce {
    #[inline]
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        self.record.put_into(buf);
    }
}

impl Deserialize for Produce {
    fn decode<B: Buf>(buf: &mut B) -> Result<(Self, usize)> {
        let (record, n) = Record::decode(buf)?;
        Ok((Self { record }, n))
    }
}

/// Body of a Consume(Stream) request: the offset to read (from).
#[derive(Debug)]
pub struct Consume {
    pub offset: u64,
}

impl WireSize for Consume {
    const SIZE: usize = 8;

    #[inline]
    fn wire_size(&self) -> usize {
        Self::SIZE
    }
}

impl Serialize for Consume {
    #[inline]
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64(self.offset);
    }
}

impl Deserialize for Consume {
    fn decode<B: Buf>(buf: &mut B) -> Result<(Self, usize)> {
        ensure!(buf.remaining() >= 8, "not enough bytes left");
        Ok((Self { offset: buf.get_u64() }, 8))
    }
}
