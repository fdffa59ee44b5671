use anyhow::{ensure, Result};
use bytes::{Buf, BufMut};

use crate::wire::api::ApiKey;
use crate::wire::error::ErrorCode;
use crate::wire::record::Record;
use crate::wire::types::Str;
use crate::wire::{Deserialize, Serialize, WireSize};

/// Response frame: `correlation_id` + `error_code` + body. A non-`None` error
/// code replaces the regular body with a nullable message string.
#[derive(Debug)]
pub struct ResponseMessage {
    /// Echo of the request's correlation id.
    pub correlation_id: i32,
    pub error_code: ErrorCode,
    pub body: ResponseBody,
}

impl ResponseMessage {
    #[inline]
    pub fn new(correlation_id: i32, body: ResponseBody) -> Self {
        Self {
            correlation_id,
            error_code: ErrorCode::None,
            body,
        }
    }

    /// An error response carrying `message` in place of a body.
    #[inline]
    pub fn error(correlation_id: i32, error_code: ErrorCode, message: String) -> Self {
        Self {
            correlation_id,
            error_code,
            body: ResponseBody::Error(Str(Some(message))),
        }
    }

    /// Parse a response to a request for `api_key` (client side).
    pub fn decode<B: Buf>(buf: &mut B, api_key: ApiKey) -> Result<(Self, usize)> {
        ensure!(buf.remaining() >= 6, "response has at least 6B");

        let correlation_id = buf.get_i32();
        let error_code = ErrorCode::try_from(buf.get_i16())
            .map_err(|code| anyhow::anyhow!("unknown error code {code}"))?;
        let mut size = 6;

        let body = if error_code != ErrorCode::None {
            let (message, n) = Str::decode(buf)?;
            size += n;
            ResponseBody::Error(message)
        } else {
            match api_key {
                ApiKey::Produce | ApiKey::ProduceStream => {
                    ensure!(buf.remaining() >= 8, "produce response has an 8B offset");
                    size += 8;
                    ResponseBody::Produce { offset: buf.get_u64() }
                }
                ApiKey::Consume | ApiKey::ConsumeStream => {
                    let (record, n) = Record::decode(buf)?;
                    size += n;
                    ResponseBody::Consume { record }
                }
            }
        };

        let message = Self {
            correlation_id,
            error_code,
            body,
        };

        Ok((message, size))
    }
}

impl WireSize for ResponseMessage {
    // correlation id + error code
    const SIZE: usize = 6;

    fn wire_size(&self) -> usize {
        Self::SIZE + self.body.wire_size()
    }
}

impl Serialize for ResponseMessage {
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32(self.correlation_id);
        self.error_code.put_into(buf);
        self.body.put_into(buf);
    }
}

#[derive(Debug)]
pub enum ResponseBody {
    /// The offset assigned to the appended record.
    Produce { offset: u64 },
    /// The record read at the requested offset.
    Consume { record: Record },
    /// Message accompanying a non-`None` error code.
    Error(Str),
}

impl WireSize for ResponseBody {
    fn wire_size(&self) -> usize {
        match self {
            Self::Produce { .. } => 8,
            Self::Consume { record } => record.wire_size(),
            Self::Error(message) => message.wire_size(),
        }
    }
}

impl Serialize for ResponseBody {
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        match self {
            Self::Produce { offset } => buf.put_u64(*offset),
            Self::Consume { record } => record.put_into(buf),
            Self::Error(message) => message.put_into(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::*;

    #[test]
    fn produce_response_round_trip() {
        let response = ResponseMessage::new(7, ResponseBody::Produce { offset: 42 });

        let mut buf = BytesMut::new();
        response.put_into(&mut buf);
        assert_eq!(buf.len(), response.wire_size());

        let mut buf = buf.freeze();
        let (parsed, _) = ResponseMessage::decode(&mut buf, ApiKey::Produce).expect("decode");
        assert_eq!(parsed.correlation_id, 7);
        assert_eq!(parsed.error_code, ErrorCode::None);
        assert!(matches!(parsed.body, ResponseBody::Produce { offset: 42 }));
    }

    #[test]
    fn consume_response_round_trip() {
        let record = Record {
            value: Bytes::from_static(b"hello world"),
            offset: 3,
        };
        let response = ResponseMessage::new(1, ResponseBody::Consume { record: record.clone() });

        let mut buf = BytesMut::new();
        response.put_into(&mut buf);

        let mut buf = buf.freeze();
        let (parsed, _) = ResponseMessage::decode(&mut buf, ApiKey::Consume).expect("decode");
        let ResponseBody::Consume { record: parsed_record } = parsed.body else {
            panic!("expected a consume body");
        };
        assert_eq!(parsed_record, record);
    }

    #[test]
    fn error_response_carries_message() {
        let response = ResponseMessage::error(
            9,
            ErrorCode::OffsetOutOfRange,
            "the requested offset is outside the log's range: 1".to_string(),
        );

        let mut buf = BytesMut::new();
        response.put_into(&mut buf);
        assert_eq!(buf.len(), response.wire_size());

        let mut buf = buf.freeze();
        let (parsed, _) = ResponseMessage::decode(&mut buf, ApiKey::Consume).expect("decode");
        assert_eq!(parsed.error_code, ErrorCode::OffsetOutOfRange);
        let ResponseBody::Error(Str(Some(message))) = parsed.body else {
            panic!("expected an error body");
        };
        assert!(message.ends_with(": 1"));
    }
}
