use bytes::BufMut;

use crate::wire::{Serialize, WireSize};

/// A request that failed before (or instead of) producing a regular response.
///
/// Carries everything needed to answer the client: the code plus the
/// correlation id parsed from the offending request.
#[derive(Debug, thiserror::Error)]
#[error("request failed: {error_code:?}, api key {api_key}, correlation id {correlation_id}")]
pub struct WireError {
    pub error_code: ErrorCode,
    pub api_key: i16,
    pub correlation_id: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(i16)]
pub enum ErrorCode {
    /// The server experienced an unexpected error when processing the request.
    UnknownServerError = -1,

    #[default]
    None = 0,

    /// The requested offset is not within the range of offsets maintained by
    /// the log.
    OffsetOutOfRange = 1,

    /// The request was malformed or referred to an unknown API.
    InvalidRequest = 2,

    /// The version of the API is not supported.
    UnsupportedVersion = 3,

    /// The subject is not permitted to perform the requested action.
    AuthorizationFailed = 4,
}

impl TryFrom<i16> for ErrorCode {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::UnknownServerError),
            0 => Ok(Self::None),
            1 => Ok(Self::OffsetOutOfRange),
            2 => Ok(Self::InvalidRequest),
            3 => Ok(Self::UnsupportedVersion),
            4 => Ok(Self::AuthorizationFailed),
            other => Err(other),
        }
    }
}

impl WireSize for ErrorCode {
    const SIZE: usize = 2;

    #[inline]
    fn wire_size(&self) -> usize {
        Self::SIZE
    }
}

impl Serialize for ErrorCode {
    #[inline]
    fn put_into<B: BufMut>(&self, buf: &mut B) {
        buf.put_i16(*self as i16);
    }
}
