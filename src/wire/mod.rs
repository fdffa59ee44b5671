use anyhow::{bail, ensure, Context as _, Result};
use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

pub use self::api::{ApiKey, ApiVersion};
pub use self::error::{ErrorCode, WireError};
pub use self::record::Record;
pub use self::request::{Consume, Produce, RequestBody, RequestHeader, RequestMessage};
pub use self::response::{ResponseBody, ResponseMessage};

pub mod api;
pub mod error;
pub mod record;
pub mod request;
pub mod response;
pub mod types;

/// Encoded size in bytes of a wire value.
pub trait WireSize {
    const SIZE: usize = 0;

    fn wire_size(&self) -> usize;
}

/// Encode a wire value into a frame buffer.
pub trait Serialize: WireSize {
    fn put_into<B: BufMut>(&self, buf: &mut B);
}

/// Decode a wire value, returning it along with the number of bytes consumed.
pub trait Deserialize: Sized {
    fn decode<B: Buf>(buf: &mut B) -> Result<(Self, usize)>;
}

/// Reads `[size: i32 BE][payload]` request frames off a connection.
pub struct MessageReader<R> {
    inner: BufReader<R>,
}

impl<R> MessageReader<R>
where
    R: AsyncReadExt + Send + Unpin,
{
    #[inline]
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
        }
    }

    /// Read and parse the next request; `None` on a clean end of stream.
    ///
    /// Malformed frames surface as a [`WireError`] so the caller can answer
    /// with the matching error code and correlation id; the frame is fully
    /// consumed either way, leaving the stream positioned at the next one.
    pub async fn read_request(&mut self) -> Result<Option<RequestMessage>> {
        let size = match self.inner.read_i32().await {
            Ok(size) => size,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e).context("message size"),
        };
        ensure!(size > 0, "received a zero-sized message");

        let mut buf = BytesMut::with_capacity(size as usize);
        buf.resize(size as usize, 0);

        self.inner
            .read_exact(&mut buf[..])
            .await
            .context("message content")?;

        let mut buf = buf.freeze();
        let (header, _) = RequestHeader::read_from(&mut buf)?;

        let body = match RequestBody::decode(&mut buf, header.api_key) {
            Ok((body, _)) => body,
            Err(_) => bail!(WireError {
                error_code: ErrorCode::InvalidRequest,
                api_key: header.api_key as i16,
                correlation_id: header.correlation_id,
            }),
        };

        Ok(Some(RequestMessage { header, body }))
    }
}

/// Writes `[size: i32 BE][payload]` frames onto a connection.
pub struct MessageWriter<W> {
    inner: BufWriter<W>,
}

impl<W> MessageWriter<W>
where
    W: AsyncWriteExt + Send + Unpin,
{
    #[inline]
    pub fn new(writer: W) -> Self {
        Self {
            inner: BufWriter::new(writer),
        }
    }

    pub async fn write_response(&mut self, response: ResponseMessage) -> Result<()> {
        self.write_frame(&response).await.context("response frame")
    }

    /// Serialize and send a single sized frame, flushing afterwards.
    pub async fn write_frame<T: Serialize>(&mut self, frame: &T) -> Result<()> {
        let size = frame.wire_size();

        let mut buf = BytesMut::with_capacity(4 + size);
        buf.put_i32(size as i32);
        frame.put_into(&mut buf);

        self.inner.write_all(&buf).await.context("frame content")?;
        self.inner.flush().await.context("flush")
    }
}
