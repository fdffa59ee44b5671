use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::auth::{Acl, Unauthorized};
use crate::handler::{error_response, ConsumeHandler, Handler as _, ProduceHandler};
use crate::log::{Log, LogError, Result as LogResult};
use crate::wire::{
    ErrorCode, MessageReader, MessageWriter, Record, RequestBody, RequestHeader, RequestMessage,
    ResponseBody, ResponseMessage, WireError,
};

/// Authorization object for log-level operations; the log is the only object
/// this server exposes.
const OBJECT_WILDCARD: &str = "*";

/// Pause between failed reads while a consume stream waits at the log's tail
/// for the producer to catch up.
const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The narrow contract the transport consumes. The server never reaches past
/// it into segments or files.
pub trait CommitLog: Send + Sync + 'static {
    /// Assign the next offset to `value`, persist it, and return the offset.
    fn append(&self, value: Bytes) -> LogResult<u64>;

    /// Return the record stored at `offset`.
    fn read(&self, offset: u64) -> LogResult<Record>;

    fn highest_offset(&self) -> LogResult<u64>;

    fn lowest_offset(&self) -> LogResult<u64>;

    /// Drop every segment whose records all lie below `lowest`.
    fn truncate(&self, lowest: u64) -> LogResult<()>;
}

impl CommitLog for Log {
    #[inline]
    fn append(&self, value: Bytes) -> LogResult<u64> {
        Log::append(self, value)
    }

    #[inline]
    fn read(&self, offset: u64) -> LogResult<Record> {
        Log::read(self, offset)
    }

    #[inline]
    fn highest_offset(&self) -> LogResult<u64> {
        Log::highest_offset(self)
    }

    #[inline]
    fn lowest_offset(&self) -> LogResult<u64> {
        Log::lowest_offset(self)
    }

    #[inline]
    fn truncate(&self, lowest: u64) -> LogResult<()> {
        Log::truncate(self, lowest)
    }
}

pub struct Server {
    log: Arc<dyn CommitLog>,
    produce: ProduceHandler,
    consume: ConsumeHandler,
    /// When absent every request is allowed.
    acl: Option<Acl>,
}

impl Server {
    pub fn new(log: Arc<dyn CommitLog>, acl: Option<Acl>) -> Self {
        Self {
            produce: ProduceHandler::new(Arc::clone(&log)),
            consume: ConsumeHandler::new(Arc::clone(&log)),
            log,
            acl,
        }
    }

    /// Serve one client connection until it closes or fails.
    ///
    /// Each frame is authorized with `(subject, "*", action)` before anything
    /// is written or read; a stream of ProduceStream frames is therefore just
    /// pipelined appends, each answered with its offset.
    pub async fn handle_connection(self: Arc<Self>, mut conn: TcpStream) -> Result<()> {
        let (reader, writer) = conn.split();

        let mut reader = MessageReader::new(reader);
        let mut writer = MessageWriter::new(writer);

        loop {
            let req = match reader.read_request().await {
                Ok(Some(req)) => req,
                // client half-closed: end of the session (and of any produce stream)
                Ok(None) => break,
                Err(e) => match e.downcast::<WireError>() {
                    Ok(err) => {
                        let response = ResponseMessage::error(
                            err.correlation_id,
                            err.error_code,
                            err.to_string(),
                        );
                        writer.write_response(response).await?;
                        continue;
                    }
                    Err(e) => return Err(e).context("read request"),
                },
            };

            let RequestMessage { header, body } = req;

            if let Err(denied) = self.authorize(&header) {
                debug!(
                    subject = header.subject(),
                    action = header.api_key.action(),
                    "request denied"
                );
                let response = ResponseMessage::error(
                    header.correlation_id,
                    ErrorCode::AuthorizationFailed,
                    denied.to_string(),
                );
                writer.write_response(response).await?;
                continue;
            }

            match body {
                RequestBody::Produce(body) | RequestBody::ProduceStream(body) => {
                    let response = self.produce.handle_message(&header, body).await?;
                    writer.write_response(response).await?;
                }

                RequestBody::Consume(body) => {
                    let response = self.consume.handle_message(&header, body).await?;
                    writer.write_response(response).await?;
                }

                RequestBody::ConsumeStream(body) => {
                    self.consume_stream(&header, body.offset, &mut reader, &mut writer)
                        .await?;
                    break;
                }
            }
        }

        Ok(())
    }

    /// Tail-follow from `offset`: send a response per record, advancing the
    /// cursor; an out-of-range read means "not yet available", not failure.
    /// Runs until the client goes away.
    async fn consume_stream<R, W>(
        &self,
        header: &RequestHeader,
        mut offset: u64,
        reader: &mut MessageReader<R>,
        writer: &mut MessageWriter<W>,
    ) -> Result<()>
    where
        R: AsyncReadExt + Send + Unpin,
        W: AsyncWriteExt + Send + Unpin,
    {
        loop {
            tokio::select! {
                // a streaming consumer sends nothing further; anything other
                // than silence ends the stream
                next = reader.read_request() => match next {
                    Ok(None) | Err(_) => return Ok(()),
                    Ok(Some(req)) => {
                        debug!(
                            api_key = ?req.header.api_key,
                            "request interleaved into a consume stream, closing"
                        );
                        return Ok(());
                    }
                },

                result = self.next_record(offset) => match result {
                    Ok(record) => {
                        let response = ResponseMessage::new(
                            header.correlation_id,
                            ResponseBody::Consume { record },
                        );
                        writer.write_response(response).await?;
                        offset += 1;
                    }
                    Err(e) => {
                        writer
                            .write_response(error_response(header.correlation_id, &e))
                            .await?;
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Read `offset`, sleeping between attempts while it is past the tail.
    async fn next_record(&self, offset: u64) -> LogResult<Record> {
        loop {
            match self.log.read(offset) {
                Err(LogError::OffsetOutOfRange { .. }) => {
                    tokio::time::sleep(TAIL_POLL_INTERVAL).await;
                }
                other => return other,
            }
        }
    }

    fn authorize(&self, header: &RequestHeader) -> Result<(), Unauthorized> {
        match &self.acl {
            Some(acl) => acl.authorize(header.subject(), OBJECT_WILDCARD, header.api_key.action()),
            None => Ok(()),
        }
    }
}
