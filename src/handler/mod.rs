use anyhow::Result;

use crate::log::LogError;
use crate::wire::{ApiKey, ErrorCode, RequestHeader, ResponseMessage};

pub use consume::ConsumeHandler;
pub use produce::ProduceHandler;

mod consume;
mod produce;

#[allow(async_fn_in_trait)]
pub trait Handler {
    const API_KEY: ApiKey;

    type RequestBody;

    async fn handle_message(
        &self,
        header: &RequestHeader,
        body: Self::RequestBody,
    ) -> Result<ResponseMessage>;
}

/// Translate a log engine failure into its wire code. `IndexFull` is handled
/// inside the log and should never reach this point.
pub(crate) fn error_code(err: &LogError) -> ErrorCode {
    match err {
        LogError::OffsetOutOfRange { .. } => ErrorCode::OffsetOutOfRange,
        _ => ErrorCode::UnknownServerError,
    }
}

/// Build the error response for a failed log operation.
pub(crate) fn error_response(correlation_id: i32, err: &LogError) -> ResponseMessage {
    ResponseMessage::error(correlation_id, error_code(err), err.to_string())
}
