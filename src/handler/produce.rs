use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::server::CommitLog;
use crate::wire::{request, ApiKey, RequestHeader, ResponseBody, ResponseMessage};

use super::{error_response, Handler};

pub struct ProduceHandler {
    log: Arc<dyn CommitLog>,
}

impl ProduceHandler {
    #[inline]
    pub fn new(log: Arc<dyn CommitLog>) -> Self {
        Self { log }
    }
}

impl Handler for ProduceHandler {
    const API_KEY: ApiKey = ApiKey::Produce;

    type RequestBody = request::Produce;

    async fn handle_message(
        &self,
        header: &RequestHeader,
        body: Self::RequestBody,
    ) -> Result<ResponseMessage> {
        // the offset is server-assigned; whatever the client sent is dropped
        let response = match self.log.append(body.record.value) {
            Ok(offset) => {
                ResponseMessage::new(header.correlation_id, ResponseBody::Produce { offset })
            }
            Err(e) => {
                warn!(error = %e, "append failed");
                error_response(header.correlation_id, &e)
            }
        };

        Ok(response)
    }
}
