use std::sync::Arc;

use anyhow::Result;

use crate::server::CommitLog;
use crate::wire::{request, ApiKey, RequestHeader, ResponseBody, ResponseMessage};

use super::{error_response, Handler};

pub struct ConsumeHandler {
    log: Arc<dyn CommitLog>,
}

impl ConsumeHandler {
    #[inline]
    pub fn new(log: Arc<dyn CommitLog>) -> Self {
        Self { log }
    }
}

impl Handler for ConsumeHandler {
    const API_KEY: ApiKey = ApiKey::Consume;

    type RequestBody = request::Consume;

    async fn handle_message(
        &self,
        header: &RequestHeader,
        body: Self::RequestBody,
    ) -> Result<ResponseMessage> {
        // an out-of-range offset is an ordinary outcome here (readers probe
        // the tail), so failures are answered rather than logged
        let response = match self.log.read(body.offset) {
            Ok(record) => {
                ResponseMessage::new(header.correlation_id, ResponseBody::Consume { record })
            }
            Err(e) => error_response(header.correlation_id, &e),
        };

        Ok(response)
    }
}
