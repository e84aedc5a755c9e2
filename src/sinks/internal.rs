//! The in-process sink that hands a dequeued batch of envelopes to
//! [`crate::internal_sink::process`] instead of shipping it anywhere
//! over the network.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Sink, SinkError};
use crate::internal_sink;
use crate::model::api_key::ApiKeyRepo;
use crate::model::report::Envelope;
use crate::model::user::UserRepo;
use crate::store::Store;

pub struct InternalSink {
    store: Arc<dyn Store>,
    users: Arc<dyn UserRepo>,
    api_keys: Arc<dyn ApiKeyRepo>,
}

impl InternalSink {
    pub fn new(store: Arc<dyn Store>, users: Arc<dyn UserRepo>, api_keys: Arc<dyn ApiKeyRepo>) -> Self {
        Self {
            store,
            users,
            api_keys,
        }
    }
}

#[async_trait]
impl Sink for InternalSink {
    async fn upload(&self, data: &[u8]) -> Result<u16, SinkError> {
        let envelopes: Vec<Envelope> = serde_json::from_slice(data).map_err(|err| SinkError::Fatal {
            message: format!("malformed internal batch: {err}"),
        })?;

        internal_sink::process(envelopes, self.store.clone(), self.users.as_ref(), self.api_keys.as_ref())
            .await
            .map_err(|err| SinkError::Transport {
                message: format!("internal sink processing failed: {err}"),
            })?;

        Ok(200)
    }

    fn retriable(&self, error: &SinkError) -> bool {
        matches!(error, SinkError::Transport { .. })
    }
}
