//! The explicit dependency bundle every job function takes, instead of
//! reaching for module-level globals.

use std::sync::Arc;

use crate::model::api_key::ApiKeyRepo;
use crate::model::user::UserRepo;
use crate::registry::Registry;
use crate::store::Store;

#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
    pub users: Arc<dyn UserRepo>,
    pub api_keys: Arc<dyn ApiKeyRepo>,
    pub ingress_queue: String,
    /// Lazily built once at startup; `None` until an S3-backed export
    /// queue is actually configured (`main.rs` builds it from the
    /// ambient AWS environment only when needed).
    pub s3_client: Option<aws_sdk_s3::Client>,
}

impl JobContext {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<Registry>,
        users: Arc<dyn UserRepo>,
        api_keys: Arc<dyn ApiKeyRepo>,
        ingress_queue: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            users,
            api_keys,
            ingress_queue: ingress_queue.into(),
            s3_client: None,
        }
    }

    pub fn with_s3_client(mut self, client: aws_sdk_s3::Client) -> Self {
        self.s3_client = Some(client);
        self
    }
}
