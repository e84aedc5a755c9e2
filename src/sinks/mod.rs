//! Sink implementations, behind one small capability trait: a
//! tagged-variant/trait value, no class inheritance.

pub mod dummy;
pub mod http;
pub mod internal;
pub mod s3;

use async_trait::async_trait;
use snafu::Snafu;

use crate::export_queue::ExportQueueKind;
use crate::job::JobContext;

#[derive(Debug, Snafu)]
pub enum SinkError {
    #[snafu(display("transport error: {message}"))]
    Transport { message: String },

    #[snafu(display("upstream returned status {status}"))]
    Status { status: u16 },

    #[snafu(display("non-retriable sink error: {message}"))]
    Fatal { message: String },
}

/// The capability set every export sink exposes.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Uploads one already-serialized batch payload, returning a status
    /// code for metrics tagging (`data.export.upload` with `status:<code>`).
    /// Sinks with no natural status code (dummy, object-store, internal)
    /// report `200` on success.
    async fn upload(&self, data: &[u8]) -> Result<u16, SinkError>;

    /// Whether a previously returned error is worth retrying.
    fn retriable(&self, error: &SinkError) -> bool {
        matches!(error, SinkError::Transport { .. } | SinkError::Status { .. })
    }
}

/// Resolves the concrete sink for one export queue's kind from its URL
/// scheme, never by trait-object downcasting.
pub fn build_sink(
    kind: ExportQueueKind,
    url: &str,
    partition_key: &str,
    ctx: &JobContext,
) -> Result<Box<dyn Sink>, SinkError> {
    match kind {
        ExportQueueKind::Dummy => Ok(Box::new(dummy::DummySink)),
        ExportQueueKind::Http | ExportQueueKind::Https => {
            Ok(Box::new(http::HttpSink::new(url)?))
        }
        ExportQueueKind::S3 => {
            let client = ctx.s3_client.clone().ok_or_else(|| SinkError::Fatal {
                message: "s3 export queue configured without an s3 client".to_string(),
            })?;
            Ok(Box::new(s3::S3Sink::new(client, url, partition_key)?))
        }
        ExportQueueKind::Internal => Ok(Box::new(internal::InternalSink::new(
            ctx.store.clone(),
            ctx.users.clone(),
            ctx.api_keys.clone(),
        ))),
    }
}
