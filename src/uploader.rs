//! Uploader framework: dequeues one partition's batch, serializes
//! it, retries the sink-specific upload with backoff, and emits metrics.

use serde_json::json;
use snafu::ResultExt;
use std::time::Duration;

use crate::job::JobContext;
use crate::model::report::{Envelope, ExternalReport};
use crate::sinks::{build_sink, SinkError};
use crate::store::QueueError;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_WAIT_SECS: f64 = 1.0;

#[derive(Debug, snafu::Snafu)]
pub enum UploadError {
    #[snafu(display("queue error: {source}"))]
    Queue { source: QueueError },

    #[snafu(display("encode error: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("sink error: {source}"))]
    Sink { source: SinkError },

    #[snafu(display("unknown export queue {name:?}"))]
    UnknownQueue { name: String },
}

impl From<QueueError> for UploadError {
    fn from(source: QueueError) -> Self {
        UploadError::Queue { source }
    }
}

impl From<SinkError> for UploadError {
    fn from(source: SinkError) -> Self {
        UploadError::Sink { source }
    }
}

/// Runs one upload job to completion. Returns whether the partition is
/// `ready()` again afterward, so the caller can re-arm this job.
pub async fn run(ctx: &JobContext, queue_name: &str, partition_key: &str) -> Result<bool, UploadError> {
    let queue = ctx.registry.get(queue_name).ok_or_else(|| UploadError::UnknownQueue {
        name: queue_name.to_string(),
    })?;

    let envelopes: Vec<Envelope> = queue.dequeue(partition_key).await?;
    if envelopes.is_empty() {
        return Ok(false);
    }

    let data = if queue.metadata_required() {
        serde_json::to_vec(&envelopes).context(EncodeSnafu)?
    } else {
        let reports: Vec<&ExternalReport> = envelopes.iter().map(|envelope| &envelope.report).collect();
        serde_json::to_vec(&json!({ "items": reports })).context(EncodeSnafu)?
    };

    let sink = build_sink(queue.kind, &queue.url, partition_key, ctx)?;

    let mut last_err: Option<SinkError> = None;
    for attempt in 0..MAX_ATTEMPTS {
        match sink.upload(&data).await {
            Ok(status) => {
                metrics::counter!("data.export.batch", "key" => queue.metric_tag().to_string()).increment(1);
                metrics::counter!(
                    "data.export.upload",
                    "key" => queue.metric_tag().to_string(),
                    "status" => status.to_string(),
                )
                .increment(1);
                last_err = None;
                break;
            }
            Err(err) => {
                let status_tag = match &err {
                    SinkError::Status { status } => status.to_string(),
                    SinkError::Transport { .. } | SinkError::Fatal { .. } => "error".to_string(),
                };
                metrics::counter!(
                    "data.export.upload",
                    "key" => queue.metric_tag().to_string(),
                    "status" => status_tag,
                )
                .increment(1);

                let retriable = sink.retriable(&err);
                last_err = Some(err);
                if !retriable {
                    break;
                }
                let wait = RETRY_WAIT_SECS * ((attempt * attempt + 1) as f64);
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;
            }
        }
    }

    if let Some(err) = last_err {
        return Err(err.into());
    }

    Ok(queue.ready(partition_key).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExportQueueSettings, Settings};
    use crate::model::api_key::InMemoryApiKeyRepo;
    use crate::model::report::ExternalReport;
    use crate::model::user::InMemoryUserRepo;
    use crate::registry::Registry;
    use crate::store::{InMemoryStore, Store};
    use std::sync::Arc;

    #[tokio::test]
    async fn dummy_sink_drains_partition() {
        let mut settings = Settings::default();
        settings.export_queues.insert(
            "partner".to_string(),
            ExportQueueSettings {
                url: String::new(),
                batch: 1,
                skip_keys: String::new(),
                compress: false,
            },
        );
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let registry = Arc::new(Registry::from_settings(&settings, store.clone()));
        let ctx = JobContext::new(
            store.clone(),
            registry,
            Arc::new(InMemoryUserRepo::new()),
            Arc::new(InMemoryApiKeyRepo::new()),
            "update_incoming",
        );

        let queue = ctx.registry.get("queue_export_partner").unwrap();
        let envelope = Envelope {
            api_key: Some("key1".to_string()),
            nickname: None,
            report: ExternalReport::default(),
        };
        queue
            .enqueue(&[envelope], "queue_export_partner", None)
            .await
            .unwrap();

        let needs_rearm = run(&ctx, "queue_export_partner", "queue_export_partner").await.unwrap();
        assert!(!needs_rearm);
        assert_eq!(store.len("queue_export_partner").await.unwrap(), 0);
    }
}
