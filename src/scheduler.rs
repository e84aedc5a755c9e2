//! ExportScheduler: walks every partition of every export queue and
//! yields one upload job descriptor for each partition whose batch is
//! ready. Scheduling itself is fire-and-forget; jobs are independent.

use crate::job::JobContext;
use crate::store::QueueError;

/// `(queue_name, partition_key)`, the parameters an upload job is run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub queue_name: String,
    pub partition_key: String,
}

pub async fn ready_jobs(ctx: &JobContext) -> Result<Vec<UploadJob>, QueueError> {
    let mut jobs = Vec::new();
    for queue in ctx.registry.iter() {
        for partition_key in queue.partitions().await? {
            if queue.ready(&partition_key).await? {
                jobs.push(UploadJob {
                    queue_name: queue.name.clone(),
                    partition_key,
                });
            }
        }
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExportQueueSettings, Settings};
    use crate::model::api_key::InMemoryApiKeyRepo;
    use crate::model::report::{Envelope, ExternalReport};
    use crate::model::user::InMemoryUserRepo;
    use crate::registry::Registry;
    use crate::store::InMemoryStore;
    use crate::store::Store;
    use std::sync::Arc;

    #[tokio::test]
    async fn only_ready_partitions_are_scheduled() {
        let mut settings = Settings::default();
        settings.export_queues.insert(
            "partner".to_string(),
            ExportQueueSettings {
                url: "https://partner.example/ingest".to_string(),
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

        assert!(ready_jobs(&ctx).await.unwrap().is_empty());

        let queue = ctx.registry.get("queue_export_partner").unwrap();
        let envelope = Envelope {
            api_key: Some("key1".to_string()),
            nickname: None,
            report: ExternalReport::default(),
        };
        queue.enqueue(&[envelope], "queue_export_partner", None).await.unwrap();

        let jobs = ready_jobs(&ctx).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].queue_name, "queue_export_partner");
    }
}
