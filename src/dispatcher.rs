//! IncomingDispatcher: drains the ingress queue once and fans each
//! envelope out into every export queue that allows it.

use indexmap::IndexMap;

use crate::job::JobContext;
use crate::model::report::Envelope;
use crate::queue::{DataQueue, QueueError};

/// One invocation of [`run`]: drains the ingress queue exactly once.
/// Returns whether the ingress queue is still `ready()` afterward, i.e.
/// whether the caller should re-arm and invoke `run` again to catch up.
pub async fn run(ctx: &JobContext) -> Result<bool, QueueError> {
    let ingress = DataQueue::new(ctx.ingress_queue.clone(), ctx.store.clone(), 0, false);
    let envelopes: Vec<Envelope> = ingress.dequeue().await?;
    if envelopes.is_empty() {
        return Ok(false);
    }

    // Group by api_key, preserving arrival order within a group.
    let mut groups: IndexMap<Option<String>, Vec<Envelope>> = IndexMap::new();
    for envelope in envelopes {
        groups.entry(envelope.api_key.clone()).or_default().push(envelope);
    }

    let mut pipeline = ctx.store.pipeline();
    for (api_key, items) in &groups {
        for queue in ctx.registry.iter() {
            if !queue.export_allowed(api_key.as_deref()) {
                continue;
            }
            let partition_key = queue.queue_key(api_key.as_deref());
            queue.enqueue(items, &partition_key, Some(pipeline.as_mut())).await?;
        }
    }
    pipeline.commit().await?;

    ingress.ready().await
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

    fn ctx_with(settings: Settings) -> (JobContext, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let registry = Arc::new(Registry::from_settings(&settings, store.clone()));
        let ctx = JobContext::new(
            store.clone(),
            registry,
            Arc::new(InMemoryUserRepo::new()),
            Arc::new(InMemoryApiKeyRepo::new()),
            "update_incoming",
        );
        (ctx, store)
    }

    #[tokio::test]
    async fn fans_out_to_every_allowed_queue() {
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
        let (ctx, store) = ctx_with(settings);

        let envelope = Envelope {
            api_key: Some("key1".to_string()),
            nickname: None,
            report: ExternalReport::default(),
        };
        let ingress = DataQueue::new(ctx.ingress_queue.clone(), store.clone(), 0, false);
        ingress.enqueue(&[envelope], None).await.unwrap();

        let needs_rearm = run(&ctx).await.unwrap();
        assert!(!needs_rearm);

        assert_eq!(store.len("queue_export_partner").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn skip_keys_prevent_enqueue() {
        let mut settings = Settings::default();
        settings.export_queues.insert(
            "partner".to_string(),
            ExportQueueSettings {
                url: "https://partner.example/ingest".to_string(),
                batch: 1,
                skip_keys: "blocked".to_string(),
                compress: false,
            },
        );
        let (ctx, store) = ctx_with(settings);

        let envelope = Envelope {
            api_key: Some("blocked".to_string()),
            nickname: None,
            report: ExternalReport::default(),
        };
        let ingress = DataQueue::new(ctx.ingress_queue.clone(), store.clone(), 0, false);
        ingress.enqueue(&[envelope], None).await.unwrap();

        run(&ctx).await.unwrap();
        assert_eq!(store.len("queue_export_partner").await.unwrap(), 0);
    }
}
