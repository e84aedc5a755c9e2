//! Owns every configured [`ExportQueueConfig`], keyed by queue name.
//! Passed explicitly through a job context value rather than living as
//! a module global.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::config::Settings;
use crate::export_queue::ExportQueueConfig;
use crate::store::Store;

pub struct Registry {
    queues: IndexMap<String, ExportQueueConfig>,
}

impl Registry {
    pub fn from_settings(settings: &Settings, store: Arc<dyn Store>) -> Self {
        let mut queues = IndexMap::new();
        for (tag, sink) in &settings.export_queues {
            let name = format!("queue_export_{tag}");
            let skip_keys = sink
                .skip_keys
                .split_whitespace()
                .map(str::to_string)
                .collect();
            queues.insert(
                name.clone(),
                ExportQueueConfig::new(name, &sink.url, sink.batch, skip_keys, sink.compress, store.clone()),
            );
        }
        Self { queues }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExportQueueConfig> {
        self.queues.values()
    }

    pub fn get(&self, name: &str) -> Option<&ExportQueueConfig> {
        self.queues.get(name)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExportQueueSettings, Settings};
    use crate::store::InMemoryStore;

    #[test]
    fn builds_one_config_per_export_queue() {
        let mut settings = Settings::default();
        settings.export_queues.insert(
            "partner".to_string(),
            ExportQueueSettings {
                url: "https://partner.example/ingest".to_string(),
                batch: 100,
                skip_keys: "blocked_key".to_string(),
                compress: true,
            },
        );
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let registry = Registry::from_settings(&settings, store);

        let queue = registry.get("queue_export_partner").unwrap();
        assert_eq!(queue.batch, 100);
        assert!(queue.compress);
        assert!(!queue.export_allowed(Some("blocked_key")));
    }
}
