//! Process configuration: the Redis/Postgres endpoints and the set of
//! configured export queues. Deserialized from one structured YAML file
//! via `serde` + `serde_yaml`.

use indexmap::IndexMap;
use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use std::path::Path;

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("failed to read config file {path:?}: {source}"))]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse config: {source}"))]
    Parse { source: serde_yaml::Error },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportQueueSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub batch: usize,
    #[serde(default)]
    pub skip_keys: String,
    #[serde(default)]
    pub compress: bool,
}

fn default_ingress_queue() -> String {
    "update_incoming".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub redis_url: String,
    pub database_url: String,
    #[serde(default = "default_ingress_queue")]
    pub ingress_queue: String,
    #[serde(default)]
    pub export_queues: IndexMap<String, ExportQueueSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1/".to_string(),
            database_url: "postgres://localhost/ichnaea".to_string(),
            ingress_queue: default_ingress_queue(),
            export_queues: IndexMap::new(),
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).context(ReadSnafu { path })?;
        Self::from_str(&raw)
    }

    pub fn from_str(raw: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).context(ParseSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_queues() {
        let settings = Settings::from_str(
            r#"
redis_url: redis://localhost/
database_url: postgres://localhost/ichnaea
export_queues:
  partner:
    url: https://partner.example/ingest
    batch: 100
    skip_keys: "blocked_one blocked_two"
    compress: true
  archive:
    url: "s3://bucket/{api_key}/{year}/{month}/{day}/"
    batch: 0
"#,
        )
        .unwrap();

        assert_eq!(settings.export_queues.len(), 2);
        let partner = &settings.export_queues["partner"];
        assert_eq!(partner.batch, 100);
        assert!(partner.compress);
        assert_eq!(partner.skip_keys, "blocked_one blocked_two");
    }

    #[test]
    fn ingress_queue_defaults() {
        let settings = Settings::from_str(
            "redis_url: redis://localhost/\ndatabase_url: postgres://localhost/ichnaea\n",
        )
        .unwrap();
        assert_eq!(settings.ingress_queue, "update_incoming");
    }
}
