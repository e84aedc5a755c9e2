//! POSTs the gzipped JSON payload to a partner endpoint.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::Client;
use std::io::Write;
use std::time::{Duration, Instant};

use super::{Sink, SinkError};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const GZIP_LEVEL: u32 = 5;

pub struct HttpSink {
    client: Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|err| SinkError::Transport {
                message: format!("failed to build http client: {err}"),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn gzip(data: &[u8]) -> Result<Vec<u8>, SinkError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(GZIP_LEVEL));
        encoder.write_all(data).map_err(|err| SinkError::Transport {
            message: format!("gzip encode failed: {err}"),
        })?;
        encoder.finish().map_err(|err| SinkError::Transport {
            message: format!("gzip finish failed: {err}"),
        })
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn upload(&self, data: &[u8]) -> Result<u16, SinkError> {
        let body = Self::gzip(data)?;
        let started = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .header("Content-Encoding", "gzip")
            .header("Content-Type", "application/json")
            .header("User-Agent", "ichnaea")
            .body(body)
            .send()
            .await
            .map_err(|err| SinkError::Transport {
                message: format!("request failed: {err}"),
            })?;

        metrics::histogram!("data.export.upload.duration").record(started.elapsed());

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            // Any non-2xx is retriable alike.
            Err(SinkError::Status {
                status: status.as_u16(),
            })
        }
    }

    fn retriable(&self, error: &SinkError) -> bool {
        matches!(error, SinkError::Transport { .. } | SinkError::Status { .. })
    }
}
