//! Writes the gzipped batch as one object per partition, named by date
//! and a random id.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use uuid::Uuid;

use super::{Sink, SinkError};

const GZIP_LEVEL: u32 = 7;

/// `s3://bucket/path/template/{api_key}/{year}/{month}/{day}/` parsed once
/// at construction; `{year}`/`{month}`/`{day}` are filled in per upload
/// since an object may be written on the day after it was queued.
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
    path_template: String,
    api_key: String,
}

/// Parsed by hand rather than via the `url` crate: the path carries
/// `{api_key}`/`{year}`/`{month}`/`{day}` placeholders that a
/// spec-compliant URL parser would percent-encode the braces of.
fn parse_s3_url(raw_url: &str) -> Result<(String, String), SinkError> {
    let rest = raw_url.strip_prefix("s3://").ok_or_else(|| SinkError::Fatal {
        message: format!("not an s3:// url: {raw_url}"),
    })?;
    match rest.split_once('/') {
        Some((bucket, path)) => Ok((bucket.to_string(), path.to_string())),
        None => Ok((rest.to_string(), String::new())),
    }
}

/// `partition_key` is `"<queue_name>:<api_key>"`; the part after the
/// colon is what `{api_key}` substitutes to.
fn api_key_from_partition(partition_key: &str) -> String {
    match partition_key.split_once(':') {
        Some((_, api_key)) => api_key.to_string(),
        None => "no_key".to_string(),
    }
}

impl S3Sink {
    pub fn new(
        client: aws_sdk_s3::Client,
        url: &str,
        partition_key: &str,
    ) -> Result<Self, SinkError> {
        let (bucket, path_template) = parse_s3_url(url)?;
        Ok(Self {
            client,
            bucket,
            path_template,
            api_key: api_key_from_partition(partition_key),
        })
    }

    fn object_key(&self) -> String {
        let now = Utc::now();
        let path = self
            .path_template
            .replace("{api_key}", &self.api_key)
            .replace("{year}", &now.format("%Y").to_string())
            .replace("{month}", &now.format("%m").to_string())
            .replace("{day}", &now.format("%d").to_string());
        let path = if path.is_empty() || path.ends_with('/') {
            path
        } else {
            format!("{path}/")
        };
        format!("{path}{}.json.gz", Uuid::new_v4())
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
impl Sink for S3Sink {
    async fn upload(&self, data: &[u8]) -> Result<u16, SinkError> {
        let body = Self::gzip(data)?;
        let key = self.object_key();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_encoding("gzip")
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| SinkError::Transport {
                message: format!("s3 put_object failed: {err}"),
            })?;

        Ok(200)
    }

    fn retriable(&self, error: &SinkError) -> bool {
        matches!(error, SinkError::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_path() {
        let (bucket, path) = parse_s3_url("s3://my-bucket/reports/{api_key}/").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(path, "reports/{api_key}/");
    }

    #[test]
    fn extracts_api_key_from_partition_suffix() {
        assert_eq!(api_key_from_partition("queue_export_q2:abc123"), "abc123");
        assert_eq!(api_key_from_partition("queue_export_q2"), "no_key");
    }
}
