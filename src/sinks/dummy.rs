//! A no-op sink so configuration-driven enablement can be exercised in
//! tests.

use async_trait::async_trait;

use super::{Sink, SinkError};

#[derive(Debug, Default, Clone)]
pub struct DummySink;

#[async_trait]
impl Sink for DummySink {
    async fn upload(&self, _data: &[u8]) -> Result<u16, SinkError> {
        Ok(200)
    }

    fn retriable(&self, _error: &SinkError) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_always_succeeds() {
        let sink = DummySink;
        assert_eq!(sink.upload(b"{}").await.unwrap(), 200);
    }
}
