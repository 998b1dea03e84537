use super::block::{decode_latest, Block};
use crate::error::SourceError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Anything that can report the pool's most recent block.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Block, SourceError>;
}

/// REST client for the P2Pool blocks endpoint
pub struct HttpBlockSource {
    url: Url,
    http: Client,
}

impl HttpBlockSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Fetch(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { url, http })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl BlockSource for HttpBlockSource {
    async fn fetch_latest(&self) -> Result<Block, SourceError> {
        let resp = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| SourceError::Fetch(format!("Pool API request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(SourceError::Fetch(format!(
                "Pool API returned {status}: {snippet}"
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::Fetch(format!("Failed to read response: {e}")))?;

        decode_latest(&body)
    }
}
