//! HTTP document fetcher.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::{SibylError, SibylResult};
use crate::domain::models::IngestStage;
use crate::domain::ports::{DocumentFetcher, FetchedDocument};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches source documents over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> SibylResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SibylError::Configuration(format!("fetcher client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> SibylResult<FetchedDocument> {
        debug!(url, "fetching document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SibylError::ingestion(url, IngestStage::Fetched, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SibylError::ingestion(
                url,
                IngestStage::Fetched,
                format!("source returned {status}"),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SibylError::ingestion(url, IngestStage::Fetched, e))?
            .to_vec();

        debug!(url, size = bytes.len(), content_type = content_type.as_deref(), "fetched document");

        Ok(FetchedDocument { bytes, content_type })
    }
}
