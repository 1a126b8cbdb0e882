//! Article summaries for the weekly roundup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use newsbot_core::config::{SummaryConfig, SummaryProvider};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArticleSummary {
    pub title: Option<String>,
    pub summary: Option<String>,
}

impl ArticleSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.summary.is_none()
    }
}

/// Failures are absorbed: a summarizer that cannot summarize returns [`ArticleSummary::empty`].
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, url: &str) -> ArticleSummary;
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary transport failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("summary service returned http {0}")]
    Status(u16),
    #[error("summary response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("summary service error {code}: {message}")]
    Api { code: i64, message: String },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoSummarizer;

#[async_trait]
impl Summarizer for NoSummarizer {
    async fn summarize(&self, _url: &str) -> ArticleSummary {
        ArticleSummary::empty()
    }
}

pub struct SmmrySummarizer {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    sentences: u32,
}

impl SmmrySummarizer {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        sentences: u32,
        timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs.max(1))).build()?;
        Ok(Self { http, base_url: base_url.to_string(), api_key, sentences })
    }

    async fn request(&self, url: &str) -> Result<ArticleSummary, SummaryError> {
        let sentences = self.sentences.to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("SM_API_KEY", self.api_key.expose_secret()),
                ("SM_LENGTH", sentences.as_str()),
                ("SM_URL", url),
            ])
            .send()
            .await
            .map_err(SummaryError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SummaryError::Status(status.as_u16()));
        }

        let body: SmmryResponse = response.json().await.map_err(SummaryError::Decode)?;
        if let Some(code) = body.sm_api_error {
            return Err(SummaryError::Api { code, message: body.sm_api_message.unwrap_or_default() });
        }
        Ok(body.into_summary())
    }
}

#[async_trait]
impl Summarizer for SmmrySummarizer {
    async fn summarize(&self, url: &str) -> ArticleSummary {
        match self.request(url).await {
            Ok(summary) => summary,
            Err(error) => {
                warn!(
                    event_name = "roundup.summary.failed",
                    url = %url,
                    error = %error,
                    "summary unavailable; continuing without it"
                );
                ArticleSummary::empty()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SmmryResponse {
    sm_api_title: Option<String>,
    sm_api_content: Option<String>,
    sm_api_error: Option<i64>,
    sm_api_message: Option<String>,
}

impl SmmryResponse {
    fn into_summary(self) -> ArticleSummary {
        ArticleSummary {
            title: self.sm_api_title.filter(|title| !title.trim().is_empty()),
            summary: self.sm_api_content.filter(|content| !content.trim().is_empty()),
        }
    }
}

pub fn summarizer_from_config(config: &SummaryConfig) -> Result<Arc<dyn Summarizer>, reqwest::Error> {
    match (config.provider, &config.api_key) {
        (SummaryProvider::Smmry, Some(api_key)) => Ok(Arc::new(SmmrySummarizer::new(
            &config.base_url,
            api_key.clone(),
            config.sentences,
            config.timeout_secs,
        )?)),
        _ => Ok(Arc::new(NoSummarizer)),
    }
}
