use crate::config::Settings;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8002";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Sentence-embedding collaborator. Only used for cosine-similarity dedup,
/// never exposed outside the pipeline.
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpEmbeddingClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings
            .embedding_service_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("EMBEDDING_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build embedding http client")?;

        Ok(Self { http, base_url })
    }

    fn url(&self) -> String {
        format!("{}/embed", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let res = self
            .http
            .post(self.url())
            .json(&EmbedRequest { text })
            .send()
            .await
            .context("embedding request failed")?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("embedding service HTTP {status}");
        }

        let parsed = res
            .json::<EmbedResponse>()
            .await
            .context("failed to decode embedding response")?;

        anyhow::ensure!(
            !parsed.embedding.is_empty(),
            "embedding service returned an empty vector"
        );

        Ok(parsed.embedding)
    }
}
