use crate::ai::error::{AiServiceError, AiServiceErrorKind};
use crate::ai::{AnalysisClient, AnalysisOutcome};
use crate::config::Settings;
use crate::domain::analysis::{AnalysisRequest, ChatMessage};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8001";
// The batch call absorbs the collaborator-side fan-out, so its deadline is
// much longer than the collaborator's per-request one (~60s).
const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings
            .ai_service_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("AI_SERVICE_BATCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_BATCH_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build AI service http client")?;

        Ok(Self { http, base_url })
    }

    fn url(&self) -> String {
        format!("{}/analyze/batch", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct BatchAnalyzeRequest<'a> {
    requests: Vec<WireAnalysisRequest<'a>>,
    max_concurrent: usize,
}

#[derive(Debug, Serialize)]
struct WireAnalysisRequest<'a> {
    messages: &'a [ChatMessage],
    api_key: &'a str,
    model_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchAnalyzeResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Option<BatchResults>,
    #[serde(default)]
    summary: Option<BatchSummary>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchResults {
    #[serde(default)]
    successful: Vec<WireOutcome>,
    #[serde(default)]
    failed: Vec<WireOutcome>,
}

#[derive(Debug, Deserialize)]
struct WireOutcome {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchSummary {
    #[serde(default)]
    successful_count: usize,
    #[serde(default)]
    failed_count: usize,
    #[serde(default)]
    total_processing_time: f64,
}

/// Reassembles the collaborator's successful/failed partitions into one
/// index-aligned outcome list. Entries are placed by their explicit index,
/// never matched by content; items with a missing or out-of-range index are
/// dropped with a warning and their slot stays failed.
fn correlate(len: usize, results: BatchResults) -> Vec<AnalysisOutcome> {
    let mut out = vec![AnalysisOutcome::Failed("no result returned".to_string()); len];

    for item in results.successful {
        match item.index {
            Some(i) if i < len => {
                out[i] = AnalysisOutcome::Answer(item.answer.unwrap_or_default());
            }
            _ => tracing::warn!(
                index = ?item.index,
                "successful batch item with missing or out-of-range index; dropped"
            ),
        }
    }

    for item in results.failed {
        match item.index {
            Some(i) if i < len => {
                out[i] = AnalysisOutcome::Failed(
                    item.error.unwrap_or_else(|| "unknown error".to_string()),
                );
            }
            _ => tracing::warn!(
                index = ?item.index,
                "failed batch item with missing or out-of-range index; dropped"
            ),
        }
    }

    out
}

#[async_trait::async_trait]
impl AnalysisClient for HttpAnalysisClient {
    fn service_name(&self) -> &'static str {
        "etf_ai_http"
    }

    async fn analyze_batch(
        &self,
        requests: &[AnalysisRequest],
        max_concurrent_hint: usize,
    ) -> Result<Vec<AnalysisOutcome>, AiServiceError> {
        let body = BatchAnalyzeRequest {
            requests: requests
                .iter()
                .map(|r| WireAnalysisRequest {
                    messages: &r.messages,
                    api_key: &r.api_key,
                    model_type: &r.model_type,
                })
                .collect(),
            max_concurrent: max_concurrent_hint,
        };

        let res = self.http.post(self.url()).json(&body).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(AiServiceError::new(
                AiServiceErrorKind::Http(status.as_u16()),
                "batch analyze request rejected",
            ));
        }

        let text = res.text().await?;
        let parsed = serde_json::from_str::<BatchAnalyzeResponse>(&text).map_err(|err| {
            AiServiceError::new(
                AiServiceErrorKind::Decode,
                format!("invalid batch response JSON: {err}"),
            )
        })?;

        if !parsed.success {
            return Err(AiServiceError::new(
                AiServiceErrorKind::Service,
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        if let Some(summary) = &parsed.summary {
            tracing::info!(
                successful = summary.successful_count,
                failed = summary.failed_count,
                elapsed_secs = summary.total_processing_time,
                "batch analysis completed"
            );
        }

        Ok(correlate(requests.len(), parsed.results.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(index: Option<usize>, answer: Option<&str>, error: Option<&str>) -> WireOutcome {
        WireOutcome {
            index,
            answer: answer.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn correlate_places_outcomes_by_index() {
        let results = BatchResults {
            successful: vec![wire(Some(2), Some("c"), None), wire(Some(0), Some("a"), None)],
            failed: vec![wire(Some(1), None, Some("boom"))],
        };

        let out = correlate(3, results);
        assert_eq!(out[0], AnalysisOutcome::Answer("a".to_string()));
        assert_eq!(out[1], AnalysisOutcome::Failed("boom".to_string()));
        assert_eq!(out[2], AnalysisOutcome::Answer("c".to_string()));
    }

    #[test]
    fn correlate_drops_items_without_index() {
        let results = BatchResults {
            successful: vec![wire(None, Some("orphan"), None), wire(Some(5), Some("oob"), None)],
            failed: vec![],
        };

        let out = correlate(2, results);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(AnalysisOutcome::is_failed));
    }

    #[test]
    fn correlate_preserves_length_for_empty_results() {
        let out = correlate(4, BatchResults::default());
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(AnalysisOutcome::is_failed));
    }

    #[test]
    fn decodes_batch_response_shape() {
        let text = r#"{
            "success": true,
            "results": {
                "successful": [{"index": 0, "answer": "ok", "processing_time": 1.2}],
                "failed": [{"index": 1, "error": "timeout", "processing_time": 60.0}]
            },
            "summary": {"total_requests": 2, "successful_count": 1, "failed_count": 1, "total_processing_time": 61.2}
        }"#;

        let parsed = serde_json::from_str::<BatchAnalyzeResponse>(text).unwrap();
        assert!(parsed.success);
        let results = parsed.results.unwrap();
        assert_eq!(results.successful.len(), 1);
        assert_eq!(results.failed.len(), 1);
        assert_eq!(parsed.summary.unwrap().successful_count, 1);
    }
}
