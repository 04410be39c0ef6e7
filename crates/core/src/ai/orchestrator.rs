use crate::ai::{AnalysisClient, AnalysisOutcome};
use crate::domain::analysis::AnalysisRequest;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
const DEFAULT_MAX_CONCURRENT_USERS: usize = 10;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Total attempts per cycle, including the first.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Upper-bound concurrency hint forwarded to the collaborator.
    pub max_concurrent_users: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            max_concurrent_users: DEFAULT_MAX_CONCURRENT_USERS,
        }
    }
}

impl OrchestratorOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("AI_SERVICE_MAX_RETRIES") {
            if let Ok(n) = s.parse::<u32>() {
                out.max_retries = n.max(1);
            }
        }

        if let Ok(s) = std::env::var("AI_SERVICE_RETRY_DELAY") {
            if let Ok(n) = s.parse::<u64>() {
                out.retry_delay = Duration::from_secs(n);
            }
        }

        if let Ok(s) = std::env::var("MAX_CONCURRENT_USERS") {
            if let Ok(n) = s.parse::<usize>() {
                out.max_concurrent_users = n.max(1);
            }
        }

        out
    }
}

/// Runs one cycle's analysis requests as a single batch call with a
/// cycle-level retry policy: a transient failure retries the whole batch,
/// and exhausting retries fails every request in the cycle. Results are
/// correlated back to users positionally, never by content.
pub struct BatchOrchestrator<C> {
    client: C,
    options: OrchestratorOptions,
}

impl<C: AnalysisClient> BatchOrchestrator<C> {
    pub fn new(client: C, options: OrchestratorOptions) -> Self {
        Self { client, options }
    }

    /// Output length always equals input length; failed slots carry the
    /// reason instead of being dropped.
    pub async fn run_batch(&self, requests: &[AnalysisRequest]) -> Vec<AnalysisOutcome> {
        if requests.is_empty() {
            return Vec::new();
        }

        let mut last_error = None;
        for attempt in 1..=self.options.max_retries {
            tracing::info!(
                attempt,
                max_retries = self.options.max_retries,
                requests = requests.len(),
                service = self.client.service_name(),
                "dispatching batch analysis"
            );

            match self
                .client
                .analyze_batch(requests, self.options.max_concurrent_users)
                .await
            {
                Ok(mut outcomes) => {
                    if outcomes.len() != requests.len() {
                        tracing::warn!(
                            expected = requests.len(),
                            got = outcomes.len(),
                            "collaborator returned wrong result count; padding with failures"
                        );
                        outcomes.resize(
                            requests.len(),
                            AnalysisOutcome::Failed("missing batch result".to_string()),
                        );
                    }
                    return outcomes;
                }
                Err(err) if err.is_transient() && attempt < self.options.max_retries => {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        delay = ?self.options.retry_delay,
                        "transient batch failure; retrying"
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                    last_error = Some(err);
                }
                Err(err) => {
                    tracing::error!(attempt, error = %err, "batch analysis abandoned");
                    last_error = Some(err);
                    break;
                }
            }
        }

        // The whole cycle is dropped: every user's slot fails together.
        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "batch analysis failed".to_string());
        vec![AnalysisOutcome::Failed(reason); requests.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::error::{AiServiceError, AiServiceErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubClient {
        attempts: AtomicU32,
        succeed_on: Option<u32>,
        error_kind: AiServiceErrorKind,
    }

    impl StubClient {
        fn failing(kind: AiServiceErrorKind) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                succeed_on: None,
                error_kind: kind,
            }
        }

        fn succeeding_on(attempt: u32) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                succeed_on: Some(attempt),
                error_kind: AiServiceErrorKind::Timeout,
            }
        }
    }

    #[async_trait::async_trait]
    impl AnalysisClient for StubClient {
        fn service_name(&self) -> &'static str {
            "stub"
        }

        async fn analyze_batch(
            &self,
            requests: &[AnalysisRequest],
            _max_concurrent_hint: usize,
        ) -> Result<Vec<AnalysisOutcome>, AiServiceError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.succeed_on {
                Some(n) if attempt >= n => Ok(requests
                    .iter()
                    .enumerate()
                    .map(|(i, _)| AnalysisOutcome::Answer(format!("answer {i}")))
                    .collect()),
                _ => Err(AiServiceError::new(self.error_kind, "stub failure")),
            }
        }
    }

    fn requests(n: usize) -> Vec<AnalysisRequest> {
        (0..n)
            .map(|i| AnalysisRequest {
                user_id: i as i64,
                messages: Vec::new(),
                api_key: "key".to_string(),
                model_type: "model".to_string(),
            })
            .collect()
    }

    fn options() -> OrchestratorOptions {
        OrchestratorOptions {
            max_retries: 3,
            retry_delay: Duration::ZERO,
            max_concurrent_users: 10,
        }
    }

    #[tokio::test]
    async fn exhausted_retries_fail_every_request() {
        let orchestrator = BatchOrchestrator::new(
            StubClient::failing(AiServiceErrorKind::Timeout),
            options(),
        );
        let reqs = requests(4);

        let outcomes = orchestrator.run_batch(&reqs).await;

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(AnalysisOutcome::is_failed));
        assert_eq!(orchestrator.client.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_failure_retries_until_success() {
        let orchestrator = BatchOrchestrator::new(StubClient::succeeding_on(2), options());
        let reqs = requests(2);

        let outcomes = orchestrator.run_batch(&reqs).await;

        assert_eq!(orchestrator.client.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes[0], AnalysisOutcome::Answer("answer 0".to_string()));
        assert_eq!(outcomes[1], AnalysisOutcome::Answer("answer 1".to_string()));
    }

    #[tokio::test]
    async fn non_transient_failure_does_not_retry() {
        let orchestrator = BatchOrchestrator::new(
            StubClient::failing(AiServiceErrorKind::Decode),
            options(),
        );
        let reqs = requests(3);

        let outcomes = orchestrator.run_batch(&reqs).await;

        assert_eq!(orchestrator.client.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(AnalysisOutcome::is_failed));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output_without_calls() {
        let orchestrator = BatchOrchestrator::new(
            StubClient::failing(AiServiceErrorKind::Timeout),
            options(),
        );

        let outcomes = orchestrator.run_batch(&[]).await;

        assert!(outcomes.is_empty());
        assert_eq!(orchestrator.client.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn http_error_is_retried_like_timeout() {
        let orchestrator = BatchOrchestrator::new(
            StubClient::failing(AiServiceErrorKind::Http(503)),
            options(),
        );
        let reqs = requests(1);

        let outcomes = orchestrator.run_batch(&reqs).await;

        assert_eq!(orchestrator.client.attempts.load(Ordering::SeqCst), 3);
        assert!(outcomes[0].is_failed());
    }
}
