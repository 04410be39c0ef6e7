pub mod error;
pub mod http;
pub mod orchestrator;

use crate::domain::analysis::AnalysisRequest;
use error::AiServiceError;

/// Tagged per-request result of one batch call. Correlation with the
/// originating user is strictly positional; a `Failed` entry keeps its slot
/// so indexes stay aligned.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Answer(String),
    Failed(String),
}

impl AnalysisOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answer(text) => Some(text),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// AI analysis collaborator. One call carries the whole cycle's requests;
/// the collaborator fans out internally, bounded by the concurrency hint.
#[async_trait::async_trait]
pub trait AnalysisClient: Send + Sync {
    fn service_name(&self) -> &'static str;

    async fn analyze_batch(
        &self,
        requests: &[AnalysisRequest],
        max_concurrent_hint: usize,
    ) -> Result<Vec<AnalysisOutcome>, AiServiceError>;
}
