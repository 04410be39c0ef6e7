use crate::domain::analysis::{AnalysisSnapshot, ParsedAnalysis};
use crate::embedding::EmbeddingClient;
use crate::time::kst::kst_date;
use chrono::{DateTime, Utc};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.95;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Strict `<`: a similarity of exactly the threshold is NOT a significant
/// change and suppresses the notification.
pub fn is_significant_change(similarity: f64, threshold: f64) -> bool {
    similarity < threshold
}

/// Snapshot write the caller must persist when a decision carries one.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotUpdate {
    pub summary: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub notify: bool,
    pub update: Option<SnapshotUpdate>,
}

impl GateDecision {
    fn notify_with(update: SnapshotUpdate) -> Self {
        Self {
            notify: true,
            update: Some(update),
        }
    }

    fn suppress() -> Self {
        Self {
            notify: false,
            update: None,
        }
    }
}

/// Decides notify/suppress by comparing the current summary against the
/// last notified one via embedding cosine similarity. The gate itself is
/// stateless; the snapshot lives with the user's settings and is only
/// written when a decision says so.
pub struct SimilarityGate<E> {
    embedder: E,
    threshold: f64,
}

impl<E: EmbeddingClient> SimilarityGate<E> {
    pub fn new(embedder: E) -> Self {
        let threshold = std::env::var("SIMILARITY_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);

        Self::with_threshold(embedder, threshold)
    }

    pub fn with_threshold(embedder: E, threshold: f64) -> Self {
        Self {
            embedder,
            threshold,
        }
    }

    pub async fn decide(
        &self,
        now: DateTime<Utc>,
        current: &ParsedAnalysis,
        snapshot: &AnalysisSnapshot,
    ) -> GateDecision {
        let update = SnapshotUpdate {
            summary: current.summary.clone(),
            at: now,
        };

        // First analysis of the (KST) calendar day always notifies.
        let first_today = match snapshot.last_analysis_at {
            None => true,
            Some(prev_at) => kst_date(prev_at) < kst_date(now),
        };
        if first_today {
            tracing::debug!("first analysis of the day; notifying");
            return GateDecision::notify_with(update);
        }

        // Non-comparable states count as significant change.
        let previous_summary = snapshot.last_summary.as_deref().unwrap_or("");
        if previous_summary.is_empty() || current.summary.is_empty() {
            tracing::warn!("current or previous summary is empty; treating as significant change");
            return GateDecision::notify_with(update);
        }

        let embeddings = tokio::try_join!(
            self.embedder.embed(&current.summary),
            self.embedder.embed(previous_summary),
        );
        let (current_vec, previous_vec) = match embeddings {
            Ok(pair) => pair,
            Err(err) => {
                // Fail open: notify rather than silently suppress. The
                // snapshot is left untouched so the next cycle compares
                // against the same baseline.
                tracing::warn!(error = %err, "embedding unavailable; failing open to notify");
                return GateDecision {
                    notify: true,
                    update: None,
                };
            }
        };

        let similarity = cosine_similarity(&current_vec, &previous_vec);
        tracing::debug!(similarity, threshold = self.threshold, "summary similarity");

        if is_significant_change(similarity, self.threshold) {
            GateDecision::notify_with(update)
        } else {
            GateDecision::suppress()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct TableEmbedder(Vec<(&'static str, Vec<f32>)>);

    #[async_trait::async_trait]
    impl EmbeddingClient for TableEmbedder {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.0
                .iter()
                .find(|(t, _)| *t == text)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| anyhow::anyhow!("no embedding for text"))
        }
    }

    struct FailingEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingClient for FailingEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("embedding service unavailable")
        }
    }

    fn analysis(summary: &str) -> ParsedAnalysis {
        ParsedAnalysis {
            summary: summary.to_string(),
            items: Vec::new(),
        }
    }

    fn at(h: u32) -> DateTime<Utc> {
        // 2026-03-10, KST daytime (09:00 UTC = 18:00 KST).
        Utc.with_ymd_and_hms(2026, 3, 10, h, 0, 0).unwrap()
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 1.0, -2.0];
        assert_eq!(cosine_similarity(&v, &v), 1.0);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_handles_zero_and_mismatched_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn threshold_boundary_is_strict() {
        assert!(!is_significant_change(0.9500000, DEFAULT_SIMILARITY_THRESHOLD));
        assert!(is_significant_change(0.9499999, DEFAULT_SIMILARITY_THRESHOLD));
        assert!(!is_significant_change(1.0, DEFAULT_SIMILARITY_THRESHOLD));
    }

    #[tokio::test]
    async fn no_prior_snapshot_notifies_and_updates() {
        let gate = SimilarityGate::with_threshold(FailingEmbedder, DEFAULT_SIMILARITY_THRESHOLD);
        let decision = gate
            .decide(at(3), &analysis("오늘의 요약"), &AnalysisSnapshot::default())
            .await;

        assert!(decision.notify);
        let update = decision.update.expect("snapshot update");
        assert_eq!(update.summary, "오늘의 요약");
        assert_eq!(update.at, at(3));
    }

    #[tokio::test]
    async fn first_analysis_of_a_new_day_notifies_regardless_of_similarity() {
        // Prior snapshot from the previous KST day with the same text.
        let snapshot = AnalysisSnapshot {
            last_summary: Some("동일한 요약".to_string()),
            last_analysis_at: Some(at(3) - chrono::Duration::days(1)),
        };
        let gate = SimilarityGate::with_threshold(FailingEmbedder, DEFAULT_SIMILARITY_THRESHOLD);
        let decision = gate.decide(at(3), &analysis("동일한 요약"), &snapshot).await;

        assert!(decision.notify);
        assert!(decision.update.is_some());
    }

    #[tokio::test]
    async fn same_day_similar_summary_suppresses_without_update() {
        let snapshot = AnalysisSnapshot {
            last_summary: Some("이전 요약".to_string()),
            last_analysis_at: Some(at(1)),
        };
        // Identical embeddings: similarity exactly 1.0.
        let embedder = TableEmbedder(vec![
            ("현재 요약", vec![1.0, 0.0]),
            ("이전 요약", vec![1.0, 0.0]),
        ]);
        let gate = SimilarityGate::with_threshold(embedder, DEFAULT_SIMILARITY_THRESHOLD);
        let decision = gate.decide(at(3), &analysis("현재 요약"), &snapshot).await;

        assert!(!decision.notify);
        assert!(decision.update.is_none());
    }

    #[tokio::test]
    async fn same_day_changed_summary_notifies_and_updates() {
        let snapshot = AnalysisSnapshot {
            last_summary: Some("이전 요약".to_string()),
            last_analysis_at: Some(at(1)),
        };
        // Orthogonal embeddings: similarity 0.0.
        let embedder = TableEmbedder(vec![
            ("현재 요약", vec![1.0, 0.0]),
            ("이전 요약", vec![0.0, 1.0]),
        ]);
        let gate = SimilarityGate::with_threshold(embedder, DEFAULT_SIMILARITY_THRESHOLD);
        let decision = gate.decide(at(3), &analysis("현재 요약"), &snapshot).await;

        assert!(decision.notify);
        assert_eq!(decision.update.unwrap().summary, "현재 요약");
    }

    #[tokio::test]
    async fn empty_current_summary_notifies_conservatively() {
        let snapshot = AnalysisSnapshot {
            last_summary: Some("이전 요약".to_string()),
            last_analysis_at: Some(at(1)),
        };
        let gate = SimilarityGate::with_threshold(FailingEmbedder, DEFAULT_SIMILARITY_THRESHOLD);
        let decision = gate.decide(at(3), &analysis(""), &snapshot).await;

        assert!(decision.notify);
        assert!(decision.update.is_some());
    }

    #[tokio::test]
    async fn embedding_failure_fails_open_without_update() {
        let snapshot = AnalysisSnapshot {
            last_summary: Some("이전 요약".to_string()),
            last_analysis_at: Some(at(1)),
        };
        let gate = SimilarityGate::with_threshold(FailingEmbedder, DEFAULT_SIMILARITY_THRESHOLD);
        let decision = gate.decide(at(3), &analysis("현재 요약"), &snapshot).await;

        assert!(decision.notify);
        assert!(decision.update.is_none());
    }

    #[tokio::test]
    async fn decide_is_deterministic_for_fixed_inputs() {
        let snapshot = AnalysisSnapshot {
            last_summary: Some("이전 요약".to_string()),
            last_analysis_at: Some(at(1)),
        };
        let make_gate = || {
            SimilarityGate::with_threshold(
                TableEmbedder(vec![
                    ("현재 요약", vec![1.0, 0.0]),
                    ("이전 요약", vec![0.0, 1.0]),
                ]),
                DEFAULT_SIMILARITY_THRESHOLD,
            )
        };

        let first = make_gate()
            .decide(at(3), &analysis("현재 요약"), &snapshot)
            .await;
        let second = make_gate()
            .decide(at(3), &analysis("현재 요약"), &snapshot)
            .await;
        assert_eq!(first, second);
    }
}
