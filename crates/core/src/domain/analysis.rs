use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chat message sent to the AI analysis collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: String) -> Self {
        Self {
            role: "system",
            content,
        }
    }

    pub fn user(content: String) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

/// One per due user per cycle. Built fresh each run, never persisted.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub user_id: i64,
    pub messages: Vec<ChatMessage>,
    pub api_key: String,
    pub model_type: String,
}

/// Canonical form of one AI analysis response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAnalysis {
    pub summary: String,
    pub items: Vec<EtfAdvice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfAdvice {
    pub symbol: String,
    pub name: String,
    pub recommendation: String,
    pub reason: String,
}

/// Last notified summary per user, used by the similarity gate for dedup.
/// Both fields are set together or not at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub last_summary: Option<String>,
    pub last_analysis_at: Option<DateTime<Utc>>,
}
