use crate::domain::analysis::AnalysisSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login_id: String,
    pub name: String,
    pub email: String,
}

/// User-level investment settings, including the last-notified analysis
/// snapshot the similarity gate compares against.
#[derive(Debug, Clone)]
pub struct InvestmentSettings {
    pub id: i64,
    pub user_id: i64,
    pub risk_level: i32,
    pub api_key: String,
    pub model_type: String,
    pub persona: Option<String>,
    pub notification_enabled: bool,
    pub snapshot: AnalysisSnapshot,
}
