use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Etf {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    pub description: Option<String>,
}

/// Investment cycle as stored in the settings subsystem. Values outside the
/// known set are preserved so the scheduler can treat them as never-due
/// instead of failing the whole row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvestmentCycle {
    Daily,
    Weekly,
    Monthly,
    Other(String),
}

impl InvestmentCycle {
    pub fn parse(s: &str) -> Self {
        match s {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Other(s) => s,
        }
    }
}

/// Per-ETF recurring purchase configuration. Owned by the settings
/// subsystem; read-only here.
#[derive(Debug, Clone)]
pub struct EtfInvestmentSetting {
    pub id: i64,
    pub user_id: i64,
    pub etf_id: i64,
    pub cycle: InvestmentCycle,
    /// Weekday 0-6 (Monday=0) for weekly, day-of-month 1-28 for monthly.
    /// Ignored for daily.
    pub day: i32,
    /// Purchase amount in 만원.
    pub amount: f64,
}
