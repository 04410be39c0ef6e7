pub const TYPE_PORTFOLIO_ANALYSIS: &str = "portfolio_analysis";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    App,
    Email,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Email => "email",
        }
    }
}

/// Append-only notification row. Created by the dispatcher, never mutated.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub notification_type: String,
    pub sent_via: DeliveryChannel,
}
