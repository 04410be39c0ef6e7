pub mod ai;
pub mod analysis;
pub mod domain;
pub mod embedding;
pub mod notify;
pub mod pipeline;
pub mod schedule;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub ai_service_url: Option<String>,
        pub embedding_service_url: Option<String>,
        pub sendgrid_api_key: Option<String>,
        pub sendgrid_from_email: Option<String>,
        pub sendgrid_from_name: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                ai_service_url: std::env::var("ETF_AI_SERVICE_URL").ok(),
                embedding_service_url: std::env::var("EMBEDDING_SERVICE_URL").ok(),
                sendgrid_api_key: std::env::var("SENDGRID_API_KEY").ok(),
                sendgrid_from_email: std::env::var("SENDGRID_FROM_EMAIL").ok(),
                sendgrid_from_name: std::env::var("SENDGRID_FROM_NAME").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }
    }
}
