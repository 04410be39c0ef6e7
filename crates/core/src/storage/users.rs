use crate::domain::analysis::AnalysisSnapshot;
use crate::domain::user::{InvestmentSettings, User};
use anyhow::Context;
use chrono::{DateTime, Utc};

type SettingsRow = (
    i64,
    i64,
    i32,
    String,
    String,
    Option<String>,
    bool,
    Option<String>,
    Option<DateTime<Utc>>,
);

fn settings_from_row(row: SettingsRow) -> InvestmentSettings {
    let (
        id,
        user_id,
        risk_level,
        api_key,
        model_type,
        persona,
        notification_enabled,
        last_summary,
        last_analysis_at,
    ) = row;

    InvestmentSettings {
        id,
        user_id,
        risk_level,
        api_key,
        model_type,
        persona,
        notification_enabled,
        snapshot: AnalysisSnapshot {
            last_summary,
            last_analysis_at,
        },
    }
}

pub async fn users_with_notifications_enabled(
    pool: &sqlx::PgPool,
) -> anyhow::Result<Vec<InvestmentSettings>> {
    let rows = sqlx::query_as::<_, SettingsRow>(
        "SELECT id, user_id, risk_level, api_key, model_type, persona, notification_enabled, \
                last_summary, last_analysis_at \
         FROM investment_settings \
         WHERE notification_enabled = TRUE \
         ORDER BY user_id ASC",
    )
    .fetch_all(pool)
    .await
    .context("select enabled investment_settings failed")?;

    Ok(rows.into_iter().map(settings_from_row).collect())
}

pub async fn investment_settings_by_user_id(
    pool: &sqlx::PgPool,
    user_id: i64,
) -> anyhow::Result<Option<InvestmentSettings>> {
    let row = sqlx::query_as::<_, SettingsRow>(
        "SELECT id, user_id, risk_level, api_key, model_type, persona, notification_enabled, \
                last_summary, last_analysis_at \
         FROM investment_settings \
         WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("select investment_settings by user failed")?;

    Ok(row.map(settings_from_row))
}

pub async fn user_by_id(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, (i64, String, String, String)>(
        "SELECT id, login_id, name, email FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("select user by id failed")?;

    Ok(row.map(|(id, login_id, name, email)| User {
        id,
        login_id,
        name,
        email,
    }))
}
