use anyhow::Context;
use chrono::{DateTime, Utc};

/// Sole writer of the per-user analysis snapshot. Called at most once per
/// cycle per user, only when the gate decided to notify.
pub async fn update_analysis_snapshot(
    pool: &sqlx::PgPool,
    user_id: i64,
    summary: &str,
    at: DateTime<Utc>,
) -> anyhow::Result<()> {
    let res = sqlx::query(
        "UPDATE investment_settings \
         SET last_summary = $2, last_analysis_at = $3, updated_at = now() \
         WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(summary)
    .bind(at)
    .execute(pool)
    .await
    .context("update analysis snapshot failed")?;

    anyhow::ensure!(
        res.rows_affected() == 1,
        "no investment_settings row for user {user_id}"
    );

    Ok(())
}
