use crate::domain::notification::NewNotification;
use anyhow::Context;

/// Appends one notification row in its own transaction, so a failure here
/// is isolated to the entry being dispatched.
pub async fn insert_notification(
    pool: &sqlx::PgPool,
    notification: &NewNotification,
) -> anyhow::Result<uuid::Uuid> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO notifications (user_id, title, content, type, sent_via) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(notification.user_id)
    .bind(&notification.title)
    .bind(&notification.content)
    .bind(&notification.notification_type)
    .bind(notification.sent_via.as_str())
    .fetch_one(&mut *tx)
    .await
    .context("insert notification failed")?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(id)
}
