use crate::domain::analysis::ParsedAnalysis;
use crate::domain::etf::{Etf, EtfInvestmentSetting};
use crate::domain::notification::{DeliveryChannel, NewNotification, TYPE_PORTFOLIO_ANALYSIS};
use crate::domain::user::User;
use crate::notify::email::{EmailClient, EmailPayload};
use crate::storage;
use sqlx::PgPool;

/// One user flagged for notification by the similarity gate.
#[derive(Debug, Clone)]
pub struct NotificationEntry {
    pub user: User,
    pub etfs: Vec<(EtfInvestmentSetting, Etf)>,
    pub analysis: ParsedAnalysis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub total_count: usize,
}

/// Sends each pending notification and records it. Entries are processed
/// independently and sequentially: one bad entry cannot roll back or block
/// the others, and per-user persistence stays serialized. No retries here;
/// a delivery failure is terminal for the cycle.
pub struct NotificationDispatcher<M> {
    email: M,
}

impl<M: EmailClient> NotificationDispatcher<M> {
    pub fn new(email: M) -> Self {
        Self { email }
    }

    pub async fn dispatch(&self, pool: &PgPool, entries: &[NotificationEntry]) -> DispatchSummary {
        let mut summary = DispatchSummary {
            total_count: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            match self.dispatch_one(pool, entry).await {
                Ok(()) => summary.success_count += 1,
                Err(err) => {
                    tracing::error!(
                        user_id = entry.user.id,
                        error = %err,
                        "notification dispatch failed"
                    );
                    summary.failure_count += 1;
                }
            }
        }

        tracing::info!(
            success = summary.success_count,
            failure = summary.failure_count,
            total = summary.total_count,
            "notification dispatch completed"
        );
        summary
    }

    async fn dispatch_one(&self, pool: &PgPool, entry: &NotificationEntry) -> anyhow::Result<()> {
        // The decision may be minutes old; re-check the user still wants
        // notifications before anything goes out.
        let settings = storage::users::investment_settings_by_user_id(pool, entry.user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} has no settings", entry.user.id))?;
        anyhow::ensure!(
            settings.notification_enabled,
            "notifications disabled for user {}",
            entry.user.id
        );

        let payload = compose_payload(entry);
        let email_sent = self
            .email
            .send_portfolio_notification(&entry.user.email, &entry.user.name, &payload)
            .await;
        if email_sent {
            tracing::info!(user_id = entry.user.id, "portfolio notification email sent");
        } else {
            tracing::warn!(
                user_id = entry.user.id,
                "portfolio notification email failed; recording as in-app"
            );
        }

        // The record is written regardless of the email outcome; sent_via
        // reflects the channel that actually worked.
        let notification = NewNotification {
            user_id: entry.user.id,
            title: notification_title(entry.etfs.len()),
            content: notification_content(&entry.analysis),
            notification_type: TYPE_PORTFOLIO_ANALYSIS.to_string(),
            sent_via: if email_sent {
                DeliveryChannel::Email
            } else {
                DeliveryChannel::App
            },
        };
        storage::notifications::insert_notification(pool, &notification).await?;

        Ok(())
    }
}

pub fn compose_payload(entry: &NotificationEntry) -> EmailPayload {
    let etf_lines = entry
        .etfs
        .iter()
        .map(|(setting, etf)| format!("• {} ({}): {}만 원", etf.symbol, etf.name, setting.amount))
        .collect::<Vec<_>>();
    let total_amount = entry.etfs.iter().map(|(setting, _)| setting.amount).sum();

    EmailPayload {
        etf_lines,
        total_amount,
        etf_count: entry.etfs.len(),
        analysis: entry.analysis.clone(),
    }
}

pub fn notification_title(etf_count: usize) -> String {
    format!("📊 ETF 포트폴리오 투자 분석 알림 ({etf_count}개 종목)")
}

pub fn notification_content(analysis: &ParsedAnalysis) -> String {
    if analysis.summary.is_empty() {
        "분석 결과를 확인해주세요.".to_string()
    } else {
        analysis.summary.clone()
    }
}
