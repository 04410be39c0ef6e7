use crate::ai::http::HttpAnalysisClient;
use crate::ai::orchestrator::{BatchOrchestrator, OrchestratorOptions};
use crate::ai::{AnalysisClient, AnalysisOutcome};
use crate::analysis::gate::SimilarityGate;
use crate::analysis::{parser, prompt};
use crate::config::Settings;
use crate::domain::analysis::AnalysisRequest;
use crate::domain::etf::{Etf, EtfInvestmentSetting};
use crate::domain::user::{InvestmentSettings, User};
use crate::embedding::{EmbeddingClient, HttpEmbeddingClient};
use crate::notify::dispatcher::{DispatchSummary, NotificationDispatcher, NotificationEntry};
use crate::notify::email::{EmailClient, SendGridClient};
use crate::schedule;
use crate::storage;
use crate::time::kst;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

/// One enrolled user with today's due ETF settings resolved.
struct DueUser {
    user: User,
    settings: InvestmentSettings,
    etfs: Vec<(EtfInvestmentSetting, Etf)>,
}

#[derive(Debug, Clone)]
pub struct DuePreview {
    pub user_id: i64,
    pub name: String,
    pub due_etfs: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub due_users: usize,
    pub analyzed: usize,
    pub notified: usize,
    pub dispatch: DispatchSummary,
}

/// One scheduler cycle, end to end. The caller is responsible for
/// preventing overlapping runs (the worker holds an advisory lock around
/// each invocation); the pipeline itself keeps no cross-run state.
pub struct Pipeline<A, E, M> {
    orchestrator: BatchOrchestrator<A>,
    gate: SimilarityGate<E>,
    dispatcher: NotificationDispatcher<M>,
}

impl Pipeline<HttpAnalysisClient, HttpEmbeddingClient, SendGridClient> {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self::new(
            BatchOrchestrator::new(
                HttpAnalysisClient::from_settings(settings)?,
                OrchestratorOptions::from_env(),
            ),
            SimilarityGate::new(HttpEmbeddingClient::from_settings(settings)?),
            NotificationDispatcher::new(SendGridClient::from_settings(settings)?),
        ))
    }
}

impl<A, E, M> Pipeline<A, E, M>
where
    A: AnalysisClient,
    E: EmbeddingClient,
    M: EmailClient,
{
    pub fn new(
        orchestrator: BatchOrchestrator<A>,
        gate: SimilarityGate<E>,
        dispatcher: NotificationDispatcher<M>,
    ) -> Self {
        Self {
            orchestrator,
            gate,
            dispatcher,
        }
    }

    pub async fn run_cycle(&self, pool: &PgPool, now_utc: DateTime<Utc>) -> anyhow::Result<RunReport> {
        let today = kst::kst_date(now_utc);
        tracing::info!(%today, "investment-day check started");

        let due_users = collect_due_users(pool, today).await?;
        if due_users.is_empty() {
            tracing::info!(%today, "no users with an investment day today");
            return Ok(RunReport {
                run_date: today,
                due_users: 0,
                analyzed: 0,
                notified: 0,
                dispatch: DispatchSummary::default(),
            });
        }
        tracing::info!(due_users = due_users.len(), "users due for analysis");

        let requests: Vec<AnalysisRequest> = due_users
            .iter()
            .map(|du| AnalysisRequest {
                user_id: du.user.id,
                messages: prompt::integrated_analysis_messages(
                    &du.user,
                    &du.settings,
                    &du.etfs,
                    today,
                ),
                api_key: du.settings.api_key.clone(),
                model_type: du.settings.model_type.clone(),
            })
            .collect();

        let outcomes = self.orchestrator.run_batch(&requests).await;

        let mut analyzed = 0usize;
        let mut to_notify: Vec<NotificationEntry> = Vec::new();
        for (due_user, outcome) in due_users.into_iter().zip(outcomes) {
            let answer = match outcome {
                AnalysisOutcome::Answer(text) => text,
                AnalysisOutcome::Failed(reason) => {
                    tracing::warn!(
                        user_id = due_user.user.id,
                        %reason,
                        "analysis failed; user skipped this cycle"
                    );
                    continue;
                }
            };
            analyzed += 1;

            let issues = parser::conformance_issues(&answer);
            if !issues.is_empty() {
                let issues: Vec<String> = issues.iter().map(ToString::to_string).collect();
                tracing::warn!(
                    user_id = due_user.user.id,
                    ?issues,
                    "AI response deviates from the expected format"
                );
            }

            let parsed = parser::parse(&answer);
            let decision = self
                .gate
                .decide(now_utc, &parsed, &due_user.settings.snapshot)
                .await;

            if let Some(update) = &decision.update {
                // A failed write only risks a duplicate notification next
                // cycle; the current decision still stands.
                if let Err(err) = storage::snapshots::update_analysis_snapshot(
                    pool,
                    due_user.user.id,
                    &update.summary,
                    update.at,
                )
                .await
                {
                    tracing::error!(
                        user_id = due_user.user.id,
                        error = %err,
                        "snapshot update failed; notification may repeat next cycle"
                    );
                }
            }

            tracing::info!(
                user_id = due_user.user.id,
                notify = decision.notify,
                "analysis evaluated"
            );
            if decision.notify {
                to_notify.push(NotificationEntry {
                    user: due_user.user,
                    etfs: due_user.etfs,
                    analysis: parsed,
                });
            }
        }

        let notified = to_notify.len();
        let dispatch = if to_notify.is_empty() {
            tracing::info!("no notifications to send this cycle");
            DispatchSummary::default()
        } else {
            self.dispatcher.dispatch(pool, &to_notify).await
        };

        let report = RunReport {
            run_date: today,
            due_users: requests.len(),
            analyzed,
            notified,
            dispatch,
        };
        tracing::info!(
            due_users = report.due_users,
            analyzed = report.analyzed,
            notified = report.notified,
            sent = report.dispatch.success_count,
            "cycle completed"
        );
        Ok(report)
    }
}

/// Due-set summary without running any analysis. Used by the worker's
/// dry-run mode.
pub async fn preview_due(pool: &PgPool, now_utc: DateTime<Utc>) -> anyhow::Result<Vec<DuePreview>> {
    let today = kst::kst_date(now_utc);
    let due = collect_due_users(pool, today).await?;
    Ok(due
        .into_iter()
        .map(|du| DuePreview {
            user_id: du.user.id,
            name: du.user.name,
            due_etfs: du.etfs.len(),
        })
        .collect())
}

/// Assembles the due set: enabled users whose settings match today's date,
/// with user and ETF rows resolved. Problems with one user never exclude
/// the others.
async fn collect_due_users(pool: &PgPool, today: NaiveDate) -> anyhow::Result<Vec<DueUser>> {
    let enabled = storage::users::users_with_notifications_enabled(pool).await?;

    let mut out = Vec::new();
    for settings in enabled {
        let etf_settings = match storage::etfs::etf_settings_for_user(pool, settings.user_id).await
        {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(user_id = settings.user_id, error = %err, "failed to load ETF settings; user skipped");
                continue;
            }
        };

        let due = schedule::select_due(today, &etf_settings);
        if due.is_empty() {
            continue;
        }

        let user = match storage::users::user_by_id(pool, settings.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(user_id = settings.user_id, "settings without a user row; skipped");
                continue;
            }
            Err(err) => {
                tracing::warn!(user_id = settings.user_id, error = %err, "failed to load user; skipped");
                continue;
            }
        };

        let mut etfs = Vec::with_capacity(due.len());
        for setting in due {
            match storage::etfs::etf_by_id(pool, setting.etf_id).await {
                Ok(Some(etf)) => etfs.push((setting, etf)),
                Ok(None) => {
                    tracing::warn!(etf_id = setting.etf_id, "unknown ETF referenced by setting; skipped");
                }
                Err(err) => {
                    tracing::warn!(etf_id = setting.etf_id, error = %err, "failed to load ETF; skipped");
                }
            }
        }
        if etfs.is_empty() {
            tracing::warn!(user_id = user.id, "no resolvable due ETFs; user skipped");
            continue;
        }

        out.push(DueUser {
            user,
            settings,
            etfs,
        });
    }

    Ok(out)
}
