use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use etfwatch_core::ai::AnalysisClient;
use etfwatch_core::embedding::EmbeddingClient;
use etfwatch_core::notify::email::EmailClient;
use etfwatch_core::pipeline::Pipeline;
use etfwatch_core::time::kst;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod schedule_loop;

#[derive(Debug, Parser)]
#[command(name = "etfwatch_worker")]
struct Args {
    /// Run a single cycle immediately instead of the scheduler loop.
    #[arg(long)]
    once: bool,

    /// Evaluate the due set as of this date (YYYY-MM-DD, KST). Implies a
    /// single run.
    #[arg(long)]
    as_of: Option<String>,

    /// Report today's due users and exit without analysis or notifications.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = etfwatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let now = resolve_now(args.as_of.as_deref())?;

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    etfwatch_core::storage::migrate(&pool).await?;

    if args.dry_run {
        let due = etfwatch_core::pipeline::preview_due(&pool, now).await?;
        for entry in &due {
            tracing::info!(
                user_id = entry.user_id,
                name = %entry.name,
                due_etfs = entry.due_etfs,
                "investment day today"
            );
        }
        tracing::info!(due_users = due.len(), dry_run = true, "dry run complete");
        return Ok(());
    }

    let pipeline = Pipeline::from_settings(&settings)?;

    if args.once || args.as_of.is_some() {
        run_guarded(&pool, &pipeline, now).await;
        return Ok(());
    }

    let window = schedule_loop::ScheduleWindow::from_env();
    tracing::info!(?window, "scheduler loop started");
    loop {
        let now_kst = kst::kst_now(Utc::now());
        let next = schedule_loop::next_tick(&window, now_kst);
        let wait = (next - now_kst).to_std().unwrap_or_default();
        tracing::info!(%next, "sleeping until next scheduled run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received; stopping scheduler loop");
                return Ok(());
            }
        }

        run_guarded(&pool, &pipeline, Utc::now()).await;
    }
}

/// One pipeline run behind the per-date advisory lock, so a slow cycle
/// still in flight makes the next tick skip instead of overlapping.
async fn run_guarded<A, E, M>(pool: &sqlx::PgPool, pipeline: &Pipeline<A, E, M>, now: DateTime<Utc>)
where
    A: AnalysisClient,
    E: EmbeddingClient,
    M: EmailClient,
{
    let run_date = kst::kst_date(now);

    let acquired = match etfwatch_core::storage::lock::try_acquire_run_lock(pool, run_date).await {
        Ok(acquired) => acquired,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(%run_date, error = %err, "failed to acquire run lock");
            return;
        }
    };
    if !acquired {
        tracing::warn!(%run_date, "run lock not acquired; another run in progress");
        return;
    }

    match pipeline.run_cycle(pool, now).await {
        Ok(report) => {
            tracing::info!(
                run_date = %report.run_date,
                due_users = report.due_users,
                analyzed = report.analyzed,
                notified = report.notified,
                sent = report.dispatch.success_count,
                failed = report.dispatch.failure_count,
                "pipeline run finished"
            );
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(%run_date, error = %err, "pipeline run failed");
        }
    }

    let _ = etfwatch_core::storage::lock::release_run_lock(pool, run_date).await;
}

fn resolve_now(as_of: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    let Some(s) = as_of else {
        return Ok(Utc::now());
    };

    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    // Anchor at local noon so the KST run date is unambiguous.
    let noon = date
        .and_hms_opt(12, 0, 0)
        .context("invalid anchor time for --as-of")?;
    let local = noon
        .and_local_timezone(kst::local_offset())
        .single()
        .context("ambiguous --as-of datetime")?;
    Ok(local.with_timezone(&Utc))
}

fn init_sentry(settings: &etfwatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
