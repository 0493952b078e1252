//! Near-miss Email Processor
//!
//! Delivers the email queued by the reporting application.
//!
//! ## Architecture
//!
//! ```text
//! interval / cron tick ──┐
//!                        ↓ (coalesced, one batch at a time)
//! NotificationService::process_queue
//!   ↓ (lease + in-process guard)
//! email_queue (PostgreSQL)
//!   ↓
//! SMTP transport (lettre)
//! ```
//!
//! ## Commands
//!
//! - `run`: one batch, then exit
//! - `daemon`: batches on an interval or cron schedule, admin API alongside
//! - `status`, `test-connection`, `migrate`
//!
//! Exits non-zero only when startup fails (environment, database) or when
//! `test-connection` cannot reach the server.

pub mod cli;
pub mod config;

use axum::Router;
use color_eyre::Section;
use core_config::FromEnv;
use core_config::tracing::init_tracing;
use database::postgres::{
    DatabaseConnection, check_health, connect_with_retry, run_migrations,
};
use domain_notifications::{
    BatchOutcome, MockSmtpTransport, NotificationService, QueueStatus, Repositories,
    SmtpTransport, Transport, handlers,
};
use eyre::{Result, WrapErr};
use migration::Migrator;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, TransportKind};

const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// When daemon batches are triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Interval(Duration),
    Cron(String),
}

/// Run one CLI command to completion.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::from_env().wrap_err("Failed to load configuration")?;
    init_tracing(&config.environment);

    info!(
        name = APP_NAME,
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "Starting email processor"
    );

    info!("Connecting to PostgreSQL...");
    let db = connect_with_retry(config.database.clone(), None)
        .await
        .wrap_err("Failed to connect to PostgreSQL")
        .suggestion("Check DATABASE_URL and that the database accepts connections")?;
    check_health(&db)
        .await
        .wrap_err("PostgreSQL did not answer the liveness probe")?;

    match cli.command {
        Commands::Migrate => {
            run_migrations::<Migrator>(&db, APP_NAME)
                .await
                .wrap_err("Failed to apply migrations")?;
        }

        Commands::Run => {
            let service = build_service(db, &config)?;
            run_once(&service).await;
        }

        Commands::Daemon {
            interval,
            cron,
            no_admin,
        } => {
            let schedule = match cron {
                Some(expr) => Schedule::Cron(expr),
                None => Schedule::Interval(
                    interval
                        .map(Duration::from_secs)
                        .unwrap_or(config.process_interval),
                ),
            };
            let admin_address = (!no_admin).then(|| config.admin.address());

            let service = build_service(db, &config)?;
            run_daemon(service, schedule, admin_address).await?;
        }

        Commands::Status { limit } => {
            let service = build_service(db, &config)?;
            let status = service
                .queue_status(limit)
                .await
                .wrap_err("Failed to read queue status")?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::TestConnection => {
            let service = build_service(db, &config)?;
            let config = service.config_view().await;
            if service.test_connection().await {
                println!("SMTP server {}:{} is reachable", config.server, config.port);
            } else {
                println!("SMTP server {}:{} is NOT reachable", config.server, config.port);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_service(db: DatabaseConnection, config: &AppConfig) -> Result<Arc<NotificationService>> {
    let transport: Arc<dyn Transport> = match config.transport {
        TransportKind::Smtp => Arc::new(SmtpTransport::new()),
        TransportKind::Mock => {
            warn!("EMAIL_TRANSPORT=mock: email is recorded in memory, not delivered");
            Arc::new(MockSmtpTransport::new())
        }
    };

    let settings = config.processor_settings();
    info!(
        holder = %settings.holder_id,
        batch_size = settings.batch_size,
        transport = transport.name(),
        "Processor configured"
    );

    let service = NotificationService::new(Repositories::postgres(db), transport, settings)
        .wrap_err("Failed to initialize notification service")?;
    Ok(Arc::new(service))
}

/// One batch plus the queue totals read afterwards.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub outcome: BatchOutcome,
    /// `None` when the totals could not be read; the batch itself still ran.
    pub status: Option<QueueStatus>,
}

/// Process one batch and log what it did alongside the queue totals.
///
/// Never fails: a status read error after the batch is logged and left out
/// of the summary.
pub async fn run_once(service: &NotificationService) -> BatchSummary {
    let outcome = service.process_queue().await;
    let status = match service.queue_status(0).await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(error = %e, "Failed to read queue status after batch");
            None
        }
    };

    let pending_total = status.as_ref().map(|s| s.pending_count);
    let sent_total = status.as_ref().map(|s| s.sent_count);
    let failed_total = status.as_ref().map(|s| s.failed_count);

    if outcome.skipped {
        info!(
            errors = outcome.errors,
            pending_total, sent_total, failed_total, "Batch skipped, another run holds the queue"
        );
    } else {
        info!(
            attempted = outcome.attempted,
            sent = outcome.sent_count,
            retried = outcome.retried,
            failed = outcome.failed,
            errors = outcome.errors,
            pending_total,
            sent_total,
            failed_total,
            "Processed {} email(s)",
            outcome.sent_count
        );
    }

    BatchSummary { outcome, status }
}

/// Process batches on `schedule` until SIGINT/SIGTERM.
///
/// A batch in progress when the signal arrives runs to completion; no
/// further batch starts.
pub async fn run_daemon(
    service: Arc<NotificationService>,
    schedule: Schedule,
    admin_address: Option<String>,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    if let Some(address) = admin_address {
        let listener = TcpListener::bind(&address)
            .await
            .wrap_err_with(|| format!("Failed to bind admin server to {}", address))?;
        info!(address = %address, "Admin server listening");

        let router = handlers::router(service.clone());
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(listener, router, shutdown).await {
                error!(error = %e, "Admin server failed");
            }
        });
    }

    let (tick_tx, ticks) = mpsc::channel(1);
    let scheduler = match &schedule {
        Schedule::Cron(expr) => {
            info!(cron = %expr, "Scheduling batches");
            Some(start_cron(expr, tick_tx).await?)
        }
        Schedule::Interval(period) => {
            info!(interval_secs = period.as_secs(), "Scheduling batches");
            tokio::spawn(tick_every(*period, tick_tx));
            None
        }
    };

    process_on_ticks(&service, ticks, shutdown_rx).await;

    if let Some(mut scheduler) = scheduler {
        scheduler
            .shutdown()
            .await
            .wrap_err("Failed to stop scheduler")?;
    }

    info!("Email processor stopped");
    Ok(())
}

/// Run one batch per tick until shutdown is signalled or the ticks stop.
pub async fn process_on_ticks(
    service: &NotificationService,
    mut ticks: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("Shutdown requested, no further batches will start");
                break;
            }
            tick = ticks.recv() => {
                if tick.is_none() {
                    break;
                }
                run_once(service).await;
            }
        }
    }
}

/// Ticks that arrive while a batch is running are dropped.
async fn tick_every(period: Duration, ticks: mpsc::Sender<()>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        match ticks.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("Previous batch still running, skipping tick");
            }
            Err(mpsc::error::TrySendError::Closed(())) => break,
        }
    }
}

async fn start_cron(expr: &str, ticks: mpsc::Sender<()>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .wrap_err("Failed to create scheduler")?;

    let job = Job::new_async(expr, move |_uuid, _lock| {
        let ticks = ticks.clone();
        Box::pin(async move {
            if ticks.try_send(()).is_err() {
                debug!("Previous batch still running, skipping tick");
            }
        })
    })
    .wrap_err_with(|| format!("Invalid cron expression: {}", expr))?;

    scheduler.add(job).await.wrap_err("Failed to add job")?;
    scheduler
        .start()
        .await
        .wrap_err("Failed to start scheduler")?;

    Ok(scheduler)
}

async fn serve_admin(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .wrap_err("Admin server failed")?;

    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}
