//! Tracing setup and process wiring for CronRelay.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cronrelay_api::{ApiServer, AppState};
use cronrelay_config::{Config, LoggingConfig};
use cronrelay_core::{HandlerRegistry, JobCatalog, LocalLeaderGate, Stores};
use cronrelay_scheduler::{EventBus, JobRunnerEndpoint, JobScheduler, RunnerAgent};

use crate::cli::RunOptions;
use crate::handlers::register_builtin;

/// Initialize tracing with console and daily-rolling file output.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = logging.directory_path();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&logging.file_prefix)
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes on drop, so it must live as long as the process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Log every scheduler event at debug level.
fn spawn_event_logger(events: &EventBus, cancel: CancellationToken) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => debug!(?event, "scheduler event"),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event logger lagged, {} events dropped", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown signal received");
        }
        _ = cancel.cancelled() => {}
    }
}

/// Run scheduler, runner and HTTP server until Ctrl-C.
pub(crate) async fn run_server(
    mut config: Config,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = options.host {
        config.server.host = host;
    }
    if let Some(port) = options.port {
        config.server.port = port;
    }
    if options.no_runner {
        config.runner.enabled = false;
    }

    info!("Starting CronRelay v{}", env!("CARGO_PKG_VERSION"));

    let stores = Stores::in_memory();
    let events = EventBus::new();
    let shutdown = CancellationToken::new();
    spawn_event_logger(&events, shutdown.child_token());

    let handlers = Arc::new(HandlerRegistry::new());
    register_builtin(&handlers)?;
    info!("Registered handlers: {}", handlers.list_keys().join(", "));

    let catalog = Arc::new(JobCatalog::new(stores.jobs.clone(), handlers.clone()));
    let seeded = catalog.seed(config.jobs.clone()).await?;
    info!("Seeded {} job(s) from configuration", seeded);

    let gate = Arc::new(LocalLeaderGate::new(config.scheduler.lock_name.clone()));
    let scheduler = Arc::new(JobScheduler::new(
        config.scheduler.clone(),
        config.runner.clone(),
        stores.clone(),
        gate.clone(),
        events.clone(),
    )?);
    gate.add_listener(scheduler.clone());

    let endpoint = Arc::new(JobRunnerEndpoint::new(
        stores.executions.clone(),
        handlers,
        scheduler.status_api(),
        events.clone(),
    ));

    let (runner_id, runner_task) = if config.runner.enabled {
        let agent = Arc::new(RunnerAgent::new(
            stores.runners.clone(),
            config.runner.advertise_host.clone(),
            config.runner_port(),
            config.runner.clone(),
            events.clone(),
        ));
        let id = agent.instance_id().to_string();
        let task = tokio::spawn(agent.run(shutdown.child_token()));
        (Some(id), Some(task))
    } else {
        info!("Runner disabled; this process will not execute jobs");
        (None, None)
    };

    let state = Arc::new(AppState::new(
        catalog,
        scheduler.clone(),
        endpoint,
        stores,
        gate.clone(),
        runner_id,
    ));

    if options.leader {
        gate.enable("--leader given at boot").await;
    }

    let server = ApiServer::new(config.server.host.clone(), config.server.port, state);
    let served = server.run(shutdown_signal(shutdown.clone())).await;

    info!("Shutting down");
    gate.disable("process shutdown").await;
    scheduler.shutdown().await;
    shutdown.cancel();
    if let Some(task) = runner_task {
        if let Err(e) = task.await {
            error!("Runner agent ended abnormally: {}", e);
        }
    }

    served?;
    info!("CronRelay stopped");
    Ok(())
}
