//! Chairbook HTTP server.
//!
//! Booking API plus the background jobs: collaborator dispatch, deposit
//! expiry sweeps and reminders.

use anyhow::Context;
use chairbook_core::environment::SystemClock;
use chairbook_core::events::EventBus;
use chairbook_postgres::PostgresBookingStore;
use chairbook_runtime::metrics::MetricsServer;
use chairbook_runtime::{
    BroadcastEventBus, CollaboratorDispatcher, DepositExpirySweeper, EngineEnvironment,
    ReminderJob,
};
use chairbook_web::console::{ConsoleCalendar, ConsoleNotifier};
use chairbook_web::{AppState, Config, build_router, metrics_router};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chairbook=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Chairbook server");

    let config = Config::from_env();
    config
        .engine
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid engine settings")?;
    info!(
        api = %config.api_addr(),
        metrics = %config.metrics_addr(),
        utc_offset_minutes = config.engine.utc_offset_minutes,
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new(config.metrics_addr());
    metrics.start()?;

    info!("Connecting to database...");
    let store =
        PostgresBookingStore::connect(&config.database.url, &config.pool_options()).await?;
    store.migrate().await?;
    info!("Database ready");
    let store = Arc::new(store);

    let bus = Arc::new(BroadcastEventBus::default());
    let env = EngineEnvironment::new(
        store.clone(),
        Arc::new(SystemClock),
        bus.clone(),
        config.engine.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let notifier = Arc::new(ConsoleNotifier::new());

    let mut tasks: Vec<JoinHandle<()>> = vec![
        CollaboratorDispatcher::new(store.clone(), notifier.clone(), Arc::new(ConsoleCalendar::new()))
            .spawn(bus.subscribe()?, shutdown_rx.clone()),
        DepositExpirySweeper::new(env.clone()).spawn(shutdown_rx.clone()),
        ReminderJob::new(env.clone(), notifier).spawn(shutdown_rx.clone()),
    ];
    info!(tasks = tasks.len(), "Background jobs started");

    if let Some(handle) = metrics.handle().cloned() {
        let listener = tokio::net::TcpListener::bind(metrics.addr()).await?;
        let mut stop = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            let served = axum::serve(listener, metrics_router(handle))
                .with_graceful_shutdown(async move {
                    let _ = stop.wait_for(|stopped| *stopped).await;
                })
                .await;
            if let Err(error) = served {
                error!(error = %error, "Metrics listener failed");
            }
        }));
        info!(address = %metrics.addr(), "Metrics listening");
    } else {
        warn!("Metrics recorder was installed elsewhere; /metrics not served");
    }

    let app = build_router(AppState::new(&env));
    let listener = tokio::net::TcpListener::bind(config.api_addr()).await?;
    info!(address = %config.api_addr(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining background jobs");
    let _ = shutdown_tx.send(true);
    let drained = tokio::time::timeout(config.shutdown_timeout(), async {
        for task in tasks {
            if let Err(error) = task.await {
                error!(error = %error, "Background task panicked");
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Background jobs did not stop in time"
        );
    }

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            error!(error = %error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                error!(error = %error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
