use crate::cli::ServeArgs;
use crate::infra::{AppState, LifecycleRuntime};
use crate::routes::with_submission_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use submission_engine::config::AppConfig;
use submission_engine::error::AppError;
use submission_engine::telemetry;
use submission_engine::workflows::submissions::{
    InMemorySubmissionStore, SystemClock, UuidIdGenerator,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(interval) = args.worker_interval_secs.take() {
        config.lifecycle.worker_interval_secs = interval;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    // No campaign catalog is wired in serve mode; create trusts the submitted rate.
    let runtime = Arc::new(LifecycleRuntime::build(
        &config.lifecycle,
        Arc::new(InMemorySubmissionStore::new()),
        None,
        Arc::new(SystemClock),
        Arc::new(UuidIdGenerator),
    )?);

    let app = with_submission_routes(runtime.service.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let reconciler = spawn_reconciler(
        runtime,
        Duration::from_secs(config.lifecycle.worker_interval_secs.max(1)),
    );
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "submission service ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    reconciler.abort();
    info!("submission service stopped");
    Ok(())
}

fn spawn_reconciler(runtime: Arc<LifecycleRuntime>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let report = runtime.reconcile();
            debug!(
                auto_approved = report.auto_approved,
                view_locked = report.view_locked,
                published = report.relay.published,
                retried = report.relay.retried,
                dead_lettered = report.relay.dead_lettered,
                "reconciliation pass finished"
            );
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
