use std::sync::Arc;

use anyhow::Context;
use axum::{Router, http::StatusCode, routing::get};
use mald_api::{HttpApi, ServiceAdapter};
use mald_core::{BlobStore, FileBackend, JobService, ResultStore, RetentionSweeper};
use mald_observe::init_logger;
use mald_prometheus::PrometheusMetrics;
use mald_remote::{HttpBlobStore, HttpClassifier, LocalBlobStore};
use tokio::net::TcpListener;
use tracing::{error, info};

mod config;
use config::{BlobBackend, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("failed to load configuration")?;
    init_logger(&config.logger)?;

    let metrics = Arc::new(PrometheusMetrics::new().context("failed to register metrics")?);

    let store = ResultStore::new(
        Arc::new(FileBackend::new(&config.results_dir)),
        config.retention,
    );
    let classifier = Arc::new(HttpClassifier::new(&config.classifier_url)?);
    let blobs: Arc<dyn BlobStore> = match &config.blobs {
        BlobBackend::Http(url) => Arc::new(HttpBlobStore::new(url)?),
        BlobBackend::Local(dir) => Arc::new(LocalBlobStore::new(dir)),
    };

    let service = Arc::new(JobService::new(
        config.scheduler.clone(),
        store.clone(),
        classifier,
        blobs,
        metrics.clone(),
    ));
    let sweeper = RetentionSweeper::new(store, config.sweeper.clone())
        .with_metrics(metrics.clone())
        .spawn();

    let app = HttpApi::new(Arc::new(ServiceAdapter::new(service.clone())))
        .router()
        .merge(metrics_router(metrics));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %listener.local_addr()?, results_dir = %config.results_dir.display(), "maldd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("draining background jobs");
    sweeper.shutdown().await;
    service.shutdown().await;
    info!("maldd stopped");
    Ok(())
}

/// GET /metrics in the Prometheus text format.
fn metrics_router(metrics: Arc<PrometheusMetrics>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move {
                metrics.encode().map_err(|e| {
                    error!(error = %e, "failed to encode metrics");
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                })
            }
        }),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
