use axum::routing::get;
use axum::Router;
use envconfig::Envconfig;
use eyre::{Context, Result};
use health::HealthRegistry;
use lead_gateway_common::metrics::setup_metrics_router;
use lead_gateway_common::queue::PgQueue;
use lead_gateway_common::store::LeadStore;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use lead_gateway_sweeper::config::Config;
use lead_gateway_sweeper::sweep::{Cleaner, OrphanSweeper};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().context("failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_pg_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to postgres")?;

    let sweeper = OrphanSweeper {
        store: LeadStore::new(pool.clone()),
        queue: PgQueue::new(pool),
        orphan_threshold: config.orphan_threshold.0,
        batch_size: config.sweep_batch_size,
    };

    let liveness = HealthRegistry::new("lead-gateway-sweeper");
    let timeout = time::Duration::try_from(config.sweep_interval.0 * 5)
        .unwrap_or(time::Duration::MAX);
    let handle = liveness.register("sweeper".to_string(), timeout).await;

    let cancel = CancellationToken::new();
    let sweep_cancel = cancel.clone();
    let sweep_interval = config.sweep_interval.0;

    let sweep_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            tokio::select! {
                _ = sweep_cancel.cancelled() => {
                    info!("sweeper shutting down");
                    return;
                }
                _ = interval.tick() => {}
            }

            handle.report_healthy().await;

            match sweeper.cleanup().await {
                Ok(recovered) if recovered > 0 => {
                    info!(recovered, "orphan sweep recovered leads");
                }
                Ok(_) => {}
                Err(error) => warn!(error = %error, "orphan sweep failed"),
            }
        }
    });

    let app = Router::new()
        .route("/_liveness", get(move || liveness_status(liveness.clone())))
        .merge(setup_metrics_router());

    let listener = tokio::net::TcpListener::bind(config.bind())
        .await
        .context("failed to bind the sweeper's metrics/health listener")?;

    let shutdown_cancel = cancel.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown_cancel.cancel();
        });

    tokio::select! {
        result = server => result.context("metrics/health server failed")?,
        _ = cancel.cancelled() => {}
    }

    let _ = sweep_task.await;

    Ok(())
}

async fn liveness_status(registry: HealthRegistry) -> health::HealthStatus {
    registry.get_status()
}
