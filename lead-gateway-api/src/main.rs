use axum::Router;
use envconfig::Envconfig;
use sqlx::postgres::PgPoolOptions;

use lead_gateway_api::config::Config;
use lead_gateway_api::handlers::app;
use lead_gateway_api::AppState;
use lead_gateway_common::queue::PgQueue;
use lead_gateway_common::store::LeadStore;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_pg_connections)
        .connect(&config.database_url)
        .await?;

    let state = AppState {
        store: LeadStore::new(pool.clone()),
        queue: PgQueue::new(pool),
        auth: config.auth.clone(),
        max_recent_leads: config.max_recent_leads,
    };

    let app = app::add_routes(Router::new(), state);

    let listener = tokio::net::TcpListener::bind(config.bind()).await?;
    tracing::info!(bind = %config.bind(), "lead-gateway-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining in-flight requests");
}
