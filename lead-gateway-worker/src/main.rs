use std::fs;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use envconfig::Envconfig;
use eyre::{Context, Result};
use health::HealthRegistry;
use lead_gateway_common::delivery::{DeliveryClient, DeliveryConfig};
use lead_gateway_common::mapper::{load_attribute_definitions, MapperConfig};
use lead_gateway_common::metrics::setup_metrics_router;
use lead_gateway_common::normalizer::NormalizerConfig;
use lead_gateway_common::queue::PgQueue;
use lead_gateway_common::retry::BackoffSchedule;
use lead_gateway_common::store::LeadStore;
use lead_gateway_common::validator::ValidatorConfig;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

use lead_gateway_worker::config::{split_fields, Config};
use lead_gateway_worker::resolver::SafeResolver;
use lead_gateway_worker::worker::{run_worker, Processor};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().context("failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_pg_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to postgres")?;

    let store = LeadStore::new(pool.clone());
    let queue = PgQueue::new(pool);

    let validator = ValidatorConfig {
        postal_code_field: config.validator.postal_code_field.clone(),
        postal_code_pattern: regex::Regex::new(&config.validator.postal_code_pattern)
            .context("POSTAL_CODE_PATTERN is not a valid regular expression")?,
        postal_code_rejection_code: config.validator.postal_code_rejection_code.clone(),
        ownership_field: config.validator.ownership_field.clone(),
        ownership_rejection_code: config.validator.ownership_rejection_code.clone(),
        required_fields: split_fields(&config.validator.required_fields),
        missing_field_rejection_code: config.validator.missing_field_rejection_code.clone(),
    };

    let normalizer = NormalizerConfig {
        email_fields: split_fields(&config.normalizer.email_fields).into_iter().collect(),
        phone_fields: split_fields(&config.normalizer.phone_fields).into_iter().collect(),
    };

    let attribute_definitions_raw = fs::read_to_string(&config.attribute_definitions_path)
        .with_context(|| format!("failed to read {}", config.attribute_definitions_path))?;
    let attribute_definitions_doc: serde_json::Value =
        serde_json::from_str(&attribute_definitions_raw)
            .with_context(|| format!("{} is not valid JSON", config.attribute_definitions_path))?;
    let attributes = load_attribute_definitions(&attribute_definitions_doc)
        .context("failed to parse attribute definitions")?;

    let mapper = MapperConfig {
        phone_field: config.downstream.phone_field.clone(),
        product_name: config.downstream.product_name.as_str().to_string(),
        attributes,
    };

    let http_client = reqwest::Client::builder()
        .timeout(config.downstream.request_timeout.0)
        .dns_resolver(Arc::new(SafeResolver))
        .build()
        .context("failed to build the downstream HTTP client")?;

    let delivery = DeliveryClient::with_client(
        http_client,
        DeliveryConfig {
            url: config.downstream.url.clone(),
            bearer_token: config.downstream.bearer_token.as_str().to_string(),
            request_timeout: config.downstream.request_timeout.0,
            max_response_body_bytes: DeliveryConfig::DEFAULT_MAX_RESPONSE_BODY_BYTES,
        },
    );

    let backoff = BackoffSchedule::new(config.backoff.base.0, config.backoff.max_attempts);

    let processor = Arc::new(Processor {
        store: store.clone(),
        queue: queue.clone(),
        validator,
        normalizer,
        mapper,
        delivery,
        backoff,
    });

    let liveness = HealthRegistry::new(&config.worker_name);
    let liveness_timeout =
        time::Duration::try_from(config.poll_interval.0 * 5).unwrap_or(time::Duration::MAX);

    let cancel = CancellationToken::new();
    let mut worker_tasks = Vec::with_capacity(config.max_concurrent_jobs);

    for index in 0..config.max_concurrent_jobs {
        let name = format!("{}-{index}", config.worker_name);
        let handle = liveness.register(name.clone(), liveness_timeout).await;
        let processor = processor.clone();
        let poll_interval = config.poll_interval.0;
        let cancel = cancel.clone();

        worker_tasks.push(tokio::spawn(run_worker(
            name,
            processor,
            poll_interval,
            handle,
            cancel,
        )));
    }

    let app = Router::new()
        .route("/_liveness", get(move || liveness_status(liveness.clone())))
        .route(
            "/_readiness",
            get({
                let store = store.clone();
                let queue = queue.clone();
                move || readiness(store.clone(), queue.clone())
            }),
        )
        .merge(setup_metrics_router());

    let listener = tokio::net::TcpListener::bind(config.bind())
        .await
        .context("failed to bind the worker's metrics/health listener")?;

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(cancel.clone()));

    tokio::select! {
        result = server => result.context("metrics/health server failed")?,
        _ = cancel.cancelled() => {}
    }

    for task in worker_tasks {
        let _ = task.await;
    }

    Ok(())
}

async fn liveness_status(registry: HealthRegistry) -> health::HealthStatus {
    registry.get_status()
}

async fn readiness(store: LeadStore, queue: PgQueue) -> axum::http::StatusCode {
    if store.health().await.is_ok() && queue.health().await.is_ok() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    cancel.cancel();
}
