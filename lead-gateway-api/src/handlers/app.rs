use std::any::Any;

use axum::extract::DefaultBodyLimit;
use axum::response::Response;
use axum::{routing, Router};
use tower_http::catch_panic::CatchPanicLayer;

use lead_gateway_common::metrics::setup_metrics_router;

use super::{ingest, observability};
use crate::error::{internal_error_response, method_not_allowed_response};
use crate::AppState;

pub fn add_routes(router: Router, state: AppState) -> Router {
    router
        .route("/", routing::get(index))
        .route("/_liveness", routing::get(liveness))
        .route("/_readiness", routing::get(liveness))
        .route(
            "/webhooks/leads",
            routing::post(ingest::post_lead)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(1024 * 1024)),
        )
        .route("/leads", routing::get(observability::recent_leads))
        .route("/leads/stats", routing::get(observability::counts_by_status))
        .route("/leads/:id", routing::get(observability::lead_history))
        .with_state(state)
        .merge(setup_metrics_router())
        .layer(CatchPanicLayer::custom(handle_panic))
}

/// Turns a handler panic into the same 500-plus-correlation-id shape as any
/// other ingest error, so an unexpected fault never just drops the
/// connection — the recovery layer must not let a fault crash the server.
fn handle_panic(_err: Box<dyn Any + Send + 'static>) -> Response {
    let correlation_id = uuid::Uuid::new_v4().to_string();
    tracing::error!(correlation_id, "request handler panicked");
    internal_error_response(&correlation_id)
}

/// Fallback for any method other than `POST` on `/webhooks/leads`, so the
/// rejection carries the same correlation-id-plus-JSON shape as every other
/// ingest error instead of axum's bare default `MethodNotAllowed` body.
async fn method_not_allowed() -> Response {
    let correlation_id = uuid::Uuid::new_v4().to_string();
    let mut response = method_not_allowed_response(&correlation_id);
    response.headers_mut().insert(
        ingest::CORRELATION_ID_HEADER,
        correlation_id.parse().expect("uuid is a valid header value"),
    );
    response
}

pub async fn index() -> &'static str {
    "lead-gateway-api"
}

/// The API has no background loop to report on; answering at all is the
/// liveness signal.
async fn liveness() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[sqlx::test(migrations = "../lead-gateway-common/migrations")]
    async fn index(db: sqlx::PgPool) {
        let state = AppState::for_test(db);
        let app = add_routes(Router::new(), state);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"lead-gateway-api");
    }
}
