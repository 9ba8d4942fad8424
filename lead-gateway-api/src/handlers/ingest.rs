//! # Ingest handler
//!
//! `POST /webhooks/leads`: accept a webhook-delivered lead, persist it in
//! status *RECEIVED*, enqueue a `process_lead` job, and acknowledge. This is
//! the only write path the API exposes; everything else about a lead's
//! lifecycle happens asynchronously in the worker.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use lead_gateway_common::model::ProcessLeadPayload;

use crate::error::{ingest_error_response, IngestError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub lead_id: i64,
    pub status: &'static str,
    pub correlation_id: String,
}

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// `POST /webhooks/leads`. Body framing (JSON parsing) is handled here
/// rather than via axum's `Json` extractor so that a malformed body can be
/// reported with the required 400-plus-correlation-id shape instead of
/// axum's default rejection body.
pub async fn post_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    let result = handle(&state, &headers, &body, &correlation_id).await;

    match result {
        Ok(response) => {
            let mut response = (
                StatusCode::OK,
                Json(IngestResponse {
                    lead_id: response.0,
                    status: "RECEIVED",
                    correlation_id: correlation_id.clone(),
                }),
            )
                .into_response();
            response.headers_mut().insert(
                CORRELATION_ID_HEADER,
                correlation_id.parse().expect("uuid is a valid header value"),
            );
            response
        }
        Err(error) => {
            let mut response = ingest_error_response(&error, &correlation_id);
            response.headers_mut().insert(
                CORRELATION_ID_HEADER,
                correlation_id.parse().expect("uuid is a valid header value"),
            );
            response
        }
    }
}

async fn handle(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
    correlation_id: &str,
) -> Result<(i64,), IngestError> {
    let raw_payload: Value =
        serde_json::from_slice(body).map_err(|_| IngestError::MalformedJson)?;

    if state.auth.enabled {
        let provided = headers
            .get(&state.auth.header_name)
            .and_then(|v| v.to_str().ok());

        match provided {
            Some(secret) if secret == state.auth.shared_secret => {}
            _ => return Err(IngestError::Unauthorized),
        }
    }

    let header_snapshot = snapshot_headers(headers);

    let lead = state
        .store
        .insert_lead(raw_payload, header_snapshot)
        .await
        .map_err(IngestError::StoreUnavailable)?;

    tracing::info!(correlation_id, lead_id = lead.id, "lead received");

    state
        .queue
        .enqueue(
            "process_lead",
            serde_json::to_value(ProcessLeadPayload { lead_id: lead.id })
                .expect("ProcessLeadPayload always serializes"),
            std::time::Duration::ZERO,
        )
        .await
        .map_err(IngestError::QueueUnavailable)?;

    Ok((lead.id,))
}

/// One representative value per header name. Multi-valued headers keep
/// only their first occurrence.
fn snapshot_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut snapshot = BTreeMap::new();
    for (name, value) in headers.iter() {
        let key = name.as_str().to_string();
        if snapshot.contains_key(&key) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            snapshot.insert(key, value.to_string());
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn snapshot_keeps_one_value_per_header_name() {
        let mut headers = HeaderMap::new();
        headers.insert("x-a", HeaderValue::from_static("1"));
        headers.append("x-a", HeaderValue::from_static("2"));

        let snapshot = snapshot_headers(&headers);
        assert_eq!(snapshot.get("x-a"), Some(&"1".to_string()));
    }
}
