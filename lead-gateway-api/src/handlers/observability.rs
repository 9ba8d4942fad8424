//! # Observability endpoints
//!
//! Read-only views over the lead store: counts by status, the most recent
//! leads, and a single lead's full history (its stored payloads plus its
//! ordered delivery attempts). These are the only way an outside caller
//! learns what happened to a lead after the 200 from the ingest handler.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use lead_gateway_common::model::{DeliveryAttempt, Lead};

use crate::AppState;

pub async fn counts_by_status(State(state): State<AppState>) -> Response {
    match state.store.counts_by_status().await {
        Ok(counts) => Json(counts).into_response(),
        Err(error) => store_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub struct RecentLeadsQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecentLead {
    pub id: i64,
    pub received_at: chrono::DateTime<chrono::Utc>,
    pub status: String,
    pub rejection_reason: Option<String>,
}

pub async fn recent_leads(
    State(state): State<AppState>,
    Query(query): Query<RecentLeadsQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(state.max_recent_leads)
        .clamp(1, state.max_recent_leads);

    match state.store.most_recent_leads(limit).await {
        Ok(leads) => {
            let summaries: Vec<RecentLead> = leads
                .into_iter()
                .map(|lead| RecentLead {
                    id: lead.id,
                    received_at: lead.received_at,
                    status: lead.status.to_string(),
                    rejection_reason: lead.rejection_reason,
                })
                .collect();
            Json(summaries).into_response()
        }
        Err(error) => store_error_response(error),
    }
}

#[derive(Debug, Serialize)]
pub struct LeadHistory {
    pub lead: Lead,
    pub delivery_attempts: Vec<DeliveryAttempt>,
}

pub async fn lead_history(State(state): State<AppState>, Path(lead_id): Path<i64>) -> Response {
    let lead = match state.store.fetch_lead(lead_id).await {
        Ok(Some(lead)) => lead,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(error) => return store_error_response(error),
    };

    let delivery_attempts = match state.store.list_delivery_attempts(lead_id).await {
        Ok(attempts) => attempts,
        Err(error) => return store_error_response(error),
    };

    Json(LeadHistory {
        lead,
        delivery_attempts,
    })
    .into_response()
}

fn store_error_response(error: lead_gateway_common::store::StoreError) -> Response {
    tracing::error!(error = %error, "store query failed");
    StatusCode::SERVICE_UNAVAILABLE.into_response()
}
