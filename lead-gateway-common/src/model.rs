//! # Model
//!
//! The three persisted entities (Lead, DeliveryAttempt, Job) and the Lead
//! status machine. Payload documents are stored as JSONB and read back as
//! `serde_json::Value`, matching the `sqlx::types::Json<Value>` convention
//! used throughout for untyped, queue-carried documents.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use thiserror::Error;

pub type Document = Json<Value>;

/// The six-state alphabet a Lead moves through. Encoded as a closed enum with
/// a `transition` guard so an illegal move fails loudly rather than silently
/// corrupting the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "lead_status")]
#[sqlx(rename_all = "snake_case")]
pub enum LeadStatus {
    Received,
    Rejected,
    Ready,
    Delivered,
    Failed,
    PermanentlyFailed,
}

impl LeadStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LeadStatus::Rejected | LeadStatus::Delivered | LeadStatus::PermanentlyFailed
        )
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeadStatus::Received => "received",
            LeadStatus::Rejected => "rejected",
            LeadStatus::Ready => "ready",
            LeadStatus::Delivered => "delivered",
            LeadStatus::Failed => "failed",
            LeadStatus::PermanentlyFailed => "permanently_failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for LeadStatus {
    type Err = StatusTransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(LeadStatus::Received),
            "rejected" => Ok(LeadStatus::Rejected),
            "ready" => Ok(LeadStatus::Ready),
            "delivered" => Ok(LeadStatus::Delivered),
            "failed" => Ok(LeadStatus::Failed),
            "permanently_failed" => Ok(LeadStatus::PermanentlyFailed),
            other => Err(StatusTransitionError::UnknownStatus(other.to_owned())),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StatusTransitionError {
    #[error("{0} is not a known lead status")]
    UnknownStatus(String),
    #[error("illegal lead status transition from {from} to {to}")]
    Illegal { from: LeadStatus, to: LeadStatus },
}

/// Validate a transition without performing it.
///
/// `Received -> PermanentlyFailed` is not among the originally enumerated
/// transitions but is required by the mapping-failure policy (a mapping
/// failure happens before a lead ever reaches *READY*, yet must still end
/// terminally failed); it is allowed here deliberately.
pub fn transition(from: LeadStatus, to: LeadStatus) -> Result<(), StatusTransitionError> {
    use LeadStatus::*;

    let allowed = matches!(
        (from, to),
        (Received, Rejected)
            | (Received, Ready)
            | (Received, PermanentlyFailed)
            | (Ready, Delivered)
            | (Ready, Failed)
            | (Ready, PermanentlyFailed)
            | (Failed, Delivered)
            | (Failed, Failed)
            | (Failed, PermanentlyFailed)
    );

    if allowed {
        Ok(())
    } else {
        Err(StatusTransitionError::Illegal { from, to })
    }
}

/// A code identifying why validation rejected a lead. Configuration-driven
/// strings, but the three the validator is contractually required to be
/// able to emit.
pub type RejectionCode = String;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Lead {
    pub id: i64,
    pub received_at: DateTime<Utc>,
    pub raw_payload: Document,
    pub headers: Document,
    pub status: LeadStatus,
    pub rejection_reason: Option<String>,
    pub normalized_payload: Option<Document>,
    pub customer_payload: Option<Document>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A header snapshot: one representative value per header name, per
/// `spec.md` section 4.G step 4.
pub fn headers_to_document(headers: BTreeMap<String, String>) -> Document {
    Json(serde_json::to_value(headers).expect("BTreeMap<String, String> is always valid JSON"))
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DeliveryAttempt {
    pub id: i64,
    pub lead_id: i64,
    pub attempt_no: i32,
    pub requested_at: DateTime<Utc>,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_status")]
#[sqlx(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    pub id: i64,
    pub job_type: String,
    pub payload: Document,
    pub created_at: DateTime<Utc>,
    pub next_run_at: DateTime<Utc>,
    pub attempts: i32,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessLeadPayload {
    pub lead_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_all_spec_listed_transitions() {
        use LeadStatus::*;

        let allowed_pairs = [
            (Received, Rejected),
            (Received, Ready),
            (Received, PermanentlyFailed),
            (Ready, Delivered),
            (Ready, Failed),
            (Ready, PermanentlyFailed),
            (Failed, Delivered),
            (Failed, Failed),
            (Failed, PermanentlyFailed),
        ];

        for (from, to) in allowed_pairs {
            assert!(transition(from, to).is_ok(), "{from} -> {to} should be allowed");
        }
    }

    #[test]
    fn forbids_transitions_out_of_terminal_states() {
        use LeadStatus::*;

        for terminal in [Rejected, Delivered, PermanentlyFailed] {
            for to in [Received, Rejected, Ready, Delivered, Failed, PermanentlyFailed] {
                if terminal == to {
                    continue;
                }
                assert!(transition(terminal, to).is_err());
            }
        }
    }

    #[test]
    fn forbids_skipping_validation() {
        assert!(transition(LeadStatus::Received, LeadStatus::Delivered).is_err());
        assert!(transition(LeadStatus::Received, LeadStatus::Failed).is_err());
    }

    #[test]
    fn status_round_trips_through_display_and_from_str() {
        for status in [
            LeadStatus::Received,
            LeadStatus::Rejected,
            LeadStatus::Ready,
            LeadStatus::Delivered,
            LeadStatus::Failed,
            LeadStatus::PermanentlyFailed,
        ] {
            let parsed: LeadStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
