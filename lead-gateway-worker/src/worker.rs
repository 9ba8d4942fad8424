//! # Processor
//!
//! The heart of the gateway: a pool of cooperative workers, each polling the
//! shared job queue and driving the stage pipeline (validate, normalize,
//! map, deliver) for `process_lead` jobs. A job already past validation on a
//! prior dispatch (its lead is *READY* or *FAILED*) skips straight to the
//! delivery stage — the raw payload never changes, so re-validating and
//! re-mapping it would be wasted work and the status machine forbids
//! re-entering *REJECTED* once a lead has left *RECEIVED* anyway.

use std::sync::Arc;
use std::time::Duration;

use health::HealthHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lead_gateway_common::delivery::DeliveryClient;
use lead_gateway_common::mapper::MapperConfig;
use lead_gateway_common::model::{Job, LeadStatus, ProcessLeadPayload};
use lead_gateway_common::normalizer::NormalizerConfig;
use lead_gateway_common::queue::PgQueue;
use lead_gateway_common::retry::BackoffSchedule;
use lead_gateway_common::store::LeadStore;
use lead_gateway_common::validator::ValidatorConfig;

use crate::error::WorkerError;

/// Everything a single job dispatch needs. Cheap to clone (every field is
/// either a pool handle or small configuration), so it is wrapped in an
/// `Arc` once and shared by every worker task.
pub struct Processor {
    pub store: LeadStore,
    pub queue: PgQueue,
    pub validator: ValidatorConfig,
    pub normalizer: NormalizerConfig,
    pub mapper: MapperConfig,
    pub delivery: DeliveryClient,
    pub backoff: BackoffSchedule,
}

/// Runs one worker's poll loop until `cancel` fires. Several of these run
/// concurrently against the same queue; `dequeue`'s skip-locked selection is
/// what keeps them from ever processing the same job twice.
pub async fn run_worker(
    name: String,
    processor: Arc<Processor>,
    poll_interval: Duration,
    liveness: HealthHandle,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(worker = %name, "worker shutting down");
                return;
            }
            _ = interval.tick() => {}
        }

        liveness.report_healthy().await;

        match processor.queue.dequeue().await {
            Ok(Some(job)) => {
                let job_id = job.id;
                if let Err(error) = dispatch(&processor, job, &cancel).await {
                    error!(worker = %name, job_id, error = %error, "job processing failed");
                    let _ = processor
                        .queue
                        .fail(job_id, &error.to_string())
                        .await
                        .map_err(|e| error!(worker = %name, job_id, error = %e, "failed to mark job failed"));
                }
            }
            Ok(None) => continue,
            Err(error) => {
                warn!(worker = %name, error = %error, "dequeue failed");
                continue;
            }
        }
    }
}

/// Route a dequeued job to its handler. Only `process_lead` is known today;
/// anything else is a permanently failed job rather than a panic, since an
/// unrecognised job type cannot have been enqueued by this version of the
/// gateway acting in good faith.
async fn dispatch(
    processor: &Processor,
    job: Job,
    cancel: &CancellationToken,
) -> Result<(), WorkerError> {
    if job.job_type != "process_lead" {
        processor
            .queue
            .fail(job.id, &format!("unknown job type \"{}\"", job.job_type))
            .await?;
        return Ok(());
    }

    process_lead_job(processor, job, cancel).await
}

async fn process_lead_job(
    processor: &Processor,
    job: Job,
    cancel: &CancellationToken,
) -> Result<(), WorkerError> {
    let lead_id = match serde_json::from_value::<ProcessLeadPayload>(job.payload.0.clone()) {
        Ok(payload) => payload.lead_id,
        Err(_) => {
            processor
                .queue
                .fail(job.id, "job payload is missing a lead_id")
                .await?;
            return Ok(());
        }
    };

    let lead = match processor.store.fetch_lead(lead_id).await? {
        Some(lead) => lead,
        None => {
            processor
                .queue
                .fail(job.id, &format!("lead {lead_id} not found"))
                .await?;
            return Ok(());
        }
    };

    let customer_payload = match lead.status {
        LeadStatus::Received => {
            match run_validation_and_mapping(processor, lead_id, &lead.raw_payload.0).await? {
                Some(payload) => payload,
                None => {
                    // Rejected or permanently failed during transformation;
                    // the lead's terminal status has already been recorded.
                    processor.queue.complete(job.id).await?;
                    return Ok(());
                }
            }
        }
        LeadStatus::Ready | LeadStatus::Failed => lead
            .customer_payload
            .map(|doc| doc.0)
            .ok_or_else(|| WorkerError::InvariantViolation(format!(
                "lead {lead_id} reached {} without a customer payload",
                lead.status
            )))?,
        LeadStatus::Rejected | LeadStatus::Delivered | LeadStatus::PermanentlyFailed => {
            // Already terminal (e.g. a duplicate dispatch raced this one to
            // completion); nothing left to do.
            processor.queue.complete(job.id).await?;
            return Ok(());
        }
    };

    run_delivery_stage(processor, job.id, lead_id, &customer_payload, cancel).await
}

/// Validation and transformation stages. Returns `Some(customer_payload)`
/// when the lead reaches *READY* and delivery should proceed, or `None`
/// when the lead has already been moved to a terminal status.
async fn run_validation_and_mapping(
    processor: &Processor,
    lead_id: i64,
    raw_payload: &serde_json::Value,
) -> Result<Option<serde_json::Value>, WorkerError> {
    if let Err(rejection_code) = processor.validator.validate(raw_payload) {
        info!(lead_id, rejection_code, "lead rejected by validator");
        processor.store.reject_lead(lead_id, &rejection_code).await?;
        return Ok(None);
    }

    let normalized = processor.normalizer.normalize(raw_payload);

    match processor.mapper.map(&normalized) {
        Ok(outcome) => {
            if !outcome.omitted.is_empty() {
                info!(lead_id, omitted = ?outcome.omitted, "mapper dropped invalid optional attributes");
            }
            processor
                .store
                .mark_ready(lead_id, normalized, outcome.customer_payload.clone())
                .await?;
            Ok(Some(outcome.customer_payload))
        }
        Err(mapping_error) => {
            warn!(lead_id, reasons = ?mapping_error.reasons, "mapping failed, lead permanently failed");
            processor
                .store
                .fail_permanently(lead_id, &mapping_error.reasons.join("; "))
                .await?;
            Ok(None)
        }
    }
}

/// Delivery stage: recomputes the next attempt number from the rows already
/// on file, sleeps the configured backoff for a redelivered lead, calls the
/// downstream, and records the outcome alongside the resulting lead status
/// in a single transaction.
async fn run_delivery_stage(
    processor: &Processor,
    job_id: i64,
    lead_id: i64,
    customer_payload: &serde_json::Value,
    cancel: &CancellationToken,
) -> Result<(), WorkerError> {
    let attempts_so_far = processor.store.count_delivery_attempts(lead_id).await?;
    let max_attempts = i64::from(processor.backoff.max_attempts());

    if attempts_so_far >= max_attempts {
        processor
            .store
            .fail_permanently(lead_id, "delivery attempts exhausted")
            .await?;
        processor.queue.complete(job_id).await?;
        return Ok(());
    }

    let attempt_no = (attempts_so_far + 1) as u32;

    if attempts_so_far > 0 {
        let delay = processor.backoff.delay_before(attempt_no);
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(lead_id, "backoff sleep cancelled, leaving lead for a future worker");
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    match processor.delivery.send(customer_payload).await {
        Ok(success) => {
            processor
                .store
                .record_delivery_attempt(
                    lead_id,
                    LeadStatus::Delivered,
                    Some(i32::from(success.status)),
                    Some(success.body),
                    None,
                    true,
                )
                .await?;
            info!(lead_id, status = success.status, "lead delivered");
            processor.queue.complete(job_id).await?;
        }
        Err(delivery_error) => {
            let exhausted = i64::from(attempt_no) >= max_attempts;
            let new_status = if !delivery_error.retriable() || exhausted {
                LeadStatus::PermanentlyFailed
            } else {
                LeadStatus::Failed
            };

            processor
                .store
                .record_delivery_attempt(
                    lead_id,
                    new_status,
                    delivery_error.status().map(i32::from),
                    None,
                    Some(delivery_error.message().to_string()),
                    false,
                )
                .await?;

            if new_status == LeadStatus::PermanentlyFailed {
                warn!(lead_id, attempt_no, status = ?delivery_error.status(), "delivery permanently failed");
                processor.queue.complete(job_id).await?;
            } else {
                let next_delay = processor.backoff.delay_before(attempt_no + 1);
                warn!(lead_id, attempt_no, next_delay = ?next_delay, "delivery failed, scheduling retry");
                processor.queue.retry(job_id, next_delay).await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::collections::BTreeMap;

    fn validator() -> ValidatorConfig {
        ValidatorConfig {
            postal_code_field: "zipcode".to_string(),
            postal_code_pattern: Regex::new(r"^66\d{3}$").unwrap(),
            postal_code_rejection_code: "ZIPCODE_INVALID".to_string(),
            ownership_field: "house.is_owner".to_string(),
            ownership_rejection_code: "NOT_HOMEOWNER".to_string(),
            required_fields: vec!["phone".to_string()],
            missing_field_rejection_code: "MISSING_REQUIRED_FIELD".to_string(),
        }
    }

    fn mapper() -> MapperConfig {
        MapperConfig {
            phone_field: "phone".to_string(),
            product_name: "solar-install".to_string(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn happy_path_document_validates_and_maps() {
        let raw = serde_json::json!({
            "email": "a@b", "phone": "+49 123 456", "zipcode": "66123",
            "house": {"is_owner": true},
        });
        assert!(validator().validate(&raw).is_ok());

        let normalized = NormalizerConfig {
            email_fields: ["email".to_string()].into_iter().collect(),
            phone_fields: ["phone".to_string()].into_iter().collect(),
        }
        .normalize(&raw);

        let outcome = mapper().map(&normalized).expect("mapping should succeed");
        assert_eq!(outcome.customer_payload["phone"], serde_json::json!("49123456"));
        assert_eq!(
            outcome.customer_payload["product"]["name"],
            serde_json::json!("solar-install")
        );
    }
}
