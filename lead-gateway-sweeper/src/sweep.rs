//! # Orphan sweeper
//!
//! A periodic cleaner, the same shape as a janitor loop: each tick finds
//! leads stuck in *RECEIVED* past `orphan_threshold` — leads whose original
//! enqueue never landed, whether because the API process crashed between
//! its insert and its enqueue call or because the job row was lost to
//! operator error — and re-enqueues a `process_lead` job for each so the
//! workers pick them back up.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use lead_gateway_common::model::ProcessLeadPayload;
use lead_gateway_common::queue::{DatabaseError, PgQueue};
use lead_gateway_common::store::{LeadStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] DatabaseError),
}

/// A single pass of cleanup work, shaped so a future second sweep (e.g.
/// expiring ancient permanently-failed rows) can be added as another
/// implementation without touching the loop driving it.
#[async_trait]
pub trait Cleaner: Send + Sync {
    async fn cleanup(&self) -> Result<usize, SweepError>;
}

pub struct OrphanSweeper {
    pub store: LeadStore,
    pub queue: PgQueue,
    pub orphan_threshold: Duration,
    pub batch_size: i64,
}

#[async_trait]
impl Cleaner for OrphanSweeper {
    /// Re-enqueues every orphan found this pass, returning how many were
    /// recovered.
    async fn cleanup(&self) -> Result<usize, SweepError> {
        let threshold = chrono::Duration::from_std(self.orphan_threshold)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        let older_than = Utc::now() - threshold;

        let orphans = self.store.orphaned_leads(older_than, self.batch_size).await?;

        let mut recovered = 0;
        for lead in orphans {
            let payload = serde_json::to_value(ProcessLeadPayload { lead_id: lead.id })
                .expect("ProcessLeadPayload is always valid JSON");

            match self
                .queue
                .enqueue("process_lead", payload, Duration::ZERO)
                .await
            {
                Ok(()) => {
                    recovered += 1;
                    info!(lead_id = lead.id, "recovered orphaned lead");
                }
                Err(error) => {
                    warn!(lead_id = lead.id, error = %error, "failed to re-enqueue orphaned lead");
                }
            }
        }

        Ok(recovered)
    }
}
