use lead_gateway_common::queue::DatabaseError;
use lead_gateway_common::store::StoreError;
use thiserror::Error;

/// Errors that can surface while driving the worker's poll loop. Errors
/// inside a single job's pipeline are handled by the processor itself and
/// never reach this level; this enum is for failures of the loop machinery.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("a queue error occurred: {0}")]
    Queue(#[from] DatabaseError),
    #[error("a lead store error occurred: {0}")]
    Store(#[from] StoreError),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
