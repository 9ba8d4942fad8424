pub mod config;
pub mod error;
pub mod handlers;

use lead_gateway_common::queue::PgQueue;
use lead_gateway_common::store::LeadStore;

/// Shared state threaded through every handler. Cheap to clone: the store
/// and queue each wrap a connection pool handle, and the config fragments
/// are small values copied once at startup.
///
/// The API has no suspending background loop of its own (every request is
/// handled to completion synchronously), so unlike the worker and sweeper
/// its liveness check is a trivial "the process is answering HTTP requests"
/// rather than a `HealthRegistry` deadline.
#[derive(Clone)]
pub struct AppState {
    pub store: LeadStore,
    pub queue: PgQueue,
    pub auth: config::AuthConfig,
    pub max_recent_leads: i64,
}

impl AppState {
    #[cfg(any(test, feature = "test-util"))]
    pub fn for_test(pool: sqlx::PgPool) -> Self {
        Self {
            store: LeadStore::new(pool.clone()),
            queue: PgQueue::new(pool),
            auth: config::AuthConfig {
                enabled: false,
                header_name: "X-Shared-Secret".to_string(),
                shared_secret: String::new(),
            },
            max_recent_leads: 100,
        }
    }
}
