//! # Health
//!
//! A small liveness registry shared by every service binary. Components
//! (a worker loop, a sweep loop, ...) register themselves with a deadline;
//! as long as each reports healthy within its deadline the overall status
//! is healthy. This is intentionally dumb: it is meant to back a
//! `/_liveness` endpoint an orchestrator can poll, not a full health model.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Clone)]
struct Component {
    name: String,
    timeout: time::Duration,
    last_reported_at: Arc<RwLock<Instant>>,
}

/// A registry of components whose liveness is tracked together.
#[derive(Clone)]
pub struct HealthRegistry {
    name: String,
    components: Arc<RwLock<Vec<Component>>>,
}

/// A handle a component uses to report itself healthy on a schedule.
#[derive(Clone)]
pub struct HealthHandle {
    last_reported_at: Arc<RwLock<Instant>>,
}

impl HealthHandle {
    /// Record that this component is alive right now.
    pub async fn report_healthy(&self) {
        let mut last_reported_at = self.last_reported_at.write().expect("health lock poisoned");
        *last_reported_at = Instant::now();
    }
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub name: String,
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub name: String,
    pub healthy: bool,
    pub components: Vec<ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    fn into_response(self) -> Response {
        let status = if self.healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        (status, Json(self)).into_response()
    }
}

impl HealthRegistry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            components: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a new component with a deadline by which it must report healthy.
    /// Immediately marks the component as healthy as of registration time, so a
    /// slow first tick of the registered loop does not cause a spurious failure.
    pub async fn register(&self, name: String, timeout: time::Duration) -> HealthHandle {
        let last_reported_at = Arc::new(RwLock::new(Instant::now()));

        let component = Component {
            name,
            timeout,
            last_reported_at: last_reported_at.clone(),
        };

        self.components
            .write()
            .expect("health lock poisoned")
            .push(component);

        HealthHandle { last_reported_at }
    }

    /// Compute the current status of every registered component.
    pub fn get_status(&self) -> HealthStatus {
        let components = self.components.read().expect("health lock poisoned");
        let mut component_statuses = Vec::with_capacity(components.len());
        let mut healthy = true;

        for component in components.iter() {
            let last_reported_at = *component
                .last_reported_at
                .read()
                .expect("health lock poisoned");
            let elapsed = last_reported_at.elapsed();
            let timeout: std::time::Duration = component
                .timeout
                .try_into()
                .unwrap_or(std::time::Duration::MAX);
            let component_healthy = elapsed <= timeout;

            healthy = healthy && component_healthy;
            component_statuses.push(ComponentStatus {
                name: component.name.clone(),
                healthy: component_healthy,
            });
        }

        HealthStatus {
            name: self.name.clone(),
            healthy,
            components: component_statuses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthy_immediately_after_register() {
        let registry = HealthRegistry::new("test");
        registry
            .register("worker".to_string(), time::Duration::seconds(30))
            .await;

        assert!(registry.get_status().healthy);
    }

    #[tokio::test]
    async fn unhealthy_once_deadline_passes() {
        let registry = HealthRegistry::new("test");
        registry
            .register("worker".to_string(), time::Duration::milliseconds(10))
            .await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(!registry.get_status().healthy);
    }

    #[tokio::test]
    async fn stays_healthy_when_reported() {
        let registry = HealthRegistry::new("test");
        let handle = registry
            .register("worker".to_string(), time::Duration::milliseconds(50))
            .await;

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.report_healthy().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(registry.get_status().healthy);
    }
}
