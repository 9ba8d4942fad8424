//! # Delivery client
//!
//! A stateless HTTP client that posts a mapped lead to the configured
//! downstream customer endpoint and classifies the outcome. Retry scheduling
//! is the processor's job; this module only ever makes one call.

use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub url: String,
    pub bearer_token: String,
    pub request_timeout: std::time::Duration,
    /// Response bodies are stored verbatim in the audit trail, so truncate
    /// before it ever reaches the database.
    pub max_response_body_bytes: usize,
}

impl DeliveryConfig {
    pub const DEFAULT_MAX_RESPONSE_BODY_BYTES: usize = 4096;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliverySuccess {
    pub status: u16,
    pub body: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("downstream responded {status}: {message}")]
    Failure {
        status: Option<u16>,
        retriable: bool,
        message: String,
    },
}

impl DeliveryError {
    pub fn retriable(&self) -> bool {
        match self {
            DeliveryError::Failure { retriable, .. } => *retriable,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Failure { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DeliveryError::Failure { message, .. } => message,
        }
    }
}

#[derive(Clone)]
pub struct DeliveryClient {
    client: Client,
    config: DeliveryConfig,
}

impl DeliveryClient {
    pub fn new(config: DeliveryConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self { client, config })
    }

    /// Build around a caller-supplied `reqwest::Client`, e.g. one configured
    /// with a DNS resolver that refuses to connect to private address space.
    pub fn with_client(client: Client, config: DeliveryConfig) -> Self {
        Self { client, config }
    }

    pub async fn send(&self, customer_payload: &Value) -> Result<DeliverySuccess, DeliveryError> {
        let response = self
            .client
            .post(&self.config.url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.bearer_token),
            )
            .json(customer_payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let body = read_body_capped(response, self.config.max_response_body_bytes).await;

        if status.is_success() {
            return Ok(DeliverySuccess {
                status: status.as_u16(),
                body,
            });
        }

        Err(DeliveryError::Failure {
            status: Some(status.as_u16()),
            retriable: is_retriable_status(status),
            message: body,
        })
    }
}

/// Read at most `cap` bytes of a response body. Stops consuming the stream
/// as soon as the cap is reached rather than buffering the whole body first,
/// since a misbehaving downstream could otherwise return an unbounded body.
async fn read_body_capped(response: reqwest::Response, cap: usize) -> String {
    use futures::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buffer = String::with_capacity(cap);

    while buffer.len() < cap {
        let Some(chunk) = stream.next().await else {
            break;
        };
        let Ok(chunk) = chunk else {
            break;
        };
        let Ok(chunk_str) = std::str::from_utf8(&chunk) else {
            break;
        };

        let take = (cap - buffer.len()).min(chunk_str.len());
        match chunk_str.get(..take) {
            Some(slice) => buffer.push_str(slice),
            None => break,
        }
    }

    buffer
}

fn is_retriable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn classify_transport_error(error: reqwest::Error) -> DeliveryError {
    if error.is_builder() || error.is_body() {
        DeliveryError::Failure {
            status: None,
            retriable: false,
            message: error.to_string(),
        }
    } else {
        DeliveryError::Failure {
            status: None,
            retriable: true,
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes_per_the_contract() {
        assert!(!is_retriable_status(StatusCode::OK));
        assert!(!is_retriable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retriable_status(StatusCode::UNAUTHORIZED));
        assert!(is_retriable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retriable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retriable_status(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn error_accessors_expose_status_and_retriability() {
        let err = DeliveryError::Failure {
            status: Some(503),
            retriable: true,
            message: "boom".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(err.retriable());
    }
}
