//! HTTP DTOs for the webhook endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Success body returned to the provider.
///
/// `processed` and `duration` are present for routed events; `message` for
/// duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAckResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAckResponse {
    pub fn processed(processed: bool, duration: Duration) -> Self {
        Self {
            ok: true,
            processed: Some(processed),
            duration: Some(format!("{}ms", duration.as_millis())),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            processed: None,
            duration: None,
            message: Some(message.into()),
        }
    }
}

/// Error body for rejected or failed deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookErrorResponse {
    pub error: String,
}

impl WebhookErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
