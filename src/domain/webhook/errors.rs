//! Webhook error types.
//!
//! Every failure the pipeline expects is a variant here. The Event Router
//! decides acknowledge-versus-escalate from `kind()` / `is_retryable()`, and
//! the HTTP layer maps rejections through `status_code()`.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors that occur during webhook processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// The source exceeded its delivery budget.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u32 },

    /// No signing secret is configured; every delivery is refused.
    #[error("Webhook not configured")]
    NotConfigured,

    /// The signature header was absent.
    #[error("Missing signature")]
    MissingSignature,

    /// The signature did not match the raw body.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The body could not be parsed as JSON at all.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The body is JSON but does not have the shape its event type requires.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// No subscription is correlated with the order.
    #[error("Subscription not found for order {0}")]
    SubscriptionNotFound(String),

    /// A best-effort secondary write failed.
    #[error("Auxiliary write failed: {0}")]
    AuxWriteFailed(String),

    /// The store rejected an operation.
    #[error("Database error: {0}")]
    Database(String),

    /// The store timed out or could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Classification used to decide how a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Throttled,
    Configuration,
    Authentication,
    Unparseable,
    MalformedEvent,
    NotFound,
    AuxWriteFailed,
    Persistence,
    StoreUnavailable,
}

impl WebhookError {
    /// Creates a malformed-event error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        WebhookError::MalformedEvent(reason.into())
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WebhookError::RateLimited { .. } => ErrorKind::Throttled,
            WebhookError::NotConfigured => ErrorKind::Configuration,
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                ErrorKind::Authentication
            }
            WebhookError::ParseError(_) => ErrorKind::Unparseable,
            WebhookError::MalformedEvent(_) => ErrorKind::MalformedEvent,
            WebhookError::SubscriptionNotFound(_) => ErrorKind::NotFound,
            WebhookError::AuxWriteFailed(_) => ErrorKind::AuxWriteFailed,
            WebhookError::Database(_) => ErrorKind::Persistence,
            WebhookError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// Returns true if the provider should redeliver.
    ///
    /// Only an unreachable store qualifies: redelivering an authenticated
    /// event carries no new information, it only risks duplicate effects.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StoreUnavailable
    }

    /// Returns true for failures that happen before any business logic runs.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Throttled | ErrorKind::Configuration | ErrorKind::Authentication
        )
    }

    /// Maps the error to the HTTP status returned to the provider.
    ///
    /// Handler-level failures on an authenticated event are acknowledged
    /// with 200; the error is kept in the ledger instead.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            WebhookError::NotConfigured | WebhookError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            WebhookError::MissingSignature => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::ParseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::MalformedEvent(_)
            | WebhookError::SubscriptionNotFound(_)
            | WebhookError::AuxWriteFailed(_)
            | WebhookError::Database(_) => StatusCode::OK,
        }
    }
}

/// Converts DomainError to WebhookError for port operations.
impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        if err.is_unavailable() {
            WebhookError::StoreUnavailable(err.message)
        } else {
            WebhookError::Database(err.to_string())
        }
    }
}
