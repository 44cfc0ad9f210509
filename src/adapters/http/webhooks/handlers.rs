//! HTTP handler for payment webhooks and the outcome reporting that maps
//! pipeline results to responses.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::application::webhook::{DeliveryOutcome, HandleWebhookDeliveryHandler, WebhookDelivery};
use crate::domain::webhook::WebhookError;

use super::dto::{WebhookAckResponse, WebhookErrorResponse};

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Header carrying the provider's event id.
pub const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub pipeline: Arc<HandleWebhookDeliveryHandler>,
}

impl WebhookAppState {
    pub fn new(pipeline: HandleWebhookDeliveryHandler) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/payment-events - Ingest one payment provider delivery.
///
/// The body is taken as raw bytes; it is never re-serialized before the
/// signature check.
pub async fn handle_payment_webhook(
    State(state): State<WebhookAppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckResponse>, WebhookApiError> {
    let cmd = WebhookDelivery {
        source: client_source(&headers, connect_info.as_ref()),
        signature: header_value(&headers, SIGNATURE_HEADER),
        event_id: header_value(&headers, EVENT_ID_HEADER),
        payload: body.to_vec(),
    };

    let outcome = state.pipeline.handle(cmd).await?;

    let response = match outcome {
        DeliveryOutcome::Completed {
            processed,
            duration,
            ..
        } => WebhookAckResponse::processed(processed, duration),
        DeliveryOutcome::AlreadyProcessed => WebhookAckResponse::message("Already processed"),
        DeliveryOutcome::InFlight => WebhookAckResponse::message("Processing in progress"),
    };

    Ok(Json(response))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolves the rate limiting identity of the caller.
///
/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the socket peer;
/// `unknown` when none is available.
pub fn client_source(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    if let Some(forwarded) = header_value(headers, "x-forwarded-for") {
        if let Some(first_ip) = forwarded.split(',').next().map(str::trim) {
            if !first_ip.is_empty() {
                return first_ip.to_string();
            }
        }
    }

    if let Some(real_ip) = header_value(headers, "x-real-ip") {
        return real_ip;
    }

    connect_info
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts pipeline failures to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            WebhookError::RateLimited { .. } => (self.0.status_code(), "Rate limit exceeded"),
            WebhookError::NotConfigured => (self.0.status_code(), "Webhook not configured"),
            WebhookError::MissingSignature => (self.0.status_code(), "Missing signature"),
            WebhookError::InvalidSignature => (self.0.status_code(), "Invalid signature"),
            WebhookError::StoreUnavailable(_) => (self.0.status_code(), "Database unavailable"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Webhook processing failed"),
        };

        let mut response = (status, Json(WebhookErrorResponse::new(message))).into_response();

        if let WebhookError::RateLimited { retry_after_secs } = self.0 {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Client Source Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn uses_first_forwarded_hop() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(client_source(&h, None), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_real_ip() {
        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_source(&h, None), "198.51.100.2");
    }

    #[test]
    fn falls_back_to_peer_address() {
        let peer = ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000)));
        assert_eq!(client_source(&HeaderMap::new(), Some(&peer)), "192.0.2.1");
    }

    #[test]
    fn unknown_without_any_source() {
        assert_eq!(client_source(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn blank_signature_header_is_absent() {
        let h = headers(&[(SIGNATURE_HEADER, "   ")]);
        assert_eq!(header_value(&h, SIGNATURE_HEADER), None);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Error Response Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn rate_limited_has_retry_after_header() {
        let response = WebhookApiError(WebhookError::RateLimited { retry_after_secs: 30 })
            .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "30");
    }

    #[test]
    fn store_unavailable_is_503() {
        let response =
            WebhookApiError(WebhookError::StoreUnavailable("timeout".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn parse_error_is_500() {
        let response =
            WebhookApiError(WebhookError::ParseError("expected value".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_signature_is_400() {
        let response = WebhookApiError(WebhookError::MissingSignature).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn app_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WebhookAppState>();
    }
}
