//! Axum router configuration for webhook endpoints.

use axum::{routing::post, Router};

use super::handlers::{handle_payment_webhook, WebhookAppState};

/// Create the webhook routes.
///
/// # Routes
/// - `POST /payment-events` - Payment provider deliveries (signature verified)
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/payment-events", post(handle_payment_webhook))
}

/// Create the complete webhook router, mounted at `/webhooks`.
///
/// ```ignore
/// let app = webhook_router(WebhookAppState::new(pipeline));
/// ```
pub fn webhook_router(state: WebhookAppState) -> Router {
    Router::new()
        .nest("/webhooks", webhook_routes())
        .with_state(state)
}
