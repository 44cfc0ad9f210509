//! HandleWebhookDeliveryHandler - Command handler for one inbound delivery.
//!
//! Steps, in order:
//!
//! 1. Rate limit by source
//! 2. Verify the HMAC signature over the raw body
//! 3. Parse the envelope
//! 4. Claim the event in the idempotency ledger
//! 5. Route to the event handler
//! 6. Record the outcome in the ledger
//!
//! Steps 1-2 reject without touching the ledger. After step 4, handler
//! failures are recorded and acknowledged; only an unreachable store is
//! escalated, after releasing the claim so a redelivery can retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use crate::domain::webhook::{SignatureVerifier, WebhookError, WebhookEvent};
use crate::ports::{
    NewEventRecord, ProcessedEventStore, RateLimitKey, RateLimitResult, RateLimiter, RecordResult,
};

use super::{EventOutcome, EventRouter};

/// Command carrying one delivery exactly as received.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    /// Client identity used for rate limiting.
    pub source: String,
    /// Value of the signature header, if present.
    pub signature: Option<String>,
    /// Value of the event id header, if present.
    pub event_id: Option<String>,
    /// Raw request body.
    pub payload: Vec<u8>,
}

/// Result of a delivery that passed authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The event was claimed and routed.
    ///
    /// `processed` is false when the handler failed; the error is in the ledger.
    Completed {
        processed: bool,
        outcome: Option<EventOutcome>,
        duration: Duration,
    },
    /// A previous delivery already processed this event.
    AlreadyProcessed,
    /// Another delivery currently holds the claim.
    InFlight,
}

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Rate limit bucket name for this endpoint.
    pub bucket: String,
    /// Seconds after which an unfinished claim may be taken over.
    pub claim_lease_secs: u64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            bucket: "razorpay".to_string(),
            claim_lease_secs: 300,
        }
    }
}

/// Handler running the delivery pipeline.
pub struct HandleWebhookDeliveryHandler {
    rate_limiter: Arc<dyn RateLimiter>,
    verifier: Option<SignatureVerifier>,
    ledger: Arc<dyn ProcessedEventStore>,
    router: EventRouter,
    settings: DeliverySettings,
}

impl HandleWebhookDeliveryHandler {
    /// Creates the handler. A `None` verifier means no signing secret is
    /// configured and every delivery is refused.
    pub fn new(
        rate_limiter: Arc<dyn RateLimiter>,
        verifier: Option<SignatureVerifier>,
        ledger: Arc<dyn ProcessedEventStore>,
        router: EventRouter,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            rate_limiter,
            verifier,
            ledger,
            router,
            settings,
        }
    }

    /// Runs one delivery through the pipeline.
    ///
    /// # Errors
    ///
    /// - `RateLimited`, `NotConfigured`, `MissingSignature`, `InvalidSignature`
    ///   before any ledger write
    /// - `ParseError` if the authenticated body is not a JSON object
    /// - `StoreUnavailable` if the ledger or a handler cannot reach the store
    pub async fn handle(&self, cmd: WebhookDelivery) -> Result<DeliveryOutcome, WebhookError> {
        let span = tracing::info_span!(
            "webhook_delivery",
            source = %cmd.source,
            event_id = tracing::field::Empty,
            event_type = tracing::field::Empty,
        );
        self.run(cmd).instrument(span).await
    }

    async fn run(&self, cmd: WebhookDelivery) -> Result<DeliveryOutcome, WebhookError> {
        let started = Instant::now();

        self.check_rate_limit(&cmd.source).await?;
        self.authenticate(&cmd)?;

        let event = WebhookEvent::parse(&cmd.payload, cmd.event_id.as_deref()).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse authenticated webhook body");
            e
        })?;

        let span = tracing::Span::current();
        span.record("event_id", event.display_id());
        span.record("event_type", event.event_type.as_str());
        tracing::info!("Received webhook event");

        let ledger_key = event.ledger_key().to_string();
        match self.claim(&event).await? {
            RecordResult::Inserted => {}
            RecordResult::AlreadyProcessed => {
                tracing::info!("Event already processed, skipping");
                return Ok(DeliveryOutcome::AlreadyProcessed);
            }
            RecordResult::InFlight => {
                tracing::info!("Event is being processed by another delivery, skipping");
                return Ok(DeliveryOutcome::InFlight);
            }
        }

        let (processed, outcome, error_message) = match self.router.route(&event).await {
            Ok(outcome) => (true, Some(outcome), None),
            Err(e) if e.is_retryable() => {
                tracing::error!(error = %e, "Store unavailable while handling event");
                if let Err(release_err) = self.ledger.release(&ledger_key).await {
                    tracing::warn!(error = %release_err, "Failed to release event claim");
                }
                return Err(e);
            }
            Err(e) => {
                tracing::error!(error = %e, kind = ?e.kind(), "Webhook handler failed");
                (false, None, Some(e.to_string()))
            }
        };

        if let Err(e) = self.ledger.mark_outcome(&ledger_key, error_message).await {
            tracing::warn!(error = %e, "Failed to mark event outcome");
        }

        let duration = started.elapsed();
        tracing::info!(
            processed,
            outcome = ?outcome,
            duration_ms = duration.as_millis() as u64,
            "Webhook event processed"
        );

        Ok(DeliveryOutcome::Completed {
            processed,
            outcome,
            duration,
        })
    }

    async fn check_rate_limit(&self, source: &str) -> Result<(), WebhookError> {
        let key = RateLimitKey::ip(&self.settings.bucket, source);
        match self.rate_limiter.check(key).await {
            Ok(RateLimitResult::Allowed(_)) => Ok(()),
            Ok(RateLimitResult::Denied(denied)) => {
                tracing::warn!(
                    limit = denied.limit,
                    retry_after_secs = denied.retry_after_secs,
                    "Webhook rate limit exceeded"
                );
                Err(WebhookError::RateLimited {
                    retry_after_secs: denied.retry_after_secs,
                })
            }
            Err(e) => {
                // signature verification still guards the pipeline
                tracing::warn!(error = %e, "Rate limiter unavailable, admitting delivery");
                Ok(())
            }
        }
    }

    fn authenticate(&self, cmd: &WebhookDelivery) -> Result<(), WebhookError> {
        let Some(verifier) = &self.verifier else {
            tracing::error!("Webhook signing secret not configured");
            return Err(WebhookError::NotConfigured);
        };

        let Some(signature) = cmd.signature.as_deref() else {
            tracing::warn!("Webhook delivery without signature");
            return Err(WebhookError::MissingSignature);
        };

        verifier.verify(&cmd.payload, signature).map_err(|e| {
            tracing::warn!(error = %e, "Webhook signature rejected");
            e
        })
    }

    async fn claim(&self, event: &WebhookEvent) -> Result<RecordResult, WebhookError> {
        let record = NewEventRecord {
            event_id: event.ledger_key().to_string(),
            event_type: event.event_type.as_str().to_string(),
            order_id: event.order_id().map(str::to_string),
            payment_id: event.payment_id().map(str::to_string),
            payload: event.payload.clone(),
        };

        self.ledger
            .record_if_new(record, self.settings.claim_lease_secs)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to record webhook event");
                WebhookError::StoreUnavailable(e.message)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryProcessedEventStore, InMemoryPurchaseRepository, InMemorySubscriptionRepository,
    };
    use crate::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
    use crate::domain::billing::{PaymentStatus, Subscription};
    use crate::domain::foundation::{SubscriptionId, UserId};
    use crate::domain::webhook::compute_signature;
    use crate::ports::EventStatus;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    struct Harness {
        ledger: Arc<InMemoryProcessedEventStore>,
        subscriptions: Arc<InMemorySubscriptionRepository>,
        handler: HandleWebhookDeliveryHandler,
    }

    fn harness_with(
        rate_limiter: Arc<dyn RateLimiter>,
        secret: Option<&str>,
    ) -> Harness {
        let ledger = Arc::new(InMemoryProcessedEventStore::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let purchases = Arc::new(InMemoryPurchaseRepository::new());
        let handler = HandleWebhookDeliveryHandler::new(
            rate_limiter,
            secret.map(|s| SignatureVerifier::new(SecretString::new(s.to_string()))),
            ledger.clone(),
            EventRouter::new(subscriptions.clone(), purchases),
            DeliverySettings::default(),
        );
        Harness {
            ledger,
            subscriptions,
            handler,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(InMemoryRateLimiter::with_defaults()), Some(SECRET))
    }

    async fn seed(h: &Harness, order_id: &str) -> SubscriptionId {
        let subscription = Subscription::pending(UserId::new(), order_id).unwrap();
        let id = subscription.id;
        h.subscriptions.insert(subscription).await;
        id
    }

    fn signed(body: serde_json::Value) -> WebhookDelivery {
        let payload = body.to_string().into_bytes();
        WebhookDelivery {
            source: "10.0.0.1".to_string(),
            signature: Some(compute_signature(SECRET, &payload)),
            event_id: None,
            payload,
        }
    }

    fn captured(event_id: &str, order_id: &str) -> WebhookDelivery {
        signed(json!({
            "id": event_id,
            "event": "payment.captured",
            "payload": {"payment": {"entity": {"id": "pay_1", "order_id": order_id}}}
        }))
    }

    struct BrokenRateLimiter;

    #[async_trait]
    impl RateLimiter for BrokenRateLimiter {
        async fn check(
            &self,
            _key: RateLimitKey,
        ) -> Result<RateLimitResult, crate::ports::RateLimitError> {
            Err(crate::ports::RateLimitError::Unavailable("connection refused".to_string()))
        }

        async fn reset(&self, _key: RateLimitKey) -> Result<(), crate::ports::RateLimitError> {
            Ok(())
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Rejection Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn invalid_signature_is_rejected_without_ledger_row() {
        let h = harness();
        let mut delivery = captured("evt_1", "order_1");
        delivery.signature = Some(compute_signature("wrong_secret", &delivery.payload));

        let err = h.handler.handle(delivery).await.unwrap_err();

        assert_eq!(err, WebhookError::InvalidSignature);
        assert!(h.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let h = harness();
        let mut delivery = captured("evt_1", "order_1");
        delivery.signature = None;

        let err = h.handler.handle(delivery).await.unwrap_err();

        assert_eq!(err, WebhookError::MissingSignature);
        assert!(h.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn missing_secret_refuses_every_delivery() {
        let h = harness_with(Arc::new(InMemoryRateLimiter::with_defaults()), None);

        let err = h.handler.handle(captured("evt_1", "order_1")).await.unwrap_err();

        assert_eq!(err, WebhookError::NotConfigured);
        assert!(h.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn rate_limit_applies_before_signature_check() {
        let limiter = InMemoryRateLimiter::new(RateLimitConfig::new(1, 60));
        let h = harness_with(Arc::new(limiter), Some(SECRET));
        let mut unsigned = captured("evt_1", "order_1");
        unsigned.signature = None;

        h.handler.handle(unsigned.clone()).await.unwrap_err();
        let err = h.handler.handle(unsigned).await.unwrap_err();

        assert!(matches!(err, WebhookError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn rate_limiter_outage_admits_delivery() {
        let h = harness_with(Arc::new(BrokenRateLimiter), Some(SECRET));
        seed(&h, "order_1").await;

        let outcome = h.handler.handle(captured("evt_1", "order_1")).await.unwrap();

        assert!(matches!(outcome, DeliveryOutcome::Completed { processed: true, .. }));
    }

    #[tokio::test]
    async fn non_json_body_is_parse_error() {
        let h = harness();
        let payload = b"not json".to_vec();
        let delivery = WebhookDelivery {
            source: "10.0.0.1".to_string(),
            signature: Some(compute_signature(SECRET, &payload)),
            event_id: None,
            payload,
        };

        let err = h.handler.handle(delivery).await.unwrap_err();

        assert!(matches!(err, WebhookError::ParseError(_)));
        assert!(h.ledger.is_empty().await);
    }

    // ══════════════════════════════════════════════════════════════
    // Processing Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn captured_payment_activates_and_marks_processed() {
        let h = harness();
        let id = seed(&h, "order_1").await;

        let outcome = h.handler.handle(captured("evt_1", "order_1")).await.unwrap();

        assert!(matches!(
            outcome,
            DeliveryOutcome::Completed {
                processed: true,
                outcome: Some(EventOutcome::Activated),
                ..
            }
        ));
        assert_eq!(
            h.subscriptions.get(&id).await.unwrap().payment_status,
            PaymentStatus::Completed
        );
        let record = h.ledger.find("evt_1").await.unwrap().unwrap();
        assert_eq!(record.status, EventStatus::Processed);
        assert_eq!(record.payment_id.as_deref(), Some("pay_1"));
    }

    #[tokio::test]
    async fn redelivery_is_already_processed_without_side_effects() {
        let h = harness();
        seed(&h, "order_1").await;

        h.handler.handle(captured("evt_1", "order_1")).await.unwrap();
        let second = h.handler.handle(captured("evt_1", "order_1")).await.unwrap();

        assert_eq!(second, DeliveryOutcome::AlreadyProcessed);
        assert_eq!(h.subscriptions.write_count(), 1);
    }

    #[tokio::test]
    async fn header_event_id_is_the_ledger_key() {
        let h = harness();
        seed(&h, "order_1").await;
        let mut delivery = captured("evt_body", "order_1");
        delivery.event_id = Some("evt_header".to_string());

        h.handler.handle(delivery).await.unwrap();

        assert!(h.ledger.find("evt_header").await.unwrap().is_some());
        assert!(h.ledger.find("evt_body").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn handler_error_is_recorded_and_acknowledged() {
        let h = harness();

        let outcome = h.handler.handle(captured("evt_1", "order_missing")).await.unwrap();

        assert!(matches!(
            outcome,
            DeliveryOutcome::Completed { processed: false, outcome: None, .. }
        ));
        let record = h.ledger.find("evt_1").await.unwrap().unwrap();
        assert_eq!(record.status, EventStatus::ProcessedWithError);
        assert_eq!(
            record.error_message.as_deref(),
            Some("Subscription not found for order order_missing")
        );
    }

    #[tokio::test]
    async fn malformed_event_is_recorded_and_acknowledged() {
        let h = harness();

        let outcome = h
            .handler
            .handle(signed(json!({"id": "evt_m", "event": "payment.failed", "payload": {}})))
            .await
            .unwrap();

        assert!(matches!(outcome, DeliveryOutcome::Completed { processed: false, .. }));
        let record = h.ledger.find("evt_m").await.unwrap().unwrap();
        assert_eq!(record.status, EventStatus::ProcessedWithError);
        assert_eq!(
            record.error_message.as_deref(),
            Some("Malformed event: Missing order ID in payment failure event")
        );
    }

    #[tokio::test]
    async fn unknown_event_type_is_marked_processed() {
        let h = harness();

        let outcome = h
            .handler
            .handle(signed(json!({"id": "evt_u", "event": "refund.created", "payload": {}})))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            DeliveryOutcome::Completed {
                processed: true,
                outcome: Some(EventOutcome::Ignored),
                ..
            }
        ));
        assert_eq!(
            h.ledger.find("evt_u").await.unwrap().unwrap().status,
            EventStatus::Processed
        );
    }

    #[tokio::test]
    async fn ledger_outage_is_retryable_and_has_no_side_effects() {
        let h = harness();
        seed(&h, "order_1").await;
        h.ledger.set_unavailable(true);

        let err = h.handler.handle(captured("evt_1", "order_1")).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(h.subscriptions.write_count(), 0);
    }

    #[tokio::test]
    async fn store_outage_during_handling_releases_claim() {
        let h = harness();
        let id = seed(&h, "order_1").await;
        h.subscriptions.set_unavailable(true);

        let err = h.handler.handle(captured("evt_1", "order_1")).await.unwrap_err();
        assert!(err.is_retryable());

        h.subscriptions.set_unavailable(false);
        let retry = h.handler.handle(captured("evt_1", "order_1")).await.unwrap();

        assert!(matches!(retry, DeliveryOutcome::Completed { processed: true, .. }));
        assert!(h.subscriptions.get(&id).await.unwrap().is_payment_completed());
    }

    #[tokio::test]
    async fn concurrent_duplicates_activate_once() {
        let h = Arc::new(harness());
        seed(&h, "order_1").await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move {
                h.handler.handle(captured("evt_race", "order_1")).await.unwrap()
            }));
        }

        let mut completed = 0;
        for task in tasks {
            if matches!(task.await.unwrap(), DeliveryOutcome::Completed { .. }) {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
        assert_eq!(h.subscriptions.write_count(), 1);
    }
}
