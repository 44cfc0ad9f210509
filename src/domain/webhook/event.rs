//! Webhook event parsing.
//!
//! A delivery is parsed in two steps. `WebhookEvent::parse` only requires the
//! body to be a JSON object; it captures the event type, identifiers and the
//! raw payload so the delivery can be recorded. `WebhookEvent::data` then
//! validates the shape each event type needs and fails closed with a
//! `MalformedEvent` error.
//!
//! Provider envelope:
//!
//! ```json
//! {
//!   "event": "payment.captured",
//!   "payload": {
//!     "payment": { "entity": { "id": "pay_1", "order_id": "order_1" } },
//!     "order":   { "entity": { "id": "order_1" } }
//!   }
//! }
//! ```

use std::fmt;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::errors::WebhookError;

/// Event types the pipeline distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    PaymentCaptured,
    OrderPaid,
    PaymentFailed,
    /// Any other type the provider sends.
    Unrecognized(String),
    /// The envelope carried no string `event` field.
    Unspecified,
}

impl EventType {
    /// Parse event type from the envelope value.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("payment.captured") => Self::PaymentCaptured,
            Some("order.paid") => Self::OrderPaid,
            Some("payment.failed") => Self::PaymentFailed,
            Some(other) => Self::Unrecognized(other.to_string()),
            None => Self::Unspecified,
        }
    }

    /// Convert to the provider's event type string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PaymentCaptured => "payment.captured",
            Self::OrderPaid => "order.paid",
            Self::PaymentFailed => "payment.failed",
            Self::Unrecognized(other) => other,
            Self::Unspecified => "unknown",
        }
    }

    /// Returns true for types that report a successful payment.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::PaymentCaptured | Self::OrderPaid)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers a payment event must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub order_id: String,
    pub payment_id: Option<String>,
}

/// Validated, per-type event data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    PaymentSucceeded(PaymentDetails),
    PaymentFailed(PaymentDetails),
    Unrecognized,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderEntity {
    #[serde(default)]
    id: Option<String>,
}

/// One `payload.<name>` branch. Each branch is decoded on its own so a
/// malformed sibling only matters to event types that read it.
type Branch<T> = Option<Result<T, String>>;

fn branch<T: serde::de::DeserializeOwned>(payload: &serde_json::Value, name: &str) -> Branch<T> {
    let value = payload.get(name).filter(|v| !v.is_null())?;
    Some(
        serde_json::from_value::<Wrapped<T>>(value.clone())
            .map(|w| w.entity)
            .map_err(|e| format!("{}: {}", name, e)),
    )
}

/// A parsed delivery, consumed once.
#[derive(Debug)]
pub struct WebhookEvent {
    /// Provider-assigned event id, if the delivery carried one.
    pub event_id: Option<String>,
    pub event_type: EventType,
    /// Raw `payload` object, snapshotted into the ledger.
    pub payload: serde_json::Value,
    ledger_key: String,
    payment: Branch<PaymentEntity>,
    order: Branch<OrderEntity>,
}

impl WebhookEvent {
    /// Parses the raw body of a verified delivery.
    ///
    /// `header_event_id` takes precedence over an `id` field in the body.
    /// Without either, the ledger key falls back to a digest of the body so
    /// byte-identical redeliveries still deduplicate. Envelope fields of the
    /// wrong JSON type are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the body is not a JSON object.
    pub fn parse(raw: &[u8], header_event_id: Option<&str>) -> Result<Self, WebhookError> {
        let body: serde_json::Value =
            serde_json::from_slice(raw).map_err(|e| WebhookError::ParseError(e.to_string()))?;
        let Some(envelope) = body.as_object() else {
            return Err(WebhookError::ParseError(
                "webhook body is not a JSON object".to_string(),
            ));
        };

        let body_id = envelope
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let event_id = header_event_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or(body_id)
            .map(str::to_string);

        let ledger_key = match &event_id {
            Some(id) => id.clone(),
            None => format!("sha256:{}", hex::encode(Sha256::digest(raw))),
        };

        let event_type = EventType::parse(envelope.get("event").and_then(serde_json::Value::as_str));
        let payload = envelope
            .get("payload")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        Ok(Self {
            event_id,
            event_type,
            payment: branch(&payload, "payment"),
            order: branch(&payload, "order"),
            payload,
            ledger_key,
        })
    }

    /// Key under which the delivery is recorded in the idempotency ledger.
    pub fn ledger_key(&self) -> &str {
        &self.ledger_key
    }

    /// Event id for log output.
    pub fn display_id(&self) -> &str {
        self.event_id.as_deref().unwrap_or("unknown")
    }

    /// Best-effort order id, for the ledger row.
    pub fn order_id(&self) -> Option<&str> {
        let payment = self.payment.as_ref().and_then(|p| p.as_ref().ok());
        let order = self.order.as_ref().and_then(|o| o.as_ref().ok());
        payment
            .and_then(|p| p.order_id.as_deref())
            .or_else(|| order.and_then(|o| o.id.as_deref()))
    }

    /// Best-effort payment id, for the ledger row.
    pub fn payment_id(&self) -> Option<&str> {
        self.payment
            .as_ref()
            .and_then(|p| p.as_ref().ok())
            .and_then(|p| p.id.as_deref())
    }

    /// Validates the shape required by the event type.
    ///
    /// Only the branches a type reads can fail it: a success event whose
    /// payment entity carries the order id ignores the order branch.
    ///
    /// # Errors
    ///
    /// Returns `MalformedEvent` when the type is missing, a required entity
    /// has the wrong shape, or the order id cannot be found.
    pub fn data(&self) -> Result<EventData, WebhookError> {
        match &self.event_type {
            EventType::Unspecified => Err(WebhookError::malformed("Missing event type")),
            EventType::Unrecognized(_) => Ok(EventData::Unrecognized),
            EventType::PaymentCaptured | EventType::OrderPaid => {
                if self.payment.is_none() && self.order.is_none() {
                    return Err(WebhookError::malformed(
                        "Missing payment or order data in event",
                    ));
                }

                let payment = entity(&self.payment)?;
                let payment_id = payment.and_then(|p| non_empty(&p.id));

                let order_id = match payment.and_then(|p| non_empty(&p.order_id)) {
                    Some(id) => id,
                    None => entity(&self.order)?
                        .and_then(|o| non_empty(&o.id))
                        .ok_or_else(|| {
                            WebhookError::malformed("Missing order ID in payment event")
                        })?,
                };

                Ok(EventData::PaymentSucceeded(PaymentDetails {
                    order_id,
                    payment_id,
                }))
            }
            EventType::PaymentFailed => {
                let payment = entity(&self.payment)?;

                let order_id = payment
                    .and_then(|p| non_empty(&p.order_id))
                    .ok_or_else(|| {
                        WebhookError::malformed("Missing order ID in payment failure event")
                    })?;

                Ok(EventData::PaymentFailed(PaymentDetails {
                    order_id,
                    payment_id: payment.and_then(|p| non_empty(&p.id)),
                }))
            }
        }
    }
}

fn entity<T>(branch: &Branch<T>) -> Result<Option<&T>, WebhookError> {
    match branch {
        None => Ok(None),
        Some(Ok(entity)) => Ok(Some(entity)),
        Some(Err(e)) => Err(WebhookError::malformed(format!(
            "Unexpected payload shape: {}",
            e
        ))),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}
