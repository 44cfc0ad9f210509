//! Application layer - Command handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod webhook;

pub use webhook::{
    DeliveryOutcome, DeliverySettings, EventOutcome, EventRouter, HandleWebhookDeliveryHandler,
    WebhookDelivery,
};
