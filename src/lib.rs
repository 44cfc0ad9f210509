//! Payment Webhooks - Razorpay delivery ingestion
//!
//! Receives signed payment notifications, deduplicates them through a
//! processed-events ledger and moves the matching subscription to its paid
//! or failed state.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
