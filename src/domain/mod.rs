//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `billing` - Subscription payment lifecycle and purchase mirror
//! - `webhook` - Signature verification and provider event parsing

pub mod billing;
pub mod foundation;
pub mod webhook;
