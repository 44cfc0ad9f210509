//! Billing domain module.
//!
//! The subset of the billing model this service mutates: a subscription's
//! payment lifecycle and the purchase record mirrored for audit.
//!
//! # Module Structure
//!
//! - `payment_status` - PaymentStatus state machine (`completed` is absorbing)
//! - `subscription_status` - Coarse subscription status
//! - `subscription` - Subscription aggregate with activate / fail transitions
//! - `purchase` - Purchase mirror status

mod payment_status;
mod purchase;
mod subscription;
mod subscription_status;

pub use payment_status::PaymentStatus;
pub use purchase::PurchaseStatus;
pub use subscription::{Subscription, TransitionOutcome};
pub use subscription_status::SubscriptionStatus;
