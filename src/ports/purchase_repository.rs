//! Purchase repository port.
//!
//! Purchases mirror the subscription outcome for reporting. Writes through
//! this port are best-effort: callers log failures and carry on.

use async_trait::async_trait;

use crate::domain::billing::PurchaseStatus;
use crate::domain::foundation::DomainError;

/// Repository port for the purchase audit mirror.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Sets the status (and payment id, when given) of the purchase for an order.
    ///
    /// Returns the number of purchases updated; zero when none matches.
    async fn update_status(
        &self,
        order_id: &str,
        status: PurchaseStatus,
        payment_id: Option<&str>,
    ) -> Result<u64, DomainError>;
}
