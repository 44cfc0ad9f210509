//! In-memory purchase mirror.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::domain::billing::PurchaseStatus;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::PurchaseRepository;

/// Stored purchase state for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseEntry {
    pub status: PurchaseStatus,
    pub payment_id: Option<String>,
}

/// In-memory purchase store keyed by order id.
#[derive(Debug, Default)]
pub struct InMemoryPurchaseRepository {
    purchases: RwLock<HashMap<String, PurchaseEntry>>,
    failing: AtomicBool,
}

impl InMemoryPurchaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a pending purchase for an order.
    pub async fn insert_pending(&self, order_id: &str) {
        self.purchases.write().await.insert(
            order_id.to_string(),
            PurchaseEntry {
                status: PurchaseStatus::Pending,
                payment_id: None,
            },
        );
    }

    pub async fn get(&self, order_id: &str) -> Option<PurchaseEntry> {
        self.purchases.read().await.get(order_id).cloned()
    }

    /// Makes every subsequent write fail with a database error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PurchaseRepository for InMemoryPurchaseRepository {
    async fn update_status(
        &self,
        order_id: &str,
        status: PurchaseStatus,
        payment_id: Option<&str>,
    ) -> Result<u64, DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Failed to update purchase: injected failure",
            ));
        }

        let mut purchases = self.purchases.write().await;
        match purchases.get_mut(order_id) {
            Some(entry) => {
                entry.status = status;
                if let Some(payment_id) = payment_id {
                    entry.payment_id = Some(payment_id.to_string());
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
