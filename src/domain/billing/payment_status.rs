//! Payment status state machine.
//!
//! `Completed` is absorbing: once a subscription has been paid for, nothing
//! moves it anywhere else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StateMachine, ValidationError};

/// Payment status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Order created, awaiting the provider's verdict.
    Pending,
    /// Payment captured. Terminal.
    Completed,
    /// Payment attempt failed. The customer may retry on the same order.
    Failed,
}

impl PaymentStatus {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "payment_status",
                format!("unknown value '{}'", other),
            )),
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Completed)
                | (Pending, Failed)
                // A failed attempt can be retried on the same order
                | (Failed, Completed)
                | (Failed, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Completed, Failed],
            Failed => vec![Completed, Failed],
            Completed => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PaymentStatus; 3] = [
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
    ];

    #[test]
    fn pending_can_complete_or_fail() {
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Completed));
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Failed));
    }

    #[test]
    fn failed_payment_can_be_retried_to_completion() {
        assert_eq!(
            PaymentStatus::Failed.transition_to(PaymentStatus::Completed),
            Ok(PaymentStatus::Completed)
        );
    }

    #[test]
    fn completed_is_absorbing() {
        assert!(PaymentStatus::Completed.is_terminal());
        for target in ALL {
            assert!(PaymentStatus::Completed.transition_to(target).is_err());
        }
    }

    #[test]
    fn nothing_returns_to_pending() {
        for from in ALL {
            assert!(!from.can_transition_to(&PaymentStatus::Pending));
        }
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(&to),
                    from.valid_transitions().contains(&to),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn parses_storage_representation() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
        assert_eq!("COMPLETED".parse::<PaymentStatus>(), Ok(PaymentStatus::Completed));
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }
}
