//! Webhook ingestion configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

const MAX_CLAIM_LEASE_SECS: u64 = 86_400;

/// Settings for the payment webhook endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared HMAC secret configured in the provider dashboard.
    ///
    /// When absent the endpoint answers every delivery with 503 so the
    /// provider keeps retrying until the deployment is fixed.
    #[serde(default)]
    pub signing_secret: Option<SecretString>,

    /// How long a `recorded` claim blocks redelivery before it may be reclaimed
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
}

impl WebhookConfig {
    pub fn has_signing_secret(&self) -> bool {
        self.signing_secret.is_some()
    }

    /// Validate webhook configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(secret) = &self.signing_secret {
            if secret.expose_secret().trim().is_empty() {
                return Err(ValidationError::BlankSigningSecret);
            }
        }
        if self.claim_lease_secs == 0 || self.claim_lease_secs > MAX_CLAIM_LEASE_SECS {
            return Err(ValidationError::InvalidClaimLease);
        }
        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            claim_lease_secs: default_claim_lease_secs(),
        }
    }
}

fn default_claim_lease_secs() -> u64 {
    300
}
