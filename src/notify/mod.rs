//! Webhook delivery with bounded retries.
//!
//! Only HTTP 429 is retried: the wait starts at `RetryPolicy::base_delay` and
//! doubles after every rate-limited attempt. Any other failure ends the call
//! immediately. The caller marks a listing as seen only after `Ok(Delivered)`.

pub mod discord;

use crate::error::DeliveryError;
use crate::models::Listing;
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Response of a webhook POST as seen by the notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    pub status: u16,
    pub body: String,
}

impl PostOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Posts JSON to a webhook. Errors mean no HTTP response was received.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> anyhow::Result<PostOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Wait before the first retry; doubled for each later retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th (1-based) rate-limited attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(factor)
    }
}

/// Successful delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    pub attempts: u32,
    pub status: u16,
}

pub struct Notifier {
    transport: Arc<dyn WebhookTransport>,
    webhook_url: String,
    username: String,
    policy: RetryPolicy,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        webhook_url: impl Into<String>,
        username: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            webhook_url: webhook_url.into(),
            username: username.into(),
            policy,
        }
    }

    pub async fn notify(&self, listing: &Listing) -> Result<Delivered, DeliveryError> {
        if !is_absolute_http_url(&listing.url) {
            return Err(DeliveryError::InvalidRecord {
                id: listing.id.clone(),
                reason: format!("listing URL \"{}\" is not an absolute http(s) URL", listing.url),
            });
        }

        let thumbnail = listing
            .image_url
            .as_deref()
            .filter(|image| {
                let valid = is_absolute_http_url(image);
                if !valid {
                    debug!(listing_id = %listing.id, image = %image, "dropping invalid thumbnail");
                }
                valid
            });

        let payload = serde_json::to_value(discord::build_payload(listing, &self.username, thumbnail))
            .map_err(|e| DeliveryError::InvalidRecord {
                id: listing.id.clone(),
                reason: e.to_string(),
            })?;

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let outcome = self
                .transport
                .post_json(&self.webhook_url, &payload)
                .await
                .map_err(|e| DeliveryError::Transport {
                    reason: format!("{e:#}"),
                })?;

            if outcome.is_success() {
                info!("✅ Sent notification for: {}", listing.title);
                return Ok(Delivered {
                    attempts: attempt,
                    status: outcome.status,
                });
            }

            if !outcome.is_rate_limited() {
                return Err(DeliveryError::Rejected {
                    status: outcome.status,
                    body: outcome.body,
                });
            }

            if attempt < max_attempts {
                let delay = self.policy.delay_after(attempt);
                warn!(
                    listing_id = %listing.id,
                    attempt,
                    max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    "Rate limited by webhook, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(DeliveryError::RateLimitExhausted {
            attempts: max_attempts,
        })
    }
}

fn is_absolute_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}
