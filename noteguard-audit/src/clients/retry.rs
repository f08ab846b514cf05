//! Retrying request client
//!
//! Generic call-with-retry wrapper shared by every network-bound stage.
//! Exponential backoff starting at `initial_delay`, doubling per retry up to
//! `max_delay`. HTTP 429 always retries with backoff; other non-200 statuses
//! and transport failures retry up to `max_retries`. Payloads whose GraphQL
//! `errors[].message` mentions a complexity/limit condition are fatal for the
//! current batch and are returned immediately without retry.
//!
//! Callers treat `success = false` as "skip this batch"; the wrapper never
//! panics and never aborts the run.

use crate::config::RetryConfig;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy for one client.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_secs_f64(config.initial_delay_secs),
            max_delay: Duration::from_secs_f64(config.max_delay_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Double a backoff delay, clamped to the policy cap.
pub fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    (current * 2).min(policy.max_delay)
}

/// True when a GraphQL error payload signals a rate/complexity limit.
///
/// These are domain-fatal for the current batch: retrying inside the same
/// window only amplifies the limit, so the batch is abandoned instead.
pub fn is_limit_error(payload: &Value) -> bool {
    payload
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors.iter().any(|e| {
                let msg = e
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_lowercase();
                msg.contains("complexity") || msg.contains("limit")
            })
        })
        .unwrap_or(false)
}

/// Placeholder payload returned when the final attempt died in transport.
pub fn empty_items_payload() -> Value {
    json!({ "data": { "items": [] } })
}

/// Retrying JSON request client.
///
/// Safe to call concurrently for independent requests; each call tracks its
/// own backoff state.
pub struct RetryingClient {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(http: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send a request with retry and backoff.
    ///
    /// `build` constructs a fresh request per attempt (request builders are
    /// single-use). Returns the response payload and whether the call
    /// ultimately succeeded; on exhaustion the last payload is returned so
    /// callers can log what the service said.
    pub async fn send<F>(&self, label: &str, build: F) -> (Value, bool)
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut delay = self.policy.initial_delay;
        let mut last_payload = empty_items_payload();

        for attempt in 1..=self.policy.max_retries {
            let response = match build(&self.http).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(label, attempt, error = %e, "request transport failure");
                    if attempt < self.policy.max_retries {
                        sleep(delay).await;
                        delay = next_delay(delay, &self.policy);
                        continue;
                    }
                    return (empty_items_payload(), false);
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                warn!(label, attempt, delay_ms = delay.as_millis() as u64, "rate limited");
                sleep(delay).await;
                delay = next_delay(delay, &self.policy);
                continue;
            }

            let payload: Value = match response.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(label, attempt, error = %e, "response body was not JSON");
                    if attempt < self.policy.max_retries {
                        sleep(delay).await;
                        delay = next_delay(delay, &self.policy);
                        continue;
                    }
                    return (empty_items_payload(), false);
                }
            };

            if status.is_success() {
                if payload.get("errors").is_some() {
                    if is_limit_error(&payload) {
                        warn!(label, "complexity/limit error; abandoning batch");
                        return (payload, false);
                    }
                    warn!(label, attempt, "response carried GraphQL errors");
                    last_payload = payload;
                    if attempt < self.policy.max_retries {
                        sleep(delay).await;
                        delay = next_delay(delay, &self.policy);
                        continue;
                    }
                    return (last_payload, false);
                }

                debug!(label, attempt, "request succeeded");
                return (payload, true);
            }

            warn!(label, attempt, status = status.as_u16(), "unexpected status");
            last_payload = payload;
            if attempt < self.policy.max_retries {
                sleep(delay).await;
                delay = next_delay(delay, &self.policy);
            }
        }

        (last_payload, false)
    }
}
