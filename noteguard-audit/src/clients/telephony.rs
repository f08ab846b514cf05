//! Telephony provider client
//!
//! Lists the organization's phone lines, fetches per-participant call
//! metadata, and retrieves call transcripts. A missing transcript is a
//! non-error: transcripts only exist for some calls and their absence is
//! itself a signal the audit passes interpret.

use crate::clients::retry::{RetryingClient, RetryPolicy};
use crate::error::{AuditError, AuditResult};
use crate::types::{CallRecord, Direction, Transcript, TranscriptTurn};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for telephony API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One provisioned phone line.
#[derive(Debug, Clone)]
pub struct PhoneLine {
    pub id: String,
    pub name: Option<String>,
    pub number: String,
}

/// Abstract telephony capability the pipeline consumes.
#[async_trait]
pub trait TelephonyApi: Send + Sync {
    /// List phone lines (id, display name, E.164 number).
    async fn fetch_phone_lines(&self) -> AuditResult<Vec<PhoneLine>>;

    /// Fetch calls on one line, optionally narrowed to one counterparty.
    async fn fetch_calls(
        &self,
        phone_number_id: &str,
        participant: Option<&str>,
    ) -> AuditResult<Vec<CallRecord>>;

    /// Fetch the transcript for a call; `None` when the provider has none.
    async fn fetch_transcript(&self, call_id: &str) -> AuditResult<Option<Value>>;
}

/// REST telephony client.
pub struct TelephonyClient {
    client: RetryingClient,
    base_url: String,
}

impl TelephonyClient {
    pub fn new(base_url: impl Into<String>, token: &str, policy: RetryPolicy) -> AuditResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(token)
                .map_err(|e| AuditError::Config(format!("invalid telephony token: {}", e)))?,
        );

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| AuditError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: RetryingClient::new(http, policy),
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl TelephonyApi for TelephonyClient {
    async fn fetch_phone_lines(&self) -> AuditResult<Vec<PhoneLine>> {
        let url = format!("{}/phone-numbers", self.base_url);
        let (payload, success) = self
            .client
            .send("fetch_phone_lines", |http| http.get(&url))
            .await;
        if !success {
            return Err(AuditError::Api("phone line listing failed".to_string()));
        }

        let lines = payload["data"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| {
                        Some(PhoneLine {
                            id: e["id"].as_str()?.to_string(),
                            name: e["name"].as_str().map(String::from),
                            number: e["number"].as_str()?.to_string(),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        debug!(line_count = lines.len(), "fetched phone lines");
        Ok(lines)
    }

    async fn fetch_calls(
        &self,
        phone_number_id: &str,
        participant: Option<&str>,
    ) -> AuditResult<Vec<CallRecord>> {
        let url = format!("{}/calls", self.base_url);
        let (payload, success) = self
            .client
            .send("fetch_calls", |http| {
                let mut query = vec![("phoneNumberId", phone_number_id)];
                if let Some(participant) = participant {
                    query.push(("participants", participant));
                }
                http.get(&url).query(&query)
            })
            .await;
        if !success {
            return Err(AuditError::Api(format!(
                "call fetch for line {} failed",
                phone_number_id
            )));
        }

        Ok(parse_calls(&payload, phone_number_id))
    }

    async fn fetch_transcript(&self, call_id: &str) -> AuditResult<Option<Value>> {
        // Single attempt on purpose: 404 means "no transcript", which is a
        // normal outcome, not a retryable failure.
        let url = format!("{}/call-transcripts/{}", self.base_url, call_id);
        let response = self
            .client
            .http()
            .get(&url)
            .send()
            .await
            .map_err(|e| AuditError::Network(format!("transcript fetch failed: {}", e)))?;

        if response.status().as_u16() == 404 {
            debug!(call_id, "no transcript for call");
            return Ok(None);
        }
        if !response.status().is_success() {
            warn!(call_id, status = response.status().as_u16(), "transcript fetch error");
            return Ok(None);
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AuditError::Parse(format!("transcript body: {}", e)))?;
        Ok(Some(payload))
    }
}

/// Parse the provider's call listing into `CallRecord`s.
///
/// Calls missing an id, a direction, or either timestamp are skipped with a
/// warning; one bad entry never sinks the batch.
pub fn parse_calls(payload: &Value, phone_number_id: &str) -> Vec<CallRecord> {
    let mut calls = Vec::new();
    for entry in payload["data"].as_array().cloned().unwrap_or_default() {
        let Some(id) = entry["id"].as_str() else {
            continue;
        };
        let direction = match entry["direction"].as_str() {
            Some("incoming") => Direction::Incoming,
            Some("outgoing") => Direction::Outgoing,
            other => {
                warn!(call_id = id, direction = ?other, "unknown call direction; skipped");
                continue;
            }
        };
        let start = entry["createdAt"]
            .as_str()
            .and_then(|s| noteguard_common::time::parse_utc_instant(s).ok());
        let end = entry["completedAt"]
            .as_str()
            .and_then(|s| noteguard_common::time::parse_utc_instant(s).ok());
        let (Some(start_time), Some(end_time)) = (start, end) else {
            warn!(call_id = id, "call missing usable timestamps; skipped");
            continue;
        };

        let counterparty = match direction {
            Direction::Incoming => entry["from"].as_str(),
            Direction::Outgoing => entry["to"].as_str(),
        };

        calls.push(CallRecord {
            call_id: id.to_string(),
            phone_number_id: phone_number_id.to_string(),
            direction,
            counterparty_number: counterparty.map(String::from),
            start_time,
            end_time,
            staff_name: None,
            board_id: None,
            transcript: None,
        });
    }
    calls
}

/// Normalize a raw transcript payload into speaker-labelled turns.
///
/// Dialogue entries whose `identifier` is a staff phone number speak as
/// "Staff Member"; everyone else is "Client".
pub fn normalize_transcript(payload: &Value, staff_numbers: &HashSet<String>) -> Option<Transcript> {
    let dialogue = payload["data"]["dialogue"].as_array()?;
    let conversation = dialogue
        .iter()
        .filter_map(|turn| {
            let content = turn["content"].as_str()?;
            let identifier = turn["identifier"].as_str().unwrap_or_default();
            let speaker = if staff_numbers.contains(identifier) {
                "Staff Member"
            } else {
                "Client"
            };
            Some(TranscriptTurn {
                speaker: speaker.to_string(),
                message: content.to_string(),
            })
        })
        .collect::<Vec<_>>();

    if conversation.is_empty() {
        None
    } else {
        Some(Transcript { conversation })
    }
}
