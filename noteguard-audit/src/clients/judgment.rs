//! Language-model judgment client
//!
//! Four of the audit passes delegate their verdicts to a chat-completion
//! endpoint constrained by a function-call schema. The model must answer
//! through the declared tool; anything else, or any entry that fails shape
//! validation, is rejected as a malformed judgment so a pass can skip the
//! batch instead of recording garbage.

use crate::clients::retry::{RetryingClient, RetryPolicy};
use crate::error::{AuditError, AuditResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Judgment requests tolerate long generations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One per-note verdict returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteAnalysisEntry {
    /// Index into the batch that was sent, not a board id.
    pub note_index: usize,
    pub severity: String,
    pub reason: String,
    /// Only the billing pass asks for these two.
    pub improved_narrative: Option<String>,
    pub units: Option<f64>,
}

/// A fully-specified judgment call: instructions, the notes payload, and
/// the function schema constraining the answer.
#[derive(Debug, Clone)]
pub struct JudgmentRequest {
    pub system_prompt: String,
    pub user_content: String,
    /// JSON Schema for the tool's parameters; the top level must hold an
    /// `analyses` array of per-note objects.
    pub schema: Value,
    /// Number of notes in the batch; entries indexing past this are rejected.
    pub note_count: usize,
}

#[async_trait]
pub trait JudgmentApi: Send + Sync {
    async fn judge(&self, request: &JudgmentRequest) -> AuditResult<Vec<NoteAnalysisEntry>>;
}

/// Chat-completion judgment client.
pub struct JudgmentClient {
    client: RetryingClient,
    url: String,
    model: String,
}

impl JudgmentClient {
    pub fn new(
        url: impl Into<String>,
        token: &str,
        model: impl Into<String>,
        policy: RetryPolicy,
    ) -> AuditResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| AuditError::Config(format!("invalid judgment token: {}", e)))?,
        );

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| AuditError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: RetryingClient::new(http, policy),
            url: url.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl JudgmentApi for JudgmentClient {
    async fn judge(&self, request: &JudgmentRequest) -> AuditResult<Vec<NoteAnalysisEntry>> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_content }
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": "record_note_analyses",
                    "description": "Record one analysis entry per session note.",
                    "parameters": request.schema
                }
            }],
            "tool_choice": {
                "type": "function",
                "function": { "name": "record_note_analyses" }
            }
        });

        let (payload, success) = self
            .client
            .send("judgment", |http| http.post(&self.url).json(&body))
            .await;
        if !success {
            return Err(AuditError::Api("judgment request failed".to_string()));
        }

        let entries = parse_judgment(&payload, request.note_count)?;
        debug!(entry_count = entries.len(), "judgment parsed");
        Ok(entries)
    }
}

/// Extract and validate the tool-call arguments from a completion payload.
pub fn parse_judgment(payload: &Value, note_count: usize) -> AuditResult<Vec<NoteAnalysisEntry>> {
    let arguments = payload["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"]
        .as_str()
        .ok_or_else(|| {
            AuditError::MalformedJudgment("response carried no tool call".to_string())
        })?;

    let parsed: Value = serde_json::from_str(arguments)
        .map_err(|e| AuditError::MalformedJudgment(format!("arguments not JSON: {}", e)))?;

    let analyses = parsed["analyses"].as_array().ok_or_else(|| {
        AuditError::MalformedJudgment("arguments missing analyses array".to_string())
    })?;

    let mut entries = Vec::with_capacity(analyses.len());
    for (position, entry) in analyses.iter().enumerate() {
        let Some(index) = entry["note_index"].as_u64() else {
            return Err(AuditError::MalformedJudgment(format!(
                "entry {} missing note_index",
                position
            )));
        };
        let index = index as usize;
        if index >= note_count {
            return Err(AuditError::MalformedJudgment(format!(
                "note_index {} out of range for batch of {}",
                index, note_count
            )));
        }
        let Some(severity) = entry["severity"].as_str() else {
            return Err(AuditError::MalformedJudgment(format!(
                "entry {} missing severity",
                position
            )));
        };
        let Some(reason) = entry["reason"].as_str() else {
            return Err(AuditError::MalformedJudgment(format!(
                "entry {} missing reason",
                position
            )));
        };

        entries.push(NoteAnalysisEntry {
            note_index: index,
            severity: severity.to_string(),
            reason: reason.to_string(),
            improved_narrative: entry["improved_narrative"].as_str().map(String::from),
            units: entry["units"].as_f64(),
        });
    }

    if entries.is_empty() {
        warn!("judgment returned an empty analyses array");
    }
    Ok(entries)
}
