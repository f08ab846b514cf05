//! Column completeness pass
//!
//! Verifies that every required column on a note is filled and that the
//! session status marks the session as finished. Emptiness is checked
//! locally so the reasons name exactly which columns are missing; notes
//! that pass the local check are confirmed by the judgment service, which
//! is instructed to judge nothing beyond the required set.

use crate::audit::{judgment_schema, notes_payload, severity_from_label, AuditPass, PassContext};
use crate::clients::judgment::JudgmentRequest;
use crate::config::{PassConfig, PassesConfig};
use crate::error::AuditResult;
use crate::types::{MatchedTriple, NoteRecord, PassOutcome, Severity};
use async_trait::async_trait;
use serde_json::json;

pub const KEY: &str = "columns";

const TERMINAL_STATUS: &str = "Completed";

const SYSTEM_PROMPT: &str = "You are a columns checker verifying that staff \
members filled in every required column on a session note. The required \
columns are: start_time, end_time, units, service_type, provided_as, \
service_line, and session_status. If any of these is null or missing, mark \
the note Flagged and state concisely which columns are missing. Also mark \
the note Flagged if session_status is in-progress or not set to a finished \
state. If every required column is filled and the session is finished, mark \
the note Good. Do not judge any value beyond the required set.";

pub struct ColumnsPass;

/// Local completeness check. Returns `None` when every required column is
/// filled and the status is terminal.
fn completeness_outcome(note: &NoteRecord) -> Option<PassOutcome> {
    let mut missing: Vec<&str> = Vec::new();
    if note.start_time.is_none() {
        missing.push("Start Time");
    }
    if note.end_time.is_none() {
        missing.push("End Time");
    }
    if note.manual_units_value().is_none() {
        missing.push("Units");
    }
    if empty(&note.service_type) {
        missing.push("Service Type");
    }
    if empty(&note.provided_as) {
        missing.push("Provided As");
    }
    if empty(&note.service_line) {
        missing.push("Service Line");
    }
    if empty(&note.session_status) {
        missing.push("Session Status");
    }
    if !missing.is_empty() {
        return Some(PassOutcome::new(
            Severity::Flagged,
            format!("Required columns are not filled: {}.", missing.join(", ")),
        ));
    }

    let status = note.session_status.as_deref().unwrap_or_default().trim();
    if !status.eq_ignore_ascii_case(TERMINAL_STATUS) {
        return Some(PassOutcome::new(
            Severity::Flagged,
            format!("Session status is \"{}\", not {}.", status, TERMINAL_STATUS),
        ));
    }
    None
}

fn empty(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

#[async_trait]
impl AuditPass for ColumnsPass {
    fn key(&self) -> &'static str {
        KEY
    }

    fn config<'a>(&self, passes: &'a PassesConfig) -> &'a PassConfig {
        &passes.columns
    }

    async fn run(&self, batch: &mut [MatchedTriple], ctx: &PassContext) -> AuditResult<()> {
        let config = self.config(&ctx.passes);

        let mut to_judge: Vec<usize> = Vec::new();
        for (index, triple) in batch.iter_mut().enumerate() {
            match completeness_outcome(&triple.note) {
                Some(outcome) => triple.note.annotate(KEY, outcome),
                None => to_judge.push(index),
            }
        }
        if to_judge.is_empty() {
            return Ok(());
        }

        let complete: Vec<MatchedTriple> =
            to_judge.iter().map(|&index| batch[index].clone()).collect();
        let request = JudgmentRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_content: notes_payload(&complete).to_string(),
            schema: judgment_schema(json!({})),
            note_count: to_judge.len(),
        };
        let entries = ctx.judgment.judge(&request).await?;
        tokio::time::sleep(ctx.judgment_delay).await;

        for entry in entries {
            let index = to_judge[entry.note_index];
            batch[index].note.annotate(
                KEY,
                PassOutcome::new(severity_from_label(&entry.severity, config), entry.reason),
            );
        }
        Ok(())
    }
}
