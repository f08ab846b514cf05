//! Audit pass sequencer
//!
//! Six passes examine each correlated note and annotate it under the pass's
//! own key. Passes run strictly in sequence over the whole batch; a pass
//! that fails (network, malformed judgment) is skipped with a warning and
//! the remaining passes still run, so one bad pass never voids a day's
//! audit.

pub mod billing;
pub mod columns;
pub mod end_time;
pub mod service;
pub mod start_time;
pub mod transcript;

use crate::clients::judgment::{JudgmentApi, NoteAnalysisEntry};
use crate::config::{PassConfig, PassesConfig};
use crate::error::AuditResult;
use crate::types::{MatchedTriple, PassOutcome, Severity};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared context handed to every pass.
pub struct PassContext {
    pub judgment: Arc<dyn JudgmentApi>,
    pub passes: PassesConfig,
    /// Pause between judgment calls, pacing the completion endpoint.
    pub judgment_delay: Duration,
}

/// One audit pass over a correlated batch.
///
/// A pass annotates notes in place and never reads or writes another
/// pass's annotation key.
#[async_trait]
pub trait AuditPass: Send + Sync {
    /// Annotation key this pass writes under.
    fn key(&self) -> &'static str;

    fn config<'a>(&self, passes: &'a PassesConfig) -> &'a PassConfig;

    async fn run(&self, batch: &mut [MatchedTriple], ctx: &PassContext) -> AuditResult<()>;
}

/// Runs the configured passes in their fixed order.
pub struct Sequencer {
    passes: Vec<Box<dyn AuditPass>>,
}

impl Sequencer {
    /// The standard six-pass sequence.
    pub fn standard() -> Self {
        Self {
            passes: vec![
                Box::new(transcript::TranscriptPass),
                Box::new(start_time::StartTimePass),
                Box::new(end_time::EndTimePass),
                Box::new(service::ServicePass),
                Box::new(billing::BillingPass),
                Box::new(columns::ColumnsPass),
            ],
        }
    }

    /// Run every enabled pass over the batch.
    ///
    /// Returns the number of passes that completed. Failures are logged and
    /// skipped; annotations from completed passes are never rolled back.
    pub async fn run_all(&self, batch: &mut [MatchedTriple], ctx: &PassContext) -> usize {
        let mut completed = 0;
        for pass in &self.passes {
            if !pass.config(&ctx.passes).enabled {
                info!(pass = pass.key(), "pass disabled; skipped");
                continue;
            }
            match pass.run(batch, ctx).await {
                Ok(()) => {
                    info!(pass = pass.key(), note_count = batch.len(), "pass completed");
                    completed += 1;
                }
                Err(e) => {
                    warn!(pass = pass.key(), error = %e, "pass failed; continuing");
                }
            }
        }
        completed
    }
}

// ============================================================================
// Shared judgment plumbing
// ============================================================================

/// Serialize a batch for a judgment prompt: index, times, service labels,
/// units, and narrative for each note.
pub(crate) fn notes_payload(batch: &[MatchedTriple]) -> Value {
    let entries: Vec<Value> = batch
        .iter()
        .enumerate()
        .map(|(index, triple)| {
            let note = &triple.note;
            json!({
                "note_index": index,
                "date": note.date.map(|d| d.to_string()),
                "start_time": note.start_time.map(|t| t.to_string()),
                "end_time": note.end_time.map(|t| t.to_string()),
                "service_type": note.service_type,
                "provided_as": note.provided_as,
                "service_line": note.service_line,
                "session_status": note.session_status,
                "units": note.manual_units_value(),
                "narrative": note.narrative_text,
            })
        })
        .collect();
    json!(entries)
}

/// Map a judgment label onto a severity using the pass's configured
/// vocabulary. Unknown labels count as flagged; a model inventing a third
/// label must never pass a note silently.
pub(crate) fn severity_from_label(label: &str, config: &PassConfig) -> Severity {
    if label.eq_ignore_ascii_case(&config.good_label) {
        Severity::Good
    } else {
        if !label.eq_ignore_ascii_case(&config.flagged_label) {
            warn!(label, "unrecognized judgment label; treated as flagged");
        }
        Severity::Flagged
    }
}

/// Write one pass's judgment entries back onto the batch.
pub(crate) fn apply_entries(
    batch: &mut [MatchedTriple],
    entries: &[NoteAnalysisEntry],
    key: &str,
    config: &PassConfig,
) {
    for entry in entries {
        // Index bounds were validated at parse time.
        let note = &mut batch[entry.note_index].note;
        let mut outcome = PassOutcome::new(
            severity_from_label(&entry.severity, config),
            entry.reason.clone(),
        );
        if outcome.severity == Severity::Flagged {
            outcome.improved_narrative = entry.improved_narrative.clone();
        }
        note.annotate(key, outcome);
    }
}

/// The standard per-note judgment schema. `extra_properties` lets a pass
/// request additional fields (the billing pass asks for a rewrite).
pub(crate) fn judgment_schema(extra_properties: Value) -> Value {
    let mut properties = json!({
        "note_index": { "type": "integer", "description": "Index of the note in the batch." },
        "severity": { "type": "string", "description": "Verdict label for this note." },
        "reason": { "type": "string", "description": "One or two sentences justifying the verdict." }
    });
    if let (Some(base), Some(extra)) = (properties.as_object_mut(), extra_properties.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    json!({
        "type": "object",
        "properties": {
            "analyses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": properties,
                    "required": ["note_index", "severity", "reason"]
                }
            }
        },
        "required": ["analyses"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NoteRecord;

    fn triple(id: &str) -> MatchedTriple {
        MatchedTriple {
            note: NoteRecord::empty(id, "g"),
            call: None,
            transcript: None,
            delta_minutes: None,
        }
    }

    fn pass_config() -> PassConfig {
        PassConfig {
            enabled: true,
            threshold_minutes: None,
            good_label: "Good".to_string(),
            flagged_label: "Flagged".to_string(),
        }
    }

    #[test]
    fn test_severity_from_label() {
        let cfg = pass_config();
        assert_eq!(severity_from_label("good", &cfg), Severity::Good);
        assert_eq!(severity_from_label("Flagged", &cfg), Severity::Flagged);
        assert_eq!(severity_from_label("maybe", &cfg), Severity::Flagged);
    }

    #[test]
    fn test_apply_entries_only_touches_own_key() {
        let mut batch = vec![triple("1"), triple("2")];
        batch[0]
            .note
            .annotate("other", PassOutcome::new(Severity::Good, "prior"));

        let entries = vec![NoteAnalysisEntry {
            note_index: 0,
            severity: "Flagged".to_string(),
            reason: "narrative too thin".to_string(),
            improved_narrative: Some("Better text.".to_string()),
            units: None,
        }];
        apply_entries(&mut batch, &entries, "billing", &pass_config());

        let note = &batch[0].note;
        assert_eq!(note.annotations["billing"].severity, Severity::Flagged);
        assert_eq!(
            note.annotations["billing"].improved_narrative.as_deref(),
            Some("Better text.")
        );
        assert_eq!(note.annotations["other"].reason, "prior");
        assert!(batch[1].note.annotations.is_empty());
    }

    #[test]
    fn test_good_entries_drop_rewrites() {
        let mut batch = vec![triple("1")];
        let entries = vec![NoteAnalysisEntry {
            note_index: 0,
            severity: "Good".to_string(),
            reason: "fine".to_string(),
            improved_narrative: Some("unnecessary".to_string()),
            units: None,
        }];
        apply_entries(&mut batch, &entries, "billing", &pass_config());
        assert!(batch[0].note.annotations["billing"].improved_narrative.is_none());
    }

    #[test]
    fn test_judgment_schema_merges_extras() {
        let schema = judgment_schema(json!({
            "improved_narrative": { "type": "string" }
        }));
        let props = &schema["properties"]["analyses"]["items"]["properties"];
        assert!(props["note_index"].is_object());
        assert!(props["improved_narrative"].is_object());
    }
}
