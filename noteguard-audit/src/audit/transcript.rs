//! Transcript coverage pass
//!
//! Checks that every remote session is backed by a call and, when a
//! transcript exists, that the narrative actually describes the recorded
//! conversation. Narrative-versus-transcript comparison is delegated to the
//! judgment service; the structural checks (call present, transcript
//! present) are mechanical.

use crate::audit::{judgment_schema, severity_from_label, AuditPass, PassContext};
use crate::clients::judgment::JudgmentRequest;
use crate::config::{PassConfig, PassesConfig};
use crate::error::AuditResult;
use crate::types::{MatchedTriple, Modality, PassOutcome, Severity};
use async_trait::async_trait;
use serde_json::json;

pub const KEY: &str = "transcript";

/// Delta band, in minutes, within which a matched call counts as covering
/// the recorded session window.
const DEFAULT_BAND_MINUTES: i64 = 5;

const SYSTEM_PROMPT: &str = "You are a compliance auditor for housing stabilization \
services. For each session note you receive the staff member's narrative and the \
transcript of the matched phone call. Judge whether the narrative honestly describes \
what was discussed on the call. Label a note Good when the narrative is consistent \
with the transcript, Flagged when it describes topics or services the transcript \
does not support. Minor paraphrasing is fine; fabricated content is not.";

pub struct TranscriptPass;

#[async_trait]
impl AuditPass for TranscriptPass {
    fn key(&self) -> &'static str {
        KEY
    }

    fn config<'a>(&self, passes: &'a PassesConfig) -> &'a PassConfig {
        &passes.transcript
    }

    async fn run(&self, batch: &mut [MatchedTriple], ctx: &PassContext) -> AuditResult<()> {
        let config = self.config(&ctx.passes);
        let band = config.threshold_or(DEFAULT_BAND_MINUTES);

        // Settle the mechanical cases first and collect the rest for judgment.
        let mut to_judge: Vec<usize> = Vec::new();
        for (index, triple) in batch.iter_mut().enumerate() {
            match mechanical_outcome(triple, band) {
                Some(outcome) => triple.note.annotate(KEY, outcome),
                None => to_judge.push(index),
            }
        }
        if to_judge.is_empty() {
            return Ok(());
        }

        let payload: Vec<_> = to_judge
            .iter()
            .enumerate()
            .map(|(position, &index)| {
                let triple = &batch[index];
                json!({
                    "note_index": position,
                    "narrative": triple.note.narrative_text,
                    "transcript": triple.transcript,
                })
            })
            .collect();

        let request = JudgmentRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_content: json!(payload).to_string(),
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

/// Resolve the cases that need no judgment call.
///
/// Returns `None` exactly when a matched call sits within the delta band
/// and carries a transcript the narrative must be compared against. An
/// indirect session needs no call, but a call that was found for it still
/// gets its transcript verified.
fn mechanical_outcome(triple: &MatchedTriple, band: i64) -> Option<PassOutcome> {
    match triple.note.modality() {
        Some(Modality::InPerson) => Some(PassOutcome::new(
            Severity::Good,
            "In-person session; no call expected.",
        )),
        Some(Modality::Indirect) => {
            if triple.call.is_none() {
                return Some(PassOutcome::new(
                    Severity::Good,
                    "Indirect service; no call on record, none required.",
                ));
            }
            if triple.delta_minutes.unwrap_or(i64::MAX) > band {
                return Some(PassOutcome::new(
                    Severity::Good,
                    "Indirect service; no call covers the session window, none required.",
                ));
            }
            if triple.transcript.is_none() {
                return Some(PassOutcome::new(
                    Severity::Good,
                    "Indirect service; matched call has no transcript, none required.",
                ));
            }
            None
        }
        Some(Modality::DirectRemote) | None => {
            if triple.call.is_none() {
                return Some(PassOutcome::new(
                    Severity::Flagged,
                    "No call within the matching window covers this remote session.",
                ));
            }
            let delta = triple.delta_minutes.unwrap_or(i64::MAX);
            if delta > band {
                return Some(PassOutcome::new(
                    Severity::Flagged,
                    format!(
                        "Matched call is {} minutes off the recorded session window.",
                        delta
                    ),
                ));
            }
            if triple.transcript.is_none() {
                return Some(PassOutcome::new(
                    Severity::Flagged,
                    "Matched call has no transcript to verify the narrative against.",
                ));
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallRecord, Direction, NoteRecord, Transcript, TranscriptTurn};
    use noteguard_common::time::parse_utc_instant;

    fn call(start: &str, end: &str) -> CallRecord {
        CallRecord {
            call_id: "AC1".to_string(),
            phone_number_id: "PN1".to_string(),
            direction: Direction::Outgoing,
            counterparty_number: None,
            start_time: parse_utc_instant(start).unwrap(),
            end_time: parse_utc_instant(end).unwrap(),
            staff_name: None,
            board_id: None,
            transcript: None,
        }
    }

    fn remote_triple(
        call: Option<CallRecord>,
        transcript: Option<Transcript>,
        delta_minutes: Option<i64>,
    ) -> MatchedTriple {
        let mut note = NoteRecord::empty("1", "g");
        note.provided_as = Some("Direct Remote".to_string());
        MatchedTriple {
            note,
            call,
            transcript,
            delta_minutes,
        }
    }

    fn sample_transcript() -> Transcript {
        Transcript {
            conversation: vec![TranscriptTurn {
                speaker: "Client".to_string(),
                message: "Hello.".to_string(),
            }],
        }
    }

    #[test]
    fn test_in_person_is_good() {
        let mut triple = remote_triple(None, None, None);
        triple.note.provided_as = Some("Direct/In-Person".to_string());
        let outcome = mechanical_outcome(&triple, 5).unwrap();
        assert_eq!(outcome.severity, Severity::Good);
    }

    #[test]
    fn test_unmatched_remote_is_flagged() {
        let outcome = mechanical_outcome(&remote_triple(None, None, None), 5).unwrap();
        assert_eq!(outcome.severity, Severity::Flagged);
    }

    #[test]
    fn test_match_outside_band_is_flagged() {
        let triple = remote_triple(
            Some(call("2025-01-08T17:00:00Z", "2025-01-08T17:30:00Z")),
            Some(sample_transcript()),
            Some(12),
        );
        let outcome = mechanical_outcome(&triple, 5).unwrap();
        assert_eq!(outcome.severity, Severity::Flagged);
        assert!(outcome.reason.contains("12 minutes off"));
    }

    #[test]
    fn test_match_without_transcript_is_flagged() {
        let triple = remote_triple(
            Some(call("2025-01-08T17:00:00Z", "2025-01-08T17:30:00Z")),
            None,
            Some(1),
        );
        let outcome = mechanical_outcome(&triple, 5).unwrap();
        assert_eq!(outcome.severity, Severity::Flagged);
    }

    #[test]
    fn test_indirect_without_call_is_good() {
        let mut triple = remote_triple(None, None, None);
        triple.note.provided_as = Some("Indirect".to_string());
        let outcome = mechanical_outcome(&triple, 5).unwrap();
        assert_eq!(outcome.severity, Severity::Good);
        assert!(outcome.reason.contains("none required"));
    }

    #[test]
    fn test_indirect_match_without_transcript_is_good() {
        let mut triple = remote_triple(
            Some(call("2025-01-08T17:00:00Z", "2025-01-08T17:30:00Z")),
            None,
            Some(1),
        );
        triple.note.provided_as = Some("Indirect".to_string());
        assert_eq!(mechanical_outcome(&triple, 5).unwrap().severity, Severity::Good);
    }

    #[test]
    fn test_indirect_match_with_transcript_defers_to_judgment() {
        let mut triple = remote_triple(
            Some(call("2025-01-08T17:00:00Z", "2025-01-08T17:30:00Z")),
            Some(sample_transcript()),
            Some(1),
        );
        triple.note.provided_as = Some("Indirect".to_string());
        assert!(mechanical_outcome(&triple, 5).is_none());
    }

    #[tokio::test]
    async fn test_indirect_matched_transcript_gets_verified() {
        use crate::clients::judgment::{JudgmentApi, JudgmentRequest, NoteAnalysisEntry};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct FlaggingJudgment {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl JudgmentApi for FlaggingJudgment {
            async fn judge(
                &self,
                request: &JudgmentRequest,
            ) -> AuditResult<Vec<NoteAnalysisEntry>> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok((0..request.note_count)
                    .map(|index| NoteAnalysisEntry {
                        note_index: index,
                        severity: "Flagged".to_string(),
                        reason: "Narrative is not supported by the transcript.".to_string(),
                        improved_narrative: None,
                        units: None,
                    })
                    .collect())
            }
        }

        let mut triple = remote_triple(
            Some(call("2025-01-08T17:00:00Z", "2025-01-08T17:30:00Z")),
            Some(sample_transcript()),
            Some(1),
        );
        triple.note.provided_as = Some("Indirect".to_string());
        triple.note.narrative_text =
            Some("Reviewed the housing application with the client.".to_string());

        let judgment = Arc::new(FlaggingJudgment {
            calls: AtomicUsize::new(0),
        });
        let ctx = PassContext {
            judgment: judgment.clone(),
            passes: crate::config::PassesConfig::default(),
            judgment_delay: std::time::Duration::ZERO,
        };

        let mut batch = vec![triple];
        TranscriptPass.run(&mut batch, &ctx).await.unwrap();

        assert_eq!(judgment.calls.load(Ordering::SeqCst), 1);
        let outcome = &batch[0].note.annotations[KEY];
        assert_eq!(outcome.severity, Severity::Flagged);
    }

    #[test]
    fn test_close_match_with_transcript_defers_to_judgment() {
        // A call found within two minutes at both ends sits inside the band.
        let triple = remote_triple(
            Some(call("2025-01-08T17:13:40Z", "2025-01-08T19:19:00Z")),
            Some(sample_transcript()),
            Some(1),
        );
        assert!(mechanical_outcome(&triple, 5).is_none());
    }
}
