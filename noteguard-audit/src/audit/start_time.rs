//! Start-time plausibility pass
//!
//! A session note created long after its recorded start time suggests the
//! start was backdated rather than observed. This pass compares the item's
//! creation time against the recorded start; a lead beyond the configured
//! threshold flags the note. Purely mechanical, no judgment call involved.

use crate::audit::{AuditPass, PassContext};
use crate::config::{PassConfig, PassesConfig};
use crate::error::AuditResult;
use crate::types::{MatchedTriple, NoteRecord, PassOutcome, Severity};
use async_trait::async_trait;
use chrono::NaiveDateTime;

pub const KEY: &str = "start";

const DEFAULT_LEAD_MINUTES: i64 = 20;

pub struct StartTimePass;

#[async_trait]
impl AuditPass for StartTimePass {
    fn key(&self) -> &'static str {
        KEY
    }

    fn config<'a>(&self, passes: &'a PassesConfig) -> &'a PassConfig {
        &passes.start
    }

    async fn run(&self, batch: &mut [MatchedTriple], ctx: &PassContext) -> AuditResult<()> {
        let threshold = self.config(&ctx.passes).threshold_or(DEFAULT_LEAD_MINUTES);
        for triple in batch.iter_mut() {
            let outcome = evaluate(&triple.note, threshold);
            triple.note.annotate(KEY, outcome);
        }
        Ok(())
    }
}

fn recorded_start(note: &NoteRecord) -> Option<NaiveDateTime> {
    Some(note.date?.and_time(note.start_time?))
}

fn evaluate(note: &NoteRecord, threshold: i64) -> PassOutcome {
    let Some(start) = recorded_start(note) else {
        return PassOutcome::new(
            Severity::Flagged,
            "Recorded start time is missing; session start cannot be verified.",
        );
    };
    let Some(created) = note.session_creation_time else {
        return PassOutcome::new(
            Severity::Flagged,
            "Session creation time is missing; session start cannot be verified.",
        );
    };

    let lead = (created - start).num_minutes();
    if lead > threshold {
        PassOutcome::new(
            Severity::Flagged,
            format!(
                "The session was created {} minutes after the recorded start time.",
                lead
            ),
        )
    } else {
        PassOutcome::new(
            Severity::Good,
            format!(
                "The session was created within {} minutes of the recorded start time.",
                threshold
            ),
        )
    }
}
