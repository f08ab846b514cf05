//! End-time plausibility pass
//!
//! The narrative update should land when the session ends. An update
//! created well after the recorded end time means the end was estimated,
//! not observed, so the billed duration is unreliable. The allowed lag is
//! the pass's configurable grace, zero by default.

use crate::audit::{AuditPass, PassContext};
use crate::config::{PassConfig, PassesConfig};
use crate::error::AuditResult;
use crate::types::{MatchedTriple, NoteRecord, PassOutcome, Severity};
use async_trait::async_trait;
use chrono::NaiveDateTime;

pub const KEY: &str = "end";

const DEFAULT_GRACE_MINUTES: i64 = 0;

pub struct EndTimePass;

#[async_trait]
impl AuditPass for EndTimePass {
    fn key(&self) -> &'static str {
        KEY
    }

    fn config<'a>(&self, passes: &'a PassesConfig) -> &'a PassConfig {
        &passes.end
    }

    async fn run(&self, batch: &mut [MatchedTriple], ctx: &PassContext) -> AuditResult<()> {
        let grace = self.config(&ctx.passes).threshold_or(DEFAULT_GRACE_MINUTES);
        for triple in batch.iter_mut() {
            let outcome = evaluate(&triple.note, grace);
            triple.note.annotate(KEY, outcome);
        }
        Ok(())
    }
}

/// The recorded session end as a civil datetime, rolled to the next day
/// when the end precedes the start (midnight-crossing sessions).
fn recorded_end(note: &NoteRecord) -> Option<NaiveDateTime> {
    let date = note.date?;
    let end = note.end_time?;
    let end_date = match note.start_time {
        Some(start) if end < start => date.succ_opt()?,
        _ => date,
    };
    Some(end_date.and_time(end))
}

fn evaluate(note: &NoteRecord, grace: i64) -> PassOutcome {
    let Some(end) = recorded_end(note) else {
        return PassOutcome::new(
            Severity::Flagged,
            "Recorded end time is missing; session end cannot be verified.",
        );
    };
    let Some(written) = note.update_creation_time else {
        return PassOutcome::new(
            Severity::Flagged,
            "Update creation time is missing; session end cannot be verified.",
        );
    };

    let lag = (written - end).num_minutes();
    if lag > grace {
        PassOutcome::new(
            Severity::Flagged,
            format!(
                "The update was created {} minutes after the recorded end time.",
                lag
            ),
        )
    } else {
        PassOutcome::new(
            Severity::Good,
            "The update was created by the recorded end time.",
        )
    }
}
