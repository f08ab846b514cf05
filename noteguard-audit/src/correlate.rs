//! Note-to-call correlation
//!
//! For each remote session note, finds the call that best accounts for it.
//! Matching is deterministic: candidates are the staff member's own calls,
//! the score is the smaller of the start-to-start and end-to-end distances,
//! and ties break on the earliest call start. In-person notes are trivially
//! matched since no call should exist for them.

use crate::types::{CallRecord, Direction, MatchedTriple, Modality, NoteRecord};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use noteguard_common::time;
use tracing::{debug, warn};

/// Correlate a batch of notes against a batch of calls.
///
/// Output order follows input note order. Each call may back any number of
/// notes; correlation never consumes a call.
pub fn correlate(
    notes: Vec<NoteRecord>,
    calls: &[CallRecord],
    zone: Tz,
    tolerance_minutes: i64,
) -> Vec<MatchedTriple> {
    notes
        .into_iter()
        .map(|note| correlate_one(note, calls, zone, tolerance_minutes))
        .collect()
}

fn correlate_one(
    note: NoteRecord,
    calls: &[CallRecord],
    zone: Tz,
    tolerance_minutes: i64,
) -> MatchedTriple {
    // In-person sessions have no telephony counterpart by definition.
    if note.modality() == Some(Modality::InPerson) {
        return MatchedTriple {
            note,
            call: None,
            transcript: None,
            delta_minutes: None,
        };
    }

    let Some((note_start, note_end)) = note_instants(&note, zone) else {
        warn!(note_id = %note.note_id, "note times unusable; left unmatched");
        return MatchedTriple {
            note,
            call: None,
            transcript: None,
            delta_minutes: None,
        };
    };

    let mut best: Option<(&CallRecord, i64)> = None;
    for call in calls {
        if !belongs_to_staff(&note, call) {
            continue;
        }
        if !direction_consistent(note.modality(), call.direction) {
            continue;
        }
        let delta = call_delta(&note_start, &note_end, call);
        if delta > tolerance_minutes {
            continue;
        }
        best = match best {
            None => Some((call, delta)),
            Some((current, current_delta)) => {
                if delta < current_delta
                    || (delta == current_delta && call.start_time < current.start_time)
                {
                    Some((call, delta))
                } else {
                    Some((current, current_delta))
                }
            }
        };
    }

    match best {
        Some((call, delta)) => {
            debug!(note_id = %note.note_id, call_id = %call.call_id, delta_minutes = delta, "note matched");
            MatchedTriple {
                note,
                transcript: call.transcript.clone(),
                call: Some(call.clone()),
                delta_minutes: Some(delta),
            }
        }
        None => {
            debug!(note_id = %note.note_id, "no call within tolerance");
            MatchedTriple {
                note,
                call: None,
                transcript: None,
                delta_minutes: None,
            }
        }
    }
}

/// A candidate call's direction must fit the session's modality. Indirect
/// work is done on the client's behalf, on calls the staff member places;
/// a remote session with the client may be placed or received. Unknown
/// modality admits both directions.
fn direction_consistent(modality: Option<Modality>, direction: Direction) -> bool {
    match modality {
        Some(Modality::Indirect) => direction == Direction::Outgoing,
        _ => true,
    }
}

/// Note and call must belong to the same staff member. Calls are enriched
/// with identity before correlation; an unenriched call matches nothing.
fn belongs_to_staff(note: &NoteRecord, call: &CallRecord) -> bool {
    match (&note.board_id, &call.board_id) {
        (Some(n), Some(c)) if n == c => return true,
        (Some(_), Some(_)) => return false,
        _ => {}
    }
    matches!((&note.staff_name, &call.staff_name), (Some(n), Some(c)) if n == c)
}

/// The note's civil start and end as UTC instants, end rolled to the next
/// day when it precedes the start (sessions crossing midnight).
fn note_instants(note: &NoteRecord, zone: Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let date = note.date?;
    let start = note.start_time?;
    let end = note.end_time?;

    let end_date = if end < start {
        date.succ_opt()?
    } else {
        date
    };

    let start_instant = time::civil_to_instant(date, start, zone).ok()?;
    let end_instant = time::civil_to_instant(end_date, end, zone).ok()?;
    Some((
        start_instant.with_timezone(&Utc),
        end_instant.with_timezone(&Utc),
    ))
}

fn call_delta(note_start: &DateTime<Utc>, note_end: &DateTime<Utc>, call: &CallRecord) -> i64 {
    let start_delta = time::abs_delta_minutes(note_start, &call.start_time);
    let end_delta = time::abs_delta_minutes(note_end, &call.end_time);
    start_delta.min(end_delta)
}
