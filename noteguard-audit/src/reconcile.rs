//! Billed-unit reconciliation
//!
//! Sums the units billed across each staff member's notes for the period
//! and compares the total against that member's hired units. Summaries are
//! recomputed from scratch every run; re-running over the same notes always
//! yields the same summaries.

use crate::config::UnitsConfig;
use crate::types::{NoteRecord, PeriodUnitSummary, Severity};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Reconcile one group's notes against its hired units.
///
/// Unparsable or missing unit values contribute zero to the total. The
/// variance reason always states the difference to one decimal place.
pub fn reconcile(
    board_id: &str,
    period_identifier: &str,
    notes: &[&NoteRecord],
    hired_units: f64,
) -> PeriodUnitSummary {
    let total_units: f64 = notes
        .iter()
        .map(|note| match note.manual_units_value() {
            Some(units) => units,
            None => {
                if note.manual_units.is_some() {
                    warn!(note_id = %note.note_id, "unparsable units value; counted as zero");
                }
                0.0
            }
        })
        .sum();

    let (status, variance_reason) = if total_units < hired_units {
        (
            Severity::Flagged,
            format!(
                "There are {:.1} less units in total units than the hired units.",
                hired_units - total_units
            ),
        )
    } else if total_units > hired_units {
        (
            Severity::Flagged,
            format!(
                "There are {:.1} more units in total units than the hired units.",
                total_units - hired_units
            ),
        )
    } else {
        (
            Severity::Good,
            "The hired units match the daily total units.".to_string(),
        )
    };

    debug!(
        board_id,
        period_identifier, total_units, hired_units, "period reconciled"
    );
    PeriodUnitSummary {
        board_id: board_id.to_string(),
        period_identifier: period_identifier.to_string(),
        total_units,
        hired_units,
        status,
        variance_reason,
    }
}

/// Reconcile a full batch, one summary per group.
///
/// Notes without a board id cannot be attributed and are skipped with a
/// warning. Group iteration is ordered by group title so output order is
/// stable across runs.
pub fn reconcile_all(notes: &[NoteRecord], units: &UnitsConfig) -> Vec<PeriodUnitSummary> {
    let mut by_group: BTreeMap<&str, (&str, Vec<&NoteRecord>)> = BTreeMap::new();
    for note in notes {
        let Some(board_id) = note.board_id.as_deref() else {
            warn!(note_id = %note.note_id, "note has no board id; excluded from reconciliation");
            continue;
        };
        by_group
            .entry(note.group_title.as_str())
            .or_insert_with(|| (board_id, Vec::new()))
            .1
            .push(note);
    }

    by_group
        .iter()
        .map(|(group_title, (board_id, group_notes))| {
            reconcile(
                board_id,
                group_title,
                group_notes,
                units.hired_units_for(group_title),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, group: &str, board_id: &str, units: Option<&str>) -> NoteRecord {
        let mut n = NoteRecord::empty(id, group);
        n.board_id = Some(board_id.to_string());
        n.manual_units = units.map(String::from);
        n
    }

    #[test]
    fn test_under_hired_units_flagged_with_exact_wording() {
        let notes = [
            note("1", "g", "b", Some("8")),
            note("2", "g", "b", Some("12.5")),
        ];
        let refs: Vec<&NoteRecord> = notes.iter().collect();
        let summary = reconcile("b", "g", &refs, 32.0);

        assert_eq!(summary.total_units, 20.5);
        assert_eq!(summary.status, Severity::Flagged);
        assert_eq!(
            summary.variance_reason,
            "There are 11.5 less units in total units than the hired units."
        );
    }

    #[test]
    fn test_over_hired_units_flagged() {
        let notes = [note("1", "g", "b", Some("40"))];
        let refs: Vec<&NoteRecord> = notes.iter().collect();
        let summary = reconcile("b", "g", &refs, 32.0);

        assert_eq!(summary.status, Severity::Flagged);
        assert_eq!(
            summary.variance_reason,
            "There are 8.0 more units in total units than the hired units."
        );
    }

    #[test]
    fn test_exact_match_is_good() {
        let notes = [
            note("1", "g", "b", Some("\"16\"")),
            note("2", "g", "b", Some("16")),
        ];
        let refs: Vec<&NoteRecord> = notes.iter().collect();
        let summary = reconcile("b", "g", &refs, 32.0);

        assert_eq!(summary.status, Severity::Good);
        assert_eq!(
            summary.variance_reason,
            "The hired units match the daily total units."
        );
    }

    #[test]
    fn test_unparsable_units_count_as_zero() {
        let notes = [
            note("1", "g", "b", Some("eight")),
            note("2", "g", "b", None),
            note("3", "g", "b", Some("32")),
        ];
        let refs: Vec<&NoteRecord> = notes.iter().collect();
        let summary = reconcile("b", "g", &refs, 32.0);
        assert_eq!(summary.status, Severity::Good);
    }

    #[test]
    fn test_reconcile_all_groups_and_ordering() {
        let units = UnitsConfig::default();
        let notes = vec![
            note("1", "Tony Holtgren 3/5/2025: MA", "b1", Some("32")),
            note("2", "Dana Reyes 1/2/2025: MA", "b2", Some("10")),
            {
                let mut n = note("3", "Orphan", "", Some("5"));
                n.board_id = None;
                n
            },
        ];

        let summaries = reconcile_all(&notes, &units);
        assert_eq!(summaries.len(), 2);
        // BTreeMap ordering: Dana before Tony.
        assert_eq!(summaries[0].period_identifier, "Dana Reyes 1/2/2025: MA");
        assert_eq!(summaries[0].status, Severity::Flagged);
        assert_eq!(summaries[1].status, Severity::Good);
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let units = UnitsConfig::default();
        let notes = vec![note("1", "g", "b", Some("20"))];
        assert_eq!(reconcile_all(&notes, &units), reconcile_all(&notes, &units));
    }
}
