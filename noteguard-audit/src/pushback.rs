//! Board push-back
//!
//! Writes each note's audit annotations back to the results board as
//! severity/reason column pairs. Status columns take a label index, not the
//! label itself, so the label maps live here. A column that fails to write
//! is logged and skipped; push-back never aborts a run.

use crate::clients::board::BoardApi;
use crate::types::{NoteRecord, PeriodUnitSummary, Severity};
use tracing::{info, warn};

// Status-column indexes on the results board.
const SEVERITY_INDEX_GOOD: &str = "2";
const SEVERITY_INDEX_FLAGGED: &str = "0";

/// Column ids for one pass's severity/reason pair.
struct PassColumns {
    pass_key: &'static str,
    severity_column: &'static str,
    reason_column: &'static str,
}

const PASS_COLUMNS: &[PassColumns] = &[
    PassColumns {
        pass_key: "transcript",
        severity_column: "transcript_severity",
        reason_column: "transcript_reason",
    },
    PassColumns {
        pass_key: "start",
        severity_column: "start_severity",
        reason_column: "start_reason",
    },
    PassColumns {
        pass_key: "end",
        severity_column: "end_severity",
        reason_column: "end_reason",
    },
    PassColumns {
        pass_key: "service",
        severity_column: "service_severity",
        reason_column: "service_reason",
    },
    PassColumns {
        pass_key: "billing",
        severity_column: "billing_severity",
        reason_column: "billing_reason",
    },
    PassColumns {
        pass_key: "columns",
        severity_column: "columns_severity",
        reason_column: "columns_reason",
    },
];

const IMPROVED_NARRATIVE_COLUMN: &str = "billing_improved";
const UNITS_STATUS_COLUMN: &str = "units_status";
const UNITS_REASON_COLUMN: &str = "units_reason";

fn severity_index(severity: Severity) -> &'static str {
    match severity {
        Severity::Good => SEVERITY_INDEX_GOOD,
        Severity::Flagged => SEVERITY_INDEX_FLAGGED,
    }
}

/// Push one note's annotations to its board item.
///
/// Returns the number of columns written. Each column write is independent;
/// a failure costs that column only.
pub async fn push_note(board: &dyn BoardApi, board_id: &str, note: &NoteRecord) -> usize {
    let mut written = 0;
    for columns in PASS_COLUMNS {
        let Some(outcome) = note.annotations.get(columns.pass_key) else {
            continue;
        };

        written += write_column(
            board,
            board_id,
            &note.note_id,
            columns.severity_column,
            severity_index(outcome.severity),
        )
        .await;
        written += write_column(
            board,
            board_id,
            &note.note_id,
            columns.reason_column,
            &outcome.reason,
        )
        .await;
        if let Some(improved) = &outcome.improved_narrative {
            written += write_column(
                board,
                board_id,
                &note.note_id,
                IMPROVED_NARRATIVE_COLUMN,
                improved,
            )
            .await;
        }
    }

    info!(note_id = %note.note_id, columns_written = written, "annotations pushed");
    written
}

/// Push a period summary's status and variance reason to its board item.
pub async fn push_summary(
    board: &dyn BoardApi,
    board_id: &str,
    item_id: &str,
    summary: &PeriodUnitSummary,
) -> usize {
    let mut written = write_column(
        board,
        board_id,
        item_id,
        UNITS_STATUS_COLUMN,
        severity_index(summary.status),
    )
    .await;
    written += write_column(
        board,
        board_id,
        item_id,
        UNITS_REASON_COLUMN,
        &summary.variance_reason,
    )
    .await;
    written
}

async fn write_column(
    board: &dyn BoardApi,
    board_id: &str,
    item_id: &str,
    column_id: &str,
    value: &str,
) -> usize {
    match board.write_column_value(item_id, board_id, column_id, value).await {
        Ok(()) => 1,
        Err(e) => {
            warn!(item_id, column_id, error = %e, "column write failed; skipped");
            0
        }
    }
}
