//! Session note extraction
//!
//! Flattens raw board items into `NoteRecord`s. Column values are addressed
//! by title so column reordering on the board never breaks extraction. Every
//! field degrades independently: a malformed date column costs that one
//! field, never the record.

use crate::clients::board::{RawItem, RawUpdate};
use crate::types::NoteRecord;
use chrono::NaiveDate;
use chrono_tz::Tz;
use noteguard_common::time;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

// Column titles as they appear on the board.
const COL_DATE: &str = "Date";
const COL_START: &str = "Start Time";
const COL_END: &str = "End Time";
const COL_MANUAL_UNITS: &str = "Manual units";
const COL_AUTO_UNITS: &str = "Units";
const COL_SERVICE_TYPE: &str = "Service Type";
const COL_PROVIDED_AS: &str = "Provided As";
const COL_SERVICE_LINE: &str = "Service Line";
const COL_SESSION_STATUS: &str = "Session Status";

/// Flatten one board item into a note record.
///
/// Update-derived instants arrive in UTC and are converted to civil
/// wall-clock time in the reporting zone before storage, so every
/// downstream comparison happens in one zone.
pub fn extract_note(item: &RawItem, zone: Tz) -> NoteRecord {
    let group_title = item.group_title.clone().unwrap_or_default();
    let mut note = NoteRecord::empty(item.id.clone(), group_title);
    note.note_name = item.name.clone();

    let columns: HashMap<&str, &crate::clients::board::RawColumnValue> = item
        .column_values
        .iter()
        .map(|c| (c.title.as_str(), c))
        .collect();

    note.date = nested_value(&columns, COL_DATE, "date")
        .and_then(|s| ok_or_warn(&note.note_id, COL_DATE, time::parse_civil_date(&s)));
    note.start_time = nested_value(&columns, COL_START, "time")
        .and_then(|s| ok_or_warn(&note.note_id, COL_START, time::parse_civil_time(&s)));
    note.end_time = nested_value(&columns, COL_END, "time")
        .and_then(|s| ok_or_warn(&note.note_id, COL_END, time::parse_civil_time(&s)));

    note.manual_units = columns
        .get(COL_MANUAL_UNITS)
        .and_then(|c| c.value.clone())
        .or_else(|| columns.get(COL_AUTO_UNITS).and_then(|c| c.value.clone()));
    note.auto_units = columns.get(COL_AUTO_UNITS).and_then(|c| c.text.clone());

    note.service_type = label(&columns, COL_SERVICE_TYPE);
    note.provided_as = label(&columns, COL_PROVIDED_AS);
    note.service_line = label(&columns, COL_SERVICE_LINE);
    note.session_status = label(&columns, COL_SESSION_STATUS);

    // Updates arrive oldest-first. The narrative is the latest text; the
    // session was created when the first update landed.
    note.narrative_text = item
        .updates
        .iter()
        .rev()
        .find_map(|u| u.text_body.clone().filter(|t| !t.trim().is_empty()));
    note.session_creation_time = update_civil_time(item.updates.first(), zone);
    note.update_creation_time = update_civil_time(item.updates.last(), zone);

    debug!(
        note_id = %note.note_id,
        has_date = note.date.is_some(),
        has_narrative = note.narrative_text.is_some(),
        "note extracted"
    );
    note
}

/// Extract a batch, preserving input order.
pub fn extract_notes(items: &[RawItem], zone: Tz) -> Vec<NoteRecord> {
    items.iter().map(|item| extract_note(item, zone)).collect()
}

/// Keep only notes dated on the target day. Undated notes are excluded and
/// logged; they cannot be audited against calls.
pub fn filter_by_date(notes: Vec<NoteRecord>, target: NaiveDate) -> Vec<NoteRecord> {
    notes
        .into_iter()
        .filter(|note| match note.date {
            Some(d) => d == target,
            None => {
                warn!(note_id = %note.note_id, "note has no date; excluded from run");
                false
            }
        })
        .collect()
}

/// Pull `key` out of a column's JSON-encoded `value` payload.
///
/// Date and time columns store their value as a JSON string like
/// `{"date": "2025-01-08", "time": "17:13:40"}`.
fn nested_value(
    columns: &HashMap<&str, &crate::clients::board::RawColumnValue>,
    title: &str,
    key: &str,
) -> Option<String> {
    let raw = columns.get(title)?.value.as_deref()?;
    let parsed: Value = serde_json::from_str(raw).ok()?;
    parsed[key].as_str().map(String::from)
}

/// Status columns carry their display label in `text`.
fn label(
    columns: &HashMap<&str, &crate::clients::board::RawColumnValue>,
    title: &str,
) -> Option<String> {
    columns
        .get(title)
        .and_then(|c| c.text.clone())
        .filter(|t| !t.trim().is_empty())
}

fn update_civil_time(update: Option<&RawUpdate>, zone: Tz) -> Option<chrono::NaiveDateTime> {
    let raw = update?.created_at.as_deref()?;
    match time::parse_utc_instant(raw) {
        Ok(instant) => {
            // The civil date comes from the converted instant, so an update
            // landing after midnight UTC stays on the local day.
            let (date, time_of_day) = time::civil_fields(&time::utc_to_civil(instant, zone));
            Some(date.and_time(time_of_day))
        }
        Err(e) => {
            warn!(raw, error = %e, "unparsable update timestamp");
            None
        }
    }
}

fn ok_or_warn<T>(note_id: &str, column: &str, result: noteguard_common::Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(note_id, column, error = %e, "malformed column value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::board::RawColumnValue;
    use chrono::{NaiveTime, Timelike};

    fn col(title: &str, value: Option<&str>, text: Option<&str>) -> RawColumnValue {
        RawColumnValue {
            title: title.to_string(),
            value: value.map(String::from),
            text: text.map(String::from),
        }
    }

    fn update(id: &str, body: Option<&str>, created: &str) -> RawUpdate {
        RawUpdate {
            id: id.to_string(),
            text_body: body.map(String::from),
            created_at: Some(created.to_string()),
            updated_at: None,
        }
    }

    fn chicago() -> Tz {
        "America/Chicago".parse().unwrap()
    }

    fn fixture_item() -> RawItem {
        RawItem {
            id: "8193469458".to_string(),
            name: Some("Session note".to_string()),
            group_title: Some("Tony Holtgren 3/5/2025: MA".to_string()),
            updates: vec![
                update("u1", Some("Initial draft."), "2025-01-08T22:00:00Z"),
                update(
                    "u2",
                    Some("Met with client to review housing application."),
                    "2025-01-09T03:15:00Z",
                ),
            ],
            column_values: vec![
                col(COL_DATE, Some(r#"{"date":"2025-01-08"}"#), None),
                col(COL_START, Some(r#"{"time":"11:13:40"}"#), None),
                col(COL_END, Some(r#"{"time":"13:19:00"}"#), None),
                col(COL_MANUAL_UNITS, Some(r#""8""#), None),
                col(COL_AUTO_UNITS, Some("8"), Some("8")),
                col(COL_SERVICE_TYPE, None, Some("Housing Transition")),
                col(COL_PROVIDED_AS, None, Some("Direct Remote")),
                col(COL_SESSION_STATUS, None, Some("Completed")),
            ],
        }
    }

    #[test]
    fn test_extract_full_item() {
        let note = extract_note(&fixture_item(), chicago());
        assert_eq!(note.note_id, "8193469458");
        assert_eq!(note.group_title, "Tony Holtgren 3/5/2025: MA");
        assert_eq!(note.date, Some(NaiveDate::from_ymd_opt(2025, 1, 8).unwrap()));
        assert_eq!(
            note.start_time,
            Some(NaiveTime::from_hms_opt(11, 13, 40).unwrap())
        );
        assert_eq!(note.manual_units.as_deref(), Some(r#""8""#));
        assert_eq!(note.manual_units_value(), Some(8.0));
        assert_eq!(note.service_type.as_deref(), Some("Housing Transition"));
        assert_eq!(
            note.narrative_text.as_deref(),
            Some("Met with client to review housing application.")
        );
    }

    #[test]
    fn test_update_times_convert_to_civil_zone() {
        let note = extract_note(&fixture_item(), chicago());
        // 22:00Z on Jan 8 is 16:00 in Chicago; 03:15Z on Jan 9 is 21:15 Jan 8.
        let created = note.session_creation_time.unwrap();
        assert_eq!(created.date(), NaiveDate::from_ymd_opt(2025, 1, 8).unwrap());
        assert_eq!(created.time().hour(), 16);

        let updated = note.update_creation_time.unwrap();
        assert_eq!(updated.date(), NaiveDate::from_ymd_opt(2025, 1, 8).unwrap());
        assert_eq!(updated.time().hour(), 21);
    }

    #[test]
    fn test_malformed_columns_degrade_to_none() {
        let mut item = fixture_item();
        item.column_values = vec![
            col(COL_DATE, Some("not json"), None),
            col(COL_START, Some(r#"{"time":"25:99:00"}"#), None),
        ];
        item.updates.clear();

        let note = extract_note(&item, chicago());
        assert!(note.date.is_none());
        assert!(note.start_time.is_none());
        assert!(note.narrative_text.is_none());
        assert!(note.session_creation_time.is_none());
        assert_eq!(note.note_id, "8193469458");
    }

    #[test]
    fn test_manual_units_falls_back_to_auto_column() {
        let mut item = fixture_item();
        item.column_values.retain(|c| c.title != COL_MANUAL_UNITS);
        let note = extract_note(&item, chicago());
        assert_eq!(note.manual_units_value(), Some(8.0));
    }

    #[test]
    fn test_narrative_skips_empty_trailing_update() {
        let mut item = fixture_item();
        item.updates.push(update("u3", Some("   "), "2025-01-09T04:00:00Z"));
        let note = extract_note(&item, chicago());
        assert_eq!(
            note.narrative_text.as_deref(),
            Some("Met with client to review housing application.")
        );
    }

    #[test]
    fn test_filter_by_date() {
        let zone = chicago();
        let on_date = extract_note(&fixture_item(), zone);
        let mut other = extract_note(&fixture_item(), zone);
        other.date = Some(NaiveDate::from_ymd_opt(2025, 1, 9).unwrap());
        let mut undated = extract_note(&fixture_item(), zone);
        undated.date = None;

        let kept = filter_by_date(
            vec![on_date, other, undated],
            NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
        );
        assert_eq!(kept.len(), 1);
    }
}
