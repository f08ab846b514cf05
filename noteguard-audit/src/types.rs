//! Core record types for the audit pipeline
//!
//! All records are produced and owned by a single pipeline run. Identity
//! fields are immutable once a record is materialized; enrichment fields
//! (transcripts, annotations) are filled in as later stages settle.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Identity / reference records
// ============================================================================

/// One row of the staff reference directory.
///
/// `phone_number` is unique per staff member; `board_id` is the correlation
/// key to all of that member's session notes. Reference data is loaded once
/// per run and read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffRecord {
    pub staff_name: String,
    pub phone_number: String,
    pub board_id: String,
    pub work_item_id: String,
    /// Group on the results board this member's audit rows land in.
    pub board_group_id: Option<String>,
}

/// Resolved identity for one staff member, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffIdentity {
    pub staff_name: String,
    pub board_id: String,
    /// Telephony-provider id for this member's line, when one exists.
    pub phone_number_id: Option<String>,
}

// ============================================================================
// Call records
// ============================================================================

/// Call direction as reported by the telephony provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// One call from the telephony provider.
///
/// Identity fields are immutable; `transcript` and the staff enrichment
/// fields are attached in place as later stages run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub phone_number_id: String,
    pub direction: Direction,
    pub counterparty_number: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Filled by identity enrichment.
    pub staff_name: Option<String>,
    pub board_id: Option<String>,
    /// Lazily attached once retrieved; absence is not an error.
    pub transcript: Option<Transcript>,
}

/// A speaker-normalized call transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub conversation: Vec<TranscriptTurn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    /// "Staff Member" or "Client" after speaker normalization.
    pub speaker: String,
    pub message: String,
}

// ============================================================================
// Note records
// ============================================================================

/// Service modality, parsed from the board's `Provided As` label.
///
/// Determines whether call correlation applies at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modality {
    InPerson,
    Indirect,
    DirectRemote,
}

impl Modality {
    /// Parse the label vocabulary the board has used across its history.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "direct/in-person" | "direct/in person" | "in-person" | "in person" | "direct" => {
                Some(Modality::InPerson)
            }
            "indirect" | "indirect remote" => Some(Modality::Indirect),
            "direct remote" | "direct/remote" => Some(Modality::DirectRemote),
            _ => None,
        }
    }
}

/// Audit outcome severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Good,
    Flagged,
}

/// One audit pass's annotation on a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassOutcome {
    pub severity: Severity,
    pub reason: String,
    /// Rewritten narrative suggested by the billing pass; `None` elsewhere
    /// and when the note is Good ("not required").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_narrative: Option<String>,
}

impl PassOutcome {
    pub fn new(severity: Severity, reason: impl Into<String>) -> Self {
        Self {
            severity,
            reason: reason.into(),
            improved_narrative: None,
        }
    }
}

/// A flattened session note extracted from one board item.
///
/// `note_id` and `group_title` are always present; every other field
/// degrades to `None` when the source column is absent or malformed.
/// Annotations accumulate one entry per audit pass, keyed by pass name;
/// no pass ever touches another pass's key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRecord {
    pub note_id: String,
    pub note_name: Option<String>,
    pub staff_name: Option<String>,
    pub board_id: Option<String>,
    pub group_title: String,
    /// Civil wall-clock values in the reporting zone.
    pub session_creation_time: Option<NaiveDateTime>,
    pub update_creation_time: Option<NaiveDateTime>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    /// Raw column value; may arrive as a quoted numeric string.
    pub manual_units: Option<String>,
    pub auto_units: Option<String>,
    pub service_type: Option<String>,
    pub provided_as: Option<String>,
    pub service_line: Option<String>,
    pub session_status: Option<String>,
    pub narrative_text: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, PassOutcome>,
}

impl NoteRecord {
    /// Minimal record: stable id and group title, everything else unset.
    pub fn empty(note_id: impl Into<String>, group_title: impl Into<String>) -> Self {
        Self {
            note_id: note_id.into(),
            note_name: None,
            staff_name: None,
            board_id: None,
            group_title: group_title.into(),
            session_creation_time: None,
            update_creation_time: None,
            date: None,
            start_time: None,
            end_time: None,
            manual_units: None,
            auto_units: None,
            service_type: None,
            provided_as: None,
            service_line: None,
            session_status: None,
            narrative_text: None,
            annotations: BTreeMap::new(),
        }
    }

    /// Parsed service modality, if the label is recognized.
    pub fn modality(&self) -> Option<Modality> {
        self.provided_as.as_deref().and_then(Modality::parse)
    }

    /// Billed units as a number, coercing quoted numeric strings.
    ///
    /// Null and unparsable values yield `None`; aggregation treats those as
    /// a zero contribution.
    pub fn manual_units_value(&self) -> Option<f64> {
        let raw = self.manual_units.as_deref()?;
        raw.trim().trim_matches('"').parse::<f64>().ok()
    }

    /// Record one pass's outcome under its own key.
    ///
    /// Re-running a pass overwrites that pass's entry deterministically and
    /// leaves every other key untouched.
    pub fn annotate(&mut self, pass_key: &str, outcome: PassOutcome) {
        self.annotations.insert(pass_key.to_string(), outcome);
    }
}

// ============================================================================
// Derived records
// ============================================================================

/// Correlation result for one note.
#[derive(Debug, Clone)]
pub struct MatchedTriple {
    pub note: NoteRecord,
    /// The winning candidate call, if any fell within tolerance.
    pub call: Option<CallRecord>,
    /// Transcript of the matched call, passed through for the sequencer.
    pub transcript: Option<Transcript>,
    /// Winning |delta| in minutes; `None` when unmatched or trivially
    /// matched (in-person).
    pub delta_minutes: Option<i64>,
}

/// Billed-unit reconciliation for one reporting period.
///
/// Recomputed in full on every run; never patched incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodUnitSummary {
    pub board_id: String,
    pub period_identifier: String,
    pub total_units: f64,
    pub hired_units: f64,
    pub status: Severity,
    pub variance_reason: String,
}
