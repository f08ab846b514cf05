//! Property tests for the audit passes, correlator, and reconciler.

mod common;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use common::{AllGoodJudgment, ScriptedJudgment};
use noteguard_audit::audit::{
    billing::BillingPass, columns::ColumnsPass, end_time::EndTimePass, service::ServicePass,
    start_time::StartTimePass, transcript::TranscriptPass, AuditPass, PassContext,
};
use noteguard_audit::clients::judgment::NoteAnalysisEntry;
use noteguard_audit::config::{PassesConfig, UnitsConfig};
use noteguard_audit::correlate::correlate;
use noteguard_audit::reconcile::reconcile_all;
use noteguard_audit::types::{
    CallRecord, Direction, MatchedTriple, NoteRecord, Severity,
};
use noteguard_common::time::{civil_to_instant, parse_utc_instant};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn chicago() -> Tz {
    "America/Chicago".parse().unwrap()
}

fn context(judgment: Arc<dyn noteguard_audit::clients::judgment::JudgmentApi>) -> PassContext {
    PassContext {
        judgment,
        passes: PassesConfig::default(),
        judgment_delay: Duration::ZERO,
    }
}

/// A complete note for 2025-01-08 with timestamps that evaluate Good in
/// every rule-based pass.
fn clean_note() -> NoteRecord {
    let date = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
    let mut note = NoteRecord::empty("8193469458", "Tony Holtgren 3/5/2025: MA");
    note.board_id = Some("8193469458".to_string());
    note.date = Some(date);
    note.start_time = NaiveTime::from_hms_opt(11, 14, 0);
    note.end_time = NaiveTime::from_hms_opt(13, 20, 35);
    note.session_creation_time =
        Some(date.and_time(NaiveTime::from_hms_opt(11, 20, 0).unwrap()));
    note.update_creation_time =
        Some(date.and_time(NaiveTime::from_hms_opt(13, 15, 0).unwrap()));
    note.manual_units = Some("8".to_string());
    note.service_type = Some("Housing Transition".to_string());
    note.provided_as = Some("Indirect".to_string());
    note.service_line =
        Some("Researching possible housing options for the person".to_string());
    note.session_status = Some("Completed".to_string());
    note.narrative_text = Some("Researched housing options for the client.".to_string());
    note
}

fn triple(note: NoteRecord) -> MatchedTriple {
    MatchedTriple {
        note,
        call: None,
        transcript: None,
        delta_minutes: None,
    }
}

// ============================================================================
// Commutativity
// ============================================================================

async fn run_in_order(
    order: &[&dyn AuditPass],
    ctx: &PassContext,
) -> BTreeMap<String, noteguard_audit::types::PassOutcome> {
    let mut batch = vec![triple(clean_note())];
    for pass in order {
        pass.run(&mut batch, ctx).await.unwrap();
    }
    batch.into_iter().next().unwrap().note.annotations
}

#[tokio::test]
async fn test_pass_order_does_not_change_annotations() {
    let ctx = context(Arc::new(AllGoodJudgment::new()));

    let forward: [&dyn AuditPass; 6] = [
        &TranscriptPass,
        &StartTimePass,
        &EndTimePass,
        &ServicePass,
        &BillingPass,
        &ColumnsPass,
    ];
    let reversed: [&dyn AuditPass; 6] = [
        &ColumnsPass,
        &BillingPass,
        &ServicePass,
        &EndTimePass,
        &StartTimePass,
        &TranscriptPass,
    ];

    let a = run_in_order(&forward, &ctx).await;
    let b = run_in_order(&reversed, &ctx).await;
    assert_eq!(a.len(), 6);
    assert_eq!(a, b);
}

// ============================================================================
// Worked examples
// ============================================================================

#[tokio::test]
async fn test_close_call_match_yields_transcript_good() {
    // Start 11:14:00 / end 13:20:35 with a call at 11:13:40 to 13:19:00,
    // within two minutes at both ends.
    let date = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
    let mut note = clean_note();
    note.provided_as = Some("Direct Remote".to_string());

    let call = CallRecord {
        call_id: "AC1".to_string(),
        phone_number_id: "PN1".to_string(),
        direction: Direction::Outgoing,
        counterparty_number: None,
        start_time: civil_to_instant(date, NaiveTime::from_hms_opt(11, 13, 40).unwrap(), chicago())
            .unwrap()
            .with_timezone(&chrono::Utc),
        end_time: civil_to_instant(date, NaiveTime::from_hms_opt(13, 19, 0).unwrap(), chicago())
            .unwrap()
            .with_timezone(&chrono::Utc),
        staff_name: Some("Tony Holtgren".to_string()),
        board_id: Some("8193469458".to_string()),
        transcript: Some(noteguard_audit::types::Transcript {
            conversation: vec![noteguard_audit::types::TranscriptTurn {
                speaker: "Client".to_string(),
                message: "About my housing search.".to_string(),
            }],
        }),
    };

    let mut batch = correlate(vec![note], &[call], chicago(), 60);
    assert!(batch[0].call.is_some());
    assert_eq!(batch[0].delta_minutes, Some(0));

    let ctx = context(Arc::new(AllGoodJudgment::new()));
    TranscriptPass.run(&mut batch, &ctx).await.unwrap();
    assert_eq!(
        batch[0].note.annotations["transcript"].severity,
        Severity::Good
    );
}

#[test]
fn test_null_units_note_reconciles_as_32_less() {
    let mut note = clean_note();
    note.manual_units = None;

    let summaries = reconcile_all(&[note], &UnitsConfig::default());
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].total_units, 0.0);
    assert_eq!(summaries[0].status, Severity::Flagged);
    assert_eq!(
        summaries[0].variance_reason,
        "There are 32.0 less units in total units than the hired units."
    );
}

#[tokio::test]
async fn test_24_minute_creation_lead_flags_start_pass() {
    // Session created 11:38:03 for an 11:14:00 start with a 20-minute
    // threshold.
    let date = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
    let mut note = clean_note();
    note.session_creation_time =
        Some(date.and_time(NaiveTime::from_hms_opt(11, 38, 3).unwrap()));

    let mut batch = vec![triple(note)];
    let ctx = context(Arc::new(AllGoodJudgment::new()));
    StartTimePass.run(&mut batch, &ctx).await.unwrap();

    let outcome = &batch[0].note.annotations["start"];
    assert_eq!(outcome.severity, Severity::Flagged);
    assert!(outcome.reason.contains("24 minutes after"));
}

#[tokio::test]
async fn test_sustaining_type_with_transition_narrative_flags_service_pass() {
    let mut note = clean_note();
    note.service_type = Some("Sustaining".to_string());
    note.service_line =
        Some("Supporting the person to apply for benefits to retain housing".to_string());
    note.narrative_text = Some(
        "Spent the session researching housing options and applying for Section 8."
            .to_string(),
    );

    let judgment = Arc::new(ScriptedJudgment {
        trigger: "covered pairing",
        entries: vec![NoteAnalysisEntry {
            note_index: 0,
            severity: "Flagged".to_string(),
            reason: "The narrative describes researching housing options and applying for \
                     Section 8, a Housing Transition covered service, not the declared \
                     Housing Sustaining service line."
                .to_string(),
            improved_narrative: None,
            units: None,
        }],
    });

    let mut batch = vec![triple(note)];
    let ctx = context(judgment);
    ServicePass.run(&mut batch, &ctx).await.unwrap();

    let outcome = &batch[0].note.annotations["service"];
    assert_eq!(outcome.severity, Severity::Flagged);
    assert!(outcome.reason.contains("Housing Transition"));
}

// ============================================================================
// Correlator determinism and aggregation idempotence
// ============================================================================

fn call_at(id: &str, start: &str, end: &str) -> CallRecord {
    CallRecord {
        call_id: id.to_string(),
        phone_number_id: "PN1".to_string(),
        direction: Direction::Outgoing,
        counterparty_number: None,
        start_time: parse_utc_instant(start).unwrap(),
        end_time: parse_utc_instant(end).unwrap(),
        staff_name: Some("Tony Holtgren".to_string()),
        board_id: Some("8193469458".to_string()),
        transcript: None,
    }
}

#[test]
fn test_correlator_is_input_order_independent() {
    let mut note = clean_note();
    note.provided_as = Some("Direct Remote".to_string());

    // Two candidates with equal deltas from the note start (17:14Z).
    let a = call_at("later", "2025-01-08T17:44:00Z", "2025-01-08T21:00:00Z");
    let b = call_at("earlier", "2025-01-08T16:44:00Z", "2025-01-08T21:00:00Z");

    let forward = correlate(vec![note.clone()], &[a.clone(), b.clone()], chicago(), 60);
    let backward = correlate(vec![note], &[b, a], chicago(), 60);

    assert_eq!(forward[0].call.as_ref().unwrap().call_id, "earlier");
    assert_eq!(
        forward[0].call.as_ref().unwrap().call_id,
        backward[0].call.as_ref().unwrap().call_id
    );
    assert_eq!(forward[0].delta_minutes, backward[0].delta_minutes);
}

#[test]
fn test_aggregation_never_depends_on_cached_totals() {
    let notes = vec![clean_note(), {
        let mut n = clean_note();
        n.note_id = "2".to_string();
        n.manual_units = Some("24".to_string());
        n
    }];

    let first = reconcile_all(&notes, &UnitsConfig::default());
    let second = reconcile_all(&notes, &UnitsConfig::default());
    assert_eq!(first, second);
    assert_eq!(first[0].total_units, 32.0);
    assert_eq!(first[0].status, Severity::Good);
}
