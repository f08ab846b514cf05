//! Pipeline orchestration
//!
//! Drives one full audit run: reference resolution, board and telephony
//! fetch, extraction, correlation, the audit pass sequence, reconciliation,
//! and push-back. Every stage is skip-and-continue: a failed fetch costs
//! its records and is counted in the run summary, never the run. Unit
//! aggregation only starts after the pass sequence has fully settled.

use crate::audit::{PassContext, Sequencer};
use crate::clients::board::{tag_items_with_groups, BoardApi, FetchOutcome};
use crate::clients::judgment::JudgmentApi;
use crate::clients::telephony::{normalize_transcript, TelephonyApi};
use crate::config::AuditConfig;
use crate::correlate::correlate;
use crate::error::AuditResult;
use crate::extract::{extract_notes, filter_by_date};
use crate::identity::{resolve_groups, resolve_identities, staff_numbers};
use crate::pushback::{push_note, push_summary};
use crate::reconcile::reconcile_all;
use crate::types::{CallRecord, NoteRecord, PeriodUnitSummary, Severity, StaffRecord};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// End-of-run accounting, logged and returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub target_date: NaiveDate,
    pub staff_count: usize,
    pub notes_fetched: usize,
    pub notes_in_scope: usize,
    pub calls_fetched: usize,
    pub transcripts_fetched: usize,
    pub notes_matched: usize,
    pub notes_flagged: usize,
    pub passes_completed: usize,
    pub abandoned_batches: usize,
    pub columns_written: usize,
}

/// Everything one run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub notes: Vec<NoteRecord>,
    pub summaries: Vec<PeriodUnitSummary>,
    pub summary: RunSummary,
}

pub struct Pipeline {
    board: Arc<dyn BoardApi>,
    telephony: Arc<dyn TelephonyApi>,
    judgment: Arc<dyn JudgmentApi>,
    config: AuditConfig,
}

impl Pipeline {
    pub fn new(
        board: Arc<dyn BoardApi>,
        telephony: Arc<dyn TelephonyApi>,
        judgment: Arc<dyn JudgmentApi>,
        config: AuditConfig,
    ) -> Self {
        Self {
            board,
            telephony,
            judgment,
            config,
        }
    }

    /// The civil date this run audits.
    fn target_date(&self, zone: chrono_tz::Tz) -> NaiveDate {
        Utc::now().with_timezone(&zone).date_naive()
            - ChronoDuration::days(self.config.run.target_date_offset_days)
    }

    /// Run the full audit over the given staff roster.
    pub async fn run(&self, staff: &[StaffRecord]) -> AuditResult<RunOutcome> {
        let zone = self.config.timezone()?;
        let target_date = self.target_date(zone);
        let run_id = Uuid::new_v4();
        info!(%run_id, %target_date, staff_count = staff.len(), "audit run started");

        // Reference resolution.
        let lines = match self.telephony.fetch_phone_lines().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "phone line listing failed; calls unavailable this run");
                Vec::new()
            }
        };
        let identities = resolve_identities(staff, &lines);
        let numbers = staff_numbers(staff);

        // Board fetch.
        let groups = match self.board.fetch_groups(self.config.run.source_board_id).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "group fetch failed; no notes this run");
                Vec::new()
            }
        };
        let group_by_staff = resolve_groups(staff, &groups);
        let item_ids: Vec<String> = group_by_staff
            .values()
            .flat_map(|g| g.item_ids.iter().cloned())
            .collect();

        let mut fetched = match self.board.fetch_item_details(&item_ids).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "item detail fetch failed; no notes this run");
                FetchOutcome {
                    items: Vec::new(),
                    requested: item_ids.len(),
                    retrieved: 0,
                    abandoned_batches: 0,
                }
            }
        };

        // Extraction and scoping.
        tag_items_with_groups(&mut fetched.items, &groups);
        let mut notes = extract_notes(&fetched.items, zone);
        let notes_fetched = notes.len();
        for note in &mut notes {
            if let Some(member) = staff
                .iter()
                .find(|m| note.group_title.starts_with(m.staff_name.as_str()))
            {
                note.staff_name = Some(member.staff_name.clone());
                note.board_id = Some(member.board_id.clone());
            }
        }
        let notes = filter_by_date(notes, target_date);
        let notes_in_scope = notes.len();

        // Telephony fetch and enrichment.
        let mut calls = self.fetch_calls(&identities).await;
        let transcripts_fetched = self.attach_transcripts(&mut calls, &numbers).await;

        // Correlation then the pass sequence.
        let mut batch = correlate(
            notes,
            &calls,
            zone,
            self.config.correlation.tolerance_minutes,
        );
        let notes_matched = batch.iter().filter(|t| t.call.is_some()).count();

        let ctx = PassContext {
            judgment: self.judgment.clone(),
            passes: self.config.passes.clone(),
            judgment_delay: Duration::from_secs_f64(self.config.run.judgment_delay_secs),
        };
        let passes_completed = Sequencer::standard().run_all(&mut batch, &ctx).await;

        // Every pass has settled; aggregation may begin.
        let notes: Vec<NoteRecord> = batch.into_iter().map(|t| t.note).collect();
        let summaries = reconcile_all(&notes, &self.config.units);
        let notes_flagged = notes
            .iter()
            .filter(|n| n.annotations.values().any(|o| o.severity == Severity::Flagged))
            .count();

        let columns_written = self.push_results(staff, &notes, &summaries).await;

        let summary = RunSummary {
            run_id,
            target_date,
            staff_count: staff.len(),
            notes_fetched,
            notes_in_scope,
            calls_fetched: calls.len(),
            transcripts_fetched,
            notes_matched,
            notes_flagged,
            passes_completed,
            abandoned_batches: fetched.abandoned_batches,
            columns_written,
        };
        info!(
            %run_id,
            notes_in_scope = summary.notes_in_scope,
            notes_matched = summary.notes_matched,
            notes_flagged = summary.notes_flagged,
            passes_completed = summary.passes_completed,
            columns_written = summary.columns_written,
            "audit run finished"
        );

        Ok(RunOutcome {
            notes,
            summaries,
            summary,
        })
    }

    async fn fetch_calls(
        &self,
        identities: &std::collections::HashMap<String, crate::types::StaffIdentity>,
    ) -> Vec<CallRecord> {
        let mut calls = Vec::new();
        for identity in identities.values() {
            let Some(phone_number_id) = identity.phone_number_id.as_deref() else {
                continue;
            };
            match self.telephony.fetch_calls(phone_number_id, None).await {
                Ok(mut fetched) => {
                    for call in &mut fetched {
                        call.staff_name = Some(identity.staff_name.clone());
                        call.board_id = Some(identity.board_id.clone());
                    }
                    calls.extend(fetched);
                }
                Err(e) => {
                    warn!(staff_name = %identity.staff_name, error = %e, "call fetch failed; skipped");
                }
            }
        }
        calls
    }

    async fn attach_transcripts(
        &self,
        calls: &mut [CallRecord],
        staff_numbers: &std::collections::HashSet<String>,
    ) -> usize {
        let mut fetched = 0;
        for call in calls.iter_mut() {
            match self.telephony.fetch_transcript(&call.call_id).await {
                Ok(Some(payload)) => {
                    call.transcript = normalize_transcript(&payload, staff_numbers);
                    if call.transcript.is_some() {
                        fetched += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(call_id = %call.call_id, error = %e, "transcript fetch failed; skipped");
                }
            }
        }
        fetched
    }

    async fn push_results(
        &self,
        staff: &[StaffRecord],
        notes: &[NoteRecord],
        summaries: &[PeriodUnitSummary],
    ) -> usize {
        let results_board = self.config.run.results_board_id.as_str();
        if results_board.is_empty() {
            info!("no results board configured; push-back skipped");
            return 0;
        }

        let mut written = 0;
        for note in notes {
            written += push_note(self.board.as_ref(), results_board, note).await;
        }
        for summary in summaries {
            let Some(member) = staff
                .iter()
                .find(|m| summary.period_identifier.starts_with(m.staff_name.as_str()))
            else {
                warn!(period = %summary.period_identifier, "no staff row for period summary; skipped");
                continue;
            };
            written +=
                push_summary(self.board.as_ref(), results_board, &member.work_item_id, summary)
                    .await;
        }
        written
    }
}
