//! Shared fixtures and mock clients for integration tests.

use async_trait::async_trait;
use noteguard_audit::clients::board::{BoardApi, BoardGroup, FetchOutcome, RawItem};
use noteguard_audit::clients::judgment::{JudgmentApi, JudgmentRequest, NoteAnalysisEntry};
use noteguard_audit::clients::telephony::{PhoneLine, TelephonyApi};
use noteguard_audit::error::{AuditError, AuditResult};
use noteguard_audit::types::{CallRecord, StaffRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Judgment mocks
// ============================================================================

/// Labels every note Good, regardless of pass.
pub struct AllGoodJudgment {
    pub calls: AtomicUsize,
}

impl AllGoodJudgment {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl JudgmentApi for AllGoodJudgment {
    async fn judge(&self, request: &JudgmentRequest) -> AuditResult<Vec<NoteAnalysisEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..request.note_count)
            .map(|index| NoteAnalysisEntry {
                note_index: index,
                severity: "Good".to_string(),
                reason: "Consistent with the record.".to_string(),
                improved_narrative: None,
                units: None,
            })
            .collect())
    }
}

/// Returns a fixed entry set for requests whose system prompt contains a
/// trigger phrase; everything else is labelled Good.
pub struct ScriptedJudgment {
    pub trigger: &'static str,
    pub entries: Vec<NoteAnalysisEntry>,
}

#[async_trait]
impl JudgmentApi for ScriptedJudgment {
    async fn judge(&self, request: &JudgmentRequest) -> AuditResult<Vec<NoteAnalysisEntry>> {
        if request.system_prompt.contains(self.trigger) {
            return Ok(self.entries.clone());
        }
        Ok((0..request.note_count)
            .map(|index| NoteAnalysisEntry {
                note_index: index,
                severity: "Good".to_string(),
                reason: "Consistent with the record.".to_string(),
                improved_narrative: None,
                units: None,
            })
            .collect())
    }
}

// ============================================================================
// Board mock
// ============================================================================

pub struct MockBoard {
    pub groups: Vec<BoardGroup>,
    pub items: Vec<RawItem>,
    pub writes: Mutex<Vec<(String, String, String)>>,
}

impl MockBoard {
    pub fn new(groups: Vec<BoardGroup>, items: Vec<RawItem>) -> Self {
        Self {
            groups,
            items,
            writes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BoardApi for MockBoard {
    async fn fetch_groups(&self, _board_id: u64) -> AuditResult<Vec<BoardGroup>> {
        Ok(self.groups.clone())
    }

    async fn fetch_item_details(&self, item_ids: &[String]) -> AuditResult<FetchOutcome> {
        let items: Vec<RawItem> = self
            .items
            .iter()
            .filter(|i| item_ids.contains(&i.id))
            .cloned()
            .collect();
        Ok(FetchOutcome {
            requested: item_ids.len(),
            retrieved: items.len(),
            abandoned_batches: 0,
            items,
        })
    }

    async fn write_column_value(
        &self,
        item_id: &str,
        _board_id: &str,
        column_id: &str,
        value: &str,
    ) -> AuditResult<()> {
        self.writes.lock().unwrap().push((
            item_id.to_string(),
            column_id.to_string(),
            value.to_string(),
        ));
        Ok(())
    }
}

// ============================================================================
// Telephony mock
// ============================================================================

pub struct MockPhone {
    pub lines: Vec<PhoneLine>,
    /// Calls per phone-number id.
    pub calls: HashMap<String, Vec<CallRecord>>,
    /// Raw transcript payloads per call id.
    pub transcripts: HashMap<String, Value>,
}

#[async_trait]
impl TelephonyApi for MockPhone {
    async fn fetch_phone_lines(&self) -> AuditResult<Vec<PhoneLine>> {
        Ok(self.lines.clone())
    }

    async fn fetch_calls(
        &self,
        phone_number_id: &str,
        _participant: Option<&str>,
    ) -> AuditResult<Vec<CallRecord>> {
        self.calls
            .get(phone_number_id)
            .cloned()
            .ok_or_else(|| AuditError::Api(format!("unknown line {}", phone_number_id)))
    }

    async fn fetch_transcript(&self, call_id: &str) -> AuditResult<Option<Value>> {
        Ok(self.transcripts.get(call_id).cloned())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn staff_member() -> StaffRecord {
    StaffRecord {
        staff_name: "Tony Holtgren".to_string(),
        phone_number: "+16125550100".to_string(),
        board_id: "8193469458".to_string(),
        work_item_id: "7001".to_string(),
        board_group_id: None,
    }
}
