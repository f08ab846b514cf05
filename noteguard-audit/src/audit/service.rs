//! Service classification pass
//!
//! Verifies that each note's service type and service line agree with the
//! narrative, against the covered-services taxonomy for housing
//! stabilization services. Set membership (is this service line covered by
//! that service type?) is checked locally; whether the narrative actually
//! describes the declared service is delegated to the judgment service.

use crate::audit::{judgment_schema, severity_from_label, AuditPass, PassContext};
use crate::clients::judgment::JudgmentRequest;
use crate::config::{PassConfig, PassesConfig};
use crate::error::AuditResult;
use crate::types::{MatchedTriple, NoteRecord, PassOutcome, Severity};
use async_trait::async_trait;
use serde_json::json;

pub const KEY: &str = "service";

const HOUSING_TRANSITION: &str = "Housing Transition";
const HOUSING_SUSTAINING: &str = "Housing Sustaining";
const NON_BILLABLE: &str = "Non-billable";

const HOUSING_TRANSITION_SERVICES: &[&str] = &[
    "Developing a housing transition plan",
    "Supporting the person in applying for benefits to afford their housing, including helping the person determine which benefits they may be eligible for",
    "Assisting the person with the housing search and application process",
    "Assisting the person with tenant screening and housing assessments",
    "Providing transportation with the person receiving services present and discussing housing-related issues",
    "Helping the person understand and develop a budget",
    "Helping the person understand and negotiate a lease",
    "Helping the person meet and build a relationship with a prospective landlord",
    "Promoting/supporting cultural practice needs and understandings with prospective landlords, property managers",
    "Helping the person find funding for deposits",
    "Helping the person organize their move",
    "Researching possible housing options for the person",
    "Contacting possible housing options for the person",
    "Identifying resources to pay for deposits or home goods",
    "Identifying resources to cover moving expenses",
    "Completing housing applications on behalf of the service recipient",
    "Working to expunge records or access reasonable accommodations",
    "Identifying services and benefits that will support the person with housing instability",
    "Ensuring the new living arrangement is safe for the person and ready for move-in",
    "Arranging for adaptive house-related accommodations required by the person",
    "Arranging for assistive technology required by the person",
];

const HOUSING_SUSTAINING_SERVICES: &[&str] = &[
    "Developing, updating, and modifying the housing support and crisis/safety plan on a regular basis",
    "Preventing and early identification of behaviors that may jeopardize continued housing",
    "Educating and training on roles, rights, and responsibilities of the tenant and property manager",
    "Transportation with the person receiving services present and discussing housing-related issues",
    "Promoting/supporting cultural practice needs and understandings with landlords, property managers, and neighbors",
    "Coaching to develop and maintain key relationships with property managers and neighbors",
    "Advocating with community resources to prevent eviction when housing is at risk and maintain the person's safety",
    "Assistance with the housing recertification processes",
    "Continued training on being a good tenant, lease compliance, and household management",
    "Supporting the person to apply for benefits to retain housing",
    "Supporting the person to understand and maintain/increase income and benefits to retain housing",
    "Supporting the building of natural housing supports and resources in the community, including building supports and resources related to a person's culture and identity",
    "Working with property manager or landlord to promote housing retention",
    "Arranging for assistive technology",
    "Arranging for adaptive house-related accommodations",
];

const NON_BILLABLE_SERVICES: &[&str] = &["Staff Meeting", "Intake Meeting", "Others"];

/// The covered-service set for a declared service type, `None` for an
/// unrecognized type.
fn covered_services(service_type: &str) -> Option<&'static [&'static str]> {
    // The board has used both the long and short label vocabularies.
    match service_type.trim() {
        HOUSING_TRANSITION | "Transitioning" => Some(HOUSING_TRANSITION_SERVICES),
        HOUSING_SUSTAINING | "Sustaining" => Some(HOUSING_SUSTAINING_SERVICES),
        NON_BILLABLE | "Non-Billable" => Some(NON_BILLABLE_SERVICES),
        _ => None,
    }
}

/// Local membership check. Returns `None` when type and line agree and the
/// narrative still needs a judgment call.
fn membership_outcome(note: &NoteRecord) -> Option<PassOutcome> {
    let Some(service_type) = note.service_type.as_deref().filter(|s| !s.trim().is_empty())
    else {
        return Some(PassOutcome::new(
            Severity::Flagged,
            "Service type is not added.",
        ));
    };
    let Some(service_line) = note.service_line.as_deref().filter(|s| !s.trim().is_empty())
    else {
        return Some(PassOutcome::new(
            Severity::Flagged,
            "Service line is not added.",
        ));
    };
    let Some(covered) = covered_services(service_type) else {
        return Some(PassOutcome::new(
            Severity::Flagged,
            format!("Service type \"{}\" is not a recognized service type.", service_type),
        ));
    };
    if !covered.iter().any(|s| s.eq_ignore_ascii_case(service_line.trim())) {
        return Some(PassOutcome::new(
            Severity::Flagged,
            format!(
                "Service line \"{}\" is not a covered service under {}.",
                service_line, service_type
            ),
        ));
    }
    None
}

const SYSTEM_PROMPT: &str = "You are a compliance auditor for housing \
stabilization services. Each session note declares a service type and a \
service line that have already been verified as a covered pairing. Judge \
whether the narrative actually describes the declared service line. Mark a \
note Flagged when the narrative describes a different activity than the \
declared service line, or describes a non-billable activity such as a staff \
meeting under a billable type. Mark it Good when narrative, service line, and \
service type agree. Give a concise reason for every verdict.";

pub struct ServicePass;

#[async_trait]
impl AuditPass for ServicePass {
    fn key(&self) -> &'static str {
        KEY
    }

    fn config<'a>(&self, passes: &'a PassesConfig) -> &'a PassConfig {
        &passes.service
    }

    async fn run(&self, batch: &mut [MatchedTriple], ctx: &PassContext) -> AuditResult<()> {
        let config = self.config(&ctx.passes);

        let mut to_judge: Vec<usize> = Vec::new();
        for (index, triple) in batch.iter_mut().enumerate() {
            match membership_outcome(&triple.note) {
                Some(outcome) => triple.note.annotate(KEY, outcome),
                None => to_judge.push(index),
            }
        }
        if to_judge.is_empty() {
            return Ok(());
        }

        let payload: Vec<_> = to_judge
            .iter()
            .enumerate()
            .map(|(position, &index)| {
                let note = &batch[index].note;
                json!({
                    "note_index": position,
                    "service_type": note.service_type,
                    "service_line": note.service_line,
                    "narrative": note.narrative_text,
                })
            })
            .collect();

        let request = JudgmentRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_content: json!(payload).to_string(),
            schema: judgment_schema(json!({})),
            note_count: to_judge.len(),
        };
        let entries = ctx.judgment.judge(&request).await?;
        tokio::time::sleep(ctx.judgment_delay).await;

        for entry in entries {
            let index = to_judge[entry.note_index];
            batch[index].note.annotate(
                KEY,
                PassOutcome::new(severity_from_label(&entry.severity, config), entry.reason),
            );
        }
        Ok(())
    }
}
