//! Billing alignment pass
//!
//! Judges whether the units billed for a session are supported by the depth
//! of its narrative. One unit buys a brief interaction, two a moderate one,
//! four a detailed multi-step service. When a note is overbilled the
//! judgment service also proposes a rewritten narrative that would support
//! the claim, carried back on the annotation.

use crate::audit::{apply_entries, judgment_schema, notes_payload, AuditPass, PassContext};
use crate::clients::judgment::JudgmentRequest;
use crate::config::{PassConfig, PassesConfig};
use crate::error::AuditResult;
use crate::types::MatchedTriple;
use async_trait::async_trait;
use serde_json::json;

pub const KEY: &str = "billing";

const SYSTEM_PROMPT: &str = "You are a session notes analyzer screening for \
overbilling. Each note carries the units billed and the narrative written for \
the session. Judge whether the narrative's depth supports the claim:\n\
- 1 unit ($17.17): a brief interaction or single task.\n\
- 2 units ($34.34): a moderate interaction covering two or three tasks.\n\
- 4 units ($68.68): a detailed, multi-step service.\n\n\
A good note states the purpose of the service, the actions the writer took, \
and the outcomes or next steps, at a level of detail matching the billed \
amount. Label a note with the good label when the narrative supports its \
units. Label it with the overbilled label when the narrative is too vague or \
too thin for the amount billed, give a concise reason, and supply an \
improved_narrative rewritten to honestly support the claimed units using only \
facts already present in the note.";

pub struct BillingPass;

#[async_trait]
impl AuditPass for BillingPass {
    fn key(&self) -> &'static str {
        KEY
    }

    fn config<'a>(&self, passes: &'a PassesConfig) -> &'a PassConfig {
        &passes.billing
    }

    async fn run(&self, batch: &mut [MatchedTriple], ctx: &PassContext) -> AuditResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let config = self.config(&ctx.passes);
        let request = JudgmentRequest {
            system_prompt: format!(
                "{}\nUse \"{}\" as the good label and \"{}\" as the overbilled label.",
                SYSTEM_PROMPT, config.good_label, config.flagged_label
            ),
            user_content: notes_payload(batch).to_string(),
            schema: judgment_schema(json!({
                "improved_narrative": {
                    "type": "string",
                    "description": "Rewritten narrative supporting the billed units; only for overbilled notes."
                },
                "units": {
                    "type": "number",
                    "description": "Units the narrative as written would actually support."
                }
            })),
            note_count: batch.len(),
        };
        let entries = ctx.judgment.judge(&request).await?;
        tokio::time::sleep(ctx.judgment_delay).await;

        apply_entries(batch, &entries, KEY, config);
        Ok(())
    }
}
