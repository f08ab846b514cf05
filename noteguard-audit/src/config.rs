//! Configuration for noteguard-audit
//!
//! Pass thresholds, severity labels, correlation tolerance, and retry policy
//! were hard-coded per-script constants in earlier revisions of this
//! pipeline; they are a single first-class config object now. Resolution
//! priority is CLI > ENV > TOML > built-in defaults. API tokens are env-only.

use crate::error::{AuditError, AuditResult};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Environment variable naming the board API token.
pub const BOARD_TOKEN_VAR: &str = "NOTEGUARD_BOARD_TOKEN";
/// Environment variable naming the telephony API token.
pub const PHONE_TOKEN_VAR: &str = "NOTEGUARD_PHONE_TOKEN";
/// Environment variable naming the judgment-service token.
pub const LLM_TOKEN_VAR: &str = "NOTEGUARD_LLM_TOKEN";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub passes: PassesConfig,
    #[serde(default)]
    pub units: UnitsConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

impl AuditConfig {
    /// Load from an optional TOML path; missing file means defaults.
    pub fn load(cli_path: Option<&str>) -> AuditResult<Self> {
        match noteguard_common::config::resolve_config_path(
            cli_path,
            "NOTEGUARD_AUDIT_CONFIG",
            "audit.toml",
        ) {
            Some(path) => Ok(noteguard_common::config::load_toml(&path)?),
            None => Ok(Self::default()),
        }
    }

    /// Reporting timezone as a `chrono_tz::Tz`.
    pub fn timezone(&self) -> AuditResult<Tz> {
        self.run
            .timezone
            .parse::<Tz>()
            .map_err(|_| AuditError::Config(format!("unknown timezone '{}'", self.run.timezone)))
    }
}

/// Run-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Civil reporting timezone the board's wall-clock values live in.
    pub timezone: String,
    /// Days subtracted from "today" to pick the target civil date when no
    /// explicit date is given.
    pub target_date_offset_days: i64,
    /// Items per batched board update fetch.
    pub batch_size: usize,
    /// Pause between board fetch batches, in seconds.
    pub inter_batch_delay_secs: f64,
    /// Pause between judgment-service calls, in seconds.
    pub judgment_delay_secs: f64,
    /// Board the session notes are read from.
    pub source_board_id: u64,
    /// Board the audit columns are written back to.
    pub results_board_id: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Chicago".to_string(),
            target_date_offset_days: 0,
            batch_size: 25,
            inter_batch_delay_secs: 1.5,
            judgment_delay_secs: 2.0,
            source_board_id: 0,
            results_board_id: String::new(),
        }
    }
}

/// Retry/backoff policy for all network-bound stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_secs: f64,
    /// Cap on the doubling backoff so a long retry chain cannot stall a run.
    pub max_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_secs: 1.0,
            max_delay_secs: 60.0,
        }
    }
}

/// Time-window correlation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Maximum |note − call| delta, in minutes, for a match.
    pub tolerance_minutes: i64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            tolerance_minutes: 60,
        }
    }
}

/// Per-pass configuration, keyed by pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassesConfig {
    /// Delta band within which a matched call counts as Good; the
    /// historical script variants disagreed (1-2 vs <=5), so it is
    /// config, defaulting to the later variant.
    #[serde(default = "default_transcript_pass")]
    pub transcript: PassConfig,
    /// Session creation may lead the start time by up to this many
    /// minutes before the note is Flagged.
    #[serde(default = "default_start_pass")]
    pub start: PassConfig,
    /// Grace window for the update-creation-vs-end-time check.
    #[serde(default = "default_end_pass")]
    pub end: PassConfig,
    #[serde(default)]
    pub service: PassConfig,
    #[serde(default = "default_billing_pass")]
    pub billing: PassConfig,
    #[serde(default)]
    pub columns: PassConfig,
}

fn default_transcript_pass() -> PassConfig {
    PassConfig::with_threshold(5)
}

fn default_start_pass() -> PassConfig {
    PassConfig::with_threshold(20)
}

fn default_end_pass() -> PassConfig {
    PassConfig::with_threshold(0)
}

fn default_billing_pass() -> PassConfig {
    PassConfig {
        good_label: "good".to_string(),
        flagged_label: "overbilled".to_string(),
        ..PassConfig::default()
    }
}

impl Default for PassesConfig {
    fn default() -> Self {
        Self {
            transcript: default_transcript_pass(),
            start: default_start_pass(),
            end: default_end_pass(),
            service: PassConfig::default(),
            billing: default_billing_pass(),
            columns: PassConfig::default(),
        }
    }
}

/// Settings for one audit pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    pub enabled: bool,
    /// Pass-specific minute threshold, where one applies.
    pub threshold_minutes: Option<i64>,
    /// Labels used when writing results back to the board.
    pub good_label: String,
    pub flagged_label: String,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_minutes: None,
            good_label: "Good".to_string(),
            flagged_label: "Flagged".to_string(),
        }
    }
}

impl PassConfig {
    fn with_threshold(minutes: i64) -> Self {
        Self {
            threshold_minutes: Some(minutes),
            ..Self::default()
        }
    }

    /// Threshold with a caller-supplied default for unset configs.
    pub fn threshold_or(&self, default_minutes: i64) -> i64 {
        self.threshold_minutes.unwrap_or(default_minutes)
    }
}

/// Hired-unit allotments per reporting period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsConfig {
    /// Fallback contracted units per period.
    pub default_hired_units: f64,
    /// Per-group overrides, keyed by group title.
    #[serde(default)]
    pub hired_units_by_group: HashMap<String, f64>,
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            default_hired_units: 32.0,
            hired_units_by_group: HashMap::new(),
        }
    }
}

impl UnitsConfig {
    pub fn hired_units_for(&self, group_title: &str) -> f64 {
        self.hired_units_by_group
            .get(group_title)
            .copied()
            .unwrap_or(self.default_hired_units)
    }
}

/// External service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub board_url: String,
    pub phone_url: String,
    pub llm_url: String,
    pub llm_model: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            board_url: "https://api.monday.com/v2".to_string(),
            phone_url: "https://api.openphone.com/v1".to_string(),
            llm_url: "https://api.openai.com/v1/chat/completions".to_string(),
            llm_model: "gpt-4o-2024-11-20".to_string(),
        }
    }
}
