//! noteguard-audit - Session note compliance audit
//!
//! Runs one full audit pass: fetches session notes from the work board and
//! calls from the telephony provider, correlates them, runs the six audit
//! passes, reconciles billed units against hired units, and writes the
//! results back to the board.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use noteguard_audit::clients::board::BoardClient;
use noteguard_audit::clients::judgment::JudgmentClient;
use noteguard_audit::clients::retry::RetryPolicy;
use noteguard_audit::clients::telephony::TelephonyClient;
use noteguard_audit::config::{AuditConfig, BOARD_TOKEN_VAR, LLM_TOKEN_VAR, PHONE_TOKEN_VAR};
use noteguard_audit::types::StaffRecord;
use noteguard_audit::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "noteguard-audit", version, about = "Session note compliance audit")]
struct Args {
    /// Path to the TOML config file (defaults to the standard config dir)
    #[arg(short, long)]
    config: Option<String>,

    /// Path to the staff roster JSON file
    #[arg(short, long)]
    staff: String,

    /// Override the target date offset in days (0 = today)
    #[arg(long)]
    date_offset: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Starting noteguard-audit");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = AuditConfig::load(args.config.as_deref())?;
    if let Some(offset) = args.date_offset {
        config.run.target_date_offset_days = offset;
    }

    let staff_json = std::fs::read_to_string(&args.staff)
        .with_context(|| format!("failed to read staff roster {}", args.staff))?;
    let staff: Vec<StaffRecord> =
        serde_json::from_str(&staff_json).context("staff roster is not valid JSON")?;
    info!(staff_count = staff.len(), "staff roster loaded");

    let board_token = noteguard_common::config::require_env_secret(BOARD_TOKEN_VAR)?;
    let phone_token = noteguard_common::config::require_env_secret(PHONE_TOKEN_VAR)?;
    let llm_token = noteguard_common::config::require_env_secret(LLM_TOKEN_VAR)?;

    let policy = RetryPolicy::from(&config.retry);
    let board = Arc::new(BoardClient::new(
        config.endpoints.board_url.clone(),
        &board_token,
        policy.clone(),
        config.run.batch_size,
        std::time::Duration::from_secs_f64(config.run.inter_batch_delay_secs),
    )?);
    let telephony = Arc::new(TelephonyClient::new(
        config.endpoints.phone_url.clone(),
        &phone_token,
        policy.clone(),
    )?);
    let judgment = Arc::new(JudgmentClient::new(
        config.endpoints.llm_url.clone(),
        &llm_token,
        config.endpoints.llm_model.clone(),
        policy,
    )?);

    let pipeline = Pipeline::new(board, telephony, judgment, config);
    let outcome = pipeline.run(&staff).await?;

    info!(
        notes = outcome.notes.len(),
        summaries = outcome.summaries.len(),
        flagged = outcome.summary.notes_flagged,
        "run complete"
    );
    Ok(())
}
