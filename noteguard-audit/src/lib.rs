//! noteguard-audit library interface
//!
//! Exposes the pipeline stages and client traits for integration testing.

pub mod audit;
pub mod clients;
pub mod config;
pub mod correlate;
pub mod error;
pub mod extract;
pub mod identity;
pub mod pipeline;
pub mod pushback;
pub mod reconcile;
pub mod types;

pub use crate::config::AuditConfig;
pub use crate::error::{AuditError, AuditResult};
pub use crate::pipeline::{Pipeline, RunOutcome, RunSummary};
