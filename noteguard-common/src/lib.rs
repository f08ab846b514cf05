//! # NoteGuard Common Library
//!
//! Shared code for the NoteGuard pipeline crates including:
//! - Common error types
//! - Configuration file resolution
//! - Civil-time / UTC conversion utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
