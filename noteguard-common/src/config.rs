//! Configuration file resolution
//!
//! Resolution priority follows the usual NoteGuard order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`~/.config/noteguard/<name>.toml` on Linux)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// Resolve the path to a TOML config file.
///
/// Returns `None` when no candidate exists; callers fall back to built-in
/// defaults in that case.
pub fn resolve_config_path(
    cli_arg: Option<&str>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var(env_var_name) {
        return Some(PathBuf::from(path));
    }

    let candidate = dirs::config_dir().map(|d| d.join("noteguard").join(file_name))?;
    if candidate.exists() {
        Some(candidate)
    } else {
        None
    }
}

/// Load and deserialize a TOML config file.
pub fn load_toml<T: DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("parse {} failed: {}", path.display(), e)))
}

/// Read a required secret from the environment.
///
/// API tokens are env-only; they never live in TOML files.
pub fn require_env_secret(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Config(format!(
            "{} is not set; export it before running the pipeline",
            var
        ))),
    }
}
