//! Roster configuration loading and validation
//!
//! This module parses a TOML roster into [`schema::RosterFile`], applies
//! defaults (via serde defaults on schema types), and performs strict
//! validation with field-path error messages.
//!
//! ```toml
//! [supervisor]
//! termination = "interrupt"
//! killAfterSecs = 10
//!
//! [[workers]]
//! name = "web"
//! command = "python3"
//! args = ["-m", "http.server"]
//! env = ["PORT=8000"]
//! ```

use crate::{CoreError, Result};
use schema::RosterFile;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Validate a roster and return `Result<()>` with field-path errors
pub fn validate_roster(roster: &RosterFile) -> Result<()> {
    if roster.supervisor.name.trim().is_empty() {
        return Err(CoreError::ValidationError(
            "supervisor.name: cannot be empty".to_string(),
        ));
    }
    if roster.supervisor.kill_after_secs == Some(0) {
        return Err(CoreError::ValidationError(
            "supervisor.killAfterSecs: must be > 0".to_string(),
        ));
    }
    if roster.workers.is_empty() {
        return Err(CoreError::ValidationError(
            "workers: must contain at least one worker".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (i, worker) in roster.workers.iter().enumerate() {
        if worker.name.trim().is_empty() {
            return Err(CoreError::ValidationError(format!(
                "workers[{}].name: cannot be empty",
                i
            )));
        }
        if !seen.insert(worker.name.as_str()) {
            return Err(CoreError::ValidationError(format!(
                "workers[{}].name: duplicate name '{}'",
                i, worker.name
            )));
        }
        if worker.command.trim().is_empty() {
            return Err(CoreError::ValidationError(format!(
                "workers[{}].command: cannot be empty",
                i
            )));
        }
        for (j, entry) in worker.env.iter().enumerate() {
            match entry.split_once('=') {
                Some((key, _)) if !key.is_empty() => {}
                _ => {
                    return Err(CoreError::ValidationError(format!(
                        "workers[{}].env[{}]: expected KEY=VALUE, found '{}'",
                        i, j, entry
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Load a roster from a TOML file path
pub fn load_roster_from_toml_path(path: impl AsRef<Path>) -> Result<RosterFile> {
    let data = fs::read_to_string(&path).map_err(|e| {
        CoreError::ConfigurationError(format!("Failed to read config {:?}: {}", path.as_ref(), e))
    })?;
    load_roster_from_toml_str(&data)
}

/// Load a roster from a TOML string
pub fn load_roster_from_toml_str(input: &str) -> Result<RosterFile> {
    let roster: RosterFile = toml::from_str(input)
        .map_err(|e| CoreError::ConfigurationError(format!("TOML parse error: {}", e)))?;
    validate_roster(&roster)?;
    Ok(roster)
}
