//! Worker launch specification
//!
//! A [`WorkerSpec`] describes one long-running external process: what to
//! execute, the arguments passed verbatim, and the environment overrides
//! layered on top of the inherited environment. A spec is immutable once a
//! worker has been built from it; a worker that needs new parameters is a
//! new worker.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Complete specification for a supervised worker process
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSpec {
    /// Unique name within a supervisor; used to attribute log records
    pub name: String,

    /// Executable to launch (absolute path or resolved through `PATH`)
    pub command: String,

    /// Command-line arguments, passed verbatim
    #[serde(default)]
    pub args: Vec<String>,

    /// Ordered `KEY=VALUE` overrides applied on top of the inherited
    /// environment. Later duplicates win.
    #[serde(default)]
    pub env: Vec<String>,
}

impl WorkerSpec {
    /// Create a spec with no arguments and no environment overrides
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Iterate the environment overrides as `(key, value)` pairs.
    ///
    /// An entry without `=` is treated as a key with an empty value.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env
            .iter()
            .map(|entry| entry.split_once('=').unwrap_or((entry.as_str(), "")))
    }
}
