//! Schema definitions for Corral
//!
//! This crate contains the data structures shared between the supervision
//! core and the command-line front end: worker launch specifications, the
//! roster file layout and the attributed log records produced by output
//! capture. All types here implement JSON Schema generation for external
//! consumption.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod events;
pub mod worker;


pub use events::*;
pub use worker::*;

/// Top-level layout of a roster file
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterFile {
    /// Settings applied to the supervisor that owns the roster
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    /// Workers to launch, in launch order
    #[serde(default)]
    pub workers: Vec<WorkerSpec>,
}

/// Supervisor-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorSettings {
    /// Name used to attribute supervisor log records
    #[serde(default = "default_supervisor_name")]
    pub name: String,
    /// How workers are stopped when the supervisor is cancelled
    #[serde(default)]
    pub termination: TerminationKind,
    /// Grace period after an interrupt before the process group is killed.
    /// Absent means the process decides how long it takes to exit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_after_secs: Option<u64>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            name: default_supervisor_name(),
            termination: TerminationKind::default(),
            kill_after_secs: None,
        }
    }
}

fn default_supervisor_name() -> String {
    "corral".to_string()
}

/// Termination strategy selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TerminationKind {
    /// Use whatever the build target supports best
    #[default]
    Platform,
    /// Graceful interrupt, falling back to a kill if the signal cannot be sent
    Interrupt,
    /// Forced kill only
    Kill,
}
