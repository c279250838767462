//! Attributed output records
//!
//! Output captured from a worker's stdout and stderr is forwarded line by
//! line as [`LogLine`] values. They are transient: produced while the process
//! is alive and handed straight to a log sink.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Log stream identifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum LogStream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl LogStream {
    /// Stable tag used in log records
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of process output attributed to a worker and stream
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    /// Name of the worker that produced the line
    pub worker: String,
    /// Stream the line was read from
    pub stream: LogStream,
    /// Line content without the trailing newline
    pub text: String,
}

impl LogLine {
    pub fn new(worker: impl Into<String>, stream: LogStream, text: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            stream,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_tags() {
        assert_eq!(LogStream::Stdout.to_string(), "stdout");
        assert_eq!(LogStream::Stderr.to_string(), "stderr");
        assert_eq!(serde_json::to_string(&LogStream::Stderr).unwrap(), "\"stderr\"");
    }
}
