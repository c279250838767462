//! Core functionality for Corral
//!
//! Supervises long-running external processes: each [`CommandWorker`] owns
//! one OS process, forwards its stdout/stderr line by line to a
//! [`LogSink`], reports readiness once its launch attempt has been issued,
//! and ends the process through a [`TerminationStrategy`] when cancelled.
//! A [`Supervisor`] runs a whole roster under one cancellation token.

pub mod capture;
pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod supervisor;
pub mod termination;
pub mod worker;


// Re-export schema types for convenience
pub use schema::*;

pub use capture::OutputCapture;
pub use error::{CoreError, Result};
pub use logging::{LogRing, LogSink, TeeSink, TracingSink};
pub use supervisor::Supervisor;
pub use termination::{Interrupt, Kill, TerminationStrategy};
pub use tokio_util::sync::CancellationToken;
pub use worker::{CommandWorker, Worker};

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    ///
    /// `RUST_LOG` takes precedence over `level` when set.
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
