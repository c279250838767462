//! Output capture for worker processes
//!
//! An [`OutputCapture`] drains one process stream, splits it into
//! newline-delimited records and forwards each as a [`LogLine`] attributed
//! to the worker and stream tag. stdout and stderr are captured by two
//! independent readers; neither holds up the process exit.

use crate::logging::LogSink;
use schema::{LogLine, LogStream};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Reader that attributes a process stream's lines to a worker
#[derive(Clone)]
pub struct OutputCapture {
    worker: String,
    stream: LogStream,
    sink: Arc<dyn LogSink>,
}

impl OutputCapture {
    pub fn new(worker: impl Into<String>, stream: LogStream, sink: Arc<dyn LogSink>) -> Self {
        Self {
            worker: worker.into(),
            stream,
            sink,
        }
    }

    /// Read `reader` to EOF, forwarding one record per line.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, a trailing `\r` is
    /// stripped, and an unterminated final line is still forwarded. A read
    /// error ends capture with a warning. Returns the number of records
    /// forwarded.
    pub async fn drain<R>(self, reader: R) -> u64
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(256);
        let mut forwarded = 0u64;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    self.sink
                        .record(LogLine::new(self.worker.as_str(), self.stream, text));
                    forwarded += 1;
                }
                Err(e) => {
                    warn!(
                        "Error reading {} of worker '{}': {}",
                        self.stream, self.worker, e
                    );
                    break;
                }
            }
        }

        debug!(
            "Capture of {} for worker '{}' finished after {} lines",
            self.stream, self.worker, forwarded
        );
        forwarded
    }

    /// Drain `reader` on a background task
    pub fn spawn<R>(self, reader: R) -> JoinHandle<u64>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        tokio::spawn(self.drain(reader))
    }
}
