use std::sync::Arc;

use futures::TryStreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use podtail_k8s::PodSource;
use podtail_types::{LogOptions, LogRecord, Target};

use crate::decoder::LineDecoder;
use crate::error::StreamError;

/// How a single pod stream ended
#[derive(Debug)]
pub enum WorkerOutcome {
    /// The server closed the stream
    Completed { lines: u64 },

    /// Stopped by the shared cancellation token
    Cancelled { lines: u64 },

    /// The drain side went away before the stream ended
    SinkClosed { lines: u64 },

    Failed { lines: u64, error: StreamError },
}

impl WorkerOutcome {
    /// Lines handed to the fan-in channel
    pub fn lines(&self) -> u64 {
        match self {
            Self::Completed { lines }
            | Self::Cancelled { lines }
            | Self::SinkClosed { lines }
            | Self::Failed { lines, .. } => *lines,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn error(&self) -> Option<&StreamError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Reads one pod's log stream and forwards each line to the fan-in channel
pub struct StreamWorker<S> {
    source: Arc<S>,
    target: Arc<Target>,
    options: Arc<LogOptions>,
    max_line_bytes: usize,
    log_tx: mpsc::Sender<LogRecord>,
    cancel: CancellationToken,
}

impl<S: PodSource> StreamWorker<S> {
    pub fn new(
        source: Arc<S>,
        target: Arc<Target>,
        options: Arc<LogOptions>,
        max_line_bytes: usize,
        log_tx: mpsc::Sender<LogRecord>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            options,
            max_line_bytes,
            log_tx,
            cancel,
        }
    }

    /// Stream until EOF, error or cancellation.
    ///
    /// The stream and this worker's channel sender are dropped on every exit
    /// path, which releases the connection and lets the channel close once
    /// all workers are gone.
    pub async fn run(self) -> WorkerOutcome {
        let Self {
            source,
            target,
            options,
            max_line_bytes,
            log_tx,
            cancel,
        } = self;

        info!(pod = %target.name, "Starting stream for pod {}", target.name);

        let chunks = source.log_stream(&target, &options);
        let mut lines = LineDecoder::new(chunks.into_async_read(), max_line_bytes);
        let mut sent: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(pod = %target.name, lines = sent, "stream cancelled");
                    return WorkerOutcome::Cancelled { lines: sent };
                }
                // an idle follow stream would otherwise outlive a dead sink
                _ = log_tx.closed() => return WorkerOutcome::SinkClosed { lines: sent },
                next = lines.next_line() => next,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(pod = %target.name, lines = sent, "stream ended");
                    return WorkerOutcome::Completed { lines: sent };
                }
                Err(error) => return WorkerOutcome::Failed { lines: sent, error },
            };

            let record = LogRecord::new(Arc::clone(&target), line);

            // Blocks while the channel is full; a slow sink throttles every stream
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(pod = %target.name, lines = sent, "stream cancelled");
                    return WorkerOutcome::Cancelled { lines: sent };
                }
                result = log_tx.send(record) => {
                    if result.is_err() {
                        return WorkerOutcome::SinkClosed { lines: sent };
                    }
                    sent += 1;
                }
            }
        }
    }
}
