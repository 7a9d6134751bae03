use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use podtail_k8s::PodSource;
use podtail_types::{LogOptions, LogRecord, Target};

use crate::decoder::DEFAULT_MAX_LINE_BYTES;
use crate::error::{RunError, StreamError};
use crate::sink::LineSink;
use crate::worker::{StreamWorker, WorkerOutcome};

/// Default fan-in channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Sizing of the fan-in pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Records buffered between the streams and the sink
    pub channel_capacity: usize,

    /// Longest accepted log line, in bytes
    pub max_line_bytes: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Final state of one pod stream
#[derive(Debug)]
pub struct TargetReport {
    pub target: Arc<Target>,
    pub outcome: WorkerOutcome,
}

/// Fans pod streams into one bounded channel drained by a single sink
pub struct Aggregator<S> {
    source: Arc<S>,
    config: AggregatorConfig,
}

impl<S: PodSource> Aggregator<S> {
    pub fn new(source: Arc<S>, config: AggregatorConfig) -> Self {
        Self { source, config }
    }

    /// Spawn one worker per target plus the drain thread.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<K: LineSink>(
        &self,
        targets: Vec<Target>,
        options: LogOptions,
        sink: K,
        cancel: CancellationToken,
    ) -> Streaming {
        // A zero-capacity channel would panic in tokio
        let (log_tx, log_rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let options = Arc::new(options);

        let drain = tokio::task::spawn_blocking(move || drain_into(log_rx, sink));

        let workers = targets
            .into_iter()
            .map(|target| {
                let target = Arc::new(target);
                let worker = StreamWorker::new(
                    Arc::clone(&self.source),
                    Arc::clone(&target),
                    Arc::clone(&options),
                    self.config.max_line_bytes,
                    log_tx.clone(),
                    cancel.clone(),
                );
                (target, tokio::spawn(worker.run()))
            })
            .collect();

        Streaming {
            workers,
            log_tx,
            drain,
        }
    }
}

/// Handle to a running aggregation, before the channel is closed
pub struct Streaming {
    workers: Vec<(Arc<Target>, JoinHandle<WorkerOutcome>)>,

    /// The aggregator's own sender; workers hold clones
    log_tx: mpsc::Sender<LogRecord>,

    drain: JoinHandle<DrainResult>,
}

impl Streaming {
    /// Number of workers started
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker to finish, then close the fan-in channel.
    ///
    /// Consuming `self` is what guarantees the close happens only after
    /// the barrier: the last sender is dropped here and nowhere else.
    pub async fn settle(self) -> (Vec<TargetReport>, Draining) {
        let Self {
            workers,
            log_tx,
            drain,
        } = self;

        let mut reports = Vec::with_capacity(workers.len());
        for (target, handle) in workers {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => WorkerOutcome::Failed {
                    lines: 0,
                    error: StreamError::Aborted(e.to_string()),
                },
            };
            debug!(pod = %target.name, ?outcome, "stream finished");
            reports.push(TargetReport { target, outcome });
        }

        drop(log_tx);
        (reports, Draining { drain })
    }

    /// Run the full shutdown sequence: settle, close, drain
    pub async fn join(self) -> Result<(Vec<TargetReport>, u64), RunError> {
        let (reports, draining) = self.settle().await;
        let records = draining.finish().await?;
        Ok((reports, records))
    }
}

/// Handle to the drain thread once the channel is closed
pub struct Draining {
    drain: JoinHandle<DrainResult>,
}

impl Draining {
    /// Wait for the sink to consume every remaining record.
    ///
    /// Returns the number of records the sink received.
    pub async fn finish(self) -> Result<u64, RunError> {
        match self.drain.await {
            Ok(DrainResult { records, error: None }) => Ok(records),
            Ok(DrainResult {
                error: Some(e), ..
            }) => Err(RunError::Sink(e)),
            Err(e) => Err(RunError::DrainAborted(e.to_string())),
        }
    }
}

struct DrainResult {
    records: u64,
    error: Option<io::Error>,
}

/// Forward records to the sink until the channel is closed.
///
/// On a sink error the receiver is dropped, which makes every pending and
/// future send fail so the workers wind down on their own.
fn drain_into<K: LineSink>(mut log_rx: mpsc::Receiver<LogRecord>, mut sink: K) -> DrainResult {
    let mut records = 0;

    while let Some(record) = log_rx.blocking_recv() {
        if let Err(e) = sink.write_record(&record) {
            return DrainResult {
                records,
                error: Some(e),
            };
        }
        records += 1;
        if log_rx.is_empty() {
            if let Err(e) = sink.flush() {
                return DrainResult {
                    records,
                    error: Some(e),
                };
            }
        }
    }

    DrainResult {
        records,
        error: sink.flush().err(),
    }
}
