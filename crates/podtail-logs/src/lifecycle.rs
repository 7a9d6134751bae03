use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use podtail_k8s::PodSource;
use podtail_types::{LogOptions, RunState, TargetSelector};

use crate::aggregator::{Aggregator, AggregatorConfig, TargetReport};
use crate::error::RunError;
use crate::resolver::resolve;
use crate::sink::LineSink;

/// What to stream
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub namespace: String,
    pub selector: TargetSelector,
    pub options: LogOptions,
}

/// Outcome of a run that got past resolution (or was cancelled during it)
#[derive(Debug, Default)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,

    /// Records handed to the sink
    pub records: u64,

    /// The run ended because of the cancellation token
    pub cancelled: bool,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|r| r.outcome.is_failure())
    }

    /// Every stream failed; a cancelled or empty run never counts
    pub fn all_failed(&self) -> bool {
        !self.targets.is_empty() && self.targets.iter().all(|r| r.outcome.is_failure())
    }
}

/// Drives one invocation: resolve, stream, drain
pub struct Controller<S> {
    source: Arc<S>,
    config: AggregatorConfig,
    cancel: CancellationToken,
    state: watch::Sender<RunState>,
}

impl<S: PodSource> Controller<S> {
    pub fn new(source: Arc<S>, config: AggregatorConfig) -> Self {
        let (state, _) = watch::channel(RunState::Starting);
        Self {
            source,
            config,
            cancel: CancellationToken::new(),
            state,
        }
    }

    /// Token that stops the run. Cancelling more than once is harmless.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    fn transition(&self, next: RunState) {
        debug!(state = %next, "run state");
        self.state.send_replace(next);
    }

    /// Run to completion.
    ///
    /// Resolution errors abort before any stream is opened. Stream failures
    /// are returned in the report and logged once, after the drain.
    pub async fn run<K: LineSink>(&self, request: RunRequest, sink: K) -> Result<RunReport, RunError> {
        self.transition(RunState::Starting);

        let resolved = resolve(
            self.source.as_ref(),
            &request.namespace,
            &request.selector,
            &self.cancel,
        )
        .await;

        let targets = match resolved {
            Ok(Some(targets)) => targets,
            Ok(None) => {
                self.transition(RunState::Done);
                return Ok(RunReport {
                    cancelled: true,
                    ..Default::default()
                });
            }
            Err(e) => {
                self.transition(RunState::Done);
                return Err(e.into());
            }
        };

        if let TargetSelector::Labels(_) = request.selector {
            info!("Found {} pods", targets.len());
        }
        let follow = request.options.follow.is_follow();
        if follow {
            info!("Streaming logs, press Ctrl+C to exit");
        }

        let aggregator = Aggregator::new(Arc::clone(&self.source), self.config);
        let streaming = aggregator.start(targets, request.options, sink, self.cancel.clone());
        debug!(workers = streaming.worker_count(), "streams started");
        self.transition(RunState::Streaming);

        // Workers return on EOF, error or cancel; follow streams only on cancel
        let (reports, draining) = streaming.settle().await;
        self.transition(RunState::Draining);

        let drained = draining.finish().await;
        self.transition(RunState::Done);
        let records = drained?;

        for report in reports.iter().filter(|r| r.outcome.is_failure()) {
            if let Some(error) = report.outcome.error() {
                warn!(pod = %report.target.name, "Error streaming pod {}: {}", report.target.name, error);
            }
        }
        info!("Shutting down...");

        Ok(RunReport {
            targets: reports,
            records,
            cancelled: self.cancel.is_cancelled(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::testing::{FakeSource, RecordingSink, Script};
    use crate::worker::WorkerOutcome;
    use podtail_types::FollowMode;
    use std::time::Duration;

    fn request(selector: TargetSelector, follow: FollowMode) -> RunRequest {
        RunRequest {
            namespace: "default".to_string(),
            selector,
            options: LogOptions::new(follow),
        }
    }

    fn labels(selector: &str) -> TargetSelector {
        TargetSelector::Labels(selector.to_string())
    }

    #[tokio::test]
    async fn test_run_single_pod_to_completion() {
        let source = Arc::new(FakeSource::new().script("web-0", Script::lines(&["a", "b", "c"])));
        let controller = Controller::new(Arc::clone(&source), AggregatorConfig::default());
        let sink = RecordingSink::new();

        let report = controller
            .run(
                request(TargetSelector::Pod("web-0".to_string()), FollowMode::Once),
                sink.clone(),
            )
            .await
            .unwrap();

        assert_eq!(report.records, 3);
        assert!(!report.cancelled);
        assert!(!report.all_failed());
        assert_eq!(sink.lines_for("web-0"), vec!["a", "b", "c"]);
        assert_eq!(controller.state(), RunState::Done);
        assert_eq!(source.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_resolution_spawns_nothing() {
        let source = Arc::new(FakeSource::new().with_pods(&[]));
        let controller = Controller::new(Arc::clone(&source), AggregatorConfig::default());
        let sink = RecordingSink::new();

        let err = controller
            .run(request(labels("app=ghost"), FollowMode::Once), sink.clone())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Resolution(ResolutionError::NoMatches { .. })
        ));
        assert_eq!(source.opened(), 0);
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_spawns_nothing() {
        let source = Arc::new(FakeSource::new().with_list_error("connection refused"));
        let controller = Controller::new(Arc::clone(&source), AggregatorConfig::default());

        let err = controller
            .run(request(labels("app=web"), FollowMode::Once), RecordingSink::new())
            .await
            .unwrap_err();

        assert_eq!(err.as_label(), "resolution");
        assert_eq!(source.opened(), 0);
    }

    #[tokio::test]
    async fn test_follow_run_ends_cleanly_on_cancel() {
        let source = Arc::new(
            FakeSource::new()
                .with_pods(&["web-0", "web-1"])
                .script("web-0", Script::endless(&["a1", "a2"]))
                .script("web-1", Script::endless(&["b1"])),
        );
        let controller = Arc::new(Controller::new(source, AggregatorConfig::default()));
        let mut states = controller.subscribe();
        let sink = RecordingSink::new();

        let run = tokio::spawn({
            let controller = Arc::clone(&controller);
            let sink = sink.clone();
            async move {
                controller
                    .run(request(labels("app=web"), FollowMode::Follow), sink)
                    .await
            }
        });

        states
            .wait_for(|s| *s == RunState::Streaming)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let cancel = controller.cancel_token();
        cancel.cancel();
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("run did not stop after cancel")
            .unwrap()
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.failures().count(), 0);
        assert_eq!(report.records, 3);
        assert!(
            report
                .targets
                .iter()
                .all(|r| matches!(r.outcome, WorkerOutcome::Cancelled { .. }))
        );
        assert_eq!(sink.lines_for("web-0"), vec!["a1", "a2"]);
        assert_eq!(controller.state(), RunState::Done);
    }

    #[tokio::test]
    async fn test_cancel_during_resolution_is_not_an_error() {
        let source = Arc::new(FakeSource::new().with_hanging_list());
        let controller = Controller::new(Arc::clone(&source), AggregatorConfig::default());
        controller.cancel_token().cancel();

        let report = controller
            .run(request(labels("app=web"), FollowMode::Follow), RecordingSink::new())
            .await
            .unwrap();

        assert!(report.cancelled);
        assert!(report.targets.is_empty());
        assert_eq!(source.opened(), 0);
    }

    #[tokio::test]
    async fn test_one_failure_reported_once() {
        let source = Arc::new(
            FakeSource::new()
                .with_pods(&["a", "b", "c"])
                .script("a", Script::lines(&["a1"]))
                .script("b", Script::failing(&[], "stream reset"))
                .script("c", Script::lines(&["c1", "c2"])),
        );
        let controller = Controller::new(source, AggregatorConfig::default());
        let sink = RecordingSink::new();

        let report = controller
            .run(request(labels("app=x"), FollowMode::Once), sink.clone())
            .await
            .unwrap();

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].target.name, "b");
        assert!(!report.all_failed());
        assert_eq!(sink.lines_for("a"), vec!["a1"]);
        assert_eq!(sink.lines_for("c"), vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_all_failed() {
        let source = Arc::new(
            FakeSource::new()
                .with_pods(&["a"])
                .script("a", Script::failing(&[], "forbidden")),
        );
        let controller = Controller::new(source, AggregatorConfig::default());

        let report = controller
            .run(request(labels("app=x"), FollowMode::Once), RecordingSink::new())
            .await
            .unwrap();
        assert!(report.all_failed());
    }
}
