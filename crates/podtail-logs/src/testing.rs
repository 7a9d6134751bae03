//! In-memory stand-ins for the cluster and the output, used by unit tests

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use parking_lot::Mutex;

use podtail_k8s::{LogChunks, PodSource};
use podtail_types::{LogOptions, LogRecord, Target};

use crate::sink::LineSink;

/// What a fake pod stream does
#[derive(Clone, Debug)]
pub enum Script {
    /// Emit the lines, then end
    Lines(Vec<String>),
    /// Emit the lines, then fail with the message
    Fail(Vec<String>, String),
    /// Emit the lines, then block forever
    Endless(Vec<String>),
    /// Emit raw chunks, then end
    Raw(Vec<Vec<u8>>),
}

impl Script {
    pub fn lines(lines: &[&str]) -> Self {
        Self::Lines(owned(lines))
    }

    pub fn failing(lines: &[&str], message: &str) -> Self {
        Self::Fail(owned(lines), message.to_string())
    }

    pub fn endless(lines: &[&str]) -> Self {
        Self::Endless(owned(lines))
    }
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

fn line_chunks(lines: Vec<String>) -> Vec<io::Result<Bytes>> {
    lines
        .into_iter()
        .map(|line| Ok(Bytes::from(format!("{}\n", line))))
        .collect()
}

#[derive(Clone, Debug)]
enum Listing {
    Pods(Vec<String>),
    Error(String),
    Hang,
}

/// Scripted `PodSource`
pub struct FakeSource {
    listing: Listing,
    scripts: HashMap<String, Script>,
    list_calls: AtomicUsize,
    opened: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            listing: Listing::Pods(Vec::new()),
            scripts: HashMap::new(),
            list_calls: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
        }
    }

    /// Pods returned by `list_pods`, whatever the selector
    pub fn with_pods(mut self, pods: &[&str]) -> Self {
        self.listing = Listing::Pods(owned(pods));
        self
    }

    pub fn with_list_error(mut self, message: &str) -> Self {
        self.listing = Listing::Error(message.to_string());
        self
    }

    /// `list_pods` never returns
    pub fn with_hanging_list(mut self) -> Self {
        self.listing = Listing::Hang;
        self
    }

    pub fn script(mut self, pod: &str, script: Script) -> Self {
        self.scripts.insert(pod.to_string(), script);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of log streams opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PodSource for FakeSource {
    async fn list_pods(&self, namespace: &str, _selector: &str) -> Result<Vec<Target>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.listing {
            Listing::Pods(pods) => Ok(pods.iter().map(|p| Target::new(namespace, p)).collect()),
            Listing::Error(message) => Err(anyhow!(message.clone())),
            Listing::Hang => futures::future::pending().await,
        }
    }

    fn log_stream(&self, target: &Target, _options: &LogOptions) -> LogChunks {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(&target.name)
            .cloned()
            .unwrap_or(Script::Lines(Vec::new()));

        match script {
            Script::Lines(lines) => stream::iter(line_chunks(lines)).boxed(),
            Script::Fail(lines, message) => stream::iter(line_chunks(lines))
                .chain(stream::once(async move { Err(io::Error::other(message)) }))
                .boxed(),
            Script::Endless(lines) => stream::iter(line_chunks(lines))
                .chain(stream::pending())
                .boxed(),
            Script::Raw(chunks) => stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
                .boxed(),
        }
    }
}

/// Sink that records every record it is given
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<LogRecord>>>,
    delay: Option<Duration>,
    fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep on every write, to simulate a slow consumer
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail every write after `n` successful ones
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Lines written for one pod, in write order
    pub fn lines_for(&self, pod: &str) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.pod_name() == pod)
            .map(|r| r.line.clone())
            .collect()
    }
}

impl LineSink for RecordingSink {
    fn write_record(&mut self, record: &LogRecord) -> io::Result<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let mut records = self.records.lock();
        if self.fail_after.is_some_and(|n| records.len() >= n) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        records.push(record.clone());
        Ok(())
    }
}
