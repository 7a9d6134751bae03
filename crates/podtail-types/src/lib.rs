//! Shared types for podtail
//!
//! This crate contains data structures used across multiple podtail crates.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

// ============================================================================
// Target Types
// ============================================================================

/// Identity of one pod whose log output is streamed
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub namespace: String,
    pub name: String,
}

impl Target {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// How the run picks its targets
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetSelector {
    /// A single pod, streamed without a lookup
    Pod(String),
    /// Every pod matching a label selector, looked up once at start
    Labels(String),
}

impl TargetSelector {
    /// Build a selector from the `--pod` / `--labels` pair.
    ///
    /// Exactly one of the two must be set; empty strings count as unset.
    pub fn from_flags(pod: Option<&str>, labels: Option<&str>) -> Result<Self, ConfigError> {
        let pod = pod.map(str::trim).filter(|p| !p.is_empty());
        let labels = labels.map(str::trim).filter(|l| !l.is_empty());

        match (pod, labels) {
            (Some(pod), None) => Ok(Self::Pod(pod.to_string())),
            (None, Some(labels)) => Ok(Self::Labels(labels.to_string())),
            (Some(pod), Some(labels)) => Err(ConfigError::ConflictingSelectors {
                pod: pod.to_string(),
                labels: labels.to_string(),
            }),
            (None, None) => Err(ConfigError::MissingSelector),
        }
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pod(name) => write!(f, "pod {}", name),
            Self::Labels(selector) => write!(f, "selector '{}'", selector),
        }
    }
}

/// Invalid or incomplete invocation, detected before any cluster call
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no labels provided (required when --pod is omitted)")]
    MissingSelector,

    #[error("--pod '{pod}' and --labels '{labels}' are mutually exclusive")]
    ConflictingSelectors { pod: String, labels: String },

    #[error("{key} must be greater than zero")]
    ZeroLimit { key: &'static str },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ============================================================================
// Log Types
// ============================================================================

/// Whether streams stop at the current end of output or keep waiting for more
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FollowMode {
    /// Read what the server has buffered, then stop
    #[default]
    Once,
    /// Keep the stream open until it is cancelled or closed remotely
    Follow,
}

impl FollowMode {
    pub fn is_follow(&self) -> bool {
        matches!(self, Self::Follow)
    }
}

impl From<bool> for FollowMode {
    fn from(follow: bool) -> Self {
        if follow { Self::Follow } else { Self::Once }
    }
}

/// Per-run options for opening a pod log stream
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub follow: FollowMode,

    /// Container to read (required by the API server for multi-container pods)
    pub container: Option<String>,

    /// Only the last N lines of each stream
    pub tail_lines: Option<i64>,

    /// Only lines newer than this many seconds
    pub since_seconds: Option<i64>,

    /// Ask the server to prefix each line with an RFC3339 timestamp
    pub timestamps: bool,

    /// Read the previous terminated container instance
    pub previous: bool,
}

impl LogOptions {
    pub fn new(follow: FollowMode) -> Self {
        Self {
            follow,
            ..Default::default()
        }
    }
}

/// One decoded line and the pod it came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Source pod (shared by every record of the same stream)
    pub source: Arc<Target>,

    /// Line text without its terminator
    pub line: String,
}

impl LogRecord {
    pub fn new(source: Arc<Target>, line: String) -> Self {
        Self { source, line }
    }

    /// Name of the pod that produced this line
    pub fn pod_name(&self) -> &str {
        &self.source.name
    }
}

// ============================================================================
// Lifecycle Types
// ============================================================================

/// Phase of one invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RunState {
    /// Resolving targets
    #[default]
    Starting,
    /// Workers active, fan-in channel open
    Streaming,
    /// Channel closed, sink finishing
    Draining,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::Draining => "draining",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
