use std::io;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure to turn the selector into a non-empty set of pods
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("error listing pods in namespace {namespace}")]
    Lookup {
        namespace: String,
        #[source]
        source: BoxError,
    },

    #[error("no pod found in namespace {namespace} for selector '{selector}'")]
    NoMatches { namespace: String, selector: String },
}

/// Failure of a single pod stream after it was started
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("error reading logs: {0}")]
    Io(#[from] io::Error),

    #[error("log line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("stream task aborted: {0}")]
    Aborted(String),
}

/// Fatal failure of a whole run
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("failed to write log output")]
    Sink(#[source] io::Error),

    #[error("drain task aborted: {0}")]
    DrainAborted(String),
}

impl RunError {
    /// Short stable label for log fields
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "resolution",
            Self::Sink(_) => "sink",
            Self::DrainAborted(_) => "drain_aborted",
        }
    }
}
