//! Log streaming engine for podtail
//!
//! Resolves the pods to follow, runs one stream task per pod, and fans their
//! lines into a single bounded channel consumed by one sink.

mod aggregator;
mod decoder;
mod error;
mod filter;
mod lifecycle;
mod resolver;
mod sink;
mod worker;

#[cfg(test)]
mod testing;

pub use aggregator::{
    Aggregator, AggregatorConfig, DEFAULT_CHANNEL_CAPACITY, Draining, Streaming, TargetReport,
};
pub use decoder::{DEFAULT_MAX_LINE_BYTES, LineDecoder};
pub use error::{BoxError, ResolutionError, RunError, StreamError};
pub use filter::CompiledFilter;
pub use lifecycle::{Controller, RunReport, RunRequest};
pub use resolver::resolve;
pub use sink::{FilteredSink, JsonSink, LineSink, TextSink};
pub use worker::{StreamWorker, WorkerOutcome};

// Re-export types used in our public API
pub use podtail_types::{FollowMode, LogOptions, LogRecord, RunState, Target, TargetSelector};
