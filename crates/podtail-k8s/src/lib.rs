//! Kubernetes client for podtail
//!
//! This crate provides the cluster-facing side of podtail: listing pods by
//! label selector and opening pod log streams.

mod client;
mod source;

pub use client::{KubeClient, log_params};
pub use source::{LogChunks, PodSource};

// Re-export types that are used in our public API
pub use podtail_types::{LogOptions, Target};
