use std::io;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use podtail_types::{LogOptions, Target};

/// Raw log bytes of one pod, in the order the server sent them.
///
/// The stream owns its connection; dropping it releases the connection.
pub type LogChunks = BoxStream<'static, io::Result<Bytes>>;

/// Cluster operations the log engine depends on
#[async_trait]
pub trait PodSource: Send + Sync + 'static {
    /// List the pods in `namespace` matching a label selector
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Target>>;

    /// Open the log stream of one pod.
    ///
    /// Opening is lazy: connection failures surface as the first item of the
    /// stream. No retry or reconnect happens behind the caller's back.
    fn log_stream(&self, target: &Target, options: &LogOptions) -> LogChunks;
}
