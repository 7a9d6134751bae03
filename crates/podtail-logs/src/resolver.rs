use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use podtail_k8s::PodSource;
use podtail_types::{Target, TargetSelector};

use crate::error::ResolutionError;

/// Turn a selector into the set of pods to stream, once.
///
/// A named pod is taken as-is without a lookup; a label selector costs one
/// list call. Returns `Ok(None)` when cancelled while the lookup is in flight.
pub async fn resolve<S: PodSource>(
    source: &S,
    namespace: &str,
    selector: &TargetSelector,
    cancel: &CancellationToken,
) -> Result<Option<Vec<Target>>, ResolutionError> {
    let labels = match selector {
        TargetSelector::Pod(name) => return Ok(Some(vec![Target::new(namespace, name.as_str())])),
        TargetSelector::Labels(labels) => labels,
    };

    let listed = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("pod lookup cancelled");
            return Ok(None);
        }
        listed = source.list_pods(namespace, labels) => listed,
    };

    let pods = listed.map_err(|e| ResolutionError::Lookup {
        namespace: namespace.to_string(),
        source: e.into(),
    })?;

    // Sorted and de-duplicated, so stream start order is stable
    let targets: Vec<Target> = pods.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    if targets.is_empty() {
        return Err(ResolutionError::NoMatches {
            namespace: namespace.to_string(),
            selector: labels.clone(),
        });
    }

    Ok(Some(targets))
}
