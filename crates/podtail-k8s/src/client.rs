use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::AsyncBufReadExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::debug;

use podtail_types::{LogOptions, Target};

use crate::source::{LogChunks, PodSource};

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct KubeClient {
    client: kube::Client,
    context: Option<String>,
}

impl KubeClient {
    /// Create a client from the kubeconfig.
    ///
    /// `kubeconfig` overrides the default lookup (`KUBECONFIG`, then
    /// `~/.kube/config`); `context` overrides the current context.
    pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Self> {
        let kubeconfig = match kubeconfig {
            Some(path) => Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig at {}", path.display()))?,
            None => {
                Kubeconfig::read().context("Failed to read kubeconfig. Is kubectl configured?")?
            }
        };

        let context = context
            .map(str::to_string)
            .or_else(|| kubeconfig.current_context.clone());

        let config = kube::Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: context.clone(),
                ..Default::default()
            },
        )
        .await
        .context(format!(
            "Failed to create config for context: {}",
            context.as_deref().unwrap_or("<current>")
        ))?;

        let client = kube::Client::try_from(config).context(format!(
            "Failed to create client for context: {}",
            context.as_deref().unwrap_or("<current>")
        ))?;

        Ok(Self { client, context })
    }

    /// Get the context name the client was built for
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

#[async_trait]
impl PodSource for KubeClient {
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Target>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods
            .list(&ListParams::default().labels(selector))
            .await
            .context(format!(
                "Failed to list pods in {} with selector '{}'",
                namespace, selector
            ))?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|pod| {
                let name = pod.metadata.name?;
                let namespace = pod
                    .metadata
                    .namespace
                    .unwrap_or_else(|| namespace.to_string());
                Some(Target::new(namespace, name))
            })
            .collect())
    }

    fn log_stream(&self, target: &Target, options: &LogOptions) -> LogChunks {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let pod_name = target.name.clone();
        let params = log_params(options);

        Box::pin(async_stream::stream! {
            debug!(pod = %pod_name, follow = params.follow, "opening log stream");
            let reader = match api.log_stream(&pod_name, &params).await {
                Ok(reader) => reader,
                Err(e) => {
                    yield Err(io::Error::other(format!(
                        "failed to stream pod '{}': {}",
                        pod_name, e
                    )));
                    return;
                }
            };
            let mut reader = Box::pin(reader);

            loop {
                let chunk = match reader.fill_buf().await {
                    Ok([]) => break,
                    Ok(buf) => Bytes::copy_from_slice(buf),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };
                reader.consume_unpin(chunk.len());
                yield Ok(chunk);
            }
        })
    }
}

/// Translate run options into the API server's log query
pub fn log_params(options: &LogOptions) -> LogParams {
    LogParams {
        follow: options.follow.is_follow(),
        container: options.container.clone(),
        // since_seconds wins over tail_lines, same as kubectl
        tail_lines: if options.since_seconds.is_some() {
            None
        } else {
            options.tail_lines
        },
        since_seconds: options.since_seconds,
        timestamps: options.timestamps,
        previous: options.previous,
        ..Default::default()
    }
}
