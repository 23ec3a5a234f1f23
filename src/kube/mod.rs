//! Remote command execution against a container in a Kubernetes cluster.
//!
//! The executor resolves its target freshly on every call: pods are listed
//! by label selector and the named container is looked up in the winning
//! pod, so restarts and rescheduling between firings are tolerated. The
//! command itself runs through `sh -c` over the exec subresource WebSocket.

mod error;
mod exec;

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use url::Url;

use crate::config::KubernetesConfig;

pub use error::KubeError;

/// Identifies which container every exec call targets. Immutable; shared
/// read-only across all calls from one job instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PodSelector {
    /// Namespace to search for candidate pods.
    pub namespace: String,
    /// Label selector filtering the pod listing.
    pub label_selector: String,
    /// Container name resolved within the winning pod.
    pub container_name: String,
}

/// Concrete exec target resolved for a single call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteTarget {
    /// Name of the resolved pod.
    pub pod_name: String,
    /// Namespace of the resolved pod.
    pub pod_namespace: String,
    /// Container name confirmed to exist in the pod.
    pub container_name: String,
}

/// Future returned by [`RemoteExecutor::exec`].
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<String, KubeError>> + Send + 'a>>;

/// Capability to run a shell command inside the configured remote container.
///
/// Jobs depend on this seam rather than on [`KubeExecutor`] so tests can
/// script outcomes without a cluster.
pub trait RemoteExecutor: Send + Sync {
    /// Runs `command` through `sh -c` in the target container, returning its
    /// stdout.
    ///
    /// # Errors
    ///
    /// Returns [`KubeError::PodNotFound`] / [`KubeError::ContainerNotFound`]
    /// when resolution fails, [`KubeError::Transport`] on any I/O or protocol
    /// failure, and [`KubeError::RemoteCommand`] when the remote process
    /// wrote to stderr.
    fn exec<'a>(&'a self, command: &'a str) -> ExecFuture<'a>;
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: PodMetadata,
    spec: PodSpec,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
    namespace: String,
}

#[derive(Debug, Deserialize)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<ContainerSpec>,
}

#[derive(Debug, Deserialize)]
struct ContainerSpec {
    name: String,
}

/// Picks the exec target out of a pod listing.
///
/// The first listed pod wins when several match the selector; the API
/// imposes no ordering beyond its default, and the expected deployment only
/// ever matches one pod.
fn select_target(list: &PodList, selector: &PodSelector) -> Result<RemoteTarget, KubeError> {
    let pod = list.items.first().ok_or_else(|| KubeError::PodNotFound {
        namespace: selector.namespace.clone(),
        label_selector: selector.label_selector.clone(),
    })?;

    let container = pod
        .spec
        .containers
        .iter()
        .find(|container| container.name == selector.container_name)
        .ok_or_else(|| KubeError::ContainerNotFound {
            container: selector.container_name.clone(),
            namespace: pod.metadata.namespace.clone(),
            pod: pod.metadata.name.clone(),
        })?;

    Ok(RemoteTarget {
        pod_name: pod.metadata.name.clone(),
        pod_namespace: pod.metadata.namespace.clone(),
        container_name: container.name.clone(),
    })
}

/// Executor that speaks to the cluster control plane directly: pod listing
/// over the REST API, command execution over the exec WebSocket.
#[derive(Clone, Debug)]
pub struct KubeExecutor {
    http: reqwest::Client,
    base: Url,
    bearer_token: String,
    insecure: bool,
    selector: PodSelector,
}

impl KubeExecutor {
    /// Constructs an executor from the Kubernetes configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KubeError::Endpoint`] when the API host is not a valid URL
    /// and [`KubeError::Client`] when the HTTP client cannot be built.
    pub fn new(config: &KubernetesConfig) -> Result<Self, KubeError> {
        let base = Url::parse(&config.host).map_err(|err| KubeError::Endpoint {
            message: format!("{}: {err}", config.host),
        })?;
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|err| KubeError::Client {
                message: err.to_string(),
            })?;

        Ok(Self {
            http,
            base,
            bearer_token: config.bearer_token.clone(),
            insecure: config.insecure,
            selector: PodSelector {
                namespace: config.namespace.clone(),
                label_selector: config.label_selector.clone(),
                container_name: config.container_name.clone(),
            },
        })
    }

    /// Returns the selector this executor resolves on every call.
    #[must_use]
    pub const fn selector(&self) -> &PodSelector {
        &self.selector
    }

    /// Resolves the target pod and container for one exec call.
    async fn resolve_target(&self) -> Result<RemoteTarget, KubeError> {
        let mut url = self.base.clone();
        url.set_path(&format!(
            "/api/v1/namespaces/{}/pods",
            self.selector.namespace
        ));

        let list: PodList = self
            .http
            .get(url)
            .query(&[("labelSelector", self.selector.label_selector.as_str())])
            .bearer_auth(&self.bearer_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        select_target(&list, &self.selector)
    }

    /// Builds the exec subresource URL for the resolved target.
    fn exec_url(&self, target: &RemoteTarget, command: &str) -> Result<String, KubeError> {
        let mut url = self.base.clone();
        url.set_path(&format!(
            "/api/v1/namespaces/{}/pods/{}/exec",
            target.pod_namespace, target.pod_name
        ));
        url.query_pairs_mut()
            .append_pair("container", &target.container_name)
            .append_pair("command", "sh")
            .append_pair("command", "-c")
            .append_pair("command", command)
            .append_pair("stdin", "false")
            .append_pair("stdout", "true")
            .append_pair("stderr", "true")
            .append_pair("tty", "false");

        let ws_scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(KubeError::Endpoint {
                    message: format!("unsupported API scheme '{other}'"),
                });
            }
        };
        let rest = url
            .as_str()
            .split_once("://")
            .map(|(_, tail)| tail.to_owned())
            .ok_or_else(|| KubeError::Endpoint {
                message: format!("malformed exec URL: {url}"),
            })?;
        Ok(format!("{ws_scheme}://{rest}"))
    }

    /// Resolves the target and runs `command` to completion.
    ///
    /// # Errors
    ///
    /// See [`RemoteExecutor::exec`].
    pub async fn run_command(&self, command: &str) -> Result<String, KubeError> {
        let target = self.resolve_target().await?;
        tracing::debug!(
            pod = %target.pod_name,
            namespace = %target.pod_namespace,
            container = %target.container_name,
            "resolved exec target"
        );
        let ws_url = self.exec_url(&target, command)?;
        exec::stream_exec(&ws_url, &self.bearer_token, self.insecure).await
    }
}

impl RemoteExecutor for KubeExecutor {
    fn exec<'a>(&'a self, command: &'a str) -> ExecFuture<'a> {
        Box::pin(self.run_command(command))
    }
}
