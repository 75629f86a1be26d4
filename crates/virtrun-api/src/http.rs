// crates/virtrun-api/src/http.rs
// ============================================================================
// Module: HTTP Cluster Client
// Description: reqwest-backed implementation of the facade traits.
// Purpose: Map REST verbs and status codes onto the client error taxonomy.
// Dependencies: crate::interfaces, reqwest, serde_json, tokio-stream, url
// ============================================================================

//! ## Overview
//! Thin typed wrapper over the cluster's REST API. Paths follow
//! `/apis/virtrun.io/v1/namespaces/{ns}/{plural}[/{name}]`; watches are
//! line-delimited JSON on the collection path with `watch=true`. This module
//! carries no logic of its own beyond the status-code mapping; everything the
//! harness depends on is expressed through [`crate::interfaces`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use tokio_stream::Stream;
use url::Url;

use crate::error::ClientError;
use crate::interfaces::Cluster;
use crate::interfaces::ClusterObject;
use crate::interfaces::Patch;
use crate::interfaces::PatchType;
use crate::interfaces::ResourceOps;
use crate::interfaces::WatchEvent;
use crate::interfaces::WatchStream;
use crate::meta::ResourceKind;
use crate::meta::Selector;
use crate::resources::Run;
use crate::resources::VirtualMachine;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// API group and version segment used by all resource paths.
const API_PREFIX: &str = "apis/virtrun.io/v1";

/// Default request timeout when none is configured.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Core Client
// ============================================================================

/// Shared REST plumbing for all typed operation sets.
#[derive(Debug)]
struct RestCore {
    client: Client,
    base_url: Url,
}

impl RestCore {
    fn collection_url(&self, kind: ResourceKind, namespace: &str) -> Result<Url, ClientError> {
        let path = format!("{API_PREFIX}/namespaces/{namespace}/{}", kind.plural());
        self.base_url.join(&path).map_err(|err| ClientError::Api {
            status: 0,
            message: format!("invalid collection url: {err}"),
        })
    }

    fn object_url(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Url, ClientError> {
        let path = format!("{API_PREFIX}/namespaces/{namespace}/{}/{name}", kind.plural());
        self.base_url.join(&path).map_err(|err| ClientError::Api {
            status: 0,
            message: format!("invalid object url: {err}"),
        })
    }
}

/// Maps a transport-level failure onto the taxonomy.
fn transport_error(err: &reqwest::Error) -> ClientError {
    ClientError::Transient {
        detail: err.to_string(),
    }
}

/// Maps a non-success response onto the taxonomy, consuming the body.
async fn status_error(
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    response: Response,
) -> ClientError {
    let status = response.status();
    let message = match response.text().await {
        Ok(body) => extract_message(&body),
        Err(err) => err.to_string(),
    };
    match status {
        StatusCode::NOT_FOUND => ClientError::not_found(kind.plural(), namespace, name),
        StatusCode::CONFLICT => ClientError::Conflict {
            name: name.to_string(),
            message,
        },
        StatusCode::UNPROCESSABLE_ENTITY => ClientError::AdmissionRejected {
            reason: message,
        },
        status if status.is_server_error() => ClientError::Transient {
            detail: format!("status {status}: {message}"),
        },
        status => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pulls the `message` field out of a JSON error body, falling back to the
/// raw text.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn selector_query(selector: &Selector) -> Option<String> {
    if selector.match_labels.is_empty() {
        return None;
    }
    let joined = selector
        .match_labels
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",");
    Some(joined)
}

// ============================================================================
// SECTION: Typed Operations
// ============================================================================

/// Per-kind operation set backed by the shared REST core.
#[derive(Debug)]
struct TypedOps<T> {
    core: Arc<RestCore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedOps<T> {
    fn new(core: Arc<RestCore>) -> Self {
        Self {
            core,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: ClusterObject> ResourceOps<T> for TypedOps<T> {
    async fn get(&self, namespace: &str, name: &str) -> Result<T, ClientError> {
        let url = self.core.object_url(T::KIND, namespace, name)?;
        let response =
            self.core.client.get(url).send().await.map_err(|err| transport_error(&err))?;
        if !response.status().is_success() {
            return Err(status_error(T::KIND, namespace, name, response).await);
        }
        response.json::<T>().await.map_err(|err| transport_error(&err))
    }

    async fn list(&self, namespace: &str, selector: &Selector) -> Result<Vec<T>, ClientError> {
        let mut url = self.core.collection_url(T::KIND, namespace)?;
        if let Some(labels) = selector_query(selector) {
            url.query_pairs_mut().append_pair("label_selector", &labels);
        }
        let response =
            self.core.client.get(url).send().await.map_err(|err| transport_error(&err))?;
        if !response.status().is_success() {
            return Err(status_error(T::KIND, namespace, "", response).await);
        }
        response.json::<Vec<T>>().await.map_err(|err| transport_error(&err))
    }

    async fn watch(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<WatchStream<T>, ClientError> {
        let mut url = self.core.collection_url(T::KIND, namespace)?;
        url.query_pairs_mut().append_pair("watch", "true");
        if let Some(labels) = selector_query(selector) {
            url.query_pairs_mut().append_pair("label_selector", &labels);
        }
        let response =
            self.core.client.get(url).send().await.map_err(|err| transport_error(&err))?;
        if !response.status().is_success() {
            return Err(status_error(T::KIND, namespace, "", response).await);
        }
        Ok(Box::pin(NdjsonEvents::new(response)))
    }

    async fn create(&self, object: &T) -> Result<T, ClientError> {
        let meta = object.meta();
        let url = self.core.collection_url(T::KIND, &meta.namespace)?;
        let response = self
            .core
            .client
            .post(url)
            .json(object)
            .send()
            .await
            .map_err(|err| transport_error(&err))?;
        if !response.status().is_success() {
            return Err(status_error(T::KIND, &meta.namespace, &meta.name, response).await);
        }
        response.json::<T>().await.map_err(|err| transport_error(&err))
    }

    async fn update(&self, object: &T) -> Result<T, ClientError> {
        let meta = object.meta();
        let url = self.core.object_url(T::KIND, &meta.namespace, &meta.name)?;
        let response = self
            .core
            .client
            .put(url)
            .json(object)
            .send()
            .await
            .map_err(|err| transport_error(&err))?;
        if !response.status().is_success() {
            return Err(status_error(T::KIND, &meta.namespace, &meta.name, response).await);
        }
        response.json::<T>().await.map_err(|err| transport_error(&err))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let url = self.core.object_url(T::KIND, namespace, name)?;
        let response =
            self.core.client.delete(url).send().await.map_err(|err| transport_error(&err))?;
        if !response.status().is_success() {
            return Err(status_error(T::KIND, namespace, name, response).await);
        }
        Ok(())
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Patch) -> Result<T, ClientError> {
        let url = self.core.object_url(T::KIND, namespace, name)?;
        let content_type = match patch.patch_type {
            PatchType::Merge => "application/merge-patch+json",
            PatchType::Json => "application/json-patch+json",
        };
        let response = self
            .core
            .client
            .patch(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .json(&patch.body)
            .send()
            .await
            .map_err(|err| transport_error(&err))?;
        if !response.status().is_success() {
            return Err(status_error(T::KIND, namespace, name, response).await);
        }
        response.json::<T>().await.map_err(|err| transport_error(&err))
    }
}

// ============================================================================
// SECTION: Watch Stream Decoding
// ============================================================================

/// Decodes a line-delimited JSON body into watch events.
struct NdjsonEvents<T> {
    body: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buffer: Vec<u8>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> NdjsonEvents<T> {
    fn new(response: Response) -> Self {
        Self {
            body: Box::pin(response.bytes_stream()),
            buffer: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Splits one complete line off the buffer, skipping blank lines.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }
}

impl<T: ClusterObject> Stream for NdjsonEvents<T> {
    type Item = Result<WatchEvent<T>, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.take_line() {
                let parsed = serde_json::from_slice::<WatchEvent<T>>(&line).map_err(|err| {
                    ClientError::Api {
                        status: 0,
                        message: format!("malformed watch event: {err}"),
                    }
                });
                return Poll::Ready(Some(parsed));
            }
            match self.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.buffer.extend_from_slice(&chunk),
                Poll::Ready(Some(Err(err))) => {
                    return Poll::Ready(Some(Err(transport_error(&err))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ============================================================================
// SECTION: Cluster Implementation
// ============================================================================

/// reqwest-backed cluster facade.
#[derive(Debug)]
pub struct HttpCluster {
    core: Arc<RestCore>,
    runs: TypedOps<Run>,
    vms: TypedOps<VirtualMachine>,
}

impl HttpCluster {
    /// Builds a cluster client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] when the URL is invalid or the HTTP
    /// client cannot be constructed.
    pub fn new(base_url: &str, request_timeout: Option<Duration>) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|err| ClientError::Api {
            status: 0,
            message: format!("invalid base url: {err}"),
        })?;
        let client = Client::builder()
            .timeout(request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()
            .map_err(|err| ClientError::Api {
                status: 0,
                message: format!("failed to build http client: {err}"),
            })?;
        let core = Arc::new(RestCore {
            client,
            base_url,
        });
        Ok(Self {
            runs: TypedOps::new(Arc::clone(&core)),
            vms: TypedOps::new(Arc::clone(&core)),
            core,
        })
    }
}

#[async_trait]
impl Cluster for HttpCluster {
    fn runs(&self) -> &dyn ResourceOps<Run> {
        &self.runs
    }

    fn vms(&self) -> &dyn ResourceOps<VirtualMachine> {
        &self.vms
    }

    async fn run_logs(&self, namespace: &str, name: &str) -> Result<String, ClientError> {
        let path = format!("{API_PREFIX}/namespaces/{namespace}/runs/{name}/log");
        let url = self.core.base_url.join(&path).map_err(|err| ClientError::Api {
            status: 0,
            message: format!("invalid log url: {err}"),
        })?;
        let response =
            self.core.client.get(url).send().await.map_err(|err| transport_error(&err))?;
        if !response.status().is_success() {
            return Err(status_error(ResourceKind::Run, namespace, name, response).await);
        }
        response.text().await.map_err(|err| transport_error(&err))
    }
}
