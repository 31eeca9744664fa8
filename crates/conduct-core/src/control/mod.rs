//! Control API client.
//!
//! Public API: no status code knowledge. All status mapping in http.rs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, Instrument, Span};

use crate::config::{ApiVersion, ControlConfig};
use crate::error::{ConductError, ConductResult};
use crate::poll::StatusSource;
use crate::resolver::ResolvedArtifact;
use crate::sse::{self, EventStream};

mod http;

use http::HttpBackend;

/// Request timeout for bundle uploads.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Bundle id returned by load/run/stop/unload requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleAck {
    pub bundle_id: String,
}

/// One line of bundle log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub host: String,
    pub message: String,
}

/// Multipart payload for `load`.
#[derive(Debug, Clone)]
pub struct BundleUpload {
    pub bundle: ResolvedArtifact,

    /// `bundle.conf` extracted from the bundle.
    pub bundle_conf: String,

    pub configuration: Option<ResolvedArtifact>,

    /// `bundle.conf` extracted from the configuration, overlaid on the
    /// bundle's own.
    pub bundle_conf_overlay: Option<String>,
}

/// Control API client.
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: HttpBackend,
    /// No total timeout: event streams stay open indefinitely.
    stream_client: reqwest::Client,
    span: Span,
}

impl ControlClient {
    pub fn new(config: ControlConfig, span: Span) -> ConductResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers.clone())
            .build()
            .map_err(|e| ConductError::Transport {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        let stream_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ConductError::Transport {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend { client, config },
            stream_client,
            span,
        })
    }

    pub fn config(&self) -> &ControlConfig {
        &self.http.config
    }

    fn url(&self, path: &str) -> String {
        self.http.config.url(path)
    }

    /// Upload a bundle (and optional configuration).
    ///
    /// Only the API version 2 form is supported.
    pub async fn load_bundle(&self, upload: BundleUpload) -> ConductResult<BundleAck> {
        if self.http.config.api_version == ApiVersion::V1 {
            return Err(ConductError::Config {
                message: "load requires API version 2".to_string(),
            });
        }
        let url = self.url("bundles");
        async {
            debug!(url = %url, bundle = %upload.bundle.name, "uploading bundle");
            let form = multipart_form(upload).await?;
            let request = self
                .http
                .client
                .post(&url)
                .multipart(form)
                .timeout(LOAD_TIMEOUT);
            decode(self.http.send(request).await?).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Request `scale` instances of a bundle.
    pub async fn run_bundle(
        &self,
        bundle: &str,
        scale: u32,
        affinity: Option<&str>,
    ) -> ConductResult<BundleAck> {
        let path = match affinity {
            Some(_) if self.http.config.api_version == ApiVersion::V1 => {
                return Err(ConductError::Config {
                    message: "affinity is only available from API version 2 onwards".to_string(),
                })
            }
            Some(affinity) => format!(
                "bundles/{}?scale={}&affinity={}",
                encode(bundle),
                scale,
                encode(affinity)
            ),
            None => format!("bundles/{}?scale={}", encode(bundle), scale),
        };
        self.put(&path).await
    }

    /// Scale a bundle down to zero.
    pub async fn stop_bundle(&self, bundle: &str) -> ConductResult<BundleAck> {
        self.put(&format!("bundles/{}?scale=0", encode(bundle))).await
    }

    /// Remove a bundle from the cluster.
    pub async fn unload_bundle(&self, bundle: &str) -> ConductResult<BundleAck> {
        let url = self.url(&format!("bundles/{}", encode(bundle)));
        async {
            debug!(url = %url, "unloading bundle");
            decode(self.http.send(self.http.client.delete(&url)).await?).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// All bundles known to the cluster, as reported by the control API.
    pub async fn bundles(&self) -> ConductResult<Vec<Value>> {
        let url = self.url("bundles");
        async {
            debug!(url = %url, "listing bundles");
            decode(self.http.get(&url).await?).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Most recent log lines of a bundle.
    pub async fn logs(&self, bundle: &str, count: u32) -> ConductResult<Vec<LogEntry>> {
        let url = self.url(&format!("bundles/{}/logs?count={}", encode(bundle), count));
        async {
            debug!(url = %url, "fetching bundle logs");
            decode(self.http.get(&url).await?).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// URL of the bundle event stream.
    pub fn bundle_events_url(&self) -> String {
        self.url("bundles/events")
    }

    /// Subscribe to bundle events.
    pub async fn subscribe_bundle_events(&self) -> ConductResult<EventStream<reqwest::Response>> {
        let url = self.bundle_events_url();
        sse::subscribe(&self.stream_client, &url)
            .instrument(self.span.clone())
            .await
    }

    async fn put(&self, path: &str) -> ConductResult<BundleAck> {
        let url = self.url(path);
        async {
            debug!(url = %url, "sending bundle request");
            decode(self.http.send(self.http.client.put(&url)).await?).await
        }
        .instrument(self.span.clone())
        .await
    }
}

#[async_trait]
impl StatusSource for ControlClient {
    /// The bundle object whose `bundleId` matches, or `Null`. No retries:
    /// the poller treats a failed request as a failed check.
    async fn fetch_status(&self, target: &str) -> ConductResult<Value> {
        let url = self.url("bundles");
        let response = self.http.send(self.http.client.get(&url)).await?;
        let bundles: Vec<Value> = decode(response).await?;
        Ok(find_bundle(bundles, target))
    }
}

fn find_bundle(bundles: Vec<Value>, bundle_id: &str) -> Value {
    bundles
        .into_iter()
        .find(|b| b.get("bundleId").and_then(Value::as_str) == Some(bundle_id))
        .unwrap_or(Value::Null)
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ConductResult<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ConductError::InvalidResponse {
        message: format!("unexpected response body: {}", e),
    })
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

async fn file_part(artifact: &ResolvedArtifact) -> ConductResult<Part> {
    let bytes = tokio::fs::read(&artifact.path)
        .await
        .map_err(|e| ConductError::Config {
            message: format!("failed to read {}: {}", artifact.path.display(), e),
        })?;
    Ok(Part::bytes(bytes).file_name(artifact.name.clone()))
}

/// Field order: `bundleConf`, `bundleConfOverlay`, `bundle`, `configuration`.
async fn multipart_form(upload: BundleUpload) -> ConductResult<Form> {
    let mut form = Form::new().part(
        "bundleConf",
        Part::text(upload.bundle_conf).file_name("bundle.conf"),
    );
    if let Some(overlay) = upload.bundle_conf_overlay {
        form = form.part(
            "bundleConfOverlay",
            Part::text(overlay).file_name("bundle.conf"),
        );
    }
    form = form.part("bundle", file_part(&upload.bundle).await?);
    if let Some(configuration) = &upload.configuration {
        form = form.part("configuration", file_part(configuration).await?);
    }
    Ok(form)
}
