//! Symbolic bundle names looked up in a bundle registry.
//!
//! `GET {registry}/bundles/{name}/{version|latest}` answers with a
//! [`RegistryEntry`] whose `download_url` is then handed to the URI
//! resolver, so registry bundles share the resolve cache.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{download_client, Resolution, Resolver, UriResolver};
use crate::cache::BundleCache;
use crate::config::RegistrySettings;
use crate::error::{ConductError, ConductResult};

/// Parsed symbolic reference: `[org/]name[:version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleCoordinates {
    pub org: Option<String>,
    pub name: String,
    pub version: Option<String>,
}

impl BundleCoordinates {
    /// Parse a symbolic reference. Returns `None` for anything that looks
    /// like a path or URI.
    ///
    /// ```
    /// use conduct_core::resolver::BundleCoordinates;
    ///
    /// let coords = BundleCoordinates::parse("typesafe/visualizer:1.1").unwrap();
    /// assert_eq!(coords.org.as_deref(), Some("typesafe"));
    /// assert_eq!(coords.name, "visualizer");
    /// assert_eq!(coords.version.as_deref(), Some("1.1"));
    ///
    /// assert!(BundleCoordinates::parse("./visualizer.zip").is_none());
    /// ```
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.contains("://") || reference.ends_with(".zip") {
            return None;
        }

        let (path, version) = match reference.split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (reference, None),
        };

        if let Some(version) = version {
            if !is_token(version) {
                return None;
            }
        }

        let (org, name) = match path.split_once('/') {
            Some((org, name)) => (Some(org), name),
            None => (None, path),
        };

        if !is_token(name) || org.map(|o| !is_token(o)).unwrap_or(false) {
            return None;
        }

        Some(Self {
            org: org.map(String::from),
            name: name.to_string(),
            version: version.map(String::from),
        })
    }

    fn lookup_path(&self) -> String {
        let name = match &self.org {
            Some(org) => format!("{}/{}", org, self.name),
            None => self.name.clone(),
        };
        format!(
            "bundles/{}/{}",
            name,
            self.version.as_deref().unwrap_or("latest")
        )
    }
}

/// Names must start alphanumeric and contain only `[A-Za-z0-9._-]`.
fn is_token(value: &str) -> bool {
    value
        .chars()
        .next()
        .map(|c| c.is_ascii_alphanumeric())
        .unwrap_or(false)
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Registry answer for a bundle lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,

    pub version: String,

    /// Where the bundle file can be downloaded.
    pub download_url: String,
}

/// Resolves symbolic names through a bundle registry.
#[derive(Debug, Clone)]
pub struct RegistryResolver {
    client: reqwest::Client,
    settings: Option<RegistrySettings>,
    uri: UriResolver,
}

impl RegistryResolver {
    /// Without settings every reference is not applicable.
    pub fn new(settings: Option<RegistrySettings>) -> ConductResult<Self> {
        let client = download_client()?;
        Ok(Self {
            uri: UriResolver::with_client(client.clone()),
            client,
            settings,
        })
    }

    async fn lookup(
        &self,
        settings: &RegistrySettings,
        coords: &BundleCoordinates,
    ) -> ConductResult<RegistryEntry> {
        let url = format!(
            "{}/{}",
            settings.url.trim_end_matches('/'),
            coords.lookup_path()
        );
        debug!(url = %url, "looking up bundle in registry");

        let mut request = self.client.get(&url);
        if let Some(token) = &settings.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConductError::Http {
                status: status.as_u16(),
                message: format!("registry lookup failed for {}", url),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ConductError::InvalidResponse {
                message: format!("failed to parse registry entry: {}", e),
            })
    }
}

#[async_trait]
impl Resolver for RegistryResolver {
    fn name(&self) -> &str {
        "registry"
    }

    async fn resolve(&self, cache: &BundleCache, reference: &str) -> ConductResult<Resolution> {
        let Some(settings) = &self.settings else {
            return Ok(Resolution::NotApplicable);
        };
        let Some(coords) = BundleCoordinates::parse(reference) else {
            return Ok(Resolution::NotApplicable);
        };

        let entry = match self.lookup(settings, &coords).await {
            Ok(entry) => entry,
            Err(e) if e.is_transport() || matches!(e, ConductError::InvalidResponse { .. }) => {
                warn!(reference, error = %e, "registry lookup failed");
                return Ok(Resolution::not_found(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        debug!(
            reference,
            version = %entry.version,
            download_url = %entry.download_url,
            "registry entry found"
        );
        self.uri.resolve(cache, &entry.download_url).await
    }
}
