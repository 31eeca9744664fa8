//! Bundle resolution.
//!
//! A reference is turned into a local file by trying resolvers in a
//! configured order (see [`ResolverChain`]):
//! 1. Local file (used in place, never cached)
//! 2. URI (`http://`, `https://`, `file://` or bare file name, cached)
//! 3. Registry (symbolic `name[:version]`, funnels into the URI resolver)

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::BundleCache;
use crate::error::{ConductError, ConductResult};

mod chain;
mod local;
mod registry;
mod uri;

pub use chain::{resolve_bundle, ResolverChain};
pub use local::LocalResolver;
pub use registry::{BundleCoordinates, RegistryEntry, RegistryResolver};
pub use uri::{canonical_url, UriResolver};

/// A bundle materialized as a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Name shown to the operator and used as the upload file name.
    pub name: String,

    /// Existing regular file.
    pub path: PathBuf,
}

/// Result of a single resolver attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The resolver produced the bundle.
    Resolved(ResolvedArtifact),

    /// The reference is not of a kind this resolver handles.
    NotApplicable,

    /// The resolver handles this kind of reference but could not obtain it.
    NotFound { reason: String },
}

impl Resolution {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved(artifact) => write!(f, "resolved {}", artifact.path.display()),
            Self::NotApplicable => write!(f, "not applicable"),
            Self::NotFound { reason } => write!(f, "not found: {}", reason),
        }
    }
}

/// One way of turning a reference into a local file.
///
/// "Not applicable" and "not found" are `Ok` results; `Err` is reserved for
/// unexpected local failures such as an uncreatable cache directory.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &str;

    async fn resolve(&self, cache: &BundleCache, reference: &str) -> ConductResult<Resolution>;
}

/// HTTP client for bundle downloads and registry lookups.
///
/// Only the connect phase is bounded; bundle downloads can be large.
pub(crate) fn download_client() -> ConductResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(crate::USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ConductError::Transport {
            message: format!("failed to create HTTP client: {}", e),
        })
}
