//! Resolve cache for downloaded bundles.
//!
//! # Cache Structure
//!
//! ```text
//! ~/.conductr/cache/
//!   visualizer-1.1-e78ed07d....zip
//!   cassandra-v1-0af8b4....zip
//! ```
//!
//! The directory is flat and keyed by the basename of the reference's
//! canonical URL. Two references sharing a basename share a cache file (last
//! writer wins), so bundles should carry content-addressed or versioned
//! names. A cache hit trusts file presence alone; there is no integrity or
//! freshness check.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use url::Url;

use crate::error::{ConductError, ConductResult};

/// Schemes the cache (and the URI resolver) understand.
pub(crate) const URI_SCHEMES: [&str; 3] = ["http", "https", "file"];

/// Parse `reference` as a URL with a supported scheme.
pub(crate) fn parse_uri(reference: &str) -> Option<Url> {
    let url = Url::parse(reference).ok()?;
    URI_SCHEMES.contains(&url.scheme()).then_some(url)
}

/// Basename of the reference's canonical form, ignoring query and fragment.
///
/// Returns `None` when the reference has no final path segment
/// (e.g. `https://example.com/`).
pub fn cache_file_name(reference: &str) -> Option<String> {
    let name = match parse_uri(reference) {
        Some(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(String::from),
        None => Path::new(reference)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
    };
    name.filter(|n| !n.is_empty())
}

/// Bundle cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct BundleCache {
    /// Base cache directory.
    cache_dir: PathBuf,
}

impl BundleCache {
    /// Create a cache at the default location (`~/.conductr/cache`).
    pub fn new() -> ConductResult<Self> {
        Ok(Self::with_dir(crate::config::default_cache_dir()?))
    }

    /// Create a cache with a custom directory.
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Get the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache path for a reference. Pure: no filesystem access.
    pub fn path_for(&self, reference: &str) -> Option<PathBuf> {
        cache_file_name(reference).map(|name| self.cache_dir.join(name))
    }

    /// Create the cache directory (and parents) if absent.
    pub async fn ensure_dir(&self) -> ConductResult<()> {
        fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| ConductError::Cache {
                message: format!(
                    "failed to create cache directory {}: {}",
                    self.cache_dir.display(),
                    e
                ),
            })
    }

    /// Look up a reference. A hit requires a regular file at the cache path.
    pub async fn lookup(&self, reference: &str) -> Option<PathBuf> {
        let path = self.path_for(reference)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                debug!(path = %path.display(), "cache hit");
                Some(path)
            }
            _ => None,
        }
    }

    /// Temporary path used while a download for `path` is in flight.
    pub(crate) fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        path.with_file_name(name)
    }
}
