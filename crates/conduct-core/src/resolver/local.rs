use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{ResolvedArtifact, Resolution, Resolver};
use crate::cache::BundleCache;
use crate::error::ConductResult;

/// Resolves references naming an existing local file. Identity: no copy.
#[derive(Debug, Clone, Default)]
pub struct LocalResolver;

#[async_trait]
impl Resolver for LocalResolver {
    fn name(&self) -> &str {
        "local"
    }

    async fn resolve(&self, _cache: &BundleCache, reference: &str) -> ConductResult<Resolution> {
        let path = Path::new(reference);
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {
                debug!(path = %path.display(), "resolved local file");
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| reference.to_string());
                Ok(Resolution::Resolved(ResolvedArtifact {
                    name,
                    path: PathBuf::from(reference),
                }))
            }
            _ => Ok(Resolution::NotApplicable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_existing_file_resolves_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = temp_dir.path().join("bundle-1.0.zip");
        tokio::fs::write(&bundle, b"PK").await.unwrap();
        let cache = BundleCache::with_dir(temp_dir.path().join("cache"));

        let result = LocalResolver
            .resolve(&cache, bundle.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(
            result,
            Resolution::Resolved(ResolvedArtifact {
                name: "bundle-1.0.zip".to_string(),
                path: bundle,
            })
        );
        assert!(!cache.cache_dir().exists(), "local files are never cached");
    }

    #[tokio::test]
    async fn test_missing_file_not_applicable() {
        let cache = BundleCache::with_dir("/nonexistent/cache");
        let result = LocalResolver
            .resolve(&cache, "/nonexistent/bundle.zip")
            .await
            .unwrap();
        assert_eq!(result, Resolution::NotApplicable);
    }

    #[tokio::test]
    async fn test_directory_not_applicable() {
        let temp_dir = TempDir::new().unwrap();
        let cache = BundleCache::with_dir(temp_dir.path().join("cache"));
        let result = LocalResolver
            .resolve(&cache, temp_dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(result, Resolution::NotApplicable);
    }
}
