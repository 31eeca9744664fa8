use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use super::{download_client, ResolvedArtifact, Resolution, Resolver};
use crate::cache::{cache_file_name, parse_uri, BundleCache};
use crate::error::{ConductError, ConductResult};

/// Canonical URL of a reference.
///
/// `http(s)://` and `file://` references are used as-is; anything else is a
/// file path, made absolute against the working directory.
pub fn canonical_url(reference: &str) -> ConductResult<Url> {
    if let Some(url) = parse_uri(reference) {
        return Ok(url);
    }

    let path = Path::new(reference);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ConductError::Config {
                message: format!("failed to read working directory: {}", e),
            })?
            .join(path)
    };

    Url::from_file_path(&absolute).map_err(|_| ConductError::Config {
        message: format!("cannot express {} as a file URL", absolute.display()),
    })
}

/// Resolves URIs into the cache, downloading on a miss.
///
/// Cached files are trusted unconditionally: a hit never touches the network.
#[derive(Debug, Clone)]
pub struct UriResolver {
    client: reqwest::Client,
}

impl UriResolver {
    pub fn new() -> ConductResult<Self> {
        Ok(Self::with_client(download_client()?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Copy `url` into `dest`. Transfer failures are `Transport` errors;
    /// failures writing the cache are `Cache` errors.
    async fn fetch(&self, url: &Url, dest: &Path) -> ConductResult<()> {
        let partial = BundleCache::partial_path(dest);
        let result = match url.scheme() {
            "file" => self.copy_file(url, &partial).await,
            _ => self.download(url, &partial).await,
        };

        if let Err(e) = result {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        fs::rename(&partial, dest)
            .await
            .map_err(|e| ConductError::Cache {
                message: format!("failed to rename temp file: {}", e),
            })
    }

    async fn copy_file(&self, url: &Url, partial: &Path) -> ConductResult<()> {
        let source = url.to_file_path().map_err(|_| ConductError::Transport {
            message: format!("malformed file URL: {}", url),
        })?;

        match fs::metadata(&source).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return Err(ConductError::Transport {
                    message: format!("no such file: {}", source.display()),
                })
            }
        }

        fs::copy(&source, partial)
            .await
            .map_err(|e| ConductError::Cache {
                message: format!("failed to copy {} into cache: {}", source.display(), e),
            })?;
        Ok(())
    }

    async fn download(&self, url: &Url, partial: &Path) -> ConductResult<()> {
        let mut response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConductError::Http {
                status: status.as_u16(),
                message: format!("failed to download {}", url),
            });
        }

        let mut file = fs::File::create(partial)
            .await
            .map_err(|e| ConductError::Cache {
                message: format!("failed to write temp file: {}", e),
            })?;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ConductError::Cache {
                    message: format!("failed to write temp file: {}", e),
                })?;
        }

        file.flush().await.map_err(|e| ConductError::Cache {
            message: format!("failed to write temp file: {}", e),
        })?;
        Ok(())
    }
}

#[async_trait]
impl Resolver for UriResolver {
    fn name(&self) -> &str {
        "uri"
    }

    async fn resolve(&self, cache: &BundleCache, reference: &str) -> ConductResult<Resolution> {
        let (Some(name), Some(path)) = (cache_file_name(reference), cache.path_for(reference))
        else {
            return Ok(Resolution::NotApplicable);
        };

        let url = match canonical_url(reference) {
            Ok(url) => url,
            Err(e) => return Ok(Resolution::not_found(e.to_string())),
        };

        cache.ensure_dir().await?;

        if let Some(cached) = cache.lookup(reference).await {
            info!(reference, path = %cached.display(), "using cached bundle");
            return Ok(Resolution::Resolved(ResolvedArtifact { name, path: cached }));
        }

        debug!(url = %url, path = %path.display(), "fetching bundle");
        match self.fetch(&url, &path).await {
            Ok(()) => {
                info!(url = %url, path = %path.display(), "fetched bundle into cache");
                Ok(Resolution::Resolved(ResolvedArtifact { name, path }))
            }
            Err(e) if e.is_transport() => {
                warn!(url = %url, error = %e, "unable to fetch bundle");
                Ok(Resolution::not_found(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup() -> (UriResolver, BundleCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = BundleCache::with_dir(temp_dir.path().join("cache"));
        (UriResolver::new().unwrap(), cache, temp_dir)
    }

    #[test]
    fn test_canonical_url_http() {
        let url = canonical_url(
            "https://site.com/bundle-1.0-e78ed07d4a895e14595a21aef1bf616b1b0e4d886f3265bc7b152acf93d259b5.zip",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://site.com/bundle-1.0-e78ed07d4a895e14595a21aef1bf616b1b0e4d886f3265bc7b152acf93d259b5.zip"
        );
    }

    #[test]
    fn test_canonical_url_bare_file() {
        let url = canonical_url("bundle-1.0.zip").unwrap();
        let expected = Url::from_file_path(std::env::current_dir().unwrap().join("bundle-1.0.zip"))
            .unwrap();
        assert_eq!(url, expected);
        assert_eq!(url.scheme(), "file");
    }

    #[tokio::test]
    async fn test_resolve_success_creates_cache_dir() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bundles/bundle-1.0.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04data".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (resolver, cache, _temp_dir) = setup();
        assert!(!cache.cache_dir().exists());

        let reference = format!("{}/bundles/bundle-1.0.zip", mock_server.uri());
        let result = resolver.resolve(&cache, &reference).await.unwrap();

        let expected_path = cache.cache_dir().join("bundle-1.0.zip");
        assert_eq!(
            result,
            Resolution::Resolved(ResolvedArtifact {
                name: "bundle-1.0.zip".to_string(),
                path: expected_path.clone(),
            })
        );
        assert_eq!(fs::read(&expected_path).await.unwrap(), b"PK\x03\x04data");
        assert!(!BundleCache::partial_path(&expected_path).exists());
    }

    #[tokio::test]
    async fn test_resolve_warm_cache_downloads_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bundle.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bundle".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (resolver, cache, _temp_dir) = setup();
        let reference = format!("{}/bundle.zip?version=1", mock_server.uri());

        let first = resolver.resolve(&cache, &reference).await.unwrap();
        let second = resolver.resolve(&cache, &reference).await.unwrap();

        assert!(first.is_resolved());
        assert_eq!(first, second);
        // MockServer verifies `.expect(1)` on drop
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/no_such.bundle"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let (resolver, cache, _temp_dir) = setup();
        let reference = format!("{}/no_such.bundle", mock_server.uri());
        let result = resolver.resolve(&cache, &reference).await.unwrap();

        assert!(matches!(result, Resolution::NotFound { .. }));
        assert!(cache.lookup(&reference).await.is_none());
        assert!(cache.cache_dir().is_dir());
    }

    #[tokio::test]
    async fn test_resolve_unreachable_host() {
        let (resolver, cache, _temp_dir) = setup();
        let result = resolver
            .resolve(&cache, "http://127.0.0.1:1/bundle.zip")
            .await
            .unwrap();

        assert!(matches!(result, Resolution::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_file_uri_copies_into_cache() {
        let (resolver, cache, temp_dir) = setup();
        let source = temp_dir.path().join("visualizer.zip");
        fs::write(&source, b"zip-bytes").await.unwrap();

        let reference = Url::from_file_path(&source).unwrap().to_string();
        let result = resolver.resolve(&cache, &reference).await.unwrap();

        let cached = cache.cache_dir().join("visualizer.zip");
        assert_eq!(
            result,
            Resolution::Resolved(ResolvedArtifact {
                name: "visualizer.zip".to_string(),
                path: cached.clone(),
            })
        );
        assert_eq!(fs::read(&cached).await.unwrap(), b"zip-bytes");
    }

    #[tokio::test]
    async fn test_resolve_missing_bare_name() {
        let (resolver, cache, _temp_dir) = setup();
        let result = resolver
            .resolve(&cache, "definitely-not-here-4f2a.zip")
            .await
            .unwrap();
        assert!(matches!(result, Resolution::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_cache_dir_failure_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"file").await.unwrap();
        let cache = BundleCache::with_dir(blocker.join("cache"));

        let err = UriResolver::new()
            .unwrap()
            .resolve(&cache, "https://example.com/bundle.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, ConductError::Cache { .. }));
    }
}
