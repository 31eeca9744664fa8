use std::path::Path;

use tracing::{debug, info, Instrument, Span};

use super::{LocalResolver, RegistryResolver, ResolvedArtifact, Resolution, Resolver, UriResolver};
use crate::cache::BundleCache;
use crate::config::{ResolverKind, Settings};
use crate::error::{ConductError, ConductResult, ResolveAttempt};

/// Ordered fallback over resolvers. The first resolver to produce the bundle
/// wins; later resolvers are not consulted.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn Resolver>>,
    span: Span,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Box<dyn Resolver>>, span: Span) -> Self {
        Self { resolvers, span }
    }

    /// Build the chain in the priority order named by the settings.
    pub fn from_settings(settings: &Settings, span: Span) -> ConductResult<Self> {
        let mut resolvers: Vec<Box<dyn Resolver>> = Vec::with_capacity(settings.resolvers.len());
        for kind in &settings.resolvers {
            let resolver: Box<dyn Resolver> = match kind {
                ResolverKind::Local => Box::new(LocalResolver),
                ResolverKind::Uri => Box::new(UriResolver::new()?),
                ResolverKind::Registry => {
                    Box::new(RegistryResolver::new(settings.registry.clone())?)
                }
            };
            resolvers.push(resolver);
        }
        Ok(Self::new(resolvers, span))
    }

    /// Resolver names in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Resolve a reference, failing with `BundleResolution` only when every
    /// resolver declined or failed.
    pub async fn resolve_bundle(
        &self,
        cache: &BundleCache,
        reference: &str,
    ) -> ConductResult<ResolvedArtifact> {
        self.resolve_inner(cache, reference)
            .instrument(self.span.clone())
            .await
    }

    async fn resolve_inner(
        &self,
        cache: &BundleCache,
        reference: &str,
    ) -> ConductResult<ResolvedArtifact> {
        let mut attempts = Vec::with_capacity(self.resolvers.len());

        for resolver in &self.resolvers {
            let outcome = match resolver.resolve(cache, reference).await {
                Ok(Resolution::Resolved(artifact)) => {
                    info!(
                        reference,
                        resolver = resolver.name(),
                        path = %artifact.path.display(),
                        "resolved bundle"
                    );
                    return Ok(artifact);
                }
                Ok(other) => other.to_string(),
                Err(e) => e.to_string(),
            };

            debug!(reference, resolver = resolver.name(), outcome = %outcome, "resolver declined");
            attempts.push(ResolveAttempt {
                resolver: resolver.name().to_string(),
                outcome,
            });
        }

        Err(ConductError::BundleResolution {
            reference: reference.to_string(),
            attempts,
        })
    }
}

/// Resolve `reference` with the chain configured by `settings`, caching into
/// `cache_dir`.
pub async fn resolve_bundle(
    settings: &Settings,
    cache_dir: &Path,
    reference: &str,
) -> ConductResult<ResolvedArtifact> {
    let chain = ResolverChain::from_settings(settings, Span::current())?;
    chain
        .resolve_bundle(&BundleCache::with_dir(cache_dir), reference)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behavior {
        Resolve(&'static str),
        NotApplicable,
        NotFound,
        Fail,
    }

    struct FakeResolver {
        name: &'static str,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl FakeResolver {
        fn boxed(name: &'static str, behavior: Behavior) -> (Box<dyn Resolver>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let resolver = Box::new(Self {
                name,
                behavior,
                calls: calls.clone(),
            });
            (resolver, calls)
        }
    }

    #[async_trait]
    impl Resolver for FakeResolver {
        fn name(&self) -> &str {
            self.name
        }

        async fn resolve(&self, _cache: &BundleCache, _reference: &str) -> ConductResult<Resolution> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Resolve(path) => Ok(Resolution::Resolved(ResolvedArtifact {
                    name: self.name.to_string(),
                    path: PathBuf::from(path),
                })),
                Behavior::NotApplicable => Ok(Resolution::NotApplicable),
                Behavior::NotFound => Ok(Resolution::not_found("HTTP 404")),
                Behavior::Fail => Err(ConductError::Cache {
                    message: "permission denied".to_string(),
                }),
            }
        }
    }

    fn cache() -> BundleCache {
        BundleCache::with_dir("/cache-dir")
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let (first, first_calls) = FakeResolver::boxed("first", Behavior::Resolve("/a.zip"));
        let (second, second_calls) = FakeResolver::boxed("second", Behavior::Resolve("/b.zip"));
        let chain = ResolverChain::new(vec![first, second], Span::none());

        let artifact = chain.resolve_bundle(&cache(), "bundle").await.unwrap();

        assert_eq!(artifact.path, PathBuf::from("/a.zip"));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_past_errors_and_misses() {
        let (failing, _) = FakeResolver::boxed("failing", Behavior::Fail);
        let (missing, _) = FakeResolver::boxed("missing", Behavior::NotFound);
        let (working, calls) = FakeResolver::boxed("working", Behavior::Resolve("/c.zip"));
        let chain = ResolverChain::new(vec![failing, missing, working], Span::none());

        let artifact = chain.resolve_bundle(&cache(), "bundle").await.unwrap();

        assert_eq!(artifact.name, "working");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_every_attempt() {
        let (skip, _) = FakeResolver::boxed("skip", Behavior::NotApplicable);
        let (missing, _) = FakeResolver::boxed("missing", Behavior::NotFound);
        let (failing, _) = FakeResolver::boxed("failing", Behavior::Fail);
        let chain = ResolverChain::new(vec![skip, missing, failing], Span::none());

        let err = chain.resolve_bundle(&cache(), "bundle").await.unwrap_err();

        match err {
            ConductError::BundleResolution {
                reference,
                attempts,
            } => {
                assert_eq!(reference, "bundle");
                assert_eq!(
                    attempts,
                    vec![
                        ResolveAttempt {
                            resolver: "skip".to_string(),
                            outcome: "not applicable".to_string(),
                        },
                        ResolveAttempt {
                            resolver: "missing".to_string(),
                            outcome: "not found: HTTP 404".to_string(),
                        },
                        ResolveAttempt {
                            resolver: "failing".to_string(),
                            outcome: "cache error: permission denied".to_string(),
                        },
                    ]
                );
            }
            other => panic!("expected BundleResolution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let chain = ResolverChain::new(Vec::new(), Span::none());
        let err = chain.resolve_bundle(&cache(), "bundle").await.unwrap_err();
        assert!(matches!(err, ConductError::BundleResolution { .. }));
    }

    #[test]
    fn test_from_settings_order() {
        let settings = Settings {
            resolvers: vec![ResolverKind::Registry, ResolverKind::Local],
            registry: None,
        };
        let chain = ResolverChain::from_settings(&settings, Span::none()).unwrap();
        assert_eq!(chain.names(), vec!["registry", "local"]);
    }
}
