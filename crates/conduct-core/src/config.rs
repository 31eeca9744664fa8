//! Control API endpoint configuration and operator settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConductError, ConductResult};

/// Control API protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiVersion {
    /// Unprefixed paths, no affinity support.
    V1,

    /// Paths under `v2/`.
    #[default]
    V2,
}

impl ApiVersion {
    /// Parse `1` / `2` (also `v1` / `v2`).
    pub fn parse(value: &str) -> ConductResult<Self> {
        match value.trim().trim_start_matches(['v', 'V']) {
            "1" => Ok(Self::V1),
            "2" => Ok(Self::V2),
            other => Err(ConductError::Config {
                message: format!("unsupported API version: {}", other),
            }),
        }
    }

    fn path_prefix(self) -> &'static str {
        match self {
            Self::V1 => "",
            Self::V2 => "v2/",
        }
    }
}

/// Control API configuration.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// URL scheme (`http` or `https`).
    pub scheme: String,

    /// Control API host.
    pub host: String,

    /// Control API port.
    pub port: u16,

    /// Protocol version.
    pub api_version: ApiVersion,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Max retries for transient failures.
    pub max_retries: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port: 9005,
            api_version: ApiVersion::V2,
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}

impl ControlConfig {
    /// Create configuration from environment variables.
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let scheme = std::env::var("CONDUCTR_SCHEME").unwrap_or(defaults.scheme);
        let host = std::env::var("CONDUCTR_HOST").unwrap_or(defaults.host);
        let port = std::env::var("CONDUCTR_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);
        let api_version = std::env::var("CONDUCTR_API_VERSION")
            .ok()
            .and_then(|v| ApiVersion::parse(&v).ok())
            .unwrap_or(defaults.api_version);
        let timeout_secs = std::env::var("CONDUCTR_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_secs);
        let max_retries = std::env::var("CONDUCTR_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_retries);

        Self {
            scheme,
            host,
            port,
            api_version,
            timeout_secs,
            max_retries,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Point the configuration at a base URL such as `http://127.0.0.1:9005`.
    pub fn with_base_url(mut self, base_url: &str) -> ConductResult<Self> {
        let parsed = url::Url::parse(base_url).map_err(|e| ConductError::Config {
            message: format!("invalid control URL {}: {}", base_url, e),
        })?;
        self.scheme = parsed.scheme().to_string();
        self.host = parsed
            .host_str()
            .ok_or_else(|| ConductError::Config {
                message: format!("control URL has no host: {}", base_url),
            })?
            .to_string();
        self.port = parsed.port_or_known_default().unwrap_or(self.port);
        Ok(self)
    }

    /// Base URL without the API version prefix.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Full URL for a control API path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}{}",
            self.base_url(),
            self.api_version.path_prefix(),
            path.trim_start_matches('/')
        )
    }
}

/// Kind of resolver named in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Existing local file, used in place.
    Local,

    /// `http(s)://` and `file://` URIs, cached.
    Uri,

    /// Symbolic name looked up in a bundle registry.
    Registry,
}

impl std::fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Uri => write!(f, "uri"),
            Self::Registry => write!(f, "registry"),
        }
    }
}

/// Bundle registry used by the registry resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Registry base URL.
    pub url: String,

    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,
}

/// Operator settings ("custom settings").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Resolver priority order.
    #[serde(default = "default_resolvers")]
    pub resolvers: Vec<ResolverKind>,

    /// Registry lookup configuration.
    #[serde(default)]
    pub registry: Option<RegistrySettings>,
}

fn default_resolvers() -> Vec<ResolverKind> {
    vec![ResolverKind::Local, ResolverKind::Uri, ResolverKind::Registry]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resolvers: default_resolvers(),
            registry: None,
        }
    }
}

impl Settings {
    /// Default settings location: `~/.conductr/settings.yaml`,
    /// or `CONDUCTR_SETTINGS` when set.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CONDUCTR_SETTINGS") {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::home_dir().map(|home| home.join(".conductr").join("settings.yaml"))
    }

    /// Parse settings from YAML.
    pub fn from_yaml(content: &str) -> ConductResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConductError::Config {
            message: format!("invalid settings: {}", e),
        })
    }

    /// Load settings from a file. A missing file yields defaults.
    pub async fn load(path: &Path) -> ConductResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::from_yaml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConductError::Config {
                message: format!("failed to read settings {}: {}", path.display(), e),
            }),
        }
    }

    /// Load settings from the default location.
    pub async fn load_default() -> ConductResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path).await,
            None => Ok(Self::default()),
        }
    }
}

/// Default resolve cache directory: `~/.conductr/cache`.
pub fn default_cache_dir() -> ConductResult<PathBuf> {
    let base = dirs::home_dir()
        .or_else(dirs::cache_dir)
        .ok_or_else(|| ConductError::Cache {
            message: "could not determine cache directory".to_string(),
        })?;

    Ok(base.join(".conductr").join("cache"))
}
