//! Error types for bundle resolution, control API calls and waiting.

use std::time::Duration;

/// Outcome of one resolver attempt, kept for diagnostics when the whole
/// chain fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveAttempt {
    /// Resolver name (e.g. `uri`).
    pub resolver: String,

    /// Human readable outcome (`not applicable`, `not found: ...`, error text).
    pub outcome: String,
}

impl std::fmt::Display for ResolveAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.resolver, self.outcome)
    }
}

/// Conduct errors.
#[derive(Debug, thiserror::Error)]
pub enum ConductError {
    /// No resolver in the chain produced the bundle.
    #[error("unable to resolve bundle {reference} using {}", format_attempts(.attempts))]
    BundleResolution {
        reference: String,
        attempts: Vec<ResolveAttempt>,
    },

    /// The artifact was found but is not a valid bundle.
    #[error("malformed bundle {path}: {reason}")]
    MalformedBundle { path: String, reason: String },

    /// The desired state was not observed before the deadline.
    #[error("timed out after {elapsed:?} waiting for {target}")]
    WaitTimeout {
        target: String,
        elapsed: Duration,
        last_error: Option<String>,
    },

    /// Connection failure, request timeout or unreadable body.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Non-success HTTP status (3xx included).
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Local cache failure.
    #[error("cache error: {message}")]
    Cache { message: String },

    /// Configuration or settings error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Malformed event-stream frame.
    #[error("event stream error: {message}")]
    Stream { message: String },
}

fn format_attempts(attempts: &[ResolveAttempt]) -> String {
    if attempts.is_empty() {
        return "no resolvers".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConductError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BundleResolution { .. } => 1,
            Self::MalformedBundle { .. } => 1,
            Self::Config { .. } => 1,

            Self::WaitTimeout { .. } => 3,

            // Network/transient
            Self::Transport { .. } => 5,
            Self::Http { .. } => 5,

            Self::InvalidResponse { .. } => 6,
            Self::Cache { .. } => 6,
            Self::Stream { .. } => 6,
        }
    }

    /// Whether the error came from the wire (connection or HTTP status).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Http { .. })
    }

    /// Whether the error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ConductError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// Result type for conduct operations.
pub type ConductResult<T> = Result<T, ConductError>;
