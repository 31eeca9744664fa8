//! Operator-side core of the `conduct` CLI.
//!
//! This crate provides:
//!
//! - Bundle resolution over a prioritised resolver chain (local → uri → registry)
//! - A download cache keyed by bundle file name
//! - A status poller that waits for cluster convergence
//! - A server-sent event stream client
//! - A control API client for loading, scaling and unloading bundles
//!
//! # Quick Start
//!
//! ```no_run
//! use conduct_core::{ControlClient, ControlConfig, PollOptions, StatusPoller};
//! use tracing::Span;
//!
//! # async fn example() -> conduct_core::ConductResult<()> {
//! let client = ControlClient::new(ControlConfig::from_env(), Span::current())?;
//! let ack = client.run_bundle("45e0c47", 2, None).await?;
//!
//! let poller = StatusPoller::new(client, Span::current());
//! let elapsed = poller
//!     .await_scale(&ack.bundle_id, 2, PollOptions::default())
//!     .await?;
//! println!("scaled in {:?}", elapsed);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `CONDUCTR_SCHEME` | Control API scheme (default: `http`) |
//! | `CONDUCTR_HOST` | Control API host (default: `127.0.0.1`) |
//! | `CONDUCTR_PORT` | Control API port (default: `9005`) |
//! | `CONDUCTR_API_VERSION` | `1` or `2` (default: `2`) |
//! | `CONDUCTR_TIMEOUT` | Request timeout in seconds (default: 10) |
//! | `CONDUCTR_MAX_RETRIES` | Max retries for transient failures (default: 3) |
//! | `CONDUCTR_SETTINGS` | Settings file (default: `~/.conductr/settings.yaml`) |

pub mod bundle;
pub mod cache;
pub mod config;
pub mod control;
pub mod error;
pub mod poll;
pub mod resolver;
pub mod sse;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("conduct/", env!("CARGO_PKG_VERSION"));

// Re-export main types
pub use bundle::{bundle_conf, short_id};
pub use cache::BundleCache;
pub use config::{ApiVersion, ControlConfig, RegistrySettings, ResolverKind, Settings};
pub use control::{BundleAck, BundleUpload, ControlClient, LogEntry};
pub use error::{ConductError, ConductResult, ResolveAttempt};
pub use poll::{PollOptions, StatusPoller, StatusSource};
pub use resolver::{resolve_bundle, ResolvedArtifact, Resolution, Resolver, ResolverChain};
pub use sse::{Event, EventStream};
