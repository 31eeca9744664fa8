use std::path::PathBuf;
use std::time::Duration;

use conduct_core::config::default_cache_dir;
use conduct_core::{short_id, ControlClient, ControlConfig, PollOptions, Settings};
use tracing::info_span;

use super::args::*;

pub mod load;
pub mod logs;
pub mod run;
pub mod stop;
pub mod unload;
pub mod watch;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    match cli.cmd {
        Command::Load(args) => load::run(&global, args).await,
        Command::Run(args) => run::run(&global, args).await,
        Command::Stop(args) => stop::run(&global, args).await,
        Command::Unload(args) => unload::run(&global, args).await,
        Command::Logs(args) => logs::run(&global, args).await,
        Command::Watch => watch::run(&global).await,
    }
}

impl GlobalArgs {
    pub(crate) fn control_config(&self) -> ControlConfig {
        ControlConfig::default()
            .with_scheme(&self.scheme)
            .with_host(&self.host)
            .with_port(self.port)
            .with_api_version(self.api_version)
            .with_timeout_secs(self.timeout)
    }

    /// Control API client whose requests are tagged with the command name.
    pub(crate) fn control_client(&self, command: &'static str) -> anyhow::Result<ControlClient> {
        let span = info_span!("conduct", command, host = %self.host, port = self.port);
        Ok(ControlClient::new(self.control_config(), span)?)
    }

    pub(crate) async fn settings(&self) -> anyhow::Result<Settings> {
        let settings = match &self.settings {
            Some(path) => Settings::load(path).await?,
            None => Settings::load_default().await?,
        };
        Ok(settings)
    }

    pub(crate) fn cache_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.resolve_cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(default_cache_dir()?),
        }
    }

    pub(crate) fn poll_options(&self) -> PollOptions {
        PollOptions::new(
            Duration::from_secs(self.wait_timeout),
            Duration::from_secs(self.poll_interval),
        )
    }

    /// Bundle id as shown to the operator.
    pub(crate) fn display_id(&self, bundle_id: &str) -> String {
        if self.long_ids {
            bundle_id.to_string()
        } else {
            short_id(bundle_id)
        }
    }

    /// Connection flags to repeat in follow-up command hints.
    pub(crate) fn hint_flags(&self) -> String {
        let defaults = ControlConfig::default();
        let mut flags = String::new();
        if self.scheme != defaults.scheme {
            flags.push_str(&format!(" --scheme {}", self.scheme));
        }
        if self.host != defaults.host {
            flags.push_str(&format!(" --host {}", self.host));
        }
        if self.port != defaults.port {
            flags.push_str(&format!(" --port {}", self.port));
        }
        if self.api_version != defaults.api_version {
            flags.push_str(" --api-version 1");
        }
        flags
    }

    /// Print an informational line unless `--quiet`.
    pub(crate) fn say(&self, line: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", line.as_ref());
        }
    }
}
