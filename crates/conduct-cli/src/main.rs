use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod errors;
mod exit_codes;

use cli::args::{Cli, GlobalArgs};
use cli::commands::dispatch;

/// `RUST_LOG` wins; otherwise `--verbose`/`--quiet` pick the level.
fn init_tracing(global: &GlobalArgs) {
    let default_level = if global.verbose {
        "debug"
    } else if global.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(global.verbose)
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            let failure = errors::present(&e);
            eprintln!("error: {}", failure.message);
            if let Some(hint) = &failure.hint {
                eprintln!("hint: {}", hint);
            }
            failure.exit_code
        }
    };
    std::process::exit(code);
}
