//! Turns command errors into operator-facing messages.
//!
//! Mappers are tried in order; the first one that recognises the error
//! decides the message and exit code. Anything unrecognised is reported as
//! an internal error.

use conduct_core::ConductError;

use crate::exit_codes;

/// What the operator sees when a command fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub hint: Option<String>,
    pub exit_code: i32,
}

impl Failure {
    fn new(message: impl Into<String>, exit_code: i32) -> Self {
        Self {
            message: message.into(),
            hint: None,
            exit_code,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

type Mapper = fn(&anyhow::Error) -> Option<Failure>;

const MAPPERS: &[Mapper] = &[
    connection_failure,
    http_failure,
    resolution_failure,
    malformed_bundle,
    wait_timeout,
    invalid_settings,
    missing_file,
];

/// Present `err` using the first matching mapper.
pub fn present(err: &anyhow::Error) -> Failure {
    MAPPERS
        .iter()
        .find_map(|mapper| mapper(err))
        .unwrap_or_else(|| internal(err))
}

fn conduct_error(err: &anyhow::Error) -> Option<&ConductError> {
    err.chain().find_map(|cause| cause.downcast_ref::<ConductError>())
}

fn connection_failure(err: &anyhow::Error) -> Option<Failure> {
    match conduct_error(err)? {
        ConductError::Transport { message } => Some(
            Failure::new(
                format!("Unable to contact ConductR: {}", message),
                exit_codes::CONNECTION,
            )
            .with_hint("Check --host/--port (or CONDUCTR_HOST/CONDUCTR_PORT) and that the cluster is running"),
        ),
        _ => None,
    }
}

fn http_failure(err: &anyhow::Error) -> Option<Failure> {
    match conduct_error(err)? {
        ConductError::Http { status, message } => Some(Failure::new(
            format!("ConductR returned HTTP {}: {}", status, message),
            exit_codes::CONNECTION,
        )),
        _ => None,
    }
}

fn resolution_failure(err: &anyhow::Error) -> Option<Failure> {
    match conduct_error(err)? {
        e @ ConductError::BundleResolution { .. } => Some(
            Failure::new(e.to_string(), exit_codes::FAILURE)
                .with_hint("Pass a local file, a URL, or configure a registry in the settings file"),
        ),
        _ => None,
    }
}

fn malformed_bundle(err: &anyhow::Error) -> Option<Failure> {
    match conduct_error(err)? {
        ConductError::MalformedBundle { path, reason } => Some(Failure::new(
            format!("Bundle {} is malformed: {}", path, reason),
            exit_codes::FAILURE,
        )),
        _ => None,
    }
}

fn wait_timeout(err: &anyhow::Error) -> Option<Failure> {
    match conduct_error(err)? {
        ConductError::WaitTimeout {
            target,
            elapsed,
            last_error,
        } => {
            let mut failure = Failure::new(
                format!(
                    "Timed out after {}s waiting for bundle {}",
                    elapsed.as_secs(),
                    target
                ),
                exit_codes::WAIT_TIMEOUT,
            );
            failure.hint = Some(match last_error {
                Some(last) => format!("Last status check failed with: {}", last),
                None => "Increase --wait-timeout, or pass --no-wait".to_string(),
            });
            Some(failure)
        }
        _ => None,
    }
}

fn invalid_settings(err: &anyhow::Error) -> Option<Failure> {
    match conduct_error(err)? {
        ConductError::Config { message } => {
            Some(Failure::new(format!("Invalid configuration: {}", message), exit_codes::FAILURE))
        }
        _ => None,
    }
}

fn missing_file(err: &anyhow::Error) -> Option<Failure> {
    let io = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<std::io::Error>())?;
    (io.kind() == std::io::ErrorKind::NotFound)
        .then(|| Failure::new(format!("File not found: {:#}", err), exit_codes::FAILURE))
}

fn internal(err: &anyhow::Error) -> Failure {
    let code = conduct_error(err)
        .map(ConductError::exit_code)
        .unwrap_or(exit_codes::INTERNAL);
    Failure::new(format!("Internal error: {:#}", err), code)
}
