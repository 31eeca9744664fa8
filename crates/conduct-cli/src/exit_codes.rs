//! Exit codes of the `conduct` binary.
//! Scripts depend on these; keep them in line with `ConductError::exit_code`.
//! 2 is left to clap for usage errors.

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1; // Resolution, malformed bundle, bad settings, missing file
pub const WAIT_TIMEOUT: i32 = 3;
pub const CONNECTION: i32 = 5; // Control API unreachable or returned an error
pub const INTERNAL: i32 = 6;
