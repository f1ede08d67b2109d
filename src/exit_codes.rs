//! Exit code standardization for sweepctl
//!
//! ## Exit Code Convention
//!
//! - `0` = Success
//! - `1` = User error (invalid selector, unsupported output file, validation failure)
//! - `2` = System error (AWS API failure, I/O failure)
//! - `3` = Configuration error (bad config file, bad environment override, missing region)

use crate::error::SweepError;

/// Standard exit codes for sweepctl
pub mod codes {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// User error (invalid input, validation failure)
    pub const USER_ERROR: i32 = 1;
    /// System error (AWS API failure, network error)
    pub const SYSTEM_ERROR: i32 = 2;
    /// Configuration error (missing or invalid settings)
    pub const CONFIG_ERROR: i32 = 3;
}

/// Map a SweepError to an appropriate exit code
pub fn exit_code_for_error(error: &SweepError) -> i32 {
    use SweepError::*;
    match error {
        Config(_) => codes::CONFIG_ERROR,

        Validation { .. } => codes::USER_ERROR,

        Query { .. } => codes::SYSTEM_ERROR,
        Action { .. } => codes::SYSTEM_ERROR,
        Io(_) => codes::SYSTEM_ERROR,
        Json(_) => codes::SYSTEM_ERROR,
    }
}

/// Map a handler status code to an exit code
///
/// 2xx is success, 4xx is a client error, anything else is a system error.
pub fn exit_code_for_status(status_code: u16) -> i32 {
    match status_code {
        200..=299 => codes::SUCCESS,
        400..=499 => codes::USER_ERROR,
        _ => codes::SYSTEM_ERROR,
    }
}

/// Exit with appropriate code based on error type
pub fn exit_with_code(error: &SweepError) -> ! {
    let code = exit_code_for_error(error);
    std::process::exit(code);
}
