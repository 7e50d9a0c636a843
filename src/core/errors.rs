/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Launch operation result
///
/// # Must Use
/// Launch operations can fail and must be handled to avoid leaking pipes or
/// half-configured children
pub type Result<T> = std::result::Result<T, LaunchError>;

/// Errors of the launch and injection layer
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LaunchError {
    #[error("Invalid parameter: {0}")]
    #[diagnostic(
        code(launch::invalid_parameter),
        help("A required input was empty or malformed. Check the application path and arguments.")
    )]
    InvalidParameter(String),

    #[error("Malformed command line: {0}")]
    #[diagnostic(
        code(launch::malformed_input),
        help("Check for an unterminated quote or a trailing backslash escape in the command line.")
    )]
    MalformedInput(String),

    #[error("Launch failed: {0}")]
    #[diagnostic(
        code(launch::launch_failed),
        help("Verify that the executable exists, is executable, and that the working directory is valid.")
    )]
    LaunchFailed(String),

    #[error("Injection failed: {0}")]
    #[diagnostic(
        code(launch::injection_failed),
        help(
            "Check that the target program didn't crash or exit during early initialisation, \
             e.g. due to an incorrectly configured working directory."
        )
    )]
    InjectionFailed(String),

    #[error("Unsupported on this platform: {0}")]
    #[diagnostic(
        code(launch::unsupported),
        help("This capability is not available on POSIX systems and is reported as inactive.")
    )]
    Unsupported(String),
}
