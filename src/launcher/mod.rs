/*!
 * Process Launcher
 * Resolving, forking and exec'ing target applications
 */

mod path;
mod spawn;
mod types;

pub use path::{resolve_app_path, shell_expand};
pub use spawn::ProcessLauncher;
pub use types::{LaunchConfig, LaunchOutcome, ProcessOutput};
