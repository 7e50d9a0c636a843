/*!
 * framecap-launch - Process launch and instrumentation injection
 *
 * Launches target applications as OS child processes and injects the
 * framecap capture library into them through the dynamic loader's
 * environment-preload mechanism. Covers command-line tokenization,
 * ordered environment modification, asynchronous zombie reaping,
 * fork/exec launching with optional output capture, and the
 * pause-at-main injection handshake.
 */

pub mod cmdline;
pub mod core;
pub mod env;
pub mod inject;
pub mod launcher;
pub mod reaper;

pub use crate::core::errors::{LaunchError, Result};
pub use crate::core::traits::{NullControl, TargetControl};
pub use crate::core::types::{IdentPort, Pid};
pub use env::{EnvMod, EnvSep, EnvironmentModification};
pub use inject::{CaptureOptions, InjectOutcome, InjectionCoordinator};
pub use launcher::{LaunchConfig, LaunchOutcome, ProcessLauncher, ProcessOutput};
pub use reaper::ZombieReaper;
