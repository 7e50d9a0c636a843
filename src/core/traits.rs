/*!
 * Core Traits
 * Seams to the platform-specific pause/resume/handshake primitives
 */

use super::types::{IdentPort, Pid};
use std::time::Duration;

/// Low-level control over a launched target process.
///
/// The stop-at-main breakpoint mechanics and the out-of-process ident-port
/// channel are implemented by the platform layer; this layer only composes
/// them around fork/exec and the injection handshake.
pub trait TargetControl: Send + Sync {
    /// Called in the forked child before anything else when pause-at-main
    /// is requested.
    ///
    /// Runs between `fork` and `exec`: only async-signal-safe operations
    /// are allowed in an implementation.
    fn stop_at_main_in_child(&self);

    /// Called in the parent to confirm the child is stopped before its
    /// entry point. Returns false if the stop could not be confirmed.
    fn stop_child_at_main(&self, pid: Pid) -> bool;

    /// Resume a stopped child, optionally after a delay (to give a
    /// debugger time to attach).
    fn resume_process(&self, pid: Pid, delay: Duration);

    /// Probe once for the ident port of a hooked child. Returns 0 while
    /// the hook has not signalled readiness.
    fn query_ident_port(&self, pid: Pid) -> IdentPort;
}

/// No-op control for plain (non-injected, non-paused) launches.
pub struct NullControl;

impl TargetControl for NullControl {
    fn stop_at_main_in_child(&self) {}

    fn stop_child_at_main(&self, _pid: Pid) -> bool {
        true
    }

    fn resume_process(&self, _pid: Pid, _delay: Duration) {}

    fn query_ident_port(&self, _pid: Pid) -> IdentPort {
        0
    }
}
