/*!
 * Core Types
 * Common types used across the launch subsystem
 */

/// OS process ID type
///
/// Raw `pid_t` value. Children are always identified by their OS PID in
/// this layer; there is no internal PID namespace.
pub type Pid = i32;

/// Ident/signaling port exposed by a hooked process (0 = not yet ready)
pub type IdentPort = u32;

pub(crate) fn nix_pid(pid: Pid) -> nix::unistd::Pid {
    nix::unistd::Pid::from_raw(pid)
}
