/*!
 * Zombie Reaper
 * Asynchronous reclamation of fire-and-forget child processes
 */

use super::list::{ListHead, PidSlab};
use crate::core::sync::SpinLock;
use crate::core::types::{nix_pid, Pid};
use log::{debug, warn};
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use std::sync::{Arc, Once, OnceLock};

/// Reclaims exited fire-and-forget children so they never linger as
/// zombies.
///
/// A host application (a Qt UI, say) may have its own SIGCHLD handler and
/// its own children. The installed handler chains to whatever handler was
/// there first and only ever waits on PIDs this reaper tracks: waiting on
/// an unowned PID would consume another handler's one chance to reap it.
///
/// Instances are plain values so tests can run independent reapers without
/// touching process-wide signal state; [`install`] wires one shared
/// instance to the actual signal.
pub struct ZombieReaper {
    lists: SpinLock<PidSlab>,
}

impl ZombieReaper {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lists: SpinLock::new(PidSlab::new()),
        }
    }

    /// Track a child PID for asynchronous reaping.
    ///
    /// May grow the slot arena; never called from the signal handler.
    pub fn track(&self, pid: Pid) {
        let _mask = SigchldBlock::new();
        self.lists.lock().track(pid);
        debug!("Tracking child PID {} for reaping", pid);
    }

    /// Number of children still awaiting asynchronous reap.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        let _mask = SigchldBlock::new();
        self.lists.lock().tracked_len()
    }

    /// Sweep tracked children once, reaping any that have exited.
    ///
    /// Called from the signal handler on SIGCHLD and polled opportunistically
    /// by the launcher's blocking-wait path.
    pub fn drain(&self) {
        let _mask = SigchldBlock::new();
        self.drain_in_handler();
    }

    /// Two-phase drain. Async-signal-safe: no allocation, no logging, the
    /// spin lock is only held for pointer-sized relinks.
    fn drain_in_handler(&self) {
        // Phase 1: detach the whole tracked chain so new registrations
        // proceed without blocking behind the wait syscalls below. The free
        // list stays where it is.
        let detached = self.lists.lock().detach_tracked();

        let mut remaining = ListHead::empty();
        let mut waited = ListHead::empty();

        // Phase 2: non-blocking wait on each owned PID. Slot reads and
        // relinks reacquire the lock briefly; the slow waitpid call runs
        // outside it.
        let mut cur = self.lists.lock().chain_head(detached);
        while let Some(idx) = cur {
            let (pid, next) = self.lists.lock().peek(idx);

            let reaped = !matches!(
                waitpid(nix_pid(pid), Some(WaitPidFlag::WNOHANG)),
                Ok(WaitStatus::StillAlive)
            );

            {
                let mut lists = self.lists.lock();
                if reaped {
                    // includes wait errors (ECHILD): the slot is recycled
                    // rather than re-polled forever
                    lists.append_to(&mut waited, idx);
                } else {
                    lists.append_to(&mut remaining, idx);
                }
            }

            cur = next;
        }

        // Phase 3: append survivors back (registrations may have arrived
        // during phase 2) and recycle the waited slots.
        self.lists.lock().reattach(remaining, waited);
    }
}

impl Default for ZombieReaper {
    fn default() -> Self {
        Self::new()
    }
}

static ACTIVE: OnceLock<Arc<ZombieReaper>> = OnceLock::new();
static OLD_ACTION: OnceLock<SigAction> = OnceLock::new();

extern "C" fn zombie_waiter(
    signum: libc::c_int,
    info: *mut libc::siginfo_t,
    context: *mut libc::c_void,
) {
    let saved_errno = Errno::last_raw();

    // The host's handler runs first so its own reaping is unaffected.
    if let Some(old) = OLD_ACTION.get() {
        match old.handler() {
            SigHandler::SigDfl | SigHandler::SigIgn => {}
            SigHandler::Handler(f) => f(signum),
            SigHandler::SigAction(f) => f(signum, info, context),
        }
    }

    if let Some(reaper) = ACTIVE.get() {
        reaper.drain_in_handler();
    }

    Errno::set_raw(saved_errno);
}

/// Install the process-wide SIGCHLD handler and return the shared reaper.
///
/// Idempotent: the handler is registered once and the handler found at that
/// point keeps being chained.
pub fn install() -> Arc<ZombieReaper> {
    let reaper = ACTIVE.get_or_init(|| Arc::new(ZombieReaper::new()));

    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let action = SigAction::new(
            SigHandler::SigAction(zombie_waiter),
            SaFlags::SA_NOCLDSTOP | SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // Safety: zombie_waiter restricts itself to async-signal-safe
        // operations (atomics, waitpid, sigaction chain call).
        match unsafe { signal::sigaction(Signal::SIGCHLD, &action) } {
            Ok(old) => {
                let _ = OLD_ACTION.set(old);
                debug!("SIGCHLD zombie collection handler installed");
            }
            Err(e) => warn!("Could not install SIGCHLD handler: {}", e),
        }
    });

    Arc::clone(reaper)
}

/// Masks SIGCHLD on the calling thread for the scope of the guard.
///
/// Every non-handler acquisition of the reaper lock sits inside one of
/// these, so the handler can never spin against a lock held by its own
/// thread.
struct SigchldBlock {
    prev: Option<SigSet>,
}

impl SigchldBlock {
    fn new() -> Self {
        let mut block = SigSet::empty();
        block.add(Signal::SIGCHLD);
        let mut prev = SigSet::empty();
        match signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&block), Some(&mut prev)) {
            Ok(()) => Self { prev: Some(prev) },
            Err(e) => {
                warn!("Could not block SIGCHLD: {}", e);
                Self { prev: None }
            }
        }
    }
}

impl Drop for SigchldBlock {
    fn drop(&mut self) {
        if let Some(prev) = self.prev {
            let _ = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&prev), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_and_count() {
        let reaper = ZombieReaper::new();
        assert_eq!(reaper.tracked_count(), 0);

        reaper.track(12345);
        reaper.track(12346);
        assert_eq!(reaper.tracked_count(), 2);
    }

    #[test]
    fn test_drain_recycles_unwaitable_pids() {
        let reaper = ZombieReaper::new();

        // Not our children: waitpid fails with ECHILD, and the slots must
        // be recycled rather than re-polled forever.
        reaper.track(999_991);
        reaper.track(999_992);
        reaper.drain();

        assert_eq!(reaper.tracked_count(), 0);
    }
}
