/*!
 * Injection Coordinator
 * Hooked launches: environment setup, pause-at-main, handshake, resume
 */

use super::options::CaptureOptions;
use super::platform::{
    default_platform, HookPlatform, CAPFILE_VAR, CAPOPTS_VAR, DEBUG_LOG_VAR,
    HOOK_LIBRARY_BASENAME, ORIG_LIBPATH_VAR, ORIG_PRELOAD_VAR,
};
use crate::core::errors::{LaunchError, Result};
use crate::core::traits::TargetControl;
use crate::core::types::{nix_pid, IdentPort, Pid};
use crate::env::{apply, current_env_map, EnvMap, EnvRegistry, EnvSep, EnvironmentModification};
use crate::launcher::{LaunchConfig, ProcessLauncher};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default bound on how long a hooked child gets to signal readiness
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Initial interval between handshake probes; doubles up to [`PROBE_CAP`]
const PROBE_START: Duration = Duration::from_millis(10);
const PROBE_CAP: Duration = Duration::from_secs(1);

/// Result of a hooked launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InjectOutcome {
    pub pid: Pid,
    /// Port the in-target hook listens on for capture control
    pub ident_port: IdentPort,
}

/// Filesystem locations of the tool's own binaries and hook library
#[derive(Debug, Clone)]
pub struct ToolPaths {
    /// Directory holding the running executable
    pub bin_dir: PathBuf,
    /// Sibling library directory, where the hook library installs
    pub lib_dir: PathBuf,
    /// Directory of the already-loaded hook library, when an embedder has
    /// it mapped into its own process (a replay UI, say)
    pub module_dir: Option<PathBuf>,
    /// Per-process debug log shared with hooked children
    pub debug_log_file: PathBuf,
}

impl ToolPaths {
    /// Derive paths from the running executable's location.
    #[must_use]
    pub fn detect() -> Self {
        let bin_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        let lib_dir = bin_dir
            .parent()
            .map(|root| root.join("lib"))
            .unwrap_or_else(|| bin_dir.clone());
        let debug_log_file =
            std::env::temp_dir().join(format!("framecap_{}.log", std::process::id()));
        Self {
            bin_dir,
            lib_dir,
            module_dir: None,
            debug_log_file,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dir = Some(dir.into());
        self
    }
}

/// Orchestrates hooked launches end to end.
///
/// Composes the registered and caller-supplied environment modifications
/// with the hooking variables, launches the target paused at its entry
/// point, waits for the in-target hook to publish its ident port, then
/// resumes the target. The child is always resumed, handshake or not: a
/// paused orphan is strictly worse than an unhooked one.
pub struct InjectionCoordinator {
    launcher: ProcessLauncher,
    registry: Arc<EnvRegistry>,
    platform: &'static dyn HookPlatform,
    control: Arc<dyn TargetControl>,
    paths: ToolPaths,
    handshake_timeout: Duration,
}

impl InjectionCoordinator {
    #[must_use]
    pub fn new(
        launcher: ProcessLauncher,
        registry: Arc<EnvRegistry>,
        control: Arc<dyn TargetControl>,
    ) -> Self {
        Self {
            launcher,
            registry,
            platform: default_platform(),
            control,
            paths: ToolPaths::detect(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_platform(mut self, platform: &'static dyn HookPlatform) -> Self {
        self.platform = platform;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_paths(mut self, paths: ToolPaths) -> Self {
        self.paths = paths;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Environment modifications that turn a plain child into a hooked one.
    ///
    /// The pre-hook loader values are backed up first, resolved against
    /// `base`, so an unhooked grandchild can be composed later.
    #[must_use]
    pub fn hooking_env_mods(
        &self,
        base: &EnvMap,
        opts: &CaptureOptions,
        capture_file: &str,
    ) -> Vec<EnvironmentModification> {
        let lib_path_var = self.platform.library_path_var();
        let preload_var = self.platform.preload_var();
        let orig_libpath = base.get(lib_path_var).cloned().unwrap_or_default();
        let orig_preload = base.get(preload_var).cloned().unwrap_or_default();

        let hook_library = format!(
            "{}{}",
            HOOK_LIBRARY_BASENAME,
            self.platform.library_suffix()
        );

        let mut mods = vec![
            EnvironmentModification::set(ORIG_LIBPATH_VAR, orig_libpath),
            EnvironmentModification::set(ORIG_PRELOAD_VAR, orig_preload),
            EnvironmentModification::append(
                EnvSep::Platform,
                lib_path_var,
                self.paths.bin_dir.to_string_lossy(),
            ),
            EnvironmentModification::append(
                EnvSep::Platform,
                lib_path_var,
                self.paths.lib_dir.to_string_lossy(),
            ),
        ];
        if let Some(module_dir) = &self.paths.module_dir {
            mods.push(EnvironmentModification::append(
                EnvSep::Platform,
                lib_path_var,
                module_dir.to_string_lossy(),
            ));
        }
        mods.extend([
            EnvironmentModification::append(EnvSep::Platform, preload_var, hook_library),
            EnvironmentModification::set(CAPFILE_VAR, capture_file),
            EnvironmentModification::set(CAPOPTS_VAR, opts.encode()),
            EnvironmentModification::set(
                DEBUG_LOG_VAR,
                self.paths.debug_log_file.to_string_lossy(),
            ),
        ]);
        mods
    }

    /// `base` with the full hooking environment layered on top.
    #[must_use]
    pub fn hooked_environment(
        &self,
        base: &EnvMap,
        opts: &CaptureOptions,
        capture_file: &str,
    ) -> EnvMap {
        let mut env = base.clone();
        let mods = self.hooking_env_mods(base, opts, capture_file);
        apply(&mut env, &mods);
        env
    }

    /// `base` with the hook stripped: loader variables restored to their
    /// backed-up values and every hooking variable removed.
    #[must_use]
    pub fn unhooked_environment(&self, base: &EnvMap) -> EnvMap {
        let mut env = base.clone();

        let orig_libpath = env.remove(ORIG_LIBPATH_VAR).unwrap_or_default();
        let orig_preload = env.remove(ORIG_PRELOAD_VAR).unwrap_or_default();
        restore_or_remove(&mut env, self.platform.library_path_var(), orig_libpath);
        restore_or_remove(&mut env, self.platform.preload_var(), orig_preload);

        env.remove(CAPFILE_VAR);
        env.remove(CAPOPTS_VAR);
        env.remove(DEBUG_LOG_VAR);
        env.remove(self.platform.stay_hooked_var());
        env
    }

    /// Strip the hooking variables from the live process environment.
    ///
    /// Run inside a hooked process before it launches children that must
    /// not be hooked.
    pub fn reset_hooking_env(&self) {
        let unhooked = self.unhooked_environment(&current_env_map());
        for key in [
            ORIG_LIBPATH_VAR,
            ORIG_PRELOAD_VAR,
            CAPFILE_VAR,
            CAPOPTS_VAR,
            DEBUG_LOG_VAR,
            self.platform.stay_hooked_var(),
            self.platform.library_path_var(),
            self.platform.preload_var(),
        ] {
            match unhooked.get(key) {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }

    /// Launch `app` hooked for capture.
    ///
    /// The child starts paused at its entry point with the hook library
    /// preloaded; once the hook publishes its ident port (or the handshake
    /// deadline passes) the child is resumed. With `wait_for_exit` the call
    /// additionally blocks until the child terminates.
    #[allow(clippy::too_many_arguments)]
    pub fn launch_and_inject(
        &self,
        app: &str,
        working_dir: &str,
        command_line: &str,
        extra_env: &[EnvironmentModification],
        capture_file: &str,
        opts: &CaptureOptions,
        wait_for_exit: bool,
    ) -> Result<InjectOutcome> {
        let mut env = current_env_map();
        apply(&mut env, &self.registry.pending());
        apply(&mut env, extra_env);
        let hooking = self.hooking_env_mods(&env, opts, capture_file);
        apply(&mut env, &hooking);

        info!("Launching '{}' for capture to '{}'", app, capture_file);

        let config = LaunchConfig::new(app)
            .with_working_dir(working_dir)
            .with_command_line(command_line)
            .with_pause_at_main(true);
        let outcome = self.launcher.launch(&config, &env)?;
        let pid = outcome.pid;

        let ident_port = self.wait_for_handshake(pid);

        if ident_port == 0 {
            // Resume anyway so the child either runs unhooked or surfaces
            // its own crash instead of sitting paused forever.
            self.control.resume_process(pid, Duration::ZERO);
            error!("Handshake with hooked child {} timed out", pid);
            return Err(LaunchError::InjectionFailed(format!(
                "child {} never signalled readiness; it may have crashed at startup \
                 or the working directory '{}' may be wrong",
                pid, working_dir
            )));
        }

        debug!("Child {} hooked, ident port {}", pid, ident_port);
        self.control.resume_process(
            pid,
            Duration::from_secs(u64::from(opts.delay_for_debugger)),
        );

        if wait_for_exit {
            self.block_until_exit(pid);
        }

        Ok(InjectOutcome { pid, ident_port })
    }

    /// Injecting into an already-running process needs debugger-grade
    /// process manipulation that environment preloading cannot provide.
    pub fn inject_into_running(&self, pid: Pid) -> Result<InjectOutcome> {
        debug_assert!(!self.platform.can_inject_into_running());
        Err(LaunchError::Unsupported(format!(
            "injecting into running process {} is not supported on this platform; \
             relaunch the target through the tool instead",
            pid
        )))
    }

    /// Whether hooking every future process launch is possible here
    #[must_use]
    pub fn can_global_hook(&self) -> bool {
        self.platform.can_global_hook()
    }

    /// Hooking all future launches of a matching executable system-wide
    pub fn start_global_hook(&self, path_match: &str) -> Result<()> {
        Err(LaunchError::Unsupported(format!(
            "global hooking of '{}' is not supported on this platform",
            path_match
        )))
    }

    #[must_use]
    pub fn is_global_hook_active(&self) -> bool {
        false
    }

    pub fn stop_global_hook(&self) {}

    fn wait_for_handshake(&self, pid: Pid) -> IdentPort {
        let deadline = Instant::now() + self.handshake_timeout;
        let mut interval = PROBE_START;
        loop {
            let port = self.control.query_ident_port(pid);
            if port != 0 {
                return port;
            }
            if Instant::now() >= deadline {
                return 0;
            }
            std::thread::sleep(interval);
            interval = (interval * 2).min(PROBE_CAP);
        }
    }

    fn block_until_exit(&self, pid: Pid) {
        use nix::sys::wait::{waitpid, WaitStatus};

        loop {
            match waitpid(nix_pid(pid), None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    info!("Hooked child {} exited with code {}", pid, code);
                    return;
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    warn!("Hooked child {} killed by {}", pid, signal);
                    return;
                }
                Ok(_) => {}
                Err(nix::errno::Errno::EINTR) => {}
                Err(err) => {
                    // Typically ECHILD after the reaper already collected it
                    debug!("waitpid({}) failed: {}", pid, err);
                    return;
                }
            }
        }
    }
}

fn restore_or_remove(env: &mut EnvMap, key: &str, value: String) {
    if value.is_empty() {
        env.remove(key);
    } else {
        env.insert(key.to_string(), value);
    }
}
