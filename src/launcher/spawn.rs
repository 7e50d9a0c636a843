/*!
 * Process Launcher
 * fork/exec with optional output capture and pause-at-main synchronization
 */

use super::path::{resolve_app_path, shell_expand};
use super::types::{LaunchConfig, LaunchOutcome, ProcessOutput};
use crate::cmdline;
use crate::core::errors::{LaunchError, Result};
use crate::core::traits::TargetControl;
use crate::core::types::{nix_pid, Pid};
use crate::env::{to_env_block, EnvMap};
use crate::reaper::ZombieReaper;
use log::{info, warn};
use nix::errno::Errno;
use nix::libc;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{chdir, execve, fork, pipe, ForkResult};
use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::sync::Arc;

/// Launches target applications as OS child processes.
///
/// Children launched without output capture are handed to the
/// [`ZombieReaper`] for asynchronous reclamation; captured children are
/// drained and waited on synchronously on the calling thread.
pub struct ProcessLauncher {
    reaper: Arc<ZombieReaper>,
    control: Arc<dyn TargetControl>,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(reaper: Arc<ZombieReaper>, control: Arc<dyn TargetControl>) -> Self {
        Self { reaper, control }
    }

    /// Launch `config.app` with `env` as the child's entire environment.
    ///
    /// Returns without forking on an empty app path (`InvalidParameter`) or
    /// when path resolution fails (`LaunchFailed`); an exec failure inside
    /// the child is visible only as a non-zero exit code.
    pub fn launch(&self, config: &LaunchConfig, env: &EnvMap) -> Result<LaunchOutcome> {
        if config.app.trim().is_empty() {
            return Err(LaunchError::InvalidParameter(
                "empty application path".to_string(),
            ));
        }

        let app = shell_expand(&config.app);
        let app_path = resolve_app_path(&app)?;

        let work_dir = if config.working_dir.is_empty() {
            app_path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| ".".to_string())
        } else {
            shell_expand(&config.working_dir)
        };

        let argv = cmdline::tokenize(&app, &config.command_line)?;

        // Everything the child touches between fork and exec is prepared
        // here: allocating after fork in a multithreaded parent is unsafe.
        let exec_path = cstring(app_path.as_os_str().as_bytes())?;
        let work_dir_c = cstring(work_dir.as_bytes())?;
        let argv_c = argv
            .iter()
            .map(|a| cstring(a.as_bytes()))
            .collect::<Result<Vec<_>>>()?;
        let envp_c = to_env_block(env)
            .iter()
            .map(|line| cstring(line.as_bytes()))
            .collect::<Result<Vec<_>>>()?;

        let pipes = if config.capture_output {
            let stdout = make_pipe("stdout")?;
            let stderr = make_pipe("stderr")?;
            Some((stdout, stderr))
        } else {
            None
        };

        info!(
            "Launching '{}' in '{}' (pause_at_main: {}, capture: {})",
            app_path.display(),
            work_dir,
            config.pause_at_main,
            config.capture_output
        );

        // Safety: the child branch only performs async-signal-safe
        // operations (dup2/close/chdir/execve/_exit) on pre-built buffers.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                if config.pause_at_main {
                    self.control.stop_at_main_in_child();
                }

                if let Some(((out_r, out_w), (err_r, err_w))) = &pipes {
                    unsafe {
                        // Redirect stdout/stderr onto the pipe write ends,
                        // then close every pipe fd so none are inherited
                        // past exec.
                        libc::dup2(out_w.as_raw_fd(), libc::STDOUT_FILENO);
                        libc::dup2(err_w.as_raw_fd(), libc::STDERR_FILENO);
                        libc::close(out_r.as_raw_fd());
                        libc::close(err_r.as_raw_fd());
                        libc::close(out_w.as_raw_fd());
                        libc::close(err_w.as_raw_fd());
                    }
                }

                let _ = chdir(work_dir_c.as_c_str());
                let _ = execve(&exec_path, &argv_c, &envp_c);

                // exec failed; there is no caller to return to
                unsafe { libc::_exit(1) }
            }
            Ok(ForkResult::Parent { child }) => {
                let pid: Pid = child.as_raw();

                if config.pause_at_main && !self.control.stop_child_at_main(pid) {
                    warn!("Could not confirm child {} stopped at its entry point", pid);
                }

                match pipes {
                    Some(((out_r, out_w), (err_r, err_w))) => {
                        // Close write ends so the reads below see EOF when
                        // the child exits.
                        drop(out_w);
                        drop(err_w);
                        let output = self.drain_and_wait(pid, out_r, err_r);
                        Ok(LaunchOutcome {
                            pid,
                            output: Some(output),
                        })
                    }
                    None => {
                        // The child is fire-and-forget from the caller's
                        // point of view; remember it so it never zombies.
                        self.reaper.track(pid);
                        Ok(LaunchOutcome { pid, output: None })
                    }
                }
            }
            Err(e) => Err(LaunchError::LaunchFailed(format!(
                "fork failed for '{}': {}",
                app_path.display(),
                e
            ))),
        }
    }

    /// Run a shell script through the command interpreter.
    pub fn launch_script(
        &self,
        script: &str,
        working_dir: &str,
        arg_list: &str,
        env: &EnvMap,
        capture_output: bool,
    ) -> Result<LaunchOutcome> {
        let command_line = format!("-lc \"{} {}\"", script, arg_list);
        let config = LaunchConfig::new("bash")
            .with_working_dir(working_dir)
            .with_command_line(command_line)
            .with_output_capture(capture_output);
        self.launch(&config, env)
    }

    fn drain_and_wait(&self, pid: Pid, stdout: OwnedFd, stderr: OwnedFd) -> ProcessOutput {
        let mut out = Vec::new();
        let mut err = Vec::new();

        // Read to EOF; std's read_to_end retries on EINTR.
        if let Err(e) = File::from(stdout).read_to_end(&mut out) {
            warn!("Failed draining stdout of PID {}: {}", pid, e);
        }
        if let Err(e) = File::from(stderr).read_to_end(&mut err) {
            warn!("Failed draining stderr of PID {}: {}", pid, e);
        }

        let mut exit_code = 1;
        loop {
            match waitpid(nix_pid(pid), None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    info!("PID {} exited with code {}", pid, code);
                    exit_code = code;
                    break;
                }
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    warn!("PID {} did not exit normally (signal {:?})", pid, sig);
                    break;
                }
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    warn!("Failed to wait on PID {}: {}", pid, e);
                    break;
                }
            }
        }

        // Opportunistic sweep of fire-and-forget children that exited while
        // we were blocked here.
        self.reaper.drain();

        ProcessOutput {
            stdout: out,
            stderr: err,
            exit_code,
        }
    }
}

fn cstring(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|_| {
        LaunchError::InvalidParameter("embedded NUL byte in launch parameter".to_string())
    })
}

fn make_pipe(name: &str) -> Result<(OwnedFd, OwnedFd)> {
    pipe().map_err(|e| LaunchError::LaunchFailed(format!("could not create {} pipe: {}", name, e)))
}
