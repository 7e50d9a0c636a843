/*!
 * Launch Integration Tests
 * End-to-end fork/exec, output capture, reaping, and injection handshake
 */

use framecap_launch::env::{current_env_map, EnvMap, EnvRegistry};
use framecap_launch::inject::ToolPaths;
use framecap_launch::reaper::install;
use framecap_launch::{
    CaptureOptions, IdentPort, InjectionCoordinator, LaunchConfig, LaunchError, NullControl, Pid,
    ProcessLauncher, TargetControl,
};
use serial_test::serial;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn launcher() -> ProcessLauncher {
    let _ = env_logger::builder().is_test(true).try_init();
    ProcessLauncher::new(install(), Arc::new(NullControl))
}

fn plain_env() -> EnvMap {
    current_env_map()
}

#[test]
#[serial]
fn test_nonexistent_app_fails_without_forking() {
    let launcher = launcher();
    let reaper = install();
    let tracked_before = reaper.tracked_count();

    let config = LaunchConfig::new("/nonexistent/path/to/app");
    let result = launcher.launch(&config, &plain_env());

    assert!(matches!(result, Err(LaunchError::LaunchFailed(_))));
    assert_eq!(reaper.tracked_count(), tracked_before);
}

#[test]
#[serial]
fn test_empty_app_is_invalid_parameter() {
    let launcher = launcher();
    let result = launcher.launch(&LaunchConfig::new("  "), &plain_env());
    assert!(matches!(result, Err(LaunchError::InvalidParameter(_))));
}

#[test]
#[serial]
fn test_captured_launch_returns_stdout_and_exit_code() {
    let launcher = launcher();
    let config = LaunchConfig::new("/bin/echo")
        .with_command_line("hello capture")
        .with_output_capture(true);

    let outcome = launcher.launch(&config, &plain_env()).unwrap();

    assert!(outcome.pid > 0);
    let output = outcome.output.expect("captured launch must wait");
    assert_eq!(output.exit_code, 0);
    assert!(output.stdout_text().contains("hello capture"));
}

#[test]
#[serial]
fn test_captured_launch_reports_nonzero_exit() {
    let launcher = launcher();
    let config = LaunchConfig::new("/bin/sh")
        .with_command_line("-c \"exit 3\"")
        .with_output_capture(true);

    let outcome = launcher.launch(&config, &plain_env()).unwrap();
    assert_eq!(outcome.output.unwrap().exit_code, 3);
}

#[test]
#[serial]
fn test_captured_launch_separates_stderr() {
    let launcher = launcher();
    let config = LaunchConfig::new("/bin/sh")
        .with_command_line("-c \"echo oops >&2\"")
        .with_output_capture(true);

    let output = launcher.launch(&config, &plain_env()).unwrap().output.unwrap();
    assert!(output.stderr_text().contains("oops"));
    assert!(output.stdout.is_empty());
}

#[test]
#[serial]
fn test_fire_and_forget_child_is_tracked_and_reaped() {
    let launcher = launcher();
    let reaper = install();

    let config = LaunchConfig::new("/bin/sleep").with_command_line("0");
    let outcome = launcher.launch(&config, &plain_env()).unwrap();
    assert!(outcome.pid > 0);
    assert!(outcome.output.is_none());

    // The SIGCHLD handler or a manual drain must eventually collect it
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        reaper.drain();
        if reaper.tracked_count() == 0 {
            break;
        }
        assert!(Instant::now() < deadline, "child was never reaped");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
#[serial]
fn test_install_is_idempotent() {
    let first = install();
    let second = install();
    assert!(Arc::ptr_eq(&first, &second));
}

/// Records resume calls and answers handshake probes with a fixed port.
struct StubControl {
    port: IdentPort,
    resumes: AtomicUsize,
}

impl StubControl {
    fn new(port: IdentPort) -> Self {
        Self {
            port,
            resumes: AtomicUsize::new(0),
        }
    }
}

impl TargetControl for StubControl {
    fn stop_at_main_in_child(&self) {}

    fn stop_child_at_main(&self, _pid: Pid) -> bool {
        true
    }

    fn resume_process(&self, _pid: Pid, _delay: Duration) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn query_ident_port(&self, _pid: Pid) -> IdentPort {
        self.port
    }
}

fn coordinator(control: Arc<StubControl>) -> InjectionCoordinator {
    InjectionCoordinator::new(
        ProcessLauncher::new(install(), control.clone()),
        Arc::new(EnvRegistry::new()),
        control,
    )
    .with_paths(ToolPaths {
        bin_dir: PathBuf::from("/opt/framecap/bin"),
        lib_dir: PathBuf::from("/opt/framecap/lib"),
        module_dir: None,
        debug_log_file: PathBuf::from("/tmp/framecap-test.log"),
    })
}

#[test]
#[serial]
fn test_handshake_timeout_still_resumes_child() {
    let control = Arc::new(StubControl::new(0));
    let coord =
        coordinator(control.clone()).with_handshake_timeout(Duration::from_millis(100));

    let result = coord.launch_and_inject(
        "/bin/sleep",
        "",
        "0",
        &[],
        "/tmp/out.cap",
        &CaptureOptions::default(),
        false,
    );

    assert!(matches!(result, Err(LaunchError::InjectionFailed(_))));
    assert_eq!(control.resumes.load(Ordering::SeqCst), 1);
}

#[test]
#[serial]
fn test_successful_handshake_reports_ident_port() {
    let control = Arc::new(StubControl::new(1234));
    let coord = coordinator(control.clone());

    let outcome = coord
        .launch_and_inject(
            "/bin/sleep",
            "",
            "0",
            &[],
            "/tmp/out.cap",
            &CaptureOptions::default(),
            true,
        )
        .unwrap();

    assert!(outcome.pid > 0);
    assert_eq!(outcome.ident_port, 1234);
    assert_eq!(control.resumes.load(Ordering::SeqCst), 1);
}
