/*!
 * Injection Coordination
 * Environment-preload hooking of launched target processes
 */

mod coordinator;
mod options;
mod platform;

pub use coordinator::{InjectOutcome, InjectionCoordinator, ToolPaths};
pub use options::CaptureOptions;
pub use platform::{
    default_platform, HookPlatform, PosixPlatform, CAPFILE_VAR, CAPOPTS_VAR, DEBUG_LOG_VAR,
    HOOK_LIBRARY_BASENAME, ORIG_LIBPATH_VAR, ORIG_PRELOAD_VAR, STAY_HOOKED_VAR,
};
