/*!
 * Hook Platform Provider
 * Loader variable names and injection capabilities per platform
 */

/// Capture file path handed to the hooked library
pub const CAPFILE_VAR: &str = "FRAMECAP_CAPFILE";
/// Encoded capture options handed to the hooked library
pub const CAPOPTS_VAR: &str = "FRAMECAP_CAPOPTS";
/// Debug log file shared between tool and hooked library
pub const DEBUG_LOG_VAR: &str = "FRAMECAP_DEBUG_LOG_FILE";
/// Pre-hook value of the library search path, for later restoration
pub const ORIG_LIBPATH_VAR: &str = "FRAMECAP_ORIGLIBPATH";
/// Pre-hook value of the preload variable, for later restoration
pub const ORIG_PRELOAD_VAR: &str = "FRAMECAP_ORIGPRELOAD";
/// Marks a child that must stay hooked indefinitely
pub const STAY_HOOKED_VAR: &str = "FRAMECAP_STAY_HOOKED";
/// Capture driver library, without the platform suffix
pub const HOOK_LIBRARY_BASENAME: &str = "libframecap";

/// Platform-specific hooking knowledge, selected once at startup.
///
/// New platforms add one implementation instead of scattering conditionals
/// through the launch and injection logic.
pub trait HookPlatform: Send + Sync {
    /// Preload variable consumed by the dynamic loader
    fn preload_var(&self) -> &'static str;

    /// Library search path variable consumed by the dynamic loader
    fn library_path_var(&self) -> &'static str;

    /// Shared library filename suffix, dot included
    fn library_suffix(&self) -> &'static str;

    /// Marker telling a hooked process to keep its own children hooked
    fn stay_hooked_var(&self) -> &'static str {
        STAY_HOOKED_VAR
    }

    /// Whether injecting into an already-running process is possible
    fn can_inject_into_running(&self) -> bool {
        false
    }

    /// Whether hooking all future process launches is possible
    fn can_global_hook(&self) -> bool {
        false
    }
}

/// Environment-preload hooking through the POSIX dynamic loader
pub struct PosixPlatform;

impl HookPlatform for PosixPlatform {
    #[cfg(not(target_os = "macos"))]
    fn preload_var(&self) -> &'static str {
        "LD_PRELOAD"
    }

    #[cfg(target_os = "macos")]
    fn preload_var(&self) -> &'static str {
        "DYLD_INSERT_LIBRARIES"
    }

    #[cfg(not(target_os = "macos"))]
    fn library_path_var(&self) -> &'static str {
        "LD_LIBRARY_PATH"
    }

    #[cfg(target_os = "macos")]
    fn library_path_var(&self) -> &'static str {
        "DYLD_LIBRARY_PATH"
    }

    #[cfg(not(target_os = "macos"))]
    fn library_suffix(&self) -> &'static str {
        ".so"
    }

    #[cfg(target_os = "macos")]
    fn library_suffix(&self) -> &'static str {
        ".dylib"
    }
}

/// Platform provider for the current build target.
#[must_use]
pub fn default_platform() -> &'static dyn HookPlatform {
    &PosixPlatform
}
