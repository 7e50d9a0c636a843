/*!
 * Application Path Resolution
 * Shell-style expansion and executable search-path lookup
 */

use crate::core::errors::{LaunchError, Result};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Expand `./`, `~/` and `~user/` prefixes the way a shell would.
#[must_use]
pub fn shell_expand(input: &str) -> String {
    let path = input.trim();

    if let Some(rest) = path.strip_prefix("./") {
        if let Ok(cwd) = std::env::current_dir() {
            return cwd.join(rest).to_string_lossy().into_owned();
        }
    }

    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home, rest);
        }
    }

    if let Some(user_part) = path.strip_prefix('~') {
        if !user_part.is_empty() {
            let (user, rest) = match user_part.find('/') {
                Some(slash) => (&user_part[..slash], &user_part[slash..]),
                None => (user_part, ""),
            };
            if let Ok(Some(pw)) = nix::unistd::User::from_name(user) {
                return format!("{}{}", pw.dir.to_string_lossy(), rest);
            }
        }
    }

    path.to_string()
}

/// Resolve an application name to an absolute executable path.
///
/// A name containing a path separator is canonicalized relative to its
/// directory; a bare name is searched for on the executable search path.
/// Fails with [`LaunchError::LaunchFailed`] before any process is created.
pub fn resolve_app_path(app_name: &str) -> Result<PathBuf> {
    if app_name.contains(MAIN_SEPARATOR) {
        let path = Path::new(app_name);
        let base = path.file_name().ok_or_else(|| {
            LaunchError::InvalidParameter(format!("no file name in '{}'", app_name))
        })?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let dir = dir.canonicalize().map_err(|e| {
            LaunchError::LaunchFailed(format!(
                "cannot resolve directory of '{}': {}",
                app_name, e
            ))
        })?;

        let resolved = dir.join(base);
        if !resolved.is_file() {
            return Err(LaunchError::LaunchFailed(format!(
                "'{}' does not exist",
                resolved.display()
            )));
        }
        return Ok(resolved);
    }

    find_in_path(app_name).ok_or_else(|| {
        LaunchError::LaunchFailed(format!("'{}' not found in executable search path", app_name))
    })
}

fn find_in_path(file_name: &str) -> Option<PathBuf> {
    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}
