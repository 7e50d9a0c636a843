/*!
 * Environment Modification Types
 * Ordered Set/Append/Prepend changes to environment variables
 */

use serde::{Deserialize, Serialize};

#[cfg(unix)]
const PLATFORM_PATH_SEP: &str = ":";
#[cfg(windows)]
const PLATFORM_PATH_SEP: &str = ";";

/// How a modification combines with the variable's current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvMod {
    /// Replace the value outright
    Set,
    /// Add the new value at the end, separated from a non-empty current value
    Append,
    /// Add the new value at the front, separated from a non-empty current value
    Prepend,
}

/// Separator inserted between the current value and the new value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvSep {
    None,
    Colon,
    Semicolon,
    /// The OS path-list separator
    Platform,
}

impl EnvSep {
    /// Literal separator text, if any
    #[inline]
    #[must_use]
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            EnvSep::None => None,
            EnvSep::Colon => Some(":"),
            EnvSep::Semicolon => Some(";"),
            EnvSep::Platform => Some(PLATFORM_PATH_SEP),
        }
    }
}

/// One ordered change to a single environment variable.
///
/// Immutable once constructed; sequences of modifications are applied in
/// order, so later entries observe the effects of earlier ones on the same
/// variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EnvironmentModification {
    pub name: String,
    pub op: EnvMod,
    pub sep: EnvSep,
    pub value: String,
}

impl EnvironmentModification {
    #[inline]
    #[must_use]
    pub fn new(
        op: EnvMod,
        sep: EnvSep,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            op,
            sep,
            value: value.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(EnvMod::Set, EnvSep::None, name, value)
    }

    #[inline]
    #[must_use]
    pub fn append(sep: EnvSep, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(EnvMod::Append, sep, name, value)
    }

    #[inline]
    #[must_use]
    pub fn prepend(sep: EnvSep, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(EnvMod::Prepend, sep, name, value)
    }
}
