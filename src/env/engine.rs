/*!
 * Environment Modification Engine
 * Ordered application of modifications onto an environment map
 */

use super::types::{EnvMod, EnvironmentModification};
use log::debug;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Key -> value environment mapping.
///
/// A `BTreeMap` keeps composed environment blocks deterministically ordered,
/// which keeps exec'd children and logs reproducible.
pub type EnvMap = BTreeMap<String, String>;

/// Snapshot of the live process environment as a map
#[must_use]
pub fn current_env_map() -> EnvMap {
    std::env::vars().collect()
}

/// Flatten a map into "NAME=value" lines, the shape execve wants
#[must_use]
pub fn to_env_block(map: &EnvMap) -> Vec<String> {
    map.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}

/// Apply one modification to the current value of its variable.
pub fn apply_single(m: &EnvironmentModification, value: &mut String) {
    match m.op {
        EnvMod::Set => *value = m.value.clone(),
        EnvMod::Append => {
            if !value.is_empty() {
                if let Some(sep) = m.sep.as_str() {
                    value.push_str(sep);
                }
            }
            value.push_str(&m.value);
        }
        EnvMod::Prepend => {
            if value.is_empty() {
                *value = m.value.clone();
            } else {
                let mut prepended = m.value.clone();
                if let Some(sep) = m.sep.as_str() {
                    prepended.push_str(sep);
                }
                prepended.push_str(value);
                *value = prepended;
            }
        }
    }
}

/// Apply modifications in order onto a private copy of an environment.
///
/// A variable that was never present starts from the empty string, so
/// Append and Prepend degenerate to Set for it.
pub fn apply(map: &mut EnvMap, mods: &[EnvironmentModification]) {
    for m in mods {
        let value = map.entry(m.name.clone()).or_default();
        apply_single(m, value);
    }
}

/// Apply modifications against the live process environment, exporting each
/// fully-resolved value. Subsequently spawned children inherit the result,
/// as does in-process code querying the environment directly.
pub fn apply_to_process(mods: &[EnvironmentModification]) {
    let mut env = current_env_map();
    for m in mods {
        let value = env.entry(m.name.clone()).or_default();
        apply_single(m, value);
        debug!("Exporting {}={}", m.name, value);
        std::env::set_var(&m.name, value.as_str());
    }
}

/// Process-wide pending environment modifications.
///
/// Registrations append in order from any thread; `apply_to_process` drains
/// the list and applies it to the live environment exactly once.
pub struct EnvRegistry {
    pending: Mutex<Vec<EnvironmentModification>>,
}

impl EnvRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue a modification for the next application.
    pub fn register(&self, m: EnvironmentModification) {
        self.pending.lock().push(m);
    }

    /// Registration-order snapshot of not-yet-applied modifications.
    #[must_use]
    pub fn pending(&self) -> Vec<EnvironmentModification> {
        self.pending.lock().clone()
    }

    /// Drain the pending list and apply it to the live process environment.
    /// Single-shot: an applied modification is never reapplied.
    pub fn apply_to_process(&self) {
        let mods = std::mem::take(&mut *self.pending.lock());
        apply_to_process(&mods);
    }
}

impl Default for EnvRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::types::EnvSep;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn base() -> EnvMap {
        let mut map = EnvMap::new();
        map.insert("PRESENT".to_string(), "original".to_string());
        map
    }

    #[test]
    fn test_set_replaces() {
        let mut map = base();
        apply(&mut map, &[EnvironmentModification::set("PRESENT", "new")]);
        assert_eq!(map["PRESENT"], "new");
    }

    #[test]
    fn test_append_to_absent_equals_set() {
        let mut map = base();
        apply(
            &mut map,
            &[EnvironmentModification::append(EnvSep::Colon, "ABSENT", "value")],
        );
        assert_eq!(map["ABSENT"], "value");

        let mut map = base();
        apply(
            &mut map,
            &[EnvironmentModification::prepend(EnvSep::Colon, "ABSENT", "value")],
        );
        assert_eq!(map["ABSENT"], "value");
    }

    #[test]
    fn test_append_and_prepend_separators() {
        let mut map = base();
        apply(
            &mut map,
            &[
                EnvironmentModification::prepend(EnvSep::Colon, "PRESENT", "front"),
                EnvironmentModification::append(EnvSep::Colon, "PRESENT", "back"),
            ],
        );
        assert_eq!(map["PRESENT"], "front:original:back");
    }

    #[test]
    fn test_no_separator_when_none() {
        let mut map = base();
        apply(
            &mut map,
            &[EnvironmentModification::append(EnvSep::None, "PRESENT", "back")],
        );
        assert_eq!(map["PRESENT"], "originalback");
    }

    #[test]
    fn test_platform_separator_resolves() {
        let mut map = base();
        apply(
            &mut map,
            &[EnvironmentModification::append(EnvSep::Platform, "PRESENT", "back")],
        );
        #[cfg(unix)]
        assert_eq!(map["PRESENT"], "original:back");
    }

    #[test]
    fn test_later_entries_observe_earlier_effects() {
        let mut map = EnvMap::new();
        apply(
            &mut map,
            &[
                EnvironmentModification::set("X", "a"),
                EnvironmentModification::append(EnvSep::Semicolon, "X", "b"),
                EnvironmentModification::set("X", "c"),
                EnvironmentModification::append(EnvSep::Semicolon, "X", "d"),
            ],
        );
        assert_eq!(map["X"], "c;d");
    }

    #[test]
    fn test_registry_is_single_shot() {
        let registry = EnvRegistry::new();
        registry.register(EnvironmentModification::set("FRAMECAP_TEST_REGISTRY", "1"));
        assert_eq!(registry.pending().len(), 1);

        registry.apply_to_process();
        assert_eq!(std::env::var("FRAMECAP_TEST_REGISTRY").unwrap(), "1");
        assert!(registry.pending().is_empty());

        std::env::remove_var("FRAMECAP_TEST_REGISTRY");
        registry.apply_to_process();
        assert!(std::env::var("FRAMECAP_TEST_REGISTRY").is_err());
    }

    fn mod_strategy() -> impl Strategy<Value = EnvironmentModification> {
        let op = prop_oneof![Just(EnvMod::Set), Just(EnvMod::Append), Just(EnvMod::Prepend)];
        let sep = prop_oneof![
            Just(EnvSep::None),
            Just(EnvSep::Colon),
            Just(EnvSep::Semicolon),
            Just(EnvSep::Platform),
        ];
        (op, sep, "[A-C]{1}", "[a-z]{0,4}").prop_map(|(op, sep, name, value)| {
            EnvironmentModification::new(op, sep, name, value)
        })
    }

    proptest! {
        #[test]
        fn prop_apply_is_deterministic(mods in proptest::collection::vec(mod_strategy(), 0..16)) {
            let mut one = base();
            let mut two = base();
            apply(&mut one, &mods);
            apply(&mut two, &mods);
            prop_assert_eq!(one, two);
        }

        #[test]
        fn prop_apply_never_loses_other_keys(mods in proptest::collection::vec(mod_strategy(), 0..16)) {
            let mut map = base();
            map.insert("UNTOUCHED".to_string(), "kept".to_string());
            apply(&mut map, &mods);
            prop_assert_eq!(map.get("UNTOUCHED").map(String::as_str), Some("kept"));
        }
    }
}
