/*!
 * Environment Modification
 * Ordered environment changes for launches and library injection
 */

mod engine;
mod types;

pub use engine::{
    apply, apply_single, apply_to_process, current_env_map, to_env_block, EnvMap, EnvRegistry,
};
pub use types::{EnvMod, EnvSep, EnvironmentModification};
