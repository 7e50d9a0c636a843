/*!
 * Core Module
 * Shared types, errors, traits, and synchronization primitives
 */

pub mod errors;
pub mod sync;
pub mod traits;
pub mod types;
