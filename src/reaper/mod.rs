/*!
 * Zombie Reaper
 * Signal-driven reclamation of exited child processes
 */

mod handler;
mod list;

pub use handler::{install, ZombieReaper};
pub use list::{ListHead, PidSlab};
