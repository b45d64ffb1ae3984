//! taglock: mutual exclusion through tags on a shared cloud resource.
//!
//! A lock is a tag whose value records who holds it, since when, and for how
//! long. Acquisition writes the tag and reads it back; only a process that
//! sees its own value survive owns the lock. Expired locks are stolen by the
//! next acquirer.
//!
//! The library exposes the [`locks::LockEngine`], the [`scope::ScopeGuard`]
//! it hands out, the [`autoscaling`] health gate and scale-in protection
//! guard, and two [`store::TagStore`] backends. The `taglock` binary is a
//! thin CLI over them.

pub mod autoscaling;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod logging;
pub mod owner;
pub mod scope;
pub mod store;

#[cfg(test)]
mod test_support;
