//! Filesystem utilities for taglock.
//!
//! The file-backed tag store and autoscaling backend rely on atomic
//! replacement so that readers in other processes never observe a torn value.

pub mod atomic;

pub use atomic::atomic_write;
pub use atomic::atomic_write_file;
