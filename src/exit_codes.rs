//! Exit code constants for the taglock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: Child command terminated by a signal
//! - 3: Tag store failure
//! - 4: Lock acquisition failure
//!
//! `taglock run` and `taglock protect` exit with the child's own exit code
//! when it exits normally.

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// The wrapped child command was terminated by a signal.
pub const CHILD_TERMINATED: i32 = 2;

/// Tag store failure: the store could not be read, written or cleaned up.
pub const STORE_FAILURE: i32 = 3;

/// Lock acquisition failure: busy, lost race, lost lock or unhealthy instance.
pub const LOCK_FAILURE: i32 = 4;
