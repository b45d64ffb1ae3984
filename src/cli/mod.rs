//! CLI argument parsing for taglock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// taglock: distributed locks stored as tags on a shared resource.
///
/// Each lock is one tag whose value records the owner, acquisition time and
/// lease. Processes on different machines contend for the same tag; stale
/// locks are stolen once their lease runs out.
#[derive(Parser, Debug)]
#[command(name = "taglock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command. They override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to the YAML config file (defaults apply if it does not exist).
    #[arg(long, global = true, default_value = "taglock.yaml")]
    pub config: PathBuf,

    /// Resource whose tags hold the locks.
    #[arg(long, global = true)]
    pub resource: Option<String>,

    /// Root directory of the tag store.
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Owner id to record (default: user@host).
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands for taglock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire a lock and keep it after exiting.
    ///
    /// Prints the acquired record. Release it later with `release`, or let
    /// the lease run out.
    Acquire(AcquireArgs),

    /// Restart the lease of a lock held by this owner.
    Renew(RenewArgs),

    /// Release a lock held by this owner.
    ///
    /// Locks now held by someone else are left alone.
    Release(ReleaseArgs),

    /// List lock records on the resource.
    Status(StatusArgs),

    /// Run a command while holding a lock.
    ///
    /// Checks instance health, acquires the lock, protects the instance from
    /// scale-in, runs the command, then restores protection and releases.
    Run(RunArgs),

    /// Run a command with scale-in protection set (or cleared).
    Protect(ProtectArgs),
}

/// Arguments for the `acquire` command.
#[derive(Parser, Debug)]
pub struct AcquireArgs {
    /// Lock name (the tag key).
    pub name: String,

    /// Lease in seconds (default from config).
    #[arg(long)]
    pub lease: Option<u64>,

    /// Seconds to keep retrying while the lock is held (default from config).
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the `renew` command.
#[derive(Parser, Debug)]
pub struct RenewArgs {
    /// Lock name (the tag key).
    pub name: String,

    /// New lease in seconds (default: keep the current lease).
    #[arg(long)]
    pub lease: Option<u64>,
}

/// Arguments for the `release` command.
#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Lock name (the tag key).
    pub name: String,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Only show locks whose names match this glob.
    #[arg(long)]
    pub filter: Option<String>,
}

/// The child process to run: `--command "STR"` or everything after `--`.
#[derive(Args, Debug, Default)]
pub struct ChildArgs {
    /// Command line to run, split with shell quoting rules.
    #[arg(long = "command", conflicts_with = "args")]
    pub command_line: Option<String>,

    /// Program and arguments to run.
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Lock name (the tag key).
    pub name: String,

    /// Lease in seconds (default from config).
    #[arg(long)]
    pub lease: Option<u64>,

    /// Seconds to keep retrying while the lock is held (default from config).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Renew the lock every N seconds while the command runs.
    #[arg(long)]
    pub renew_every: Option<u64>,

    /// Do not set scale-in protection while the lock is held.
    #[arg(long)]
    pub no_protect: bool,

    /// Take the lock even if the instance is unhealthy.
    #[arg(long)]
    pub no_health_check: bool,

    #[command(flatten)]
    pub child: ChildArgs,
}

/// Arguments for the `protect` command.
#[derive(Parser, Debug)]
pub struct ProtectArgs {
    /// Clear scale-in protection instead of setting it.
    #[arg(long)]
    pub unprotect: bool,

    #[command(flatten)]
    pub child: ChildArgs,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
