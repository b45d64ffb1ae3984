//! Child process handling for `run` and `protect`.

use crate::cli::ChildArgs;
use crate::error::{Result, TagLockError};
use crate::exit_codes;
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Program and arguments to run.
pub(crate) fn argv(child: &ChildArgs) -> Result<Vec<String>> {
    let args = match &child.command_line {
        Some(command_line) => shell_words::split(command_line).map_err(|e| {
            TagLockError::UserError(format!(
                "failed to parse command '{}': {}\n\
                 Fix: check for unmatched quotes or invalid escape sequences.",
                command_line, e
            ))
        })?,
        None => child.args.clone(),
    };

    if args.is_empty() {
        return Err(TagLockError::UserError(
            "no command given; pass --command \"...\" or append -- <program> [args...]"
                .to_string(),
        ));
    }
    Ok(args)
}

/// Start the child with inherited stdio.
pub(crate) fn spawn(argv: &[String]) -> Result<Child> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TagLockError::UserError("no command given".to_string()))?;

    Command::new(program).args(args).spawn().map_err(|e| {
        TagLockError::UserError(format!(
            "failed to execute command '{}': {}\n\
             Fix: ensure the command is installed and in PATH.",
            program, e
        ))
    })
}

/// Wait for the child to exit, calling `heartbeat` every `every`.
///
/// A heartbeat returning `false` stops further heartbeats; the child keeps
/// running either way. If waiting itself fails the child is killed and
/// reaped before the error is returned, so callers never release their lock
/// under a child that is still running.
pub(crate) fn wait_with_heartbeat<F>(
    child: &mut Child,
    every: Option<Duration>,
    mut heartbeat: F,
) -> Result<ExitStatus>
where
    F: FnMut() -> bool,
{
    let Some(interval) = every.map(|every| every.max(POLL_INTERVAL)) else {
        return child
            .wait()
            .map_err(|e| abandon(child, format!("failed to wait for command: {}", e)));
    };

    let mut last_beat = Instant::now();
    let mut beating = true;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if beating && last_beat.elapsed() >= interval {
                    beating = heartbeat();
                    last_beat = Instant::now();
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(abandon(
                    child,
                    format!("failed to check process status: {}", e),
                ));
            }
        }
    }
}

/// Kill the child and reap it. Failures are logged; the child may already be
/// gone.
fn abandon(child: &mut Child, reason: String) -> TagLockError {
    warn!(pid = child.id(), %reason, "stopping command");
    if let Err(e) = child.kill() {
        warn!(pid = child.id(), error = %e, "failed to kill command");
    }
    if let Err(e) = child.wait() {
        warn!(pid = child.id(), error = %e, "failed to reap command");
    }
    TagLockError::UserError(reason)
}

/// The child's exit code, or [`exit_codes::CHILD_TERMINATED`] when it was
/// killed by a signal.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(exit_codes::CHILD_TERMINATED)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_args(command_line: Option<&str>, args: &[&str]) -> ChildArgs {
        ChildArgs {
            command_line: command_line.map(str::to_string),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_argv_splits_command_line() {
        let argv = argv(&child_args(Some("echo 'hello world' \"x y\""), &[])).unwrap();
        assert_eq!(argv, vec!["echo", "hello world", "x y"]);
    }

    #[test]
    fn test_argv_uses_trailing_args() {
        let argv = argv(&child_args(None, &["./deploy.sh", "--fast"])).unwrap();
        assert_eq!(argv, vec!["./deploy.sh", "--fast"]);
    }

    #[test]
    fn test_argv_rejects_empty_and_unbalanced() {
        assert!(argv(&child_args(None, &[])).is_err());
        assert!(argv(&child_args(Some("   "), &[])).is_err());
        assert!(argv(&child_args(Some("echo 'oops"), &[])).is_err());
    }

    #[test]
    fn test_spawn_missing_program_is_user_error() {
        let err = spawn(&["taglock-no-such-program-xyz".to_string()]).unwrap_err();
        assert!(matches!(err, TagLockError::UserError(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_passes_through() {
        let mut child = spawn(&["sh".to_string(), "-c".to_string(), "exit 7".to_string()]).unwrap();
        let status = wait_with_heartbeat(&mut child, None, || true).unwrap();
        assert_eq!(exit_code(status), 7);
    }

    #[cfg(unix)]
    #[test]
    fn test_signaled_child_maps_to_terminated() {
        let mut child =
            spawn(&["sh".to_string(), "-c".to_string(), "kill -9 $$".to_string()]).unwrap();
        let status = wait_with_heartbeat(&mut child, None, || true).unwrap();
        assert_eq!(exit_code(status), exit_codes::CHILD_TERMINATED);
    }

    #[cfg(unix)]
    #[test]
    fn test_abandon_kills_and_reaps_running_child() {
        let mut child =
            spawn(&["sh".to_string(), "-c".to_string(), "sleep 30".to_string()]).unwrap();
        let started = Instant::now();

        let err = abandon(&mut child, "failed to check process status: gone".to_string());

        assert!(matches!(err, TagLockError::UserError(ref m) if m.contains("gone")));
        let status = child.try_wait().unwrap().unwrap();
        assert_eq!(exit_code(status), exit_codes::CHILD_TERMINATED);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_heartbeat_runs_while_child_lives_and_can_stop() {
        let mut child =
            spawn(&["sh".to_string(), "-c".to_string(), "sleep 1".to_string()]).unwrap();
        let mut beats = 0;
        let status = wait_with_heartbeat(&mut child, Some(Duration::from_millis(100)), || {
            beats += 1;
            beats < 2
        })
        .unwrap();

        assert!(status.success());
        assert_eq!(beats, 2);
    }
}
