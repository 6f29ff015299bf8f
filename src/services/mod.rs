//! System service adapters
//!
//! Thin wrappers around platform CLI tools plus the fixed-interval
//! pollers. Every wrapper is a best-effort adapter: a missing binary, a
//! non-zero exit, or unparsable output degrades to an empty result or
//! `false`, surfaced as status text by the shell, never as a crash.

pub mod audio;
pub mod battery;
pub mod bluetooth;
pub mod brightness;
pub mod hwmon;
pub mod media;
pub mod network;

use tokio::process::Command;
use tracing::debug;

/// Run a command and return its stdout, regardless of exit status.
///
/// `None` only when the binary could not be spawned at all; callers that
/// care about the exit status use [`run_ok`].
pub(crate) async fn run_capture(program: &str, args: &[&str]) -> Option<String> {
    match Command::new(program).args(args).output().await {
        Ok(output) => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
        Err(err) => {
            debug!("failed to spawn {}: {}", program, err);
            None
        }
    }
}

/// Run a command, reporting only whether it exited successfully.
pub(crate) async fn run_ok(program: &str, args: &[&str]) -> bool {
    match Command::new(program).args(args).output().await {
        Ok(output) => output.status.success(),
        Err(err) => {
            debug!("failed to spawn {}: {}", program, err);
            false
        }
    }
}
