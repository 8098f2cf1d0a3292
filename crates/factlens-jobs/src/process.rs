//! External command execution for media tools.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use factlens_core::{Error, Result};

/// Stderr kept in error messages, in characters.
const STDERR_TAIL_CHARS: usize = 500;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, capturing its output.
///
/// A command that cannot be spawned, exits non-zero, or outlives `timeout`
/// is an acquisition error. Timed-out children are killed.
pub async fn run_command<I, S>(program: &str, args: I, timeout: Duration) -> Result<ProcessOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            Error::Acquisition(format!("{} timed out after {:?}", program, timeout))
        })?
        .map_err(|e| Error::Acquisition(format!("Failed to execute {}: {}", program, e)))?;

    let output = ProcessOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    debug!(
        program,
        status = %output.status,
        duration_ms = start.elapsed().as_millis() as u64,
        "Command finished"
    );

    if !output.status.success() {
        return Err(Error::Acquisition(format!(
            "{} failed ({}): {}",
            program,
            output.status,
            tail(output.stderr.trim(), STDERR_TAIL_CHARS)
        )));
    }

    Ok(output)
}

/// Last `max` characters of `s`.
fn tail(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    let skip = count - max;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
