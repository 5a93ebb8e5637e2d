// SPDX-License-Identifier: GPL-3.0-only

//! External command execution with capture and timeout.
//!
//! A timed-out command is killed and reported as a failure; callers treat it
//! exactly like a non-zero exit code.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::{Result, SysError};

/// Captured result of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a command to completion and return its stdout, failing on non-zero
/// exit.
pub fn run_capture(command: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(command).args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SysError::OperationFailed(format!(
            "{command} failed: {stderr}"
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

// A child that fills the pipe buffer blocks on write until someone reads,
// so each pipe gets its own drain thread while the deadline loop polls.
fn spawn_pipe_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        String::from_utf8_lossy(&buffer).to_string()
    })
}

fn join_pipe_reader(reader: Option<JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Run a command with a deadline. The child is polled until it exits or the
/// timeout elapses; on timeout it is killed and the call fails.
pub fn run_capture_with_timeout(
    command: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput> {
    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_reader = child.stdout.take().map(spawn_pipe_reader);
    let stderr_reader = child.stderr.take().map(spawn_pipe_reader);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            tracing::warn!(command, timeout_secs = timeout.as_secs(), "command timed out");
            let _ = child.kill();
            let _ = child.wait();
            return Err(SysError::Timeout(timeout.as_secs(), command.to_string()));
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout: join_pipe_reader(stdout_reader),
        stderr: join_pipe_reader(stderr_reader),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_exit_code_and_output() {
        let out = run_capture_with_timeout("sh", &["-c", "echo hi; exit 0"], Duration::from_secs(5))
            .expect("run sh");
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hi");
    }

    #[test]
    fn nonzero_exit_is_reported_not_errored() {
        let out = run_capture_with_timeout("sh", &["-c", "exit 3"], Duration::from_secs(5))
            .expect("run sh");
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
    }

    #[test]
    fn output_larger_than_the_pipe_buffer_is_drained() {
        let out = run_capture_with_timeout(
            "sh",
            &["-c", "head -c 1048576 /dev/zero | tr '\\0' a"],
            Duration::from_secs(10),
        )
        .expect("run sh");
        assert!(out.success());
        assert_eq!(out.stdout.len(), 1_048_576);
    }

    #[test]
    fn timeout_kills_the_child() {
        let result =
            run_capture_with_timeout("sh", &["-c", "sleep 30"], Duration::from_millis(100));
        assert!(matches!(result, Err(SysError::Timeout(_, _))));
    }
}
