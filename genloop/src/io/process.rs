//! Child process runner for command-backed collaborators.

use std::io::{ErrorKind, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured output of one collaborator command.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped past the output limit.
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// `[<label> stderr truncated N bytes]`, or empty when nothing was dropped.
    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated == 0 {
            return String::new();
        }
        format!("\n[{label} stderr truncated {} bytes]", self.stderr_truncated)
    }
}

/// Run `cmd`, feed it `stdin`, and collect its output until it exits or
/// `timeout` elapses.
///
/// Stdin is written and both output pipes are drained on their own threads so
/// a child that writes before reading its whole prompt cannot deadlock.
/// `output_limit_bytes` bounds what is kept of each stream; the rest is read
/// and discarded. A child that exits without reading stdin is not an error.
#[instrument(
    skip_all,
    fields(timeout_secs = timeout.as_secs(), stdin_bytes = stdin.map_or(0, <[u8]>::len))
)]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let stdin_handle = match (stdin, child.stdin.take()) {
        (Some(input), Some(pipe)) => {
            let input = input.to_vec();
            Some(thread::spawn(move || write_stdin(pipe, &input)))
        }
        (Some(_), None) => return Err(anyhow!("stdin was not piped")),
        _ => None,
    };

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    if let Some(handle) = stdin_handle {
        join_thread(handle).context("write stdin")?;
    }
    let (stdout, stdout_truncated) = join_thread(stdout_handle).context("read stdout")?;
    let (stderr, stderr_truncated) = join_thread(stderr_handle).context("read stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn write_stdin<W: Write>(mut pipe: W, input: &[u8]) -> Result<()> {
    // Dropping `pipe` on return closes the child's stdin.
    match pipe.write_all(input) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::BrokenPipe => {
            debug!("child closed stdin early");
            Ok(())
        }
        Err(err) => Err(err).context("write prompt"),
    }
}

fn join_thread<T>(handle: thread::JoinHandle<Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("pipe thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        truncated += n - keep;
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_stdin() {
        let output = run_command_with_timeout(
            sh("cat"),
            Some(b"hello"),
            Duration::from_secs(10),
            1024,
        )
        .expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hello");
        assert!(!output.timed_out);
    }

    #[test]
    fn bounds_captured_output() {
        let output = run_command_with_timeout(
            sh("printf 0123456789"),
            None,
            Duration::from_secs(10),
            4,
        )
        .expect("run");
        assert_eq!(output.stdout, b"0123");
        assert_eq!(output.stdout_truncated, 6);
        assert!(output.stderr_truncated_notice("generator").is_empty());
    }

    #[test]
    fn child_ignoring_stdin_is_not_an_error() {
        let prompt = vec![b'x'; 1 << 20];
        let output =
            run_command_with_timeout(sh("echo done"), Some(&prompt), Duration::from_secs(10), 1024)
                .expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"done\n");
    }

    #[test]
    fn large_prompt_and_large_output_do_not_deadlock() {
        let prompt = vec![b'y'; 1 << 20];
        let output = run_command_with_timeout(
            sh("head -c 200000 /dev/zero; cat >/dev/null"),
            Some(&prompt),
            Duration::from_secs(10),
            1 << 20,
        )
        .expect("run");
        assert!(!output.timed_out);
        assert_eq!(output.stdout.len(), 200_000);
    }

    #[test]
    fn kills_on_timeout() {
        let output =
            run_command_with_timeout(sh("sleep 5"), None, Duration::from_millis(100), 1024)
                .expect("run");
        assert!(output.timed_out);
    }
}
