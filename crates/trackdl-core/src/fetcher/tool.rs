//! Bounded external tool invocation.
//!
//! Stdout is read line by line on a helper thread and handed back over a
//! channel, so the deadline holds even when the tool goes quiet. Stderr is
//! collected on its own thread; its tail is logged when the tool fails.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ToolError;

const STDERR_TAIL_LINES: usize = 8;
const EXIT_POLL: Duration = Duration::from_millis(50);

/// Runs `program args..`, calling `on_line` for each stdout line, and kills
/// it once `timeout` has elapsed. Ok only for a zero exit status.
pub fn run_tool<F>(
    program: &str,
    args: &[OsString],
    timeout: Duration,
    mut on_line: F,
) -> Result<(), ToolError>
where
    F: FnMut(&str),
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::Unavailable {
                program: program.to_string(),
            },
            _ => ToolError::Io {
                program: program.to_string(),
                source: e,
            },
        })?;
    tracing::debug!(program, pid = child.id(), "tool started");

    let (tx, rx) = mpsc::channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
    }
    let stderr_tail = child.stderr.take().map(|stderr| thread::spawn(move || tail_lines(stderr)));

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(kill_for_timeout(&mut child, program, timeout));
        }
        match rx.recv_timeout(remaining) {
            Ok(line) => on_line(&line),
            Err(RecvTimeoutError::Timeout) => {
                return Err(kill_for_timeout(&mut child, program, timeout))
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let status = match wait_until(&mut child, deadline) {
        Ok(Some(status)) => status,
        Ok(None) => return Err(kill_for_timeout(&mut child, program, timeout)),
        Err(e) => {
            return Err(ToolError::Io {
                program: program.to_string(),
                source: e,
            })
        }
    };

    if status.success() {
        tracing::debug!(program, "tool finished");
        return Ok(());
    }

    if let Some(handle) = stderr_tail {
        if let Ok(tail) = handle.join() {
            if !tail.is_empty() {
                tracing::warn!(program, "tool stderr: {}", tail.join(" | "));
            }
        }
    }
    Err(ToolError::Failed {
        program: program.to_string(),
        code: status.code(),
    })
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL);
    }
}

fn kill_for_timeout(child: &mut Child, program: &str, limit: Duration) -> ToolError {
    tracing::warn!(program, limit_secs = limit.as_secs(), "tool timed out, killing it");
    if let Err(e) = child.kill() {
        tracing::debug!(program, "kill failed: {}", e);
    }
    let _ = child.wait();
    ToolError::Timeout {
        program: program.to_string(),
        limit,
    }
}

fn tail_lines<R: Read>(reader: R) -> Vec<String> {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    for line in BufReader::new(reader).lines().map_while(Result::ok) {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into()
}
