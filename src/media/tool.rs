use std::io::{self, Read, Write};
use std::process::{ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("'{program}' not found; is it installed and on PATH?")]
    NotFound { program: String },
    #[error("{program} exited with {status}\n{stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{program} timed out after {seconds}s")]
    TimedOut { program: String, seconds: u64 },
    #[error("run {program}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `cmd` to completion, feeding `stdin` and capturing both output streams.
///
/// A zero `timeout` waits indefinitely; otherwise the child is killed at the deadline.
pub fn run(cmd: &mut Command, stdin: Option<&str>, timeout: Duration) -> Result<ToolOutput, ToolError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    tracing::debug!(
        program = %program,
        args = ?cmd.get_args().collect::<Vec<_>>(),
        "running external tool"
    );

    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ToolError::NotFound {
                program: program.clone(),
            }
        } else {
            ToolError::Io {
                program: program.clone(),
                source,
            }
        }
    })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    // written off-thread so a child that never reads cannot outlast the deadline
    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(pipe)) => Some(feed(pipe, input.to_owned())),
        _ => None,
    };

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => return Err(ToolError::Io { program, source }),
        }

        if !timeout.is_zero() && start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut {
                program,
                seconds: timeout.as_secs(),
            });
        }

        thread::sleep(Duration::from_millis(25));
    };

    let output = ToolOutput {
        stdout: stdout.map(join).unwrap_or_default(),
        stderr: stderr.map(join).unwrap_or_default(),
    };

    if !status.success() {
        return Err(ToolError::Failed {
            program,
            status,
            stderr: output.stderr,
        });
    }

    if let Some(Ok(Err(source))) = writer.map(thread::JoinHandle::join) {
        return Err(ToolError::Io { program, source });
    }

    Ok(output)
}

fn feed(mut pipe: ChildStdin, input: String) -> thread::JoinHandle<io::Result<()>> {
    thread::spawn(move || match pipe.write_all(input.as_bytes()) {
        // the child may exit without reading all of its input
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_feeds_stdin() {
        let output = run(&mut Command::new("cat"), Some("物語"), Duration::from_secs(5)).unwrap();
        assert_eq!(output.stdout, "物語");
    }

    #[test]
    fn missing_binary_is_not_found() {
        let err = run(
            &mut Command::new("definitely-not-a-real-tool-xyz"),
            None,
            Duration::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[test]
    fn non_zero_exit_keeps_stderr() {
        let err = run(
            Command::new("sh").args(["-c", "echo broken >&2; exit 3"]),
            None,
            Duration::from_secs(5),
        )
        .unwrap_err();
        match err {
            ToolError::Failed { stderr, status, .. } => {
                assert_eq!(stderr.trim(), "broken");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn slow_tool_is_killed_at_deadline() {
        let err = run(
            Command::new("sleep").arg("5"),
            None,
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
    }

    #[test]
    fn unread_stdin_does_not_escape_the_deadline() {
        // far larger than a pipe buffer, and `sleep` never reads it
        let input = "x".repeat(4 * 1024 * 1024);
        let start = Instant::now();
        let err = run(
            Command::new("sleep").arg("5"),
            Some(&input),
            Duration::from_millis(200),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn early_exit_with_pending_stdin_is_not_an_error() {
        let input = "x".repeat(4 * 1024 * 1024);
        let output = run(
            Command::new("sh").args(["-c", "echo done"]),
            Some(&input),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(output.stdout.trim(), "done");
    }
}
