use std::io::{self, ErrorKind, Read, Write};
use std::process::{ChildStdin, Command, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::error::ExecError;

#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `command` through `bash -lc` with `args` appended as positional
/// parameters, optionally feeding `stdin`, and waits at most `timeout`.
pub fn run_shell(
    command: &str,
    args: &[&str],
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<ShellOutput, ExecError> {
    let mut cmd = Command::new("bash");
    cmd.arg("-lc")
        .arg(format!("{command} \"$@\""))
        .arg("fieldhint")
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        command: command.to_string(),
        source,
    })?;

    // Pipes are fed and drained while waiting, or a full pipe stalls the
    // child and the timeout never starts.
    let stdin_writer = match (stdin, child.stdin.take()) {
        (Some(text), Some(pipe)) => Some(spawn_writer(pipe, text.to_string())),
        _ => None,
    };
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::Timeout {
                command: command.to_string(),
                timeout,
            });
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::Io {
                command: command.to_string(),
                source,
            });
        }
    };

    let stdout = stdout_reader.map(join_reader).unwrap_or_default();
    let stderr = stderr_reader.map(join_reader).unwrap_or_default();

    if !status.success() {
        return Err(ExecError::Exit {
            command: command.to_string(),
            code: status.code().unwrap_or(1),
            stderr: truncate_text(stderr.trim(), 2400),
        });
    }

    // Children may exit before reading all of their input.
    if let Some(Ok(Err(source))) = stdin_writer.map(|writer| writer.join()) {
        if source.kind() != ErrorKind::BrokenPipe {
            return Err(ExecError::Io {
                command: command.to_string(),
                source,
            });
        }
    }

    Ok(ShellOutput { stdout, stderr })
}

fn spawn_writer(mut pipe: ChildStdin, text: String) -> thread::JoinHandle<io::Result<()>> {
    thread::spawn(move || pipe.write_all(text.as_bytes()))
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

pub fn command_exists(name: &str) -> bool {
    Command::new("bash")
        .arg("-lc")
        .arg("command -v \"$1\" >/dev/null 2>&1")
        .arg("fieldhint")
        .arg(name)
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// First word of a shell command line, used to check it is resolvable.
pub fn program_of(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or_default()
}

pub fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    text.chars().take(limit).collect::<String>() + "\n...<truncated>..."
}
