//! Child-process transport.
//!
//! The guest runs as a child process with piped stdio. Its output is drained
//! by a dedicated reader thread into a channel, so a long write from the host
//! can never deadlock against a guest blocked on a full output pipe.

use super::Transport;
use crate::config::ProtocolConfig;
use crate::error::{BridgeError, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for launching a guest process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Program to run (looked up on `PATH` if not absolute).
    pub program: String,
    /// Arguments to pass.
    pub args: Vec<String>,
    /// Environment variables to set.
    pub env_vars: HashMap<String, String>,
    /// Working directory for the guest.
    pub current_dir: Option<PathBuf>,
    /// Route stderr into the same pipe as stdout.
    ///
    /// Most REPLs print evaluation errors on stderr; merging keeps them in
    /// band, ahead of the sentinel that follows them.
    pub merge_stderr: bool,
}

impl LaunchSpec {
    /// Create a launch spec for `program` with stderr merged into stdout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_vars: HashMap::new(),
            current_dir: None,
            merge_stderr: true,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn with_current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Keep stderr out of the reply stream (it is discarded).
    pub fn separate_stderr(mut self) -> Self {
        self.merge_stderr = false;
        self
    }
}

type LineResult = std::io::Result<String>;

/// Transport over a child process's stdin/stdout.
pub struct ProcessTransport {
    program: String,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    lines: Receiver<LineResult>,
}

impl ProcessTransport {
    /// Spawn the guest process described by `spec`.
    pub fn spawn(spec: &LaunchSpec) -> Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(ref dir) = spec.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env_vars {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::piped());

        // With a merged pipe the write ends live in `cmd` and must be dropped
        // right after spawning, or EOF is never observed.
        let merged_reader = if spec.merge_stderr {
            let (reader, writer) =
                std::io::pipe().map_err(|e| BridgeError::transport("create output pipe", e))?;
            let stderr_writer = writer
                .try_clone()
                .map_err(|e| BridgeError::transport("clone output pipe", e))?;
            cmd.stdout(writer);
            cmd.stderr(stderr_writer);
            Some(reader)
        } else {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::null());
            None
        };

        info!("Launching guest {} {:?}", spec.program, spec.args);

        let mut child = cmd
            .spawn()
            .map_err(|e| BridgeError::transport(format!("spawn {}", spec.program), e))?;
        drop(cmd);

        let output: Box<dyn Read + Send> = match merged_reader {
            Some(reader) => Box::new(reader),
            None => match child.stdout.take() {
                Some(stdout) => Box::new(stdout),
                None => return Err(BridgeError::transport_msg("guest stdout was not captured")),
            },
        };
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::transport_msg("guest stdin was not captured"))?;

        let lines = spawn_reader(&spec.program, output)?;

        info!("Launched guest {} with PID {}", spec.program, child.id());

        Ok(Self {
            program: spec.program.clone(),
            child: Some(child),
            stdin: Some(BufWriter::new(stdin)),
            lines,
        })
    }

    /// PID of the guest, while it is running.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn stdin(&mut self) -> Result<&mut BufWriter<ChildStdin>> {
        self.stdin
            .as_mut()
            .ok_or_else(|| BridgeError::transport_msg("guest input stream is closed"))
    }
}

fn spawn_reader(program: &str, output: Box<dyn Read + Send>) -> Result<Receiver<LineResult>> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name(format!("{}-output", program))
        .spawn(move || {
            let mut reader = BufReader::new(output);
            loop {
                let mut buf = Vec::new();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(Ok(strip_terminator(&buf))).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        })
        .map_err(|e| BridgeError::transport("start output reader", e))?;
    Ok(rx)
}

fn strip_terminator(buf: &[u8]) -> String {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && buf[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

impl Transport for ProcessTransport {
    fn write(&mut self, text: &str) -> Result<()> {
        self.stdin()?
            .write_all(text.as_bytes())
            .map_err(|e| BridgeError::transport("write to guest", e))
    }

    fn flush(&mut self) -> Result<()> {
        self.stdin()?
            .flush()
            .map_err(|e| BridgeError::transport("flush guest input", e))
    }

    fn read_line(&mut self, timeout: Option<Duration>) -> Result<Option<String>> {
        let received = match timeout {
            Some(limit) => match self.lines.recv_timeout(limit) {
                Ok(line) => Some(line),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BridgeError::transport_msg(format!(
                        "no output from {} within {:?}",
                        self.program, limit
                    )))
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => self.lines.recv().ok(),
        };

        match received {
            None => Ok(None),
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(BridgeError::transport("read guest output", e)),
        }
    }

    fn shutdown(&mut self, grace: Duration) -> Result<()> {
        // Closing stdin is itself an exit request for most REPLs.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.flush();
        }

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let pid = child.id();
        let deadline = Instant::now() + grace;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!("Guest {} (PID {}) exited with {}", self.program, pid, status);
                    return Ok(());
                }
                Ok(None) if Instant::now() >= deadline => {
                    warn!(
                        "Guest {} (PID {}) did not exit within {:?}, terminating",
                        self.program, pid, grace
                    );
                    return terminate(&mut child);
                }
                Ok(None) => std::thread::sleep(ProtocolConfig::EXIT_POLL_INTERVAL),
                Err(e) => return Err(BridgeError::transport("wait for guest exit", e)),
            }
        }
    }
}

/// Terminate a child: SIGTERM first on Unix, SIGKILL if it lingers.
fn terminate(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(child.id() as i32);
        debug!("Sending SIGTERM to guest {}", pid);
        if let Err(e) = kill(pid, Signal::SIGTERM) {
            if e != nix::errno::Errno::ESRCH {
                warn!("Failed to send SIGTERM to {}: {}", pid, e);
            }
        }

        let deadline = Instant::now() + ProtocolConfig::KILL_GRACE;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                debug!("Guest {} terminated gracefully", pid);
                return Ok(());
            }
            std::thread::sleep(ProtocolConfig::EXIT_POLL_INTERVAL);
        }
        debug!("Guest {} still running, sending SIGKILL", pid);
    }

    if let Err(e) = child.kill() {
        // InvalidInput means it already exited.
        if e.kind() != std::io::ErrorKind::InvalidInput {
            return Err(BridgeError::transport("kill guest", e));
        }
    }
    child
        .wait()
        .map_err(|e| BridgeError::transport("reap guest", e))?;
    Ok(())
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                warn!(
                    "Guest {} (PID {}) dropped without close, killing it",
                    self.program,
                    child.id()
                );
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_spec_defaults() {
        let spec = LaunchSpec::new("R");
        assert_eq!(spec.program, "R");
        assert!(spec.args.is_empty());
        assert!(spec.merge_stderr);
        assert!(spec.current_dir.is_none());
    }

    #[test]
    fn test_launch_spec_builder() {
        let spec = LaunchSpec::new("deno")
            .with_arg("repl")
            .with_args(["--quiet", "--unstable"])
            .with_env("NO_COLOR", "1")
            .with_current_dir("/tmp")
            .separate_stderr();

        assert_eq!(spec.args, vec!["repl", "--quiet", "--unstable"]);
        assert_eq!(spec.env_vars.get("NO_COLOR"), Some(&"1".to_string()));
        assert_eq!(spec.current_dir, Some(PathBuf::from("/tmp")));
        assert!(!spec.merge_stderr);
    }

    #[test]
    fn test_spawn_missing_program_is_transport_error() {
        let spec = LaunchSpec::new("replbridge-definitely-not-installed");
        match ProcessTransport::spawn(&spec) {
            Err(BridgeError::Transport { message, .. }) => {
                assert!(message.contains("spawn replbridge-definitely-not-installed"));
            }
            Err(other) => panic!("Expected Transport error, got: {:?}", other),
            Ok(_) => panic!("Expected spawn to fail"),
        }
    }

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator(b"[1] 3\n"), "[1] 3");
        assert_eq!(strip_terminator(b"crlf\r\n"), "crlf");
        assert_eq!(strip_terminator(b"no newline"), "no newline");
        assert_eq!(strip_terminator(b"\n"), "");
    }
}
