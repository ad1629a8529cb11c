use crate::config::RunConfig;
use crate::error::SetupError;
use crate::event::RunEvent;
use crate::target::{StreamTarget, Target};
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// The program under test, running with all three standard streams piped.
pub struct ChildTarget {
    child: Child,
    io: StreamTarget<ChildStdout, ChildStdin>,
    shutdown_grace: Duration,
}

impl ChildTarget {
    /// Spawn `executable`, returning the target and its stderr stream separately.
    pub fn spawn(executable: &Path, config: &RunConfig) -> Result<(Self, ChildStderr), SetupError> {
        if !executable.is_file() {
            return Err(SetupError::ExecutableNotFound(executable.to_path_buf()));
        }

        let mut child = Command::new(executable)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SetupError::Spawn {
                path: executable.to_path_buf(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(SetupError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SetupError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SetupError::MissingPipe("stderr"))?;

        info!(path = %executable.display(), pid = ?child.id(), "spawned target");

        let target = ChildTarget {
            child,
            io: StreamTarget::with_config(stdout, stdin, config),
            shutdown_grace: config.shutdown_grace,
        };
        Ok((target, stderr))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl Target for ChildTarget {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.io.read_line().await
    }

    async fn read_prompt(&mut self, max_chars: usize) -> io::Result<Option<String>> {
        self.io.read_prompt(max_chars).await
    }

    async fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.io.write_line(text).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        if let Err(e) = self.io.close_input().await {
            debug!(error = %e, "closing target stdin failed");
        }
        match timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(%status, "target exited");
                Ok(())
            }
            Err(_) => {
                warn!(grace = ?self.shutdown_grace, "target still running after script ended; killing it");
                self.child.kill().await
            }
        }
    }

    async fn terminate(&mut self) -> io::Result<()> {
        info!(pid = ?self.child.id(), "killing target");
        self.child.kill().await
    }
}

/// Spawn a task forwarding each line of `reader` as a [`RunEvent::Diagnostic`].
pub fn spawn_stderr_reader<R>(reader: R, events: UnboundedSender<RunEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if events.send(RunEvent::Diagnostic(line)).is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) => {
                    debug!(error = %e, "stderr read failed");
                    break;
                }
            }
        }
    })
}
