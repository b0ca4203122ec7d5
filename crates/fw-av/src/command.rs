//! Captured one-shot tool invocations.
//!
//! [`ToolCommand`] runs a short-lived helper process (capability queries,
//! `-version`, the metadata probe, container fix-ups, `renice`) and captures
//! its whole output. Long-running transcodes go through
//! [`crate::process`] instead.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use fw_core::{Error, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::InputStream;

/// Default timeout for helper invocations: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing helper tool invocations.
///
/// # Example
///
/// ```no_run
/// use fw_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> fw_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-hide_banner")
///     .arg("-encoders")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    stdin: Option<InputStream>,
}

impl std::fmt::Debug for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCommand")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("timeout", &self.timeout)
            .field("stdin", &self.stdin.is_some())
            .finish()
    }
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            stdin: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Feed a readable stream to the process's stdin.
    pub fn stdin(&mut self, reader: InputStream) -> &mut Self {
        self.stdin = Some(reader);
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command and capture its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] if the program does not exist.
    /// - [`Error::Process`] if spawning fails for another reason.
    /// - [`Error::Timeout`] if the process outlives the timeout.
    /// - [`Error::InputStream`] if the stdin stream fails.
    pub async fn output(&mut self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::tool_not_found(program_name.clone()),
            _ => Error::process(format!("failed to spawn {program_name}: {e}")),
        })?;

        let feeder = match (self.stdin.take(), child.stdin.take()) {
            (Some(mut reader), Some(mut pipe)) => Some(tokio::spawn(async move {
                let mut buf = vec![0u8; 64 * 1024];
                loop {
                    let n = reader
                        .read(&mut buf)
                        .await
                        .map_err(|e| Error::InputStream(e.to_string()))?;
                    if n == 0 {
                        break;
                    }
                    // The tool may stop reading early; that is not a stream failure.
                    if pipe.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
                let _ = pipe.shutdown().await;
                Ok::<(), Error>(())
            })),
            _ => None,
        };

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let collect = async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let read_out = async {
                if let Some(ref mut p) = stdout_pipe {
                    let _ = p.read_to_end(&mut stdout).await;
                }
            };
            let read_err = async {
                if let Some(ref mut p) = stderr_pipe {
                    let _ = p.read_to_end(&mut stderr).await;
                }
            };
            tokio::join!(read_out, read_err);
            let status = child.wait().await;
            (status, stdout, stderr)
        };

        let (status, stdout, stderr) = match tokio::time::timeout(self.timeout, collect).await {
            Ok(result) => result,
            Err(_elapsed) => {
                // The child is killed on drop when we return.
                if let Some(feeder) = feeder {
                    feeder.abort();
                }
                return Err(Error::Timeout {
                    seconds: self.timeout.as_secs(),
                    stderr: String::new(),
                });
            }
        };

        if let Some(feeder) = feeder {
            match feeder.await {
                Ok(Err(e)) => return Err(e),
                Ok(Ok(())) => {}
                Err(e) => tracing::debug!("stdin feeder for {program_name} did not finish: {e}"),
            }
        }

        Ok(ToolOutput {
            status: status?,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    /// Execute the command, failing on a non-zero exit status.
    ///
    /// # Errors
    ///
    /// Everything [`ToolCommand::output`] returns, plus [`Error::Process`]
    /// when the process exits unsuccessfully (message includes stderr).
    pub async fn execute(&mut self) -> Result<ToolOutput> {
        let output = self.output().await?;
        if !output.status.success() {
            let program_name = self.program_name();
            return Err(Error::Process {
                message: format!(
                    "{program_name} exited with status {}: {}",
                    output.status,
                    output.stderr.trim()
                ),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}
