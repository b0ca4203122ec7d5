//! Process orchestration for transcode jobs.
//!
//! [`run`] spawns the tool with a fully assembled argument vector, pipes a
//! readable stream to its stdin when the input is not a file, drains stdout
//! and stderr concurrently into [`Ring`] buffers while extracting progress
//! and codec data, enforces the timeout, and settles on exactly one outcome.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use fw_core::{Error, JobEvent, Result, Ring};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::control::JobControl;
use crate::extract::{extract_error, extract_progress, CodecDataParser};
use crate::{InputStream, OutputStream};

/// Sender half of a job's event channel.
pub type EventSender = mpsc::UnboundedSender<JobEvent>;

/// How long output readers may linger after a killed process exits.
const READER_GRACE: Duration = Duration::from_secs(5);

const CHUNK_SIZE: usize = 8 * 1024;

/// Everything needed to run one process.
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Non-zero values wrap the invocation in `nice -n` on unix.
    pub niceness: i32,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Retained stdout/stderr lines; 0 keeps everything.
    pub log_lines: usize,
    /// Stream copied to the child's stdin.
    pub stdin: Option<InputStream>,
    /// Stream receiving the child's stdout instead of the stdout ring.
    pub stdout: Option<OutputStream>,
    /// Input duration in seconds, for progress percentages.
    pub duration: Option<f64>,
    pub events: Option<EventSender>,
}

impl ProcessSpec {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            niceness: 0,
            working_dir: None,
            timeout: None,
            log_lines: fw_core::config::DEFAULT_LOG_LINES,
            stdin: None,
            stdout: None,
            duration: None,
            events: None,
        }
    }
}

/// Result of a process that ended without error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Retained stdout lines (empty when stdout went to a stream).
    pub stdout: String,
    /// Retained stderr lines.
    pub stderr: String,
    /// The process was terminated through [`JobControl::kill`].
    pub killed: bool,
}

#[derive(Debug)]
enum Cause {
    Timeout,
    Killed,
    Stream(Error),
}

/// Prefix the invocation with `nice -n <niceness>` when needed.
pub fn wrap_niceness(program: PathBuf, args: Vec<String>, niceness: i32) -> (PathBuf, Vec<String>) {
    if niceness == 0 || cfg!(windows) {
        return (program, args);
    }
    let mut wrapped = vec![
        "-n".to_string(),
        niceness.to_string(),
        program.to_string_lossy().into_owned(),
    ];
    wrapped.extend(args);
    (PathBuf::from("nice"), wrapped)
}

/// Spawn and supervise one process until it ends.
///
/// # Errors
///
/// - [`Error::ToolNotFound`] / [`Error::Process`] when spawning fails.
/// - [`Error::Timeout`] when the timeout expired (the process is killed).
/// - [`Error::InputStream`] / [`Error::OutputStream`] when a piped stream
///   fails (the process is killed).
/// - [`Error::Process`] on a non-zero exit or a signal not requested through
///   `control`; the message embeds the relevant stderr lines.
pub async fn run(spec: ProcessSpec, control: &JobControl) -> Result<ProcessOutcome> {
    let ProcessSpec {
        program,
        args,
        niceness,
        working_dir,
        timeout,
        log_lines,
        stdin,
        stdout,
        duration,
        events,
    } = spec;

    let name = program
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ffmpeg".to_string());
    let (program, args) = wrap_niceness(program, args, niceness);
    let command_line = format!("{} {}", program.display(), args.join(" "));

    let mut cmd = tokio::process::Command::new(&program);
    cmd.args(&args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref dir) = working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::tool_not_found(program.display().to_string()),
        _ => Error::process(format!("Error spawning {name}: {e}")),
    })?;
    tracing::info!("Spawned {name} with command: {command_line}");
    if let Some(ref tx) = events {
        let _ = tx.send(JobEvent::Start { command_line });
    }

    let cancel = CancellationToken::new();
    control.attach(child.id(), cancel.clone());

    let (err_tx, mut err_rx) = mpsc::unbounded_channel();

    let stdin_task = match (stdin, child.stdin.take()) {
        (Some(reader), Some(pipe)) => Some(tokio::spawn(feed_stdin(reader, pipe, err_tx.clone()))),
        _ => None,
    };

    let stdout_task: Option<JoinHandle<Option<Ring>>> = child.stdout.take().map(|pipe| match stdout {
        Some(writer) => {
            let errors = err_tx.clone();
            tokio::spawn(async move {
                pump_to_writer(pipe, writer, errors).await;
                None
            })
        }
        None => tokio::spawn(async move { Some(pump_lines(pipe, Ring::new(log_lines)).await) }),
    });

    let mut stderr_ring = Ring::new(log_lines);
    if let Some(tx) = events {
        let mut codec_data = CodecDataParser::new();
        stderr_ring.callback(move |line| {
            let _ = tx.send(JobEvent::Stderr {
                line: line.to_string(),
            });
            if let Some(inputs) = codec_data.feed(line) {
                let _ = tx.send(JobEvent::CodecData { inputs });
            }
            if let Some(progress) = extract_progress(line, duration) {
                let _ = tx.send(JobEvent::Progress(progress));
            }
        });
    }
    let stderr_task = child
        .stderr
        .take()
        .map(|pipe| tokio::spawn(async move { Some(pump_lines(pipe, stderr_ring).await) }));
    drop(err_tx);

    let deadline = timeout.map(|t| Instant::now() + t);
    let mut cause: Option<Cause> = None;
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = sleep_until(deadline), if cause.is_none() => {
                tracing::warn!("{name} ran into its timeout, killing it");
                cause = Some(Cause::Timeout);
                kill(&mut child);
            }
            _ = cancel.cancelled(), if cause.is_none() => {
                tracing::info!("Killing {name} on request");
                cause = Some(Cause::Killed);
                kill(&mut child);
            }
            Some(err) = err_rx.recv(), if cause.is_none() => {
                tracing::warn!("{err}; killing {name}");
                cause = Some(Cause::Stream(err));
                kill(&mut child);
            }
        }
    };
    control.detach();

    // Exit is only settled once both output streams are drained.
    let grace = cause.as_ref().map(|_| READER_GRACE);
    let stdout_ring = join_reader(stdout_task, grace).await;
    let stderr_ring = join_reader(stderr_task, grace).await;
    if let Some(task) = stdin_task {
        task.abort();
    }
    if cause.is_none() {
        if let Ok(err) = err_rx.try_recv() {
            cause = Some(Cause::Stream(err));
        }
    }

    let status = status?;
    let stdout = stdout_ring.map(|r| r.get()).unwrap_or_default();
    let stderr = stderr_ring.map(|r| r.get()).unwrap_or_default();

    match cause {
        Some(Cause::Timeout) => Err(Error::Timeout {
            seconds: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            stderr,
        }),
        Some(Cause::Stream(err)) => Err(err),
        Some(Cause::Killed) => Ok(ProcessOutcome {
            stdout,
            stderr,
            killed: true,
        }),
        None if status.success() => {
            tracing::debug!("{name} finished successfully");
            Ok(ProcessOutcome {
                stdout,
                stderr,
                killed: false,
            })
        }
        None => Err(exit_error(&name, status, stdout, stderr)),
    }
}

fn exit_error(name: &str, status: ExitStatus, stdout: String, stderr: String) -> Error {
    let message = match status.code() {
        Some(code) => format!("{name} exited with code {code}: {}", extract_error(&stderr)),
        None => format!("{name} was killed with signal {}", signal_name(status)),
    };
    Error::Process {
        message,
        stdout,
        stderr,
    }
}

#[cfg(unix)]
fn signal_name(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    status
        .signal()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(not(unix))]
fn signal_name(_status: ExitStatus) -> String {
    "unknown".to_string()
}

fn kill(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!("Could not kill process: {e}");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn join_reader(
    task: Option<JoinHandle<Option<Ring>>>,
    grace: Option<Duration>,
) -> Option<Ring> {
    let mut task = task?;
    let joined = match grace {
        Some(grace) => match tokio::time::timeout(grace, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::debug!("Output reader still busy after process exit; abandoning it");
                task.abort();
                return None;
            }
        },
        None => task.await,
    };
    joined.unwrap_or_else(|e| {
        tracing::debug!("Output reader failed: {e}");
        None
    })
}

/// Incremental UTF-8 decoder keeping incomplete trailing sequences for the
/// next chunk.
#[derive(Debug, Default)]
struct Utf8Chunks {
    pending: Vec<u8>,
}

impl Utf8Chunks {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                let out = s.to_string();
                self.pending.clear();
                out
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let out = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                out
            }
            Err(_) => String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned(),
        }
    }

    fn finish(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned()
    }
}

async fn pump_lines<R: AsyncRead + Unpin>(mut reader: R, mut ring: Ring) -> Ring {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut decoder = Utf8Chunks::default();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => ring.append(&decoder.decode(&buf[..n])),
            Err(e) => {
                tracing::debug!("Error reading process output: {e}");
                break;
            }
        }
    }
    ring.append(&decoder.finish());
    ring.close();
    ring
}

async fn pump_to_writer<R: AsyncRead + Unpin>(
    mut reader: R,
    mut writer: OutputStream,
    errors: mpsc::UnboundedSender<Error>,
) {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = writer.write_all(&buf[..n]).await {
                    let _ = errors.send(Error::OutputStream(e.to_string()));
                    return;
                }
            }
            Err(e) => {
                tracing::debug!("Error reading process stdout: {e}");
                break;
            }
        }
    }
    if let Err(e) = writer.shutdown().await {
        let _ = errors.send(Error::OutputStream(e.to_string()));
    }
}

async fn feed_stdin(
    mut reader: InputStream,
    mut pipe: ChildStdin,
    errors: mpsc::UnboundedSender<Error>,
) {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                // The process may close stdin early; it fails on its own then.
                if pipe.write_all(&buf[..n]).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = errors.send(Error::InputStream(e.to_string()));
                return;
            }
        }
    }
    let _ = pipe.shutdown().await;
}
