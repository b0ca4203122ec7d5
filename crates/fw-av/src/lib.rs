//! # fw-av
//!
//! Command assembly and process orchestration for ffmpeg.
//!
//! This crate provides:
//!
//! - **Tool discovery and capability cache** ([`ToolCache`]) -- find ffmpeg,
//!   ffprobe and flvmeta/flvtool2, memoize the version and the advertised
//!   formats, codecs, encoders and filters.
//! - **Capability negotiation** ([`capabilities`]) -- table parsers and the
//!   pre-flight check run before every job.
//! - **Helper execution** ([`ToolCommand`]) -- captured one-shot runs with a
//!   timeout.
//! - **Jobs** ([`Command`]) -- the fluent configuration surface, argument
//!   assembly, and `run`/`save`/`pipe`/`probe`.
//! - **Process orchestration** ([`process`]) -- spawn, stream piping, bounded
//!   log capture, progress and codec data events, timeout and kill.
//! - **Recipes** ([`recipes`]) -- screenshots and concatenation.

pub mod capabilities;
pub mod command;
pub mod control;
pub mod extract;
pub mod job;
pub mod presets;
pub mod probe;
pub mod process;
pub mod recipes;
pub mod tools;

/// Readable stream fed to a process's stdin.
pub type InputStream = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Writable stream receiving a process's stdout.
pub type OutputStream = Box<dyn tokio::io::AsyncWrite + Send + Unpin>;

// ---- Re-exports for convenience ----

pub use capabilities::{CapabilityRequest, MediaKind};
pub use command::{ToolCommand, ToolOutput};
pub use control::JobControl;
pub use job::{Command, InputSource, JobOutput, OutputTarget};
pub use presets::Preset;
pub use process::{ProcessOutcome, ProcessSpec};
pub use recipes::{ScreenshotConfig, ScreenshotOutput, ScreenshotSize};
pub use tools::{ToolCache, ToolInfo, ToolVersion};
