//! ffwright - declarative ffmpeg command assembly and process orchestration.
//!
//! A [`Command`] collects inputs, outputs and their options through a fluent
//! API, checks the requested formats and codecs against what the installed
//! ffmpeg advertises, assembles the argument vector and supervises the
//! process: stream piping, bounded stderr capture, progress events, timeout
//! and kill.
//!
//! ```no_run
//! # async fn demo() -> ffwright::Result<()> {
//! use ffwright::Command;
//!
//! let mut cmd = Command::from_input("input.avi");
//! cmd.audio_codec("aac").video_codec("libx264").size("640x?")?;
//! cmd.save("output.mp4").await?;
//! # Ok(())
//! # }
//! ```
//!
//! The member crates are re-exported for callers that need the lower layers.

pub mod ops;

pub use {fw_av, fw_core, fw_filter, fw_probe};

pub use fw_av::{
    CapabilityRequest, Command, InputSource, JobControl, JobOutput, OutputTarget, Preset,
    ScreenshotConfig, ScreenshotOutput, ScreenshotSize, ToolCache, ToolInfo, ToolVersion,
};
pub use fw_core::config::Config;
pub use fw_core::{Error, ErrorCategory, JobEvent, Progress, Result, Timemark};
pub use fw_filter::{FilterNode, FilterSpec};
pub use fw_probe::{ProbeBlock, ProbeData};
pub use ops::OpName;
