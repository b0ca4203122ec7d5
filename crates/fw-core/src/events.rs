//! Events emitted while a job runs.
//!
//! Events are informational only. The terminal outcome of a job is the
//! `Result` returned by the run call, never an event.

use serde::{Deserialize, Serialize};

/// One progress report parsed from a `key=value ...` stderr line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Frames processed so far.
    pub frames: Option<u64>,
    /// Current processing rate in frames per second.
    pub current_fps: Option<f64>,
    /// Current output bitrate in kbit/s.
    pub current_kbps: Option<f64>,
    /// Output size so far, as reported (kB).
    pub target_size: Option<u64>,
    /// Current position in the output, `hh:mm:ss.xx`.
    pub timemark: Option<String>,
    /// Completion in percent, when the input duration is known.
    pub percent: Option<f64>,
}

/// Codec description of one job input, parsed from the startup diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCodecData {
    /// Demuxer name, e.g. `mov,mp4,m4a,3gp,3g2,mj2`.
    pub format: String,
    /// Duration as printed, e.g. `00:00:10.00`.
    pub duration: String,
    /// Audio codec name (first detail field).
    pub audio: String,
    /// All comma-separated audio detail fields.
    pub audio_details: Vec<String>,
    /// Video codec name (first detail field).
    pub video: String,
    /// All comma-separated video detail fields.
    pub video_details: Vec<String>,
}

/// Payload describing what happened during a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// The process was spawned with this command line.
    Start { command_line: String },
    /// Per-input codec descriptions, sent once before output begins.
    CodecData { inputs: Vec<InputCodecData> },
    /// A progress report.
    Progress(Progress),
    /// A complete stderr line.
    Stderr { line: String },
    /// Output filenames resolved by the screenshot recipe.
    Filenames { filenames: Vec<String> },
}
