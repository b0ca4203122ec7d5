//! Structured data recovered from ffmpeg's stderr lines.

use std::collections::HashMap;
use std::sync::LazyLock;

use fw_core::{timemark_to_seconds, InputCodecData, Progress};
use regex::Regex;

static RE_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Input #[0-9]+, ([^ ]+),").expect("valid input regex"));
static RE_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration: ([^,]+)").expect("valid duration regex"));
static RE_AUDIO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Audio: (.*)").expect("valid audio regex"));
static RE_VIDEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Video: (.*)").expect("valid video regex"));
static RE_OUTPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Output #\d+").expect("valid output regex"));
static RE_MAPPING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Stream mapping:|Press (\[q\]|ctrl-c) to stop").expect("valid mapping regex")
});
static RE_SPACED_EQUALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\s+").expect("valid progress regex"));
static RE_ERROR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error|invalid|unknown").expect("valid error regex"));

/// Split a `key=value key=value ...` line into its pairs.
///
/// Returns `None` unless every space-separated part holds an `=`.
pub fn parse_progress_line(line: &str) -> Option<HashMap<String, String>> {
    let line = RE_SPACED_EQUALS.replace_all(line, "=");
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut map = HashMap::new();
    for part in line.split(' ') {
        let (key, value) = part.split_once('=')?;
        map.insert(key.to_string(), value.to_string());
    }
    Some(map)
}

/// Parse the leading numeric part of `s` (`256kB` → 256).
fn leading_number(s: &str) -> Option<f64> {
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Turn a progress line into a [`Progress`] report.
///
/// `duration` is the probed input duration in seconds; when present the
/// completion percentage is derived from the reported `time`.
pub fn extract_progress(line: &str, duration: Option<f64>) -> Option<Progress> {
    let fields = parse_progress_line(line)?;

    let timemark = fields.get("time").cloned();
    let percent = match (timemark.as_deref().and_then(timemark_to_seconds), duration) {
        (Some(secs), Some(total)) if total > 0.0 => Some(secs / total * 100.0),
        _ => None,
    };

    Some(Progress {
        frames: fields
            .get("frame")
            .and_then(|v| leading_number(v))
            .map(|v| v as u64),
        current_fps: fields.get("fps").and_then(|v| leading_number(v)),
        current_kbps: fields
            .get("bitrate")
            .and_then(|v| leading_number(&v.replace("kbits/s", ""))),
        target_size: fields
            .get("size")
            .or_else(|| fields.get("Lsize"))
            .and_then(|v| leading_number(v))
            .map(|v| v as u64),
        timemark,
        percent,
    })
}

/// Incremental parser for the per-input codec descriptions ffmpeg prints
/// before it starts writing output.
#[derive(Debug, Default)]
pub struct CodecDataParser {
    inputs: Vec<InputCodecData>,
    in_input: bool,
    done: bool,
}

impl CodecDataParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stderr line. Returns the collected descriptions once, when
    /// the end of the input section is reached.
    pub fn feed(&mut self, line: &str) -> Option<Vec<InputCodecData>> {
        if self.done {
            return None;
        }

        if let Some(caps) = RE_INPUT.captures(line) {
            self.in_input = true;
            self.inputs.push(InputCodecData {
                format: caps[1].to_string(),
                ..Default::default()
            });
            return None;
        }

        if self.in_input {
            if let Some(current) = self.inputs.last_mut() {
                if let Some(caps) = RE_DURATION.captures(line) {
                    current.duration = caps[1].to_string();
                    return None;
                }
                if let Some(caps) = RE_AUDIO.captures(line) {
                    let details: Vec<String> = caps[1].split(", ").map(str::to_string).collect();
                    current.audio = details.first().cloned().unwrap_or_default();
                    current.audio_details = details;
                    return None;
                }
                if let Some(caps) = RE_VIDEO.captures(line) {
                    let details: Vec<String> = caps[1].split(", ").map(str::to_string).collect();
                    current.video = details.first().cloned().unwrap_or_default();
                    current.video_details = details;
                    return None;
                }
            }
        }

        if RE_OUTPUT.is_match(line) || RE_MAPPING.is_match(line) {
            self.in_input = false;
            self.done = true;
            return Some(std::mem::take(&mut self.inputs));
        }

        None
    }
}

/// Keep the stderr lines that look like error reports.
///
/// Returns `"unknown error"` when none match.
pub fn extract_error(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| RE_ERROR_LINE.is_match(l))
        .collect();
    if lines.is_empty() {
        "unknown error".to_string()
    } else {
        lines.join("\n")
    }
}
