//! Probe result types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single reported value: numeric when it looks like a plain decimal
/// number, text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(t) => t.parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            FieldValue::Number(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(t) => f.write_str(t),
        }
    }
}

/// One `[NAME] ... [/NAME]` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeBlock {
    /// Plain `key=value` fields.
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Values of `TAG:key` lines, always kept as text.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Values of `DISPOSITION:key` lines.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub disposition: BTreeMap<String, FieldValue>,
}

impl ProbeBlock {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text value of `key`. Numeric values are not returned.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(FieldValue::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(FieldValue::as_f64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_f64(key)
            .filter(|v| *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    }

    /// Value of `codec_type` (`video`, `audio`, `subtitle`, ...).
    pub fn codec_type(&self) -> Option<&str> {
        self.get_str("codec_type")
    }
}

/// Everything reported by one probe run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeData {
    pub streams: Vec<ProbeBlock>,
    pub format: ProbeBlock,
    pub chapters: Vec<ProbeBlock>,
}

impl ProbeData {
    /// Container duration in seconds.
    pub fn duration(&self) -> Option<f64> {
        self.format.get_f64("duration")
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &ProbeBlock> {
        self.streams.iter().filter(|s| s.codec_type() == Some("video"))
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &ProbeBlock> {
        self.streams.iter().filter(|s| s.codec_type() == Some("audio"))
    }

    pub fn has_video(&self) -> bool {
        self.video_streams().next().is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_streams().next().is_some()
    }

    /// The video stream with the largest frame area.
    pub fn largest_video_stream(&self) -> Option<&ProbeBlock> {
        self.video_streams().max_by_key(|s| {
            s.get_u64("width").unwrap_or(0) * s.get_u64("height").unwrap_or(0)
        })
    }
}
