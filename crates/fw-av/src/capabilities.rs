//! Capability tables advertised by ffmpeg and the pre-flight check.
//!
//! `ffmpeg -formats`, `-codecs`, `-encoders` and `-filters` each print a
//! fixed-column table. The parsers here turn them into name-keyed maps; the
//! [`check`] function rejects a job whose requested formats or codecs are not
//! available before any transcode is spawned.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use fw_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([D ])([E ])(?:[d ])?\s+([^ ]+)\s+(.*)$").expect("valid format regex")
});
static RE_CODEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([D\.])([E\.])([VASDT])([I\.])([L\.])([S\.]) ([^=\s]\S*)\s+(.*)$")
        .expect("valid codec regex")
});
static RE_ENCODERS_NOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(encoders:([^)]+)\)").expect("valid encoders regex"));
static RE_DECODERS_NOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(decoders:([^)]+)\)").expect("valid decoders regex"));
static RE_ENCODER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([VASD\.])([F\.])([S\.])([X\.])([B\.])([D\.]) ([^=\s]\S*)\s+(.*)$")
        .expect("valid encoder regex")
});
static RE_FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?: [T\.][S\.][C\.] )?([^ ]+) +(AA?|VV?|N|\|)->(AA?|VV?|N|\|) +(.*)$")
        .expect("valid filter regex")
});

/// Media kind of a codec, encoder or filter pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    None,
}

impl MediaKind {
    fn from_flag(flag: &str) -> Self {
        match flag {
            "V" => MediaKind::Video,
            "A" => MediaKind::Audio,
            "S" => MediaKind::Subtitle,
            "D" => MediaKind::Data,
            "T" => MediaKind::Attachment,
            _ => MediaKind::None,
        }
    }
}

/// One entry of `ffmpeg -formats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub description: String,
    pub can_demux: bool,
    pub can_mux: bool,
}

/// One entry of `ffmpeg -codecs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecInfo {
    pub kind: MediaKind,
    pub description: String,
    pub can_decode: bool,
    pub can_encode: bool,
    pub intra_frame_only: bool,
    pub lossy: bool,
    pub lossless: bool,
}

/// One entry of `ffmpeg -encoders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderInfo {
    pub kind: MediaKind,
    pub description: String,
    pub frame_mt: bool,
    pub slice_mt: bool,
    pub experimental: bool,
    pub draw_horiz_band: bool,
    pub direct_rendering: bool,
}

/// One entry of `ffmpeg -filters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterInfo {
    pub description: String,
    pub input: MediaKind,
    pub multiple_inputs: bool,
    pub output: MediaKind,
    pub multiple_outputs: bool,
}

pub type Formats = BTreeMap<String, FormatInfo>;
pub type Codecs = BTreeMap<String, CodecInfo>;
pub type Encoders = BTreeMap<String, EncoderInfo>;
pub type Filters = BTreeMap<String, FilterInfo>;

/// Parse `ffmpeg -formats`. Lines listing several comma-separated names
/// produce one entry per name.
pub fn parse_formats(out: &str) -> Formats {
    let mut formats = Formats::new();
    for line in out.lines() {
        let Some(caps) = RE_FORMAT.captures(line) else {
            continue;
        };
        for name in caps[3].split(',') {
            let entry = formats.entry(name.to_string()).or_insert_with(|| FormatInfo {
                description: caps[4].to_string(),
                can_demux: false,
                can_mux: false,
            });
            if &caps[1] == "D" {
                entry.can_demux = true;
            }
            if &caps[2] == "E" {
                entry.can_mux = true;
            }
        }
    }
    formats
}

/// Parse `ffmpeg -codecs`.
///
/// Codecs whose description lists `(encoders: ...)` or `(decoders: ...)`
/// also get an entry for each named implementation.
pub fn parse_codecs(out: &str) -> Codecs {
    let mut codecs = Codecs::new();
    for line in out.lines() {
        let Some(caps) = RE_CODEC.captures(line) else {
            continue;
        };
        let codec = CodecInfo {
            kind: MediaKind::from_flag(&caps[3]),
            description: caps[8].to_string(),
            can_decode: &caps[1] == "D",
            can_encode: &caps[2] == "E",
            intra_frame_only: &caps[4] == "I",
            lossy: &caps[5] == "L",
            lossless: &caps[6] == "S",
        };

        let names = |re: &Regex| -> Vec<String> {
            re.captures(&codec.description)
                .map(|c| c[1].split_whitespace().map(str::to_string).collect())
                .unwrap_or_default()
        };
        let encoders = names(&RE_ENCODERS_NOTE);
        let decoders = names(&RE_DECODERS_NOTE);

        let template = CodecInfo {
            can_decode: false,
            can_encode: false,
            ..codec.clone()
        };
        for name in encoders {
            codecs.insert(
                name,
                CodecInfo {
                    can_encode: true,
                    ..template.clone()
                },
            );
        }
        for name in decoders {
            codecs
                .entry(name)
                .or_insert_with(|| template.clone())
                .can_decode = true;
        }

        codecs.insert(caps[7].to_string(), codec);
    }
    codecs
}

/// Parse `ffmpeg -encoders`.
pub fn parse_encoders(out: &str) -> Encoders {
    let mut encoders = Encoders::new();
    for line in out.lines() {
        let Some(caps) = RE_ENCODER.captures(line) else {
            continue;
        };
        encoders.insert(
            caps[7].to_string(),
            EncoderInfo {
                kind: MediaKind::from_flag(&caps[1]),
                description: caps[8].to_string(),
                frame_mt: &caps[2] == "F",
                slice_mt: &caps[3] == "S",
                experimental: &caps[4] == "X",
                draw_horiz_band: &caps[5] == "B",
                direct_rendering: &caps[6] == "D",
            },
        );
    }
    encoders
}

/// Parse `ffmpeg -filters`.
pub fn parse_filters(out: &str) -> Filters {
    let pad_kind = |pads: &str| match pads.chars().next() {
        Some('A') => MediaKind::Audio,
        Some('V') => MediaKind::Video,
        _ => MediaKind::None,
    };

    let mut filters = Filters::new();
    for line in out.lines() {
        let Some(caps) = RE_FILTER.captures(line) else {
            continue;
        };
        filters.insert(
            caps[1].to_string(),
            FilterInfo {
                description: caps[4].to_string(),
                input: pad_kind(&caps[2]),
                multiple_inputs: caps[2].len() > 1,
                output: pad_kind(&caps[3]),
                multiple_outputs: caps[3].len() > 1,
            },
        );
    }
    filters
}

/// Formats and codecs a job asks for, gathered from its inputs and outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityRequest {
    pub input_formats: Vec<String>,
    pub output_formats: Vec<String>,
    pub audio_codecs: Vec<String>,
    pub video_codecs: Vec<String>,
}

impl CapabilityRequest {
    pub fn needs_formats(&self) -> bool {
        !self.input_formats.is_empty() || !self.output_formats.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Validate `request` against the advertised format and encoder tables.
///
/// Every unavailable value of a category is reported in one error, checked
/// in the order output formats, input formats, audio codecs, video codecs.
/// `copy` is always accepted as a codec.
pub fn check(request: &CapabilityRequest, formats: &Formats, encoders: &Encoders) -> Result<()> {
    let mut missing = Vec::new();
    for format in &request.output_formats {
        if !formats.get(format).is_some_and(|f| f.can_mux) {
            push_unique(&mut missing, format);
        }
    }
    if let Some(err) = Error::unavailable("Output format", "Output formats", &missing) {
        return Err(err);
    }

    missing.clear();
    for format in &request.input_formats {
        if !formats.get(format).is_some_and(|f| f.can_demux) {
            push_unique(&mut missing, format);
        }
    }
    if let Some(err) = Error::unavailable("Input format", "Input formats", &missing) {
        return Err(err);
    }

    for (codecs, kind, singular, plural) in [
        (&request.audio_codecs, MediaKind::Audio, "Audio codec", "Audio codecs"),
        (&request.video_codecs, MediaKind::Video, "Video codec", "Video codecs"),
    ] {
        missing.clear();
        for codec in codecs.iter().filter(|c| c.as_str() != "copy") {
            if !encoders.get(codec).is_some_and(|e| e.kind == kind) {
                push_unique(&mut missing, codec);
            }
        }
        if let Some(err) = Error::unavailable(singular, plural, &missing) {
            return Err(err);
        }
    }

    Ok(())
}

/// Insert `-strict experimental` after every `-acodec`/`-vcodec` value whose
/// encoder is flagged experimental.
pub fn add_strict_experimental(args: &[String], encoders: &Encoders) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        out.push(arg.clone());
        if arg == "-acodec" || arg == "-vcodec" {
            if let Some(codec) = iter.next() {
                out.push(codec.clone());
                if encoders.get(codec).is_some_and(|e| e.experimental) {
                    out.push("-strict".into());
                    out.push("experimental".into());
                }
            }
        }
    }
    out
}
