//! Job outputs and the output-scoped configuration calls (audio, video,
//! size, target).

use std::sync::LazyLock;

use fw_core::{Error, OptionList, Result};
use fw_filter::{compile, keep_display_aspect_filters, parse_aspect, size_filters, stream_label};
use fw_filter::{FilterSpec, SizeData};
use regex::Regex;

use super::{split_options, Command};
use crate::OutputStream;

static RE_PROTOCOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([a-z]{2,}):").expect("valid protocol regex"));

/// Where an output is written to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// Not set yet; rendered as `pipe:1` when the output is kept.
    #[default]
    Unset,
    /// A local file, possibly with a `file:` prefix.
    File(String),
    /// A URL handled by one of ffmpeg's protocols.
    Url(String),
    /// The stream receiving the process's stdout.
    Stream,
}

impl OutputTarget {
    /// Classify a target string like [`crate::InputSource::parse`].
    pub fn parse(target: impl Into<String>) -> Self {
        let target = target.into();
        match RE_PROTOCOL.captures(&target) {
            Some(caps) if !caps[1].eq_ignore_ascii_case("file") => OutputTarget::Url(target),
            _ => OutputTarget::File(target),
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, OutputTarget::Unset)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, OutputTarget::File(_))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, OutputTarget::Stream)
    }

    /// Filesystem path of a file output.
    pub fn path(&self) -> Option<&str> {
        match self {
            OutputTarget::File(s) => Some(s.strip_prefix("file:").unwrap_or(s)),
            _ => None,
        }
    }
}

/// One configured output.
///
/// The size filters are derived from [`SizeData`] and rebuilt as a whole
/// whenever size, aspect or padding change.
#[derive(Debug, Clone, Default)]
pub struct Output {
    pub(crate) target: OutputTarget,
    pub(crate) options: OptionList,
    pub(crate) audio: OptionList,
    pub(crate) video: OptionList,
    pub(crate) audio_filters: OptionList,
    pub(crate) video_filters: OptionList,
    pub(crate) size_filters: OptionList,
    pub(crate) size_data: SizeData,
    pub(crate) update_flv_metadata: bool,
}

impl Output {
    fn with_target(target: OutputTarget) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    pub fn options(&self) -> &OptionList {
        &self.options
    }

    pub fn audio(&self) -> &OptionList {
        &self.audio
    }

    pub fn video(&self) -> &OptionList {
        &self.video
    }

    /// Whether anything was configured on this output besides its target.
    pub fn has_content(&self) -> bool {
        [
            &self.options,
            &self.audio,
            &self.video,
            &self.audio_filters,
            &self.video_filters,
            &self.size_filters,
        ]
        .iter()
        .any(|list| !list.is_empty())
    }

    /// Append this output's tokens. `sole` is set when this is the only
    /// output and no complex filter graph is in effect.
    pub(crate) fn append_arguments(&self, args: &mut Vec<String>, sole: bool) {
        args.extend_from_slice(self.options.get());
        args.extend_from_slice(self.audio.get());
        args.extend_from_slice(self.video.get());

        if !self.audio_filters.is_empty() {
            args.push("-filter:a".into());
            args.push(self.audio_filters.get().join(","));
        }
        let video_filters: Vec<&str> = self
            .video_filters
            .get()
            .iter()
            .chain(self.size_filters.get())
            .map(String::as_str)
            .collect();
        if !video_filters.is_empty() {
            args.push("-filter:v".into());
            args.push(video_filters.join(","));
        }

        match self.target {
            OutputTarget::File(ref t) | OutputTarget::Url(ref t) => args.push(t.clone()),
            OutputTarget::Stream => args.push("pipe:1".into()),
            OutputTarget::Unset if sole || self.has_content() => args.push("pipe:1".into()),
            OutputTarget::Unset => {}
        }
    }
}

fn compile_all<I, F>(filters: I) -> Vec<String>
where
    I: IntoIterator<Item = F>,
    F: Into<FilterSpec>,
{
    let specs: Vec<FilterSpec> = filters.into_iter().map(Into::into).collect();
    compile(&specs)
}

/// `128` → `128k`; values already ending in `k` are kept.
fn kilo(value: impl ToString) -> String {
    let value = value.to_string();
    if value.ends_with('k') {
        value
    } else {
        format!("{value}k")
    }
}

impl Command {
    pub(crate) fn current_output(&mut self) -> &mut Output {
        if self.outputs.is_empty() {
            self.outputs.push(Output::default());
        }
        let last = self.outputs.len() - 1;
        &mut self.outputs[last]
    }

    // ---- audio ----

    /// Disable audio (`-an`), discarding audio options and filters.
    pub fn no_audio(&mut self) -> &mut Self {
        let output = self.current_output();
        output.audio.clear();
        output.audio_filters.clear();
        output.audio.push("-an");
        self
    }

    /// Audio codec (`-acodec`). `copy` keeps the input stream as is.
    pub fn audio_codec(&mut self, codec: &str) -> &mut Self {
        self.current_output().audio.append(["-acodec", codec]);
        self
    }

    /// Audio bitrate (`-b:a`) in kbit/s.
    pub fn audio_bitrate(&mut self, bitrate: impl ToString) -> &mut Self {
        let audio = &mut self.current_output().audio;
        audio.remove("-b:a", 1);
        audio.append(["-b:a".to_string(), kilo(bitrate)]);
        self
    }

    /// Audio channel count (`-ac`).
    pub fn audio_channels(&mut self, channels: u32) -> &mut Self {
        self.current_output()
            .audio
            .append(["-ac".to_string(), channels.to_string()]);
        self
    }

    /// Audio sample rate (`-ar`).
    pub fn audio_frequency(&mut self, frequency: u32) -> &mut Self {
        self.current_output()
            .audio
            .append(["-ar".to_string(), frequency.to_string()]);
        self
    }

    /// Codec-specific audio quality (`-aq`).
    pub fn audio_quality(&mut self, quality: impl ToString) -> &mut Self {
        self.current_output()
            .audio
            .append(["-aq".to_string(), quality.to_string()]);
        self
    }

    /// Append audio filters, joined into one `-filter:a` chain.
    pub fn audio_filters<I, F>(&mut self, filters: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FilterSpec>,
    {
        let compiled = compile_all(filters);
        self.current_output().audio_filters.append(compiled);
        self
    }

    // ---- video ----

    /// Disable video (`-vn`), discarding video options and filters.
    pub fn no_video(&mut self) -> &mut Self {
        let output = self.current_output();
        output.video.clear();
        output.video_filters.clear();
        output.video.push("-vn");
        self
    }

    /// Video codec (`-vcodec`).
    pub fn video_codec(&mut self, codec: &str) -> &mut Self {
        self.current_output().video.append(["-vcodec", codec]);
        self
    }

    /// Video bitrate (`-b:v`) in kbit/s. `constant` pins min/max rate to the
    /// same value with a 3M buffer.
    pub fn video_bitrate(&mut self, bitrate: impl ToString, constant: bool) -> &mut Self {
        let bitrate = kilo(bitrate);
        let video = &mut self.current_output().video;
        for key in ["-b:v", "-maxrate", "-minrate", "-bufsize"] {
            video.remove(key, 1);
        }
        video.append(["-b:v".to_string(), bitrate.clone()]);
        if constant {
            video.append([
                "-maxrate".to_string(),
                bitrate.clone(),
                "-minrate".to_string(),
                bitrate,
                "-bufsize".to_string(),
                "3M".to_string(),
            ]);
        }
        self
    }

    /// Append video filters, joined with the size filters into one
    /// `-filter:v` chain.
    pub fn video_filters<I, F>(&mut self, filters: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FilterSpec>,
    {
        let compiled = compile_all(filters);
        self.current_output().video_filters.append(compiled);
        self
    }

    /// Output frame rate (`-r`).
    pub fn fps(&mut self, fps: f64) -> &mut Self {
        self.current_output()
            .video
            .append(["-r".to_string(), fps.to_string()]);
        self
    }

    /// Number of video frames to write (`-vframes`).
    pub fn frames(&mut self, frames: u64) -> &mut Self {
        self.current_output()
            .video
            .append(["-vframes".to_string(), frames.to_string()]);
        self
    }

    // ---- size ----

    fn update_size(&mut self, update: impl FnOnce(&mut SizeData)) -> Result<&mut Self> {
        let output = self.current_output();
        let mut data = output.size_data.clone();
        update(&mut data);
        let filters = size_filters(&data)?;
        output.size_data = data;
        output.size_filters = compile(&filters).into_iter().collect();
        Ok(self)
    }

    /// Output frame size: `WxH`, `Wx?`, `?xH` or `NN%`.
    pub fn size(&mut self, size: &str) -> Result<&mut Self> {
        self.update_size(|data| data.size = Some(size.to_string()))
    }

    /// Output display aspect ratio, as a number or `W:H`.
    pub fn aspect(&mut self, aspect: impl ToString) -> Result<&mut Self> {
        let aspect = parse_aspect(&aspect.to_string())?;
        self.update_size(|data| data.aspect = Some(aspect))
    }

    /// Pad to the requested size and aspect instead of stretching. The
    /// padding colour defaults to black.
    pub fn autopad(&mut self, color: Option<&str>) -> Result<&mut Self> {
        let color = color.unwrap_or("black").to_string();
        self.update_size(|data| data.pad = Some(color))
    }

    /// Scale non-square-pixel input to its display aspect ratio.
    pub fn keep_display_aspect(&mut self) -> &mut Self {
        let compiled = compile(&keep_display_aspect_filters());
        self.current_output().video_filters.append(compiled);
        self
    }

    // ---- outputs ----

    fn set_target(&mut self, target: OutputTarget) -> &mut Self {
        let current = self.current_output();
        if current.target.is_set() {
            self.outputs.push(Output::with_target(target));
        } else {
            current.target = target;
        }
        self
    }

    /// Set the output target. The first call targets the default output;
    /// later calls add outputs, and following output-scoped calls apply to
    /// the newest one.
    pub fn output(&mut self, target: impl Into<String>) -> &mut Self {
        self.set_target(OutputTarget::parse(target))
    }

    /// Write an output to `writer` through the process's stdout.
    ///
    /// Only one stream output is possible per job.
    pub fn output_stream(&mut self, writer: OutputStream) -> Result<&mut Self> {
        if self.outputs.iter().any(|o| o.target.is_stream()) {
            return Err(Error::config("Only one output stream is supported"));
        }
        self.output_stream = Some(writer);
        Ok(self.set_target(OutputTarget::Stream))
    }

    /// Limit the output duration (`-t`).
    pub fn duration(&mut self, duration: impl ToString) -> &mut Self {
        self.current_output()
            .options
            .append(["-t".to_string(), duration.to_string()]);
        self
    }

    /// Start the output at `position` (`-ss` as an output option).
    pub fn seek(&mut self, position: impl ToString) -> &mut Self {
        self.current_output()
            .options
            .append(["-ss".to_string(), position.to_string()]);
        self
    }

    /// Force the output container format (`-f`).
    pub fn format(&mut self, format: &str) -> &mut Self {
        self.current_output().options.append(["-f", format]);
        self
    }

    /// Map a stream or filter graph label to the output (`-map`).
    pub fn map(&mut self, spec: &str) -> &mut Self {
        let label = stream_label(spec);
        self.current_output().options.append(["-map".to_string(), label]);
        self
    }

    /// Fix up FLV metadata with flvmeta/flvtool2 after the run. Only honored
    /// for file outputs.
    pub fn update_flv_metadata(&mut self) -> &mut Self {
        self.current_output().update_flv_metadata = true;
        self
    }

    /// Add custom output options. `"-flag value"` strings are split in two.
    pub fn output_options<I, S>(&mut self, options: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = split_options(options);
        self.current_output().options.append(tokens);
        self
    }
}
