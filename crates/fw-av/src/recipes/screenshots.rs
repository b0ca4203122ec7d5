//! Thumbnail extraction: one process writing a frame per timemark.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fw_core::{Error, JobEvent, Result, Timemark};
use fw_filter::{size_filters, FilterNode, FilterSpec};
use fw_probe::ProbeData;
use regex::Regex;
use tracing::Instrument;

use crate::job::{Command, InputSource, JobOutput};

const DEFAULT_FILENAME: &str = "tn.png";

static RE_FIXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)x(\d+)$").expect("valid size regex"));
static RE_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)x\?$").expect("valid width regex"));
static RE_HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\?x(\d+)$").expect("valid height regex"));
static RE_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)%$").expect("valid percent regex"));
static RE_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(s|0*\d*i)").expect("valid token regex"));
static RE_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(0*)([1-9]\d*)?i").expect("valid index regex"));

/// What to capture and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotConfig {
    /// Evenly spaced shots, used when `timemarks` is empty.
    pub count: Option<usize>,
    pub timemarks: Vec<Timemark>,
    /// Filename pattern; defaults to `tn.png`. Tokens: `%s`, `%w`, `%h`,
    /// `%r`, `%f`, `%b`, `%i`, `%0Ni`.
    pub filename: Option<String>,
    pub folder: PathBuf,
    /// `WxH`, `Wx?`, `?xH` or `NN%`.
    pub size: Option<String>,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            count: None,
            timemarks: Vec::new(),
            filename: None,
            folder: PathBuf::from("."),
            size: None,
        }
    }
}

impl ScreenshotConfig {
    /// `count` shots spread evenly over the input.
    pub fn count(count: usize) -> Self {
        Self {
            count: Some(count),
            ..Default::default()
        }
    }

    /// Shots at the given timemarks.
    pub fn at<I, T>(timemarks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Timemark>,
    {
        Self {
            timemarks: timemarks.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn filename(mut self, pattern: impl Into<String>) -> Self {
        self.filename = Some(pattern.into());
        self
    }

    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }
}

/// A validated screenshot size request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotSize {
    Fixed(u64, u64),
    Width(u64),
    Height(u64),
    Percent(u64),
}

impl ScreenshotSize {
    pub fn parse(size: &str) -> Result<Self> {
        let number = |caps: &regex::Captures<'_>, i: usize| caps[i].parse::<u64>().ok();
        let parsed = if let Some(caps) = RE_FIXED.captures(size) {
            number(&caps, 1).zip(number(&caps, 2)).map(|(w, h)| Self::Fixed(w, h))
        } else if let Some(caps) = RE_WIDTH.captures(size) {
            number(&caps, 1).map(Self::Width)
        } else if let Some(caps) = RE_HEIGHT.captures(size) {
            number(&caps, 1).map(Self::Height)
        } else if let Some(caps) = RE_PERCENT.captures(size) {
            number(&caps, 1).map(Self::Percent)
        } else {
            None
        };
        parsed.ok_or_else(|| Error::config(format!("Invalid size parameter: {size}")))
    }

    /// Output dimensions for a source of `width`x`height`, rounded to even
    /// values. A fixed size is returned as given.
    pub fn dimensions(self, width: u64, height: u64) -> (u64, u64) {
        let (w, h) = (width as f64, height as f64);
        match self {
            Self::Fixed(fixed_w, fixed_h) => (fixed_w, fixed_h),
            Self::Width(target) => (even(target as f64), even(h * target as f64 / w)),
            Self::Height(target) => (even(w * target as f64 / h), even(target as f64)),
            Self::Percent(p) => (even(w * p as f64 / 100.0), even(h * p as f64 / 100.0)),
        }
    }
}

/// Result of a screenshot job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotOutput {
    /// Written filenames, relative to the configured folder, in timemark order.
    pub filenames: Vec<String>,
    pub job: JobOutput,
}

fn even(value: f64) -> u64 {
    ((value / 2.0).round() * 2.0).max(0.0) as u64
}

/// `count` percentages splitting the input into `count + 1` equal parts.
fn spread(count: usize) -> Vec<Timemark> {
    let interval = 100.0 / (count + 1) as f64;
    (1..=count)
        .map(|i| Timemark::Percent(interval * i as f64))
        .collect()
}

/// Duration used for percentage timemarks: the largest video stream's,
/// else the container's.
fn shot_duration(data: &ProbeData) -> Result<f64> {
    let stream = data
        .largest_video_stream()
        .ok_or_else(|| Error::Probe("No video stream in input, cannot take screenshots".into()))?;
    stream
        .get_f64("duration")
        .or_else(|| data.duration())
        .ok_or_else(|| {
            Error::Probe("Could not get input duration, please specify fixed timemarks".into())
        })
}

fn resolve_timemarks(timemarks: &[Timemark], duration: Option<f64>) -> Result<Vec<f64>> {
    let mut seconds = timemarks
        .iter()
        .map(|mark| {
            mark.to_seconds(duration)
                .ok_or_else(|| Error::config(format!("Cannot resolve timemark {mark}")))
        })
        .collect::<Result<Vec<f64>>>()?;
    seconds.sort_by(f64::total_cmp);
    Ok(seconds)
}

/// Default the pattern, give it an extension, and add an index token when
/// several shots would otherwise share one name.
fn filename_pattern(filename: Option<&str>, count: usize) -> String {
    let mut pattern = filename.unwrap_or(DEFAULT_FILENAME).to_string();
    if !pattern.contains('.') {
        pattern.push_str(".png");
    }
    if count > 1 && !RE_VARIABLE.is_match(&pattern) {
        let name_start = pattern.rfind('/').map_or(0, |i| i + 1);
        pattern = match pattern[name_start..].rfind('.') {
            Some(dot) if dot > 0 => {
                let dot = name_start + dot;
                format!("{}_%i{}", &pattern[..dot], &pattern[dot..])
            }
            _ => format!("{pattern}_%i"),
        };
    }
    pattern
}

/// Substitute `%f` (input filename) and `%b` (filename without extension).
fn replace_filename_tokens(pattern: &str, source: &InputSource) -> Result<String> {
    if !pattern.contains("%f") && !pattern.contains("%b") {
        return Ok(pattern.to_string());
    }
    let source = match source {
        InputSource::File(_) => source.path().unwrap_or_default(),
        InputSource::Url(url) => url.as_str(),
        InputSource::Stream => {
            return Err(Error::config("Cannot replace %f or %b when using an input stream"));
        }
    };
    let path = Path::new(source);
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let stem = path.file_stem().map(|n| n.to_string_lossy()).unwrap_or_default();
    Ok(pattern.replace("%f", &name).replace("%b", &stem))
}

fn needs_dimensions(pattern: &str) -> bool {
    ["%w", "%h", "%r"].iter().any(|t| pattern.contains(t))
}

fn replace_size_tokens(pattern: &str, width: u64, height: u64) -> String {
    pattern
        .replace("%r", "%wx%h")
        .replace("%w", &width.to_string())
        .replace("%h", &height.to_string())
}

/// One filename per timemark, with `%s` and the index tokens filled in.
fn expand_filenames(pattern: &str, seconds: &[f64]) -> Vec<String> {
    seconds
        .iter()
        .enumerate()
        .map(|(i, secs)| {
            let name = pattern.replace("%s", &secs.to_string());
            RE_INDEX
                .replace_all(&name, |caps: &regex::Captures<'_>| {
                    let width = match caps.get(2) {
                        Some(digits) => digits.as_str().parse().unwrap_or(1),
                        None => caps[1].len() + 1,
                    };
                    format!("{:0width$}", i + 1)
                })
                .into_owned()
        })
        .collect()
}

impl Command {
    /// Capture frames of the current input into image files.
    ///
    /// Percentage timemarks (and `count`) need a file input, which is probed
    /// for its duration. The resolved filenames are sent as
    /// [`JobEvent::Filenames`] before the job runs.
    pub async fn screenshots(&mut self, config: ScreenshotConfig) -> Result<ScreenshotOutput> {
        let span = self.span.clone();
        async move {
            let timemarks = match (config.timemarks.is_empty(), config.count) {
                (false, _) => config.timemarks.clone(),
                (true, Some(count)) if count > 0 => spread(count),
                _ => {
                    return Err(Error::config(
                        "Cannot take screenshots: neither a count nor a timemark list are specified",
                    ))
                }
            };
            let size = config.size.as_deref().map(ScreenshotSize::parse).transpose()?;
            let source = self
                .inputs
                .last()
                .map(|i| i.source.clone())
                .ok_or_else(|| Error::config("No input specified"))?;

            let mut metadata: Option<ProbeData> = None;
            let mut duration = None;
            if timemarks.iter().any(Timemark::is_relative) {
                if source.is_stream() {
                    return Err(Error::config(
                        "Cannot compute screenshot timemarks with an input stream, please specify fixed timemarks",
                    ));
                }
                let data = self.probe(None, &[]).await?;
                duration = Some(shot_duration(&data)?);
                metadata = Some(data);
            }
            let seconds = resolve_timemarks(&timemarks, duration)?;

            let pattern = filename_pattern(config.filename.as_deref(), seconds.len());
            let mut pattern = replace_filename_tokens(&pattern, &source)?;
            if needs_dimensions(&pattern) {
                let (width, height) = match size {
                    Some(ScreenshotSize::Fixed(w, h)) => (w, h),
                    _ => {
                        let data = match metadata.take() {
                            Some(data) => data,
                            None if source.is_stream() => {
                                return Err(Error::config(
                                    "Cannot replace %w, %h or %r with an input stream, please specify a fixed size",
                                ))
                            }
                            None => self.probe(None, &[]).await.map_err(|_| {
                                Error::Probe(
                                    "Could not determine video resolution to replace %w, %h or %r".into(),
                                )
                            })?,
                        };
                        let stream = data.largest_video_stream().ok_or_else(|| {
                            Error::Probe("No video stream in input, cannot replace %w, %h or %r".into())
                        })?;
                        let width = stream.get_u64("width").unwrap_or(0);
                        let height = stream.get_u64("height").unwrap_or(0);
                        match size {
                            Some(size) => size.dimensions(width, height),
                            None => (even(width as f64), even(height as f64)),
                        }
                    }
                };
                pattern = replace_size_tokens(&pattern, width, height);
            }

            let filenames = expand_filenames(&pattern, &seconds);
            tracing::info!("Taking {} screenshots: {}", filenames.len(), filenames.join(", "));
            self.emit(JobEvent::Filenames {
                filenames: filenames.clone(),
            });
            tokio::fs::create_dir_all(&config.folder).await?;

            let filters = self.screenshot_filters(config.size.as_deref(), seconds.len())?;
            let first = seconds[0];
            self.seek_input(first)?;
            for (i, (secs, name)) in seconds.iter().zip(&filenames).enumerate() {
                let path = config.folder.join(name);
                self.output(path.to_string_lossy().into_owned())
                    .frames(1)
                    .map(&format!("screen{i}"));
                if i > 0 {
                    self.seek(secs - first);
                }
            }
            self.complex_filter(filters, Vec::<String>::new());

            let job = self.run().await?;
            Ok(ScreenshotOutput { filenames, job })
        }
        .instrument(span)
        .await
    }

    /// Optional size filters chained through `sizeN` labels into a `split`
    /// with one `screenN` branch per shot.
    fn screenshot_filters(&mut self, size: Option<&str>, count: usize) -> Result<Vec<FilterSpec>> {
        let mut filters: Vec<FilterSpec> = Vec::new();
        let mut split = FilterNode::new("split").value(count);

        if let Some(size) = size {
            let mut data = self.current_output().size_data.clone();
            data.size = Some(size.to_string());
            let sized = size_filters(&data)?;
            let last = sized.len().saturating_sub(1);
            for (i, spec) in sized.into_iter().enumerate() {
                match spec {
                    FilterSpec::Graph(mut node) => {
                        if i > 0 {
                            node.inputs = vec![format!("size{}", i - 1)];
                        }
                        node.outputs = vec![format!("size{i}")];
                        filters.push(node.into());
                    }
                    raw => filters.push(raw),
                }
            }
            if !filters.is_empty() {
                split = split.input(format!("size{last}"));
            }
        }

        filters.push(split.outputs((0..count).map(|i| format!("screen{i}"))).into());
        Ok(filters)
    }
}
