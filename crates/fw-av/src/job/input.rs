//! Job inputs and the input-scoped configuration calls.

use std::sync::LazyLock;

use fw_core::{Error, OptionList, Result};
use regex::Regex;

use super::{split_options, Command};
use crate::InputStream;

static RE_PROTOCOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([a-z]{2,}):").expect("valid protocol regex"));

/// Where an input is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A local file, possibly with a `file:` prefix.
    File(String),
    /// A URL handled by one of ffmpeg's protocols (`http:`, `rtmp:`, ...).
    Url(String),
    /// The stream piped to the process's stdin.
    Stream,
}

impl InputSource {
    /// Classify a source string: anything with a protocol prefix other than
    /// `file:` is a URL.
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        match RE_PROTOCOL.captures(&source) {
            Some(caps) if !caps[1].eq_ignore_ascii_case("file") => InputSource::Url(source),
            _ => InputSource::File(source),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, InputSource::File(_))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, InputSource::Stream)
    }

    /// Token following `-i`.
    pub fn as_arg(&self) -> &str {
        match self {
            InputSource::File(s) | InputSource::Url(s) => s,
            InputSource::Stream => "pipe:0",
        }
    }

    /// Filesystem path of a file input.
    pub fn path(&self) -> Option<&str> {
        match self {
            InputSource::File(s) => Some(s.strip_prefix("file:").unwrap_or(s)),
            _ => None,
        }
    }
}

/// One configured input with its own options.
#[derive(Debug, Clone)]
pub struct Input {
    pub(crate) source: InputSource,
    pub(crate) options: OptionList,
}

impl Input {
    fn new(source: InputSource) -> Self {
        Self {
            source,
            options: OptionList::new(),
        }
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn options(&self) -> &OptionList {
        &self.options
    }
}

impl Command {
    /// Add a file or URL input. Following input-scoped calls apply to it.
    pub fn input(&mut self, source: impl Into<String>) -> &mut Self {
        self.inputs.push(Input::new(InputSource::parse(source)));
        self
    }

    /// Add an input read from `reader`, piped to the process's stdin.
    ///
    /// Only one stream input is possible per job.
    pub fn input_stream(&mut self, reader: InputStream) -> Result<&mut Self> {
        if self.inputs.iter().any(|i| i.source.is_stream()) {
            return Err(Error::config("Only one input stream is supported"));
        }
        self.inputs.push(Input::new(InputSource::Stream));
        self.input_stream = Some(reader);
        Ok(self)
    }

    fn current_input(&mut self) -> Result<&mut Input> {
        self.inputs
            .last_mut()
            .ok_or_else(|| Error::config("No input specified"))
    }

    /// Force the input format (`-f`).
    pub fn input_format(&mut self, format: &str) -> Result<&mut Self> {
        self.current_input()?.options.append(["-f", format]);
        Ok(self)
    }

    /// Force the input frame rate (`-r`).
    pub fn input_fps(&mut self, fps: f64) -> Result<&mut Self> {
        self.current_input()?
            .options
            .append(["-r".to_string(), fps.to_string()]);
        Ok(self)
    }

    /// Read the input at its native frame rate (`-re`).
    pub fn native_framerate(&mut self) -> Result<&mut Self> {
        self.current_input()?.options.push("-re");
        Ok(self)
    }

    /// Seek the input to `position` (seconds or `hh:mm:ss[.xx]`) before
    /// decoding.
    pub fn seek_input(&mut self, position: impl ToString) -> Result<&mut Self> {
        self.current_input()?
            .options
            .append(["-ss".to_string(), position.to_string()]);
        Ok(self)
    }

    /// Loop the input (`-loop 1`), for still images. A `duration` limits the
    /// current output's length.
    pub fn loop_input(&mut self, duration: Option<&str>) -> Result<&mut Self> {
        self.current_input()?.options.append(["-loop", "1"]);
        if let Some(duration) = duration {
            self.duration(duration);
        }
        Ok(self)
    }

    /// Add custom input options. `"-flag value"` strings are split in two.
    pub fn input_options<I, S>(&mut self, options: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = split_options(options);
        self.current_input()?.options.append(tokens);
        Ok(self)
    }
}
