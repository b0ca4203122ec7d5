//! The [`Command`] aggregate: inputs, outputs, global options and a complex
//! filter graph, assembled into an ffmpeg argument vector and run.

mod input;
mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fw_core::config::{Config, JobDefaults};
use fw_core::{Error, JobEvent, OptionList, Result};
use fw_filter::{join_graph, stream_label, FilterSpec};
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::capabilities::{self, add_strict_experimental, CapabilityRequest, Encoders};
use crate::command::ToolCommand;
use crate::control::{clamp_niceness, JobControl};
use crate::presets::Preset;
use crate::process::{self, EventSender, ProcessOutcome, ProcessSpec};
use crate::tools::ToolCache;
use crate::{InputStream, OutputStream};

pub use input::{Input, InputSource};
pub use output::{Output, OutputTarget};

/// Result of a finished job.
pub type JobOutput = ProcessOutcome;

/// Split `"-flag value"` strings into two tokens; anything else is kept
/// as a single token.
pub(crate) fn split_options<I, S>(options: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tokens = Vec::new();
    for option in options {
        let option = option.as_ref();
        match option.split(' ').collect::<Vec<_>>().as_slice() {
            [flag, value] => {
                tokens.push(flag.to_string());
                tokens.push(value.to_string());
            }
            _ => tokens.push(option.to_string()),
        }
    }
    tokens
}

/// A transcode job.
///
/// Configuration calls mutate in-memory option state only; the argument
/// vector is assembled when the job runs.
///
/// ```no_run
/// use fw_av::Command;
///
/// # async fn example() -> fw_core::Result<()> {
/// let mut cmd = Command::new();
/// cmd.input("in.mov")
///     .audio_codec("aac")
///     .video_codec("libx264")
///     .size("1280x?")?;
/// cmd.save("out.mp4").await?;
/// # Ok(())
/// # }
/// ```
pub struct Command {
    pub(crate) inputs: Vec<Input>,
    pub(crate) outputs: Vec<Output>,
    pub(crate) global: OptionList,
    pub(crate) complex_filters: OptionList,
    pub(crate) input_stream: Option<InputStream>,
    pub(crate) output_stream: Option<OutputStream>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) niceness: i32,
    pub(crate) log_lines: usize,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) tools: Arc<ToolCache>,
    pub(crate) events: Option<EventSender>,
    pub(crate) span: tracing::Span,
    job_id: Uuid,
    control: JobControl,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("job_id", &self.job_id)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("global", &self.global)
            .field("complex_filters", &self.complex_filters)
            .field("timeout", &self.timeout)
            .field("niceness", &self.niceness)
            .field("log_lines", &self.log_lines)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

impl Default for Command {
    fn default() -> Self {
        Self::new()
    }
}

impl Command {
    /// Create a job using the shared [`ToolCache`] and default job settings.
    pub fn new() -> Self {
        Self::build(ToolCache::global(), &JobDefaults::default())
    }

    /// Create a job with one input.
    pub fn from_input(source: impl Into<String>) -> Self {
        let mut cmd = Self::new();
        cmd.input(source);
        cmd
    }

    /// Create a job with its own [`ToolCache`] built from `config.tools` and
    /// the defaults of `config.job`.
    pub fn with_config(config: &Config) -> Self {
        Self::build(Arc::new(ToolCache::new(config.tools.clone())), &config.job)
    }

    fn build(tools: Arc<ToolCache>, defaults: &JobDefaults) -> Self {
        let job_id = Uuid::new_v4();
        Self {
            inputs: Vec::new(),
            outputs: vec![Output::default()],
            global: OptionList::new(),
            complex_filters: OptionList::new(),
            input_stream: None,
            output_stream: None,
            timeout: defaults
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            niceness: clamp_niceness(defaults.niceness),
            log_lines: defaults.log_lines,
            working_dir: defaults.working_dir.clone(),
            tools,
            events: None,
            span: tracing::info_span!("ffmpeg_job", job_id = %job_id),
            job_id,
            control: JobControl::new(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    // ---- runtime settings ----

    /// Use `tools` for path resolution and capability queries.
    pub fn with_tool_cache(&mut self, tools: Arc<ToolCache>) -> &mut Self {
        self.tools = tools;
        self
    }

    pub fn tool_cache(&self) -> &Arc<ToolCache> {
        &self.tools
    }

    /// Kill the process when it runs longer than `timeout`.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Scheduling priority, clamped to -20..=20. Ignored on Windows.
    pub fn niceness(&mut self, niceness: i32) -> &mut Self {
        self.niceness = clamp_niceness(niceness);
        self
    }

    /// Retained stdout/stderr lines; 0 keeps everything.
    pub fn log_lines(&mut self, lines: usize) -> &mut Self {
        self.log_lines = lines;
        self
    }

    /// Working directory of the spawned process.
    pub fn working_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Receive the events of the following runs. A later call replaces the
    /// previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<JobEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Handle for killing or renicing the running process from elsewhere.
    pub fn control(&self) -> JobControl {
        self.control.clone()
    }

    pub(crate) fn emit(&self, event: JobEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }

    // ---- global settings ----

    /// Add options placed after the inputs and the complex filter graph.
    pub fn global_options<I, S>(&mut self, options: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.global.append(split_options(options));
        self
    }

    /// Replace the complex filter graph. `maps` are the graph output labels
    /// mapped to the outputs.
    pub fn complex_filter<I, F, M, S>(&mut self, specs: I, maps: M) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FilterSpec>,
        M: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let specs: Vec<FilterSpec> = specs.into_iter().map(Into::into).collect();
        self.complex_filters.clear();
        self.complex_filters
            .append(["-filter_complex".to_string(), join_graph(&specs)]);
        for map in maps {
            self.complex_filters
                .append(["-map".to_string(), stream_label(map.as_ref())]);
        }
        self
    }

    /// Apply a built-in preset.
    pub fn preset(&mut self, preset: Preset) -> Result<&mut Self> {
        preset.apply(self)?;
        Ok(self)
    }

    /// Apply a custom preset.
    pub fn preset_with<F>(&mut self, preset: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Command) -> Result<()>,
    {
        preset(self)?;
        Ok(self)
    }

    // ---- assembly ----

    /// Assemble the ffmpeg argument vector.
    ///
    /// Order: per input its options and `-i <source>`, the complex filter
    /// graph, the global options (plus `-y` when writing a file), then per
    /// output its options, audio and video options, filter chains and target.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = Vec::new();
        for input in &self.inputs {
            args.extend_from_slice(input.options.get());
            args.push("-i".into());
            args.push(input.source.as_arg().to_string());
        }

        args.extend_from_slice(self.complex_filters.get());
        args.extend_from_slice(self.global.get());
        if self.outputs.iter().any(|o| o.target.is_file()) && !self.global.contains("-y") {
            args.push("-y".into());
        }

        let sole = self.outputs.len() == 1 && self.complex_filters.is_empty();
        for output in &self.outputs {
            output.append_arguments(&mut args, sole);
        }
        args
    }

    /// Formats and codecs requested by the current configuration.
    pub fn capability_request(&self) -> CapabilityRequest {
        let first = |list: &OptionList, key: &str| {
            list.find(key, 1)
                .and_then(|values| values.first())
                .cloned()
        };
        CapabilityRequest {
            input_formats: self
                .inputs
                .iter()
                .filter_map(|i| first(&i.options, "-f"))
                .collect(),
            output_formats: self
                .outputs
                .iter()
                .filter_map(|o| first(&o.options, "-f"))
                .collect(),
            audio_codecs: self
                .outputs
                .iter()
                .filter_map(|o| first(&o.audio, "-acodec"))
                .collect(),
            video_codecs: self
                .outputs
                .iter()
                .filter_map(|o| first(&o.video, "-vcodec"))
                .collect(),
        }
    }

    // ---- running ----

    /// Run the job to completion.
    ///
    /// Validates the configuration and the requested capabilities before
    /// spawning. A job killed through [`Command::control`] completes with
    /// `killed` set.
    ///
    /// # Errors
    ///
    /// Configuration, capability, resolution, process and timeout errors;
    /// see [`fw_core::ErrorCategory`].
    pub async fn run(&mut self) -> Result<JobOutput> {
        let span = self.span.clone();
        self.run_job().instrument(span).await
    }

    /// Write the (current) output to `path` and run.
    pub async fn save(&mut self, path: impl Into<String>) -> Result<JobOutput> {
        self.output(path);
        self.run().await
    }

    /// Write the output to `writer` and run.
    pub async fn pipe(&mut self, writer: OutputStream) -> Result<JobOutput> {
        self.output_stream(writer)?;
        self.run().await
    }

    async fn run_job(&mut self) -> Result<JobOutput> {
        if !self.outputs.iter().any(|o| o.target.is_set()) {
            return Err(Error::config("No output specified"));
        }
        if self.inputs.iter().any(|i| i.source.is_stream()) && self.input_stream.is_none() {
            return Err(Error::config("Input stream was consumed by a previous run"));
        }
        if self.outputs.iter().any(|o| o.target.is_stream()) && self.output_stream.is_none() {
            return Err(Error::config("Output stream was consumed by a previous run"));
        }

        let encoders = self.check_capabilities().await?;

        let duration = match self.events {
            Some(_) => self.first_input_duration().await,
            None => None,
        };

        let flv_targets = self.flv_metadata_targets();
        let flvtool = if flv_targets.is_empty() {
            None
        } else {
            Some(self.tools.flvtool_path()?)
        };

        let ffmpeg = self.tools.ffmpeg_path()?;
        let args = add_strict_experimental(&self.arguments(), &encoders);
        let spec = ProcessSpec {
            program: ffmpeg,
            args,
            niceness: self.niceness,
            working_dir: self.working_dir.clone(),
            timeout: self.timeout,
            log_lines: self.log_lines,
            stdin: self.input_stream.take(),
            stdout: self.output_stream.take(),
            duration,
            events: self.events.clone(),
        };
        let outcome = process::run(spec, &self.control).await?;

        if let (false, Some(tool)) = (outcome.killed, flvtool) {
            for target in &flv_targets {
                tracing::info!("Updating FLV metadata of {}", target.display());
                ToolCommand::new(tool.clone())
                    .args(["-U".to_string(), target.to_string_lossy().into_owned()])
                    .execute()
                    .await?;
            }
        }

        tracing::info!("ffmpeg job finished");
        Ok(outcome)
    }

    async fn check_capabilities(&self) -> Result<Arc<Encoders>> {
        let request = self.capability_request();
        let formats = if request.needs_formats() {
            self.tools.formats().await?
        } else {
            Arc::default()
        };
        let encoders = self.tools.encoders().await?;
        capabilities::check(&request, &formats, &encoders)?;
        Ok(encoders)
    }

    /// Probe the duration of the first input for progress percentages.
    /// Failures are only logged.
    async fn first_input_duration(&mut self) -> Option<f64> {
        if !self.inputs.first()?.source.is_file() {
            return None;
        }
        match self.probe(Some(0), &[]).await {
            Ok(data) => data.duration(),
            Err(e) => {
                tracing::debug!("Could not probe input duration: {e}");
                None
            }
        }
    }

    /// Paths of the outputs flagged for an FLV metadata update. The flag is
    /// dropped from non-file outputs.
    fn flv_metadata_targets(&mut self) -> Vec<PathBuf> {
        let mut targets = Vec::new();
        for output in self.outputs.iter_mut().filter(|o| o.update_flv_metadata) {
            match output.target.path() {
                Some(path) => targets.push(match self.working_dir {
                    Some(ref dir) => dir.join(path),
                    None => PathBuf::from(path),
                }),
                None => {
                    tracing::warn!("Updating flv metadata is only supported for files");
                    output.update_flv_metadata = false;
                }
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fw_filter::FilterNode;

    #[test]
    fn split_options_rule() {
        assert_eq!(
            split_options(["-crf 23", "-preset", "-x 1 2"]),
            ["-crf", "23", "-preset", "-x 1 2"]
        );
    }

    #[test]
    fn end_to_end_argument_order() {
        let mut cmd = Command::from_input("in.mov");
        cmd.video_codec("libx264").audio_codec("aac").output("out.mp4");

        let args = cmd.arguments();
        assert_eq!(
            args,
            ["-i", "in.mov", "-y", "-acodec", "aac", "-vcodec", "libx264", "out.mp4"]
        );
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let mut cmd = Command::from_input("in.mp4");
        cmd.input_format("mp4").unwrap();
        cmd.size("320x240")
            .unwrap()
            .audio_filters(["volume=2"])
            .output("a.mp4");
        assert_eq!(cmd.arguments(), cmd.arguments());
    }

    #[test]
    fn adding_an_output_appends_only_its_tokens() {
        let mut cmd = Command::from_input("in.mp4");
        cmd.output("a.mp4");
        let before = cmd.arguments();

        cmd.output("b.webm").video_codec("libvpx").no_audio();
        let after = cmd.arguments();

        assert_eq!(&after[..before.len()], before.as_slice());
        assert_eq!(&after[before.len()..], ["-an", "-vcodec", "libvpx", "b.webm"]);
    }

    #[test]
    fn filter_chains_are_joined() {
        let mut cmd = Command::from_input("in.mp4");
        cmd.audio_filters(["volume=0.5", "aecho=0.8:0.9:1000:0.3"])
            .video_filters(["hflip"])
            .size("640x?")
            .unwrap()
            .output("out.mp4");

        let args = cmd.arguments();
        let a = args.iter().position(|t| t == "-filter:a").unwrap();
        assert_eq!(args[a + 1], "volume=0.5,aecho=0.8:0.9:1000:0.3");
        let v = args.iter().position(|t| t == "-filter:v").unwrap();
        assert_eq!(args[v + 1], "hflip,scale=w=640:h=trunc(ow/a/2)*2");
    }

    #[test]
    fn complex_filter_comes_before_global_options() {
        let mut cmd = Command::new();
        cmd.input("a.mp4").input("b.mp4");
        cmd.global_options(["-hide_banner"]);
        cmd.complex_filter(["[0:v][1:v]hstack"], Vec::<&str>::new());
        cmd.complex_filter(
            [FilterNode::new("overlay").inputs(["0:v", "1:v"]).output("out")],
            ["out"],
        );
        cmd.output("out.mp4");

        assert_eq!(
            cmd.arguments(),
            [
                "-i",
                "a.mp4",
                "-i",
                "b.mp4",
                "-filter_complex",
                "[0:v][1:v]overlay[out]",
                "-map",
                "[out]",
                "-hide_banner",
                "-y",
                "out.mp4"
            ]
        );
    }

    #[test]
    fn bare_default_output_is_dropped_with_a_complex_filter() {
        let mut cmd = Command::from_input("in.mp4");
        cmd.complex_filter(["split=2[a][b]"], ["a"]);
        assert_eq!(
            cmd.arguments(),
            ["-i", "in.mp4", "-filter_complex", "split=2[a][b]", "-map", "[a]"]
        );

        let plain = Command::from_input("in.mp4");
        assert_eq!(plain.arguments(), ["-i", "in.mp4", "pipe:1"]);
    }

    #[test]
    fn stream_endpoints() {
        let mut cmd = Command::new();
        cmd.input_stream(Box::new(std::io::Cursor::new(Vec::new())))
            .unwrap()
            .format("mp3")
            .output_stream(Box::new(tokio::io::sink()))
            .unwrap();
        assert_eq!(cmd.arguments(), ["-i", "pipe:0", "-f", "mp3", "pipe:1"]);
    }

    #[test]
    fn capability_request_collects_formats_and_codecs() {
        let mut cmd = Command::from_input("in.raw");
        cmd.input_format("rawvideo").unwrap();
        cmd.format("matroska")
            .audio_codec("copy")
            .video_codec("libx265")
            .output("a.mkv");
        cmd.output("b.mp4").audio_codec("aac");

        let request = cmd.capability_request();
        assert_eq!(request.input_formats, ["rawvideo"]);
        assert_eq!(request.output_formats, ["matroska"]);
        assert_eq!(request.audio_codecs, ["copy", "aac"]);
        assert_eq!(request.video_codecs, ["libx265"]);
        assert!(request.needs_formats());
    }

    #[test]
    fn config_defaults_apply() {
        let mut config = Config::default();
        config.job.timeout_secs = Some(30);
        config.job.niceness = 99;
        config.job.log_lines = 0;

        let cmd = Command::with_config(&config);
        assert_eq!(cmd.timeout, Some(Duration::from_secs(30)));
        assert_eq!(cmd.niceness, 20);
        assert_eq!(cmd.log_lines, 0);
        assert!(!Arc::ptr_eq(cmd.tool_cache(), &ToolCache::global()));
    }

    #[test]
    fn custom_preset() {
        let mut cmd = Command::from_input("in.wav");
        cmd.preset_with(|c| {
            c.audio_codec("libopus").audio_bitrate(64);
            Ok(())
        })
        .unwrap();
        assert_eq!(cmd.outputs[0].audio.get(), ["-acodec", "libopus", "-b:a", "64k"]);
    }

    #[tokio::test]
    async fn run_without_output_fails_before_spawn() {
        let mut cmd = Command::from_input("in.mp4");
        cmd.audio_codec("aac");
        let err = cmd.run().await.unwrap_err();
        assert_eq!(err.to_string(), "No output specified");
        assert_eq!(err.category(), fw_core::ErrorCategory::Configuration);
    }

    #[test]
    fn each_job_has_its_own_id() {
        assert_ne!(Command::new().job_id(), Command::new().job_id());
    }
}
