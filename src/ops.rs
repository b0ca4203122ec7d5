//! Operation names and their aliases.
//!
//! The engine exposes one method per concept. Callers that describe jobs by
//! name (configuration files, scripting layers, code written against older
//! naming schemes) go through [`OpName::from_alias`] and [`apply`], which map
//! every accepted spelling to the canonical operation.

use std::fmt;
use std::str::FromStr;

use fw_av::{Command, Preset};
use fw_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Canonical operation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpName {
    // Inputs
    Input,
    InputFormat,
    InputFps,
    NativeFramerate,
    SeekInput,
    LoopInput,
    InputOptions,
    // Audio
    NoAudio,
    AudioCodec,
    AudioBitrate,
    AudioChannels,
    AudioFrequency,
    AudioQuality,
    AudioFilters,
    // Video
    NoVideo,
    VideoCodec,
    VideoBitrate,
    VideoFilters,
    Fps,
    Frames,
    // Size
    Size,
    Aspect,
    Autopad,
    KeepDisplayAspect,
    // Outputs
    Output,
    Duration,
    Seek,
    Format,
    Map,
    UpdateFlvMetadata,
    OutputOptions,
    // Misc
    GlobalOptions,
    ComplexFilter,
    Preset,
    // Process control and execution
    Renice,
    Kill,
    Run,
    Save,
    Pipe,
    Probe,
    Screenshots,
    Merge,
}

/// Every accepted spelling besides the canonical snake_case name.
const ALIASES: &[(&str, OpName)] = &[
    ("addInput", OpName::Input),
    ("mergeAdd", OpName::Input),
    ("inputFormat", OpName::InputFormat),
    ("withInputFormat", OpName::InputFormat),
    ("fromFormat", OpName::InputFormat),
    ("inputFps", OpName::InputFps),
    ("inputFPS", OpName::InputFps),
    ("withInputFps", OpName::InputFps),
    ("withInputFPS", OpName::InputFps),
    ("withFpsInput", OpName::InputFps),
    ("withFPSInput", OpName::InputFps),
    ("fpsInput", OpName::InputFps),
    ("FPSInput", OpName::InputFps),
    ("nativeFramerate", OpName::NativeFramerate),
    ("withNativeFramerate", OpName::NativeFramerate),
    ("native", OpName::NativeFramerate),
    ("seekInput", OpName::SeekInput),
    ("setStartTime", OpName::SeekInput),
    ("seekTo", OpName::SeekInput),
    ("loop", OpName::LoopInput),
    ("inputOptions", OpName::InputOptions),
    ("inputOption", OpName::InputOptions),
    ("addInputOption", OpName::InputOptions),
    ("addInputOptions", OpName::InputOptions),
    ("withInputOption", OpName::InputOptions),
    ("withInputOptions", OpName::InputOptions),
    ("noAudio", OpName::NoAudio),
    ("withNoAudio", OpName::NoAudio),
    ("audioCodec", OpName::AudioCodec),
    ("withAudioCodec", OpName::AudioCodec),
    ("acodec", OpName::AudioCodec),
    ("audioBitrate", OpName::AudioBitrate),
    ("withAudioBitrate", OpName::AudioBitrate),
    ("audioChannels", OpName::AudioChannels),
    ("withAudioChannels", OpName::AudioChannels),
    ("audioFrequency", OpName::AudioFrequency),
    ("withAudioFrequency", OpName::AudioFrequency),
    ("audioQuality", OpName::AudioQuality),
    ("withAudioQuality", OpName::AudioQuality),
    ("audioFilters", OpName::AudioFilters),
    ("audioFilter", OpName::AudioFilters),
    ("withAudioFilter", OpName::AudioFilters),
    ("withAudioFilters", OpName::AudioFilters),
    ("noVideo", OpName::NoVideo),
    ("withNoVideo", OpName::NoVideo),
    ("videoCodec", OpName::VideoCodec),
    ("withVideoCodec", OpName::VideoCodec),
    ("vcodec", OpName::VideoCodec),
    ("videoBitrate", OpName::VideoBitrate),
    ("withVideoBitrate", OpName::VideoBitrate),
    ("videoFilters", OpName::VideoFilters),
    ("videoFilter", OpName::VideoFilters),
    ("withVideoFilter", OpName::VideoFilters),
    ("withVideoFilters", OpName::VideoFilters),
    ("withOutputFps", OpName::Fps),
    ("withOutputFPS", OpName::Fps),
    ("withFpsOutput", OpName::Fps),
    ("withFPSOutput", OpName::Fps),
    ("withFps", OpName::Fps),
    ("withFPS", OpName::Fps),
    ("outputFPS", OpName::Fps),
    ("outputFps", OpName::Fps),
    ("fpsOutput", OpName::Fps),
    ("FPSOutput", OpName::Fps),
    ("FPS", OpName::Fps),
    ("takeFrames", OpName::Frames),
    ("withFrames", OpName::Frames),
    ("videoSize", OpName::Size),
    ("withSize", OpName::Size),
    ("setSize", OpName::Size),
    ("withAspect", OpName::Aspect),
    ("withAspectRatio", OpName::Aspect),
    ("setAspect", OpName::Aspect),
    ("setAspectRatio", OpName::Aspect),
    ("aspectRatio", OpName::Aspect),
    ("applyAutopadding", OpName::Autopad),
    ("applyAutoPadding", OpName::Autopad),
    ("applyAutopad", OpName::Autopad),
    ("applyAutoPad", OpName::Autopad),
    ("withAutopadding", OpName::Autopad),
    ("withAutoPadding", OpName::Autopad),
    ("withAutopad", OpName::Autopad),
    ("withAutoPad", OpName::Autopad),
    ("autoPad", OpName::Autopad),
    ("keepDAR", OpName::KeepDisplayAspect),
    ("keepPixelAspect", OpName::KeepDisplayAspect),
    ("keepDisplayAspect", OpName::KeepDisplayAspect),
    ("keepDisplayAspectRatio", OpName::KeepDisplayAspect),
    ("addOutput", OpName::Output),
    ("withDuration", OpName::Duration),
    ("setDuration", OpName::Duration),
    ("seekOutput", OpName::Seek),
    ("withOutputFormat", OpName::Format),
    ("toFormat", OpName::Format),
    ("outputFormat", OpName::Format),
    ("flvmeta", OpName::UpdateFlvMetadata),
    ("updateFlvMetadata", OpName::UpdateFlvMetadata),
    ("outputOptions", OpName::OutputOptions),
    ("outputOption", OpName::OutputOptions),
    ("addOutputOption", OpName::OutputOptions),
    ("addOutputOptions", OpName::OutputOptions),
    ("addOption", OpName::OutputOptions),
    ("addOptions", OpName::OutputOptions),
    ("withOutputOption", OpName::OutputOptions),
    ("withOutputOptions", OpName::OutputOptions),
    ("withOption", OpName::OutputOptions),
    ("withOptions", OpName::OutputOptions),
    ("globalOptions", OpName::GlobalOptions),
    ("globalOption", OpName::GlobalOptions),
    ("complexFilter", OpName::ComplexFilter),
    ("filterGraph", OpName::ComplexFilter),
    ("usingPreset", OpName::Preset),
    ("exec", OpName::Run),
    ("execute", OpName::Run),
    ("saveToFile", OpName::Save),
    ("stream", OpName::Pipe),
    ("writeToStream", OpName::Pipe),
    ("ffprobe", OpName::Probe),
    ("screenshot", OpName::Screenshots),
    ("takeScreenshots", OpName::Screenshots),
    ("thumbnail", OpName::Screenshots),
    ("thumbnails", OpName::Screenshots),
    ("mergeToFile", OpName::Merge),
    ("concatenate", OpName::Merge),
    ("concat", OpName::Merge),
];

impl OpName {
    pub const ALL: &'static [OpName] = &[
        OpName::Input,
        OpName::InputFormat,
        OpName::InputFps,
        OpName::NativeFramerate,
        OpName::SeekInput,
        OpName::LoopInput,
        OpName::InputOptions,
        OpName::NoAudio,
        OpName::AudioCodec,
        OpName::AudioBitrate,
        OpName::AudioChannels,
        OpName::AudioFrequency,
        OpName::AudioQuality,
        OpName::AudioFilters,
        OpName::NoVideo,
        OpName::VideoCodec,
        OpName::VideoBitrate,
        OpName::VideoFilters,
        OpName::Fps,
        OpName::Frames,
        OpName::Size,
        OpName::Aspect,
        OpName::Autopad,
        OpName::KeepDisplayAspect,
        OpName::Output,
        OpName::Duration,
        OpName::Seek,
        OpName::Format,
        OpName::Map,
        OpName::UpdateFlvMetadata,
        OpName::OutputOptions,
        OpName::GlobalOptions,
        OpName::ComplexFilter,
        OpName::Preset,
        OpName::Renice,
        OpName::Kill,
        OpName::Run,
        OpName::Save,
        OpName::Pipe,
        OpName::Probe,
        OpName::Screenshots,
        OpName::Merge,
    ];

    /// The canonical snake_case name.
    pub fn name(self) -> &'static str {
        match self {
            OpName::Input => "input",
            OpName::InputFormat => "input_format",
            OpName::InputFps => "input_fps",
            OpName::NativeFramerate => "native_framerate",
            OpName::SeekInput => "seek_input",
            OpName::LoopInput => "loop_input",
            OpName::InputOptions => "input_options",
            OpName::NoAudio => "no_audio",
            OpName::AudioCodec => "audio_codec",
            OpName::AudioBitrate => "audio_bitrate",
            OpName::AudioChannels => "audio_channels",
            OpName::AudioFrequency => "audio_frequency",
            OpName::AudioQuality => "audio_quality",
            OpName::AudioFilters => "audio_filters",
            OpName::NoVideo => "no_video",
            OpName::VideoCodec => "video_codec",
            OpName::VideoBitrate => "video_bitrate",
            OpName::VideoFilters => "video_filters",
            OpName::Fps => "fps",
            OpName::Frames => "frames",
            OpName::Size => "size",
            OpName::Aspect => "aspect",
            OpName::Autopad => "autopad",
            OpName::KeepDisplayAspect => "keep_display_aspect",
            OpName::Output => "output",
            OpName::Duration => "duration",
            OpName::Seek => "seek",
            OpName::Format => "format",
            OpName::Map => "map",
            OpName::UpdateFlvMetadata => "update_flv_metadata",
            OpName::OutputOptions => "output_options",
            OpName::GlobalOptions => "global_options",
            OpName::ComplexFilter => "complex_filter",
            OpName::Preset => "preset",
            OpName::Renice => "renice",
            OpName::Kill => "kill",
            OpName::Run => "run",
            OpName::Save => "save",
            OpName::Pipe => "pipe",
            OpName::Probe => "probe",
            OpName::Screenshots => "screenshots",
            OpName::Merge => "merge",
        }
    }

    /// Resolve a canonical name or any alias.
    pub fn from_alias(name: &str) -> Option<OpName> {
        OpName::ALL
            .iter()
            .copied()
            .find(|op| op.name() == name)
            .or_else(|| {
                ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == name)
                    .map(|(_, op)| *op)
            })
    }

    /// Operations that spawn processes or act on a running job, which
    /// [`apply`] does not perform.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OpName::Renice
                | OpName::Kill
                | OpName::Run
                | OpName::Save
                | OpName::Pipe
                | OpName::Probe
                | OpName::Screenshots
                | OpName::Merge
        )
    }
}

impl FromStr for OpName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OpName::from_alias(s).ok_or_else(|| Error::config(format!("Unknown operation: {s}")))
    }
}

impl fmt::Display for OpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn arg<'a>(op: OpName, args: &[&'a str], index: usize) -> Result<&'a str> {
    args.get(index)
        .copied()
        .ok_or_else(|| Error::config(format!("{op} expects at least {} argument(s)", index + 1)))
}

fn number<T: FromStr>(op: OpName, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::config(format!("Invalid argument for {op}: {value}")))
}

/// Apply a configuration operation, given by canonical name or alias, with
/// string arguments.
///
/// Execution and process-control operations are rejected; call them on the
/// [`Command`] or its [`fw_av::JobControl`] directly.
pub fn apply(cmd: &mut Command, name: &str, args: &[&str]) -> Result<()> {
    let op: OpName = name.parse()?;
    tracing::debug!("Applying {op} (as {name}) with {args:?}");

    match op {
        OpName::Input => {
            cmd.input(arg(op, args, 0)?);
        }
        OpName::InputFormat => {
            cmd.input_format(arg(op, args, 0)?)?;
        }
        OpName::InputFps => {
            cmd.input_fps(number(op, arg(op, args, 0)?)?)?;
        }
        OpName::NativeFramerate => {
            cmd.native_framerate()?;
        }
        OpName::SeekInput => {
            cmd.seek_input(arg(op, args, 0)?)?;
        }
        OpName::LoopInput => {
            cmd.loop_input(args.first().copied())?;
        }
        OpName::InputOptions => {
            cmd.input_options(args.iter().copied())?;
        }
        OpName::NoAudio => {
            cmd.no_audio();
        }
        OpName::AudioCodec => {
            cmd.audio_codec(arg(op, args, 0)?);
        }
        OpName::AudioBitrate => {
            cmd.audio_bitrate(arg(op, args, 0)?);
        }
        OpName::AudioChannels => {
            cmd.audio_channels(number(op, arg(op, args, 0)?)?);
        }
        OpName::AudioFrequency => {
            cmd.audio_frequency(number(op, arg(op, args, 0)?)?);
        }
        OpName::AudioQuality => {
            cmd.audio_quality(arg(op, args, 0)?);
        }
        OpName::AudioFilters => {
            cmd.audio_filters(args.iter().copied());
        }
        OpName::NoVideo => {
            cmd.no_video();
        }
        OpName::VideoCodec => {
            cmd.video_codec(arg(op, args, 0)?);
        }
        OpName::VideoBitrate => {
            let constant = match args.get(1) {
                Some(flag) => number::<bool>(op, flag)?,
                None => false,
            };
            cmd.video_bitrate(arg(op, args, 0)?, constant);
        }
        OpName::VideoFilters => {
            cmd.video_filters(args.iter().copied());
        }
        OpName::Fps => {
            cmd.fps(number(op, arg(op, args, 0)?)?);
        }
        OpName::Frames => {
            cmd.frames(number(op, arg(op, args, 0)?)?);
        }
        OpName::Size => {
            cmd.size(arg(op, args, 0)?)?;
        }
        OpName::Aspect => {
            cmd.aspect(arg(op, args, 0)?)?;
        }
        OpName::Autopad => {
            cmd.autopad(args.first().copied())?;
        }
        OpName::KeepDisplayAspect => {
            cmd.keep_display_aspect();
        }
        OpName::Output => {
            cmd.output(arg(op, args, 0)?);
        }
        OpName::Duration => {
            cmd.duration(arg(op, args, 0)?);
        }
        OpName::Seek => {
            cmd.seek(arg(op, args, 0)?);
        }
        OpName::Format => {
            cmd.format(arg(op, args, 0)?);
        }
        OpName::Map => {
            cmd.map(arg(op, args, 0)?);
        }
        OpName::UpdateFlvMetadata => {
            cmd.update_flv_metadata();
        }
        OpName::OutputOptions => {
            cmd.output_options(args.iter().copied());
        }
        OpName::GlobalOptions => {
            cmd.global_options(args.iter().copied());
        }
        OpName::ComplexFilter => {
            // First argument is the graph, the rest are output maps.
            let graph = arg(op, args, 0)?;
            cmd.complex_filter([graph], args[1..].iter().copied());
        }
        OpName::Preset => {
            let preset: Preset = arg(op, args, 0)?.parse()?;
            cmd.preset(preset)?;
        }
        OpName::Renice
        | OpName::Kill
        | OpName::Run
        | OpName::Save
        | OpName::Pipe
        | OpName::Probe
        | OpName::Screenshots
        | OpName::Merge => {
            return Err(Error::config(format!(
                "{op} cannot be applied by name, call it on the command"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_one_operation() {
        for name in ["audio_codec", "audioCodec", "withAudioCodec", "acodec"] {
            assert_eq!(OpName::from_alias(name), Some(OpName::AudioCodec), "{name}");
        }
        assert_eq!(OpName::from_alias("thumbnails"), Some(OpName::Screenshots));
        assert_eq!(OpName::from_alias("concat"), Some(OpName::Merge));
        assert_eq!(OpName::from_alias("writeToStream"), Some(OpName::Pipe));
        assert_eq!(OpName::from_alias("keepDAR"), Some(OpName::KeepDisplayAspect));
        assert_eq!(OpName::from_alias("withAcodec"), None);
    }

    #[test]
    fn canonical_names_round_trip() {
        for op in OpName::ALL {
            assert_eq!(OpName::from_alias(op.name()), Some(*op));
            let json = serde_json::to_string(op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.name()));
        }
    }

    #[test]
    fn aliases_never_shadow_canonical_names() {
        for (alias, _) in ALIASES {
            assert!(OpName::ALL.iter().all(|op| op.name() != *alias), "{alias}");
        }
    }

    #[test]
    fn apply_by_alias_matches_direct_calls() {
        let mut by_name = Command::new();
        apply(&mut by_name, "addInput", &["in.avi"]).unwrap();
        apply(&mut by_name, "withAudioCodec", &["aac"]).unwrap();
        apply(&mut by_name, "withVideoBitrate", &["1000", "true"]).unwrap();
        apply(&mut by_name, "withSize", &["640x?"]).unwrap();
        apply(&mut by_name, "addOption", &["-crf 23"]).unwrap();
        apply(&mut by_name, "saveToFile", &["out.mp4"]).unwrap_err();
        apply(&mut by_name, "addOutput", &["out.mp4"]).unwrap();

        let mut direct = Command::from_input("in.avi");
        direct
            .audio_codec("aac")
            .video_bitrate("1000", true)
            .size("640x?")
            .unwrap()
            .output_options(["-crf 23"])
            .output("out.mp4");

        assert_eq!(by_name.arguments(), direct.arguments());
    }

    #[test]
    fn apply_rejects_bad_calls() {
        let mut cmd = Command::from_input("in.avi");
        let err = apply(&mut cmd, "withWobble", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation: withWobble");

        let err = apply(&mut cmd, "run", &[]).unwrap_err();
        assert_eq!(err.to_string(), "run cannot be applied by name, call it on the command");

        let err = apply(&mut cmd, "audioChannels", &["two"]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument for audio_channels: two");

        let err = apply(&mut cmd, "audioCodec", &[]).unwrap_err();
        assert_eq!(err.to_string(), "audio_codec expects at least 1 argument(s)");
    }

    #[test]
    fn apply_complex_filter_and_preset() {
        let mut cmd = Command::from_input("in.avi");
        apply(&mut cmd, "filterGraph", &["[0:v]split[a][b]", "a"]).unwrap();
        apply(&mut cmd, "usingPreset", &["podcast"]).unwrap();
        apply(&mut cmd, "output", &["out.m4v"]).unwrap();
        let args = cmd.arguments();
        let filter = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(args[filter + 1], "[0:v]split[a][b]");
        assert_eq!(args[filter + 2], "-map");
        assert_eq!(args[filter + 3], "[a]");
        assert!(args.contains(&"m4v".to_string()));
    }
}
