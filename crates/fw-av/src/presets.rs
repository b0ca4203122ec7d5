//! Built-in output presets.

use std::fmt;
use std::str::FromStr;

use fw_core::{Error, Result};

use crate::job::Command;

/// A named bundle of output settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// MPEG-4 video with MP3 audio in AVI, tagged DIVX.
    Divx,
    /// Small H.264/AAC FLV with fixed-up metadata.
    FlashVideo,
    /// 320x176 H.264/AAC M4V for podcast players.
    Podcast,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Divx => "divx",
            Preset::FlashVideo => "flashvideo",
            Preset::Podcast => "podcast",
        }
    }

    /// Apply the preset to the current output of `cmd`.
    pub fn apply(self, cmd: &mut Command) -> Result<()> {
        tracing::debug!("Applying preset {}", self.name());
        match self {
            Preset::Divx => {
                cmd.format("avi")
                    .video_bitrate("1024k", false)
                    .video_codec("mpeg4")
                    .size("720x?")?
                    .audio_bitrate("128k")
                    .audio_channels(2)
                    .audio_codec("libmp3lame")
                    .output_options(["-vtag DIVX"]);
            }
            Preset::FlashVideo => {
                cmd.format("flv")
                    .update_flv_metadata()
                    .size("320x?")?
                    .video_bitrate("512k", false)
                    .video_codec("libx264")
                    .fps(24.0)
                    .audio_bitrate("96k")
                    .audio_codec("aac")
                    .audio_frequency(22050)
                    .audio_channels(2);
            }
            Preset::Podcast => {
                cmd.format("m4v")
                    .video_bitrate("512k", false)
                    .video_codec("libx264")
                    .size("320x176")?
                    .audio_bitrate("128k")
                    .audio_codec("aac")
                    .audio_channels(1)
                    .output_options([
                        "-flags",
                        "+loop",
                        "-cmp",
                        "+chroma",
                        "-partitions",
                        "+parti4x4+partp8x8+partb8x8",
                        "-flags2",
                        "+mixed_refs",
                        "-me_method umh",
                        "-subq 5",
                        "-bufsize 2M",
                        "-rc_eq 'blurCplx^(1-qComp)'",
                        "-qcomp 0.6",
                        "-qmin 10",
                        "-qmax 51",
                        "-qdiff 4",
                        "-level 13",
                    ]);
            }
        }
        Ok(())
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "divx" => Ok(Preset::Divx),
            "flashvideo" => Ok(Preset::FlashVideo),
            "podcast" => Ok(Preset::Podcast),
            _ => Err(Error::config(format!("preset {s} could not be loaded"))),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
