//! Shared test harness for integration tests.
//!
//! Provides [`FakeTools`], which writes stand-in `ffmpeg`, `ffprobe` and
//! `flvmeta` shell scripts into a temporary directory and builds
//! [`Command`]s wired to them. The fake ffmpeg answers capability queries
//! from fixed tables and records the argument vector of every job it runs.

#![allow(dead_code)]

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use ffwright::fw_core::config::ToolsConfig;
use ffwright::{Command, JobEvent, ToolCache};
use tempfile::TempDir;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

pub const FORMATS: &str = "\
File formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
 DE avi             AVI (Audio Video Interleaved)
 DE flv             FLV (Flash Video)
 D  mov,mp4,m4a,3gp,3g2,mj2 QuickTime / MOV
  E mp4             MP4 (MPEG-4 Part 14)
  E image2          image2 sequence
 DE matroska,webm   Matroska / WebM";

pub const ENCODERS: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D mpeg4                MPEG-4 part 2
 V....D png                  PNG (Portable Network Graphics) image
 A....D aac                  AAC (Advanced Audio Coding)
 A..X.D opus                 Opus
 A....D libmp3lame           libmp3lame MP3 (MPEG audio layer 3) (codec mp3)";

/// A 640x360 ten second clip with one audio stream.
pub const CLIP_REPORT: &str = "\
[STREAM]
index=0
codec_name=h264
codec_type=video
width=640
height=360
duration=10.000000
[/STREAM]
[STREAM]
index=1
codec_name=aac
codec_type=audio
duration=10.000000
[/STREAM]
[FORMAT]
format_name=mov,mp4,m4a,3gp,3g2,mj2
duration=10.000000
[/FORMAT]";

/// Startup diagnostics followed by two progress reports.
pub const TRANSCODE_STDERR: &str = "\
printf 'ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers\\n' >&2
printf \"Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mp4':\\n\" >&2
printf '  Duration: 00:00:10.00, start: 0.000000, bitrate: 1205 kb/s\\n' >&2
printf '  Stream #0:0(und): Video: h264 (High), yuv420p, 640x360, 25 fps\\n' >&2
printf '  Stream #0:1(und): Audio: aac (LC), 44100 Hz, stereo, fltp\\n' >&2
printf \"Output #0, mp4, to 'out.mp4':\\n\" >&2
printf 'size=  10kB time=00:00:05.00 bitrate= 16.0kbits/s\\r' >&2
printf 'size=  20kB time=00:00:10.00 bitrate= 16.0kbits/s\\n' >&2";

/// Fake tool executables living in a temporary directory.
pub struct FakeTools {
    pub dir: TempDir,
}

impl FakeTools {
    /// Fake tools whose ffmpeg job runs `body` after recording its
    /// arguments, and whose ffprobe prints [`CLIP_REPORT`].
    pub fn new(body: &str) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let tools = Self { dir };
        tools.write_ffmpeg(body);
        tools.write_ffprobe(CLIP_REPORT);
        tools.write_script(
            "flvmeta",
            &format!("printf '%s\\n' \"$@\" > '{}'", tools.path("flvmeta.args").display()),
        );
        tools
    }

    /// Replace the report printed by ffprobe.
    pub fn write_ffprobe(&self, report: &str) {
        self.write_script("ffprobe", &format!("cat <<'REPORT'\n{report}\nREPORT"));
    }

    fn write_ffmpeg(&self, body: &str) {
        let script = format!(
            "case \"$*\" in\n\
             *-formats*) cat <<'TABLE'\n{FORMATS}\nTABLE\nexit 0 ;;\n\
             *-encoders*) cat <<'TABLE'\n{ENCODERS}\nTABLE\nexit 0 ;;\n\
             *-version*) echo 'ffmpeg version 6.1.1 Copyright (c) 2000-2023'; exit 0 ;;\n\
             esac\n\
             printf '%s\\n' \"$@\" > '{args}'\n\
             {body}",
            args = self.path("ffmpeg.args").display(),
        );
        self.write_script("ffmpeg", &script);
    }

    fn write_script(&self, name: &str, body: &str) {
        let path = self.path(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to make script executable");
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn tools_config(&self) -> ToolsConfig {
        ToolsConfig {
            ffmpeg_path: Some(self.path("ffmpeg")),
            ffprobe_path: Some(self.path("ffprobe")),
            flvtool_path: Some(self.path("flvmeta")),
        }
    }

    /// A command reading `input`, resolving tools to the fakes.
    pub fn command(&self, input: &str) -> Command {
        let mut cmd = Command::from_input(input);
        cmd.with_tool_cache(Arc::new(ToolCache::new(self.tools_config())));
        cmd
    }

    /// Arguments of the last ffmpeg job, if one ran.
    pub fn ffmpeg_args(&self) -> Option<Vec<String>> {
        read_lines(&self.path("ffmpeg.args"))
    }

    /// Arguments of the last flvmeta run, if one ran.
    pub fn flvmeta_args(&self) -> Option<Vec<String>> {
        read_lines(&self.path("flvmeta.args"))
    }
}

fn read_lines(path: &Path) -> Option<Vec<String>> {
    let text = std::fs::read_to_string(path).ok()?;
    Some(text.lines().map(str::to_string).collect())
}

/// Drain every event sent so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Writer collecting everything into a shared buffer.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().expect("buffer lock poisoned").clone()
    }
}

impl AsyncWrite for SharedBuf {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().expect("buffer lock poisoned").extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
