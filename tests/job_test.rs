//! End-to-end job tests against fake tool executables.

#![cfg(unix)]

mod common;

use std::io::Cursor;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{drain, FakeTools, SharedBuf, TRANSCODE_STDERR};
use ffwright::fw_core::config::ToolsConfig;
use ffwright::{Error, ErrorCategory, JobEvent, Preset, ToolCache};
use serial_test::serial;

#[tokio::test]
async fn transcode_runs_with_events() {
    let tools = FakeTools::new(TRANSCODE_STDERR);
    let out = tools.path("out.mp4");
    let out = out.to_str().unwrap();

    let mut cmd = tools.command("in.mp4");
    let mut rx = cmd.subscribe();
    cmd.audio_codec("aac").video_codec("libx264");
    let outcome = cmd.save(out).await.unwrap();
    assert!(!outcome.killed);
    assert!(outcome.stderr.contains("Output #0"));

    assert_eq!(
        tools.ffmpeg_args().unwrap(),
        ["-i", "in.mp4", "-y", "-acodec", "aac", "-vcodec", "libx264", out]
    );

    let events = drain(&mut rx);
    assert_matches!(&events[0], JobEvent::Start { command_line } if command_line.contains("-vcodec libx264"));

    let codec_data: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::CodecData { inputs } => Some(inputs),
            _ => None,
        })
        .collect();
    assert_eq!(codec_data.len(), 1);
    assert_eq!(codec_data[0][0].format, "mov,mp4,m4a,3gp,3g2,mj2");
    assert_eq!(codec_data[0][0].video, "h264 (High)");
    assert_eq!(codec_data[0][0].audio, "aac (LC)");

    let percents: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress(p) => p.percent,
            _ => None,
        })
        .collect();
    assert_eq!(percents, [50.0, 100.0]);
}

#[tokio::test]
async fn experimental_encoder_gets_strict_flag() {
    let tools = FakeTools::new("exit 0");
    let out = tools.path("out.mka");

    let mut cmd = tools.command("in.mp4");
    cmd.no_video().audio_codec("opus");
    cmd.save(out.to_str().unwrap()).await.unwrap();

    let args = tools.ffmpeg_args().unwrap();
    let codec = args.iter().position(|a| a == "opus").unwrap();
    assert_eq!(args[codec + 1..codec + 3], ["-strict", "experimental"]);
}

#[tokio::test]
async fn unavailable_capabilities_fail_before_spawn() {
    let tools = FakeTools::new("exit 0");

    let mut cmd = tools.command("in.mp4");
    cmd.format("nope");
    let err = cmd.save("out.nope").await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Capability);
    assert_eq!(err.to_string(), "Output format nope is not available");

    let mut cmd = tools.command("in.mp4");
    cmd.audio_codec("vorbis").video_codec("hevc_magic");
    let err = cmd.save("out.mkv").await.unwrap_err();
    assert_eq!(err.to_string(), "Audio codec vorbis is not available");

    assert!(tools.ffmpeg_args().is_none());
}

#[tokio::test]
async fn nonzero_exit_reports_stderr() {
    let tools = FakeTools::new("echo 'out.mp4: Invalid argument' >&2; exit 1");

    let mut cmd = tools.command("in.mp4");
    let err = cmd.save("out.mp4").await.unwrap_err();
    assert_matches!(&err, Error::Process { message, .. } if message == "ffmpeg exited with code 1: out.mp4: Invalid argument");
    assert_eq!(err.stderr(), Some("out.mp4: Invalid argument\n"));
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let tools = FakeTools::new("echo 'frame=1' >&2; exec sleep 10");

    let mut cmd = tools.command("in.mp4");
    cmd.timeout(Duration::from_millis(300));
    let err = cmd.save("out.mp4").await.unwrap_err();
    assert_matches!(err, Error::Timeout { .. });
    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert!(err.to_string().starts_with("process ran into a timeout"));
}

#[tokio::test]
async fn kill_resolves_as_killed() {
    let tools = FakeTools::new("exec sleep 10");

    let mut cmd = tools.command("in.mp4");
    let control = cmd.control();
    let killer = tokio::spawn(async move {
        for _ in 0..250 {
            if control.is_running() {
                return control.kill();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    });

    let outcome = cmd.save("out.mp4").await.unwrap();
    assert!(killer.await.unwrap());
    assert!(outcome.killed);
}

#[tokio::test]
async fn streams_are_piped_through() {
    let tools = FakeTools::new("cat");

    let sink = SharedBuf::default();
    let mut cmd = ffwright::Command::new();
    cmd.with_tool_cache(std::sync::Arc::new(ToolCache::new(tools.tools_config())));
    cmd.input_stream(Box::new(Cursor::new(b"frames".to_vec())))
        .unwrap()
        .input_format("avi")
        .unwrap()
        .format("matroska");
    cmd.pipe(Box::new(sink.clone())).await.unwrap();

    assert_eq!(sink.contents(), b"frames");
    assert_eq!(
        tools.ffmpeg_args().unwrap(),
        ["-f", "avi", "-i", "pipe:0", "-f", "matroska", "pipe:1"]
    );

    let err = cmd.run().await.unwrap_err();
    assert_eq!(err.to_string(), "Input stream was consumed by a previous run");
}

#[tokio::test]
async fn flv_metadata_is_updated_after_the_run() {
    let tools = FakeTools::new("exit 0");
    let out = tools.path("out.flv");
    let out = out.to_str().unwrap();

    let mut cmd = tools.command("in.mp4");
    cmd.preset(Preset::FlashVideo).unwrap();
    cmd.save(out).await.unwrap();

    assert_eq!(tools.flvmeta_args().unwrap(), ["-U", out]);
}

#[tokio::test]
async fn missing_output_is_a_configuration_error() {
    let tools = FakeTools::new("exit 0");
    let mut cmd = tools.command("in.mp4");
    cmd.audio_codec("aac");
    let err = cmd.run().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(err.to_string(), "No output specified");
    assert!(tools.ffmpeg_args().is_none());
}

#[tokio::test]
#[serial]
async fn ffmpeg_path_from_environment() {
    let tools = FakeTools::new("exit 0");
    std::env::set_var("FFMPEG_PATH", tools.path("ffmpeg"));

    let cache = ToolCache::new(ToolsConfig::default());
    let resolved = cache.ffmpeg_path();
    let version = cache.version().await;
    std::env::remove_var("FFMPEG_PATH");

    assert_eq!(resolved.unwrap(), tools.path("ffmpeg"));
    assert_eq!(version.unwrap().raw, "6.1.1");
}

#[tokio::test]
#[serial]
async fn configured_path_beats_environment() {
    let tools = FakeTools::new("exit 0");
    let other = FakeTools::new("exit 0");
    std::env::set_var("FFMPEG_PATH", other.path("ffmpeg"));

    let cache = ToolCache::new(tools.tools_config());
    let resolved = cache.ffmpeg_path();
    std::env::remove_var("FFMPEG_PATH");

    assert_eq!(resolved.unwrap(), tools.path("ffmpeg"));
}

#[tokio::test]
async fn tool_report_lists_fakes() {
    let tools = FakeTools::new("exit 0");
    let cache = ToolCache::new(tools.tools_config());
    let report = cache.report().await;

    assert_eq!(report.len(), 3);
    assert_eq!(report[0].name, "ffmpeg");
    assert!(report[0].available);
    assert_eq!(report[0].version.as_deref(), Some("6.1.1"));
    assert_eq!(report[2].name, "flvmeta");
    assert_eq!(report[2].path.as_deref(), Some(tools.path("flvmeta").as_path()));
}
