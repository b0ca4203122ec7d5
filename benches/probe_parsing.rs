//! Benchmarks for ffprobe report and ffmpeg stderr parsing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ffwright::fw_av::extract::{extract_error, extract_progress, CodecDataParser};
use ffwright::fw_probe::parse_probe_output;

/// Report for a plain two-stream file.
const REPORT_SIMPLE: &str = "\
[STREAM]
index=0
codec_name=h264
codec_type=video
width=1920
height=1080
r_frame_rate=24000/1001
duration=7200.000000
DISPOSITION:default=1
TAG:language=und
[/STREAM]
[STREAM]
index=1
codec_name=aac
codec_type=audio
channels=2
sample_rate=48000
duration=7200.000000
DISPOSITION:default=1
TAG:language=eng
[/STREAM]
[FORMAT]
filename=/movies/movie.mp4
format_name=mov,mp4,m4a,3gp,3g2,mj2
duration=7200.000000
size=4500000000
bit_rate=5000000
TAG:major_brand=isom
[/FORMAT]
";

/// Startup diagnostics of a transcode.
const STARTUP: &[&str] = &[
    "ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers",
    "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mp4':",
    "  Duration: 02:00:00.00, start: 0.000000, bitrate: 5000 kb/s",
    "  Stream #0:0(und): Video: h264 (High), yuv420p, 1920x1080, 23.98 fps",
    "  Stream #0:1(eng): Audio: aac (LC), 48000 Hz, stereo, fltp, 128 kb/s",
    "Stream mapping:",
    "Output #0, mp4, to 'out.mp4':",
];

const PROGRESS: &str =
    "frame= 2500 fps=120 q=28.0 size=   10240kB time=00:01:44.27 bitrate= 804.5kbits/s speed=5.01x";

fn complex_report() -> String {
    let mut report = String::new();
    for i in 0..24 {
        let kind = if i % 3 == 0 { "video" } else { "audio" };
        report.push_str(&format!(
            "[STREAM]\nindex={i}\ncodec_type={kind}\nwidth=1280\nheight=720\nduration=9000.0\nTAG:title=Track {i}\n[SIDE_DATA]\nside_data_type=ignored\n[/SIDE_DATA]\n[/STREAM]\n"
        ));
    }
    for i in 0..12 {
        report.push_str(&format!(
            "[CHAPTER]\nid={i}\nstart_time={}.0\nTAG:title=Chapter {i}\n[/CHAPTER]\n",
            i * 600
        ));
    }
    report.push_str("[FORMAT]\nformat_name=matroska,webm\nduration=9000.000000\n[/FORMAT]\n");
    report
}

fn bench_probe_reports(c: &mut Criterion) {
    let mut group = c.benchmark_group("probe_reports");
    let complex = complex_report();

    group.throughput(Throughput::Bytes(REPORT_SIMPLE.len() as u64));
    group.bench_with_input(BenchmarkId::new("parse", "simple"), &REPORT_SIMPLE, |b, report| {
        b.iter(|| parse_probe_output(black_box(report)));
    });

    group.throughput(Throughput::Bytes(complex.len() as u64));
    group.bench_with_input(BenchmarkId::new("parse", "complex"), &complex, |b, report| {
        b.iter(|| parse_probe_output(black_box(report)));
    });

    let data = parse_probe_output(&complex);
    group.bench_function("largest_video_stream", |b| {
        b.iter(|| black_box(&data).largest_video_stream());
    });

    group.finish();
}

fn bench_stderr(c: &mut Criterion) {
    let mut group = c.benchmark_group("stderr");

    group.bench_function("progress_line", |b| {
        b.iter(|| extract_progress(black_box(PROGRESS), Some(7200.0)));
    });

    group.bench_function("codec_data", |b| {
        b.iter(|| {
            let mut parser = CodecDataParser::new();
            STARTUP.iter().find_map(|line| parser.feed(black_box(line)))
        });
    });

    let log = STARTUP.join("\n") + "\nout.mp4: Invalid argument\n";
    group.bench_function("error_extract", |b| {
        b.iter(|| extract_error(black_box(&log)));
    });

    group.finish();
}

criterion_group!(benches, bench_probe_reports, bench_stderr);
criterion_main!(benches);
