//! Benchmarks for argument assembly and filter compilation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ffwright::fw_filter::{join_graph, size_filters, SizeData};
use ffwright::{Command, FilterNode, FilterSpec, Preset};

fn bench_arguments(c: &mut Criterion) {
    let mut group = c.benchmark_group("arguments");

    let mut simple = Command::from_input("in.mov");
    simple.audio_codec("aac").video_codec("libx264").output("out.mp4");
    group.bench_function("simple", |b| {
        b.iter(|| black_box(&simple).arguments());
    });

    let mut multi = Command::from_input("in.mov");
    multi.input("overlay.png").seek_input(5).unwrap();
    for i in 0..8 {
        multi
            .output(format!("out{i}.mp4"))
            .preset(Preset::Podcast)
            .unwrap()
            .seek(i * 10);
    }
    group.bench_function("multi_output_presets", |b| {
        b.iter(|| black_box(&multi).arguments());
    });

    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filters");

    let graph: Vec<FilterSpec> = (0..16)
        .map(|i| {
            FilterNode::new("overlay")
                .option("x", i * 10)
                .option("y", "main_h-overlay_h")
                .inputs([format!("in{i}"), format!("{}:v", i + 1)])
                .output(format!("in{}", i + 1))
                .into()
        })
        .collect();
    group.bench_function("join_graph/16", |b| {
        b.iter(|| join_graph(black_box(&graph)));
    });

    let padded = SizeData {
        size: Some("640x480".into()),
        aspect: Some(16.0 / 9.0),
        pad: Some("black".into()),
    };
    group.bench_function("size_filters/padded", |b| {
        b.iter(|| size_filters(black_box(&padded)));
    });

    group.finish();
}

criterion_group!(benches, bench_arguments, bench_filters);
criterion_main!(benches);
