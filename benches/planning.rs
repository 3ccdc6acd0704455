use chapter_splitter::{ChapterListParser, SplitPlanner, TimeCode};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::{Path, PathBuf};

/// A long instructional with one chapter every 90 seconds
fn chapters_file(count: u64) -> String {
    (0..count)
        .map(|i| format!("{} Technique number {}\n", TimeCode::from_secs(i * 90), i + 1))
        .collect()
}

/// Benchmark timestamp parsing
fn bench_timecode_parse(c: &mut Criterion) {
    c.bench_function("timecode_parse", |b| {
        b.iter(|| TimeCode::parse(black_box("12:34:56")))
    });
}

/// Benchmark chapter list parsing with different list sizes
fn bench_chapter_parsing(c: &mut Criterion) {
    let parser = ChapterListParser::new();

    for count in [10u64, 100, 1000].iter() {
        let content = chapters_file(*count);
        c.bench_function(&format!("parse_{}_chapters", count), |b| {
            b.iter(|| parser.parse_str(black_box(&content)))
        });
    }
}

/// Benchmark building a split plan
fn bench_planning(c: &mut Criterion) {
    let entries = ChapterListParser::new().parse_str(&chapters_file(500)).unwrap();
    let planner = SplitPlanner::new(Some(PathBuf::from("chapters")));

    c.bench_function("plan_500_chapters", |b| {
        b.iter(|| {
            planner.plan(
                black_box(&entries),
                Path::new("instructional.mkv"),
                black_box(500.0 * 90.0),
            )
        })
    });
}

criterion_group!(benches, bench_timecode_parse, bench_chapter_parsing, bench_planning);
criterion_main!(benches);
