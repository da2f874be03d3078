use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use statline::aggregate::{
    DEFAULT_TRAILING_WINDOW, merge_player_roster, player_names, player_season_view,
    threshold_classify, trailing_vs_season,
};
use statline::demo_source::DemoSource;
use statline::model::{SeasonRange, StatField};
use statline::report::{ReportRequest, build_report};
use statline::source::StatsSource;

const SEASONS: SeasonRange = SeasonRange::new(2019, 2023);

fn bench_merge(c: &mut Criterion) {
    let source = DemoSource::default();
    let weekly = source.weekly(SEASONS).unwrap();
    let rosters = source.rosters(SEASONS).unwrap();

    c.bench_function("merge_player_roster", |b| {
        b.iter(|| {
            let merged = merge_player_roster(black_box(&weekly), black_box(&rosters)).unwrap();
            black_box(merged.rows.len());
        })
    });
}

fn bench_player_view(c: &mut Criterion) {
    let source = DemoSource::default();
    let weekly = source.weekly(SEASONS).unwrap();
    let rosters = source.rosters(SEASONS).unwrap();
    let merged = merge_player_roster(&weekly, &rosters).unwrap();
    let name = player_names(&merged.rows, 2023)
        .into_iter()
        .next()
        .expect("demo league has players");

    c.bench_function("view_split_classify", |b| {
        b.iter(|| {
            let view = player_season_view(black_box(&merged.rows), 2023, black_box(&name));
            let split = trailing_vs_season(&view, StatField::FantasyPointsPpr, DEFAULT_TRAILING_WINDOW);
            let lines = threshold_classify(&view, StatField::FantasyPointsPpr, 12.5);
            black_box((split.delta, lines.count_over));
        })
    });

    let mut req = ReportRequest::new(2023, name);
    req.line = Some("12.5".to_string());
    c.bench_function("build_report", |b| {
        b.iter(|| {
            let report = build_report(black_box(&merged), black_box(&rosters), black_box(&req));
            black_box(report.box_score.len());
        })
    });
}

criterion_group!(benches, bench_merge, bench_player_view);
criterion_main!(benches);
