use chrono::{NaiveDate, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use helio_engine::config::EngineConfig;
use helio_engine::spa::solar_position;
use helio_engine::{
    compute_range, sun_events, AtmosphericParams, EventSettings, GeoLocation, SunOptions,
};
use std::hint::black_box;

fn london() -> GeoLocation {
    GeoLocation::new(51.5074, -0.1278, 0.0, "Europe/London")
}

fn bench_solar_position(c: &mut Criterion) {
    let instant = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
    let location = london();
    let atmosphere = AtmosphericParams::default();
    c.bench_function("solar_position", |b| {
        b.iter(|| solar_position(black_box(&instant), &location, &atmosphere))
    });
}

fn bench_sun_events(c: &mut Criterion) {
    let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
    let location = london();
    c.bench_function("sun_events/london", |b| {
        b.iter(|| {
            sun_events(
                black_box(date),
                &location,
                &AtmosphericParams::default(),
                &EventSettings::default(),
            )
        })
    });
}

fn bench_compute_range(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let location = london();
    let config = EngineConfig::default();
    let mut group = c.benchmark_group("compute_range");
    group.sample_size(10);
    for days in [7u64, 31, 366] {
        let end = start + chrono::Days::new(days - 1);
        group.bench_with_input(BenchmarkId::from_parameter(days), &end, |b, &end| {
            b.iter(|| compute_range(&location, start, end, &SunOptions::default(), &config))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_solar_position, bench_sun_events, bench_compute_range);
criterion_main!(benches);
