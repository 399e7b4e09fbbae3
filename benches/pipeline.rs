use aqicast::types::columns::{AQI_VALUE, DATETIME, WEATHER_FEATURES};
use aqicast::{
    derive_features, derive_training_set, CanonicalFrame, ClimatologyPredictor, HistoricalReference,
    Predictor, RidgeRegression,
};
use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn canonical_csv(days: i64) -> Vec<u8> {
    let start = NaiveDate::from_ymd_opt(2014, 1, 1).unwrap();
    let mut csv = format!("{},{},{}\n", DATETIME, WEATHER_FEATURES.join(","), AQI_VALUE);
    for i in 0..days {
        let date = start + Duration::days(i);
        let weather: Vec<String> = (0..WEATHER_FEATURES.len())
            .map(|c| format!("{}", c as f64 * 10.0 + (i % 31) as f64 * 0.7))
            .collect();
        csv.push_str(&format!("{},{},{}\n", date, weather.join(","), 25 + (i * 7) % 80));
    }
    csv.into_bytes()
}

fn bench_pipeline(c: &mut Criterion) {
    let canonical = CanonicalFrame::from_csv(canonical_csv(3650), "bench.csv").unwrap();
    c.bench_function("derive_features", |b| {
        b.iter(|| derive_features(black_box(&canonical)).unwrap())
    });

    let table = derive_training_set(&canonical, 8).unwrap();
    let model = RidgeRegression::default()
        .fit(&table.matrix(), &table.targets())
        .unwrap();
    let predictor = ClimatologyPredictor::new(
        Arc::new(HistoricalReference::from_canonical(&canonical).unwrap()),
        Arc::new(model),
    );
    let date = NaiveDate::from_ymd_opt(2030, 7, 4).unwrap();
    c.bench_function("climatology_predict", |b| {
        b.iter(|| predictor.predict(black_box(date)).unwrap())
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
