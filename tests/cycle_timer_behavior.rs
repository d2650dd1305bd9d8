use std::{fs, path::Path};

use btc_cycle_timer::clock::{self, Timers};
use btc_cycle_timer::config::{CycleConfig, CycleReferenceDates};
use btc_cycle_timer::price::{self, HistoryCache, QuoteSource, year_file};
use btc_cycle_timer::projection::{AnchorPolicy, project};
use btc_cycle_timer::{NoMatch, stats};
use chrono::{Datelike, Duration, NaiveDate};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn write_year(dir: &Path, year: i32, base: f64) -> usize {
    let mut body = String::from("date,close,volume\n");
    let mut day = d(year, 1, 1);
    let mut rows = 0;
    while day.year() == year {
        body.push_str(&format!("{},{:.2},1\n", day, base + rows as f64 * 10.0));
        day += Duration::days(1);
        rows += 1;
    }
    fs::write(year_file(dir, year), body).unwrap();
    rows
}

#[test]
fn yearly_archives_concatenate_into_one_ordered_series() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_year(dir.path(), 2020, 7_000.0);
    let b = write_year(dir.path(), 2021, 29_000.0);
    assert_eq!((a, b), (366, 365));

    let series = price::load_historical_series(dir.path(), &[2020, 2021, 2022]).unwrap();
    assert_eq!(series.len(), a + b);
    let dates: Vec<_> = series.points().iter().map(|p| p.date).collect();
    assert!(dates.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(series.first().unwrap().date, d(2020, 1, 1));
    assert_eq!(series.last().unwrap().date, d(2021, 12, 31));

    let mut cache = HistoryCache::new(dir.path());
    let first = cache.get_or_load().unwrap();
    let second = cache.get_or_load().unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(cache.loads(), 1);
}

#[test]
fn projection_is_anchored_on_the_current_price() {
    let dir = tempfile::tempdir().unwrap();
    write_year(dir.path(), 2020, 7_000.0);
    write_year(dir.path(), 2021, 29_000.0);
    let series = price::load_all_history(dir.path()).unwrap();

    let today = d(2025, 6, 1);
    let window = project(
        &series,
        &AnchorPolicy::Explicit(vec![d(2021, 3, 1)]),
        30,
        105_000.0,
        today,
    )
    .unwrap();
    assert_eq!(window.len(), 61);
    assert!((window.price_at_offset(0).unwrap() - 105_000.0).abs() < 1e-6);
    assert_eq!(window.points.first().unwrap().date, today - Duration::days(30));

    // a window that would run past the archive end is rejected
    let err = project(
        &series,
        &AnchorPolicy::Explicit(vec![d(2021, 12, 20)]),
        30,
        105_000.0,
        today,
    )
    .unwrap_err();
    assert_eq!(err, NoMatch::InsufficientHistory { window: 61 });
}

#[test]
fn default_forecast_roi_and_timers() {
    let cfg = CycleConfig::default();
    let today = d(2026, 10, 19);
    let s = stats::compute(100_000.0, &cfg, today).unwrap();
    assert!((s.roi_bottom_to_peak - 5.0 / 3.0).abs() < 1e-12);
    assert!((s.roi_to_peak - 1.0).abs() < 1e-12);

    let reference = CycleReferenceDates::default();
    let t: Timers = clock::timers_now(&reference, today);
    for offset in [0i64, 17, 400] {
        let later = clock::timers_now(&reference, today + Duration::days(offset));
        assert_eq!(t.halving_days - later.halving_days, offset);
    }
    assert_eq!(t.halving_days, (d(2028, 4, 20) - today).num_days());
}

#[tokio::test]
async fn unreachable_quote_endpoint_degrades_to_archive() {
    let dir = tempfile::tempdir().unwrap();
    write_year(dir.path(), 2021, 29_000.0);
    let series = price::load_all_history(dir.path()).unwrap();

    let client = price::mk_client(std::time::Duration::from_secs(2)).unwrap();
    let quote = price::current_price_or_fallback(&client, "http://127.0.0.1:9/price", Some(&series))
        .await
        .unwrap();
    assert_eq!(quote.source, QuoteSource::Historical(d(2021, 12, 31)));
    assert_eq!(quote.price, 29_000.0 + 364.0 * 10.0);

    let none = price::current_price_or_fallback(&client, "http://127.0.0.1:9/price", None).await;
    assert!(none.is_none());
}
