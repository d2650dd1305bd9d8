use anyhow::{Context, Result, anyhow};
use chrono::{Duration, NaiveDate};
use csv::WriterBuilder;
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::info;

use crate::clock::{self, CyclePhase};
use crate::config::CycleConfig;
use crate::i18n::{Lang, localize};
use crate::price::{PricePoint, PriceSeries};
use crate::projection::{ProjectedPoint, ProjectionWindow};

/// Width of the forecast peak/bottom zones.
pub const ZONE_DAYS: i64 = 180;
/// Height of the forecast zones in USD.
pub const ZONE_HEIGHT: f64 = 20_000.0;
pub const MIN_Y_MAX: f64 = 220_000.0;

#[derive(Debug, Clone, Serialize)]
pub struct PhaseBand {
    pub phase: CyclePhase,
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMarker {
    pub label: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelLine {
    pub label: String,
    pub price: f64,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Zone {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub low: f64,
    pub high: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Countdown {
    pub label: String,
    pub days: i64,
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionOverlay {
    pub label: String,
    pub anchor: NaiveDate,
    pub scale: f64,
    pub points: Vec<ProjectedPoint>,
}

/// Everything a plotting front-end needs; no drawing happens here.
#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub title: String,
    pub x_axis: String,
    pub y_axis: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub y_max: f64,
    pub price_label: String,
    pub prices: Vec<PricePoint>,
    pub phases: Vec<PhaseBand>,
    pub events: Vec<EventMarker>,
    pub previous_bottom: Option<LevelLine>,
    pub zones: Vec<Zone>,
    pub countdown: Option<Countdown>,
    pub projection: Option<ProjectionOverlay>,
}

fn phase_bands(config: &CycleConfig, end: NaiveDate, lang: Lang) -> Vec<PhaseBand> {
    let p = &config.phases;
    let bottom = config.previous_bottom;
    [
        (CyclePhase::Accumulation, 0, p.accumulation_end, "#6c757d"),
        (CyclePhase::Parabolic, p.accumulation_end, p.parabolic_end, "#28a745"),
        (CyclePhase::Distribution, p.parabolic_end, p.distribution_end, "#ffc107"),
        (CyclePhase::Capitulation, p.distribution_end, p.capitulation_end, "#dc3545"),
    ]
    .into_iter()
    .filter_map(|(phase, from, to, color)| {
        let start = bottom.checked_add_signed(Duration::try_days(from)?)?;
        if start > end {
            return None;
        }
        let stop = Duration::try_days(to)
            .and_then(|d| bottom.checked_add_signed(d))
            .map_or(end, |d| d.min(end));
        Some(PhaseBand {
            phase,
            label: localize(phase.key(), lang),
            start,
            end: stop,
            color,
        })
    })
    .collect()
}

impl ChartData {
    /// Assemble chart data from the previous cycle bottom to
    /// `today + horizon_days`. Fails when that end date is not
    /// representable.
    pub fn build(
        series: &PriceSeries,
        config: &CycleConfig,
        today: NaiveDate,
        horizon_days: i64,
        projection: Option<&ProjectionWindow>,
        lang: Lang,
    ) -> Result<Self> {
        let start = config.previous_bottom;
        let end = Duration::try_days(horizon_days)
            .and_then(|d| today.checked_add_signed(d))
            .ok_or_else(|| anyhow!("horizon of {horizon_days} days from {today} is out of range"))?;
        let prices = series.between(start, end).to_vec();
        let data_max = prices.iter().map(|p| p.price).fold(0.0, f64::max);
        let y_max = MIN_Y_MAX.max(data_max * 1.2);
        let first_visible = prices.first().map(|p| p.date).unwrap_or(start);

        let mut events: Vec<EventMarker> = clock::event_dates(&config.reference, today)
            .into_iter()
            .map(|e| EventMarker {
                label: localize(e.event.key(), lang),
                date: e.date,
            })
            .collect();
        events.push(EventMarker {
            label: localize("event.bottom", lang),
            date: config.previous_bottom,
        });
        events.retain(|e| e.date >= first_visible && e.date <= end);
        events.sort_by_key(|e| e.date);

        let previous_bottom = series.price_on(config.previous_bottom).map(|price| LevelLine {
            label: localize("line.prev_bottom", lang),
            price,
            from: config.previous_bottom,
            to: end,
        });

        let mut zones = Vec::new();
        let r = &config.reference;
        if r.cycle_peak <= end {
            zones.push(Zone {
                label: localize("line.forecasted_peak_level", lang),
                start: r.cycle_peak,
                end: zone_end(r.cycle_peak, end),
                low: config.forecast_peak_price - ZONE_HEIGHT,
                high: config.forecast_peak_price,
                color: "red",
            });
        }
        if r.cycle_bottom <= end {
            zones.push(Zone {
                label: localize("line.forecasted_bottom_level", lang),
                start: r.cycle_bottom,
                end: zone_end(r.cycle_bottom, end),
                low: config.forecast_bottom_price,
                high: config.forecast_bottom_price + ZONE_HEIGHT,
                color: "green",
            });
        }

        let countdown = clock::next_event(r, today).and_then(|e| {
            let price = series.price_on(today)?;
            Some(Countdown {
                label: format!("{} {}", e.days, localize("unit.days", lang)),
                days: e.days,
                date: today + Duration::days(e.days / 2),
                price: price * 0.85,
            })
        });

        let projection = projection.map(|w| ProjectionOverlay {
            label: localize("line.pattern_projection", lang),
            anchor: w.anchor,
            scale: w.scale,
            points: w.points.clone(),
        });

        Ok(Self {
            title: localize("chart.title", lang),
            x_axis: localize("chart.x_axis", lang),
            y_axis: localize("chart.y_axis", lang),
            start,
            end,
            y_max,
            price_label: localize("line.btc_price", lang),
            prices,
            phases: phase_bands(config, end, lang),
            events,
            previous_bottom,
            zones,
            countdown,
            projection,
        })
    }

    /// Write `chart_price.csv`, `chart_projection.csv` (when present) and
    /// `chart.json` into `dir`. Each file is replaced atomically.
    pub fn write_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).context("create chart output dir")?;
        let mut written = Vec::new();

        let price_path = dir.join("chart_price.csv");
        write_atomic(&price_path, |f| {
            let mut wtr = WriterBuilder::new().from_writer(f);
            wtr.write_record(["date", "close"])?;
            for p in &self.prices {
                wtr.write_record(&[p.date.to_string(), format!("{:.2}", p.price)])?;
            }
            wtr.flush()?;
            Ok(())
        })?;
        written.push(price_path);

        if let Some(overlay) = &self.projection {
            let path = dir.join("chart_projection.csv");
            write_atomic(&path, |f| {
                let mut wtr = WriterBuilder::new().from_writer(f);
                wtr.write_record(["offset", "source_date", "date", "price"])?;
                for p in &overlay.points {
                    wtr.write_record(&[
                        p.offset.to_string(),
                        p.source_date.to_string(),
                        p.date.to_string(),
                        format!("{:.2}", p.price),
                    ])?;
                }
                wtr.flush()?;
                Ok(())
            })?;
            written.push(path);
        }

        let json_path = dir.join("chart.json");
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&json_path, |f| {
            f.write_all(json.as_bytes())?;
            Ok(())
        })?;
        written.push(json_path);

        info!("wrote {} chart files to {}", written.len(), dir.display());
        Ok(written)
    }
}

fn zone_end(from: NaiveDate, end: NaiveDate) -> NaiveDate {
    from.checked_add_signed(Duration::days(ZONE_DAYS))
        .map_or(end, |d| d.min(end))
}

/// Replace `path` through a temp file in the same directory.
pub(crate) fn write_atomic(
    path: &Path,
    body: impl FnOnce(&mut fs::File) -> Result<()>,
) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)?;
    body(tmp.as_file_mut())?;
    tmp.persist(path)
        .with_context(|| format!("persist {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{AnchorPolicy, project};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn daily(from: NaiveDate, days: i64, price: f64) -> PriceSeries {
        PriceSeries::from_points(
            (0..days)
                .map(|i| PricePoint::new(from + Duration::days(i), price + i as f64).unwrap())
                .collect(),
        )
    }

    #[test]
    fn phases_are_clipped_at_the_horizon() {
        let cfg = CycleConfig::default();
        // bottom + 700 days lands inside the parabolic phase
        let bands = phase_bands(&cfg, cfg.previous_bottom + Duration::days(700), Lang::En);
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[1].phase, CyclePhase::Parabolic);
        assert_eq!(bands[1].end, cfg.previous_bottom + Duration::days(700));
    }

    #[test]
    fn build_limits_prices_and_events_to_visible_range() {
        let cfg = CycleConfig::default();
        let series = daily(d(2022, 1, 1), 1200, 20_000.0);
        let today = d(2024, 1, 1);
        let chart = ChartData::build(&series, &cfg, today, 180, None, Lang::En).unwrap();

        assert_eq!(chart.prices.first().unwrap().date, cfg.previous_bottom);
        assert!(chart.prices.last().unwrap().date <= d(2024, 6, 29));
        assert_eq!(chart.y_max, MIN_Y_MAX);
        assert!(chart.events.iter().any(|e| e.date == cfg.reference.last_halving));
        assert!(chart.events.iter().all(|e| e.date <= chart.end));
        assert!(chart.zones.is_empty());
        assert!(chart.previous_bottom.is_some());
        let c = chart.countdown.unwrap();
        assert_eq!(c.days, (cfg.reference.cycle_peak - today).num_days());
    }

    #[test]
    fn forecast_zones_appear_once_in_range() {
        let cfg = CycleConfig::default();
        let series = daily(d(2022, 11, 1), 1500, 30_000.0);
        let chart = ChartData::build(&series, &cfg, d(2026, 10, 19), 180, None, Lang::Fr).unwrap();
        assert_eq!(chart.zones.len(), 2);
        assert_eq!(chart.zones[0].high, 200_000.0);
        assert_eq!(chart.zones[1].low, 75_000.0);
        assert_eq!(chart.title, "Phases du cycle Bitcoin");
    }

    #[test]
    fn unrepresentable_horizon_is_an_error() {
        let cfg = CycleConfig::default();
        let series = daily(d(2022, 1, 1), 400, 20_000.0);
        let today = d(2024, 1, 1);
        let err = ChartData::build(&series, &cfg, today, 1_000_000_000, None, Lang::En).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(ChartData::build(&series, &cfg, today, i64::MAX, None, Lang::En).is_err());
        assert!(ChartData::build(&series, &cfg, today, 0, None, Lang::En).is_ok());
    }

    #[test]
    fn write_files_exports_projection_when_present() {
        let cfg = CycleConfig::default();
        let series = daily(d(2020, 1, 1), 2000, 10_000.0);
        let today = d(2024, 6, 1);
        let window = project(
            &series,
            &AnchorPolicy::Explicit(vec![d(2021, 11, 10)]),
            30,
            65_000.0,
            today,
        )
        .unwrap();
        let chart = ChartData::build(&series, &cfg, today, 90, Some(&window), Lang::En).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let files = chart.write_files(dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        let proj = fs::read_to_string(dir.path().join("chart_projection.csv")).unwrap();
        assert_eq!(proj.lines().count(), 62);
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("chart.json")).unwrap()).unwrap();
        assert_eq!(json["projection"]["anchor"], "2021-11-10");
    }
}
