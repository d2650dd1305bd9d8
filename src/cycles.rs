use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::{fs, io::Write, path::Path};
use tracing::info;

use crate::chart::write_atomic;
use crate::clock::{self, CyclePhase, FutureCycle, RecommendationText};
use crate::config::{CycleConfig, HistoricalCycles};
use crate::i18n::Lang;
use crate::price::PriceSeries;

/// Future cycles included in the JSON export.
pub const EXPORT_FUTURE_CYCLES: u32 = 5;

/// One halving-to-halving interval with its configured peak and bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub cycle_number: usize,
    pub halving_start: NaiveDate,
    pub halving_end: NaiveDate,
    pub peak_date: Option<NaiveDate>,
    pub bottom_date: Option<NaiveDate>,
    pub length_days: i64,
}

pub fn cycle_structure(history: &HistoricalCycles) -> Vec<CycleSummary> {
    history
        .halvings
        .windows(2)
        .enumerate()
        .map(|(i, pair)| CycleSummary {
            cycle_number: i + 1,
            halving_start: pair[0],
            halving_end: pair[1],
            peak_date: history.peaks.get(i).copied(),
            bottom_date: history.bottoms.get(i).copied(),
            length_days: (pair[1] - pair[0]).num_days(),
        })
        .collect()
}

/// What the price data says about a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleAnalysis {
    pub cycle_number: usize,
    pub halving_start: NaiveDate,
    pub halving_end: NaiveDate,
    pub peak_date: NaiveDate,
    pub peak_price: f64,
    pub bottom_date: NaiveDate,
    pub bottom_price: f64,
    pub price_ratio: f64,
    pub days_to_peak: i64,
    pub length_days: i64,
    pub records: usize,
}

/// Measured max/min close inside every completed cycle that has data. The
/// last (current) cycle is excluded.
pub fn analyze_cycles(history: &HistoricalCycles, series: &PriceSeries) -> Vec<CycleAnalysis> {
    let structure = cycle_structure(history);
    let completed = structure.len().saturating_sub(1);
    structure
        .into_iter()
        .take(completed)
        .filter(|c| c.peak_date.is_some() && c.bottom_date.is_some())
        .filter_map(|c| {
            let window = series.between(c.halving_start, c.halving_end);
            let peak = PriceSeries::max_by_price(window)?;
            let bottom = PriceSeries::min_by_price(window)?;
            Some(CycleAnalysis {
                cycle_number: c.cycle_number,
                halving_start: c.halving_start,
                halving_end: c.halving_end,
                peak_date: peak.date,
                peak_price: peak.price,
                bottom_date: bottom.date,
                bottom_price: bottom.price,
                price_ratio: peak.price / bottom.price,
                days_to_peak: (peak.date - c.halving_start).num_days(),
                length_days: c.length_days,
                records: window.len(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleAverages {
    pub price_ratio: f64,
    pub days_to_peak: f64,
    pub length_days: f64,
}

pub fn averages(analyses: &[CycleAnalysis]) -> Option<CycleAverages> {
    if analyses.is_empty() {
        return None;
    }
    let n = analyses.len() as f64;
    Some(CycleAverages {
        price_ratio: analyses.iter().map(|a| a.price_ratio).sum::<f64>() / n,
        days_to_peak: analyses.iter().map(|a| a.days_to_peak as f64).sum::<f64>() / n,
        length_days: analyses.iter().map(|a| a.length_days as f64).sum::<f64>() / n,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurrentCycleInfo {
    pub cycle_number: usize,
    pub halving_start: NaiveDate,
    pub halving_end: NaiveDate,
    pub days_elapsed: i64,
    pub days_remaining: i64,
    pub progress_percent: f64,
}

pub fn current_cycle_info(history: &HistoricalCycles, today: NaiveDate) -> Option<CurrentCycleInfo> {
    let current = *cycle_structure(history).last()?;
    let elapsed = (today - current.halving_start).num_days();
    Some(CurrentCycleInfo {
        cycle_number: current.cycle_number,
        halving_start: current.halving_start,
        halving_end: current.halving_end,
        days_elapsed: elapsed,
        days_remaining: (current.halving_end - today).num_days(),
        progress_percent: if current.length_days > 0 {
            elapsed as f64 / current.length_days as f64 * 100.0
        } else {
            0.0
        },
    })
}

/// Configured peaks strictly before `before`, oldest first.
pub fn prior_peaks(history: &HistoricalCycles, before: NaiveDate) -> Vec<NaiveDate> {
    history.peaks.iter().copied().filter(|p| *p < before).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStatistics {
    pub total_cycles: usize,
    pub average_cycle_length_days: f64,
    /// Mean peak/bottom ratio over measured cycles; `None` without price data.
    pub average_price_ratio: Option<f64>,
    pub cycles: Vec<CycleSummary>,
    pub measured: Vec<CycleAnalysis>,
}

/// Snapshot of the cycle model for external tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleExport {
    pub current_phase: CyclePhase,
    pub statistics: CycleStatistics,
    pub recommendations: RecommendationText,
    pub future_cycles: Vec<FutureCycle>,
    pub export_date: NaiveDate,
}

impl CycleExport {
    pub fn build(
        config: &CycleConfig,
        series: Option<&PriceSeries>,
        today: NaiveDate,
        lang: Lang,
    ) -> Self {
        let cycles = cycle_structure(&config.history);
        let measured = series
            .map(|s| analyze_cycles(&config.history, s))
            .unwrap_or_default();
        let average_cycle_length_days = if cycles.is_empty() {
            0.0
        } else {
            cycles.iter().map(|c| c.length_days as f64).sum::<f64>() / cycles.len() as f64
        };
        let phase = clock::cycle_phase(config, today);
        Self {
            current_phase: phase,
            statistics: CycleStatistics {
                total_cycles: cycles.len(),
                average_cycle_length_days,
                average_price_ratio: averages(&measured).map(|a| a.price_ratio),
                cycles,
                measured,
            },
            recommendations: clock::recommendations(phase).localized(lang),
            future_cycles: clock::future_cycles(config, EXPORT_FUTURE_CYCLES),
            export_date: today,
        }
    }

    /// Pretty JSON at `path`, replaced atomically.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, |f| {
            f.write_all(json.as_bytes())?;
            Ok(())
        })?;
        info!("cycle data exported to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::PricePoint;
    use chrono::Duration;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn structure_pairs_consecutive_halvings() {
        let s = cycle_structure(&HistoricalCycles::default());
        assert_eq!(s.len(), 4);
        assert_eq!(s[2].halving_start, d(2020, 5, 11));
        assert_eq!(s[2].halving_end, d(2024, 4, 20));
        assert_eq!(s[2].peak_date, Some(d(2021, 11, 10)));
        assert_eq!(s[3].bottom_date, Some(d(2026, 10, 30)));
    }

    #[test]
    fn analysis_finds_extremes_inside_completed_cycles() {
        let h = HistoricalCycles::default();
        let start = d(2020, 5, 11);
        let top = d(2021, 11, 10);
        let points = (0..1500)
            .map(|i| {
                let day = start + Duration::days(i);
                let price = if day == top { 69_000.0 } else { 20_000.0 + (i % 10) as f64 };
                PricePoint::new(day, price).unwrap()
            })
            .collect();
        let series = PriceSeries::from_points(points);
        let a = analyze_cycles(&h, &series);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].cycle_number, 3);
        assert_eq!(a[0].peak_date, top);
        assert_eq!(a[0].peak_price, 69_000.0);
        assert_eq!(a[0].bottom_price, 20_000.0);
        assert_eq!(a[0].days_to_peak, (top - start).num_days());
        assert!(averages(&a).is_some());
        assert!(averages(&[]).is_none());
    }

    #[test]
    fn current_cycle_and_prior_peaks() {
        let h = HistoricalCycles::default();
        let info = current_cycle_info(&h, d(2026, 4, 20)).unwrap();
        assert_eq!(info.cycle_number, 4);
        assert_eq!(info.days_elapsed, 730);
        assert!(info.progress_percent > 49.0 && info.progress_percent < 51.0);
        assert_eq!(prior_peaks(&h, d(2025, 1, 1)).len(), 3);
        assert_eq!(prior_peaks(&h, d(2025, 1, 1)).last(), Some(&d(2021, 11, 10)));
    }

    #[test]
    fn export_writes_phase_playbook_and_five_future_cycles() {
        let cfg = CycleConfig::default();
        let today = d(2026, 10, 19);
        let export = CycleExport::build(&cfg, None, today, Lang::En);
        assert_eq!(export.current_phase, CyclePhase::Capitulation);
        assert_eq!(export.statistics.total_cycles, 4);
        assert_eq!(export.statistics.average_price_ratio, None);
        assert_eq!(export.future_cycles.len(), EXPORT_FUTURE_CYCLES as usize);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cycle_analysis.json");
        export.write_json(&path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["current_phase"], "capitulation");
        assert_eq!(json["recommendations"]["risk_level"], "Very High");
        assert_eq!(json["future_cycles"].as_array().unwrap().len(), 5);
        assert_eq!(json["export_date"], "2026-10-19");
    }
}
