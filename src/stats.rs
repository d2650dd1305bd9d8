use chrono::NaiveDate;
use serde::Serialize;

use crate::clock::progress_fraction;
use crate::config::CycleConfig;
use crate::error::{CycleError, CycleResult};

/// Derived figures for the current cycle. ROI values are plain ratios
/// (`0.5` means +50 %).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleStats {
    pub current_price: f64,
    pub days_from_bottom_anchor: i64,
    pub percent_progress: f64,
    pub roi_from_bottom: f64,
    pub roi_to_peak: f64,
    pub roi_bottom_to_peak: f64,
    pub forecast_peak_price: f64,
    pub forecast_bottom_price: f64,
}

fn positive(name: &str, v: f64) -> CycleResult<f64> {
    if v > 0.0 && v.is_finite() {
        Ok(v)
    } else {
        Err(CycleError::invalid(format!("{name} must be positive, got {v}")))
    }
}

pub fn compute(current_price: f64, config: &CycleConfig, today: NaiveDate) -> CycleResult<CycleStats> {
    let current = positive("current price", current_price)?;
    let peak = positive("forecast peak price", config.forecast_peak_price)?;
    let bottom = positive("forecast bottom price", config.forecast_bottom_price)?;

    Ok(CycleStats {
        current_price: current,
        days_from_bottom_anchor: (today - config.previous_bottom).num_days(),
        percent_progress: progress_fraction(&config.reference, today) * 100.0,
        roi_from_bottom: current / bottom - 1.0,
        roi_to_peak: peak / current - 1.0,
        roi_bottom_to_peak: peak / bottom - 1.0,
        forecast_peak_price: peak,
        forecast_bottom_price: bottom,
    })
}

/// Text progress bar, e.g. `█████░░░░░` for 0.5 at width 10.
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).floor() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LAST_HALVING, NEXT_HALVING};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn bottom_to_peak_roi_from_default_forecast() {
        let s = compute(100_000.0, &CycleConfig::default(), d(2025, 1, 1)).unwrap();
        assert!((s.roi_bottom_to_peak - (200_000.0 / 75_000.0 - 1.0)).abs() < 1e-12);
        assert!((s.roi_bottom_to_peak - 1.666_666_666_7).abs() < 1e-9);
    }

    #[test]
    fn roi_ratios_follow_current_price() {
        let s = compute(100_000.0, &CycleConfig::default(), d(2025, 1, 1)).unwrap();
        assert!((s.roi_from_bottom - (100_000.0 / 75_000.0 - 1.0)).abs() < 1e-12);
        assert!((s.roi_to_peak - 1.0).abs() < 1e-12);
        assert_eq!(s.days_from_bottom_anchor, (d(2025, 1, 1) - d(2022, 11, 22)).num_days());
    }

    #[test]
    fn non_positive_prices_are_rejected() {
        let cfg = CycleConfig::default();
        assert!(matches!(
            compute(0.0, &cfg, d(2025, 1, 1)),
            Err(CycleError::InvalidInput(_))
        ));
        assert!(compute(-1.0, &cfg, d(2025, 1, 1)).is_err());
        let broken = CycleConfig {
            forecast_bottom_price: 0.0,
            ..CycleConfig::default()
        };
        assert!(compute(90_000.0, &broken, d(2025, 1, 1)).is_err());
    }

    #[test]
    fn percent_progress_within_bounds_inside_cycle() {
        let cfg = CycleConfig::default();
        for today in [LAST_HALVING, d(2025, 6, 15), d(2027, 2, 1), NEXT_HALVING] {
            let s = compute(80_000.0, &cfg, today).unwrap();
            assert!((0.0..=100.0).contains(&s.percent_progress));
        }
    }

    #[test]
    fn compute_is_deterministic() {
        let cfg = CycleConfig::default();
        let a = compute(64_000.0, &cfg, d(2026, 3, 3)).unwrap();
        let b = compute(64_000.0, &cfg, d(2026, 3, 3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0.5, 10), "█████░░░░░");
        assert_eq!(progress_bar(0.0, 4), "░░░░");
        assert_eq!(progress_bar(1.7, 4), "████");
    }
}
