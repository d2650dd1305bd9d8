use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CycleError, CycleResult};

/// Build a date in a const context; an invalid literal fails compilation.
const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(d) => d,
        None => panic!("invalid calendar date"),
    }
}

pub const LAST_HALVING: NaiveDate = ymd(2024, 4, 20);
pub const NEXT_HALVING: NaiveDate = ymd(2028, 4, 20);
pub const CYCLE_PEAK: NaiveDate = ymd(2025, 10, 11);
pub const CYCLE_BOTTOM: NaiveDate = ymd(2026, 10, 30);

pub const PREVIOUS_CYCLE_PEAK: NaiveDate = ymd(2021, 11, 10);
pub const PREVIOUS_CYCLE_BOTTOM: NaiveDate = ymd(2022, 11, 22);
pub const PREVIOUS_BOTTOM_PRICE: f64 = 15_700.0;

pub const FORECAST_PEAK_PRICE: f64 = 200_000.0;
pub const FORECAST_BOTTOM_PRICE: f64 = 75_000.0;

/// ~4 years between halvings.
pub const CYCLE_LENGTH_DAYS: i64 = 1460;

pub const HALVINGS: [NaiveDate; 5] = [
    ymd(2012, 11, 28),
    ymd(2016, 7, 9),
    ymd(2020, 5, 11),
    LAST_HALVING,
    NEXT_HALVING,
];

pub const CYCLE_PEAKS: [NaiveDate; 4] = [
    ymd(2013, 11, 29),
    ymd(2017, 12, 17),
    PREVIOUS_CYCLE_PEAK,
    CYCLE_PEAK,
];

pub const CYCLE_BOTTOMS: [NaiveDate; 4] = [
    ymd(2015, 1, 14),
    ymd(2018, 12, 15),
    PREVIOUS_CYCLE_BOTTOM,
    CYCLE_BOTTOM,
];

/// Reference dates of the current cycle.
///
/// `last_halving < cycle_peak < cycle_bottom < next_halving` always holds for
/// values built through [`CycleReferenceDates::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReferenceDates {
    pub last_halving: NaiveDate,
    pub cycle_peak: NaiveDate,
    pub cycle_bottom: NaiveDate,
    pub next_halving: NaiveDate,
}

impl CycleReferenceDates {
    pub fn new(
        last_halving: NaiveDate,
        cycle_peak: NaiveDate,
        cycle_bottom: NaiveDate,
        next_halving: NaiveDate,
    ) -> CycleResult<Self> {
        if !(last_halving < cycle_peak && cycle_peak < cycle_bottom && cycle_bottom < next_halving)
        {
            return Err(CycleError::invalid(format!(
                "reference dates out of order: halving {last_halving}, peak {cycle_peak}, \
                 bottom {cycle_bottom}, next halving {next_halving}"
            )));
        }
        Ok(Self {
            last_halving,
            cycle_peak,
            cycle_bottom,
            next_halving,
        })
    }

    /// The halving that opened the current cycle.
    pub fn previous_halving(&self) -> NaiveDate {
        self.last_halving
    }

    pub fn cycle_days(&self) -> i64 {
        (self.next_halving - self.last_halving).num_days()
    }
}

impl Default for CycleReferenceDates {
    fn default() -> Self {
        Self {
            last_halving: LAST_HALVING,
            cycle_peak: CYCLE_PEAK,
            cycle_bottom: CYCLE_BOTTOM,
            next_halving: NEXT_HALVING,
        }
    }
}

/// Day offsets from the previous cycle bottom that delimit each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseBounds {
    pub accumulation_end: i64,
    pub parabolic_end: i64,
    pub distribution_end: i64,
    pub capitulation_end: i64,
}

impl Default for PhaseBounds {
    fn default() -> Self {
        Self {
            accumulation_end: 180,
            parabolic_end: 730,
            distribution_end: 1000,
            capitulation_end: 1460,
        }
    }
}

/// Known (and forecast) halvings, peaks and bottoms, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalCycles {
    pub halvings: Vec<NaiveDate>,
    pub peaks: Vec<NaiveDate>,
    pub bottoms: Vec<NaiveDate>,
}

impl Default for HistoricalCycles {
    fn default() -> Self {
        Self {
            halvings: HALVINGS.to_vec(),
            peaks: CYCLE_PEAKS.to_vec(),
            bottoms: CYCLE_BOTTOMS.to_vec(),
        }
    }
}

/// Everything the core computations need, passed in explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleConfig {
    pub reference: CycleReferenceDates,
    pub forecast_peak_price: f64,
    pub forecast_bottom_price: f64,
    pub previous_peak: NaiveDate,
    pub previous_bottom: NaiveDate,
    pub previous_bottom_price: f64,
    pub phases: PhaseBounds,
    pub cycle_length_days: i64,
    pub history: HistoricalCycles,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            reference: CycleReferenceDates::default(),
            forecast_peak_price: FORECAST_PEAK_PRICE,
            forecast_bottom_price: FORECAST_BOTTOM_PRICE,
            previous_peak: PREVIOUS_CYCLE_PEAK,
            previous_bottom: PREVIOUS_CYCLE_BOTTOM,
            previous_bottom_price: PREVIOUS_BOTTOM_PRICE,
            phases: PhaseBounds::default(),
            cycle_length_days: CYCLE_LENGTH_DAYS,
            history: HistoricalCycles::default(),
        }
    }
}

impl CycleConfig {
    /// Consistency checks on the configured forecast. Returns one message per
    /// problem; an empty list means the configuration is usable as-is.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.reference.cycle_peak <= self.previous_bottom {
            issues.push("Cycle peak should be after historical bottom".to_string());
        }
        if self.reference.cycle_bottom <= self.reference.cycle_peak {
            issues.push("Cycle bottom should be after cycle peak".to_string());
        }
        if self.forecast_peak_price <= self.forecast_bottom_price {
            issues.push("Forecast peak price should be higher than bottom price".to_string());
        }
        if self.forecast_bottom_price <= 0.0 || !self.forecast_bottom_price.is_finite() {
            issues.push("Forecast bottom price should be positive".to_string());
        }
        issues
    }

    /// Swap in new reference dates, re-checking the ordering invariant.
    pub fn with_reference(mut self, reference: CycleReferenceDates) -> CycleResult<Self> {
        self.reference = CycleReferenceDates::new(
            reference.last_halving,
            reference.cycle_peak,
            reference.cycle_bottom,
            reference.next_halving,
        )?;
        Ok(self)
    }

    pub fn with_prices(mut self, peak: f64, bottom: f64) -> CycleResult<Self> {
        if !(peak > 0.0 && bottom > 0.0 && peak.is_finite() && bottom.is_finite()) {
            return Err(CycleError::invalid(format!(
                "forecast prices must be positive (peak {peak}, bottom {bottom})"
            )));
        }
        self.forecast_peak_price = peak;
        self.forecast_bottom_price = bottom;
        Ok(self)
    }
}
