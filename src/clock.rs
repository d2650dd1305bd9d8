use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::config::{CycleConfig, CycleReferenceDates};
use crate::i18n::{Lang, localize};

/// Whole days from `today` until each reference event. Negative once the
/// event is behind us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timers {
    pub halving_days: i64,
    pub peak_days: i64,
    pub bottom_days: i64,
}

pub fn days_until(target: NaiveDate, today: NaiveDate) -> i64 {
    (target - today).num_days()
}

pub fn timers_now(reference: &CycleReferenceDates, today: NaiveDate) -> Timers {
    Timers {
        halving_days: days_until(reference.next_halving, today),
        peak_days: days_until(reference.cycle_peak, today),
        bottom_days: days_until(reference.cycle_bottom, today),
    }
}

pub fn forecast_dates(reference: &CycleReferenceDates) -> CycleReferenceDates {
    *reference
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleEvent {
    PreviousHalving,
    Peak,
    Bottom,
    Halving,
}

impl CycleEvent {
    pub fn key(&self) -> &'static str {
        match self {
            Self::PreviousHalving => "event.halving_prev",
            Self::Peak => "event.peak",
            Self::Bottom => "event.bottom_forecast",
            Self::Halving => "event.halving",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventDate {
    pub event: CycleEvent,
    pub date: NaiveDate,
    pub days: i64,
}

/// Reference events in chronological order with their countdowns.
pub fn event_dates(reference: &CycleReferenceDates, today: NaiveDate) -> Vec<EventDate> {
    [
        (CycleEvent::PreviousHalving, reference.previous_halving()),
        (CycleEvent::Peak, reference.cycle_peak),
        (CycleEvent::Bottom, reference.cycle_bottom),
        (CycleEvent::Halving, reference.next_halving),
    ]
    .into_iter()
    .map(|(event, date)| EventDate {
        event,
        date,
        days: days_until(date, today),
    })
    .collect()
}

/// The nearest peak/bottom that is today or later.
pub fn next_event(reference: &CycleReferenceDates, today: NaiveDate) -> Option<EventDate> {
    event_dates(reference, today)
        .into_iter()
        .filter(|e| matches!(e.event, CycleEvent::Peak | CycleEvent::Bottom) && e.days >= 0)
        .min_by_key(|e| e.days)
}

/// Share of the current halving-to-halving cycle already elapsed, in `[0, 1]`.
pub fn progress_fraction(reference: &CycleReferenceDates, today: NaiveDate) -> f64 {
    let total = reference.cycle_days();
    if total <= 0 {
        return 0.0;
    }
    let elapsed = (today - reference.previous_halving()).num_days();
    (elapsed as f64 / total as f64).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Accumulation,
    Parabolic,
    Distribution,
    Capitulation,
    Unknown,
}

impl CyclePhase {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Accumulation => "phase.accumulation",
            Self::Parabolic => "phase.parabolic",
            Self::Distribution => "phase.distribution",
            Self::Capitulation => "phase.capitulation",
            Self::Unknown => "phase.unknown",
        }
    }
}

/// Playbook for one phase, as localization keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseRecommendation {
    pub strategy: &'static str,
    pub risk_level: &'static str,
    pub timeframe: &'static str,
    pub key_indicators: &'static [&'static str],
}

/// A [`PhaseRecommendation`] rendered in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendationText {
    pub strategy: String,
    pub risk_level: String,
    pub timeframe: String,
    pub key_indicators: Vec<String>,
}

impl PhaseRecommendation {
    pub fn localized(&self, lang: Lang) -> RecommendationText {
        RecommendationText {
            strategy: localize(self.strategy, lang),
            risk_level: localize(self.risk_level, lang),
            timeframe: localize(self.timeframe, lang),
            key_indicators: self.key_indicators.iter().map(|k| localize(k, lang)).collect(),
        }
    }
}

pub fn recommendations(phase: CyclePhase) -> PhaseRecommendation {
    match phase {
        CyclePhase::Accumulation => PhaseRecommendation {
            strategy: "rec.accumulation.strategy",
            risk_level: "rec.accumulation.risk",
            timeframe: "rec.accumulation.timeframe",
            key_indicators: &[
                "rec.accumulation.ind1",
                "rec.accumulation.ind2",
                "rec.accumulation.ind3",
            ],
        },
        CyclePhase::Parabolic => PhaseRecommendation {
            strategy: "rec.parabolic.strategy",
            risk_level: "rec.parabolic.risk",
            timeframe: "rec.parabolic.timeframe",
            key_indicators: &["rec.parabolic.ind1", "rec.parabolic.ind2", "rec.parabolic.ind3"],
        },
        CyclePhase::Distribution => PhaseRecommendation {
            strategy: "rec.distribution.strategy",
            risk_level: "rec.distribution.risk",
            timeframe: "rec.distribution.timeframe",
            key_indicators: &[
                "rec.distribution.ind1",
                "rec.distribution.ind2",
                "rec.distribution.ind3",
            ],
        },
        CyclePhase::Capitulation => PhaseRecommendation {
            strategy: "rec.capitulation.strategy",
            risk_level: "rec.capitulation.risk",
            timeframe: "rec.capitulation.timeframe",
            key_indicators: &[
                "rec.capitulation.ind1",
                "rec.capitulation.ind2",
                "rec.capitulation.ind3",
            ],
        },
        CyclePhase::Unknown => PhaseRecommendation {
            strategy: "rec.unknown.strategy",
            risk_level: "rec.unknown.risk",
            timeframe: "rec.unknown.timeframe",
            key_indicators: &[],
        },
    }
}

/// Phase by days elapsed since the previous cycle bottom.
pub fn cycle_phase(config: &CycleConfig, today: NaiveDate) -> CyclePhase {
    let days = (today - config.previous_bottom).num_days();
    let p = &config.phases;
    if days < 0 {
        CyclePhase::Unknown
    } else if days <= p.accumulation_end {
        CyclePhase::Accumulation
    } else if days <= p.parabolic_end {
        CyclePhase::Parabolic
    } else if days <= p.distribution_end {
        CyclePhase::Distribution
    } else if days <= p.capitulation_end {
        CyclePhase::Capitulation
    } else {
        CyclePhase::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FutureCycle {
    pub cycle_number: u32,
    pub peak_date: NaiveDate,
    pub bottom_date: NaiveDate,
    pub halving_date: NaiveDate,
}

/// Naive forward projection: each cycle repeats the last one shifted by the
/// configured cycle length. Stops early once a date would leave the
/// supported calendar.
pub fn future_cycles(config: &CycleConfig, count: u32) -> Vec<FutureCycle> {
    let Some(step) = Duration::try_days(config.cycle_length_days) else {
        return vec![];
    };
    let r = &config.reference;
    let (mut peak, mut bottom, mut halving) = (r.cycle_peak, r.cycle_bottom, Some(r.next_halving));
    let mut out = Vec::new();
    for cycle_number in 1..=count {
        let (Some(p), Some(b), Some(h)) = (
            peak.checked_add_signed(step),
            bottom.checked_add_signed(step),
            halving,
        ) else {
            break;
        };
        out.push(FutureCycle {
            cycle_number,
            peak_date: p,
            bottom_date: b,
            halving_date: h,
        });
        peak = p;
        bottom = b;
        halving = h.checked_add_signed(step);
    }
    out
}

/// True once the forecast peak or bottom has passed and the configured
/// forecast should be revisited.
pub fn needs_forecast_refresh(reference: &CycleReferenceDates, today: NaiveDate) -> bool {
    today > reference.cycle_peak || today > reference.cycle_bottom
}
