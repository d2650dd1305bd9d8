//! Pattern projection: overlay a rescaled window of past prices on the
//! current timeline.
//!
//! Candidate anchors come from configuration (there are only a handful of
//! past cycles), each candidate must have a full `2N+1`-day window inside the
//! series, and the winner is the candidate whose pre-anchor shape is closest
//! to the last `N` days before today.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::error::NoMatch;
use crate::price::PriceSeries;

/// Default lower bound for the window half-width chosen by the CLI.
pub const MIN_HALF_WIDTH: u32 = 30;

/// Where candidate anchors come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorPolicy {
    /// Anchors given verbatim.
    Explicit(Vec<NaiveDate>),
    /// For each past peak, the day of that cycle that matches today's
    /// distance to the current forecast peak: `peak - days_to_peak`.
    PeakAligned {
        peaks: Vec<NaiveDate>,
        days_to_peak: i64,
    },
}

impl AnchorPolicy {
    pub fn anchors(&self) -> Vec<NaiveDate> {
        let mut out = match self {
            Self::Explicit(dates) => dates.clone(),
            Self::PeakAligned { peaks, days_to_peak } => {
                let Some(shift) = Duration::try_days(*days_to_peak) else {
                    return vec![];
                };
                peaks
                    .iter()
                    .filter_map(|p| p.checked_sub_signed(shift))
                    .collect()
            }
        };
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Half-width used when the caller only knows how far the forecast peak is.
pub fn half_width_for(days_to_peak: i64) -> u32 {
    u32::try_from(days_to_peak.unsigned_abs())
        .unwrap_or(u32::MAX)
        .max(MIN_HALF_WIDTH)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedPoint {
    /// Days relative to the anchor (and to today).
    pub offset: i64,
    /// Date of the sample in history.
    pub source_date: NaiveDate,
    /// Date on the current timeline, `today + offset`.
    pub date: NaiveDate,
    /// Rescaled price.
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionWindow {
    pub anchor: NaiveDate,
    pub half_width: u32,
    pub scale: f64,
    /// Shape distance to the current window; `None` when there was not
    /// enough recent data to compare.
    pub score: Option<f64>,
    pub points: Vec<ProjectedPoint>,
}

impl ProjectionWindow {
    pub fn price_at_offset(&self, offset: i64) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.offset == offset)
            .map(|p| p.price)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn z_normalize(xs: &[f64]) -> Vec<f64> {
    let mean = xs.mean();
    let sd = xs.std_dev();
    if !(sd.is_finite() && sd > 1e-12) {
        return vec![0.0; xs.len()];
    }
    xs.iter().map(|x| (x - mean) / sd).collect()
}

/// Mean squared distance between the z-normalized `[anchor-N, anchor]`
/// segment and the `[today-N, today]` segment, paired by day offset.
fn shape_distance(history: &PriceSeries, anchor: NaiveDate, today: NaiveDate, n: i64) -> Option<f64> {
    let (past, recent): (Vec<f64>, Vec<f64>) = (-n..=0)
        .filter_map(|k| {
            let off = Duration::days(k);
            Some((history.get(anchor + off)?, history.get(today + off)?))
        })
        .unzip();
    if past.len() < 2 {
        return None;
    }
    let a = z_normalize(&past);
    let b = z_normalize(&recent);
    let sum: f64 = a.iter().zip(&b).map(|(x, y)| (x - y).powi(2)).sum();
    Some(sum / a.len() as f64)
}

struct Candidate {
    anchor: NaiveDate,
    score: Option<f64>,
}

impl Candidate {
    fn rank(&self) -> f64 {
        self.score.unwrap_or(f64::INFINITY)
    }

    /// Lower distance wins; equal distance goes to the later anchor.
    fn beats(&self, other: &Candidate) -> bool {
        match self.rank().total_cmp(&other.rank()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => self.anchor > other.anchor,
            std::cmp::Ordering::Greater => false,
        }
    }
}

/// Find the best historical window and map it onto `today`.
///
/// Never fails hard: every problem is reported as a [`NoMatch`] reason and
/// the caller renders without an overlay.
pub fn project(
    history: &PriceSeries,
    policy: &AnchorPolicy,
    half_width: u32,
    current_price: f64,
    today: NaiveDate,
) -> Result<ProjectionWindow, NoMatch> {
    if half_width == 0 {
        return Err(NoMatch::ZeroHalfWidth);
    }
    if !(current_price > 0.0 && current_price.is_finite()) {
        return Err(NoMatch::NonPositiveCurrentPrice(current_price));
    }
    let anchors = policy.anchors();
    if anchors.is_empty() {
        return Err(NoMatch::NoCandidates);
    }

    let n = i64::from(half_width);
    let span = Duration::days(n);
    if today.checked_sub_signed(span).is_none() || today.checked_add_signed(span).is_none() {
        return Err(NoMatch::HalfWidthOutOfRange(half_width));
    }
    let mut best: Option<Candidate> = None;
    for anchor in anchors {
        let (Some(lo), Some(hi)) = (anchor.checked_sub_signed(span), anchor.checked_add_signed(span))
        else {
            debug!("anchor {} ±{}d leaves the calendar", anchor, n);
            continue;
        };
        if !history.covers(lo, hi) {
            debug!("anchor {} lacks a full ±{}d window", anchor, n);
            continue;
        }
        let candidate = Candidate {
            anchor,
            score: shape_distance(history, anchor, today, n),
        };
        debug!("anchor {} scored {:?}", anchor, candidate.score);
        if best.as_ref().is_none_or(|b| candidate.beats(b)) {
            best = Some(candidate);
        }
    }
    let Some(best) = best else {
        return Err(NoMatch::InsufficientHistory { window: 2 * n + 1 });
    };

    let anchor_price = history
        .get(best.anchor)
        .filter(|p| *p > 0.0)
        .ok_or(NoMatch::NonPositiveAnchorPrice { anchor: best.anchor })?;
    let scale = current_price / anchor_price;

    let points = history
        .between(best.anchor - span, best.anchor + span)
        .iter()
        .map(|p| {
            let offset = (p.date - best.anchor).num_days();
            ProjectedPoint {
                offset,
                source_date: p.date,
                date: today + Duration::days(offset),
                price: p.price * scale,
            }
        })
        .collect();

    info!(
        "projecting window around {} (scale {:.3}, score {:?})",
        best.anchor, scale, best.score
    );
    Ok(ProjectionWindow {
        anchor: best.anchor,
        half_width,
        scale,
        score: best.score,
        points,
    })
}
