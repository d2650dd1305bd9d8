use chrono::NaiveDate;

use crate::clock::{CyclePhase, FutureCycle, Timers, recommendations};
use crate::config::CycleReferenceDates;
use crate::cycles::{CurrentCycleInfo, CycleAnalysis, CycleSummary, averages};
use crate::i18n::{Lang, localize};
use crate::price::{PriceQuote, QuoteSource};
use crate::projection::ProjectionWindow;
use crate::stats::{CycleStats, progress_bar};

pub const PROGRESS_WIDTH: usize = 30;

/// One statistics value with its display kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Days(i64),
    Percent(f64),
    Usd(f64),
}

/// Stats in display order, keyed by their `stats.*` localization key.
pub fn stat_entries(s: &CycleStats) -> Vec<(&'static str, StatValue)> {
    vec![
        ("stats.current_price", StatValue::Usd(s.current_price)),
        ("stats.days_from_bottom_anchor", StatValue::Days(s.days_from_bottom_anchor)),
        ("stats.percent_progress", StatValue::Percent(s.percent_progress)),
        ("stats.roi_from_bottom", StatValue::Percent(s.roi_from_bottom * 100.0)),
        ("stats.roi_to_peak", StatValue::Percent(s.roi_to_peak * 100.0)),
        ("stats.roi_bottom_to_peak", StatValue::Percent(s.roi_bottom_to_peak * 100.0)),
        ("stats.forecast_peak_price", StatValue::Usd(s.forecast_peak_price)),
        ("stats.forecast_bottom_price", StatValue::Usd(s.forecast_bottom_price)),
    ]
}

/// `1234567.8` -> `$1,234,568`
pub fn format_usd(v: f64) -> String {
    let rounded = v.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if rounded < 0 {
        format!("-${out}")
    } else {
        format!("${out}")
    }
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%d.%m.%Y").to_string()
}

impl StatValue {
    pub fn display(&self, lang: Lang) -> String {
        match self {
            Self::Days(d) => format!("{} {}", d, localize("unit.days", lang)),
            Self::Percent(p) => format!("{:.2}%", p),
            Self::Usd(v) => format_usd(*v),
        }
    }
}

pub fn print_timers(timers: &Timers, reference: &CycleReferenceDates, lang: Lang) {
    println!("⏳ {}", localize("app.title", lang));
    println!(
        "{:<24} {:<12} {:<12}",
        localize("timer.event", lang),
        localize("timer.days_left", lang),
        localize("timer.date", lang)
    );
    println!("{}", "-".repeat(50));
    let rows = [
        ("timer.halving", timers.halving_days, reference.next_halving),
        ("timer.peak", timers.peak_days, reference.cycle_peak),
        ("timer.bottom", timers.bottom_days, reference.cycle_bottom),
    ];
    for (key, days, date) in rows {
        println!(
            "{:<24} {:<12} {:<12}",
            localize(key, lang),
            days,
            format_date(date)
        );
    }
    println!();
}

pub fn print_price(quote: Option<&PriceQuote>, lang: Lang) {
    match quote {
        Some(q) => {
            let source = match q.source {
                QuoteSource::Live => localize("price.live", lang),
                QuoteSource::Historical(d) => {
                    format!("{}, {}", localize("price.archived", lang), format_date(d))
                }
            };
            println!(
                "💰 {}: {} ({})",
                localize("price.current", lang),
                format_usd(q.price),
                source
            );
        }
        None => println!("💰 {}", localize("price.unavailable", lang)),
    }
}

pub fn print_progress(fraction: f64, phase: CyclePhase, lang: Lang) {
    println!(
        "📊 {}: {} {:.2}%",
        localize("progress.title", lang),
        progress_bar(fraction, PROGRESS_WIDTH),
        fraction * 100.0
    );
    println!("🧭 {}: {}", localize("phase.title", lang), localize(phase.key(), lang));
    print_recommendation(phase, lang);
    println!();
}

pub fn print_recommendation(phase: CyclePhase, lang: Lang) {
    let rec = recommendations(phase).localized(lang);
    println!("💡 {}: {}", localize("rec.strategy", lang), rec.strategy);
    println!("⚠️  {}: {}", localize("rec.risk_level", lang), rec.risk_level);
    println!("⏱️  {}: {}", localize("rec.timeframe", lang), rec.timeframe);
    if !rec.key_indicators.is_empty() {
        println!("🔍 {}: {}", localize("rec.indicators", lang), rec.key_indicators.join(", "));
    }
}

pub fn print_stats(stats: &CycleStats, lang: Lang) {
    println!("📈 {}", localize("telegram.stats", lang));
    for (key, value) in stat_entries(stats) {
        println!("   {:<28} {}", localize(key, lang), value.display(lang));
    }
    println!();
}

pub fn print_projection(window: Option<&ProjectionWindow>, lang: Lang) {
    match window {
        Some(w) => println!(
            "🔮 {}: {} ±{} {} (x{:.3}{})",
            localize("line.pattern_projection", lang),
            format_date(w.anchor),
            w.half_width,
            localize("unit.days", lang),
            w.scale,
            w.score.map(|s| format!(", d={:.4}", s)).unwrap_or_default()
        ),
        None => println!("🔮 {}", localize("projection.none", lang)),
    }
}

pub fn print_cycle_structure(cycles: &[CycleSummary], lang: Lang) {
    println!("🔄 {}", localize("cycles.structure", lang));
    println!("{}", "=".repeat(60));
    for c in cycles {
        println!(
            "#{:<3} {} → {}  {} {} (~{:.1}y)",
            c.cycle_number,
            format_date(c.halving_start),
            format_date(c.halving_end),
            c.length_days,
            localize("unit.days", lang),
            c.length_days as f64 / 365.0
        );
        if let Some(p) = c.peak_date {
            println!("     🏔️  {}: {}", localize("event.peak", lang), format_date(p));
        }
        if let Some(b) = c.bottom_date {
            println!("     📉 {}: {}", localize("event.bottom", lang), format_date(b));
        }
    }
    println!();
}

pub fn print_cycle_analysis(analyses: &[CycleAnalysis], lang: Lang) {
    println!("📊 {}", localize("cycles.analysis", lang));
    println!("{}", "=".repeat(60));
    for a in analyses {
        println!(
            "#{:<3} {}-{}",
            a.cycle_number,
            a.halving_start.format("%Y"),
            a.halving_end.format("%Y")
        );
        println!(
            "     📈 {}: {} ({})",
            localize("event.peak", lang),
            format_usd(a.peak_price),
            format_date(a.peak_date)
        );
        println!(
            "     📉 {}: {} ({})",
            localize("event.bottom", lang),
            format_usd(a.bottom_price),
            format_date(a.bottom_date)
        );
        println!("     x{:.1}, {} {} → peak", a.price_ratio, a.days_to_peak, localize("unit.days", lang));
    }
    if let Some(avg) = averages(analyses) {
        println!(
            "   {}: x{:.1}, {:.0} {} → peak, {:.0} {}",
            localize("cycles.averages", lang),
            avg.price_ratio,
            avg.days_to_peak,
            localize("unit.days", lang),
            avg.length_days,
            localize("unit.days", lang)
        );
    }
    println!();
}

pub fn print_current_cycle(info: &CurrentCycleInfo, lang: Lang) {
    println!(
        "🎯 #{} {} → {}: {} / {} {} ({:.1}%)",
        info.cycle_number,
        format_date(info.halving_start),
        format_date(info.halving_end),
        info.days_elapsed,
        info.days_elapsed + info.days_remaining,
        localize("unit.days", lang),
        info.progress_percent
    );
    println!();
}

pub fn print_future_cycles(cycles: &[FutureCycle], lang: Lang) {
    println!("🔮 {}", localize("cycles.future", lang));
    for c in cycles {
        println!(
            "   +{}: {} {} | {} {} | {} {}",
            c.cycle_number,
            localize("event.peak", lang),
            format_date(c.peak_date),
            localize("event.bottom", lang),
            format_date(c.bottom_date),
            localize("event.halving", lang),
            format_date(c.halving_date)
        );
    }
    println!();
}

pub fn print_config_issues(issues: &[String], lang: Lang) {
    if issues.is_empty() {
        return;
    }
    println!("⚠️  {}", localize("config.issues", lang));
    for i in issues {
        println!("   - {}", i);
    }
    println!();
}
