use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, NaiveDate};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info, warn};

use crate::chart::ChartData;
use crate::config::{CycleConfig, CycleReferenceDates};
use crate::error::CycleError;
use crate::i18n::{Lang, localize};
use crate::notify::{self, TelegramConfig};
use crate::price::{
    self, COINGECKO_SIMPLE_PRICE_URL, HistoryCache, PriceQuote, PriceSeries, QUOTE_TIMEOUT,
};
use crate::projection::{self, AnchorPolicy, ProjectionWindow};
use crate::{ChartArgs, CycleArgs, CyclesArgs, FetchArgs, NotifyArgs, StatusArgs};
use crate::{clock, cycles, render, stats};

pub const DEFAULT_HORIZON_DAYS: i64 = 180;
pub const DEFAULT_FUTURE_CYCLES: u32 = 3;
pub const FIRST_ARCHIVE_YEAR: i32 = 2020;

fn parse_date_flag(flag: &str, value: Option<&String>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("invalid --{flag} (expected YYYY-MM-DD)"))
        })
        .transpose()
}

/// Resolved configuration plus a lazily loaded price history.
pub struct RunContext {
    pub config: CycleConfig,
    pub today: NaiveDate,
    pub lang: Lang,
    pub offline: bool,
    cache: HistoryCache,
}

impl RunContext {
    pub fn from_args(args: &CycleArgs) -> Result<Self> {
        let today = parse_date_flag("today", args.today.as_ref())?
            .unwrap_or_else(|| Local::now().date_naive());

        let base = CycleReferenceDates::default();
        let reference = CycleReferenceDates {
            last_halving: parse_date_flag("last-halving", args.last_halving.as_ref())?
                .unwrap_or(base.last_halving),
            cycle_peak: parse_date_flag("peak", args.peak.as_ref())?.unwrap_or(base.cycle_peak),
            cycle_bottom: parse_date_flag("bottom", args.bottom.as_ref())?
                .unwrap_or(base.cycle_bottom),
            next_halving: parse_date_flag("next-halving", args.next_halving.as_ref())?
                .unwrap_or(base.next_halving),
        };

        let defaults = CycleConfig::default();
        let peak_price = args.peak_price.unwrap_or(defaults.forecast_peak_price);
        let bottom_price = args.bottom_price.unwrap_or(defaults.forecast_bottom_price);
        let config = defaults
            .with_reference(reference)
            .context("invalid reference dates")?
            .with_prices(peak_price, bottom_price)
            .context("invalid forecast prices")?;

        let data_dir = args.data_dir.clone().unwrap_or_else(|| PathBuf::from("./data"));
        Ok(Self {
            config,
            today,
            lang: args.lang.unwrap_or_default(),
            offline: args.offline.unwrap_or(false),
            cache: HistoryCache::new(data_dir),
        })
    }

    /// Archived history, or `None` when no archive could be read.
    pub fn history(&mut self) -> Option<Arc<PriceSeries>> {
        match self.cache.get_or_load() {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("historical prices unavailable in {}: {}", self.cache.dir().display(), e);
                None
            }
        }
    }

    /// Live quote with fallback to the last archived close.
    pub async fn quote(&self, history: Option<&PriceSeries>) -> Option<PriceQuote> {
        if self.offline {
            return price::resolve_price(Err(CycleError::unavailable("offline mode")), history);
        }
        match price::mk_client(QUOTE_TIMEOUT) {
            Ok(client) => {
                price::current_price_or_fallback(&client, COINGECKO_SIMPLE_PRICE_URL, history).await
            }
            Err(e) => price::resolve_price(Err(e), history),
        }
    }
}

pub async fn status(args: &StatusArgs) -> Result<()> {
    let mut ctx = RunContext::from_args(&args.cycle)?;
    let lang = ctx.lang;
    let history = ctx.history();
    let quote = ctx.quote(history.as_deref()).await;
    let reference = ctx.config.reference;

    render::print_config_issues(&ctx.config.validate(), lang);
    render::print_timers(&clock::timers_now(&reference, ctx.today), &reference, lang);
    render::print_price(quote.as_ref(), lang);

    let fraction = clock::progress_fraction(&reference, ctx.today);
    render::print_progress(fraction, clock::cycle_phase(&ctx.config, ctx.today), lang);

    if let Some(q) = &quote {
        match stats::compute(q.price, &ctx.config, ctx.today) {
            Ok(s) => render::print_stats(&s, lang),
            Err(e) => warn!("cycle stats skipped: {}", e),
        }
    }
    if clock::needs_forecast_refresh(&reference, ctx.today) {
        info!("forecast peak/bottom date has passed; consider updating --peak/--bottom");
    }
    Ok(())
}

/// Best-matching window from prior cycles aligned on the forecast peak.
pub fn pattern_projection(
    history: &PriceSeries,
    config: &CycleConfig,
    current_price: f64,
    today: NaiveDate,
    half_width: Option<u32>,
) -> Option<ProjectionWindow> {
    let days_to_peak = clock::days_until(config.reference.cycle_peak, today);
    let policy = AnchorPolicy::PeakAligned {
        peaks: cycles::prior_peaks(&config.history, config.reference.last_halving),
        days_to_peak,
    };
    let n = half_width.unwrap_or_else(|| projection::half_width_for(days_to_peak));
    match projection::project(history, &policy, n, current_price, today) {
        Ok(w) => Some(w),
        Err(reason) => {
            info!("no pattern projection: {}", reason);
            None
        }
    }
}

pub async fn chart(args: &ChartArgs) -> Result<()> {
    let mut ctx = RunContext::from_args(&args.cycle)?;
    let lang = ctx.lang;
    let Some(history) = ctx.history() else {
        bail!("no historical price data found; run `fetch` first");
    };
    let quote = ctx.quote(Some(history.as_ref())).await;

    let window = if args.projection.unwrap_or(true) {
        quote.and_then(|q| {
            pattern_projection(&history, &ctx.config, q.price, ctx.today, args.half_width)
        })
    } else {
        None
    };
    render::print_projection(window.as_ref(), lang);

    let chart = ChartData::build(
        &history,
        &ctx.config,
        ctx.today,
        args.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS),
        window.as_ref(),
        lang,
    )
    .context("invalid --horizon-days")?;
    let out = args.out.clone().unwrap_or_else(|| PathBuf::from("./out"));
    for path in chart.write_files(&out)? {
        println!("{}", path.display());
    }
    Ok(())
}

pub async fn cycles(args: &CyclesArgs) -> Result<()> {
    let mut ctx = RunContext::from_args(&args.cycle)?;
    let lang = ctx.lang;

    render::print_cycle_structure(&cycles::cycle_structure(&ctx.config.history), lang);
    let history = ctx.history();
    if let Some(history) = &history {
        render::print_cycle_analysis(&cycles::analyze_cycles(&ctx.config.history, history), lang);
    }
    if let Some(info) = cycles::current_cycle_info(&ctx.config.history, ctx.today) {
        render::print_current_cycle(&info, lang);
    }
    let future = clock::future_cycles(&ctx.config, args.future.unwrap_or(DEFAULT_FUTURE_CYCLES));
    render::print_future_cycles(&future, lang);

    if let Some(path) = &args.json {
        cycles::CycleExport::build(&ctx.config, history.as_deref(), ctx.today, lang)
            .write_json(path)?;
        println!("✅ {}: {}", localize("export.written", lang), path.display());
    }
    Ok(())
}

pub async fn fetch(args: &FetchArgs) -> Result<()> {
    let dir = args.data_dir.clone().unwrap_or_else(|| PathBuf::from("./data"));
    let start = args.start_year.unwrap_or(FIRST_ARCHIVE_YEAR);
    let end = args.end_year.unwrap_or_else(|| Local::now().year());
    if end < start {
        bail!("--end-year must not be before --start-year");
    }

    let client = price::mk_client(Duration::from_secs(30)).context("build http client")?;
    let mut ok = 0;
    for year in start..=end {
        info!("loading {}", year);
        match price::download_year(&client, &dir, year).await {
            Ok(days) => {
                ok += 1;
                println!("✅ {} ({} days)", price::year_file(&dir, year).display(), days);
            }
            Err(e) => error!("failed {}: {}", year, e),
        }
    }
    if ok == 0 {
        bail!("no archive could be downloaded");
    }
    Ok(())
}

pub async fn notify(args: &NotifyArgs) -> Result<()> {
    let mut ctx = RunContext::from_args(&args.cycle)?;
    let lang = ctx.lang;
    let history = ctx.history();
    let quote = ctx.quote(history.as_deref()).await;
    let reference = ctx.config.reference;

    let timers = clock::timers_now(&reference, ctx.today);
    let stats = quote.and_then(|q| stats::compute(q.price, &ctx.config, ctx.today).ok());
    let progress = clock::progress_fraction(&reference, ctx.today);
    let phase = clock::cycle_phase(&ctx.config, ctx.today);
    let text =
        notify::build_message(&timers, quote.as_ref(), stats.as_ref(), progress, phase, lang);

    let creds = TelegramConfig::from_parts(args.token.clone(), args.chat_id.clone());
    match creds {
        Some(cfg) if !args.dry_run.unwrap_or(false) => {
            let client = price::mk_client(QUOTE_TIMEOUT).context("build http client")?;
            notify::send_message(&client, &cfg, &text).await?;
        }
        Some(_) => println!("{}", text),
        None => {
            warn!("TELEGRAM_TOKEN / TELEGRAM_CHAT_ID not set; printing message instead");
            println!("{}", text);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::PricePoint;

    #[test]
    fn context_applies_date_and_price_overrides() {
        let args = CycleArgs {
            today: Some("2025-01-01".into()),
            peak: Some("2025-12-01".into()),
            peak_price: Some(150_000.0),
            ..CycleArgs::default()
        };
        let ctx = RunContext::from_args(&args).unwrap();
        assert_eq!(ctx.today, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(ctx.config.reference.cycle_peak, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(ctx.config.forecast_peak_price, 150_000.0);
        assert_eq!(ctx.lang, Lang::En);
    }

    #[test]
    fn context_rejects_bad_dates_and_inverted_cycle() {
        let bad = CycleArgs {
            today: Some("01.01.2025".into()),
            ..CycleArgs::default()
        };
        assert!(RunContext::from_args(&bad).is_err());

        let inverted = CycleArgs {
            peak: Some("2027-01-01".into()),
            ..CycleArgs::default()
        };
        assert!(RunContext::from_args(&inverted).is_err());
    }

    #[tokio::test]
    async fn offline_quote_uses_history() {
        let args = CycleArgs {
            offline: Some(true),
            ..CycleArgs::default()
        };
        let ctx = RunContext::from_args(&args).unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let s = PriceSeries::from_points(vec![PricePoint::new(day, 96_500.0).unwrap()]);
        let q = ctx.quote(Some(&s)).await.unwrap();
        assert_eq!(q.price, 96_500.0);
    }

    #[test]
    fn projection_aligns_previous_cycle_on_days_to_peak() {
        let cfg = CycleConfig::default();
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let history = PriceSeries::from_points(
            (0..2200)
                .map(|i| PricePoint::new(start + chrono::Duration::days(i), 10_000.0 + i as f64).unwrap())
                .collect(),
        );
        // 100 days before the forecast peak
        let today = cfg.reference.cycle_peak - chrono::Duration::days(100);
        let w = pattern_projection(&history, &cfg, 100_000.0, today, None).unwrap();
        assert_eq!(w.anchor, cfg.previous_peak - chrono::Duration::days(100));
        assert_eq!(w.half_width, 100);
        assert!((w.price_at_offset(0).unwrap() - 100_000.0).abs() < 1e-6);
    }
}
