pub mod chart;
pub mod clock;
pub mod commands;
pub mod config;
pub mod cycles;
pub mod error;
pub mod i18n;
pub mod notify;
pub mod price;
pub mod projection;
pub mod render;
pub mod stats;

pub use error::{CycleError, CycleResult, NoMatch};

use clap::Parser;
use i18n::Lang;
use std::path::PathBuf;

/// Reference-date, price and environment overrides shared by every command.
#[derive(Parser, Debug, Clone, Default)]
pub struct CycleArgs {
    /// Directory holding btc_price_<year>.csv archives (or set BTC_DATA_DIR)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Output language (or set BTC_LANG)
    #[arg(long, value_enum)]
    pub lang: Option<Lang>,

    /// Pretend today is this date, format YYYY-MM-DD
    #[arg(long)]
    pub today: Option<String>,

    /// Halving that opened the current cycle, YYYY-MM-DD
    #[arg(long)]
    pub last_halving: Option<String>,

    /// Forecast cycle peak date, YYYY-MM-DD
    #[arg(long)]
    pub peak: Option<String>,

    /// Forecast cycle bottom date, YYYY-MM-DD
    #[arg(long)]
    pub bottom: Option<String>,

    /// Next halving date, YYYY-MM-DD
    #[arg(long)]
    pub next_halving: Option<String>,

    /// Forecast peak price in USD
    #[arg(long)]
    pub peak_price: Option<f64>,

    /// Forecast bottom price in USD
    #[arg(long)]
    pub bottom_price: Option<f64>,

    /// Skip the live quote and use the last archived close
    #[arg(long)]
    pub offline: Option<bool>,
}

/// Countdown, current price, cycle progress and ROI figures.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about)]
pub struct StatusArgs {
    #[command(flatten)]
    pub cycle: CycleArgs,
}

/// Export chart data (price line, phases, events, projection overlay).
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about)]
pub struct ChartArgs {
    #[command(flatten)]
    pub cycle: CycleArgs,

    /// Output directory for chart CSV/JSON files
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Days after today shown on the chart
    #[arg(long)]
    pub horizon_days: Option<i64>,

    /// Overlay the best-matching historical window
    #[arg(long)]
    pub projection: Option<bool>,

    /// Half-width (days) of the projected window; defaults to the distance to the forecast peak
    #[arg(long)]
    pub half_width: Option<u32>,
}

/// Historical cycle structure, measured cycles and naive future forecast.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about)]
pub struct CyclesArgs {
    #[command(flatten)]
    pub cycle: CycleArgs,

    /// Number of future cycles to forecast
    #[arg(long)]
    pub future: Option<u32>,

    /// Also export phase, statistics, recommendations and future cycles as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,
}

/// Download yearly daily-close archives from Binance.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about)]
pub struct FetchArgs {
    /// Archive directory (or set BTC_DATA_DIR)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// First year to download (inclusive)
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Last year to download (inclusive)
    #[arg(long)]
    pub end_year: Option<i32>,
}

/// Send the status summary to Telegram.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about)]
pub struct NotifyArgs {
    #[command(flatten)]
    pub cycle: CycleArgs,

    /// Bot token (or set TELEGRAM_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Chat id (or set TELEGRAM_CHAT_ID)
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Print the message instead of sending it
    #[arg(long)]
    pub dry_run: Option<bool>,
}
