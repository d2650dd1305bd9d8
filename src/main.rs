use std::{env, path::PathBuf};

use anyhow::Result;
use btc_cycle_timer::i18n::Lang;
use btc_cycle_timer::{
    ChartArgs, CycleArgs, CyclesArgs, FetchArgs, NotifyArgs, StatusArgs, commands,
};

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Status(StatusArgs),
    Chart(ChartArgs),
    Cycles(CyclesArgs),
    Fetch(FetchArgs),
    Notify(NotifyArgs),
}

fn env_data_dir() -> PathBuf {
    env::var("BTC_DATA_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn env_lang() -> Lang {
    match env::var("BTC_LANG") {
        Ok(s) => s.parse().unwrap_or_else(|e| {
            warn!("{}; falling back to en", e);
            Lang::En
        }),
        Err(_) => Lang::En,
    }
}

fn apply_cycle_defaults(args: &mut CycleArgs) {
    if args.data_dir.is_none() {
        args.data_dir = Some(env_data_dir());
    }
    if args.lang.is_none() {
        args.lang = Some(env_lang());
    }
    if args.offline.is_none() {
        args.offline = Some(false);
    }
}

fn apply_chart_defaults(args: &mut ChartArgs) {
    apply_cycle_defaults(&mut args.cycle);
    if args.out.is_none() {
        args.out = Some(PathBuf::from("./out"));
    }
    if args.horizon_days.is_none() {
        args.horizon_days = Some(commands::DEFAULT_HORIZON_DAYS);
    }
    if args.projection.is_none() {
        args.projection = Some(true);
    }
}

fn apply_cycles_defaults(args: &mut CyclesArgs) {
    apply_cycle_defaults(&mut args.cycle);
    if args.future.is_none() {
        args.future = Some(commands::DEFAULT_FUTURE_CYCLES);
    }
}

fn apply_fetch_defaults(args: &mut FetchArgs) {
    if args.data_dir.is_none() {
        args.data_dir = Some(env_data_dir());
    }
    if args.start_year.is_none() {
        args.start_year = Some(commands::FIRST_ARCHIVE_YEAR);
    }
}

fn apply_notify_defaults(args: &mut NotifyArgs) {
    apply_cycle_defaults(&mut args.cycle);
    if args.token.is_none() {
        args.token = env::var("TELEGRAM_TOKEN").ok();
    }
    if args.chat_id.is_none() {
        args.chat_id = env::var("TELEGRAM_CHAT_ID").ok();
    }
    if args.dry_run.is_none() {
        args.dry_run = Some(false);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    match args.command {
        Some(Command::Status(mut status_args)) => {
            apply_cycle_defaults(&mut status_args.cycle);
            commands::status(&status_args).await?;
        }
        Some(Command::Chart(mut chart_args)) => {
            apply_chart_defaults(&mut chart_args);
            commands::chart(&chart_args).await?;
        }
        Some(Command::Cycles(mut cycles_args)) => {
            apply_cycles_defaults(&mut cycles_args);
            commands::cycles(&cycles_args).await?;
        }
        Some(Command::Fetch(mut fetch_args)) => {
            apply_fetch_defaults(&mut fetch_args);
            commands::fetch(&fetch_args).await?;
        }
        Some(Command::Notify(mut notify_args)) => {
            apply_notify_defaults(&mut notify_args);
            commands::notify(&notify_args).await?;
        }
        None => {
            // No subcommand: show the status screen
            let mut status_args = StatusArgs::default();
            apply_cycle_defaults(&mut status_args.cycle);
            commands::status(&status_args).await?;
        }
    }
    Ok(())
}
