use anyhow::{Result, bail};
use reqwest::Client;
use tracing::info;

use crate::clock::{CyclePhase, Timers, recommendations};
use crate::i18n::{Lang, localize};
use crate::price::PriceQuote;
use crate::render::{format_usd, stat_entries};
use crate::stats::CycleStats;

const MARKDOWN_V2_SPECIAL: &str = r"\_*[]()~`>#+-=|{}.!";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    /// Both credentials must be present and non-blank.
    pub fn from_parts(token: Option<String>, chat_id: Option<String>) -> Option<Self> {
        let token = token.filter(|t| !t.trim().is_empty())?;
        let chat_id = chat_id.filter(|c| !c.trim().is_empty())?;
        Some(Self { token, chat_id })
    }
}

/// Escape text for Telegram MarkdownV2.
pub fn escape_md(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inside `code` spans only backslash and backtick need escaping.
fn escape_code(text: &str) -> String {
    text.replace('\\', "\\\\").replace('`', "\\`")
}

pub fn build_message(
    timers: &Timers,
    quote: Option<&PriceQuote>,
    stats: Option<&CycleStats>,
    progress: f64,
    phase: CyclePhase,
    lang: Lang,
) -> String {
    let t = |key: &str| escape_md(&localize(key, lang));
    let days = t("unit.days");

    let mut text = format!(
        "*📅 {}*\n\n\
         🟦 *{}*: `{}` {}\n\
         🟩 *{}*: `{}` {}\n\
         🟥 *{}*: `{}` {}\n\n",
        t("app.title"),
        t("timer.halving"),
        timers.halving_days,
        days,
        t("timer.peak"),
        timers.peak_days,
        days,
        t("timer.bottom"),
        timers.bottom_days,
        days,
    );

    let price = quote
        .map(|q| format_usd(q.price))
        .unwrap_or_else(|| localize("price.unavailable", lang));
    text.push_str(&format!("💰 *{}*: `{}`\n", t("price.current"), escape_code(&price)));
    text.push_str(&format!(
        "⏳ *{}*: `{:.2}%`\n",
        t("progress.title"),
        progress * 100.0
    ));

    let rec = recommendations(phase).localized(lang);
    text.push_str(&format!(
        "🧭 *{}*: {}\n\n\
         💡 *{}*: {}\n\
         ⚠️ *{}*: {}\n\
         ⏱️ *{}*: {}\n",
        t("phase.title"),
        t(phase.key()),
        t("rec.strategy"),
        escape_md(&rec.strategy),
        t("rec.risk_level"),
        escape_md(&rec.risk_level),
        t("rec.timeframe"),
        escape_md(&rec.timeframe),
    ));
    if !rec.key_indicators.is_empty() {
        text.push_str(&format!("🔍 *{}*:\n", t("rec.indicators")));
        for indicator in &rec.key_indicators {
            text.push_str(&format!("• {}\n", escape_md(indicator)));
        }
    }

    if let Some(s) = stats {
        text.push_str(&format!("\n*📊 {}:*\n", t("telegram.stats")));
        for (key, value) in stat_entries(s) {
            text.push_str(&format!(
                "• *{}*: `{}`\n",
                t(key),
                escape_code(&value.display(lang))
            ));
        }
    }
    text
}

pub async fn send_message(client: &Client, cfg: &TelegramConfig, text: &str) -> Result<()> {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", cfg.token);
    let body = serde_json::json!({
        "chat_id": cfg.chat_id,
        "text": text,
        "parse_mode": "MarkdownV2",
    });
    let response = client.post(&url).json(&body).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        bail!("Telegram error {}: {}", status, error_text);
    }
    info!("telegram message sent to chat {}", cfg.chat_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CycleConfig;
    use crate::price::QuoteSource;
    use chrono::NaiveDate;

    #[test]
    fn escapes_every_markdown_v2_special() {
        assert_eq!(escape_md("a.b-c!"), r"a\.b\-c\!");
        assert_eq!(escape_md("(x)"), r"\(x\)");
        assert_eq!(escape_md("plain"), "plain");
    }

    #[test]
    fn credentials_must_both_be_present() {
        assert!(TelegramConfig::from_parts(Some("t".into()), None).is_none());
        assert!(TelegramConfig::from_parts(Some(" ".into()), Some("1".into())).is_none());
        assert!(TelegramConfig::from_parts(Some("t".into()), Some("1".into())).is_some());
    }

    #[test]
    fn message_contains_timers_price_and_stats() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let cfg = CycleConfig::default();
        let stats = crate::stats::compute(100_000.0, &cfg, today).unwrap();
        let timers = crate::clock::timers_now(&cfg.reference, today);
        let quote = PriceQuote {
            price: 100_000.0,
            source: QuoteSource::Live,
        };
        let phase = crate::clock::cycle_phase(&cfg, today);
        let msg = build_message(&timers, Some(&quote), Some(&stats), 0.625, phase, Lang::En);
        assert!(msg.contains("*Cycle peak*: `-373` days"));
        assert!(msg.contains("`$100,000`"));
        assert!(msg.contains("`62.50%`"));
        assert!(msg.contains("*ROI bottom to peak*: `166.67%`"));
        assert!(msg.starts_with("*📅 BTC Cycle Timer*"));
    }

    #[test]
    fn message_carries_the_phase_playbook() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let cfg = CycleConfig::default();
        let timers = crate::clock::timers_now(&cfg.reference, today);
        let msg = build_message(&timers, None, None, 0.03, CyclePhase::Capitulation, Lang::En);
        assert!(msg.contains("🧭 *Current phase*: Capitulation"));
        assert!(msg.contains("💡 *Strategy*: Prepare for accumulation phase"));
        assert!(msg.contains("⚠️ *Risk level*: Very High"));
        assert!(msg.contains(r"*Timeframe*: Short\-term \(1\-3 months\)"));
        assert!(msg.contains("• Panic selling\n"));
        assert!(msg.contains("`Price unavailable`"));
    }
}
