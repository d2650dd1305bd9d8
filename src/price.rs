use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use itertools::Itertools;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tempfile::NamedTempFile;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{CycleError, CycleResult};

pub const COINGECKO_SIMPLE_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";
pub const BINANCE_KLINES_URL: &str = "https://api.binance.com/api/v3/klines";
pub const BINANCE_SYMBOL: &str = "BTCUSDT";
pub const QUOTE_TIMEOUT: Duration = Duration::from_secs(10);
/// Extra attempts `do_get_json` makes after a non-success status.
pub const DOWNLOAD_RETRIES: u64 = 4;

/// One daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> CycleResult<Self> {
        if !(price > 0.0 && price.is_finite()) {
            return Err(CycleError::invalid(format!(
                "price on {date} must be positive, got {price}"
            )));
        }
        Ok(Self { date, price })
    }
}

/// Ascending, one-sample-per-day price history. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts by date and keeps the last sample seen for each day.
    pub fn from_points(mut points: Vec<PricePoint>) -> Self {
        // stable: later rows for the same day stay after earlier ones
        points.sort_by_key(|p| p.date);
        let mut out = Vec::with_capacity(points.len());
        for (_date, group) in &points.into_iter().chunk_by(|p| p.date) {
            if let Some(last) = group.last() {
                out.push(last);
            }
        }
        Self { points: out }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Last known close on or before `date`.
    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.points.partition_point(|p| p.date <= date);
        idx.checked_sub(1).map(|i| self.points[i].price)
    }

    /// Exact-day lookup.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].price)
    }

    /// Samples with `from <= date <= to`.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> &[PricePoint] {
        let lo = self.points.partition_point(|p| p.date < from);
        let hi = self.points.partition_point(|p| p.date <= to);
        if lo >= hi { &[] } else { &self.points[lo..hi] }
    }

    /// True when every day of `[from, to]` has a sample.
    pub fn covers(&self, from: NaiveDate, to: NaiveDate) -> bool {
        if to < from {
            return false;
        }
        // at most one row per day, so the count alone rules out gaps
        let days = (to - from).num_days() + 1;
        usize::try_from(days).is_ok_and(|n| self.between(from, to).len() == n)
    }

    pub fn max_by_price(points: &[PricePoint]) -> Option<PricePoint> {
        points.iter().copied().max_by(|a, b| a.price.total_cmp(&b.price))
    }

    pub fn min_by_price(points: &[PricePoint]) -> Option<PricePoint> {
        points.iter().copied().min_by(|a, b| a.price.total_cmp(&b.price))
    }
}

pub fn year_file(dir: &Path, year: i32) -> PathBuf {
    dir.join(format!("btc_price_{year}.csv"))
}

/// Years for which `btc_price_<year>.csv` exists in `dir`, ascending.
pub fn available_years(dir: &Path) -> CycleResult<Vec<i32>> {
    let mut years = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let year = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("btc_price_"))
            .and_then(|n| n.strip_suffix(".csv"))
            .and_then(|y| y.parse::<i32>().ok());
        if let Some(y) = year {
            years.push(y);
        }
    }
    years.sort_unstable();
    Ok(years)
}

/// Outcome of reading one archive file.
#[derive(Debug, Clone, Default)]
pub struct FileRows {
    pub points: Vec<PricePoint>,
    pub skipped: usize,
}

fn column_index(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Read one `date,close[,...]` archive. Malformed rows are skipped and counted;
/// a file without the required header columns is a read failure.
pub fn read_price_file(path: &Path) -> CycleResult<FileRows> {
    let mut rdr = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers = rdr.headers()?.clone();
    let date_col = column_index(&headers, &["date"])
        .ok_or_else(|| CycleError::unavailable(format!("{}: no date column", path.display())))?;
    let close_col = column_index(&headers, &["close", "price"])
        .ok_or_else(|| CycleError::unavailable(format!("{}: no close column", path.display())))?;

    let mut rows = FileRows::default();
    for rec in rdr.records() {
        let Ok(r) = rec else {
            rows.skipped += 1;
            continue;
        };
        let date = r.get(date_col).and_then(parse_date);
        let price = r.get(close_col).and_then(|s| s.parse::<f64>().ok());
        match (date, price) {
            (Some(d), Some(p)) => match PricePoint::new(d, p) {
                Ok(point) => rows.points.push(point),
                Err(_) => rows.skipped += 1,
            },
            _ => rows.skipped += 1,
        }
    }
    Ok(rows)
}

/// Load and concatenate the yearly archives for `years`.
///
/// Missing or unreadable years are logged and skipped; the call only fails
/// when nothing at all could be loaded.
pub fn load_historical_series(dir: &Path, years: &[i32]) -> CycleResult<PriceSeries> {
    let mut all = Vec::new();
    let mut skipped = 0usize;
    for &year in years {
        let path = year_file(dir, year);
        match read_price_file(&path) {
            Ok(rows) => {
                debug!(
                    "{}: {} rows, {} skipped",
                    path.display(),
                    rows.points.len(),
                    rows.skipped
                );
                skipped += rows.skipped;
                all.extend(rows.points);
            }
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    if skipped > 0 {
        warn!("skipped {} malformed rows while loading history", skipped);
    }
    if all.is_empty() {
        return Err(CycleError::unavailable(format!(
            "no price rows found in {} for years {:?}",
            dir.display(),
            years
        )));
    }
    let series = PriceSeries::from_points(all);
    info!(
        "loaded {} daily prices from {}",
        series.len(),
        dir.display()
    );
    Ok(series)
}

/// Load every archive present in `dir`.
pub fn load_all_history(dir: &Path) -> CycleResult<PriceSeries> {
    let years = available_years(dir)?;
    load_historical_series(dir, &years)
}

/// Keeps one loaded series for the life of the process.
#[derive(Debug, Clone)]
pub struct HistoryCache {
    dir: PathBuf,
    series: Option<Arc<PriceSeries>>,
    loads: usize,
}

impl HistoryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            series: None,
            loads: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get_or_load(&mut self) -> CycleResult<Arc<PriceSeries>> {
        if let Some(s) = &self.series {
            return Ok(Arc::clone(s));
        }
        self.reload()
    }

    pub fn reload(&mut self) -> CycleResult<Arc<PriceSeries>> {
        let series = Arc::new(load_all_history(&self.dir)?);
        self.loads += 1;
        self.series = Some(Arc::clone(&series));
        Ok(series)
    }

    /// How many times the archives were actually read.
    pub fn loads(&self) -> usize {
        self.loads
    }
}

/// HTTP client for the quote and archive endpoints.
pub fn mk_client(timeout: Duration) -> CycleResult<Client> {
    let client = Client::builder()
        .user_agent("btc_cycle_timer/0.1 (rust)")
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()?;
    Ok(client)
}

/// Extract `bitcoin.usd` from a simple-price payload.
pub fn parse_quote(v: &serde_json::Value) -> Option<f64> {
    v.get("bitcoin")
        .and_then(|b| b.get("usd"))
        .and_then(|p| p.as_f64())
        .filter(|p| *p > 0.0 && p.is_finite())
}

/// Single GET, no retry. Every failure is `DataUnavailable`.
pub async fn fetch_current_price(client: &Client, url: &str) -> CycleResult<f64> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(CycleError::unavailable(format!("price endpoint returned {status}")));
    }
    let body = resp.json::<serde_json::Value>().await?;
    parse_quote(&body)
        .ok_or_else(|| CycleError::unavailable("price payload has no positive bitcoin.usd field"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuoteSource {
    Live,
    Historical(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    pub price: f64,
    pub source: QuoteSource,
}

/// Prefer the live quote; otherwise fall back to the newest archived close.
pub fn resolve_price(fetched: CycleResult<f64>, history: Option<&PriceSeries>) -> Option<PriceQuote> {
    match fetched {
        Ok(price) => Some(PriceQuote {
            price,
            source: QuoteSource::Live,
        }),
        Err(e) => {
            warn!("live price unavailable ({}); using last archived close", e);
            history.and_then(|s| s.last()).map(|p| PriceQuote {
                price: p.price,
                source: QuoteSource::Historical(p.date),
            })
        }
    }
}

/// Live quote with archive fallback. Never fails.
pub async fn current_price_or_fallback(
    client: &Client,
    url: &str,
    history: Option<&PriceSeries>,
) -> Option<PriceQuote> {
    resolve_price(fetch_current_price(client, url).await, history)
}

/// Turn Binance kline arrays (`[open_ms, open, high, low, close, ...]`) into
/// daily closes. Prices arrive as strings.
pub fn parse_klines(v: &serde_json::Value) -> Vec<PricePoint> {
    let Some(arr) = v.as_array() else {
        return vec![];
    };
    let mut out = Vec::with_capacity(arr.len());
    for k in arr {
        let Some(a) = k.as_array() else { continue };
        if a.len() < 5 {
            continue;
        }
        let ts_ms = a[0].as_i64().or_else(|| a[0].as_f64().map(|x| x as i64));
        let close = a[4]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .or_else(|| a[4].as_f64());
        let date = ts_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(|dt| dt.date_naive());
        if let (Some(d), Some(c)) = (date, close)
            && let Ok(p) = PricePoint::new(d, c)
        {
            out.push(p);
        }
    }
    out
}

/// GET with bounded retry/backoff (+Retry-After). Used for archive downloads only.
pub async fn do_get_json<T: for<'de> serde::Deserialize<'de>>(
    client: &Client,
    url: reqwest::Url,
) -> CycleResult<T> {
    let mut attempt = 0u64;
    loop {
        let resp = client.get(url.clone()).send().await?;
        if resp.status().is_success() {
            return Ok(resp.json::<T>().await?);
        }
        let status = resp.status();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        attempt += 1;
        if attempt > DOWNLOAD_RETRIES {
            let txt = resp.text().await.unwrap_or_default();
            return Err(CycleError::unavailable(format!(
                "HTTP {status} after retries; body: {txt}"
            )));
        }
        let backoff_ms = retry_after.map(|s| s * 1000).unwrap_or(300 * attempt);
        info!("{} -> retrying in {}ms", status, backoff_ms);
        sleep(Duration::from_millis(backoff_ms)).await;
    }
}

/// Write `date,close` rows to `path` through a temp file + rename.
pub fn write_price_file(path: &Path, points: &[PricePoint]) -> CycleResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    {
        let mut wtr = WriterBuilder::new().from_writer(tmp.as_file_mut());
        wtr.write_record(["date", "close"])?;
        for p in points {
            wtr.write_record(&[p.date.format("%Y-%m-%d").to_string(), p.price.to_string()])?;
        }
        wtr.flush()?;
    }
    tmp.persist(path).map_err(|e| CycleError::unavailable(e.to_string()))?;
    Ok(())
}

/// Download one calendar year of daily closes into `btc_price_<year>.csv`.
pub async fn download_year(client: &Client, dir: &Path, year: i32) -> CycleResult<usize> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| CycleError::invalid(format!("bad year {year}")))?;
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)
        .ok_or_else(|| CycleError::invalid(format!("bad year {year}")))?;
    let start_ms = start.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    let end_ms = end.and_time(NaiveTime::MIN).and_utc().timestamp_millis() - 1;

    let url = reqwest::Url::parse_with_params(
        BINANCE_KLINES_URL,
        &[
            ("symbol", BINANCE_SYMBOL.to_string()),
            ("interval", "1d".to_string()),
            ("startTime", start_ms.to_string()),
            ("endTime", end_ms.to_string()),
            ("limit", "366".to_string()),
        ],
    )
    .map_err(|e| CycleError::invalid(e.to_string()))?;

    let val = do_get_json::<serde_json::Value>(client, url).await?;
    let points: Vec<PricePoint> = parse_klines(&val)
        .into_iter()
        .filter(|p| p.date.year() == year)
        .collect();
    if points.is_empty() {
        return Err(CycleError::unavailable(format!("no klines for {year}")));
    }
    let series = PriceSeries::from_points(points);
    let path = year_file(dir, year);
    write_price_file(&path, series.points())?;
    info!("wrote {} ({} days)", path.display(), series.len());
    Ok(series.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn write(dir: &Path, name: &str, body: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn from_points_sorts_and_keeps_last_per_day() {
        let s = PriceSeries::from_points(vec![
            PricePoint::new(d(2021, 1, 2), 2.0).unwrap(),
            PricePoint::new(d(2021, 1, 1), 1.0).unwrap(),
            PricePoint::new(d(2021, 1, 2), 3.0).unwrap(),
        ]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(d(2021, 1, 2)), Some(3.0));
        assert_eq!(s.first().unwrap().date, d(2021, 1, 1));
    }

    #[test]
    fn price_on_uses_last_sample_at_or_before() {
        let s = PriceSeries::from_points(vec![
            PricePoint::new(d(2022, 11, 20), 16_000.0).unwrap(),
            PricePoint::new(d(2022, 11, 22), 15_700.0).unwrap(),
        ]);
        assert_eq!(s.price_on(d(2022, 11, 21)), Some(16_000.0));
        assert_eq!(s.price_on(d(2022, 11, 30)), Some(15_700.0));
        assert_eq!(s.price_on(d(2022, 11, 1)), None);
        assert_eq!(s.between(d(2022, 11, 21), d(2022, 11, 22)).len(), 1);
        assert!(s.covers(d(2022, 11, 22), d(2022, 11, 22)));
        assert!(!s.covers(d(2022, 11, 20), d(2022, 11, 22)));
        assert!(!s.covers(d(2022, 11, 19), d(2022, 11, 20)));
    }

    #[test]
    fn non_positive_price_is_rejected() {
        assert!(PricePoint::new(d(2020, 1, 1), 0.0).is_err());
        assert!(PricePoint::new(d(2020, 1, 1), -5.0).is_err());
        assert!(PricePoint::new(d(2020, 1, 1), f64::NAN).is_err());
    }

    #[test]
    fn read_price_file_skips_bad_rows_and_ignores_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "btc_price_2020.csv",
            "date,open,Close,volume\n\
             2020-01-01,7200,7200.17,1\n\
             not-a-date,1,2,3\n\
             2020-01-02,7200,abc,1\n\
             2020-01-03,7300,-1,1\n\
             2020-01-04 00:00:00,7400,7410.5,1\n",
        );
        let rows = read_price_file(&year_file(dir.path(), 2020)).unwrap();
        assert_eq!(rows.points.len(), 2);
        assert_eq!(rows.skipped, 3);
        assert_eq!(rows.points[1].date, d(2020, 1, 4));
    }

    #[test]
    fn missing_years_are_skipped_but_empty_load_fails() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "btc_price_2021.csv", "date,close\n2021-06-01,36000\n");
        let s = load_historical_series(dir.path(), &[2020, 2021]).unwrap();
        assert_eq!(s.len(), 1);

        let err = load_historical_series(dir.path(), &[2019]).unwrap_err();
        assert!(matches!(err, CycleError::DataUnavailable(_)));
    }

    #[test]
    fn available_years_lists_archives_only() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "btc_price_2021.csv", "date,close\n");
        write(dir.path(), "btc_price_2020.csv", "date,close\n");
        write(dir.path(), "notes.txt", "x");
        assert_eq!(available_years(dir.path()).unwrap(), vec![2020, 2021]);
    }

    #[test]
    fn cache_reads_archives_once_until_reload() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "btc_price_2021.csv", "date,close\n2021-06-01,36000\n");
        let mut cache = HistoryCache::new(dir.path());
        let a = cache.get_or_load().unwrap();
        let b = cache.get_or_load().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.loads(), 1);
        cache.reload().unwrap();
        assert_eq!(cache.loads(), 2);
    }

    #[test]
    fn parse_quote_requires_positive_usd() {
        assert_eq!(parse_quote(&json!({"bitcoin": {"usd": 67000.5}})), Some(67000.5));
        assert_eq!(parse_quote(&json!({"bitcoin": {"usd": 0}})), None);
        assert_eq!(parse_quote(&json!({"bitcoin": {"eur": 1.0}})), None);
        assert_eq!(parse_quote(&json!({"error": "rate limited"})), None);
    }

    #[test]
    fn resolve_price_falls_back_to_last_close() {
        let s = PriceSeries::from_points(vec![
            PricePoint::new(d(2025, 1, 1), 94_000.0).unwrap(),
            PricePoint::new(d(2025, 1, 2), 96_000.0).unwrap(),
        ]);
        let q = resolve_price(Err(CycleError::unavailable("timeout")), Some(&s)).unwrap();
        assert_eq!(q.price, 96_000.0);
        assert_eq!(q.source, QuoteSource::Historical(d(2025, 1, 2)));

        let live = resolve_price(Ok(100_000.0), Some(&s)).unwrap();
        assert_eq!(live.source, QuoteSource::Live);

        assert!(resolve_price(Err(CycleError::unavailable("x")), None).is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_back_without_error() {
        let s = PriceSeries::from_points(vec![PricePoint::new(d(2025, 3, 1), 85_000.0).unwrap()]);
        let client = mk_client(Duration::from_secs(2)).unwrap();
        let q = current_price_or_fallback(&client, "http://127.0.0.1:9/price", Some(&s))
            .await
            .unwrap();
        assert_eq!(q.price, 85_000.0);
        assert!(matches!(q.source, QuoteSource::Historical(_)));
    }

    #[test]
    fn parse_klines_reads_string_closes() {
        // 2020-01-01T00:00:00Z and 2020-01-02T00:00:00Z
        let v = json!([
            [1577836800000i64, "7195.24", "7255.00", "7175.15", "7200.85", "16792.38"],
            [1577923200000i64, "7200.77", "7212.50", "6924.74", "6965.71", "31951.48"],
            ["bad"]
        ]);
        let pts = parse_klines(&v);
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0].date, d(2020, 1, 1));
        assert_eq!(pts[1].price, 6965.71);
    }

    #[test]
    fn written_archive_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let pts = vec![
            PricePoint::new(d(2024, 4, 19), 63_800.0).unwrap(),
            PricePoint::new(d(2024, 4, 20), 64_926.123_456_78).unwrap(),
            PricePoint::new(d(2024, 4, 21), 0.000_123_4).unwrap(),
        ];
        write_price_file(&year_file(dir.path(), 2024), &pts).unwrap();
        let s = load_historical_series(dir.path(), &[2024]).unwrap();
        assert_eq!(s.points(), pts.as_slice());
    }
}
