use crate::models::RawBar;
use chrono::NaiveDate;
use csv::StringRecord;

// ── Cell parsers ──────────────────────────────────────────────────────────────

fn is_blank(s: &str) -> bool {
    s.is_empty() || s == "N/A" || s == "-" || s == "—" || s.eq_ignore_ascii_case("null")
}

/// Parse price: strip everything except digits, dot, minus.
/// "$1,234.56" → 1234.56 | "610.00" → 610.0
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if is_blank(s) {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

/// Parse volume with K/M/B suffixes.
/// "1.2M" → 1,200,000 | "345K" → 345,000 | "12345" → 12345
pub fn parse_volume(s: &str) -> Option<f64> {
    let s = s.trim().to_uppercase().replace(',', "");
    if is_blank(&s) {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('B') {
        (n, 1_000_000_000.0)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1_000_000.0)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1_000.0)
    } else {
        (s.as_str(), 1.0)
    };

    let num: f64 = num_str.trim().parse().ok()?;
    (num >= 0.0).then_some(num * multiplier)
}

/// Parse dates: ISO first, then the common export layouts.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let try_formats = |s: &str| {
        ["%Y-%m-%d", "%m/%d/%Y", "%b %d, %Y", "%d %b %Y", "%Y/%m/%d"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    };
    let s = s.trim();
    // Some exports carry a time part: "2025-01-02 00:00:00-05:00"
    try_formats(s).or_else(|| s.split_whitespace().next().and_then(try_formats))
}

// ── CSV rows ──────────────────────────────────────────────────────────────────

/// Column positions of an OHLCV export, found by header name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub volume: usize,
}

impl ColumnMap {
    /// Match headers case-insensitively. `Adj Close` is not `Close`.
    pub fn from_headers(headers: &StringRecord) -> Option<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
        };
        Some(Self {
            date: find("date")?,
            open: find("open")?,
            high: find("high")?,
            low: find("low")?,
            close: find("close").or_else(|| find("price"))?,
            volume: find("volume").or_else(|| find("vol."))?,
        })
    }

    pub fn to_raw(&self, record: &StringRecord) -> RawBar {
        RawBar {
            date: record.get(self.date).and_then(parse_date),
            open: record.get(self.open).and_then(parse_price),
            high: record.get(self.high).and_then(parse_price),
            low: record.get(self.low).and_then(parse_price),
            close: record.get(self.close).and_then(parse_price),
            volume: record.get(self.volume).and_then(parse_volume),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
