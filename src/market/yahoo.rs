//! Daily bars from the Yahoo Finance chart endpoint.

use super::MarketDataSource;
use super::http_client::{FetchError, HttpClient};
use crate::config::MarketDataConfig;
use crate::models::RawBar;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;
use url::Url;

// ── Response shape ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Turn a chart response body into raw rows. Nulls stay `None`.
pub fn parse_chart(body: &str) -> Result<Vec<RawBar>, FetchError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    if let Some(err) = envelope.chart.error {
        return Err(FetchError::Decode(format!("{}: {}", err.code, err.description)));
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or(FetchError::Empty)?;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let at = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();

    Ok(result
        .timestamp
        .iter()
        .enumerate()
        .map(|(i, &ts)| RawBar {
            date: DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()),
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close: at(&quote.close, i),
            volume: at(&quote.volume, i),
        })
        .collect())
}

// ── Source ────────────────────────────────────────────────────────────────────

pub struct YahooChartSource {
    client: HttpClient,
    base_url: String,
    range: String,
}

impl YahooChartSource {
    pub fn new(config: &MarketDataConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            range: config.range.clone(),
        })
    }

    fn chart_url(&self, ticker: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/{}", self.base_url, ticker),
            &[("range", self.range.as_str()), ("interval", "1d")],
        )
        .with_context(|| format!("Bad chart URL for {}", ticker))
    }
}

#[async_trait]
impl MarketDataSource for YahooChartSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_history(&self, ticker: &str) -> Result<Vec<RawBar>> {
        let url = self.chart_url(ticker)?;
        let body = self
            .client
            .get_text(url.as_str())
            .await
            .with_context(|| format!("Failed to fetch chart for {}", ticker))?;

        let rows = parse_chart(&body).with_context(|| format!("Bad chart payload for {}", ticker))?;
        debug!("{}: {} rows", ticker, rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "AAPL", "currency": "USD"},
                "timestamp": [1735828200, 1735914600, 1736173800],
                "indicators": {
                    "quote": [{
                        "open": [248.93, 243.36, null],
                        "high": [249.10, 244.18, 247.33],
                        "low": [241.82, 241.89, 243.20],
                        "close": [243.85, 243.36, 245.00],
                        "volume": [55740700, 40244100, null]
                    }],
                    "adjclose": [{"adjclose": [243.58, 243.09, 244.73]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_rows() {
        let rows = parse_chart(BODY).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 1, 2));
        assert_eq!(rows[0].close, Some(243.85));
        assert_eq!(rows[1].volume, Some(40_244_100.0));
        assert_eq!(rows[2].open, None);
        assert!(rows[2].complete().is_none());
        assert!(rows[0].complete().is_some());
    }

    #[test]
    fn test_parse_chart_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(body).unwrap_err();
        assert!(matches!(err, FetchError::Decode(msg) if msg.contains("delisted")));
    }

    #[test]
    fn test_parse_chart_empty() {
        let body = r#"{"chart":{"result":[],"error":null}}"#;
        assert!(matches!(parse_chart(body), Err(FetchError::Empty)));
    }
}
