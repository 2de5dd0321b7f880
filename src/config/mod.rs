use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub universe: UniverseConfig,
    pub market_data: MarketDataConfig,
    pub indicators: IndicatorConfig,
    pub scan: ScanConfig,
    pub output: OutputConfig,
    pub publish: PublishConfig,
    pub pipeline: PipelineConfig,
}

/// Where the ticker universe comes from
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Index membership pages, all of which must parse or the fallback is used.
    pub sources: Vec<IndexSource>,

    pub fallback: Vec<String>,

    /// Fixed universe. When non-empty the index sources are not fetched.
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IndexSource {
    pub name: String,
    pub url: String,
    /// Header text of the column holding the symbols.
    pub column: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Yahoo,
    Csv,
}

/// Historical data provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub provider: Provider,
    pub base_url: String,
    /// Lookback passed to the chart endpoint, e.g. `90d` or `1y`.
    pub range: String,
    pub csv_dir: PathBuf,
    pub timeout_secs: u64,
    pub request_delay_ms: u64,
    pub jitter_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub user_agent: String,
}

/// Window sizes for the indicator engine
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub sma_long: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_window: usize,
    /// 52-week window in trading days.
    pub range_window: usize,
    /// Support/resistance window.
    pub zone_window: usize,
    pub min_bars: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Single additive score, ranked top-N.
    Momentum,
    /// Bullish/bearish score pair with pattern priority slots.
    Composite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub scheme: Scheme,
    pub momentum: MomentumConfig,
    pub composite: CompositeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MomentumConfig {
    pub rsi_oversold: f64,
    pub oversold_points: i32,
    pub breakout_points: i32,
    pub volume_spike_multiplier: f64,
    pub volume_spike_points: i32,
    pub trend_points: i32,
    pub min_score: i32,
    pub top_n: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CompositeConfig {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub volume_ratio: f64,
    pub pd_discount: f64,
    pub pd_premium: f64,
    /// Margin one side must clear to win the rating.
    pub margin: i32,
    pub strong_score: i32,
    pub slots: usize,
    pub priority_slots: usize,
    pub parabolic_range: f64,
    pub parabolic_rsi: f64,
    pub breakout_volume_ratio: f64,
    pub breakout_range: f64,
    pub breakout_rsi_cap: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    Local,
    Utc,
}

/// Output sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub json_path: PathBuf,
    pub html_path: PathBuf,
    pub timezone: Timezone,
    pub bullish_region: RegionConfig,
    pub bearish_region: RegionConfig,
}

/// A replaceable HTML region: everything after `start` up to `end`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RegionConfig {
    pub name: String,
    pub start: String,
    /// Tokens that must follow each other, separated only by whitespace.
    pub end: Vec<String>,
}

/// Settings for the `publish` command
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Watchlist scanned when updating the page. Empty means the scan universe.
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub concurrency: usize,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_sources() -> Vec<IndexSource> {
    vec![
        IndexSource {
            name: "S&P 500".to_string(),
            url: "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies".to_string(),
            column: "Symbol".to_string(),
        },
        IndexSource {
            name: "Nasdaq-100".to_string(),
            url: "https://en.wikipedia.org/wiki/Nasdaq-100".to_string(),
            column: "Ticker".to_string(),
        },
    ]
}

fn default_fallback() -> Vec<String> {
    [
        "AAPL", "MSFT", "TSLA", "NVDA", "AMD", "GOOGL", "AMZN", "META", "NFLX", "PLTR", "SQ",
        "PYPL", "BA", "DIS", "JPM",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// The chart endpoint rate-limits non-browser agents.
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_watchlist() -> Vec<String> {
    [
        // tech
        "AAPL", "MSFT", "NVDA", "GOOGL", "META", "TSLA", "AMD", "INTC",
        // energy
        "XLE", "XOP", "OXY", "CVX", "COP",
        // small caps
        "IWM", "VTWO",
        // commodities
        "GLD", "SLV", "USO",
        // semis
        "SOXX", "SMH", "SNDK",
        // speculative
        "RGTI", "IONQ", "QBTS",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            fallback: default_fallback(),
            tickers: Vec::new(),
        }
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Yahoo,
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            range: "1y".to_string(),
            csv_dir: PathBuf::from("data/history"),
            timeout_secs: 30,
            request_delay_ms: 150,
            jitter_ms: 150,
            max_retries: 3,
            retry_backoff_ms: 500,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            sma_fast: 20,
            sma_slow: 50,
            sma_long: 200,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volume_window: 20,
            range_window: 252,
            zone_window: 50,
            min_bars: 50,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Momentum,
            momentum: MomentumConfig::default(),
            composite: CompositeConfig::default(),
        }
    }
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            rsi_oversold: 40.0,
            oversold_points: 1,
            breakout_points: 2,
            volume_spike_multiplier: 1.3,
            volume_spike_points: 1,
            trend_points: 1,
            min_score: 1,
            top_n: 15,
        }
    }
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            volume_ratio: 1.5,
            pd_discount: -30.0,
            pd_premium: 70.0,
            margin: 2,
            strong_score: 7,
            slots: 3,
            priority_slots: 2,
            parabolic_range: 85.0,
            parabolic_rsi: 70.0,
            breakout_volume_ratio: 2.0,
            breakout_range: 70.0,
            breakout_rsi_cap: 75.0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_path: PathBuf::from("data.json"),
            html_path: PathBuf::from("index.html"),
            timezone: Timezone::Local,
            bullish_region: RegionConfig {
                name: "bullish".to_string(),
                start: "<h2>🚀 Bullish Picks - Next Week</h2>".to_string(),
                end: vec![
                    "</div>".to_string(),
                    "<div class=\"card\">".to_string(),
                    "<h2>📉 Bearish Picks".to_string(),
                ],
            },
            bearish_region: RegionConfig {
                name: "bearish".to_string(),
                start: "<h2>📉 Bearish Picks - Put Opportunities</h2>".to_string(),
                end: vec![
                    "</div>".to_string(),
                    "</div>".to_string(),
                    "<!-- MARKET INTELLIGENCE".to_string(),
                ],
            },
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            tickers: default_watchlist(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

// ── Derived settings ─────────────────────────────────────────────────────────

impl IndicatorConfig {
    /// Bars a series needs before it is scored under `scheme`.
    pub fn required_bars(&self, scheme: Scheme) -> usize {
        match scheme {
            Scheme::Momentum => self.min_bars.max(self.sma_slow),
            Scheme::Composite => self.min_bars.max(self.sma_long),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

fn env_source() -> config::Environment {
    config::Environment::with_prefix("SCANNER")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("universe.tickers")
        .with_list_parse_key("universe.fallback")
        .with_list_parse_key("publish.tickers")
}

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(env_source())
            .build()?;

        cfg.try_deserialize().context("Invalid scanner configuration")
    }

    /// Configuration for `publish`: the watchlist replaces the scan universe.
    pub fn for_publish(mut self) -> Self {
        if !self.publish.tickers.is_empty() {
            self.universe.tickers = self.publish.tickers.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_bars_per_scheme() {
        let cfg = IndicatorConfig::default();
        assert_eq!(cfg.required_bars(Scheme::Momentum), 50);
        assert_eq!(cfg.required_bars(Scheme::Composite), 200);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[scan]\nscheme = \"composite\"\n[scan.momentum]\ntop_n = 25\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.scan.scheme, Scheme::Composite);
        assert_eq!(cfg.scan.momentum.top_n, 25);
        assert_eq!(cfg.scan.momentum.min_score, 1);
        assert_eq!(cfg.indicators.rsi_period, 14);
        assert_eq!(cfg.universe.sources.len(), 2);
        assert_eq!(cfg.output.json_path, PathBuf::from("data.json"));
    }

    #[test]
    fn test_shipped_defaults_match() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.market_data.provider, Provider::Yahoo);
        assert_eq!(cfg.scan.scheme, Scheme::Momentum);
        assert_eq!(cfg.indicators, IndicatorConfig::default());
        assert_eq!(cfg.scan.momentum, MomentumConfig::default());
        assert_eq!(cfg.scan.composite, CompositeConfig::default());
        assert_eq!(cfg.output.timezone, Timezone::Local);
        assert!(cfg.universe.tickers.is_empty());
        assert_eq!(cfg.publish.tickers, default_watchlist());
    }

    #[test]
    fn test_default_agent_is_browser_like() {
        assert!(MarketDataConfig::default().user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_publish_uses_watchlist() {
        let cfg = AppConfig::default().for_publish();
        assert_eq!(cfg.universe.tickers.len(), 24);
        assert!(cfg.universe.tickers.iter().any(|t| t == "SLV"));
        assert!(cfg.universe.tickers.iter().any(|t| t == "SNDK"));

        let mut open = AppConfig::default();
        open.publish.tickers.clear();
        assert!(open.for_publish().universe.tickers.is_empty());
    }

    #[test]
    fn test_env_lists_split_on_commas() {
        let mut env = config::Map::new();
        env.insert("SCANNER__UNIVERSE__TICKERS".to_string(), "AAPL,BRK.B".to_string());
        env.insert("SCANNER__PIPELINE__CONCURRENCY".to_string(), "4".to_string());

        let cfg: AppConfig = config::Config::builder()
            .add_source(env_source().source(Some(env)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.universe.tickers, vec!["AAPL", "BRK.B"]);
        assert_eq!(cfg.pipeline.concurrency, 4);
    }
}
