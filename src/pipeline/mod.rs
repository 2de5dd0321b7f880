//! Scan orchestrator: universe → history → indicators → scores → selection.
//!
//! One `run()` is a single pass over the universe. Tickers that cannot be
//! fetched, lack history, or produce an undefined indicator are counted and
//! dropped; they never fail the run.

use crate::config::{AppConfig, Provider, Scheme};
use crate::indicators::IndicatorSnapshot;
use crate::loader::discover_symbols;
use crate::market::http_client::HttpClient;
use crate::market::{self, MarketDataSource};
use crate::models::{ScoredPick, Selection, Series, SkipReason};
use crate::scoring;
use crate::universe::TickerSource;
use anyhow::{Context, Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Scanner {
    config: AppConfig,
    source: Arc<dyn MarketDataSource>,
}

impl Scanner {
    pub fn new(config: AppConfig) -> Result<Self> {
        let source = market::build_source(&config.market_data).context("Failed to build market data source")?;
        Ok(Self::with_source(config, source))
    }

    pub fn with_source(config: AppConfig, source: Arc<dyn MarketDataSource>) -> Self {
        Self { config, source }
    }

    /// Tickers to scan. With the CSV provider and no fixed list, the universe
    /// is whatever has a file in the history directory.
    pub async fn universe(&self) -> Result<BTreeSet<String>> {
        let cfg = &self.config;

        if cfg.market_data.provider == Provider::Csv && cfg.universe.tickers.is_empty() {
            let symbols = discover_symbols(&cfg.market_data.csv_dir)?;
            if symbols.is_empty() {
                bail!("No CSV files in {:?}", cfg.market_data.csv_dir);
            }
            info!("{} tickers found in {:?}", symbols.len(), cfg.market_data.csv_dir);
            return Ok(symbols);
        }

        let client = HttpClient::new(&cfg.market_data).context("Failed to build HTTP client")?;
        Ok(TickerSource::new(&cfg.universe, Box::new(client)).get_tickers().await)
    }

    pub async fn run(&self, scheme: Scheme) -> Result<ScanReport> {
        // ── 1. Universe ───────────────────────────────────────────────────────
        info!("=== Step 1: Resolving universe ===");
        let tickers = self.universe().await?;
        info!("{} tickers in universe", tickers.len());

        // ── 2. History ────────────────────────────────────────────────────────
        info!("=== Step 2: Fetching history ({} tickers) ===", tickers.len());
        let batch = market::fetch_all(Arc::clone(&self.source), &tickers, self.config.pipeline.concurrency).await;

        // ── 3. Indicators + scoring ───────────────────────────────────────────
        info!("=== Step 3: Scoring ({:?}) ===", scheme);
        let evaluation = evaluate_batch(&batch.series, scheme, &self.config);
        let admitted = evaluation.picks.len();
        let selection = scoring::select(evaluation.picks, scheme, &self.config.scan);

        let report = ScanReport {
            scheme,
            scanned: tickers.len(),
            fetched: batch.series.len(),
            failed: batch.failed,
            insufficient: evaluation.insufficient,
            undefined: evaluation.undefined,
            evaluated: evaluation.evaluated,
            admitted,
            selection,
        };

        info!(
            "=== Done: {} scanned | {} fetched | {} failed | {} short | {} undefined | {} selected ===",
            report.scanned,
            report.fetched,
            report.failed,
            report.insufficient,
            report.undefined,
            report.selection.len(),
        );

        Ok(report)
    }
}

/// Picks and skip counts for a set of downloaded series.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub picks: Vec<ScoredPick>,
    pub evaluated: usize,
    pub insufficient: usize,
    pub undefined: usize,
}

/// Compute a snapshot and score every series, in ticker order.
pub fn evaluate_batch(series: &BTreeMap<String, Series>, scheme: Scheme, config: &AppConfig) -> Evaluation {
    let required = config.indicators.required_bars(scheme);
    let mut out = Evaluation::default();

    for (ticker, s) in series {
        match IndicatorSnapshot::compute(s, &config.indicators, required) {
            Ok(snap) => {
                out.evaluated += 1;
                if let Some(pick) = scoring::evaluate(ticker, &snap, scheme, &config.scan) {
                    debug!("{}: score {} ({})", ticker, pick.score, pick.reason);
                    out.picks.push(pick);
                }
            }
            Err(reason @ SkipReason::InsufficientHistory { .. }) => {
                debug!("{}: skipped, {}", ticker, reason);
                out.insufficient += 1;
            }
            Err(reason) => {
                warn!("{}: skipped, {}", ticker, reason);
                out.undefined += 1;
            }
        }
    }

    out
}

#[derive(Debug)]
pub struct ScanReport {
    pub scheme: Scheme,
    pub scanned: usize,
    pub fetched: usize,
    pub failed: usize,
    pub insufficient: usize,
    pub undefined: usize,
    pub evaluated: usize,
    pub admitted: usize,
    pub selection: Selection,
}
