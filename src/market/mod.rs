pub mod cleaner;
pub mod http_client;
pub mod yahoo;

use crate::config::{MarketDataConfig, Provider};
use crate::loader::CsvDirectorySource;
use crate::models::{RawBar, Series};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use self::yahoo::YahooChartSource;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable historical data source.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Daily rows for one ticker, in any order, possibly with gaps and nulls.
    async fn fetch_history(&self, ticker: &str) -> Result<Vec<RawBar>>;
}

pub fn build_source(config: &MarketDataConfig) -> Result<Arc<dyn MarketDataSource>> {
    Ok(match config.provider {
        Provider::Yahoo => Arc::new(YahooChartSource::new(config)?),
        Provider::Csv => Arc::new(CsvDirectorySource::new(&config.csv_dir)),
    })
}

// ── Batch download ────────────────────────────────────────────────────────────

/// Series for every ticker that could be fetched.
#[derive(Debug, Default)]
pub struct Batch {
    pub series: BTreeMap<String, Series>,
    pub failed: usize,
}

/// Fetch all tickers with at most `concurrency` requests in flight. A ticker
/// that fails is logged and left out of the batch.
pub async fn fetch_all(
    source: Arc<dyn MarketDataSource>,
    tickers: &BTreeSet<String>,
    concurrency: usize,
) -> Batch {
    info!(
        "Downloading history for {} tickers from {} ({} at a time)",
        tickers.len(),
        source.name(),
        concurrency
    );

    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(tickers.len());

    for key in tickers {
        let ticker = key.clone();
        let source = Arc::clone(&source);
        let sem = Arc::clone(&sem);

        let handle = tokio::spawn(async move {
            let _permit = sem.acquire().await?;
            let rows = source.fetch_history(&ticker).await?;
            let series = Series::from_raw(ticker, rows);
            if series.is_empty() {
                bail!("no usable rows");
            }
            Ok::<Series, anyhow::Error>(series)
        });

        handles.push((key.clone(), handle));
    }

    let mut batch = Batch::default();
    for (ticker, handle) in handles {
        match handle.await {
            Ok(Ok(series)) => {
                batch.series.insert(ticker, series);
            }
            Ok(Err(e)) => {
                warn!("{}: {:#}", ticker, e);
                batch.failed += 1;
            }
            Err(e) => {
                error!("Task panic for {}: {}", ticker, e);
                batch.failed += 1;
            }
        }
    }

    info!(
        "Downloaded {} series ({} failed)",
        batch.series.len(),
        batch.failed
    );
    batch
}
