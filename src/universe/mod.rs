pub mod parsers;

use crate::config::UniverseConfig;
use crate::market::http_client::HttpClient;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{info, warn};

use self::parsers::parse_constituents;

/// Fetches index membership pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        Ok(HttpClient::get_text(self, url).await?)
    }
}

/// Provider ticker convention: share classes use a hyphen (`BRK.B` → `BRK-B`).
pub fn normalise_symbol(s: &str) -> Option<String> {
    let s = s.trim().replace('.', "-");
    if s.is_empty() { None } else { Some(s) }
}

fn normalise_all<'a>(symbols: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    symbols.into_iter().filter_map(|s| normalise_symbol(s)).collect()
}

pub struct TickerSource {
    config: UniverseConfig,
    fetcher: Box<dyn PageFetcher>,
}

impl TickerSource {
    pub fn new(config: &UniverseConfig, fetcher: Box<dyn PageFetcher>) -> Self {
        Self {
            config: config.clone(),
            fetcher,
        }
    }

    /// The scan universe. A failure on any index source discards every
    /// partial result and returns the fallback list.
    pub async fn get_tickers(&self) -> BTreeSet<String> {
        if !self.config.tickers.is_empty() {
            info!("Using fixed universe of {} tickers", self.config.tickers.len());
            return normalise_all(&self.config.tickers);
        }

        match self.fetch_index_members().await {
            Ok(tickers) => tickers,
            Err(e) => {
                warn!("Ticker fetch failed, using manual list: {:#}", e);
                normalise_all(&self.config.fallback)
            }
        }
    }

    async fn fetch_index_members(&self) -> Result<BTreeSet<String>> {
        let mut all = BTreeSet::new();

        for source in &self.config.sources {
            info!("Fetching {} members ({})", source.name, source.url);
            let html = self
                .fetcher
                .fetch_page(&source.url)
                .await
                .with_context(|| format!("Failed to fetch {}", source.name))?;

            let symbols = parse_constituents(&html, &source.column)
                .with_context(|| format!("Failed to parse {}", source.name))?;
            info!("  {}: {} symbols", source.name, symbols.len());

            all.extend(symbols.iter().filter_map(|s| normalise_symbol(s)));
        }

        if all.is_empty() {
            bail!("no index sources produced symbols");
        }
        Ok(all)
    }
}
