//! CSV history loader: one `<TICKER>.csv` OHLCV export per ticker.

use crate::market::MarketDataSource;
use crate::market::cleaner::ColumnMap;
use crate::models::RawBar;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extract the ticker from a CSV filename, e.g. `brk-b.csv` → `BRK-B`.
pub fn extract_symbol_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let symbol = stem.split([' ', '_']).next()?.trim().to_uppercase();

    if symbol.is_empty() { None } else { Some(symbol) }
}

/// Parse an OHLCV CSV with a header row. Unreadable rows are skipped.
pub fn load_csv(path: &Path) -> Result<Vec<RawBar>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Cannot open {:?}", path))?;

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)
        .with_context(|| format!("{:?} lacks Date/Open/High/Low/Close/Volume headers", path))?;

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        match result {
            Ok(record) => rows.push(columns.to_raw(&record)),
            Err(e) => warn!("Row {} in {:?}: {}", i + 1, path, e),
        }
    }

    debug!("{:?}: {} rows", path, rows.len());
    Ok(rows)
}

pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "csv").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Tickers that have a CSV file in `dir`.
pub fn discover_symbols(dir: &Path) -> Result<BTreeSet<String>> {
    Ok(discover_csv_files(dir)?
        .iter()
        .filter_map(|p| extract_symbol_from_filename(p))
        .collect())
}

// ── Source ────────────────────────────────────────────────────────────────────

/// Offline history source reading `<dir>/<TICKER>.csv`.
pub struct CsvDirectorySource {
    dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn path_for(&self, ticker: &str) -> Option<PathBuf> {
        [ticker.to_string(), ticker.to_lowercase()]
            .iter()
            .map(|stem| self.dir.join(format!("{stem}.csv")))
            .find(|p| p.is_file())
    }
}

#[async_trait]
impl MarketDataSource for CsvDirectorySource {
    fn name(&self) -> &str {
        "csv"
    }

    async fn fetch_history(&self, ticker: &str) -> Result<Vec<RawBar>> {
        let path = self
            .path_for(ticker)
            .with_context(|| format!("No CSV for {} in {:?}", ticker, self.dir))?;
        load_csv(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CSV: &str = "Date,Open,High,Low,Close,Adj Close,Volume\n\
        2025-01-02,10.0,11.0,9.5,10.5,10.4,1200000\n\
        2025-01-03,10.5,11.5,10.0,,11.0,1300000\n\
        2025-01-06,11.0,12.0,10.8,11.8,11.7,1.4M\n";

    #[test]
    fn test_extract_symbol() {
        assert_eq!(extract_symbol_from_filename(Path::new("data/brk-b.csv")), Some("BRK-B".into()));
        assert_eq!(extract_symbol_from_filename(Path::new("AAPL_daily.csv")), Some("AAPL".into()));
    }

    #[test]
    fn test_load_csv_keeps_nulls_for_cleaning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AAPL.csv");
        fs::write(&path, CSV).unwrap();

        let rows = load_csv(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].close, Some(10.5));
        assert_eq!(rows[1].close, None);
        assert_eq!(rows[2].volume, Some(1_400_000.0));
    }

    #[test]
    fn test_csv_source_fetch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("msft.csv"), CSV).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore").unwrap();

        assert_eq!(
            discover_symbols(dir.path()).unwrap().into_iter().collect::<Vec<_>>(),
            vec!["MSFT".to_string()]
        );

        let source = CsvDirectorySource::new(dir.path());
        let rows = tokio_test::block_on(source.fetch_history("MSFT")).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(tokio_test::block_on(source.fetch_history("NVDA")).is_err());
    }
}
