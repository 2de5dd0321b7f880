//! Pick cards spliced into marked regions of an existing page.
//!
//! A region starts right after a literal start marker and ends where its end
//! anchor begins. The anchor is a token sequence that may be separated by
//! whitespace only, so reformatted indentation still matches. A missing marker
//! is an error and nothing is written.

use crate::config::{OutputConfig, RegionConfig};
use crate::models::{ScoredPick, Selection};
use crate::utils::round_to;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Indentation placed before the end anchor after a splice.
const ANCHOR_INDENT: &str = "                ";

#[derive(Debug, Error, PartialEq)]
pub enum HtmlError {
    #[error("{region} region: marker {marker:?} not found")]
    MarkerNotFound { region: String, marker: String },
}

// ── Document ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HtmlDocument {
    path: Option<PathBuf>,
    source: String,
}

impl HtmlDocument {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            path: None,
            source: source.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).with_context(|| format!("Cannot read {:?}", path))?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..Self::new(source)
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Replace the body of `region` with `fragment`.
    pub fn splice(&mut self, region: &RegionConfig, fragment: &str) -> Result<(), HtmlError> {
        let missing = |marker: String| HtmlError::MarkerNotFound {
            region: region.name.clone(),
            marker,
        };

        let start = self
            .source
            .find(&region.start)
            .ok_or_else(|| missing(region.start.clone()))?;
        let body_start = start + region.start.len();
        let anchor = find_anchor(&self.source, body_start, &region.end)
            .ok_or_else(|| missing(region.end.join(" ")))?;

        let mut out = String::with_capacity(self.source.len() + fragment.len());
        out.push_str(&self.source[..body_start]);
        out.push('\n');
        out.push_str(fragment);
        out.push('\n');
        out.push_str(ANCHOR_INDENT);
        out.push_str(&self.source[anchor..]);
        self.source = out;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = self.path.as_deref().context("Document was not loaded from a file")?;
        super::write_atomic(path, &self.source)
    }
}

/// Byte offset of the first place at or after `from` where `tokens` follow
/// each other separated only by whitespace.
fn find_anchor(haystack: &str, from: usize, tokens: &[String]) -> Option<usize> {
    let (first, rest) = tokens.split_first()?;

    haystack[from..]
        .match_indices(first.as_str())
        .map(|(i, _)| from + i)
        .find(|&pos| {
            let mut tail = &haystack[pos + first.len()..];
            rest.iter().all(|tok| {
                tail = tail.trim_start();
                match tail.strip_prefix(tok.as_str()) {
                    Some(after) => {
                        tail = after;
                        true
                    }
                    None => false,
                }
            })
        })
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Up to three triggered signals, in priority order.
pub fn catalyst(pick: &ScoredPick) -> String {
    let s = &pick.snapshot;
    let mut catalysts = Vec::new();

    if s.rsi < 30.0 {
        catalysts.push("Extreme oversold RSI".to_string());
    } else if s.rsi > 70.0 {
        catalysts.push("Extreme overbought RSI".to_string());
    }

    if s.macd.abs() > 1.0 {
        if s.macd > s.macd_signal {
            catalysts.push("Bullish MACD crossover".to_string());
        } else {
            catalysts.push("Bearish MACD crossover".to_string());
        }
    }

    if s.volume_ratio > 1.5 {
        catalysts.push(format!("High volume ({}x average)", round_to(s.volume_ratio, 2)));
    }

    if let Some(long) = s.sma_long {
        if s.close > s.sma_slow && s.sma_slow > long {
            catalysts.push("Golden cross pattern".to_string());
        } else if s.close < s.sma_slow && s.sma_slow < long {
            catalysts.push("Death cross pattern".to_string());
        }
    }

    if catalysts.is_empty() {
        return "Technical setup aligning".to_string();
    }
    catalysts.truncate(3);
    catalysts.join(". ")
}

/// Price band the pick is expected to move into.
pub fn target_band(pick: &ScoredPick, bearish: bool) -> (f64, f64) {
    let s = &pick.snapshot;
    if bearish {
        (s.equilibrium, s.support)
    } else if s.close < s.equilibrium {
        (s.equilibrium, s.resistance)
    } else {
        (s.resistance, s.resistance)
    }
}

pub fn render_pick_card(pick: &ScoredPick, bearish: bool) -> String {
    let s = &pick.snapshot;
    let (target_low, target_high) = target_band(pick, bearish);
    let rating = pick.rating.map(|r| r.label()).unwrap_or("WATCH");
    let class = if bearish { "stock-pick bearish" } else { "stock-pick" };

    format!(
        r#"
                <div class="{class}">
                    <div class="stock-header">
                        <span class="ticker">{ticker}</span>
                        <span class="rating">{rating}</span>
                    </div>
                    <div class="technical-data">
                        <div class="metric"><strong>RSI:</strong> {rsi:.1}</div>
                        <div class="metric"><strong>MACD:</strong> {macd:.2}</div>
                        <div class="metric"><strong>Price:</strong> ${price:.2}</div>
                        <div class="metric"><strong>Target:</strong> ${target_low:.2}-{target_high:.2}</div>
                        <div class="metric"><strong>Support:</strong> ${support:.2}</div>
                        <div class="metric"><strong>Volume:</strong> {volume}M</div>
                    </div>
                    <div class="catalyst">
                        <strong>📊 Catalyst:</strong> {catalyst}. Price at {range:.1}% of 52-week range.
                    </div>
                </div>
"#,
        ticker = escape(&pick.ticker),
        rsi = pick.rsi,
        macd = s.macd,
        price = pick.price,
        support = s.support,
        volume = (s.current_volume / 1_000_000.0).floor() as u64,
        catalyst = escape(&catalyst(pick)),
        range = s.range_position,
    )
}

pub fn render_section(picks: &[ScoredPick], bearish: bool) -> String {
    picks
        .iter()
        .map(|p| render_pick_card(p, bearish))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splice both sections; the document is unchanged unless both regions match.
pub fn apply_selection(doc: &mut HtmlDocument, selection: &Selection, cfg: &OutputConfig) -> Result<(), HtmlError> {
    let (bullish, bearish): (Vec<ScoredPick>, Vec<ScoredPick>) = match selection {
        Selection::Ranked(picks) => (picks.clone(), Vec::new()),
        Selection::Split { bullish, bearish } => (bullish.clone(), bearish.clone()),
    };

    let mut next = doc.clone();
    next.splice(&cfg.bullish_region, &render_section(&bullish, false))?;
    next.splice(&cfg.bearish_region, &render_section(&bearish, true))?;
    *doc = next;
    Ok(())
}

/// Read the page, replace both regions and write it back.
pub fn publish(path: &Path, selection: &Selection, cfg: &OutputConfig) -> Result<()> {
    let mut doc = HtmlDocument::load(path)?;
    apply_selection(&mut doc, selection, cfg).with_context(|| format!("Cannot update {:?}", path))?;
    doc.save()?;

    let (bulls, bears) = match selection {
        Selection::Ranked(p) => (p.len(), 0),
        Selection::Split { bullish, bearish } => (bullish.len(), bearish.len()),
    };
    info!(
        "Updated {:?} with {} bullish and {} bearish picks ({} bytes)",
        path,
        bulls,
        bears,
        doc.as_str().len()
    );
    Ok(())
}
