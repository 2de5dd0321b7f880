use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::indicators::IndicatorSnapshot;

// ── Bars ──────────────────────────────────────────────────────────────────────

/// One trading day for one ticker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// A provider row before validation. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBar {
    pub date: Option<NaiveDate>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl RawBar {
    /// A complete bar, or `None` when a field is missing or the close is not positive.
    pub fn complete(&self) -> Option<Bar> {
        let close = self.close.filter(|c| c.is_finite() && *c > 0.0)?;
        let volume = self.volume.filter(|v| v.is_finite() && *v >= 0.0)?;
        Some(Bar {
            date: self.date?,
            open: self.open.filter(|v| v.is_finite())?,
            high: self.high.filter(|v| v.is_finite())?,
            low: self.low.filter(|v| v.is_finite())?,
            close,
            volume: volume.round() as u64,
        })
    }
}

// ── Series ────────────────────────────────────────────────────────────────────

/// Ascending, date-unique bars for a single ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub ticker: String,
    pub bars: Vec<Bar>,
}

impl Series {
    /// Drop incomplete rows, sort by date and keep the last row seen for each date.
    pub fn from_raw(ticker: impl Into<String>, rows: impl IntoIterator<Item = RawBar>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();
        for bar in rows.into_iter().filter_map(|r| r.complete()) {
            by_date.insert(bar.date, bar);
        }
        Self {
            ticker: ticker.into(),
            bars: by_date.into_values().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume as f64).collect()
    }
}

// ── Per-ticker outcome ────────────────────────────────────────────────────────

/// Why a ticker produced no pick. Neither variant aborts a scan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("insufficient history ({have} bars, need {need})")]
    InsufficientHistory { have: usize, need: usize },

    #[error("{0} is undefined")]
    Undefined(&'static str),
}

// ── Picks ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Rating {
    #[serde(rename = "STRONG BUY")]
    StrongBuy,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "NEUTRAL")]
    Neutral,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "STRONG PUT")]
    StrongPut,
}

impl Rating {
    pub fn label(self) -> &'static str {
        match self {
            Rating::StrongBuy => "STRONG BUY",
            Rating::Buy => "BUY",
            Rating::Neutral => "NEUTRAL",
            Rating::Put => "PUT",
            Rating::StrongPut => "STRONG PUT",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Pattern {
    #[serde(rename = "PARABOLIC TOP")]
    ParabolicTop,
    #[serde(rename = "BREAKOUT ROCKET")]
    BreakoutRocket,
}

/// A scored ticker. Field order is the JSON field order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredPick {
    pub ticker: String,
    pub price: f64,
    pub score: i32,
    pub reason: String,
    pub rsi: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias: Option<Bias>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bullish_score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearish_score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,

    #[serde(skip)]
    pub snapshot: IndicatorSnapshot,
}

/// Final picks of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Ranked(Vec<ScoredPick>),
    Split {
        bullish: Vec<ScoredPick>,
        bearish: Vec<ScoredPick>,
    },
}

impl Selection {
    pub fn len(&self) -> usize {
        match self {
            Selection::Ranked(picks) => picks.len(),
            Selection::Split { bullish, bearish } => bullish.len() + bearish.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Result sets ───────────────────────────────────────────────────────────────

/// The JSON document written by `scan`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResultSet {
    Ranked {
        last_updated: String,
        picks: Vec<ScoredPick>,
    },
    Split {
        last_updated: String,
        bullish: Vec<ScoredPick>,
        bearish: Vec<ScoredPick>,
    },
}

impl ResultSet {
    pub fn new(last_updated: String, selection: Selection) -> Self {
        match selection {
            Selection::Ranked(picks) => ResultSet::Ranked { last_updated, picks },
            Selection::Split { bullish, bearish } => ResultSet::Split {
                last_updated,
                bullish,
                bearish,
            },
        }
    }
}
