//! Technical indicators over daily closes, anchored to the last bar.
//!
//! The series functions return one value per input position; positions
//! without enough history are `None`. `IndicatorSnapshot::compute` reads only
//! the last and previous positions plus trailing windows, so there is no
//! look-ahead.

use crate::config::IndicatorConfig;
use crate::models::{Series, SkipReason};

/// Average loss below this counts as no loss at all.
const LOSS_EPSILON: f64 = 1e-9;

// ── Series functions ──────────────────────────────────────────────────────────

/// `values[i] - values[i - 1]`, one element shorter than the input.
pub fn deltas(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Trailing simple moving average.
pub fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    let mut sum: f64 = values[..window].iter().sum();
    out[window - 1] = Some(sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out[i] = Some(sum / window as f64);
    }
    out
}

/// RSI from simple rolling means of gains and losses.
///
/// Position `i` uses the `period` deltas ending at close `i`, so the first
/// defined value is at index `period`. A window without losses reads 100.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }
    let gains: Vec<f64> = deltas(closes).iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas(closes).iter().map(|d| (-d).max(0.0)).collect();

    let avg_gain = sma(&gains, period);
    let avg_loss = sma(&losses, period);

    for (i, (gain, loss)) in avg_gain.iter().zip(&avg_loss).enumerate() {
        if let (Some(gain), Some(loss)) = (gain, loss) {
            out[i + 1] = Some(rsi_from_averages(*gain, *loss));
        }
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss < LOSS_EPSILON {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// Exponentially weighted mean, α = 2 / (span + 1), seeded with the first value.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => p + alpha * (v - p),
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// MACD line and its signal line.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>) {
    let line: Vec<f64> = ema(closes, fast)
        .iter()
        .zip(ema(closes, slow))
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&line, signal);
    (line, signal_line)
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// Mean of the last `n` values (all of them when fewer).
pub fn trailing_mean(values: &[f64], n: usize) -> Option<f64> {
    let window = tail(values, n);
    if window.is_empty() {
        return None;
    }
    Some(window.iter().sum::<f64>() / window.len() as f64)
}

pub fn trailing_max(values: &[f64], n: usize) -> Option<f64> {
    tail(values, n).iter().copied().reduce(f64::max)
}

pub fn trailing_min(values: &[f64], n: usize) -> Option<f64> {
    tail(values, n).iter().copied().reduce(f64::min)
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Indicator values as of the most recent bar of a series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub prev_close: f64,
    pub rsi: f64,
    pub sma_fast: f64,
    pub prev_sma_fast: f64,
    pub sma_slow: f64,
    pub sma_long: Option<f64>,
    pub macd: f64,
    pub macd_signal: f64,
    pub avg_volume: f64,
    pub current_volume: f64,
    pub volume_ratio: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    /// Percent of the 52-week range.
    pub range_position: f64,
    pub support: f64,
    pub resistance: f64,
    pub equilibrium: f64,
    /// Percent above (positive) or below equilibrium, relative to the half range.
    pub pd_position: f64,
}

impl IndicatorSnapshot {
    pub fn compute(
        series: &Series,
        cfg: &IndicatorConfig,
        required_bars: usize,
    ) -> Result<Self, SkipReason> {
        let n = series.len();
        let need = required_bars.max(2);
        if n < need {
            return Err(SkipReason::InsufficientHistory { have: n, need });
        }
        let last = n - 1;
        let prev = n - 2;

        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();
        let volumes = series.volumes();

        let rsi = rsi(&closes, cfg.rsi_period)[last].ok_or(SkipReason::Undefined("rsi"))?;

        let fast = sma(&closes, cfg.sma_fast);
        let sma_fast = fast[last].ok_or(SkipReason::Undefined("sma_fast"))?;
        let prev_sma_fast = fast[prev].ok_or(SkipReason::Undefined("sma_fast"))?;
        let sma_slow = sma(&closes, cfg.sma_slow)[last].ok_or(SkipReason::Undefined("sma_slow"))?;
        let sma_long = sma(&closes, cfg.sma_long)[last];

        let (macd_line, signal_line) =
            macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);

        let avg_volume = trailing_mean(&volumes, cfg.volume_window)
            .ok_or(SkipReason::Undefined("avg_volume"))?;
        if avg_volume <= 0.0 {
            return Err(SkipReason::Undefined("volume_ratio"));
        }
        let current_volume = volumes[last];

        let high_52w = trailing_max(&highs, cfg.range_window).ok_or(SkipReason::Undefined("high_52w"))?;
        let low_52w = trailing_min(&lows, cfg.range_window).ok_or(SkipReason::Undefined("low_52w"))?;
        if high_52w == low_52w {
            return Err(SkipReason::Undefined("range_position"));
        }

        let resistance =
            trailing_max(&highs, cfg.zone_window).ok_or(SkipReason::Undefined("resistance"))?;
        let support = trailing_min(&lows, cfg.zone_window).ok_or(SkipReason::Undefined("support"))?;
        let equilibrium = (resistance + support) / 2.0;
        if resistance == equilibrium {
            return Err(SkipReason::Undefined("pd_position"));
        }

        let close = closes[last];
        let snapshot = Self {
            close,
            prev_close: closes[prev],
            rsi,
            sma_fast,
            prev_sma_fast,
            sma_slow,
            sma_long,
            macd: macd_line[last],
            macd_signal: signal_line[last],
            avg_volume,
            current_volume,
            volume_ratio: current_volume / avg_volume,
            high_52w,
            low_52w,
            range_position: (close - low_52w) / (high_52w - low_52w) * 100.0,
            support,
            resistance,
            equilibrium,
            pd_position: (close - equilibrium) / (resistance - equilibrium) * 100.0,
        };
        snapshot.check_finite()?;
        Ok(snapshot)
    }

    fn check_finite(&self) -> Result<(), SkipReason> {
        let fields = [
            ("rsi", self.rsi),
            ("sma_fast", self.sma_fast),
            ("sma_slow", self.sma_slow),
            ("macd", self.macd),
            ("macd_signal", self.macd_signal),
            ("volume_ratio", self.volume_ratio),
            ("range_position", self.range_position),
            ("pd_position", self.pd_position),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, _)) => Err(SkipReason::Undefined(*name)),
            None => Ok(()),
        }
    }
}
