//! Scoring schemes and pick selection.
//!
//! A run uses exactly one scheme. `momentum` adds points for independent
//! bullish signals and ranks a single list; `composite` keeps separate
//! bullish and bearish tallies, derives a rating, and fills per-side slots
//! with pattern matches before backfilling by score.

use crate::config::{CompositeConfig, MomentumConfig, Scheme, ScanConfig};
use crate::indicators::IndicatorSnapshot;
use crate::models::{Bias, Pattern, Rating, ScoredPick, Selection};
use crate::utils::round_to;

// ── Momentum ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MomentumScore {
    pub score: i32,
    pub reasons: Vec<&'static str>,
}

pub fn score_momentum(snap: &IndicatorSnapshot, cfg: &MomentumConfig) -> MomentumScore {
    let mut score = 0;
    let mut reasons = Vec::new();

    if snap.rsi < cfg.rsi_oversold {
        score += cfg.oversold_points;
        reasons.push("Oversold");
    }

    // Close crossed above the fast average on this bar.
    if snap.close > snap.sma_fast && snap.prev_close < snap.prev_sma_fast {
        score += cfg.breakout_points;
        reasons.push("Trend Breakout");
    }

    if snap.current_volume > snap.avg_volume * cfg.volume_spike_multiplier {
        score += cfg.volume_spike_points;
        reasons.push("Volume Spike");
    }

    if snap.close > snap.sma_fast && snap.sma_fast > snap.sma_slow {
        score += cfg.trend_points;
        reasons.push("Bullish Trend");
    }

    MomentumScore { score, reasons }
}

// ── Composite ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeScore {
    pub bullish: i32,
    pub bearish: i32,
    pub rating: Rating,
    pub bias: Bias,
    pub reasons: Vec<&'static str>,
}

impl CompositeScore {
    /// Score of the side that won, or the larger side when neutral.
    pub fn headline(&self) -> i32 {
        match self.bias {
            Bias::Bullish => self.bullish,
            Bias::Bearish => self.bearish,
            Bias::Neutral => self.bullish.max(self.bearish),
        }
    }
}

pub fn score_composite(snap: &IndicatorSnapshot, cfg: &CompositeConfig) -> CompositeScore {
    let mut bullish = 0;
    let mut bearish = 0;
    let mut reasons = Vec::new();

    if snap.rsi < cfg.rsi_oversold {
        bullish += 3;
        reasons.push("RSI Oversold");
    } else if snap.rsi > cfg.rsi_overbought {
        bearish += 3;
        reasons.push("RSI Overbought");
    }

    if snap.macd > snap.macd_signal {
        bullish += 2;
        reasons.push("MACD Bullish");
    } else {
        bearish += 2;
        reasons.push("MACD Bearish");
    }

    if let Some(sma_long) = snap.sma_long {
        if snap.close > snap.sma_slow && snap.sma_slow > sma_long {
            bullish += 2;
            reasons.push("Golden Alignment");
        } else if snap.close < snap.sma_slow && snap.sma_slow < sma_long {
            bearish += 2;
            reasons.push("Death Alignment");
        }
    }

    if snap.volume_ratio > cfg.volume_ratio {
        if snap.close > snap.prev_close {
            bullish += 1;
            reasons.push("Volume Surge Up");
        } else {
            bearish += 1;
            reasons.push("Volume Surge Down");
        }
    }

    if snap.pd_position < cfg.pd_discount {
        bullish += 2;
        reasons.push("Deep Discount");
    } else if snap.pd_position > cfg.pd_premium {
        bearish += 2;
        reasons.push("Premium Zone");
    }

    let (rating, bias) = if bullish > bearish + cfg.margin {
        let rating = if bullish >= cfg.strong_score { Rating::StrongBuy } else { Rating::Buy };
        (rating, Bias::Bullish)
    } else if bearish > bullish + cfg.margin {
        let rating = if bearish >= cfg.strong_score { Rating::StrongPut } else { Rating::Put };
        (rating, Bias::Bearish)
    } else {
        (Rating::Neutral, Bias::Neutral)
    };

    CompositeScore {
        bullish,
        bearish,
        rating,
        bias,
        reasons,
    }
}

/// Near the 52-week high and overbought.
pub fn is_parabolic_top(snap: &IndicatorSnapshot, cfg: &CompositeConfig) -> bool {
    snap.range_position > cfg.parabolic_range && snap.rsi > cfg.parabolic_rsi
}

/// Heavy volume high in the range, not yet overbought.
pub fn is_breakout_rocket(snap: &IndicatorSnapshot, cfg: &CompositeConfig) -> bool {
    snap.volume_ratio > cfg.breakout_volume_ratio
        && snap.range_position > cfg.breakout_range
        && snap.rsi < cfg.breakout_rsi_cap
}

// ── Picks ─────────────────────────────────────────────────────────────────────

fn base_pick(ticker: &str, snap: &IndicatorSnapshot, score: i32, reasons: &[&str]) -> ScoredPick {
    ScoredPick {
        ticker: ticker.to_string(),
        price: round_to(snap.close, 2),
        score,
        reason: reasons.join(", "),
        rsi: round_to(snap.rsi, 1),
        rating: None,
        bias: None,
        bullish_score: None,
        bearish_score: None,
        pattern: None,
        snapshot: snap.clone(),
    }
}

/// Score one ticker under `scheme`. `None` means it did not pass admission.
pub fn evaluate(ticker: &str, snap: &IndicatorSnapshot, scheme: Scheme, cfg: &ScanConfig) -> Option<ScoredPick> {
    match scheme {
        Scheme::Momentum => {
            let s = score_momentum(snap, &cfg.momentum);
            (s.score > 0 && s.score >= cfg.momentum.min_score)
                .then(|| base_pick(ticker, snap, s.score, &s.reasons))
        }
        Scheme::Composite => {
            let s = score_composite(snap, &cfg.composite);
            let mut pick = base_pick(ticker, snap, s.headline(), &s.reasons);
            pick.rating = Some(s.rating);
            pick.bias = Some(s.bias);
            pick.bullish_score = Some(s.bullish);
            pick.bearish_score = Some(s.bearish);
            Some(pick)
        }
    }
}

/// Sort by score descending, keeping encounter order for ties, and keep `top_n`.
pub fn select_ranked(mut picks: Vec<ScoredPick>, top_n: usize) -> Vec<ScoredPick> {
    picks.sort_by(|a, b| b.score.cmp(&a.score));
    picks.truncate(top_n);
    picks
}

/// Fill each side's slots with pattern matches first, then the best remaining
/// picks of that bias.
pub fn select_split(picks: &[ScoredPick], cfg: &CompositeConfig) -> Selection {
    let bearish = fill_side(
        picks,
        cfg,
        Bias::Bearish,
        Pattern::ParabolicTop,
        |p| is_parabolic_top(&p.snapshot, cfg),
        |p| p.bearish_score.unwrap_or(0),
    );
    let bullish = fill_side(
        picks,
        cfg,
        Bias::Bullish,
        Pattern::BreakoutRocket,
        |p| is_breakout_rocket(&p.snapshot, cfg),
        |p| p.bullish_score.unwrap_or(0),
    );
    Selection::Split { bullish, bearish }
}

fn fill_side(
    picks: &[ScoredPick],
    cfg: &CompositeConfig,
    bias: Bias,
    pattern: Pattern,
    matches: impl Fn(&ScoredPick) -> bool,
    side_score: impl Fn(&ScoredPick) -> i32,
) -> Vec<ScoredPick> {
    let mut selected: Vec<ScoredPick> = picks
        .iter()
        .filter(|p| matches(p))
        .take(cfg.priority_slots.min(cfg.slots))
        .map(|p| ScoredPick {
            pattern: Some(pattern),
            ..p.clone()
        })
        .collect();

    let mut rest: Vec<&ScoredPick> = picks
        .iter()
        .filter(|p| p.bias == Some(bias))
        .filter(|p| !selected.iter().any(|s| s.ticker == p.ticker))
        .collect();
    rest.sort_by(|a, b| side_score(b).cmp(&side_score(a)));

    let open = cfg.slots.saturating_sub(selected.len());
    selected.extend(rest.into_iter().take(open).cloned());
    selected
}

pub fn select(picks: Vec<ScoredPick>, scheme: Scheme, cfg: &ScanConfig) -> Selection {
    match scheme {
        Scheme::Momentum => Selection::Ranked(select_ranked(picks, cfg.momentum.top_n)),
        Scheme::Composite => select_split(&picks, &cfg.composite),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Neutral snapshot: no momentum or composite rule fires except MACD (bearish).
    fn snap() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: 100.0,
            prev_close: 100.0,
            rsi: 50.0,
            sma_fast: 100.0,
            prev_sma_fast: 100.0,
            sma_slow: 100.0,
            sma_long: Some(100.0),
            macd: 0.0,
            macd_signal: 0.0,
            avg_volume: 1_000_000.0,
            current_volume: 1_000_000.0,
            volume_ratio: 1.0,
            high_52w: 120.0,
            low_52w: 80.0,
            range_position: 50.0,
            support: 90.0,
            resistance: 110.0,
            equilibrium: 100.0,
            pd_position: 0.0,
        }
    }

    fn composite_pick(ticker: &str, s: IndicatorSnapshot) -> ScoredPick {
        evaluate(ticker, &s, Scheme::Composite, &ScanConfig::default()).unwrap()
    }

    #[test]
    fn test_momentum_volume_spike_threshold() {
        let cfg = MomentumConfig {
            volume_spike_multiplier: 1.5,
            ..MomentumConfig::default()
        };
        let quiet = IndicatorSnapshot {
            current_volume: 1_200_000.0,
            volume_ratio: 1.2,
            ..snap()
        };
        let loud = IndicatorSnapshot {
            current_volume: 1_600_000.0,
            volume_ratio: 1.6,
            ..snap()
        };
        let a = score_momentum(&quiet, &cfg);
        let b = score_momentum(&loud, &cfg);
        assert!(!a.reasons.contains(&"Volume Spike"));
        assert!(b.reasons.contains(&"Volume Spike"));
        assert_eq!(b.score - a.score, cfg.volume_spike_points);
    }

    #[test]
    fn test_momentum_breakout_with_volume() {
        let s = IndicatorSnapshot {
            close: 102.0,
            prev_close: 99.0,
            sma_fast: 100.5,
            prev_sma_fast: 100.0,
            sma_slow: 101.0,
            current_volume: 2_000_000.0,
            avg_volume: 900_000.0,
            volume_ratio: 2_000_000.0 / 900_000.0,
            ..snap()
        };
        let pick = evaluate("BRK", &s, Scheme::Momentum, &ScanConfig::default()).unwrap();
        assert_eq!(pick.reason, "Trend Breakout, Volume Spike");
        assert_eq!(pick.score, 3);
        assert_eq!(pick.rating, None);
    }

    #[test]
    fn test_momentum_admission() {
        assert!(evaluate("NONE", &snap(), Scheme::Momentum, &ScanConfig::default()).is_none());

        let oversold = IndicatorSnapshot { rsi: 35.0, ..snap() };
        let mut cfg = ScanConfig::default();
        assert_eq!(evaluate("OS", &oversold, Scheme::Momentum, &cfg).unwrap().score, 1);

        cfg.momentum.min_score = 2;
        assert!(evaluate("OS", &oversold, Scheme::Momentum, &cfg).is_none());
    }

    #[test]
    fn test_flat_series_scores_nothing() {
        let flat = IndicatorSnapshot { rsi: 100.0, ..snap() };
        assert_eq!(score_momentum(&flat, &MomentumConfig::default()).score, 0);
    }

    #[test]
    fn test_pick_rounding() {
        let s = IndicatorSnapshot {
            close: 123.456,
            rsi: 28.26,
            ..snap()
        };
        let pick = evaluate("RND", &s, Scheme::Momentum, &ScanConfig::default()).unwrap();
        assert_eq!(pick.price, 123.46);
        assert_eq!(pick.rsi, 28.3);
    }

    #[test]
    fn test_composite_strong_buy() {
        let s = IndicatorSnapshot {
            rsi: 25.0,
            macd: 1.0,
            close: 85.0,
            pd_position: -75.0,
            ..snap()
        };
        let c = score_composite(&s, &CompositeConfig::default());
        assert_eq!((c.bullish, c.bearish), (7, 0));
        assert_eq!(c.rating, Rating::StrongBuy);
        assert_eq!(c.bias, Bias::Bullish);
    }

    #[test]
    fn test_composite_put_and_margin() {
        // RSI overbought + MACD bearish = 5 bearish vs 0 bullish.
        let s = IndicatorSnapshot { rsi: 75.0, ..snap() };
        let c = score_composite(&s, &CompositeConfig::default());
        assert_eq!((c.bullish, c.bearish), (0, 5));
        assert_eq!(c.rating, Rating::Put);

        // MACD bearish alone: 2 vs 0 is inside the margin.
        let c = score_composite(&snap(), &CompositeConfig::default());
        assert_eq!(c.rating, Rating::Neutral);
        assert_eq!(c.headline(), 2);
    }

    #[test]
    fn test_composite_strong_put() {
        // Overbought, MACD bearish, death alignment and premium zone.
        let s = IndicatorSnapshot {
            rsi: 75.0,
            close: 80.0,
            sma_slow: 90.0,
            sma_long: Some(100.0),
            pd_position: 80.0,
            ..snap()
        };
        let c = score_composite(&s, &CompositeConfig::default());
        assert_eq!((c.bullish, c.bearish), (0, 9));
        assert_eq!(c.rating, Rating::StrongPut);
        assert_eq!(c.bias, Bias::Bearish);
        assert_eq!(c.headline(), 9);
    }

    #[test]
    fn test_composite_alignment_and_volume() {
        let s = IndicatorSnapshot {
            close: 120.0,
            prev_close: 110.0,
            sma_slow: 110.0,
            sma_long: Some(100.0),
            macd: 2.0,
            macd_signal: 1.0,
            volume_ratio: 1.8,
            ..snap()
        };
        let c = score_composite(&s, &CompositeConfig::default());
        assert_eq!(c.bullish, 5);
        assert_eq!(c.reasons, vec!["MACD Bullish", "Golden Alignment", "Volume Surge Up"]);

        let down = IndicatorSnapshot {
            close: 80.0,
            prev_close: 90.0,
            sma_slow: 90.0,
            sma_long: Some(100.0),
            volume_ratio: 1.8,
            ..snap()
        };
        let c = score_composite(&down, &CompositeConfig::default());
        assert_eq!(c.bearish, 5);
        assert_eq!(c.rating, Rating::Put);
    }

    #[test]
    fn test_patterns() {
        let cfg = CompositeConfig::default();
        let top = IndicatorSnapshot { range_position: 90.0, rsi: 72.0, ..snap() };
        assert!(is_parabolic_top(&top, &cfg));
        assert!(!is_breakout_rocket(&top, &cfg));

        let rocket = IndicatorSnapshot { volume_ratio: 2.5, range_position: 75.0, rsi: 60.0, ..snap() };
        assert!(is_breakout_rocket(&rocket, &cfg));
        assert!(!is_parabolic_top(&rocket, &cfg));
    }

    #[test]
    fn test_select_ranked_bounded_and_sorted() {
        let mut picks = Vec::new();
        for (i, score) in [1, 3, 2, 3, 1, 2].iter().enumerate() {
            picks.push(base_pick(&format!("T{i}"), &snap(), *score, &[]));
        }
        let out = select_ranked(picks, 4);
        assert_eq!(out.len(), 4);
        assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
        let order: Vec<&str> = out.iter().map(|p| p.ticker.as_str()).collect();
        assert_eq!(order, vec!["T1", "T3", "T2", "T5"]);
    }

    #[test]
    fn test_split_priority_then_backfill() {
        let overbought = |range: f64| IndicatorSnapshot { rsi: 75.0, range_position: range, ..snap() };
        let picks = vec![
            composite_pick("TOP1", overbought(90.0)),
            composite_pick("TOP2", overbought(95.0)),
            composite_pick("TOP3", overbought(99.0)),
            composite_pick("PREM", IndicatorSnapshot { pd_position: 80.0, ..overbought(50.0) }),
            composite_pick("WEAK", overbought(50.0)),
        ];

        let Selection::Split { bullish, bearish } = select_split(&picks, &CompositeConfig::default()) else {
            panic!("expected split selection");
        };
        let tickers: Vec<&str> = bearish.iter().map(|p| p.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["TOP1", "TOP2", "PREM"]);
        assert_eq!(bearish[0].pattern, Some(Pattern::ParabolicTop));
        assert_eq!(bearish[2].pattern, None);
        assert!(bullish.is_empty());
    }

    #[test]
    fn test_split_backfill_excludes_selected() {
        let rocket = IndicatorSnapshot {
            volume_ratio: 2.5,
            range_position: 75.0,
            rsi: 25.0,
            macd: 1.0,
            close: 101.0,
            ..snap()
        };
        let picks = vec![
            composite_pick("ROCK", rocket),
            composite_pick("BULL", IndicatorSnapshot { rsi: 20.0, macd: 1.0, ..snap() }),
        ];
        let Selection::Split { bullish, .. } = select_split(&picks, &CompositeConfig::default()) else {
            panic!("expected split selection");
        };
        let tickers: Vec<&str> = bullish.iter().map(|p| p.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["ROCK", "BULL"]);
    }
}
