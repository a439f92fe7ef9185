// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
//   deltas      = close_t - close_{t-1}
//   seed        = SMA of the first `period` gains / losses
//   avg_gain_t  = (avg_gain_{t-1} * (period - 1) + gain_t) / period
//   avg_loss_t  = (avg_loss_{t-1} * (period - 1) + loss_t) / period
//   RSI         = 100 - 100 / (1 + avg_gain / avg_loss)
//
// Classification bands (checked in this order):
//   > 70 OVERBOUGHT, < 30 OVERSOLD, > 50 BULLISH, otherwise BEARISH.
// =============================================================================

use serde::Serialize;

/// Compute the RSI series for `closes`.
///
/// The first value corresponds to close index `period`; the output therefore
/// has `closes.len() - period` entries. Empty when `period == 0` or there are
/// fewer than `period + 1` closes. A non-finite value truncates the series.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (sum_gain, sum_loss) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    match rsi_from_averages(avg_gain, avg_loss) {
        Some(first) => result.push(first),
        None => return result,
    }

    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => result.push(rsi),
            None => break,
        }
    }

    result
}

/// Momentum classification of a single RSI reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomentumSignal {
    Overbought,
    Oversold,
    Bullish,
    Bearish,
    Neutral,
}

impl MomentumSignal {
    /// Classify an RSI value. Total over `f64`: NaN and infinities are
    /// `Neutral`, and exactly 50 falls through to `Bearish`.
    pub fn classify(rsi: f64) -> Self {
        if !rsi.is_finite() {
            Self::Neutral
        } else if rsi > 70.0 {
            Self::Overbought
        } else if rsi < 30.0 {
            Self::Oversold
        } else if rsi > 50.0 {
            Self::Bullish
        } else {
            Self::Bearish
        }
    }

    /// Contrarian reading at the extremes, trend-following in between.
    /// `Some(true)` is a bullish vote, `Some(false)` bearish.
    pub fn vote(self) -> Option<bool> {
        match self {
            Self::Oversold | Self::Bullish => Some(true),
            Self::Overbought | Self::Bearish => Some(false),
            Self::Neutral => None,
        }
    }
}

impl std::fmt::Display for MomentumSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Oversold => write!(f, "OVERSOLD"),
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Convert average gain / loss into an RSI value in [0, 100].
///
/// Flat input (both zero) is 50; no losses at all is 100.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };

    rsi.is_finite().then_some(rsi)
}
