// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD      = EMA(fast) - EMA(slow)
//   signal    = EMA(signal_period) of the MACD line
//   histogram = MACD - signal
//
// Both stages use exponential averages. The MACD line starts at close index
// `slow - 1`; the signal needs a further `signal_period - 1` MACD values.
// =============================================================================

use serde::Serialize;

use super::ema::calculate_ema;

/// Latest MACD reading. `signal` and `histogram` are absent until enough MACD
/// values exist to seed the signal EMA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

/// Full MACD line for `closes`, aligned to close index `slow - 1` onwards.
pub fn macd_line(closes: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    if fast == 0 || fast >= slow || closes.len() < slow {
        return Vec::new();
    }

    let fast_ema = calculate_ema(closes, fast);
    let slow_ema = calculate_ema(closes, slow);
    let offset = slow - fast;

    slow_ema
        .iter()
        .enumerate()
        .filter_map(|(i, s)| fast_ema.get(i + offset).map(|f| f - s))
        .collect()
}

/// Most recent MACD / signal / histogram, or `None` without enough data for
/// the MACD line itself.
pub fn latest_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdReading> {
    let line = macd_line(closes, fast, slow);
    let macd = *line.last()?;
    let signal = calculate_ema(&line, signal_period).last().copied();

    Some(MacdReading {
        macd,
        signal,
        histogram: signal.map(|s| macd - s),
    })
}
