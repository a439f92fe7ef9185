// =============================================================================
// Indicator Snapshot Engine
// =============================================================================
//
// Turns one candle series into a point-in-time read of momentum, trend,
// volatility bands, support/resistance, divergence and a five-vote confluence
// tally, plus ATR-based entry/stop/target levels.
//
// Needs at least MIN_CANDLES candles (the slow MACD leg). Shorter series yield
// `None`; downstream formatting renders every field as an empty string.
//
// Numbers are rendered at fixed precision by `FormattedSnapshot` because the
// prompt builder and the cache fingerprint embed those strings verbatim:
//   prices, averages, bands, ATR, levels  -> 4 dp
//   MACD / signal / histogram            -> 6 dp
//   RSI and percentage deviations        -> 2 dp
// =============================================================================

use serde::Serialize;

use crate::indicators::atr::calculate_atr;
use crate::indicators::bollinger::{calculate_bollinger, BandPosition, BollingerBands};
use crate::indicators::ema::latest_ema;
use crate::indicators::macd::{latest_macd, MacdReading};
use crate::indicators::rsi::{calculate_rsi, MomentumSignal};
use crate::indicators::sma::latest_sma;
use crate::types::{Candle, Timeframe};

/// Minimum number of candles for a snapshot.
pub const MIN_CANDLES: usize = 26;

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const SMA_SHORT: usize = 20;
const SMA_LONG: usize = 50;
const EMA_FAST: usize = 9;
const EMA_SLOW: usize = 21;
const BB_PERIOD: usize = 20;
const BB_STD_DEV: f64 = 2.0;
const ATR_PERIOD: usize = 14;
/// Trailing window for support / resistance.
const LEVEL_WINDOW: usize = 20;
const TP1_MULTIPLE: f64 = 1.5;
const TP2_MULTIPLE: f64 = 2.5;
const RISK_REWARD: &str = "1:2.5";

// =============================================================================
// Signal types
// =============================================================================

/// MACD line versus its signal line. A line sitting on its signal reads
/// bearish; `Neutral` only while the signal is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendSignal {
    Bullish,
    Bearish,
    Neutral,
}

impl TrendSignal {
    pub fn from_macd(reading: Option<&MacdReading>) -> Self {
        let pair = reading
            .and_then(|r| r.signal.map(|s| (r.macd, s)))
            .filter(|(m, s)| m.is_finite() && s.is_finite());
        match pair {
            Some((macd, signal)) if macd > signal => Self::Bullish,
            Some(_) => Self::Bearish,
            None => Self::Neutral,
        }
    }
}

impl std::fmt::Display for TrendSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Price/RSI divergence over the last two candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Divergence {
    Bullish,
    Bearish,
    None,
}

impl Divergence {
    /// Bullish: price fell while RSI rose, with RSI below 40.
    /// Bearish: price rose while RSI fell, with RSI above 60.
    /// Anything else, including the neutral 40..=60 zone, is `None`.
    pub fn detect(price: f64, prev_price: f64, rsi: f64, prev_rsi: f64) -> Self {
        if price < prev_price && rsi > prev_rsi && rsi < 40.0 {
            Self::Bullish
        } else if price > prev_price && rsi < prev_rsi && rsi > 60.0 {
            Self::Bearish
        } else {
            Self::None
        }
    }
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// Bullish versus bearish votes across the five confluence checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Confluence {
    pub bullish: u8,
    pub bearish: u8,
}

impl Confluence {
    fn add(&mut self, vote: Option<bool>) {
        match vote {
            Some(true) => self.bullish += 1,
            Some(false) => self.bearish += 1,
            None => {}
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.bullish > self.bearish
    }

    pub fn is_bearish(&self) -> bool {
        self.bearish > self.bullish
    }
}

/// `"3/4 BULLISH"`, `"3/5 BEARISH"` or `"NEUTRAL"` on a tie.
impl std::fmt::Display for Confluence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.bullish + self.bearish;
        if self.is_bullish() {
            write!(f, "{}/{} BULLISH", self.bullish, total)
        } else if self.is_bearish() {
            write!(f, "{}/{} BEARISH", self.bearish, total)
        } else {
            write!(f, "NEUTRAL")
        }
    }
}

/// ATR-derived trade levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
}

impl TradeLevels {
    /// Long setup when `bullish`, otherwise the mirrored short setup. A
    /// neutral tally is treated as short.
    pub fn from_atr(entry: f64, atr: f64, multiplier: f64, bullish: bool) -> Self {
        let stop = atr * multiplier;
        let dir = if bullish { 1.0 } else { -1.0 };
        Self {
            entry,
            stop_loss: entry - dir * stop,
            take_profit_1: entry + dir * stop * TP1_MULTIPLE,
            take_profit_2: entry + dir * stop * TP2_MULTIPLE,
        }
    }
}

// =============================================================================
// IndicatorSnapshot
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub timeframe: Timeframe,
    pub price: f64,
    pub rsi: Option<f64>,
    pub rsi_signal: MomentumSignal,
    pub macd: Option<MacdReading>,
    pub macd_trend: TrendSignal,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub ema9: Option<f64>,
    pub ema21: Option<f64>,
    pub price_vs_sma20: Option<f64>,
    pub price_vs_sma50: Option<f64>,
    pub bollinger: Option<BollingerBands>,
    pub band_position: BandPosition,
    pub atr: Option<f64>,
    pub support: f64,
    pub resistance: f64,
    pub divergence: Divergence,
    pub confluence: Confluence,
    pub levels: Option<TradeLevels>,
}

impl IndicatorSnapshot {
    /// Compute the snapshot for `candles` (oldest first).
    ///
    /// Returns `None` with fewer than [`MIN_CANDLES`] candles.
    pub fn compute(candles: &[Candle], timeframe: Timeframe) -> Option<Self> {
        if candles.len() < MIN_CANDLES {
            return None;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let price = closes[closes.len() - 1];
        let prev_price = closes[closes.len() - 2];

        let rsi_series = calculate_rsi(&closes, RSI_PERIOD);
        let rsi = rsi_series.last().copied();
        let prev_rsi = rsi_series.len().checked_sub(2).map(|i| rsi_series[i]);
        let rsi_signal = rsi.map_or(MomentumSignal::Neutral, MomentumSignal::classify);

        let macd = latest_macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let macd_trend = TrendSignal::from_macd(macd.as_ref());

        let sma20 = latest_sma(&closes, SMA_SHORT);
        let sma50 = latest_sma(&closes, SMA_LONG);
        let ema9 = latest_ema(&closes, EMA_FAST);
        let ema21 = latest_ema(&closes, EMA_SLOW);

        let bollinger = calculate_bollinger(&closes, BB_PERIOD, BB_STD_DEV);
        let band_position = BandPosition::classify(price, bollinger.as_ref());

        let atr = calculate_atr(candles, ATR_PERIOD);

        let recent = &candles[candles.len() - LEVEL_WINDOW.min(candles.len())..];
        let support = recent.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let resistance = recent.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);

        let divergence = match (rsi, prev_rsi) {
            (Some(r), Some(p)) => Divergence::detect(price, prev_price, r, p),
            _ => Divergence::None,
        };

        let mut confluence = Confluence::default();
        confluence.add(rsi_signal.vote());
        confluence.add(match macd_trend {
            TrendSignal::Bullish => Some(true),
            TrendSignal::Bearish => Some(false),
            TrendSignal::Neutral => None,
        });
        // A missing average can never be exceeded, so it votes bearish.
        confluence.add(Some(sma20.is_some_and(|s| price > s)));
        confluence.add(Some(sma50.is_some_and(|s| price > s)));
        confluence.add(match band_position {
            BandPosition::BelowLower => Some(true),
            BandPosition::AboveUpper => Some(false),
            _ => None,
        });

        let levels = atr.map(|a| {
            TradeLevels::from_atr(price, a, timeframe.atr_multiplier(), confluence.is_bullish())
        });

        Some(Self {
            timeframe,
            price,
            rsi,
            rsi_signal,
            macd,
            macd_trend,
            sma20,
            sma50,
            ema9,
            ema21,
            price_vs_sma20: sma20.and_then(|s| pct_from(price, s)),
            price_vs_sma50: sma50.and_then(|s| pct_from(price, s)),
            bollinger,
            band_position,
            atr,
            support,
            resistance,
            divergence,
            confluence,
            levels,
        })
    }

    /// Render every field at its fixed display precision.
    pub fn formatted(&self) -> FormattedSnapshot {
        let macd = self.macd.as_ref();
        let bb = self.bollinger.as_ref();
        let levels = self.levels.as_ref();

        FormattedSnapshot {
            rsi: fixed(self.rsi, 2),
            rsi_signal: self.rsi_signal.to_string(),
            macd: fixed(macd.map(|m| m.macd), 6),
            macd_signal: fixed(macd.and_then(|m| m.signal), 6),
            macd_histogram: fixed(macd.and_then(|m| m.histogram), 6),
            macd_trend: self.macd_trend.to_string(),
            sma20: fixed(self.sma20, 4),
            sma50: fixed(self.sma50, 4),
            ema9: fixed(self.ema9, 4),
            ema21: fixed(self.ema21, 4),
            price_vs_sma20: fixed(self.price_vs_sma20, 2),
            price_vs_sma50: fixed(self.price_vs_sma50, 2),
            bb_upper: fixed(bb.map(|b| b.upper), 4),
            bb_middle: fixed(bb.map(|b| b.middle), 4),
            bb_lower: fixed(bb.map(|b| b.lower), 4),
            bb_position: self.band_position.to_string(),
            atr: fixed(self.atr, 4),
            support: fixed(Some(self.support), 4),
            resistance: fixed(Some(self.resistance), 4),
            divergence: self.divergence.to_string(),
            confluence_score: self.confluence.to_string(),
            entry_price: fixed(Some(self.price), 4),
            stop_loss: fixed(levels.map(|l| l.stop_loss), 4),
            take_profit1: fixed(levels.map(|l| l.take_profit_1), 4),
            take_profit2: fixed(levels.map(|l| l.take_profit_2), 4),
            risk_reward: RISK_REWARD.to_string(),
        }
    }
}

/// String view of a snapshot. `Default` is the all-empty rendering used when
/// a timeframe had too few candles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedSnapshot {
    pub rsi: String,
    pub rsi_signal: String,
    pub macd: String,
    pub macd_signal: String,
    pub macd_histogram: String,
    pub macd_trend: String,
    pub sma20: String,
    pub sma50: String,
    pub ema9: String,
    pub ema21: String,
    #[serde(rename = "priceVsSMA20")]
    pub price_vs_sma20: String,
    #[serde(rename = "priceVsSMA50")]
    pub price_vs_sma50: String,
    pub bb_upper: String,
    pub bb_middle: String,
    pub bb_lower: String,
    pub bb_position: String,
    pub atr: String,
    pub support: String,
    pub resistance: String,
    pub divergence: String,
    pub confluence_score: String,
    pub entry_price: String,
    pub stop_loss: String,
    pub take_profit1: String,
    pub take_profit2: String,
    pub risk_reward: String,
}

impl FormattedSnapshot {
    /// Formatted view of an optional snapshot.
    pub fn of(snapshot: Option<&IndicatorSnapshot>) -> Self {
        snapshot.map(IndicatorSnapshot::formatted).unwrap_or_default()
    }
}

fn pct_from(price: f64, reference: f64) -> Option<f64> {
    let pct = (price - reference) / reference * 100.0;
    pct.is_finite().then_some(pct)
}

/// Fixed-precision rendering; missing or non-finite values become "".
pub fn fixed(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.decimals$}"),
        _ => String::new(),
    }
}
