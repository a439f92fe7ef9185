// =============================================================================
// Technical Indicators
// =============================================================================
//
// Pure, side-effect-free indicator math used by the snapshot engine. Series
// functions return an empty `Vec` and point-in-time functions return `None`
// when there is not enough data, so callers degrade instead of failing.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
