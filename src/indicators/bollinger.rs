// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA(period); upper/lower = middle ± k·σ, where σ is the
// population standard deviation of the same window.

use serde::Serialize;

/// Latest Bollinger band levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Where a price sits relative to the bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BandPosition {
    AboveUpper,
    BelowLower,
    UpperHalf,
    LowerHalf,
    /// Bands could not be computed.
    Neutral,
}

impl BandPosition {
    /// Classify `price` against `bands`. A price exactly on the middle band is
    /// in the lower half.
    pub fn classify(price: f64, bands: Option<&BollingerBands>) -> Self {
        let Some(bb) = bands else {
            return Self::Neutral;
        };
        if price > bb.upper {
            Self::AboveUpper
        } else if price < bb.lower {
            Self::BelowLower
        } else if price > bb.middle {
            Self::UpperHalf
        } else {
            Self::LowerHalf
        }
    }
}

impl std::fmt::Display for BandPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AboveUpper => write!(f, "ABOVE_UPPER"),
            Self::BelowLower => write!(f, "BELOW_LOWER"),
            Self::UpperHalf => write!(f, "UPPER_HALF"),
            Self::LowerHalf => write!(f, "LOWER_HALF"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Bands over the last `period` closes.
///
/// Returns `None` with fewer than `period` closes or non-finite output.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;

    (upper.is_finite() && lower.is_finite()).then_some(BollingerBands {
        upper,
        middle,
        lower,
    })
}
