// =============================================================================
// Shared types used across the market analyst backend
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single OHLC(V) candle as delivered by the price provider.
///
/// On the wire a candle is a bare JSON array:
/// `[timestamp, open, high, low, close]` with an optional trailing volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl TryFrom<Vec<f64>> for Candle {
    type Error = String;

    fn try_from(raw: Vec<f64>) -> Result<Self, Self::Error> {
        if raw.len() < 5 {
            return Err(format!(
                "candle needs at least 5 columns [t, o, h, l, c], got {}",
                raw.len()
            ));
        }
        Ok(Self {
            timestamp: raw[0] as i64,
            open: raw[1],
            high: raw[2],
            low: raw[3],
            close: raw[4],
            volume: raw.get(5).copied(),
        })
    }
}

impl From<Candle> for Vec<f64> {
    fn from(c: Candle) -> Self {
        let mut row = vec![c.timestamp as f64, c.open, c.high, c.low, c.close];
        if let Some(v) = c.volume {
            row.push(v);
        }
        row
    }
}

/// The three lookback windows an analysis covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    VeryShort,
    Short,
    Long,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Self::VeryShort, Self::Short, Self::Long];

    /// Multiple of ATR used as the stop distance for this timeframe.
    pub fn atr_multiplier(self) -> f64 {
        match self {
            Self::VeryShort => 0.5,
            Self::Short => 1.0,
            Self::Long => 1.5,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VeryShort => write!(f, "very_short"),
            Self::Short => write!(f, "short"),
            Self::Long => write!(f, "long"),
        }
    }
}

/// A value that clients may send either as a JSON number or a numeric string
/// (`"0.4512"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    /// Parse to `f64`. `None` for non-numeric text or non-finite values.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

impl std::fmt::Display for Numeric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Fear & Greed style sentiment reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub value: Numeric,
    pub value_classification: String,
}

impl Default for Sentiment {
    fn default() -> Self {
        Self {
            value: Numeric::Text("50".to_string()),
            value_classification: "Neutral".to_string(),
        }
    }
}

/// The three generated narratives, one per timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narratives {
    pub very_short_term: String,
    pub short_term: String,
    pub long_term: String,
}

/// How an analysis response was produced. Reported to HTTP clients in the
/// `x-analysis-cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from a fresh cache entry; no generation call was made.
    Hit,
    /// Freshly generated (or joined an in-flight generation).
    Miss,
    /// Generation timed out and an expired entry was served instead.
    Stale,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "hit"),
            Self::Miss => write!(f, "miss"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_from_five_columns() {
        let c: Candle = serde_json::from_str("[1700000000000, 1.0, 2.0, 0.5, 1.5]").unwrap();
        assert_eq!(c.timestamp, 1_700_000_000_000);
        assert_eq!(c.high, 2.0);
        assert_eq!(c.close, 1.5);
        assert!(c.volume.is_none());
    }

    #[test]
    fn candle_with_volume_column() {
        let c: Candle = serde_json::from_str("[1, 1.0, 2.0, 0.5, 1.5, 900.0]").unwrap();
        assert_eq!(c.volume, Some(900.0));
    }

    #[test]
    fn candle_rejects_short_rows() {
        assert!(serde_json::from_str::<Candle>("[1, 1.0, 2.0]").is_err());
    }

    #[test]
    fn numeric_accepts_number_and_string() {
        let n: Numeric = serde_json::from_str("0.4512").unwrap();
        let s: Numeric = serde_json::from_str("\"0.4512\"").unwrap();
        assert_eq!(n.as_f64(), Some(0.4512));
        assert_eq!(s.as_f64(), Some(0.4512));
        assert_eq!(s.to_string(), "0.4512");
    }

    #[test]
    fn numeric_rejects_garbage() {
        assert!(Numeric::Text("abc".into()).as_f64().is_none());
        assert!(Numeric::Number(f64::NAN).as_f64().is_none());
    }

    #[test]
    fn narratives_use_camel_case() {
        let n = Narratives {
            very_short_term: "a".into(),
            short_term: "b".into(),
            long_term: "c".into(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["veryShortTerm"], "a");
        assert_eq!(json["shortTerm"], "b");
        assert_eq!(json["longTerm"], "c");
    }

    #[test]
    fn atr_multiplier_by_timeframe() {
        assert_eq!(Timeframe::VeryShort.atr_multiplier(), 0.5);
        assert_eq!(Timeframe::Short.atr_multiplier(), 1.0);
        assert_eq!(Timeframe::Long.atr_multiplier(), 1.5);
    }
}
