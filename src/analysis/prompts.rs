// =============================================================================
// Prompt Builder — one chat request per timeframe
// =============================================================================
//
//   very short : 6-hour scalping read, with sentiment and volume context
//   short      : 24-hour day-trading signal
//   long       : 365-day technical outlook with ATR levels
//
// Indicator fields arrive pre-formatted; a timeframe without a snapshot
// contributes empty strings rather than failing the request.
// =============================================================================

use crate::analysis::snapshot::FormattedSnapshot;
use crate::generation::{ChatMessage, CompletionRequest};
use crate::types::{Numeric, Sentiment, Timeframe};

/// Model parameters shared by the three requests.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
}

/// Everything the three prompts embed.
pub struct PromptContext<'a> {
    pub asset_name: &'a str,
    pub asset_ticker: &'a str,
    pub price: &'a Numeric,
    pub change_24h: Option<f64>,
    pub sentiment: Option<&'a Sentiment>,
    pub volume_analysis: &'a str,
    pub very_short: &'a FormattedSnapshot,
    pub short: &'a FormattedSnapshot,
    pub long: &'a FormattedSnapshot,
}

const SCALPER_SYSTEM: &str = "You are a high-frequency trading analyst focused on scalping. \
Give ultra-short-term technical analysis of the last 6 hours of price action. \
Be concise and direct, and focus on immediate setups.";

/// Build the three requests in `Timeframe::ALL` order.
pub fn build_requests(
    ctx: &PromptContext<'_>,
    settings: &GenerationSettings,
) -> [(Timeframe, CompletionRequest); 3] {
    let request = |messages: Vec<ChatMessage>| CompletionRequest {
        model: settings.model.clone(),
        messages,
        temperature: settings.temperature,
        max_completion_tokens: settings.max_completion_tokens,
    };

    [
        (
            Timeframe::VeryShort,
            request(vec![
                ChatMessage::system(SCALPER_SYSTEM),
                ChatMessage::user(very_short_prompt(ctx)),
            ]),
        ),
        (
            Timeframe::Short,
            request(vec![ChatMessage::user(short_prompt(ctx))]),
        ),
        (
            Timeframe::Long,
            request(vec![ChatMessage::user(long_prompt(ctx))]),
        ),
    ]
}

fn very_short_prompt(ctx: &PromptContext<'_>) -> String {
    let ta = ctx.very_short;
    let (sentiment_value, sentiment_class) = match ctx.sentiment {
        Some(s) => (s.value.to_string(), s.value_classification.as_str()),
        None => (String::new(), ""),
    };
    let change = ctx.change_24h.map(|c| c.to_string()).unwrap_or_default();

    format!(
        "{name} SCALPING Analysis (6 Hours)
Current Price: ${price}
24h Change: {change}%

MARKET SENTIMENT:
Fear & Greed Index: {sentiment_value} ({sentiment_class})

TECHNICAL DATA (6-Hour Window):
RSI (14): {rsi}
MACD Histogram: {hist}
MACD Trend: {trend}
Support: {support}
Resistance: {resistance}

VOLUME DATA:
{volume}

Reply with a SCALPING analysis in exactly this format:

**SCALP BIAS**
[BULLISH/BEARISH/NEUTRAL] (Confidence: 1-10)
[One line on how sentiment affects the bias]

**IMMEDIATE SETUP**
- Entry Zone: [Price]
- Stop Loss: [Price] (Tight)
- Take Profit: [Price] (Quick)

**KEY INDICATORS**
- Momentum: [RSI/MACD comment]
- Volume: [Read of the volume data above]
- Sentiment: [Fear & Greed impact]

**WARNING**
[One sentence risk warning]",
        name = ctx.asset_name,
        price = ctx.price,
        rsi = ta.rsi,
        hist = ta.macd_histogram,
        trend = ta.macd_trend,
        support = ta.support,
        resistance = ta.resistance,
        volume = ctx.volume_analysis,
    )
}

fn short_prompt(ctx: &PromptContext<'_>) -> String {
    let ta = ctx.short;
    format!(
        "{name} DAY TRADING Analysis (24 Hours)

**INDICATORS:**
RSI(14): {rsi} [{rsi_signal}]
MACD Trend: {trend}
MACD Histogram: {hist}
Price vs SMA20: {vs20}% | vs SMA50: {vs50}%
Bollinger: {bb}
Divergence: {div}
Confluence: {conf}

Reply in exactly this markdown format:

**SIGNAL:** BULLISH/BEARISH/NEUTRAL
**CONFIDENCE:** Very High/High/Medium/Low

**KEY FACTORS:**
- [Indicator 1]
- [Indicator 2]
- [Indicator 3]

**WATCH:** [Key level or risk]",
        name = ctx.asset_name,
        rsi = ta.rsi,
        rsi_signal = ta.rsi_signal,
        trend = ta.macd_trend,
        hist = ta.macd_histogram,
        vs20 = ta.price_vs_sma20,
        vs50 = ta.price_vs_sma50,
        bb = ta.bb_position,
        div = ta.divergence,
        conf = ta.confluence_score,
    )
}

fn long_prompt(ctx: &PromptContext<'_>) -> String {
    let ta = ctx.long;
    format!(
        "You are a technical analysis bot producing educational market commentary from technical indicators. This is NOT financial advice.

{name} ({ticker}) Long-Term Technical Outlook (365-Day Timeframe)

Current Technical Indicators:
- RSI(14): {rsi} [{rsi_signal}]
- MACD Trend: {trend}
- MACD Histogram: {hist}
- Price vs SMA20: {vs20}%
- Price vs SMA50: {vs50}%
- RSI/Price Divergence: {div}
- Technical Confluence: {conf}
- Support Level: ${support}
- Resistance Level: ${resistance}

Reply with a technical summary in exactly this format:

**TECHNICAL BIAS:** BULLISH/BEARISH/NEUTRAL
**CONFIDENCE:** 1-10

**TECHNICAL FACTORS:**
- [Observation 1]
- [Observation 2]
- [Observation 3]

**TECHNICAL LEVELS (Educational):**
Current Price: ${entry}
Risk Level: ${stop} ([X]%)
Target Zone 1: ${tp1} ([X]%)
Target Zone 2: ${tp2} ([X]%)
Risk/Reward: {rr}

**KEY LEVEL TO MONITOR:** [Important support/resistance or trend level]

Remember: this is educational technical analysis only, not investment advice.",
        name = ctx.asset_name,
        ticker = ctx.asset_ticker,
        rsi = ta.rsi,
        rsi_signal = ta.rsi_signal,
        trend = ta.macd_trend,
        hist = ta.macd_histogram,
        vs20 = ta.price_vs_sma20,
        vs50 = ta.price_vs_sma50,
        div = ta.divergence,
        conf = ta.confluence_score,
        support = ta.support,
        resistance = ta.resistance,
        entry = ta.entry_price,
        stop = ta.stop_loss,
        tp1 = ta.take_profit1,
        tp2 = ta.take_profit2,
        rr = ta.risk_reward,
    )
}

/// Summarise `[timestamp, volume]` pairs: latest volume against the mean of
/// the trailing (up to) 20 samples.
pub fn volume_analysis(volume_data: &[(f64, f64)]) -> String {
    let Some(&(_, current)) = volume_data.last() else {
        return "No volume data supplied".to_string();
    };

    let window = &volume_data[volume_data.len().saturating_sub(20)..];
    let avg = window.iter().map(|&(_, v)| v).sum::<f64>() / window.len() as f64;
    let change = if avg > 0.0 {
        (current - avg) / avg * 100.0
    } else {
        0.0
    };

    let trend = if change > 20.0 {
        "HIGH BUYING PRESSURE"
    } else if change < -20.0 {
        "LOW INTEREST"
    } else {
        "NORMAL"
    };
    let sign = if change > 0.0 { "+" } else { "" };

    format!(
        "Current Volume: ${:.2}M\nAverage Volume (20p): ${:.2}M\nVolume vs Avg: {sign}{change:.2}%\nTrend: {trend}",
        current / 1_000_000.0,
        avg / 1_000_000.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GenerationSettings {
        GenerationSettings {
            model: "llama-3.1-8b-instant".into(),
            temperature: 0.3,
            max_completion_tokens: 200,
        }
    }

    #[test]
    fn requests_follow_timeframe_order() {
        let empty = FormattedSnapshot::default();
        let price = Numeric::Text("0.4512".into());
        let ctx = PromptContext {
            asset_name: "Cardano",
            asset_ticker: "ADA",
            price: &price,
            change_24h: Some(-1.25),
            sentiment: None,
            volume_analysis: "No volume data supplied",
            very_short: &empty,
            short: &empty,
            long: &empty,
        };
        let reqs = build_requests(&ctx, &settings());

        let order: Vec<Timeframe> = reqs.iter().map(|(tf, _)| *tf).collect();
        assert_eq!(order, Timeframe::ALL.to_vec());
        let (_, scalp) = &reqs[0];
        assert_eq!(scalp.messages.len(), 2);
        assert_eq!(scalp.messages[0].role, "system");
        assert!(scalp.messages[1].content.contains("Current Price: $0.4512"));
        assert!(scalp.messages[1].content.contains("24h Change: -1.25%"));
        // Missing snapshot fields render empty.
        assert!(scalp.messages[1].content.contains("RSI (14): \n"));
        assert_eq!(reqs[1].1.messages.len(), 1);
        assert!(reqs[2].1.messages[0].content.contains("Cardano (ADA)"));
        assert_eq!(reqs[2].1.max_completion_tokens, 200);
    }

    #[test]
    fn long_prompt_embeds_levels() {
        let empty = FormattedSnapshot::default();
        let long = FormattedSnapshot {
            entry_price: "0.4512".into(),
            stop_loss: "0.4300".into(),
            risk_reward: "1:2.5".into(),
            ..Default::default()
        };
        let price = Numeric::Number(0.4512);
        let sentiment = Sentiment::default();
        let ctx = PromptContext {
            asset_name: "Cardano",
            asset_ticker: "ADA",
            price: &price,
            change_24h: None,
            sentiment: Some(&sentiment),
            volume_analysis: "",
            very_short: &empty,
            short: &empty,
            long: &long,
        };
        let reqs = build_requests(&ctx, &settings());
        let text = &reqs[2].1.messages[0].content;
        assert!(text.contains("Current Price: $0.4512"));
        assert!(text.contains("Risk Level: $0.4300"));
        assert!(text.contains("Risk/Reward: 1:2.5"));
        assert!(reqs[0].1.messages[1].content.contains("Fear & Greed Index: 50 (Neutral)"));
    }

    #[test]
    fn volume_empty() {
        assert_eq!(volume_analysis(&[]), "No volume data supplied");
    }

    #[test]
    fn volume_spike_is_buying_pressure() {
        let mut data: Vec<(f64, f64)> = (0..19).map(|i| (i as f64, 1_000_000.0)).collect();
        data.push((19.0, 2_000_000.0));
        let text = volume_analysis(&data);
        assert!(text.contains("Current Volume: $2.00M"));
        assert!(text.contains("Average Volume (20p): $1.05M"));
        assert!(text.contains("Volume vs Avg: +90.48%"));
        assert!(text.ends_with("Trend: HIGH BUYING PRESSURE"));
    }

    #[test]
    fn volume_drought_is_low_interest() {
        let mut data: Vec<(f64, f64)> = (0..30).map(|i| (i as f64, 5_000_000.0)).collect();
        data.push((30.0, 1_000_000.0));
        assert!(volume_analysis(&data).ends_with("Trend: LOW INTEREST"));
    }

    #[test]
    fn volume_short_history_averages_what_exists() {
        let data = vec![(0.0, 1_000_000.0), (1.0, 1_000_000.0)];
        let text = volume_analysis(&data);
        assert!(text.contains("Average Volume (20p): $1.00M"));
        assert!(text.contains("Volume vs Avg: 0.00%"));
        assert!(text.ends_with("Trend: NORMAL"));
    }
}
