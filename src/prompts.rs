//! Prompt builders for analysts, planner and structured-output contracts.

use crate::models::AnalystKey;
use chrono::NaiveDate;

/// Output contract appended to every analyst prompt. Parsed with
/// [`crate::llm::parse_structured`].
pub const ANALYST_OUTPUT_FORMAT: &str = r#"
Provide structured output as a single JSON object:
- "signal": one of ["Bullish", "Bearish", "Neutral"]
- "confidence": a number in [0, 1]
- "justification": brief explanation of your analysis

Return ONLY the JSON object, no extra text."#;

pub fn technical_prompt(
    trend: &str,
    mean_reversion: &str,
    rsi: &str,
    volatility: &str,
    volume: &str,
    price_levels: &str,
) -> String {
    format!(
        r#"You are a technical analyst evaluating items in a game-skin market using multiple technical analysis strategies.

The following signals have been generated from our analysis:

Price Trend Analysis:
- Trend Following: {trend}

Mean Reversion and Momentum:
- Mean Reversion: {mean_reversion}
- RSI: {rsi}
- Volatility: {volatility}

Volume Analysis:
{volume}

Support and Resistance Levels:
{price_levels}
{output}"#,
        output = ANALYST_OUTPUT_FORMAT,
    )
}

pub fn sentiment_prompt(ticker: &str, post_count: usize, posts_json: &str) -> String {
    format!(
        r#"You are a sentiment analyst evaluating items in a game-skin market based on community discussions.

Analyze community discussions for {ticker} ({post_count} posts):
- Direct posts: price trends, demand/supply factors
- General posts: overall market mood, infer impact on {ticker}
- Focus on content sentiment, not just upvotes/comments

Community discussions:
{posts_json}

Give a short-term (1-2 weeks) sentiment: Bullish / Bearish / Neutral.
{output}"#,
        output = ANALYST_OUTPUT_FORMAT,
    )
}

pub fn sentiment_insufficient_data_prompt(
    ticker: &str,
    post_count: usize,
    min_posts: usize,
) -> String {
    format!(
        r#"You are a market sentiment analyst. However, there is not enough data to evaluate the sentiment of the item.

Insufficient data for {ticker}:
- Posts found: {post_count} (min required: {min_posts})

Return "Neutral" and explain: data is insufficient (lack of discussion/visibility), we treat it as a neutral sentiment; highlight uncertainty and recommend caution.
{output}"#,
        output = ANALYST_OUTPUT_FORMAT,
    )
}

pub fn sentiment_fetch_error_prompt(ticker: &str) -> String {
    format!(
        r#"You are a market sentiment analyst.

Community sentiment for {ticker} could not be evaluated due to a data fetch error.

Return "Neutral" and briefly explain that sentiment is unavailable because of the fetch error; note that this is a conservative fallback.
{output}"#,
        output = ANALYST_OUTPUT_FORMAT,
    )
}

pub fn sentiment_reverse_prompt(
    ticker: &str,
    original_signal: &str,
    original_justification: &str,
) -> String {
    format!(
        r#"You are a contrarian sentiment analyst for market items. Apply reverse sentiment analysis based on the contrarian hypothesis.

Original sentiment signal: {original_signal}
Original justification: {original_justification}

**Contrarian Hypothesis:**
- Overly bullish community chatter can signal market overheating, potentially bearish
- Negative chatter can indicate overselling, potentially bullish
- Neutral sentiment remains neutral

**Your task:**
- Reverse the signal direction (Bullish to Bearish, Bearish to Bullish, Neutral stays Neutral)
- Provide a justification explaining the contrarian interpretation

Evaluate the reversed sentiment for {ticker} based on the contrarian hypothesis.
{output}"#,
        output = ANALYST_OUTPUT_FORMAT,
    )
}

pub fn event_prompt(ticker: &str, news_count: usize, news_json: &str) -> String {
    format!(
        r#"You are an event analyst for market items. Analyze official news for price impact on {ticker}.

**Impact Assessment (priority order):**
1. **Supply mechanism** (strongest): drop pool, crate/box, rarity, trade-up path changes
2. **Visibility/popularity** (moderate): new crates, team stickers, weapon balance changes
3. **Market sentiment** (indirect): player influx, major updates, speculative activity

**Signal:**
- Bullish: increases scarcity/visibility or positive sentiment
- Bearish: increases supply, decreases visibility, or negative sentiment
- Neutral: no clear impact, insufficient data ({news_count} items), or mixed signals

Official News ({news_count} items):
{news_json}

Evaluate event impact for short-term (1-2 weeks) price movement of {ticker}. Specify which news items and factors influenced your signal.
{output}"#,
        output = ANALYST_OUTPUT_FORMAT,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn liquidity_prompt(
    ticker: &str,
    trading_volume_analysis: &str,
    engagement_analysis: &str,
    volume_high: f64,
    volume_low: f64,
    high_score: i64,
    high_comments: i64,
    low_score: i64,
    low_comments: i64,
    min_posts: usize,
) -> String {
    format!(
        r#"You are a liquidity analyst for market items. Analyze liquidity based on trading volume and community engagement.

**Analysis:**
{trading_volume_analysis}

{engagement_analysis}

**Thresholds:**
- Volume: High >= {volume_high}, Low < {volume_low}
- Engagement: High (score >= {high_score} or comments >= {high_comments}), Low (score < {low_score} and comments < {low_comments})
- Min posts: {min_posts}

**Signal:**
- Bullish: high volume OR strong engagement (both: higher confidence)
- Bearish: low volume OR weak engagement (both: higher confidence)
- Neutral: mixed/conflicting indicators or insufficient data

Evaluate liquidity for {ticker}. Explain which indicators contributed most.
{output}"#,
        output = ANALYST_OUTPUT_FORMAT,
    )
}

pub fn planner_prompt(ticker: &str, date: NaiveDate, enabled: &[AnalystKey]) -> String {
    let analysts = enabled
        .iter()
        .map(|key| format!("- {}: {}", key, key.doc()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a planner agent that decides which analysts to run based on your knowledge of the ticker and the features of the analysts.

Here is the ticker:
{ticker}

Here is the trading date:
{date}

Here are the available analysts:
{analysts}

Provide your decision as a single JSON object:
- "analysts": selected analyst name list (non-empty subset of the available analysts)
- "justification": brief explanation of your selection

Return ONLY the JSON object, no extra text."#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_prompt_lists_enabled_analysts_and_date() {
        let date = NaiveDate::parse_from_str("2025-09-20", "%Y-%m-%d").unwrap();
        let prompt = planner_prompt(
            "AK-47 | Redline (Field-Tested)",
            date,
            &[AnalystKey::Technical, AnalystKey::Event],
        );
        assert!(prompt.contains("- technical:"));
        assert!(prompt.contains("- event:"));
        assert!(!prompt.contains("- liquidity:"));
        assert!(prompt.contains("2025-09-20"));
    }

    #[test]
    fn test_analyst_prompts_carry_output_contract() {
        let prompt = sentiment_prompt("item", 7, "[]");
        assert!(prompt.contains("\"signal\""));
        assert!(prompt.contains("\"confidence\""));
    }
}
