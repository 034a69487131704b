//! Analysis prompt assembly.
//!
//! Builds the reasoning prompt from the facts fetched for one
//! instrument. The reply format instructions must stay in sync with the
//! section headers `parse` recognizes.

use stockdesk_market_data::{Fundamentals, PricePoint, Quote};

use crate::regime::MacroSnapshot;

/// Build the analysis prompt for one instrument.
///
/// `fundamentals` and `history` are optional: the prompt degrades to
/// whatever facts were fetchable, and says so rather than inventing
/// numbers.
pub fn build_analysis_prompt(
    symbol: &str,
    quote: &Quote,
    fundamentals: Option<&Fundamentals>,
    history: Option<&[PricePoint]>,
    macro_snapshot: &MacroSnapshot,
) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(&format!(
        "You are an equity research analyst. Analyze {symbol} using only the facts below.\n\n"
    ));

    prompt.push_str(&format!(
        "CURRENT QUOTE\nPrice: {} {}\nChange: {} ({}%)\n",
        quote.price, quote.currency, quote.change, quote.change_percent
    ));
    if let Some(volume) = quote.volume {
        prompt.push_str(&format!("Volume: {volume}\n"));
    }
    prompt.push('\n');

    match fundamentals {
        Some(fundamentals) => {
            prompt.push_str("FUNDAMENTALS\n");
            if let Some(name) = &fundamentals.name {
                prompt.push_str(&format!("Name: {name}\n"));
            }
            if let Some(sector) = &fundamentals.sector {
                prompt.push_str(&format!("Sector: {sector}\n"));
            }
            if let Some(market_cap) = fundamentals.market_cap {
                prompt.push_str(&format!("Market cap: {market_cap:.0}\n"));
            }
            if let Some(pe) = fundamentals.pe_ratio {
                prompt.push_str(&format!("P/E: {pe:.1}\n"));
            }
            if let Some(eps) = fundamentals.eps {
                prompt.push_str(&format!("EPS (ttm): {eps:.2}\n"));
            }
            if let Some(dividend_yield) = fundamentals.dividend_yield {
                prompt.push_str(&format!("Dividend yield: {:.2}%\n", dividend_yield * 100.0));
            }
            if let (Some(high), Some(low)) =
                (fundamentals.week_52_high, fundamentals.week_52_low)
            {
                prompt.push_str(&format!("52-week range: {low:.2} - {high:.2}\n"));
            }
        }
        None => prompt.push_str("FUNDAMENTALS\nNot available for this request.\n"),
    }
    prompt.push('\n');

    if let Some(points) = history {
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            prompt.push_str(&format!(
                "PRICE HISTORY ({} bars)\nFrom {} at {} to {} at {}\n\n",
                points.len(),
                first.timestamp.date_naive(),
                first.close,
                last.timestamp.date_naive(),
                last.close,
            ));
        }
    }

    prompt.push_str(&format!(
        "MACRO BACKDROP\nVolatility index: {:.1}\nLong yield: {:.2}%\nDollar index: {:.1}\nEquity index: {:.0} ({:+.2}% today)\nRegime: {}\n\n",
        macro_snapshot.volatility_index,
        macro_snapshot.long_yield,
        macro_snapshot.dollar_index,
        macro_snapshot.equity_index_level,
        macro_snapshot.equity_index_change_pct,
        macro_snapshot.regime,
    ));

    prompt.push_str(
        "Reply with exactly these sections:\n\
         THESIS: one paragraph.\n\
         CONFIDENCE: a single integer 1-5.\n\
         BULLISH:\n- one factor per line\n\
         BEARISH:\n- one factor per line\n\
         TECHNICAL: one paragraph on the setup.\n\
         CATALYSTS:\n- one upcoming event per line\n\
         BOTTOM LINE: one paragraph.\n",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockdesk_market_data::Quote;

    use crate::regime::{classify_regime, MacroSnapshot};

    fn sample_macro() -> MacroSnapshot {
        MacroSnapshot {
            volatility_index: 16.0,
            long_yield: 4.2,
            dollar_index: 104.0,
            equity_index_level: 5000.0,
            equity_index_change_pct: 0.3,
            regime: classify_regime(16.0, None, None),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_contains_facts_and_sections() {
        let quote = Quote::new("AAPL", dec!(185.50), Utc::now(), "MOCK");
        let prompt = build_analysis_prompt("AAPL", &quote, None, None, &sample_macro());

        assert!(prompt.contains("185.50"));
        assert!(prompt.contains("risk-on"));
        assert!(prompt.contains("THESIS:"));
        assert!(prompt.contains("BOTTOM LINE:"));
        assert!(prompt.contains("Not available"));
    }

    #[test]
    fn test_prompt_includes_fundamentals_when_present() {
        let quote = Quote::new("AAPL", dec!(185.50), Utc::now(), "MOCK");
        let fundamentals = stockdesk_market_data::Fundamentals::for_symbol("AAPL")
            .name("Apple Inc.")
            .sector("Technology");
        let prompt =
            build_analysis_prompt("AAPL", &quote, Some(&fundamentals), None, &sample_macro());

        assert!(prompt.contains("Apple Inc."));
        assert!(prompt.contains("Sector: Technology"));
    }
}
