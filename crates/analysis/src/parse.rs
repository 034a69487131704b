//! Parsing of structured reasoning replies.
//!
//! The model is instructed (see `prompt`) to answer in fixed sections.
//! Parsing is deliberately forgiving about markdown decoration and
//! bullet styles, but a reply missing its thesis or bottom line is
//! malformed and treated as an upstream failure.

use crate::error::AnalysisError;

/// Default confidence when the section is missing or unreadable.
const DEFAULT_CONFIDENCE: u8 = 3;

/// The sections of one parsed reasoning reply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedAnalysis {
    pub thesis: String,
    pub confidence_level: u8,
    pub bullish_factors: Vec<String>,
    pub bearish_factors: Vec<String>,
    pub technical_setup: String,
    pub catalysts: Vec<String>,
    pub bottom_line: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Section {
    Thesis,
    Confidence,
    Bullish,
    Bearish,
    Technical,
    Catalysts,
    BottomLine,
}

/// Recognize a section header at the start of a trimmed line.
///
/// Returns the section and any content following the header on the same
/// line.
fn match_header(line: &str) -> Option<(Section, &str)> {
    let stripped = line
        .trim_start_matches(['#', '*', ' '])
        .trim_end_matches('*');
    let upper = stripped.to_ascii_uppercase();

    let headers = [
        ("THESIS", Section::Thesis),
        ("CONFIDENCE", Section::Confidence),
        ("BULLISH", Section::Bullish),
        ("BEARISH", Section::Bearish),
        ("TECHNICAL", Section::Technical),
        ("CATALYSTS", Section::Catalysts),
        ("BOTTOM LINE", Section::BottomLine),
    ];

    for (name, section) in headers {
        if let Some(rest) = upper.strip_prefix(name) {
            let rest = rest.trim_start();
            if rest.is_empty() || rest.starts_with(':') {
                // Take the remainder from the original casing
                let offset = stripped.len() - rest.len();
                let content = stripped[offset..].trim_start_matches([':', '*', ' ']).trim();
                return Some((section, content));
            }
        }
    }
    None
}

/// Strip a bullet or numbering prefix from a list line.
fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim_start_matches(['-', '*', '•', ' ']);
    // Numbered lists: "1. factor" or "2) factor"
    let mut rest = trimmed;
    let digits: usize = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let after = &rest[digits..];
        if let Some(after) = after.strip_prefix(['.', ')']) {
            rest = after;
        }
    }
    rest.trim()
}

/// Parse the first integer found in a confidence section, clamped to
/// the 1-5 scale.
fn parse_confidence(text: &str) -> u8 {
    text.chars()
        .find_map(|c| c.to_digit(10))
        .map(|d| (d as u8).clamp(1, 5))
        .unwrap_or(DEFAULT_CONFIDENCE)
}

/// Parse a structured reasoning reply into its sections.
///
/// Errors with `MalformedResponse` when the thesis or bottom line is
/// absent; every other section tolerates being missing.
pub fn parse_completion(text: &str) -> Result<ParsedAnalysis, AnalysisError> {
    let mut parsed = ParsedAnalysis {
        confidence_level: DEFAULT_CONFIDENCE,
        ..Default::default()
    };

    let mut current: Option<Section> = None;
    let mut confidence_text = String::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((section, inline)) = match_header(line) {
            current = Some(section);
            if !inline.is_empty() {
                append_to(&mut parsed, &mut confidence_text, section, inline);
            }
            continue;
        }

        if let Some(section) = current {
            append_to(&mut parsed, &mut confidence_text, section, line);
        }
    }

    parsed.confidence_level = parse_confidence(&confidence_text);

    if parsed.thesis.is_empty() {
        return Err(AnalysisError::MalformedResponse(
            "missing THESIS section".to_string(),
        ));
    }
    if parsed.bottom_line.is_empty() {
        return Err(AnalysisError::MalformedResponse(
            "missing BOTTOM LINE section".to_string(),
        ));
    }

    Ok(parsed)
}

fn append_to(
    parsed: &mut ParsedAnalysis,
    confidence_text: &mut String,
    section: Section,
    line: &str,
) {
    match section {
        Section::Thesis => append_paragraph(&mut parsed.thesis, line),
        Section::Confidence => append_paragraph(confidence_text, line),
        Section::Bullish => parsed.bullish_factors.push(strip_bullet(line).to_string()),
        Section::Bearish => parsed.bearish_factors.push(strip_bullet(line).to_string()),
        Section::Technical => append_paragraph(&mut parsed.technical_setup, line),
        Section::Catalysts => parsed.catalysts.push(strip_bullet(line).to_string()),
        Section::BottomLine => append_paragraph(&mut parsed.bottom_line, line),
    }
}

fn append_paragraph(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
THESIS: Durable services growth is underappreciated at the current multiple.
It compounds through cycles.

CONFIDENCE: 4

BULLISH:
- Services revenue accelerating
- Buyback reduces float every quarter
* Margin expansion from mix shift

BEARISH:
1. Hardware cycle maturity
2) China exposure

TECHNICAL: Consolidating above the 50-day average with contracting volume.

CATALYSTS:
- Earnings on May 2
- WWDC product announcements

BOTTOM LINE: A quality compounder worth accumulating on weakness.
";

    #[test]
    fn test_parse_full_reply() {
        let parsed = parse_completion(SAMPLE).unwrap();

        assert!(parsed.thesis.starts_with("Durable services growth"));
        assert!(parsed.thesis.ends_with("through cycles."));
        assert_eq!(parsed.confidence_level, 4);
        assert_eq!(parsed.bullish_factors.len(), 3);
        assert_eq!(parsed.bullish_factors[1], "Buyback reduces float every quarter");
        assert_eq!(parsed.bearish_factors, vec![
            "Hardware cycle maturity".to_string(),
            "China exposure".to_string(),
        ]);
        assert!(parsed.technical_setup.contains("50-day average"));
        assert_eq!(parsed.catalysts.len(), 2);
        assert!(parsed.bottom_line.contains("quality compounder"));
    }

    #[test]
    fn test_parse_tolerates_markdown_headers() {
        let text = "\
## THESIS
Strong.
**CONFIDENCE:** 5
## BOTTOM LINE
Buy.
";
        let parsed = parse_completion(text).unwrap();
        assert_eq!(parsed.thesis, "Strong.");
        assert_eq!(parsed.confidence_level, 5);
        assert_eq!(parsed.bottom_line, "Buy.");
    }

    #[test]
    fn test_missing_thesis_is_malformed() {
        let err = parse_completion("BOTTOM LINE: Buy.").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn test_missing_bottom_line_is_malformed() {
        let err = parse_completion("THESIS: Strong.").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn test_confidence_out_of_scale_is_clamped() {
        let text = "THESIS: x\nCONFIDENCE: 9\nBOTTOM LINE: y\n";
        let parsed = parse_completion(text).unwrap();
        assert_eq!(parsed.confidence_level, 5);
    }

    #[test]
    fn test_confidence_missing_defaults_to_midpoint() {
        let text = "THESIS: x\nBOTTOM LINE: y\n";
        let parsed = parse_completion(text).unwrap();
        assert_eq!(parsed.confidence_level, 3);
    }

    #[test]
    fn test_empty_sections_tolerated() {
        let text = "THESIS: x\nBULLISH:\nBEARISH:\nBOTTOM LINE: y\n";
        let parsed = parse_completion(text).unwrap();
        assert!(parsed.bullish_factors.is_empty());
        assert!(parsed.catalysts.is_empty());
    }
}
