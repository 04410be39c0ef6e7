use crate::domain::analysis::{EtfAdvice, ParsedAnalysis};
use std::fmt;

// Wire format the AI collaborator is prompted to produce (see
// analysis::prompt). The parser stays tolerant of partial conformance;
// drift is surfaced via `conformance_issues`, never as a failure.
pub const SUMMARY_MARKER: &str = "### 종합 의견:";
const SECTION_PREFIX: &str = "#### ";
const RECOMMENDATION_LABEL: &str = "- **권고 사항**:";
const REASON_LABEL: &str = "- **이유**:";

/// Parses a semi-structured analysis response. Total: malformed input
/// degrades to empty items and whatever summary text can be salvaged, so
/// downstream comparison always has something to work with.
pub fn parse(text: &str) -> ParsedAnalysis {
    let (section_region, summary) = match text.find(SUMMARY_MARKER) {
        Some(pos) => (
            &text[..pos],
            text[pos + SUMMARY_MARKER.len()..].trim().to_string(),
        ),
        None => (text, String::new()),
    };

    let mut items = Vec::new();
    for block in split_sections(section_region) {
        if let Some(advice) = parse_section(block) {
            items.push(advice);
        }
    }

    ParsedAnalysis { summary, items }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConformanceIssue {
    MissingSummaryMarker,
    NoEtfSections,
    MissingRecommendation(String),
    MissingReason(String),
}

impl fmt::Display for ConformanceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSummaryMarker => write!(f, "missing summary marker"),
            Self::NoEtfSections => write!(f, "no ETF sections"),
            Self::MissingRecommendation(symbol) => {
                write!(f, "section {symbol} missing recommendation line")
            }
            Self::MissingReason(symbol) => write!(f, "section {symbol} missing reason line"),
        }
    }
}

/// Non-failing structure check against the expected response grammar.
/// Used to detect prompt drift; a non-empty result is logged upstream,
/// parsing proceeds regardless.
pub fn conformance_issues(text: &str) -> Vec<ConformanceIssue> {
    let mut issues = Vec::new();

    let section_region = match text.find(SUMMARY_MARKER) {
        Some(pos) => &text[..pos],
        None => {
            issues.push(ConformanceIssue::MissingSummaryMarker);
            text
        }
    };

    let blocks = split_sections(section_region);
    if blocks.is_empty() {
        issues.push(ConformanceIssue::NoEtfSections);
    }

    for block in blocks {
        let Some((symbol, _)) = block.lines().next().and_then(parse_header) else {
            continue;
        };
        if line_value(block, RECOMMENDATION_LABEL).is_none() {
            issues.push(ConformanceIssue::MissingRecommendation(symbol.clone()));
        }
        if trailing_value(block, REASON_LABEL).is_none() {
            issues.push(ConformanceIssue::MissingReason(symbol));
        }
    }

    issues
}

/// Splits the region at each line that starts an ETF section header.
/// Anything before the first header is discarded.
fn split_sections(region: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in region.split_inclusive('\n') {
        if line.trim_start().starts_with(SECTION_PREFIX) {
            starts.push(offset);
        }
        offset += line.len();
    }

    let mut blocks = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(region.len());
        blocks.push(&region[start..end]);
    }
    blocks
}

fn parse_section(block: &str) -> Option<EtfAdvice> {
    let (symbol, name) = block.lines().next().and_then(parse_header)?;

    let recommendation = line_value(block, RECOMMENDATION_LABEL).unwrap_or_default();
    let reason = trailing_value(block, REASON_LABEL).unwrap_or_default();

    Some(EtfAdvice {
        symbol,
        name,
        recommendation,
        reason,
    })
}

/// `#### SYMBOL (Name)` where SYMBOL is ASCII uppercase alphanumeric.
fn parse_header(line: &str) -> Option<(String, String)> {
    let rest = line.trim_start().strip_prefix(SECTION_PREFIX)?.trim_start();

    let symbol_end = rest
        .find(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit()))
        .unwrap_or(rest.len());
    if symbol_end == 0 {
        return None;
    }
    let symbol = &rest[..symbol_end];

    let after = rest[symbol_end..].trim_start();
    let inner = after.strip_prefix('(')?;
    let close = inner.find(')')?;
    let name = inner[..close].trim();

    Some((symbol.to_string(), name.to_string()))
}

fn line_value(block: &str, label: &str) -> Option<String> {
    for line in block.lines() {
        if let Some(rest) = line.trim_start().strip_prefix(label) {
            return Some(rest.trim().to_string());
        }
    }
    None
}

/// Like `line_value` but the value runs to the end of the section.
fn trailing_value(block: &str, label: &str) -> Option<String> {
    let pos = block.find(label)?;
    Some(block[pos + label.len()..].trim().to_string())
}
