//! Query assembly: pick the zone, weight and service fragment out of the
//! candidate nodes left after saturation.
//!
//! ```text
//! "FedEx 2Day, Zone 5, 3 lb"
//!  └─fragment─┘ └zone┘ └weight┘
//! ```
//!
//! - Zone: the first zone node in the input.
//! - Weight: the first weight node starting at or after the zone's end,
//!   otherwise the first one ending at or before the zone's start. Weights
//!   overlapping the zone are never used.
//! - Fragment: everything before the earlier of the two, with connector
//!   words and punctuation trimmed from both ends.

use crate::error::QueryParseError;
use crate::query::ParsedQuery;
use crate::values::{Weight, Zone, ZoneRange};
use crate::{Node, TokenKind};

/// Words that link the service name to the rest of the query.
const CONNECTORS: &[&str] = &["to", "for", "at", "in", "via", "from", "ship", "shipping"];

pub(crate) fn assemble(
    input: &str,
    candidates: &[Node],
    zones: Option<ZoneRange>,
) -> Result<ParsedQuery, QueryParseError> {
    let query = || input.to_string();

    let (zone_node, number) = candidates
        .iter()
        .find_map(|n| match &n.token.kind {
            TokenKind::Zone(z) => Some((n, z.number)),
            _ => None,
        })
        .ok_or_else(|| QueryParseError::MissingZone { query: query() })?;

    let zone = match zones {
        Some(range) => Zone::within(number, range),
        None => Zone::new(number),
    }
    .map_err(|source| QueryParseError::Zone { query: query(), source })?;

    let weights: Vec<(&Node, f64)> = candidates
        .iter()
        .filter_map(|n| match &n.token.kind {
            TokenKind::Weight(w) => Some((n, w.pounds)),
            _ => None,
        })
        .collect();

    let zone_range = zone_node.range;
    let (weight_node, pounds) = weights
        .iter()
        .find(|(n, _)| n.range.start >= zone_range.end)
        .or_else(|| weights.iter().find(|(n, _)| n.range.end <= zone_range.start))
        .copied()
        .ok_or_else(|| QueryParseError::MissingWeight { query: query() })?;

    let weight = Weight::new(pounds).map_err(|source| QueryParseError::Weight { query: query(), source })?;

    let head_end = zone_range.start.min(weight_node.range.start);
    let fragment = trim_fragment(input.get(..head_end).unwrap_or(""));

    Ok(ParsedQuery::new(fragment, zone, weight))
}

fn is_connector(word: &str) -> bool {
    CONNECTORS.iter().any(|c| c.eq_ignore_ascii_case(word))
}

fn is_edge_punct(c: char) -> bool {
    c.is_ascii_punctuation()
}

/// Trim punctuation and connector words from both ends and collapse inner
/// whitespace. Returns an empty string when nothing identifying is left.
pub(crate) fn trim_fragment(raw: &str) -> String {
    let mut words: Vec<&str> = raw.split_whitespace().collect();

    loop {
        let before = words.clone();

        if let Some(first) = words.first_mut() {
            *first = first.trim_start_matches(is_edge_punct);
        }
        if let Some(last) = words.last_mut() {
            *last = last.trim_end_matches(is_edge_punct);
        }
        words.retain(|w| !w.is_empty());

        if words.first().is_some_and(|w| is_connector(w)) {
            words.remove(0);
        }
        if words.last().is_some_and(|w| is_connector(w)) {
            words.pop();
        }

        if words == before {
            break;
        }
    }

    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_punctuation_and_connectors() {
        assert_eq!(trim_fragment("FedEx 2Day, "), "FedEx 2Day");
        assert_eq!(trim_fragment("  ship via UPS   Ground to"), "UPS Ground");
        assert_eq!(trim_fragment("shipping from FedEx Ground for"), "FedEx Ground");
        assert_eq!(trim_fragment("to"), "");
        assert_eq!(trim_fragment(" , - "), "");
    }

    #[test]
    fn service_words_at_the_edges_survive() {
        assert_eq!(trim_fragment("ship USPS Priority Mail Rate to"), "USPS Priority Mail Rate");
        assert_eq!(trim_fragment("A Plus Freight Day On"), "A Plus Freight Day On");
        assert_eq!(trim_fragment("Express Price"), "Express Price");
    }

    #[test]
    fn keeps_inner_punctuation() {
        assert_eq!(trim_fragment("FedEx 2-Day, "), "FedEx 2-Day");
        assert_eq!(trim_fragment("\"U.S. Express\":"), "U.S. Express");
    }
}
