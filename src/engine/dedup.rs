//! Deduplication keys for saturation.
//!
//! Saturation repeatedly applies rules and adds newly produced `Node`s to the
//! stash. Without a stable key the loop would re-derive the same node forever.
//!
//! The key combines span, dimension, producing rule and a value key. Keeping
//! the rule name means two rules that agree on a span stay distinct, which the
//! `--explain` trace relies on.

use crate::{Dimension, Node, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct NodeKey {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) dim: Dimension,
    pub(crate) rule_name: &'static str,
    pub(crate) kind_key: NodeKindKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum NodeKindKey {
    Numeral(u64), // f64 bits
    Zone(u32),
    Weight(u64, String),
    RegexMatch(String), // group 0
}

impl NodeKey {
    pub(crate) fn from_node(node: &Node) -> Self {
        let kind_key = match &node.token.kind {
            TokenKind::Numeral(d) => NodeKindKey::Numeral(d.value.to_bits()),
            TokenKind::Zone(z) => NodeKindKey::Zone(z.number),
            TokenKind::Weight(w) => NodeKindKey::Weight(w.pounds.to_bits(), w.unit.clone()),
            TokenKind::RegexMatch(groups) => {
                NodeKindKey::RegexMatch(groups.first().map(|s| s.as_str()).unwrap_or("").to_string())
            }
        };

        NodeKey {
            start: node.range.start,
            end: node.range.end,
            dim: node.token.dim,
            rule_name: node.rule_name,
            kind_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NumeralData, Range, Token};

    fn numeral(start: usize, end: usize, value: f64, rule_name: &'static str) -> Node {
        Node {
            range: Range { start, end },
            token: Token { dim: Dimension::Numeral, kind: TokenKind::Numeral(NumeralData { value }) },
            rule_name,
            evidence: Vec::new(),
        }
    }

    #[test]
    fn same_span_value_and_rule_collide() {
        assert_eq!(NodeKey::from_node(&numeral(0, 1, 2.0, "a")), NodeKey::from_node(&numeral(0, 1, 2.0, "a")));
    }

    #[test]
    fn different_rule_or_value_stay_distinct() {
        let base = NodeKey::from_node(&numeral(0, 1, 2.0, "a"));
        assert_ne!(base, NodeKey::from_node(&numeral(0, 1, 2.0, "b")));
        assert_ne!(base, NodeKey::from_node(&numeral(0, 1, 3.0, "a")));
    }
}
