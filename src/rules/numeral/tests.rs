use crate::engine::{CompiledRules, Parser};
use crate::rules::numeral;
use crate::{Dimension, TokenKind};

#[test]
fn numeral_examples_matching() {
    // (expected_value, input)
    let cases: Vec<(f64, &str)> = vec![
        (3.0, "3"),
        (12.0, "12"),
        (2.5, "2.5"),
        (0.75, ".75"),
        (0.77, "0.77"),
        (33.0, "0033"),
        (150.0, "150"),
        (2.0, "-2"),
    ];

    let rules = numeral::rules::get();
    let compiled = CompiledRules::new(&rules);

    for (expected, input) in cases {
        let nodes = Parser::new_compiled(input, &compiled).run();

        let matched = nodes.iter().any(|n| {
            n.token.dim == Dimension::Numeral
                && matches!(&n.token.kind, TokenKind::Numeral(nd) if (nd.value - expected).abs() < 1e-9)
        });

        assert!(matched, "No rule produced expected numeral {} for input '{}' (nodes: {:#?})", expected, input, nodes);
    }
}

#[test]
fn numeral_longest_span_wins() {
    let rules = numeral::rules::get();
    let compiled = CompiledRules::new(&rules);
    let nodes = Parser::new_compiled("12.5", &compiled).run();
    let numerals: Vec<_> = nodes.iter().filter(|n| n.token.dim == Dimension::Numeral).collect();
    assert_eq!(numerals.len(), 1, "{:#?}", nodes);
    assert_eq!((numerals[0].range.start, numerals[0].range.end), (0, 4));
}
