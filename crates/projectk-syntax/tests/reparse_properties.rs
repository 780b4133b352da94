//! Property-based tests for incremental re-parsing.
//!
//! Run with: cargo test -p projectk-syntax --test reparse_properties

use proptest::prelude::*;
use projectk_syntax::{parse, reparse, Damage, NodeId, SyntaxTree};

// ============================================================================
// Arbitrary generators
// ============================================================================

fn arb_fragment() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("let a = 1;"),
        Just("let b = a + 2 * c;"),
        Just("fn f(x, y) { return x; }"),
        Just("if a < b { c = 1; } else { d; }"),
        Just("while n { n = n - 1; }"),
        Just("{ let z = f(1, 2); }"),
        Just("// note\n"),
        Just("\"str\";"),
        Just("g();"),
        Just("\n"),
        Just(" "),
        Just("{"),
        Just("}"),
        Just(";"),
        Just("("),
        Just(")"),
        Just("\""),
        Just("//"),
        Just("@"),
        Just("x"),
        Just("=="),
    ]
}

fn arb_program() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_fragment(), 0..12).prop_map(|parts| parts.concat())
}

/// An edit as fractions of the text length, resolved against the actual
/// text when applied.
fn arb_edit() -> impl Strategy<Value = (f64, f64, String)> {
    (
        0.0f64..=1.0,
        0.0f64..=0.3,
        prop::collection::vec(arb_fragment(), 0..3).prop_map(|parts| parts.concat()),
    )
}

fn apply(text: &mut String, damage: &mut Damage, edit: &(f64, f64, String)) {
    let (at, len, insert) = edit;
    let start = ((text.len() as f64) * at) as usize;
    let start = start.min(text.len());
    let end = (start + ((text.len() as f64) * len) as usize).min(text.len());
    text.replace_range(start..end, insert);
    damage.record(start, end, insert.len());
}

fn check_invariants(tree: &SyntaxTree, id: NodeId) {
    let span = tree.span(id);
    let mut previous_end = span.start;
    for &child in tree.children(id) {
        let child_span = tree.span(child);
        assert!(child_span.start >= previous_end, "siblings overlap at {child_span}");
        assert!(span.contains_span(child_span), "{child_span} escapes {span}");
        assert_eq!(tree.node(child).parent(), Some(id));
        previous_end = child_span.end;
        check_invariants(tree, child);
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_single_edit_matches_full_parse(program in arb_program(), edit in arb_edit()) {
        let tree = parse(&program);
        let mut text = program.clone();
        let mut damage = Damage::Clean;
        apply(&mut text, &mut damage, &edit);

        let incremental = reparse(Some(tree), &text, &damage);
        let full = parse(&text);
        prop_assert!(
            incremental.same_shape(&full),
            "old: {:?}\nnew: {:?}\nincremental:\n{}\nfull:\n{}",
            program, text, incremental, full
        );
    }

    #[test]
    fn prop_edit_sequence_matches_full_parse(
        program in arb_program(),
        edits in prop::collection::vec(arb_edit(), 1..4),
    ) {
        let tree = parse(&program);
        let mut text = program.clone();
        let mut damage = Damage::Clean;
        for edit in &edits {
            apply(&mut text, &mut damage, edit);
        }

        let incremental = reparse(Some(tree), &text, &damage);
        prop_assert!(incremental.same_shape(&parse(&text)));
    }

    #[test]
    fn prop_tree_invariants(program in arb_program()) {
        let tree = parse(&program);
        prop_assert_eq!(tree.span(tree.root()).start, 0);
        prop_assert_eq!(tree.span(tree.root()).end, program.len());
        check_invariants(&tree, tree.root());
    }

    #[test]
    fn prop_reparsed_tree_invariants(program in arb_program(), edit in arb_edit()) {
        let tree = parse(&program);
        let mut text = program.clone();
        let mut damage = Damage::Clean;
        apply(&mut text, &mut damage, &edit);

        let incremental = reparse(Some(tree), &text, &damage);
        prop_assert_eq!(incremental.span(incremental.root()).end, text.len());
        check_invariants(&incremental, incremental.root());
    }

    #[test]
    fn prop_parse_never_panics(source in "\\PC{0,64}") {
        let tree = parse(&source);
        prop_assert_eq!(tree.span(tree.root()).end, source.len());
    }
}
