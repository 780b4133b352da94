//! Integration tests for the parser.
//!
//! Covers well-formed programs, operator precedence, and error recovery.

use projectk_syntax::{parse, NodeId, ParseErrorKind, Span, SyntaxKind, SyntaxTree};

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_ok(source: &str) -> SyntaxTree {
    let tree = parse(source);
    let errors = tree.errors();
    assert!(errors.is_empty(), "expected no errors, got: {errors:?}\n{tree}");
    tree
}

fn kinds_below(tree: &SyntaxTree, id: NodeId) -> Vec<SyntaxKind> {
    tree.descendants(id)
        .into_iter()
        .map(|node| tree.kind(node))
        .collect()
}

fn first_stmt(tree: &SyntaxTree) -> NodeId {
    tree.children(tree.root())[0]
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_let_statement() {
    let tree = parse_ok("let x = 1;");
    assert_eq!(
        tree.dump(),
        "Root@0..10\n  LetStmt@0..10\n    Name@4..5\n    Literal@8..9\n"
    );
}

#[test]
fn test_let_without_initializer() {
    let tree = parse_ok("let x;");
    assert_eq!(
        kinds_below(&tree, first_stmt(&tree)),
        vec![SyntaxKind::LetStmt, SyntaxKind::Name]
    );
}

#[test]
fn test_function_declaration() {
    let tree = parse_ok("fn add(a, b) { return a + b; }");
    assert_eq!(
        kinds_below(&tree, first_stmt(&tree)),
        vec![
            SyntaxKind::FnDecl,
            SyntaxKind::Name,
            SyntaxKind::ParamList,
            SyntaxKind::Name,
            SyntaxKind::Name,
            SyntaxKind::Block,
            SyntaxKind::ReturnStmt,
            SyntaxKind::BinaryExpr,
            SyntaxKind::NameRef,
            SyntaxKind::NameRef,
        ]
    );
}

#[test]
fn test_if_else_chain() {
    let tree = parse_ok("if a { b; } else if c { d; } else { e; }");
    let stmt = first_stmt(&tree);
    assert_eq!(tree.kind(stmt), SyntaxKind::IfStmt);
    let nested = tree.child_of_kind(stmt, SyntaxKind::IfStmt).unwrap();
    assert_eq!(
        tree.children(nested)
            .iter()
            .filter(|&&c| tree.kind(c) == SyntaxKind::Block)
            .count(),
        2
    );
}

#[test]
fn test_while_and_calls() {
    let tree = parse_ok("while i < 10 { print(i, \"x\"); i = i + 1; }");
    let kinds = kinds_below(&tree, first_stmt(&tree));
    assert!(kinds.contains(&SyntaxKind::CallExpr));
    assert!(kinds.contains(&SyntaxKind::ArgList));
    assert!(kinds.contains(&SyntaxKind::AssignExpr));
}

#[test]
fn test_comments_are_skipped() {
    let tree = parse_ok("// leading\nlet x = 1; // trailing\n");
    assert_eq!(tree.children(tree.root()).len(), 1);
    assert_eq!(tree.span(first_stmt(&tree)), Span::new(11, 21));
}

#[test]
fn test_root_spans_whole_text() {
    let source = "  let x = 1;  \n\n";
    let tree = parse_ok(source);
    assert_eq!(tree.span(tree.root()), Span::new(0, source.len()));
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_precedence() {
    let tree = parse_ok("x = 1 + 2 * 3;");
    assert_eq!(
        kinds_below(&tree, first_stmt(&tree)),
        vec![
            SyntaxKind::ExprStmt,
            SyntaxKind::AssignExpr,
            SyntaxKind::NameRef,
            SyntaxKind::BinaryExpr,
            SyntaxKind::Literal,
            SyntaxKind::BinaryExpr,
            SyntaxKind::Literal,
            SyntaxKind::Literal,
        ]
    );
}

#[test]
fn test_left_associativity() {
    let tree = parse_ok("1 - 2 - 3;");
    let stmt = first_stmt(&tree);
    let outer = tree.children(stmt)[0];
    let inner = tree.children(outer)[0];
    assert_eq!(tree.kind(inner), SyntaxKind::BinaryExpr);
    assert_eq!(tree.span(inner), Span::new(0, 5));
    assert_eq!(tree.span(outer), Span::new(0, 9));
}

#[test]
fn test_unary_and_parens() {
    let tree = parse_ok("let y = -(a + !b);");
    let kinds = kinds_below(&tree, first_stmt(&tree));
    assert_eq!(
        kinds.iter().filter(|&&k| k == SyntaxKind::UnaryExpr).count(),
        2
    );
    assert!(kinds.contains(&SyntaxKind::ParenExpr));
}

// ============================================================================
// Error Recovery
// ============================================================================

#[test]
fn test_missing_expression() {
    let tree = parse("let x = ;");
    let errors = tree.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].span, Span::empty(8));
    assert_eq!(
        errors[0].kind,
        ParseErrorKind::Expected("expression".to_string())
    );
    let stmt = first_stmt(&tree);
    assert_eq!(tree.span(stmt), Span::new(0, 9));
    assert!(tree.child_of_kind(stmt, SyntaxKind::Name).is_some());
}

#[test]
fn test_junk_between_statements() {
    let tree = parse("let a = 1; ) ) let b = a;");
    let errors = tree.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].span, Span::new(11, 14));
    let kinds: Vec<_> = tree
        .children(tree.root())
        .iter()
        .map(|&c| tree.kind(c))
        .collect();
    assert_eq!(
        kinds,
        vec![SyntaxKind::LetStmt, SyntaxKind::Error, SyntaxKind::LetStmt]
    );
}

#[test]
fn test_unclosed_string() {
    let tree = parse("let s = \"abc");
    let errors = tree.errors();
    assert_eq!(errors[0].kind, ParseErrorKind::UnclosedString);
    assert_eq!(errors[0].span, Span::new(8, 12));
    assert_eq!(errors.len(), 2, "unclosed string plus missing `;`");
}

#[test]
fn test_stray_closing_brace() {
    let tree = parse("}");
    let errors = tree.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].kind,
        ParseErrorKind::UnexpectedToken("`}`".to_string())
    );
}

#[test]
fn test_unclosed_block() {
    let source = "fn f() { let x = 1;";
    let tree = parse(source);
    let errors = tree.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].span, Span::empty(source.len()));
    assert_eq!(errors[0].kind, ParseErrorKind::Expected("`}`".to_string()));
}

#[test]
fn test_invalid_character() {
    let tree = parse("@;");
    let errors = tree.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ParseErrorKind::UnexpectedChar('@'));
    assert_eq!(errors[0].span, Span::new(0, 2));
}

#[test]
fn test_statements_after_errors_still_parse() {
    let tree = parse("let = 5; fn (x) { y }\nlet z = 2;");
    let last = *tree.children(tree.root()).last().unwrap();
    assert_eq!(tree.kind(last), SyntaxKind::LetStmt);
    assert!(tree.child_of_kind(last, SyntaxKind::Name).is_some());
    assert_eq!(tree.errors().len(), 3);
}

// ============================================================================
// Nesting Limit
// ============================================================================

/// Parse on a thread with the stack size of a worker thread.
fn parse_on_small_stack(source: String) -> SyntaxTree {
    std::thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(move || parse(&source))
        .unwrap()
        .join()
        .unwrap()
}

fn nesting_errors(tree: &SyntaxTree) -> usize {
    tree.errors()
        .iter()
        .filter(|e| e.kind == ParseErrorKind::NestingTooDeep)
        .count()
}

#[test]
fn test_deep_unclosed_parens() {
    let tree = parse_on_small_stack(format!("let x = {}1;", "(".repeat(200_000)));
    assert_eq!(nesting_errors(&tree), 1);
}

#[test]
fn test_deep_balanced_parens_recover() {
    let depth = 1_000;
    let source = format!("let x = {}1{};\nlet y = 2;", "(".repeat(depth), ")".repeat(depth));
    let tree = parse_on_small_stack(source);
    let errors = tree.errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].kind, ParseErrorKind::NestingTooDeep);
    assert_eq!(errors[0].label(), "nesting too deep");
    let stmts: Vec<_> = tree
        .children(tree.root())
        .iter()
        .map(|&id| tree.kind(id))
        .collect();
    assert_eq!(stmts, vec![SyntaxKind::LetStmt, SyntaxKind::LetStmt]);
}

#[test]
fn test_deep_blocks_recover() {
    let depth = 100_000;
    let source = format!("{}x;{}\nlet after = 1;", "{".repeat(depth), "}".repeat(depth));
    let tree = parse_on_small_stack(source);
    assert_eq!(tree.errors().len(), 1);
    assert_eq!(nesting_errors(&tree), 1);
    let stmts: Vec<_> = tree
        .children(tree.root())
        .iter()
        .map(|&id| tree.kind(id))
        .collect();
    assert_eq!(stmts, vec![SyntaxKind::Block, SyntaxKind::LetStmt]);
}

#[test]
fn test_deep_prefix_operators() {
    let tree = parse_on_small_stack(format!("let x = {}1;\nx;", "-".repeat(200_000)));
    assert_eq!(tree.errors().len(), 1);
    assert_eq!(nesting_errors(&tree), 1);
    assert_eq!(tree.children(tree.root()).len(), 2);
}

#[test]
fn test_nesting_below_limit_is_accepted() {
    let source = format!("let x = {}1{};", "(".repeat(100), ")".repeat(100));
    parse_ok(&source);
}

#[test]
fn test_long_operator_chain_is_not_nesting() {
    let source = format!("let x = 1{};", " + 1".repeat(100_000));
    let tree = parse_on_small_stack(source);
    assert!(tree.errors().is_empty());
    assert!(tree.dump().lines().count() > 100_000);
}
