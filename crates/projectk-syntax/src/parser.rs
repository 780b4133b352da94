//! Error-tolerant recursive-descent parser.
//!
//! The parser never fails. Anything it cannot make sense of ends up in an
//! `Error` node and parsing resumes at the next plausible statement start.
//!
//! Decisions look at the current token only. Block re-parsing relies on
//! this: a `{ ... }` group parses the same way no matter what surrounds it,
//! given the nesting depth it starts at.
//!
//! Nesting is capped at [`MAX_NESTING`] levels of blocks, `if` chains,
//! expressions and prefix operators. A group nested deeper becomes a single
//! `Error` node.

use crate::lexer::{Lexeme, TokenKind};
use crate::tree::{NodeId, SyntaxKind, SyntaxTree, TreeBuilder};
use crate::ParseErrorKind;

/// Deepest nesting the parser descends into.
pub(crate) const MAX_NESTING: usize = 128;

/// What a nesting level opens; decides how far a too-deep one is skipped.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Level {
    Statement,
    Expression,
}

pub(crate) struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Lexeme>,
    pos: usize,
    eof: usize,
    depth: usize,
    builder: TreeBuilder,
}

impl<'a> Parser<'a> {
    /// `tokens` may include trivia; `eof` is where zero-width nodes go once
    /// the tokens run out.
    pub(crate) fn new(source: &'a str, tokens: Vec<Lexeme>, eof: usize) -> Self {
        let tokens = tokens.into_iter().filter(|t| !t.kind.is_trivia()).collect();
        Self {
            source,
            tokens,
            pos: 0,
            eof,
            depth: 0,
            builder: TreeBuilder::new(),
        }
    }

    /// Start as if already nested `depth` levels deep.
    pub(crate) const fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Parse a whole file.
    pub(crate) fn parse_file(mut self, generation: u64) -> SyntaxTree {
        self.builder.start_node(SyntaxKind::Root);
        while let Some(kind) = self.current() {
            if kind == TokenKind::RBrace {
                self.error_token(ParseErrorKind::UnexpectedToken(kind.to_string()));
            } else {
                self.stmt();
            }
        }
        self.builder.finish_node(self.eof);
        let mut tree = self.builder.finish_tree(generation);
        tree.nodes[tree.root.index()].span = crate::Span::new(0, self.source.len());
        tree
    }

    /// Parse a lone block. Returns `None` unless the tokens form exactly
    /// one block.
    pub(crate) fn parse_block(mut self) -> Option<SyntaxTree> {
        if !self.at(TokenKind::LBrace) {
            return None;
        }
        self.block();
        if self.pos != self.tokens.len() {
            return None;
        }
        Some(self.builder.finish_tree(0))
    }

    // ===== Token helpers =====

    fn current(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current() == Some(kind)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.eof, |t| t.span.start)
    }

    fn bump(&mut self) {
        if let Some(token) = self.tokens.get(self.pos) {
            self.builder.token(token.span);
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn finish(&mut self) -> NodeId {
        self.builder.finish_node(self.offset())
    }

    /// Zero-width error node where something is missing.
    fn missing(&mut self, what: &str) -> NodeId {
        self.builder.start_node(SyntaxKind::Error);
        self.builder
            .finish_error(self.offset(), ParseErrorKind::Expected(what.to_string()))
    }

    fn expect(&mut self, kind: TokenKind, what: &str) {
        if !self.eat(kind) {
            self.missing(what);
        }
    }

    /// Error node around exactly the current token.
    fn error_token(&mut self, error: ParseErrorKind) -> NodeId {
        self.builder.start_node(SyntaxKind::Error);
        self.bump();
        self.builder.finish_error(self.offset(), error)
    }

    fn unexpected(&self) -> ParseErrorKind {
        match self.tokens.get(self.pos) {
            Some(token) if token.kind == TokenKind::Error => {
                let c = self
                    .source
                    .get(token.span.start..)
                    .and_then(|rest| rest.chars().next())
                    .unwrap_or('?');
                ParseErrorKind::UnexpectedChar(c)
            }
            Some(token) => ParseErrorKind::UnexpectedToken(token.kind.to_string()),
            None => ParseErrorKind::Expected("more input".to_string()),
        }
    }

    /// Descend one nesting level. Past the cap, the construct at the
    /// current token is skipped and the error node standing for it is
    /// returned.
    fn enter(&mut self, level: Level) -> Result<(), NodeId> {
        if self.depth >= MAX_NESTING {
            return Err(self.skip_nested(level));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Consume the construct starting at the current token, keeping
    /// brackets balanced. Stops before a `;`, statement keyword or unmatched
    /// closer outside any bracket. A statement also ends at the `}` closing
    /// its last group unless an `else` follows.
    fn skip_nested(&mut self, level: Level) -> NodeId {
        self.builder.start_node(SyntaxKind::Error);
        let mut open: Vec<TokenKind> = Vec::new();
        let mut previous = None;
        while let Some(kind) = self.current() {
            let outside = open.is_empty();
            match kind {
                TokenKind::LParen | TokenKind::LBrace => open.push(kind),
                TokenKind::RParen | TokenKind::RBrace => {
                    let opener = if kind == TokenKind::RParen {
                        TokenKind::LParen
                    } else {
                        TokenKind::LBrace
                    };
                    if open.last() != Some(&opener) {
                        break;
                    }
                    open.pop();
                    if open.is_empty()
                        && level == Level::Statement
                        && kind == TokenKind::RBrace
                        && self.tokens.get(self.pos + 1).map(|t| t.kind) != Some(TokenKind::Else)
                    {
                        self.bump();
                        break;
                    }
                }
                TokenKind::Semi if outside => break,
                _ if outside
                    && previous.is_some()
                    && previous != Some(TokenKind::Else)
                    && kind.starts_stmt()
                    && !kind.starts_expr() =>
                {
                    break;
                }
                _ => {}
            }
            self.bump();
            previous = Some(kind);
        }
        self.builder
            .finish_error(self.offset(), ParseErrorKind::NestingTooDeep)
    }

    // ===== Statements =====

    fn stmt(&mut self) {
        match self.current() {
            Some(TokenKind::Let) => self.let_stmt(),
            Some(TokenKind::Fn) => self.fn_decl(),
            Some(TokenKind::If) => self.if_stmt(),
            Some(TokenKind::While) => self.while_stmt(),
            Some(TokenKind::Return) => self.return_stmt(),
            Some(TokenKind::LBrace) => {
                self.block();
            }
            Some(kind) if kind.starts_expr() => self.expr_stmt(),
            Some(_) => self.recover(),
            None => {}
        }
    }

    /// Swallow tokens that cannot start a statement, up to and including a
    /// `;`. Stops before `}` and before anything that starts a statement.
    fn recover(&mut self) {
        let error = self.unexpected();
        self.builder.start_node(SyntaxKind::Error);
        let first = self.current();
        self.bump();
        if first != Some(TokenKind::Semi) {
            while let Some(kind) = self.current() {
                if kind.starts_stmt() || kind == TokenKind::RBrace {
                    break;
                }
                self.bump();
                if kind == TokenKind::Semi {
                    break;
                }
            }
        }
        self.builder.finish_error(self.offset(), error);
    }

    fn name(&mut self, what: &str) {
        if self.at(TokenKind::Ident) {
            self.builder.start_node(SyntaxKind::Name);
            self.bump();
            self.finish();
        } else {
            self.missing(what);
        }
    }

    fn let_stmt(&mut self) {
        self.builder.start_node(SyntaxKind::LetStmt);
        self.bump();
        self.name("variable name");
        if self.eat(TokenKind::Eq) {
            self.expr();
        }
        self.expect(TokenKind::Semi, "`;`");
        self.finish();
    }

    fn fn_decl(&mut self) {
        self.builder.start_node(SyntaxKind::FnDecl);
        self.bump();
        self.name("function name");
        if self.at(TokenKind::LParen) {
            self.param_list();
        } else {
            self.missing("`(`");
        }
        if self.at(TokenKind::LBrace) {
            self.block();
        } else {
            self.missing("function body");
        }
        self.finish();
    }

    fn param_list(&mut self) {
        self.builder.start_node(SyntaxKind::ParamList);
        self.bump();
        loop {
            match self.current() {
                Some(TokenKind::Ident) => self.name("parameter name"),
                Some(TokenKind::Comma) => {
                    self.missing("parameter name");
                }
                _ => break,
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`");
        self.finish();
    }

    fn if_stmt(&mut self) {
        if self.enter(Level::Statement).is_err() {
            return;
        }
        self.builder.start_node(SyntaxKind::IfStmt);
        self.bump();
        self.condition();
        if self.eat(TokenKind::Else) {
            match self.current() {
                Some(TokenKind::If) => self.if_stmt(),
                Some(TokenKind::LBrace) => {
                    self.block();
                }
                _ => {
                    self.missing("`{` or `if`");
                }
            }
        }
        self.finish();
        self.leave();
    }

    fn while_stmt(&mut self) {
        self.builder.start_node(SyntaxKind::WhileStmt);
        self.bump();
        self.condition();
        self.finish();
    }

    /// Condition expression followed by a body block.
    fn condition(&mut self) {
        if self.at(TokenKind::LBrace) {
            self.missing("condition");
        } else {
            self.expr();
        }
        if self.at(TokenKind::LBrace) {
            self.block();
        } else {
            self.missing("`{`");
        }
    }

    fn return_stmt(&mut self) {
        self.builder.start_node(SyntaxKind::ReturnStmt);
        self.bump();
        if self.current().is_some_and(TokenKind::starts_expr) {
            self.expr();
        }
        self.expect(TokenKind::Semi, "`;`");
        self.finish();
    }

    fn expr_stmt(&mut self) {
        self.builder.start_node(SyntaxKind::ExprStmt);
        self.expr();
        self.expect(TokenKind::Semi, "`;`");
        self.finish();
    }

    fn block(&mut self) {
        if self.enter(Level::Statement).is_err() {
            return;
        }
        self.builder.start_node(SyntaxKind::Block);
        self.bump();
        while let Some(kind) = self.current() {
            if kind == TokenKind::RBrace {
                break;
            }
            self.stmt();
        }
        self.expect(TokenKind::RBrace, "`}`");
        self.finish();
        self.leave();
    }

    // ===== Expressions =====

    fn expr(&mut self) {
        if self.enter(Level::Expression).is_err() {
            return;
        }
        let lhs = self.binary(0);
        if self.at(TokenKind::Eq) {
            self.builder.start_node_before(lhs, SyntaxKind::AssignExpr);
            self.bump();
            self.expr();
            self.finish();
        }
        self.leave();
    }

    fn binary(&mut self, min_power: u8) -> NodeId {
        let mut lhs = self.unary();
        while let Some(power) = self.current().and_then(infix_power) {
            if power < min_power {
                break;
            }
            self.builder.start_node_before(lhs, SyntaxKind::BinaryExpr);
            self.bump();
            self.binary(power + 1);
            lhs = self.finish();
        }
        lhs
    }

    fn unary(&mut self) -> NodeId {
        if matches!(self.current(), Some(TokenKind::Minus | TokenKind::Bang)) {
            if let Err(error) = self.enter(Level::Expression) {
                return error;
            }
            self.builder.start_node(SyntaxKind::UnaryExpr);
            self.bump();
            self.unary();
            let node = self.finish();
            self.leave();
            return node;
        }
        self.postfix()
    }

    fn postfix(&mut self) -> NodeId {
        let mut expr = self.primary();
        while self.at(TokenKind::LParen) {
            self.builder.start_node_before(expr, SyntaxKind::CallExpr);
            self.arg_list();
            expr = self.finish();
        }
        expr
    }

    fn arg_list(&mut self) {
        self.builder.start_node(SyntaxKind::ArgList);
        self.bump();
        while self.current().is_some_and(TokenKind::starts_expr) {
            self.expr();
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`");
        self.finish();
    }

    fn primary(&mut self) -> NodeId {
        match self.current() {
            Some(TokenKind::Number | TokenKind::String | TokenKind::True | TokenKind::False) => {
                self.builder.start_node(SyntaxKind::Literal);
                self.bump();
                self.finish()
            }
            Some(TokenKind::Ident) => {
                self.builder.start_node(SyntaxKind::NameRef);
                self.bump();
                self.finish()
            }
            Some(TokenKind::LParen) => {
                self.builder.start_node(SyntaxKind::ParenExpr);
                self.bump();
                self.expr();
                self.expect(TokenKind::RParen, "`)`");
                self.finish()
            }
            Some(TokenKind::UnterminatedString) => self.error_token(ParseErrorKind::UnclosedString),
            _ => self.missing("expression"),
        }
    }
}

/// Binding power of infix operators; higher binds tighter.
const fn infix_power(kind: TokenKind) -> Option<u8> {
    let power = match kind {
        TokenKind::OrOr => 1,
        TokenKind::AndAnd => 2,
        TokenKind::EqEq | TokenKind::NotEq => 3,
        TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq => 4,
        TokenKind::Plus | TokenKind::Minus => 5,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 6,
        _ => return None,
    };
    Some(power)
}
