//! Lexer for project_k built on Logos.
//!
//! Tokens carry no data; the text of a token is recovered from its span.
//! Comments are produced as tokens (the highlighter needs them) and are
//! filtered out by the parser.

use crate::Span;
use logos::Logos;
use std::fmt;

/// Token kinds produced by the lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    // ===== Keywords =====
    /// `let`
    #[token("let")]
    Let,
    /// `fn`
    #[token("fn")]
    Fn,
    /// `if`
    #[token("if")]
    If,
    /// `else`
    #[token("else")]
    Else,
    /// `while`
    #[token("while")]
    While,
    /// `return`
    #[token("return")]
    Return,
    /// `true`
    #[token("true")]
    True,
    /// `false`
    #[token("false")]
    False,

    // ===== Literals =====
    /// An identifier.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    /// An integer or decimal number.
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,
    /// A double-quoted string on a single line.
    #[regex(r#""([^"\\\r\n]|\\[^\r\n])*""#)]
    String,
    /// A string missing its closing quote; runs to end of line.
    #[regex(r#""([^"\\\r\n]|\\[^\r\n])*"#)]
    UnterminatedString,

    // ===== Trivia =====
    /// A line comment. `\r` ends a line as well as `\n`.
    #[regex(r"//[^\r\n]*")]
    Comment,

    // ===== Punctuation =====
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `{`
    #[token("{")]
    LBrace,
    /// `}`
    #[token("}")]
    RBrace,
    /// `,`
    #[token(",")]
    Comma,
    /// `;`
    #[token(";")]
    Semi,

    // ===== Operators =====
    /// `=`
    #[token("=")]
    Eq,
    /// `==`
    #[token("==")]
    EqEq,
    /// `!=`
    #[token("!=")]
    NotEq,
    /// `<`
    #[token("<")]
    Lt,
    /// `<=`
    #[token("<=")]
    LtEq,
    /// `>`
    #[token(">")]
    Gt,
    /// `>=`
    #[token(">=")]
    GtEq,
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `*`
    #[token("*")]
    Star,
    /// `/`
    #[token("/")]
    Slash,
    /// `%`
    #[token("%")]
    Percent,
    /// `!`
    #[token("!")]
    Bang,
    /// `&&`
    #[token("&&")]
    AndAnd,
    /// `||`
    #[token("||")]
    OrOr,

    /// A character sequence the lexer does not recognize.
    Error,
}

impl TokenKind {
    /// Whether this is a keyword.
    #[must_use]
    pub const fn is_keyword(self) -> bool {
        matches!(
            self,
            Self::Let
                | Self::Fn
                | Self::If
                | Self::Else
                | Self::While
                | Self::Return
                | Self::True
                | Self::False
        )
    }

    /// Whether this is an operator.
    #[must_use]
    pub const fn is_operator(self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::EqEq
                | Self::NotEq
                | Self::Lt
                | Self::LtEq
                | Self::Gt
                | Self::GtEq
                | Self::Plus
                | Self::Minus
                | Self::Star
                | Self::Slash
                | Self::Percent
                | Self::Bang
                | Self::AndAnd
                | Self::OrOr
        )
    }

    /// Whether the parser skips this token.
    #[must_use]
    pub const fn is_trivia(self) -> bool {
        matches!(self, Self::Comment)
    }

    /// Whether this token can begin an expression.
    #[must_use]
    pub const fn starts_expr(self) -> bool {
        matches!(
            self,
            Self::Number
                | Self::String
                | Self::UnterminatedString
                | Self::True
                | Self::False
                | Self::Ident
                | Self::LParen
                | Self::Minus
                | Self::Bang
        )
    }

    /// Whether this token can begin a statement.
    #[must_use]
    pub const fn starts_stmt(self) -> bool {
        matches!(
            self,
            Self::Let | Self::Fn | Self::If | Self::While | Self::Return | Self::LBrace
        ) || self.starts_expr()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Let => "`let`",
            Self::Fn => "`fn`",
            Self::If => "`if`",
            Self::Else => "`else`",
            Self::While => "`while`",
            Self::Return => "`return`",
            Self::True => "`true`",
            Self::False => "`false`",
            Self::Ident => "identifier",
            Self::Number => "number",
            Self::String => "string",
            Self::UnterminatedString => "unterminated string",
            Self::Comment => "comment",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::LBrace => "`{`",
            Self::RBrace => "`}`",
            Self::Comma => "`,`",
            Self::Semi => "`;`",
            Self::Eq => "`=`",
            Self::EqEq => "`==`",
            Self::NotEq => "`!=`",
            Self::Lt => "`<`",
            Self::LtEq => "`<=`",
            Self::Gt => "`>`",
            Self::GtEq => "`>=`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Star => "`*`",
            Self::Slash => "`/`",
            Self::Percent => "`%`",
            Self::Bang => "`!`",
            Self::AndAnd => "`&&`",
            Self::OrOr => "`||`",
            Self::Error => "invalid character",
        };
        f.write_str(text)
    }
}

/// A token with its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme {
    /// What was lexed.
    pub kind: TokenKind,
    /// Where it was lexed, in absolute byte offsets.
    pub span: Span,
}

/// Tokenize source, trivia included.
pub fn tokenize(source: &str) -> Vec<Lexeme> {
    tokenize_at(source, 0)
}

/// Tokenize a slice whose first byte sits at `base` in the full text.
pub(crate) fn tokenize_at(source: &str, base: usize) -> Vec<Lexeme> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(base + range.start, base + range.end);
        let kind = result.unwrap_or(TokenKind::Error);
        tokens.push(Lexeme { kind, span });
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_let_statement() {
        assert_eq!(
            kinds("let x = 1;"),
            vec![
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Number,
                TokenKind::Semi
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("let x = 1;");
        assert_eq!(tokens[1].span, Span::new(4, 5));
        assert_eq!(tokens[3].span, Span::new(8, 9));
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(kinds("letter"), vec![TokenKind::Ident]);
        assert_eq!(kinds("fnord iffy"), vec![TokenKind::Ident, TokenKind::Ident]);
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            kinds("a == b != c <= d && e || !f"),
            vec![
                TokenKind::Ident,
                TokenKind::EqEq,
                TokenKind::Ident,
                TokenKind::NotEq,
                TokenKind::Ident,
                TokenKind::LtEq,
                TokenKind::Ident,
                TokenKind::AndAnd,
                TokenKind::Ident,
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Ident
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(kinds(r#""hello \"world\"""#), vec![TokenKind::String]);
        assert_eq!(
            kinds("\"open\nx"),
            vec![TokenKind::UnterminatedString, TokenKind::Ident]
        );
    }

    #[test]
    fn test_comment_is_trivia() {
        let tokens = tokenize("x // note\ny");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].kind, TokenKind::Comment);
        assert!(tokens[1].kind.is_trivia());
        assert_eq!(tokens[1].span, Span::new(2, 9));
    }

    #[test]
    fn test_carriage_return_ends_line() {
        let tokens = tokenize("// a\rlet x = 1;");
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].span, Span::new(0, 4));
        assert_eq!(tokens[1].kind, TokenKind::Let);

        assert_eq!(
            kinds("\"open\rx"),
            vec![TokenKind::UnterminatedString, TokenKind::Ident]
        );
    }

    #[test]
    fn test_division_is_not_comment() {
        assert_eq!(
            kinds("a / b"),
            vec![TokenKind::Ident, TokenKind::Slash, TokenKind::Ident]
        );
    }

    #[test]
    fn test_invalid_character() {
        let tokens = tokenize("x @ y");
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(tokens[1].span, Span::new(2, 3));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42 3.14"), vec![TokenKind::Number, TokenKind::Number]);
    }

    #[test]
    fn test_base_offset() {
        let tokens = tokenize_at("{ y }", 10);
        assert_eq!(tokens[0].span, Span::new(10, 11));
        assert_eq!(tokens[2].span, Span::new(14, 15));
    }
}
