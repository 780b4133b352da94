//! Parse error types.

use crate::Span;
use std::fmt;

/// A parse error with location information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// The span the error covers. Zero-width when something is missing.
    pub span: Span,
}

impl ParseError {
    /// Create a new parse error.
    #[must_use]
    pub const fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Get a numeric code for the error kind.
    #[must_use]
    pub const fn kind_code(&self) -> u32 {
        self.kind.code()
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Get a short label for the error.
    #[must_use]
    pub const fn label(&self) -> &str {
        self.kind.label()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}

impl std::error::Error for ParseError {}

/// Kinds of parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A character the lexer does not recognize.
    UnexpectedChar(char),
    /// A token that cannot appear here.
    UnexpectedToken(String),
    /// Something required is missing.
    Expected(String),
    /// A string literal without its closing quote.
    UnclosedString,
    /// Blocks or expressions nested past the parser's limit.
    NestingTooDeep,
}

impl ParseErrorKind {
    /// Stable numeric code, rendered as `P0001` and so on.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::UnexpectedChar(_) => 1,
            Self::UnexpectedToken(_) => 2,
            Self::Expected(_) => 3,
            Self::UnclosedString => 4,
            Self::NestingTooDeep => 5,
        }
    }

    /// Short label for the error.
    #[must_use]
    pub const fn label(&self) -> &str {
        match self {
            Self::UnexpectedChar(_) => "unexpected character",
            Self::UnexpectedToken(_) => "unexpected token",
            Self::Expected(_) => "missing syntax",
            Self::UnclosedString => "unclosed string",
            Self::NestingTooDeep => "nesting too deep",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedChar(c) => write!(f, "unexpected character '{c}'"),
            Self::UnexpectedToken(t) => write!(f, "unexpected {t}"),
            Self::Expected(what) => write!(f, "expected {what}"),
            Self::UnclosedString => write!(f, "unclosed string literal"),
            Self::NestingTooDeep => write!(f, "nesting too deep"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ParseErrorKind::UnexpectedChar('@').to_string(),
            "unexpected character '@'"
        );
        assert_eq!(
            ParseErrorKind::UnexpectedToken("`)`".into()).to_string(),
            "unexpected `)`"
        );
        assert_eq!(
            ParseErrorKind::Expected("expression".into()).to_string(),
            "expected expression"
        );
        assert_eq!(
            ParseErrorKind::UnclosedString.to_string(),
            "unclosed string literal"
        );
    }

    #[test]
    fn test_codes_are_distinct() {
        let kinds = [
            ParseErrorKind::UnexpectedChar('x'),
            ParseErrorKind::UnexpectedToken(String::new()),
            ParseErrorKind::Expected(String::new()),
            ParseErrorKind::UnclosedString,
            ParseErrorKind::NestingTooDeep,
        ];
        let mut codes: Vec<u32> = kinds.iter().map(ParseErrorKind::code).collect();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_error_display_includes_span() {
        let err = ParseError::new(ParseErrorKind::UnclosedString, Span::new(3, 8));
        assert_eq!(err.to_string(), "unclosed string literal at 3..8");
        assert_eq!(err.kind_code(), 4);
        assert_eq!(err.label(), "unclosed string");
        assert_eq!(err.message(), "unclosed string literal");
    }
}
