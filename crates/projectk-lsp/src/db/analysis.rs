//! Per-version analysis results.

use super::symbols::SymbolTable;
use crate::handlers::utils::LineIndex;
use lsp_types::Uri;
use projectk_syntax::{tokenize, Lexeme, ParseError, Span, SyntaxTree};
use std::sync::Arc;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something the program cannot mean.
    Error,
    /// Suspicious but well-formed.
    Warning,
}

/// A problem found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Byte range the diagnostic covers.
    pub span: Span,
    /// Stable code: `P0001` and up for syntax, `E0001` unresolved
    /// identifier, `W0001` duplicate definition.
    pub code: String,
    /// Document version the diagnostic was computed at.
    pub version: i32,
}

impl Diagnostic {
    /// Diagnostic for a parse error node.
    pub fn from_parse_error(error: &ParseError, version: i32) -> Self {
        Self {
            severity: Severity::Error,
            message: error.message(),
            span: error.span,
            code: format!("P{:04}", error.kind_code()),
            version,
        }
    }
}

/// Everything the handlers need to answer requests about one document
/// version. Immutable once built and shared behind an `Arc`.
#[derive(Debug)]
pub struct Analysis {
    /// The document.
    pub uri: Uri,
    /// The version this analysis reflects.
    pub version: i32,
    /// Which opening of the document this analysis belongs to.
    pub epoch: u64,
    /// Generation of the syntax tree it was built from.
    pub generation: u64,
    /// Line index over the text of that version.
    pub line_index: LineIndex,
    /// Tokens of the text, comments included.
    pub lexemes: Vec<Lexeme>,
    /// Names and scopes.
    pub symbols: SymbolTable,
    /// Syntax and binding diagnostics, sorted by position.
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    /// Analyze a parsed document.
    pub fn new(uri: Uri, version: i32, text: Arc<str>, tree: &SyntaxTree) -> Self {
        let (symbols, mut diagnostics) = SymbolTable::build(tree, &text, version);
        diagnostics.extend(
            tree.errors()
                .iter()
                .map(|error| Diagnostic::from_parse_error(error, version)),
        );
        diagnostics.sort_by_key(|d| (d.span.start, d.span.end));
        Self {
            uri,
            version,
            epoch: 0,
            generation: tree.generation(),
            lexemes: tokenize(&text),
            line_index: LineIndex::new(text),
            symbols,
            diagnostics,
        }
    }

    /// Tag the analysis with the epoch of the document it was built from.
    #[must_use]
    pub const fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    /// The analyzed text.
    pub fn text(&self) -> &str {
        self.line_index.text()
    }
}
