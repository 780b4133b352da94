//! Completion handler for autocompletion.
//!
//! Offers keywords and the symbols visible at the cursor, filtered by the
//! identifier prefix already typed.

use lsp_types::{CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse};
use projectk_syntax::{Lexeme, TokenKind};

use super::utils::{ident_prefix, token_at};
use crate::db::{Analysis, SymbolKind};

/// Language keywords.
const KEYWORDS: &[&str] = &["let", "fn", "if", "else", "while", "return", "true", "false"];

/// Completion context detected from cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionContext {
    /// Inside a comment or string literal.
    Literal,
    /// Anywhere code can be typed.
    Code {
        /// The identifier fragment before the cursor.
        prefix: String,
    },
}

/// Handle a completion request.
pub fn handle_completion(params: &CompletionParams, analysis: &Analysis) -> Option<CompletionResponse> {
    let position = params.text_document_position.position;
    let offset = analysis.line_index.position_to_offset(position);
    let context = detect_context(analysis.text(), &analysis.lexemes, offset);

    tracing::debug!("Completion context: {:?} at {:?}", context, position);

    let CompletionContext::Code { prefix } = context else {
        return None;
    };

    let mut items: Vec<CompletionItem> = analysis
        .symbols
        .visible_at(offset)
        .into_iter()
        .map(|id| analysis.symbols.symbol(id))
        .filter(|symbol| symbol.name.starts_with(&prefix) && symbol.name != prefix)
        .map(|symbol| {
            let kind = match symbol.kind {
                SymbolKind::Function => CompletionItemKind::FUNCTION,
                SymbolKind::Parameter | SymbolKind::Variable => CompletionItemKind::VARIABLE,
            };
            CompletionItem {
                label: symbol.name.clone(),
                kind: Some(kind),
                detail: Some(symbol.signature()),
                sort_text: Some(format!("0_{}", symbol.name)),
                ..Default::default()
            }
        })
        .collect();

    items.extend(
        KEYWORDS
            .iter()
            .filter(|k| k.starts_with(prefix.as_str()))
            .map(|&k| CompletionItem {
                label: k.to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                sort_text: Some(format!("1_{k}")),
                ..Default::default()
            }),
    );

    Some(CompletionResponse::Array(items))
}

/// Detect what kind of completion applies at `offset`.
pub fn detect_context(text: &str, tokens: &[Lexeme], offset: usize) -> CompletionContext {
    if let Some(token) = token_at(tokens, offset) {
        let span = token.span;
        let inside = match token.kind {
            TokenKind::Comment | TokenKind::UnterminatedString => span.start < offset,
            TokenKind::String => span.start < offset && offset < span.end,
            _ => false,
        };
        if inside {
            return CompletionContext::Literal;
        }
    }
    CompletionContext::Code {
        prefix: ident_prefix(text, offset).to_string(),
    }
}
