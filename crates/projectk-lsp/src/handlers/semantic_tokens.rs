//! Semantic tokens handler for enhanced syntax highlighting.
//!
//! Every lexeme except punctuation gets a token. Identifiers are classified
//! by the symbol they resolve to, and declaration sites carry the
//! `declaration` modifier.

use lsp_types::{
    SemanticToken, SemanticTokenModifier, SemanticTokenType, SemanticTokens,
    SemanticTokensFullOptions, SemanticTokensLegend, SemanticTokensOptions, SemanticTokensParams,
    SemanticTokensResult, SemanticTokensServerCapabilities,
};
use projectk_syntax::{Lexeme, TokenKind};

use crate::db::{Analysis, SymbolKind};

/// Token types we support.
pub const TOKEN_TYPES: &[SemanticTokenType] = &[
    SemanticTokenType::KEYWORD,   // 0
    SemanticTokenType::FUNCTION,  // 1
    SemanticTokenType::PARAMETER, // 2
    SemanticTokenType::VARIABLE,  // 3: also unresolved identifiers
    SemanticTokenType::NUMBER,    // 4
    SemanticTokenType::STRING,    // 5
    SemanticTokenType::OPERATOR,  // 6
    SemanticTokenType::COMMENT,   // 7
];

/// Token modifiers we support.
pub const TOKEN_MODIFIERS: &[SemanticTokenModifier] = &[
    SemanticTokenModifier::DECLARATION, // 0
];

/// Get the semantic tokens legend for capability registration.
pub fn get_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: TOKEN_TYPES.to_vec(),
        token_modifiers: TOKEN_MODIFIERS.to_vec(),
    }
}

/// Get the semantic tokens server capabilities.
pub fn get_capabilities() -> SemanticTokensServerCapabilities {
    SemanticTokensServerCapabilities::SemanticTokensOptions(SemanticTokensOptions {
        legend: get_legend(),
        full: Some(SemanticTokensFullOptions::Bool(true)),
        range: None,
        work_done_progress_options: Default::default(),
    })
}

/// Token type indices.
mod token_type {
    pub const KEYWORD: u32 = 0;
    pub const FUNCTION: u32 = 1;
    pub const PARAMETER: u32 = 2;
    pub const VARIABLE: u32 = 3;
    pub const NUMBER: u32 = 4;
    pub const STRING: u32 = 5;
    pub const OPERATOR: u32 = 6;
    pub const COMMENT: u32 = 7;
}

/// Token modifier bits.
mod token_modifier {
    pub const DECLARATION: u32 = 1 << 0;
}

/// Handle a semantic tokens request.
pub fn handle_semantic_tokens(
    _params: &SemanticTokensParams,
    analysis: &Analysis,
) -> Option<SemanticTokensResult> {
    let text = analysis.text();
    let mut data = Vec::new();
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for lexeme in &analysis.lexemes {
        let Some((token_type, modifiers)) = classify(lexeme, analysis) else {
            continue;
        };
        let position = analysis.line_index.offset_to_position(lexeme.span.start);
        // Tokens never span lines.
        let length = lexeme.span.text(text).encode_utf16().count() as u32;

        let delta_line = position.line - prev_line;
        let delta_start = if delta_line == 0 {
            position.character - prev_start
        } else {
            position.character
        };
        data.push(SemanticToken {
            delta_line,
            delta_start,
            length,
            token_type,
            token_modifiers_bitset: modifiers,
        });
        prev_line = position.line;
        prev_start = position.character;
    }

    Some(SemanticTokensResult::Tokens(SemanticTokens {
        result_id: None,
        data,
    }))
}

/// Token type and modifier bits for a lexeme, `None` for punctuation.
fn classify(lexeme: &Lexeme, analysis: &Analysis) -> Option<(u32, u32)> {
    let kind = lexeme.kind;
    let classified = match kind {
        TokenKind::Ident => {
            let occurrence = analysis.symbols.occurrence_starting_at(lexeme.span.start);
            let symbol = occurrence
                .and_then(|o| o.symbol)
                .map(|id| analysis.symbols.symbol(id));
            let token_type = match symbol.map(|s| s.kind) {
                Some(SymbolKind::Function) => token_type::FUNCTION,
                Some(SymbolKind::Parameter) => token_type::PARAMETER,
                Some(SymbolKind::Variable) | None => token_type::VARIABLE,
            };
            let modifiers = if occurrence.is_some_and(|o| o.declaration) {
                token_modifier::DECLARATION
            } else {
                0
            };
            (token_type, modifiers)
        }
        TokenKind::Number => (token_type::NUMBER, 0),
        TokenKind::String | TokenKind::UnterminatedString => (token_type::STRING, 0),
        TokenKind::Comment => (token_type::COMMENT, 0),
        _ if kind.is_keyword() => (token_type::KEYWORD, 0),
        _ if kind.is_operator() => (token_type::OPERATOR, 0),
        _ => return None,
    };
    Some(classified)
}
