//! Hover handler for displaying information about symbols.
//!
//! Provides hover information for:
//! - Declarations and resolved references: signature and qualified name
//! - Keywords: a short description

use lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};
use projectk_syntax::TokenKind;

use super::utils::token_at;
use crate::db::{Analysis, SymbolKind};

/// Handle a hover request.
pub fn handle_hover(params: &HoverParams, analysis: &Analysis) -> Option<Hover> {
    let position = params.text_document_position_params.position;
    let offset = analysis.line_index.position_to_offset(position);

    let resolved = analysis
        .symbols
        .occurrence_at(offset)
        .and_then(|occurrence| Some((occurrence.span, occurrence.symbol?)));
    if let Some((span, id)) = resolved {
        let symbol = analysis.symbols.symbol(id);
        tracing::debug!("Hover for symbol: {:?}", symbol.qualified_name);
        let kind = match symbol.kind {
            SymbolKind::Function => "function",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Variable => "variable",
        };
        let value = format!(
            "```project_k\n{}\n```\n\n{} `{}`",
            symbol.signature(),
            kind,
            symbol.qualified_name
        );
        return Some(markdown(value, Some(analysis.line_index.range(span))));
    }

    let token = token_at(&analysis.lexemes, offset)?;
    let info = keyword_info(token.kind)?;
    Some(markdown(
        info.to_string(),
        Some(analysis.line_index.range(token.span)),
    ))
}

fn markdown(value: String, range: Option<lsp_types::Range>) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range,
    }
}

/// Get documentation for a keyword.
fn keyword_info(kind: TokenKind) -> Option<&'static str> {
    let info = match kind {
        TokenKind::Let => {
            "## let\n\nIntroduces a variable, visible from the end of the statement.\n\n```project_k\nlet name = value;\n```"
        }
        TokenKind::Fn => {
            "## fn\n\nDeclares a function, visible throughout the enclosing scope.\n\n```project_k\nfn name(a, b) { ... }\n```"
        }
        TokenKind::If => "## if\n\nRuns a block when the condition holds.\n\n```project_k\nif cond { ... } else { ... }\n```",
        TokenKind::Else => "## else\n\nAlternative branch of an `if`.",
        TokenKind::While => "## while\n\nRepeats a block while the condition holds.\n\n```project_k\nwhile cond { ... }\n```",
        TokenKind::Return => "## return\n\nLeaves the current function, optionally with a value.",
        TokenKind::True | TokenKind::False => "## Boolean literal",
        _ => return None,
    };
    Some(info)
}
