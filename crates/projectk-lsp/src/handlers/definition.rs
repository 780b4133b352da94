//! Go-to-definition handler.

use lsp_types::{GotoDefinitionParams, GotoDefinitionResponse, Location};

use crate::db::Analysis;

/// Handle a go-to-definition request.
pub fn handle_goto_definition(
    params: &GotoDefinitionParams,
    analysis: &Analysis,
) -> Option<GotoDefinitionResponse> {
    let position = params.text_document_position_params.position;
    let offset = analysis.line_index.position_to_offset(position);
    let symbol = analysis.symbols.symbol(analysis.symbols.symbol_at(offset)?);

    tracing::debug!("Go-to-definition for symbol: {:?}", symbol.qualified_name);

    Some(GotoDefinitionResponse::Scalar(Location::new(
        analysis.uri.clone(),
        analysis.line_index.range(symbol.name_span),
    )))
}
