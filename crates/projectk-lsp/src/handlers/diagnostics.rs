//! Diagnostics conversion for `textDocument/publishDiagnostics`.

use lsp_types::{DiagnosticSeverity, NumberOrString, PublishDiagnosticsParams, Uri};

use super::utils::LineIndex;
use crate::db::{Analysis, Diagnostic, Severity};

/// Source tag on every diagnostic we publish.
pub const SOURCE: &str = "projectk";

/// Convert one diagnostic to its LSP form.
pub fn to_lsp_diagnostic(diagnostic: &Diagnostic, line_index: &LineIndex) -> lsp_types::Diagnostic {
    let severity = match diagnostic.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
    };
    lsp_types::Diagnostic {
        range: line_index.range(diagnostic.span),
        severity: Some(severity),
        code: Some(NumberOrString::String(diagnostic.code.clone())),
        source: Some(SOURCE.to_string()),
        message: diagnostic.message.clone(),
        related_information: None,
        tags: None,
        code_description: None,
        data: None,
    }
}

/// The full diagnostic set of an analysis, tagged with its version.
pub fn publish_params(analysis: &Analysis) -> PublishDiagnosticsParams {
    let diagnostics = analysis
        .diagnostics
        .iter()
        .map(|d| to_lsp_diagnostic(d, &analysis.line_index))
        .collect();
    PublishDiagnosticsParams::new(analysis.uri.clone(), diagnostics, Some(analysis.version))
}

/// An empty set, clearing the editor's diagnostics for a closed document.
pub fn clear_params(uri: Uri) -> PublishDiagnosticsParams {
    PublishDiagnosticsParams::new(uri, Vec::new(), None)
}
