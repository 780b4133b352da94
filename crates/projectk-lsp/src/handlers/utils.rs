//! Shared utility functions for LSP handlers.
//!
//! Position conversion between byte offsets and LSP positions, plus small
//! helpers for looking at the text around the cursor.

use lsp_types::{Position, Range};
use projectk_syntax::{Lexeme, Span};
use std::sync::Arc;

/// A line index for offset/position conversion.
///
/// Building the index is O(n) in the source length; lookups binary-search
/// the line starts. Columns are UTF-16 code units. `\n`, `\r\n` and `\r`
/// all end a line.
#[derive(Debug, Clone)]
pub struct LineIndex {
    text: Arc<str>,
    /// Byte offset of the start of each line (including line 0 at offset 0).
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build a line index for `text`.
    pub fn new(text: Arc<str>) -> Self {
        let bytes = text.as_bytes();
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => line_starts.push(i + 1),
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    line_starts.push(i + 1);
                }
                _ => {}
            }
            i += 1;
        }
        Self { text, line_starts }
    }

    /// The indexed text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Get the number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// End of `line`'s content, before its terminator.
    fn line_end(&self, line: usize) -> usize {
        let start = self.line_starts[line];
        let mut end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        let bytes = self.text.as_bytes();
        if end > start && bytes[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && bytes[end - 1] == b'\r' {
            end -= 1;
        }
        end
    }

    /// Convert a byte offset to an LSP position.
    ///
    /// Offsets past the end clamp to the end; offsets inside a character or
    /// a line terminator snap back.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let offset = offset.min(self.line_end(line));
        let character = self.text[start..offset].encode_utf16().count();
        Position::new(line as u32, character as u32)
    }

    /// Convert an LSP position to a byte offset.
    ///
    /// Lines past the end clamp to the end of the text; columns past the
    /// end of their line clamp to the line end.
    pub fn position_to_offset(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return self.text.len();
        }
        let start = self.line_starts[line];
        let end = self.line_end(line);
        let wanted = position.character as usize;
        let mut units = 0;
        for (i, c) in self.text[start..end].char_indices() {
            if units >= wanted {
                return start + i;
            }
            units += c.len_utf16();
        }
        end
    }

    /// Convert a byte span to an LSP range.
    pub fn range(&self, span: Span) -> Range {
        Range::new(
            self.offset_to_position(span.start),
            self.offset_to_position(span.end),
        )
    }
}

/// Whether `c` can appear in an identifier.
pub const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// The identifier fragment that ends at `offset`.
pub fn ident_prefix(text: &str, offset: usize) -> &str {
    let Some(before) = text.get(..offset) else {
        return "";
    };
    let start = before
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_ident_char(c))
        .last()
        .map_or(offset, |(i, _)| i);
    &before[start..]
}

/// The token under the cursor, comments included. A token the cursor sits
/// right after counts.
pub fn token_at(tokens: &[Lexeme], offset: usize) -> Option<Lexeme> {
    let after = tokens.partition_point(|t| t.span.start <= offset);
    tokens[..after]
        .last()
        .copied()
        .filter(|t| t.span.touches(offset))
}
