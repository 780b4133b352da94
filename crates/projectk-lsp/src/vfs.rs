//! Virtual File System for document management.
//!
//! The VFS is the authoritative copy of every open document. Each document
//! sits behind its own lock; the map lock is only held to look up, insert
//! or remove an entry.
//!
//! Re-parsing is lazy: changes only record [`Damage`], and the tree is
//! brought up to date the next time someone asks for it.

use crate::error::DocumentError;
use lsp_types::{Position, TextDocumentContentChangeEvent, Uri};
use parking_lot::RwLock;
use projectk_syntax::{reparse, Damage, SyntaxTree};
use ropey::{Rope, RopeSlice};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A document in the virtual file system.
#[derive(Debug)]
pub struct Document {
    /// The document content as a rope for efficient editing.
    content: Rope,
    /// Incremented by exactly one on each accepted change.
    version: i32,
    /// Distinguishes this opening from earlier ones of the same URI.
    epoch: u64,
    /// Language id announced by the client.
    language_id: String,
    /// Tree for the text as of the last parse.
    tree: Option<SyntaxTree>,
    /// Changes since `tree` was built.
    damage: Damage,
}

impl Document {
    /// Create a new document with the given content.
    pub fn new(content: &str, version: i32, language_id: String) -> Self {
        Self {
            content: Rope::from_str(content),
            version,
            epoch: 0,
            language_id,
            tree: None,
            damage: Damage::Clean,
        }
    }

    /// Get the document content as a string.
    pub fn text(&self) -> String {
        self.content.to_string()
    }

    /// Get the document version.
    pub const fn version(&self) -> i32 {
        self.version
    }

    /// Epoch assigned when the document was opened. Versions restart on
    /// reopen; epochs never repeat.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Language id from `didOpen`.
    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    /// The text buffer.
    pub const fn rope(&self) -> &Rope {
        &self.content
    }

    /// Current text and its syntax tree, re-parsing if there are pending
    /// changes.
    pub fn syntax(&mut self) -> (Arc<str>, &SyntaxTree) {
        let text: Arc<str> = Arc::from(self.content.to_string());
        let tree = match self.tree.take() {
            Some(tree) if self.damage.is_clean() => tree,
            previous => {
                let tree = reparse(previous, &text, &self.damage);
                tracing::trace!(generation = tree.generation(), "re-parsed");
                self.damage = Damage::Clean;
                tree
            }
        };
        (text, self.tree.insert(tree))
    }

    /// Apply a `didChange` batch.
    ///
    /// `version` must directly follow the current version. Edits are applied
    /// in order to a scratch copy, which replaces the content only if every
    /// edit was valid.
    pub fn apply_changes(
        &mut self,
        uri: &Uri,
        version: i32,
        changes: &[TextDocumentContentChangeEvent],
    ) -> Result<(), DocumentError> {
        let expected = self.version.saturating_add(1);
        if version != expected {
            return Err(DocumentError::StaleVersion {
                uri: uri.as_str().to_string(),
                expected,
                received: version,
            });
        }

        let mut scratch = self.content.clone();
        let mut damage = self.damage;
        // Byte ranges written by earlier edits of this batch.
        let mut dirty: Vec<Range<usize>> = Vec::new();

        for change in changes {
            let Some(range) = change.range else {
                scratch = Rope::from_str(&change.text);
                damage.record_full();
                dirty.clear();
                continue;
            };

            let invalid = |detail: String| DocumentError::InvalidRange {
                uri: uri.as_str().to_string(),
                detail,
            };
            let start = position_to_char(&scratch, range.start)
                .ok_or_else(|| invalid(format!("start {:?} is outside the document", range.start)))?;
            let end = position_to_char(&scratch, range.end)
                .ok_or_else(|| invalid(format!("end {:?} is outside the document", range.end)))?;
            if end < start {
                return Err(invalid(format!(
                    "end {:?} is before start {:?}",
                    range.end, range.start
                )));
            }

            let start_byte = scratch.char_to_byte(start);
            let end_byte = scratch.char_to_byte(end);
            if dirty.iter().any(|r| overlaps(r, start_byte, end_byte)) {
                return Err(DocumentError::OverlappingEdits(uri.as_str().to_string()));
            }

            scratch.remove(start..end);
            scratch.insert(start, &change.text);
            let inserted = change.text.len();
            damage.record(start_byte, end_byte, inserted);

            let delta = inserted as isize - (end_byte - start_byte) as isize;
            for r in &mut dirty {
                if r.start >= end_byte {
                    *r = r.start.saturating_add_signed(delta)..r.end.saturating_add_signed(delta);
                }
            }
            if inserted > 0 {
                dirty.push(start_byte..start_byte + inserted);
            }
        }

        self.content = scratch;
        self.damage = damage;
        self.version = version;
        Ok(())
    }
}

/// Whether `start..end` touches text inside `written`. Edits may abut.
const fn overlaps(written: &Range<usize>, start: usize, end: usize) -> bool {
    if start == end {
        written.start < start && start < written.end
    } else {
        start < written.end && end > written.start
    }
}

/// Convert an LSP position (UTF-16 column) to a char index.
///
/// Returns `None` for a line past the end of the document. Columns past the
/// end of their line clamp to the line end.
fn position_to_char(rope: &Rope, position: Position) -> Option<usize> {
    let line = position.line as usize;
    if line >= rope.len_lines() {
        return None;
    }
    let line_start = rope.line_to_char(line);
    let slice = rope.line(line);
    let content = slice.slice(..content_chars(slice));
    let column = (position.character as usize).min(content.len_utf16_cu());
    Some(line_start + content.utf16_cu_to_char(column))
}

/// Length of a line without its terminator.
fn content_chars(line: RopeSlice<'_>) -> usize {
    let mut end = line.len_chars();
    if end > 0 && line.char(end - 1) == '\n' {
        end -= 1;
    }
    if end > 0 && line.char(end - 1) == '\r' {
        end -= 1;
    }
    end
}

/// Virtual file system for managing open documents.
#[derive(Debug, Default)]
pub struct Vfs {
    /// Open documents indexed by URI.
    documents: RwLock<HashMap<Uri, Arc<RwLock<Document>>>>,
    /// Source of document epochs.
    epochs: AtomicU64,
}

impl Vfs {
    /// Create a new empty VFS.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a document.
    pub fn open(
        &self,
        uri: Uri,
        language_id: String,
        text: &str,
        version: i32,
    ) -> Result<(), DocumentError> {
        let mut documents = self.documents.write();
        if documents.contains_key(&uri) {
            return Err(DocumentError::DuplicateDocument(uri.as_str().to_string()));
        }
        let mut document = Document::new(text, version, language_id);
        document.epoch = self.epochs.fetch_add(1, Ordering::Relaxed) + 1;
        documents.insert(uri, Arc::new(RwLock::new(document)));
        Ok(())
    }

    /// Apply a change batch to an open document.
    pub fn change(
        &self,
        uri: &Uri,
        version: i32,
        changes: &[TextDocumentContentChangeEvent],
    ) -> Result<(), DocumentError> {
        let handle = self.handle(uri)?;
        let mut document = handle.write();
        document.apply_changes(uri, version, changes)
    }

    /// Close a document.
    pub fn close(&self, uri: &Uri) -> Result<(), DocumentError> {
        self.documents
            .write()
            .remove(uri)
            .map(drop)
            .ok_or_else(|| DocumentError::UnknownDocument(uri.as_str().to_string()))
    }

    /// Shared handle to an open document.
    pub fn handle(&self, uri: &Uri) -> Result<Arc<RwLock<Document>>, DocumentError> {
        self.documents
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| DocumentError::UnknownDocument(uri.as_str().to_string()))
    }

    /// Current version of a document, if open.
    pub fn version(&self, uri: &Uri) -> Option<i32> {
        let handle = self.documents.read().get(uri).cloned()?;
        let version = handle.read().version();
        Some(version)
    }

    /// Epoch of a document, if open.
    pub fn epoch(&self, uri: &Uri) -> Option<u64> {
        let handle = self.documents.read().get(uri).cloned()?;
        let epoch = handle.read().epoch();
        Some(epoch)
    }

    /// Whether a document is open.
    pub fn contains(&self, uri: &Uri) -> bool {
        self.documents.read().contains_key(uri)
    }

    /// Number of open documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether no documents are open.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::Range as LspRange;

    fn uri() -> Uri {
        "file:///doc1.pk".parse().unwrap()
    }

    fn edit(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(LspRange::new(Position::new(sl, sc), Position::new(el, ec))),
            range_length: None,
            text: text.to_string(),
        }
    }

    fn full(text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: text.to_string(),
        }
    }

    fn open(text: &str) -> Vfs {
        let vfs = Vfs::new();
        vfs.open(uri(), "project_k".to_string(), text, 1).unwrap();
        vfs
    }

    fn text(vfs: &Vfs) -> String {
        vfs.handle(&uri()).unwrap().read().text()
    }

    #[test]
    fn test_open_and_duplicate() {
        let vfs = open("let x = 1;");
        assert_eq!(vfs.version(&uri()), Some(1));
        assert_eq!(
            vfs.open(uri(), "project_k".to_string(), "", 1),
            Err(DocumentError::DuplicateDocument("file:///doc1.pk".to_string()))
        );
    }

    #[test]
    fn test_incremental_change() {
        let vfs = open("let x = 1;\nlet y = 2;\n");
        vfs.change(&uri(), 2, &[edit(1, 8, 1, 9, "x + 40")]).unwrap();
        assert_eq!(text(&vfs), "let x = 1;\nlet y = x + 40;\n");
        assert_eq!(vfs.version(&uri()), Some(2));
    }

    #[test]
    fn test_sequential_edits_use_updated_coordinates() {
        let vfs = open("abc");
        vfs.change(&uri(), 2, &[edit(0, 3, 0, 3, "d"), edit(0, 0, 0, 1, "")])
            .unwrap();
        assert_eq!(text(&vfs), "bcd");
    }

    #[test]
    fn test_utf16_columns() {
        // `😀` is two UTF-16 code units.
        let vfs = open("let s = \"😀\"; x");
        vfs.change(&uri(), 2, &[edit(0, 14, 0, 15, "y")]).unwrap();
        assert_eq!(text(&vfs), "let s = \"😀\"; y");
    }

    #[test]
    fn test_column_clamps_to_line_end() {
        let vfs = open("ab\r\ncd");
        vfs.change(&uri(), 2, &[edit(0, 99, 0, 99, "!")]).unwrap();
        assert_eq!(text(&vfs), "ab!\r\ncd");
    }

    #[test]
    fn test_stale_version_leaves_document_untouched() {
        let vfs = open("let x = 1;");
        let err = vfs.change(&uri(), 5, &[full("junk")]).unwrap_err();
        assert_eq!(
            err,
            DocumentError::StaleVersion {
                uri: "file:///doc1.pk".to_string(),
                expected: 2,
                received: 5
            }
        );
        assert_eq!(text(&vfs), "let x = 1;");
        assert_eq!(vfs.version(&uri()), Some(1));
    }

    #[test]
    fn test_overlapping_edits_rejected_atomically() {
        let vfs = open("let x = 1;");
        let err = vfs
            .change(&uri(), 2, &[edit(0, 8, 0, 9, "123"), edit(0, 9, 0, 10, "")])
            .unwrap_err();
        assert!(matches!(err, DocumentError::OverlappingEdits(_)));
        assert_eq!(text(&vfs), "let x = 1;");
        assert_eq!(vfs.version(&uri()), Some(1));
    }

    #[test]
    fn test_adjacent_edits_allowed() {
        let vfs = open("ab");
        vfs.change(&uri(), 2, &[edit(0, 1, 0, 1, "X"), edit(0, 2, 0, 2, "Y")])
            .unwrap();
        assert_eq!(text(&vfs), "aXYb");
    }

    #[test]
    fn test_invalid_range() {
        let vfs = open("one line");
        let err = vfs.change(&uri(), 2, &[edit(3, 0, 3, 1, "x")]).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRange { .. }));
        let err = vfs.change(&uri(), 2, &[edit(0, 5, 0, 2, "x")]).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRange { .. }));
        assert_eq!(vfs.version(&uri()), Some(1));
    }

    #[test]
    fn test_full_replacement() {
        let vfs = open("let x = 1;");
        vfs.change(&uri(), 2, &[full("fn f() {}")]).unwrap();
        assert_eq!(text(&vfs), "fn f() {}");
    }

    #[test]
    fn test_close() {
        let vfs = open("");
        vfs.close(&uri()).unwrap();
        assert!(vfs.is_empty());
        assert!(matches!(
            vfs.close(&uri()),
            Err(DocumentError::UnknownDocument(_))
        ));
        assert!(matches!(
            vfs.change(&uri(), 2, &[full("x")]),
            Err(DocumentError::UnknownDocument(_))
        ));
    }

    #[test]
    fn test_reopen_gets_new_epoch() {
        let vfs = open("let x = 1;");
        let first = vfs.epoch(&uri()).unwrap();
        vfs.close(&uri()).unwrap();
        assert_eq!(vfs.epoch(&uri()), None);
        vfs.open(uri(), "project_k".to_string(), "let x = 1;", 1)
            .unwrap();
        assert!(vfs.epoch(&uri()).unwrap() > first);
    }

    #[test]
    fn test_syntax_is_reparsed_lazily() {
        let vfs = open("fn f() { let a = 1; }");
        let handle = vfs.handle(&uri()).unwrap();
        let generation = handle.write().syntax().1.generation();
        assert_eq!(generation, 0);

        vfs.change(&uri(), 2, &[edit(0, 17, 0, 18, "2 + 3")]).unwrap();
        let mut document = handle.write();
        let (text, tree) = document.syntax();
        assert_eq!(&*text, "fn f() { let a = 2 + 3; }");
        assert_eq!(tree.generation(), 1);
        assert!(tree.same_shape(&projectk_syntax::parse(&text)));
    }
}
