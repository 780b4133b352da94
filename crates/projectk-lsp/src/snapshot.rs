//! Shared view of the world for request handling.
//!
//! Workers get a snapshot instead of the main loop state. Analyses are
//! immutable once computed, so a handler never sees a half-applied edit.

use crate::db::{Analysis, AnalysisDb};
use crate::error::DocumentError;
use crate::vfs::Vfs;
use lsp_types::Uri;
use std::sync::Arc;

/// Handles on the document store and the analysis database.
#[derive(Debug, Clone)]
pub struct Snapshot {
    vfs: Arc<Vfs>,
    db: Arc<AnalysisDb>,
}

impl Snapshot {
    /// Create a snapshot over the given store and database.
    pub const fn new(vfs: Arc<Vfs>, db: Arc<AnalysisDb>) -> Self {
        Self { vfs, db }
    }

    /// The document store.
    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    /// Analysis of `uri` at its current version or later.
    pub fn analysis(&self, uri: &Uri) -> Result<Arc<Analysis>, DocumentError> {
        self.db.get_or_compute(&self.vfs, uri)
    }
}
