//! Analysis database.
//!
//! Maps each open document to the analysis of one version of it. Results
//! are memoized per `(uri, version)`; concurrent requests for the same
//! version share one in-flight computation.
//!
//! # Architecture
//!
//! - **Input**: document text and syntax tree, owned by the [`Vfs`]
//! - **Derived**: [`Analysis`] (symbols, diagnostics, line index)
//!
//! A slot is created for a version on first demand and filled exactly once.
//! If the document moved on before the computation got hold of it, the slot
//! is marked superseded and callers follow the document to its newer
//! version.

pub mod analysis;
pub mod symbols;

pub use analysis::{Analysis, Diagnostic, Severity};
pub use symbols::{Occurrence, Scope, ScopeId, Symbol, SymbolId, SymbolKind, SymbolTable};

use crate::error::DocumentError;
use crate::vfs::{Document, Vfs};
use lsp_types::Uri;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// The analysis of one document version, once computed. `None` marks a
/// version that was superseded before anyone computed it.
#[derive(Debug)]
struct AnalysisSlot {
    epoch: u64,
    version: i32,
    cell: OnceLock<Option<Arc<Analysis>>>,
}

/// Memoized analyses of open documents.
#[derive(Debug, Default)]
pub struct AnalysisDb {
    slots: RwLock<HashMap<Uri, Arc<AnalysisSlot>>>,
    computations: AtomicUsize,
}

impl AnalysisDb {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Analysis of the document's current version, computing it if needed.
    ///
    /// The result's version is at least the version the document had when
    /// this was called.
    pub fn get_or_compute(&self, vfs: &Vfs, uri: &Uri) -> Result<Arc<Analysis>, DocumentError> {
        let handle = vfs.handle(uri)?;
        let version = handle.read().version();
        Ok(self.resolve(uri, &handle, version))
    }

    fn resolve(&self, uri: &Uri, document: &RwLock<Document>, version: i32) -> Arc<Analysis> {
        let epoch = document.read().epoch();
        let mut version = version;
        loop {
            let slot = self.slot(uri, epoch, version);
            let analysis = slot
                .cell
                .get_or_init(|| self.compute(uri, document, slot.epoch, slot.version));
            if let Some(analysis) = analysis {
                return Arc::clone(analysis);
            }
            version = document.read().version();
            tracing::debug!(uri = uri.as_str(), version, "analysis superseded");
        }
    }

    /// The slot for `version` of the document opened at `epoch`, or for a
    /// newer version of it if one is registered.
    ///
    /// A slot left behind by a closed document is replaced. A caller still
    /// holding a closed document gets a private slot when the URI has been
    /// reopened since.
    fn slot(&self, uri: &Uri, epoch: u64, version: i32) -> Arc<AnalysisSlot> {
        let reusable = |slot: &Arc<AnalysisSlot>| slot.epoch == epoch && slot.version >= version;
        if let Some(slot) = self.slots.read().get(uri) {
            if reusable(slot) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write();
        let fresh = Arc::new(AnalysisSlot {
            epoch,
            version,
            cell: OnceLock::new(),
        });
        match slots.get(uri) {
            Some(slot) if reusable(slot) => Arc::clone(slot),
            Some(slot) if slot.epoch > epoch => fresh,
            _ => {
                slots.insert(uri.clone(), Arc::clone(&fresh));
                fresh
            }
        }
    }

    fn compute(
        &self,
        uri: &Uri,
        document: &RwLock<Document>,
        epoch: u64,
        version: i32,
    ) -> Option<Arc<Analysis>> {
        let mut document = document.write();
        if document.epoch() != epoch || document.version() != version {
            return None;
        }
        self.computations.fetch_add(1, Ordering::Relaxed);
        let (text, tree) = document.syntax();
        let analysis = Analysis::new(uri.clone(), version, text, tree).with_epoch(epoch);
        tracing::debug!(
            uri = uri.as_str(),
            version,
            epoch,
            generation = analysis.generation,
            diagnostics = analysis.diagnostics.len(),
            "analysis computed"
        );
        Some(Arc::new(analysis))
    }

    /// Drop the cached analysis of `uri` after a change.
    pub fn invalidate(&self, uri: &Uri) {
        self.slots.write().remove(uri);
    }

    /// Forget `uri` entirely, on close.
    pub fn remove(&self, uri: &Uri) {
        self.invalidate(uri);
    }

    /// Number of analyses computed so far.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }
}
