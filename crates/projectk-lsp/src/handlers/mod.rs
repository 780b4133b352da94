//! LSP request and notification handlers.
//!
//! Each handler answers one request type from a computed [`Analysis`]
//! and never touches the document store.
//!
//! [`Analysis`]: crate::db::Analysis

pub mod utils;

pub mod completion;
pub mod definition;
pub mod diagnostics;
pub mod hover;
pub mod semantic_tokens;
