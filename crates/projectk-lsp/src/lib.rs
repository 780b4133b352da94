//! Language Server Protocol implementation for project_k.
//!
//! This crate provides an LSP server for project_k files, enabling IDE features like:
//! - Real-time syntax and name-resolution diagnostics
//! - Autocompletion for keywords and names in scope
//! - Go-to-definition
//! - Hover information
//! - Semantic highlighting
//!
//! # Architecture
//!
//! The server follows rust-analyzer's architecture:
//! - **Transport**: reader and writer threads framing JSON-RPC over stdio
//! - **Main loop**: applies document changes in order, dispatches requests
//! - **Analysis database**: memoized per document version, computed once
//! - **Handlers**: answer requests from immutable analyses on a worker pool
//!
//! # Example
//!
//! ```no_run
//! use projectk_lsp::{start_stdio, ServerConfig};
//!
//! let status = start_stdio(ServerConfig::default()).expect("server failed");
//! std::process::exit(i32::from(status.code()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod db;
pub mod emitter;
pub mod error;
pub mod handlers;
pub mod main_loop;
pub mod pending;
pub mod protocol;
pub mod transport;

mod server;
mod snapshot;
mod vfs;

pub use config::ServerConfig;
pub use error::{DocumentError, ProtocolError, ServerError};
pub use main_loop::{run_main_loop, Event, ExitStatus};
pub use server::{start_stdio, Server};
pub use snapshot::Snapshot;
pub use vfs::{Document, Vfs};

/// LSP server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
