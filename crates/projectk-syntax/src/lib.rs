//! Syntax layer for the project_k language.
//!
//! This crate turns source text into an arena-backed [`SyntaxTree`] and keeps
//! it up to date as the text is edited.
//!
//! # Features
//!
//! - Logos-based lexer ([`tokenize`])
//! - Error-tolerant parser: malformed input becomes `Error` nodes, never a
//!   failed parse
//! - Incremental re-parsing of the innermost enclosing block ([`reparse`])
//!
//! # Example
//!
//! ```
//! use projectk_syntax::{parse, reparse, Damage, SyntaxKind};
//!
//! let mut text = String::from("fn main() { let x = 1; }");
//! let tree = parse(&text);
//! assert!(tree.errors().is_empty());
//!
//! // Replace `1` with `2 + 3`.
//! let at = text.find('1').unwrap();
//! text.replace_range(at..at + 1, "2 + 3");
//! let mut damage = Damage::Clean;
//! damage.record(at, at + 1, "2 + 3".len());
//!
//! let tree = reparse(Some(tree), &text, &damage);
//! assert_eq!(tree.kind(tree.root()), SyntaxKind::Root);
//! assert!(tree.same_shape(&parse(&text)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod edit;
pub mod error;
pub mod lexer;
mod parser;
mod reparse;
pub mod span;
pub mod tree;

pub use edit::{Damage, TextEdit};
pub use error::{ParseError, ParseErrorKind};
pub use lexer::{tokenize, Lexeme, TokenKind};
pub use reparse::{parse, reparse};
pub use span::Span;
pub use tree::{Node, NodeId, SyntaxKind, SyntaxTree};
