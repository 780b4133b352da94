//! Arena-allocated syntax trees.
//!
//! A [`SyntaxTree`] owns every node in a single `Vec`; nodes refer to each
//! other by [`NodeId`]. Re-parsing never mutates a tree in place: it builds
//! a new arena (moving reusable nodes out of the old one) and the old arena
//! is dropped as a whole.

use crate::{ParseError, ParseErrorKind, Span};
use std::fmt::{self, Write};

/// Node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    /// The whole file.
    Root,
    /// `fn name(params) { ... }`
    FnDecl,
    /// `(a, b)` in a function declaration.
    ParamList,
    /// `let name = expr;`
    LetStmt,
    /// `if cond { ... } else ...`
    IfStmt,
    /// `while cond { ... }`
    WhileStmt,
    /// `return expr;`
    ReturnStmt,
    /// `expr;`
    ExprStmt,
    /// `{ ... }`
    Block,
    /// An identifier that introduces a binding.
    Name,
    /// An identifier that refers to a binding.
    NameRef,
    /// Number, string or boolean literal.
    Literal,
    /// `(expr)`
    ParenExpr,
    /// `-expr` or `!expr`
    UnaryExpr,
    /// `lhs op rhs`
    BinaryExpr,
    /// `target = value`
    AssignExpr,
    /// `callee(args)`
    CallExpr,
    /// `(a, b)` in a call.
    ArgList,
    /// Text the parser could not make sense of, or a missing piece.
    Error,
}

/// Index of a node inside its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position in the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node in the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) kind: SyntaxKind,
    pub(crate) span: Span,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) error: Option<ParseErrorKind>,
}

impl Node {
    pub(crate) const fn new(kind: SyntaxKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            span: Span::empty(0),
            parent,
            children: Vec::new(),
            error: None,
        }
    }

    /// The node's kind.
    #[must_use]
    pub const fn kind(&self) -> SyntaxKind {
        self.kind
    }

    /// The byte range the node covers.
    #[must_use]
    pub const fn span(&self) -> Span {
        self.span
    }

    /// The enclosing node, `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in source order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The error an `Error` node stands for.
    #[must_use]
    pub const fn error(&self) -> Option<&ParseErrorKind> {
        self.error.as_ref()
    }
}

/// A syntax tree backed by an arena of nodes.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) generation: u64,
}

impl SyntaxTree {
    /// The root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Shorthand for `self.node(id).kind()`.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> SyntaxKind {
        self.node(id).kind
    }

    /// Shorthand for `self.node(id).span()`.
    #[must_use]
    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    /// Children of a node in source order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// First child of the given kind.
    #[must_use]
    pub fn child_of_kind(&self, id: NodeId, kind: SyntaxKind) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.kind(child) == kind)
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always has a root, so this is never true.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// How many times the document has been parsed to produce this tree.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// All nodes below `id` (inclusive) in pre-order.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Walk from `id` up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&current| self.node(current).parent)
    }

    /// The deepest node whose span touches `offset`.
    #[must_use]
    pub fn covering_node(&self, offset: usize) -> NodeId {
        let mut current = self.root;
        'descend: loop {
            for &child in self.children(current) {
                if self.span(child).touches(offset) && !self.span(child).is_empty() {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Parse errors carried by error nodes, in source order.
    #[must_use]
    pub fn errors(&self) -> Vec<ParseError> {
        self.descendants(self.root)
            .into_iter()
            .filter_map(|id| {
                let node = self.node(id);
                node.error
                    .as_ref()
                    .map(|kind| ParseError::new(kind.clone(), node.span))
            })
            .collect()
    }

    /// Structural equality: same kinds, spans and child shape.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        let mut pending = vec![(self.root, other.root)];
        while let Some((a, b)) = pending.pop() {
            let (left, right) = (self.node(a), other.node(b));
            if left.kind != right.kind
                || left.span != right.span
                || left.children.len() != right.children.len()
            {
                return false;
            }
            pending.extend(left.children.iter().copied().zip(right.children.iter().copied()));
        }
        true
    }

    /// Render the tree one node per line, for tests and debugging.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root, 0)];
        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            let _ = write!(out, "{:indent$}{:?}@{}", "", node.kind, node.span, indent = depth * 2);
            if let Some(error) = &node.error {
                let _ = write!(out, " \"{error}\"");
            }
            out.push('\n');
            stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }
        out
    }
}

impl fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

struct Frame {
    id: NodeId,
    start: Option<usize>,
}

/// Builds an arena bottom-up as the parser consumes tokens.
///
/// Node ranges are derived: a node starts at its first consumed token (or
/// first child) and ends at its last consumed token (or last child). A node
/// with neither is zero-width at the position handed to `finish_node`.
pub(crate) struct TreeBuilder {
    nodes: Vec<Node>,
    stack: Vec<Frame>,
    last_end: usize,
}

impl TreeBuilder {
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            stack: Vec::new(),
            last_end: 0,
        }
    }

    pub(crate) fn start_node(&mut self, kind: SyntaxKind) {
        let id = NodeId::new(self.nodes.len());
        let parent = self.stack.last().map(|frame| frame.id);
        self.nodes.push(Node::new(kind, parent));
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        self.stack.push(Frame { id, start: None });
    }

    /// Open a node that adopts the already-finished `child`, which must be
    /// the last child of the currently open node.
    pub(crate) fn start_node_before(&mut self, child: NodeId, kind: SyntaxKind) {
        let id = NodeId::new(self.nodes.len());
        let parent = self.stack.last().map(|frame| frame.id);
        if let Some(parent) = parent {
            let siblings = &mut self.nodes[parent.index()].children;
            debug_assert_eq!(siblings.last(), Some(&child));
            siblings.pop();
            siblings.push(id);
        }
        let mut node = Node::new(kind, parent);
        node.children.push(child);
        self.nodes.push(node);
        self.nodes[child.index()].parent = Some(id);
        let start = self.nodes[child.index()].span.start;
        self.stack.push(Frame {
            id,
            start: Some(start),
        });
    }

    pub(crate) fn token(&mut self, span: Span) {
        for frame in self.stack.iter_mut().rev() {
            if frame.start.is_some() {
                break;
            }
            frame.start = Some(span.start);
        }
        self.last_end = span.end;
    }

    pub(crate) fn finish_node(&mut self, at: usize) -> NodeId {
        self.finish(at, None)
    }

    pub(crate) fn finish_error(&mut self, at: usize, error: ParseErrorKind) -> NodeId {
        self.finish(at, Some(error))
    }

    fn finish(&mut self, at: usize, error: Option<ParseErrorKind>) -> NodeId {
        let Some(frame) = self.stack.pop() else {
            unreachable!("finish_node without a matching start_node");
        };
        let node = &self.nodes[frame.id.index()];
        let first_child = node.children.first().map(|c| self.nodes[c.index()].span.start);
        let last_child = node.children.last().map(|c| self.nodes[c.index()].span.end);
        let consumed_end = frame.start.map(|_| self.last_end);

        let start = match (frame.start, first_child) {
            (Some(a), Some(b)) => a.min(b),
            (a, b) => a.or(b).unwrap_or(at),
        };
        let end = match (consumed_end, last_child) {
            (Some(a), Some(b)) => a.max(b),
            (a, b) => a.or(b).unwrap_or(at),
        };

        let node = &mut self.nodes[frame.id.index()];
        node.span = Span::new(start, end.max(start));
        node.error = error;
        frame.id
    }

    pub(crate) fn finish_tree(self, generation: u64) -> SyntaxTree {
        debug_assert!(self.stack.is_empty());
        SyntaxTree {
            nodes: self.nodes,
            root: NodeId::new(0),
            generation,
        }
    }
}
