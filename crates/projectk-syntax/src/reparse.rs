//! Incremental re-parsing.
//!
//! When the damage since the last parse is a single region, the innermost
//! block that strictly encloses it is re-lexed and re-parsed on its own and
//! spliced into a fresh arena. Every other node is moved over from the old
//! arena, with offsets behind the block shifted by the edit delta.
//!
//! A block is only reused as a re-parse unit when its new text is a
//! balanced `{ ... }` group. The prefix before the block is untouched and
//! the parser decides on one token of lookahead, so the result is the same
//! tree a full parse would build.

use crate::edit::{Damage, TextEdit};
use crate::lexer::{tokenize_at, Lexeme, TokenKind};
use crate::parser::Parser;
use crate::tree::{Node, NodeId, SyntaxKind, SyntaxTree};

/// Parse `source` from scratch.
#[must_use]
pub fn parse(source: &str) -> SyntaxTree {
    parse_generation(source, 0)
}

fn parse_generation(source: &str, generation: u64) -> SyntaxTree {
    Parser::new(source, tokenize_at(source, 0), source.len()).parse_file(generation)
}

/// Bring `previous` up to date with `source`.
///
/// `damage` describes how `source` differs from the text `previous` was
/// parsed from. The previous tree is consumed; reusable nodes move into the
/// result.
#[must_use]
pub fn reparse(previous: Option<SyntaxTree>, source: &str, damage: &Damage) -> SyntaxTree {
    match (previous, damage) {
        (Some(tree), Damage::Clean) => tree,
        (Some(tree), Damage::Region(edit)) => reparse_region(tree, source, *edit),
        (Some(tree), Damage::Full) => parse_generation(source, tree.generation + 1),
        (None, _) => parse(source),
    }
}

fn reparse_region(tree: SyntaxTree, source: &str, edit: TextEdit) -> SyntaxTree {
    let delta = edit.delta();
    let mut candidate = innermost_enclosing_block(&tree, edit);

    while let Some(block) = candidate {
        let old_span = tree.span(block);
        let new_end = old_span.end.saturating_add_signed(delta);
        let depth = nesting_depth(&tree, block);
        if let Some(subtree) = parse_block_at(source, old_span.start, new_end, depth) {
            return splice(tree, block, subtree, old_span.end, delta);
        }
        candidate = tree
            .ancestors(block)
            .skip(1)
            .find(|&id| tree.kind(id) == SyntaxKind::Block);
    }

    parse_generation(source, tree.generation + 1)
}

/// The `{` and `}` of the block must both survive the edit.
fn encloses(tree: &SyntaxTree, id: NodeId, edit: TextEdit) -> bool {
    let span = tree.span(id);
    span.start < edit.start && edit.old_end < span.end
}

fn innermost_enclosing_block(tree: &SyntaxTree, edit: TextEdit) -> Option<NodeId> {
    let mut current = tree.root();
    let mut found = None;
    'descend: loop {
        for &child in tree.children(current) {
            if encloses(tree, child, edit) {
                if tree.kind(child) == SyntaxKind::Block {
                    found = Some(child);
                }
                current = child;
                continue 'descend;
            }
        }
        return found;
    }
}

/// Nesting levels the parser had entered when it reached `block`. Only
/// blocks and `if` statements enclose statements.
fn nesting_depth(tree: &SyntaxTree, block: NodeId) -> usize {
    tree.ancestors(block)
        .skip(1)
        .filter(|&id| matches!(tree.kind(id), SyntaxKind::Block | SyntaxKind::IfStmt))
        .count()
}

/// Re-parse `source[start..end]` as a single block `depth` levels deep.
fn parse_block_at(source: &str, start: usize, end: usize, depth: usize) -> Option<SyntaxTree> {
    let slice = source.get(start..end)?;
    let tokens = tokenize_at(slice, start);
    if !is_balanced_group(&tokens, end) {
        return None;
    }
    Parser::new(source, tokens, end).at_depth(depth).parse_block()
}

/// `{` first, `}` last and ending at `end`, with the first brace closed by
/// the last one and nothing swallowing the closing brace.
fn is_balanced_group(tokens: &[Lexeme], end: usize) -> bool {
    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        return false;
    };
    if first.kind != TokenKind::LBrace || last.kind != TokenKind::RBrace || last.span.end != end {
        return false;
    }
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LBrace => depth += 1,
            TokenKind::RBrace => {
                depth -= 1;
                if depth == 0 && index != tokens.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Build the next arena generation from `tree` with `target` replaced by
/// `replacement`. Nodes are moved, never cloned.
fn splice(
    tree: SyntaxTree,
    target: NodeId,
    replacement: SyntaxTree,
    old_end: usize,
    delta: isize,
) -> SyntaxTree {
    let SyntaxTree {
        nodes,
        root,
        generation,
    } = tree;
    let mut splicer = Splicer {
        old: nodes.into_iter().map(Some).collect(),
        fresh: replacement.nodes.into_iter().map(Some).collect(),
        out: Vec::new(),
        target,
        old_end,
        delta,
    };
    splicer.out.reserve(splicer.old.len() + splicer.fresh.len());
    let new_root = splicer.run(root);
    SyntaxTree {
        nodes: splicer.out,
        root: new_root,
        generation: generation + 1,
    }
}

struct Splicer {
    old: Vec<Option<Node>>,
    fresh: Vec<Option<Node>>,
    out: Vec<Node>,
    target: NodeId,
    old_end: usize,
    delta: isize,
}

impl Splicer {
    fn shift(&self, offset: usize) -> usize {
        if offset >= self.old_end {
            offset.saturating_add_signed(self.delta)
        } else {
            offset
        }
    }

    /// Move the tree under `root` into `out` in pre-order, swapping in
    /// the replacement at the target. Returns the new id of `root`.
    fn run(&mut self, root: NodeId) -> NodeId {
        // (source node, came from the replacement, new parent, slot in the
        // parent's child list)
        let mut stack = vec![(root, false, None, 0)];
        while let Some((id, fresh, parent, slot)) = stack.pop() {
            let (mut node, fresh) = if !fresh && id == self.target {
                (self.take_fresh(NodeId::new(0)), true)
            } else if fresh {
                (self.take_fresh(id), true)
            } else {
                (self.take_old(id), false)
            };
            let new_id = NodeId::new(self.out.len());
            node.parent = parent;
            if let Some(parent) = parent {
                self.out[parent.index()].children[slot] = new_id;
            }
            for (index, &child) in node.children.iter().enumerate().rev() {
                stack.push((child, fresh, Some(new_id), index));
            }
            self.out.push(node);
        }
        // The root is placed first.
        NodeId::new(0)
    }

    fn take_old(&mut self, id: NodeId) -> Node {
        let Some(mut node) = self.old[id.index()].take() else {
            unreachable!("node {id:?} reached twice");
        };
        node.span.start = self.shift(node.span.start);
        node.span.end = self.shift(node.span.end);
        node
    }

    fn take_fresh(&mut self, id: NodeId) -> Node {
        let Some(node) = self.fresh[id.index()].take() else {
            unreachable!("node {id:?} reached twice");
        };
        node
    }
}
