//! Name binding.
//!
//! One pre-order walk over the syntax tree builds the scopes, declares every
//! name and resolves every reference against the scopes enclosing it.

use super::analysis::{Diagnostic, Severity};
use projectk_syntax::{NodeId, Span, SyntaxKind, SyntaxTree};

/// Index of a symbol in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

/// Index of a scope in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// What a symbol declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// `fn name(...)`
    Function,
    /// A function parameter.
    Parameter,
    /// `let name`
    Variable,
}

/// A declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// The name as written.
    pub name: String,
    /// `outer::inner::name`, qualified by the enclosing functions.
    pub qualified_name: String,
    /// What it declares.
    pub kind: SymbolKind,
    /// Range of the name at the declaration site.
    pub name_span: Span,
    /// The declaring node (`FnDecl`, `LetStmt`, or the parameter's `Name`).
    pub node: NodeId,
    /// Scope the symbol lives in.
    pub scope: ScopeId,
    /// First offset from which references see this symbol.
    pub visible_from: usize,
    /// Parameter names, for functions.
    pub params: Vec<String>,
}

impl Symbol {
    /// Source-like signature for hover cards.
    pub fn signature(&self) -> String {
        match self.kind {
            SymbolKind::Function => format!("fn {}({})", self.name, self.params.join(", ")),
            SymbolKind::Parameter => format!("{} (parameter)", self.name),
            SymbolKind::Variable => format!("let {}", self.name),
        }
    }
}

/// A lexical scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Enclosing scope; `None` for the file scope.
    pub parent: Option<ScopeId>,
    /// Node that introduced the scope (`Root`, `FnDecl` or `Block`).
    pub node: NodeId,
    /// Range of that node.
    pub span: Span,
    /// Qualification prefix for names declared here.
    path: String,
    /// Declarations, in source order.
    symbols: Vec<SymbolId>,
}

/// An identifier in the source, declaring or referring to a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    /// Range of the identifier.
    pub span: Span,
    /// The symbol, or `None` for an unresolved reference.
    pub symbol: Option<SymbolId>,
    /// Whether this is the declaration site.
    pub declaration: bool,
}

/// Symbols, scopes and identifier occurrences of one document version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    /// Sorted by start offset.
    occurrences: Vec<Occurrence>,
}

impl SymbolTable {
    /// Bind all names in `tree`.
    ///
    /// Returns the table and the binding diagnostics (unresolved
    /// identifiers, duplicate functions).
    pub fn build(tree: &SyntaxTree, source: &str, version: i32) -> (Self, Vec<Diagnostic>) {
        let mut binder = Binder {
            tree,
            source,
            version,
            table: Self::default(),
            diagnostics: Vec::new(),
        };
        let root = tree.root();
        let scope = binder.new_scope(root, None, String::new());
        binder.stmts(scope, tree.children(root));
        binder.table.occurrences.sort_by_key(|o| o.span.start);
        (binder.table, binder.diagnostics)
    }

    /// Look up a symbol.
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    /// Look up a scope.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// All symbols in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| (SymbolId(i as u32), symbol))
    }

    /// All identifier occurrences in source order.
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// The occurrence starting exactly at `start`.
    pub fn occurrence_starting_at(&self, start: usize) -> Option<&Occurrence> {
        self.occurrences
            .binary_search_by_key(&start, |o| o.span.start)
            .ok()
            .map(|i| &self.occurrences[i])
    }

    /// The occurrence under the cursor. An identifier the cursor sits
    /// inside wins over one it merely touches at the end.
    pub fn occurrence_at(&self, offset: usize) -> Option<&Occurrence> {
        let after = self.occurrences.partition_point(|o| o.span.start <= offset);
        let candidate = after.checked_sub(1).map(|i| &self.occurrences[i])?;
        candidate.span.touches(offset).then_some(candidate)
    }

    /// The symbol declared or referenced under the cursor.
    pub fn symbol_at(&self, offset: usize) -> Option<SymbolId> {
        self.occurrence_at(offset)?.symbol
    }

    /// The innermost scope whose range strictly contains `offset`.
    pub fn scope_at(&self, offset: usize) -> ScopeId {
        // Scopes are created in pre-order; the last match is the deepest.
        self.scopes
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .find(|(_, scope)| scope.span.start < offset && offset < scope.span.end)
            .map_or(ScopeId(0), |(i, _)| ScopeId(i as u32))
    }

    /// Symbols visible at `offset`, innermost first. Shadowed names appear
    /// once, as the binding that wins.
    pub fn visible_at(&self, offset: usize) -> Vec<SymbolId> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut scope = Some(self.scope_at(offset));
        while let Some(id) = scope {
            let current = self.scope(id);
            for &symbol in current.symbols.iter().rev() {
                let candidate = self.symbol(symbol);
                if candidate.visible_from <= offset && seen.insert(candidate.name.as_str()) {
                    out.push(symbol);
                }
            }
            scope = current.parent;
        }
        out
    }

    /// Resolve `name` as seen from `offset` inside `scope`.
    fn lookup(&self, scope: ScopeId, name: &str, offset: usize) -> Option<SymbolId> {
        let mut scope = Some(scope);
        while let Some(id) = scope {
            let current = self.scope(id);
            let found = current.symbols.iter().rev().copied().find(|&symbol| {
                let candidate = self.symbol(symbol);
                candidate.name == name && candidate.visible_from <= offset
            });
            if found.is_some() {
                return found;
            }
            scope = current.parent;
        }
        None
    }
}

struct Binder<'a> {
    tree: &'a SyntaxTree,
    source: &'a str,
    version: i32,
    table: SymbolTable,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Binder<'a> {
    fn new_scope(&mut self, node: NodeId, parent: Option<ScopeId>, path: String) -> ScopeId {
        let id = ScopeId(self.table.scopes.len() as u32);
        self.table.scopes.push(Scope {
            parent,
            node,
            span: self.tree.span(node),
            path,
            symbols: Vec::new(),
        });
        id
    }

    fn text(&self, node: NodeId) -> &'a str {
        self.tree.span(node).text(self.source)
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        name_node: NodeId,
        node: NodeId,
        kind: SymbolKind,
        visible_from: usize,
    ) -> SymbolId {
        let name = self.text(name_node).to_string();
        let path = &self.table.scope(scope).path;
        let qualified_name = if path.is_empty() {
            name.clone()
        } else {
            format!("{path}::{name}")
        };
        let id = SymbolId(self.table.symbols.len() as u32);
        let name_span = self.tree.span(name_node);
        self.table.symbols.push(Symbol {
            name,
            qualified_name,
            kind,
            name_span,
            node,
            scope,
            visible_from,
            params: Vec::new(),
        });
        self.table.scopes[scope.0 as usize].symbols.push(id);
        self.table.occurrences.push(Occurrence {
            span: name_span,
            symbol: Some(id),
            declaration: true,
        });
        id
    }

    fn stmts(&mut self, scope: ScopeId, stmts: &[NodeId]) {
        // Functions are visible throughout their scope.
        let mut functions = Vec::new();
        for &stmt in stmts {
            if self.tree.kind(stmt) == SyntaxKind::FnDecl {
                functions.push(self.declare_function(scope, stmt));
            }
        }
        let mut functions = functions.into_iter();
        for &stmt in stmts {
            if self.tree.kind(stmt) == SyntaxKind::FnDecl {
                let symbol = functions.next().flatten();
                self.fn_body(scope, stmt, symbol);
            } else {
                self.stmt(scope, stmt);
            }
        }
    }

    fn declare_function(&mut self, scope: ScopeId, node: NodeId) -> Option<SymbolId> {
        let name = self.tree.child_of_kind(node, SyntaxKind::Name)?;
        let text = self.text(name);
        let duplicate = self
            .table
            .scope(scope)
            .symbols
            .iter()
            .any(|&s| {
                let other = self.table.symbol(s);
                other.kind == SymbolKind::Function && other.name == text
            });
        if duplicate {
            self.diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                message: format!("duplicate definition of `{text}`"),
                span: self.tree.span(name),
                code: "W0001".to_string(),
                version: self.version,
            });
        }
        let visible_from = self.table.scope(scope).span.start;
        let id = self.declare(scope, name, node, SymbolKind::Function, visible_from);
        if let Some(list) = self.tree.child_of_kind(node, SyntaxKind::ParamList) {
            let params = self
                .tree
                .children(list)
                .iter()
                .filter(|&&p| self.tree.kind(p) == SyntaxKind::Name)
                .map(|&p| self.text(p).to_string())
                .collect();
            self.table.symbols[id.0 as usize].params = params;
        }
        Some(id)
    }

    fn fn_body(&mut self, scope: ScopeId, node: NodeId, symbol: Option<SymbolId>) {
        let parent_path = self.table.scope(scope).path.clone();
        let name = symbol.map_or("<anonymous>", |s| self.table.symbol(s).name.as_str());
        let path = if parent_path.is_empty() {
            name.to_string()
        } else {
            format!("{parent_path}::{name}")
        };
        let fn_scope = self.new_scope(node, Some(scope), path);

        for &child in self.tree.children(node) {
            match self.tree.kind(child) {
                SyntaxKind::ParamList => {
                    for &param in self.tree.children(child) {
                        if self.tree.kind(param) == SyntaxKind::Name {
                            let visible_from = self.tree.span(param).end;
                            self.declare(fn_scope, param, param, SymbolKind::Parameter, visible_from);
                        }
                    }
                }
                SyntaxKind::Block => self.block(fn_scope, child),
                _ => {}
            }
        }
    }

    fn block(&mut self, scope: ScopeId, node: NodeId) {
        let path = self.table.scope(scope).path.clone();
        let inner = self.new_scope(node, Some(scope), path);
        self.stmts(inner, self.tree.children(node));
    }

    fn stmt(&mut self, scope: ScopeId, node: NodeId) {
        match self.tree.kind(node) {
            SyntaxKind::LetStmt => {
                let mut name = None;
                for &child in self.tree.children(node) {
                    if self.tree.kind(child) == SyntaxKind::Name {
                        name = Some(child);
                    } else {
                        self.expr(scope, child);
                    }
                }
                // The initializer cannot see the binding it introduces.
                if let Some(name) = name {
                    let visible_from = self.tree.span(node).end;
                    self.declare(scope, name, node, SymbolKind::Variable, visible_from);
                }
            }
            SyntaxKind::Block => self.block(scope, node),
            SyntaxKind::FnDecl => {
                let symbol = self.declare_function(scope, node);
                self.fn_body(scope, node, symbol);
            }
            _ => {
                for &child in self.tree.children(node) {
                    match self.tree.kind(child) {
                        SyntaxKind::Block => self.block(scope, child),
                        SyntaxKind::IfStmt => self.stmt(scope, child),
                        _ => self.expr(scope, child),
                    }
                }
            }
        }
    }

    /// Resolve every name reference under `node`. Operator chains nest
    /// without bound, so this walks with an explicit stack.
    fn expr(&mut self, scope: ScopeId, node: NodeId) {
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            if self.tree.kind(node) == SyntaxKind::NameRef {
                self.name_ref(scope, node);
            } else {
                stack.extend(self.tree.children(node).iter().rev());
            }
        }
    }

    fn name_ref(&mut self, scope: ScopeId, node: NodeId) {
        let span = self.tree.span(node);
        let name = self.text(node);
        let symbol = self.table.lookup(scope, name, span.start);
        if symbol.is_none() {
            self.diagnostics.push(Diagnostic {
                severity: Severity::Error,
                message: format!("unresolved identifier `{name}`"),
                span,
                code: "E0001".to_string(),
                version: self.version,
            });
        }
        self.table.occurrences.push(Occurrence {
            span,
            symbol,
            declaration: false,
        });
    }
}
