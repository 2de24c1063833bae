//! Lexical scopes of a module, stored in an arena.

use super::Span;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentId(usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    /// The signature and body of one top level declaration.
    Body,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub idents: Vec<IdentId>,
    pub children: Vec<ScopeId>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IdentKind {
    Decl,
    Ref,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub kind: IdentKind,
    /// For references with a module path, the last segment.
    pub name: String,
    /// Number of path segments. Only single segment references are bound locally.
    pub segments: usize,
    pub span: Span,
    pub scope: ScopeId,
    /// The declaration a reference resolved to.
    pub binding: Option<IdentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    idents: Vec<Ident>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                kind: ScopeKind::Module,
                parent: None,
                idents: Vec::new(),
                children: Vec::new(),
            }],
            idents: Vec::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn ident(&self, id: IdentId) -> &Ident {
        &self.idents[id.0]
    }

    pub fn push_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            kind,
            parent: Some(parent),
            idents: Vec::new(),
            children: Vec::new(),
        });
        self.scopes[parent.0].children.push(id);
        id
    }

    pub fn add_ident(
        &mut self,
        scope: ScopeId,
        kind: IdentKind,
        name: &str,
        segments: usize,
        span: Span,
    ) -> IdentId {
        let id = IdentId(self.idents.len());
        self.idents.push(Ident {
            kind,
            name: name.to_string(),
            segments,
            span,
            scope,
            binding: None,
        });
        self.scopes[scope.0].idents.push(id);
        id
    }

    /// Binds every single segment reference to the nearest declaration with the same name.
    ///
    /// Module level declarations are visible everywhere. Declarations in function bodies and
    /// blocks are only visible after they were declared.
    pub fn bind_all(&mut self) {
        for index in 0..self.idents.len() {
            let ident = &self.idents[index];
            if ident.kind != IdentKind::Ref || ident.segments != 1 || ident.binding.is_some() {
                continue;
            }
            let binding = self.find_decl(ident.scope, &ident.name, IdentId(index));
            self.idents[index].binding = binding;
        }
    }

    fn find_decl(&self, from: ScopeId, name: &str, before: IdentId) -> Option<IdentId> {
        let mut scope = Some(from);
        while let Some(id) = scope {
            let current = self.scope(id);
            let found = current.idents.iter().rev().copied().find(|ident_id| {
                let ident = self.ident(*ident_id);
                ident.kind == IdentKind::Decl
                    && ident.name == name
                    && (current.kind == ScopeKind::Module || *ident_id < before)
            });
            if found.is_some() {
                return found;
            }
            scope = current.parent;
        }
        None
    }

    /// Names declared inside function bodies and blocks, like parameters and `let`s.
    pub fn local_decl_names(&self) -> impl Iterator<Item = &str> {
        self.idents
            .iter()
            .filter(|ident| ident.kind == IdentKind::Decl && ident.scope != ScopeId(0))
            .map(|ident| ident.name.as_str())
    }

    /// Is this a module level identifier?
    pub fn is_global(&self, id: IdentId) -> bool {
        self.ident(id).scope == self.root()
    }
}
