use std::{fmt, ops::Range};

use thiserror::Error;

use super::{
    import_tree::ImportTree,
    scope::{IdentId, ScopeId},
    Span,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// The module that failed to parse.
    pub module: String,
    /// Byte offset in the source text as it was handed to the parser, before preprocessing.
    pub position: usize,
    pub line: usize,
    pub column: usize,
    /// The source text at the error position, up to the end of its line.
    pub excerpt: String,
    /// Grammar labels and expectations at the failure point, innermost first.
    pub context: Vec<String>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.module, self.line, self.column, self.message
        )?;
        if !self.excerpt.is_empty() {
            write!(f, " at `{}`", self.excerpt)?;
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RefKind {
    Call,
    Type,
    Value,
}

/// What a grammar rule found, in source order. Turned into scopes and elements once the
/// enclosing declaration is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEvent {
    Declare {
        name: String,
        span: Span,
    },
    /// A use of a name, `foo` or a module path like `util::foo`.
    Reference {
        path: Vec<String>,
        span: Span,
        kind: RefKind,
    },
    OpenBlock,
    CloseBlock,
    /// A struct member declaration. Members don't live in any scope.
    Member {
        name: String,
        span: Span,
    },
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ScopeEvents(pub Vec<ScopeEvent>);
impl ScopeEvents {
    pub fn new() -> Self {
        Self(Vec::new())
    }
    pub fn single(event: ScopeEvent) -> Self {
        Self(vec![event])
    }
    pub fn join(mut self, mut other: ScopeEvents) -> ScopeEvents {
        self.0.append(&mut other.0);
        self
    }
    pub fn push(&mut self, event: ScopeEvent) {
        self.0.push(event);
    }
}

/// One element of a parsed module, in source order.
///
/// Declarations are followed by the elements found inside them, see [`DeclElem::children`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbstractElem {
    Module(ModuleElem),
    Import(ImportElem),
    Export(ExportElem),
    Fn(DeclElem),
    Struct(DeclElem),
    StructMember(MemberElem),
    /// `var`, `const`, `override` and `alias` declarations.
    Global(DeclElem),
    Call(RefElem),
    TypeRef(RefElem),
    /// A reference to a value, like a global constant.
    ValueRef(RefElem),
    /// Top level text that is not a declaration, like `enable f16;` or `const_assert`.
    Text(TextElem),
}

impl AbstractElem {
    pub fn span(&self) -> Span {
        match self {
            AbstractElem::Module(elem) => elem.span,
            AbstractElem::Import(elem) => elem.span,
            AbstractElem::Export(elem) => elem.span,
            AbstractElem::Fn(elem) | AbstractElem::Struct(elem) | AbstractElem::Global(elem) => {
                elem.span
            }
            AbstractElem::StructMember(elem) => elem.span,
            AbstractElem::Call(elem) | AbstractElem::TypeRef(elem) | AbstractElem::ValueRef(elem) => {
                elem.span
            }
            AbstractElem::Text(elem) => elem.span,
        }
    }

    pub fn as_decl(&self) -> Option<&DeclElem> {
        match self {
            AbstractElem::Fn(elem) | AbstractElem::Struct(elem) | AbstractElem::Global(elem) => {
                Some(elem)
            }
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&RefElem> {
        match self {
            AbstractElem::Call(elem) | AbstractElem::TypeRef(elem) | AbstractElem::ValueRef(elem) => {
                Some(elem)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Fn,
    Struct,
    Var,
    Const,
    Override,
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclElem {
    pub kind: DeclKind,
    pub name: String,
    /// The declaration's name.
    pub ident: IdentId,
    pub name_span: Span,
    /// The whole declaration, attributes included.
    pub span: Span,
    /// The scope holding the declaration's signature and body.
    pub scope: ScopeId,
    pub exported: bool,
    /// Template parameters from `#export(A, B)`.
    pub params: Vec<String>,
    /// Indices of the elements inside this declaration.
    pub children: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberElem {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefElem {
    pub kind: RefKind,
    /// `["foo"]` for `foo`, `["util", "foo"]` for `util::foo` or `util.foo(`.
    pub path: Vec<String>,
    /// Covers the whole path.
    pub span: Span,
    pub ident: IdentId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImportDialect {
    /// `#import foo(args) as bar from baz`
    Directive,
    /// `import a/b/{c, d};`
    Tree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportElem {
    pub span: Span,
    pub tree: ImportTree,
    pub dialect: ImportDialect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportElem {
    pub span: Span,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleElem {
    pub span: Span,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextElem {
    pub span: Span,
}
