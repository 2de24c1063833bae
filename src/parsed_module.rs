use std::fmt;

use crate::{
    parser::{
        import_tree::{ImportLeaf, ImportTree},
        parser_output::{AbstractElem, DeclElem, ImportElem, RefElem},
        scope::ScopeTree,
    },
    src_map::{SourceId, SrcMap},
    warning::Warning,
};

/// A fully resolved path to a module, like `lib/util`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath(pub Vec<String>);

impl ModulePath {
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn from_slice(slice: &[&str]) -> Self {
        Self::new(slice.iter().copied())
    }

    /// Parses `a/b/c`, `a::b::c` or `a.b.c`.
    pub fn parse(path: &str) -> Self {
        Self::new(
            path.split(['/', '\\', ':', '.'])
                .filter(|segment| !segment.is_empty()),
        )
    }

    /// `./lib/util.wgsl` is the module `lib/util`.
    pub fn from_file_path(path: &str) -> Self {
        let path = path.trim_start_matches("./");
        let path = path
            .strip_suffix(".wgsl")
            .or_else(|| path.strip_suffix(".wesl"))
            .unwrap_or(path);
        Self::parse(path)
    }

    /// The path named by a `module` directive, found by scanning lines instead of parsing.
    /// Lets a module that fails to parse be known under the path it gave itself.
    pub fn declared_in(text: &str) -> Option<Self> {
        text.lines().find_map(|line| {
            let line = line.trim();
            let rest = line
                .strip_prefix("#module")
                .or_else(|| line.strip_prefix("module"))?;
            let path = rest.trim().trim_end_matches(';').trim_end();
            let is_path = rest.starts_with(char::is_whitespace)
                && !path.is_empty()
                && path
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | ':'));
            is_path.then(|| Self::parse(path))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolves `.` and `..` markers at the start of an import path against this module.
    ///
    /// `./x` is a sibling of this module, each `..` goes up one more level. Returns `None` for
    /// paths that escape the root.
    pub fn resolve_relative(&self, path: &[String]) -> Option<Vec<String>> {
        let markers = path
            .iter()
            .take_while(|segment| *segment == "." || *segment == "..")
            .count();
        if markers == 0 {
            return Some(path.to_vec());
        }
        let parent_count = path[..markers].iter().filter(|s| *s == "..").count();
        // -1, because the last segment is the name of the module itself
        let keep = self
            .0
            .len()
            .checked_sub(1)?
            .checked_sub(parent_count)?;
        Some(
            self.0[..keep]
                .iter()
                .chain(path[markers..].iter())
                .cloned()
                .collect(),
        )
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// One parsed module. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub path: ModulePath,
    /// Names the original text.
    pub source_id: SourceId,
    /// The original text.
    pub source: String,
    /// The text after `#if` processing. All spans of the elements point into this text.
    pub text: String,
    /// From `text` back to `source`.
    pub src_map: SrcMap,
    pub elems: Vec<AbstractElem>,
    pub scopes: ScopeTree,
    pub warnings: Vec<Warning>,
    /// Without any export markers, a module exports every declaration.
    pub exports_all: bool,
}

impl ParsedModule {
    pub fn text_id(&self) -> &SourceId {
        &self.src_map.id
    }

    /// Top level declarations with their element index.
    pub fn decls(&self) -> impl Iterator<Item = (usize, &DeclElem)> {
        self.elems
            .iter()
            .enumerate()
            .filter_map(|(index, elem)| Some((index, elem.as_decl()?)))
    }

    pub fn decl(&self, index: usize) -> Option<&DeclElem> {
        self.elems.get(index)?.as_decl()
    }

    pub fn find_decl(&self, name: &str) -> Option<(usize, &DeclElem)> {
        self.decls().find(|(_, decl)| decl.name == name)
    }

    pub fn exports(&self) -> impl Iterator<Item = (usize, &DeclElem)> {
        self.decls().filter(|(_, decl)| decl.exported)
    }

    pub fn find_export(&self, name: &str) -> Option<(usize, &DeclElem)> {
        self.exports().find(|(_, decl)| decl.name == name)
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportElem> {
        self.elems.iter().filter_map(|elem| match elem {
            AbstractElem::Import(import) => Some(import),
            _ => None,
        })
    }

    pub fn import_trees(&self) -> impl Iterator<Item = &ImportTree> {
        self.imports().map(|import| &import.tree)
    }

    pub fn import_leaves(&self) -> impl Iterator<Item = (&ImportElem, ImportLeaf)> {
        self.imports()
            .flat_map(|import| import.tree.leaves().into_iter().map(move |leaf| (import, leaf)))
    }

    /// The references inside a declaration.
    pub fn references(&self, decl: &DeclElem) -> impl Iterator<Item = &RefElem> {
        self.elems[decl.children.clone()]
            .iter()
            .filter_map(|elem| elem.as_reference())
    }

    /// Maps an offset in `text` to an offset in `source`.
    pub fn source_offset(&self, text_offset: usize) -> usize {
        self.src_map
            .dest_to_src(text_offset)
            .map_or(text_offset, |position| position.offset)
    }

    /// A warning about a position in `text`.
    pub fn warning(&self, text_offset: usize, message: impl Into<String>) -> Warning {
        Warning::new(
            &self.source_id,
            &self.source,
            self.source_offset(text_offset),
            message,
        )
    }
}
