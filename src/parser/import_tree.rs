//! Import statements of both dialects, parsed into one [`ImportTree`] shape.
//!
//! These parsers expect the [`DIRECTIVE`](super::tokenizer::DIRECTIVE) token set to be active,
//! where line breaks are tokens.

use winnow::{
    combinator::{alt, opt, preceded, repeat, separated},
    PResult, Parser,
};

use super::{
    engine::{commit, end_of_input, kind, text, Input},
    token::{Token, TokenKind},
};

/// `import a/b/{c, d as e, f/*};` is
/// `Path { prefix: [a, b], tail: List([Simple(c), Simple(d as e), Path { prefix: [f], tail: Wildcard }]) }`.
///
/// Relative imports start with `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTree {
    Simple {
        name: String,
        alias: Option<String>,
        /// Arguments for a generic export or a generator, `foo(MyStruct)`.
        args: Option<Vec<String>>,
    },
    Wildcard {
        alias: Option<String>,
    },
    List(Vec<ImportTree>),
    Path {
        prefix: Vec<String>,
        tail: Box<ImportTree>,
    },
}

/// A single imported item, with the full path leading to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLeaf {
    /// Segments as written, including `.` and `..` markers. For a wildcard, the module path.
    pub path: Vec<String>,
    pub alias: Option<String>,
    pub args: Option<Vec<String>>,
    pub wildcard: bool,
}

impl ImportTree {
    pub fn simple(name: impl Into<String>) -> Self {
        ImportTree::Simple {
            name: name.into(),
            alias: None,
            args: None,
        }
    }

    /// Wraps the tree in a path prefix, unless the prefix is empty.
    pub fn with_prefix(self, prefix: Vec<String>) -> Self {
        if prefix.is_empty() {
            self
        } else {
            ImportTree::Path {
                prefix,
                tail: Box::new(self),
            }
        }
    }

    /// Expands the tree into its leaves, in source order.
    pub fn leaves(&self) -> Vec<ImportLeaf> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut leaves);
        leaves
    }

    fn collect_leaves(&self, prefix: &mut Vec<String>, leaves: &mut Vec<ImportLeaf>) {
        match self {
            ImportTree::Simple { name, alias, args } => {
                let mut path = prefix.clone();
                path.push(name.clone());
                leaves.push(ImportLeaf {
                    path,
                    alias: alias.clone(),
                    args: args.clone(),
                    wildcard: false,
                });
            }
            ImportTree::Wildcard { alias } => leaves.push(ImportLeaf {
                path: prefix.clone(),
                alias: alias.clone(),
                args: None,
                wildcard: true,
            }),
            ImportTree::List(trees) => {
                for tree in trees {
                    tree.collect_leaves(prefix, leaves);
                }
            }
            ImportTree::Path { prefix: path, tail } => {
                let len = prefix.len();
                prefix.extend(path.iter().cloned());
                tail.collect_leaves(prefix, leaves);
                prefix.truncate(len);
            }
        }
    }
}

fn separator<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    alt((text("/"), text("::"), text("."))).parse_next(input)
}

fn relative_markers(input: &mut Input<'_>) -> PResult<Vec<String>> {
    repeat(
        0..,
        kind(TokenKind::RelativePrefix).map(|token: Token<'_>| {
            if token.text == "./" {
                ".".to_string()
            } else {
                "..".to_string()
            }
        }),
    )
    .parse_next(input)
}

fn word(input: &mut Input<'_>) -> PResult<String> {
    kind(TokenKind::Word)
        .map(|token: Token<'_>| token.text.to_string())
        .parse_next(input)
}

fn skip_eols(input: &mut Input<'_>) -> PResult<()> {
    repeat(0.., kind(TokenKind::Eol).void()).parse_next(input)
}

fn alias(input: &mut Input<'_>) -> PResult<String> {
    preceded(text("as"), commit(word, "alias name")).parse_next(input)
}

/// Words or numbers, like `(MyStruct, 4)`.
fn import_args(input: &mut Input<'_>) -> PResult<Vec<String>> {
    let argument = alt((kind(TokenKind::Word), kind(TokenKind::Number)))
        .map(|token: Token<'_>| token.text.to_string());
    let _ = text("(").parse_next(input)?;
    let args = separated(0.., argument, text(",")).parse_next(input)?;
    let _ = commit(text(")"), "`)`").parse_next(input)?;
    Ok(args)
}

/// An import tree in either dialect, without the `from` clause.
pub fn import_tree(input: &mut Input<'_>) -> PResult<ImportTree> {
    let mut prefix = relative_markers.parse_next(input)?;
    loop {
        if opt(text("{")).parse_next(input)?.is_some() {
            let trees = import_list.parse_next(input)?;
            return Ok(ImportTree::List(trees).with_prefix(prefix));
        }
        if opt(text("*")).parse_next(input)?.is_some() {
            let alias = opt(alias).parse_next(input)?;
            return Ok(ImportTree::Wildcard { alias }.with_prefix(prefix));
        }
        let name = commit(word, "import path segment").parse_next(input)?;
        if opt(separator).parse_next(input)?.is_some() {
            prefix.push(name);
            continue;
        }
        let args = opt(import_args).parse_next(input)?;
        let alias = opt(alias).parse_next(input)?;
        return Ok(ImportTree::Simple { name, alias, args }.with_prefix(prefix));
    }
}

/// The items between `{` and `}`, which may span several lines.
fn import_list(input: &mut Input<'_>) -> PResult<Vec<ImportTree>> {
    let mut trees = Vec::new();
    loop {
        skip_eols(input)?;
        if opt(text("}")).parse_next(input)?.is_some() {
            return Ok(trees);
        }
        trees.push(import_tree.parse_next(input)?);
        skip_eols(input)?;
        if opt(text(",")).parse_next(input)?.is_none() {
            skip_eols(input)?;
            let _ = commit(text("}"), "`,` or `}`").parse_next(input)?;
            return Ok(trees);
        }
    }
}

/// `#import` arguments: a tree, optionally followed by `from some/module`.
pub fn import_directive(input: &mut Input<'_>) -> PResult<ImportTree> {
    let tree = import_tree.parse_next(input)?;
    let from = opt(preceded(text("from"), commit(module_path, "module path"))).parse_next(input)?;
    Ok(match from {
        Some(path) => tree.with_prefix(path),
        None => tree,
    })
}

/// `a/b/c`, `a.b.c` or `a::b::c`, possibly relative. A trailing file extension is dropped.
pub fn module_path(input: &mut Input<'_>) -> PResult<Vec<String>> {
    let mut segments = relative_markers.parse_next(input)?;
    let words: Vec<String> = separated(1.., word, separator).parse_next(input)?;
    segments.extend(words);
    if segments.len() > 1 && matches!(segments.last().map(String::as_str), Some("wgsl" | "wesl")) {
        segments.pop();
    }
    Ok(segments)
}

/// `#export` arguments: optional template parameters like `(T, N)`.
pub fn export_args(input: &mut Input<'_>) -> PResult<Vec<String>> {
    Ok(opt(import_args).parse_next(input)?.unwrap_or_default())
}

/// The end of a directive line. A `;` may end it early.
pub fn line_end(input: &mut Input<'_>) -> PResult<()> {
    alt((
        (text(";"), opt(kind(TokenKind::Eol))).void(),
        kind(TokenKind::Eol).void(),
        end_of_input,
    ))
    .parse_next(input)
}
