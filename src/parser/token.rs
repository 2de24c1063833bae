use std::ops::Range;

use super::Span;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Whitespace. Ignored unless a token set says otherwise.
    Space,
    Comment,
    /// A line break, only produced by token sets where lines matter.
    Eol,
    /// `#import`, `#export`, `#module` and friends.
    Directive,
    Word,
    Number,
    Symbol,
    /// `./` or `../` in front of an import path.
    RelativePrefix,
    /// A character that no rule of the active token set recognizes.
    Unknown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

impl<'a> From<(TokenKind, &'a str, Range<usize>)> for Token<'a> {
    fn from((kind, text, span): (TokenKind, &'a str, Range<usize>)) -> Self {
        Self {
            kind,
            text,
            span: span.into(),
        }
    }
}

/// Reserved words of WGSL that can never name a declaration or a reference.
pub fn is_keyword(text: &str) -> bool {
    matches!(
        text,
        "alias"
            | "break"
            | "case"
            | "const"
            | "const_assert"
            | "continue"
            | "continuing"
            | "default"
            | "diagnostic"
            | "discard"
            | "else"
            | "enable"
            | "false"
            | "fn"
            | "for"
            | "if"
            | "let"
            | "loop"
            | "override"
            | "requires"
            | "return"
            | "struct"
            | "switch"
            | "true"
            | "var"
            | "while"
    )
}
