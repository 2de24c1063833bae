use std::fmt;

use winnow::{
    ascii::{digit0, digit1, hex_digit0, hex_digit1},
    combinator::{alt, cut_err, dispatch, empty, fail, opt},
    error::StrContext,
    stream::{Compare, Stream, StreamIsPartial},
    token::{any, one_of, take_till, take_while},
    PResult, Parser,
};

use super::{engine::Input, token::TokenKind};

/// Recognizes one token at the current position, or backtracks.
pub type Matcher = for<'a> fn(&mut Input<'a>) -> PResult<()>;

pub struct TokenRule {
    pub kind: TokenKind,
    pub matcher: Matcher,
}

/// An ordered set of token rules. The first rule that matches decides the kind of the token.
pub struct TokenSet {
    pub name: &'static str,
    pub rules: &'static [TokenRule],
    /// Kinds that are skipped unless a parser explicitly asks for them.
    pub ignore: &'static [TokenKind],
}

impl TokenSet {
    pub fn ignores(&self, kind: TokenKind) -> bool {
        self.ignore.contains(&kind)
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet").field("name", &self.name).finish()
    }
}

/// Shader code.
pub static MAIN: TokenSet = TokenSet {
    name: "main",
    rules: &[
        TokenRule {
            kind: TokenKind::Space,
            matcher: spaces,
        },
        TokenRule {
            kind: TokenKind::Comment,
            matcher: comment,
        },
        TokenRule {
            kind: TokenKind::Directive,
            matcher: directive,
        },
        TokenRule {
            kind: TokenKind::Number,
            matcher: number,
        },
        TokenRule {
            kind: TokenKind::Word,
            matcher: word,
        },
        TokenRule {
            kind: TokenKind::Symbol,
            matcher: main_symbol,
        },
    ],
    ignore: &[TokenKind::Space, TokenKind::Comment],
};

/// The rest of a directive line, like the arguments of `#import` or `module`. Line breaks are
/// tokens here, because they end the directive.
pub static DIRECTIVE: TokenSet = TokenSet {
    name: "directive",
    rules: &[
        TokenRule {
            kind: TokenKind::Space,
            matcher: horizontal_spaces,
        },
        // Only line comments, `a/*` is a wildcard import
        TokenRule {
            kind: TokenKind::Comment,
            matcher: directive_comment,
        },
        TokenRule {
            kind: TokenKind::Eol,
            matcher: end_of_line,
        },
        TokenRule {
            kind: TokenKind::RelativePrefix,
            matcher: relative_prefix,
        },
        TokenRule {
            kind: TokenKind::Number,
            matcher: number,
        },
        TokenRule {
            kind: TokenKind::Word,
            matcher: word,
        },
        TokenRule {
            kind: TokenKind::Symbol,
            matcher: directive_symbol,
        },
    ],
    ignore: &[TokenKind::Space, TokenKind::Comment],
};

const MAIN_SYMBOLS: [char; 26] = [
    '(', ')', '[', ']', '{', '}', ':', ';', ',', '.', '@', '<', '>', '=', '+', '-', '*', '/', '%',
    '&', '|', '^', '!', '~', '?', '_',
];

const DIRECTIVE_SYMBOLS: [char; 9] = ['/', '.', '(', ')', ',', '{', '}', '*', ';'];

fn spaces(input: &mut Input<'_>) -> PResult<()> {
    take_while(1.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

fn horizontal_spaces(input: &mut Input<'_>) -> PResult<()> {
    take_while(1.., |c: char| c.is_whitespace() && !is_newline_start(c))
        .void()
        .parse_next(input)
}

fn comment(input: &mut Input<'_>) -> PResult<()> {
    alt((line_comment, block_comment)).parse_next(input)
}

fn directive_comment(input: &mut Input<'_>) -> PResult<()> {
    line_comment.parse_next(input)
}

fn end_of_line(input: &mut Input<'_>) -> PResult<()> {
    new_line.parse_next(input)
}

fn directive(input: &mut Input<'_>) -> PResult<()> {
    ("#", ident_pattern_token).void().parse_next(input)
}

fn number(input: &mut Input<'_>) -> PResult<()> {
    alt((hex_literal, decimal_literal)).parse_next(input)
}

fn word(input: &mut Input<'_>) -> PResult<()> {
    ident_pattern_token.void().parse_next(input)
}

fn main_symbol(input: &mut Input<'_>) -> PResult<()> {
    alt(("::".void(), "->".void(), one_of(MAIN_SYMBOLS).void())).parse_next(input)
}

fn directive_symbol(input: &mut Input<'_>) -> PResult<()> {
    alt(("::".void(), one_of(DIRECTIVE_SYMBOLS).void())).parse_next(input)
}

fn relative_prefix(input: &mut Input<'_>) -> PResult<()> {
    alt(("../", "./")).void().parse_next(input)
}

/// Character level matchers run on the parser's stream as well as on plain text.
pub trait CharStream: Stream<Token = char> + StreamIsPartial + Compare<&'static str> {}

impl<I> CharStream for I where I: Stream<Token = char> + StreamIsPartial + Compare<&'static str> {}

pub fn line_comment<I: CharStream>(input: &mut I) -> PResult<()> {
    ("//", take_till(0.., is_newline_start))
        .void()
        .parse_next(input)
}

/// Block comments nest.
pub fn block_comment<I: CharStream>(input: &mut I) -> PResult<()> {
    let _start = "/*".parse_next(input)?;
    loop {
        if let Some(_end) = opt("*/").parse_next(input)? {
            return Ok(());
        } else if let Some(_nested_comment) = opt(block_comment).parse_next(input)? {
            // Skip nested comments
        } else {
            let _ = cut_err(any)
                .context(StrContext::Label("block comment"))
                .parse_next(input)?;
            let _ = take_till(0.., ('*', '/')).parse_next(input)?;
        }
    }
}

/// Checks if it's part of a Unicode line break, according to https://www.w3.org/TR/WGSL/#line-break
pub fn is_newline_start(c: char) -> bool {
    c == '\u{000A}'
        || c == '\u{000B}'
        || c == '\u{000C}'
        || c == '\u{000D}'
        || c == '\u{0085}'
        || c == '\u{2028}'
        || c == '\u{2029}'
}

pub fn new_line<I: CharStream>(input: &mut I) -> PResult<()> {
    alt(("\u{000D}\u{000A}".void(), one_of(is_newline_start).void())).parse_next(input)
}

pub fn ident_pattern_token<I: CharStream>(input: &mut I) -> PResult<<I as Stream>::Slice> {
    dispatch! {any;
        '_' => take_while(1.., unicode_ident::is_xid_continue).void(),
        c if unicode_ident::is_xid_start(c) => take_while(0.., unicode_ident::is_xid_continue).void(),
        _ => fail,
    }
    .take()
    .parse_next(input)
}

/// Combination of hex_int_literal and hex_float_literal
pub fn hex_literal<I: CharStream>(input: &mut I) -> PResult<()> {
    let _prefix = ("0", one_of(['x', 'X'])).parse_next(input)?;
    let start = opt(hex_digit1).parse_next(input)?;

    fn float_postfix<I: CharStream>(input: &mut I) -> PResult<()> {
        (
            one_of(['p', 'P']),
            opt(one_of(['+', '-'])),
            cut_err(digit1),
            opt(one_of(['f', 'h'])),
        )
            .void()
            .parse_next(input)
    }

    if start.is_none() {
        return (".", hex_digit1, opt(float_postfix))
            .void()
            .parse_next(input);
    }

    alt((
        one_of(['i', 'u']).void(),
        float_postfix.void(),
        (".", hex_digit0, opt(float_postfix)).void(),
        empty,
    ))
    .parse_next(input)
}

/// Combination of decimal_float_literal and decimal_int_literal
pub fn decimal_literal<I: CharStream>(input: &mut I) -> PResult<()> {
    fn e_part<I: CharStream>(input: &mut I) -> PResult<()> {
        (one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)
            .void()
            .parse_next(input)
    }
    fn fh<I: CharStream>(input: &mut I) -> PResult<()> {
        one_of(['f', 'h']).void().parse_next(input)
    }

    alt((
        ("00", cut_err(digit0), ".", digit0, opt(e_part), opt(fh)).void(),
        (".", digit1, opt(e_part), opt(fh)).void(),
        (
            digit1,
            alt((
                (".", digit0, opt(e_part), opt(fh)).void(),
                (e_part, opt(fh)).void(),
                fh.void(),
                one_of(['i', 'u']).void(),
                empty,
            )),
        )
            .void(),
    ))
    .parse_next(input)
}
