//! Token level parsing primitives on top of winnow.
//!
//! The stream is the source text itself. Tokens are lexed on demand with the token set that is
//! active in the [`ParseContext`], so a grammar rule can switch to another set for a while (the
//! arguments of a `#import` line are lexed differently from shader code). Backtracking is winnow's
//! checkpointing, and `cut_err` is the commit point after which a failure is a hard error.

use std::{
    cell::{Cell, RefCell},
    fmt,
};

use winnow::{
    combinator::{cut_err, fail, not, repeat, trace},
    error::{ContextError, ErrMode, StrContext, StrContextValue},
    stream::{Location, Stateful, Stream},
    token::any,
    Located, PResult, Parser,
};

use super::{
    parser_output::ScopeEvents,
    token::{is_keyword, Token, TokenKind},
    tokenizer::{TokenSet, MAIN},
    ParseOptions, Span,
};

pub type Input<'a> = Stateful<Located<&'a str>, &'a ParseContext>;

pub fn new_input<'a>(text: &'a str, context: &'a ParseContext) -> Input<'a> {
    Stateful {
        input: Located::new(text),
        state: context,
    }
}

/// A side effect that only happens once the parse as a whole succeeded.
pub type Deferred = Box<dyn FnOnce(&mut ParseEffects)>;

#[derive(Debug, Default)]
pub struct ParseEffects {
    /// Positions are in the parsed text.
    pub warnings: Vec<(Span, String)>,
}

/// Shared state of one parse.
pub struct ParseContext {
    token_set: Cell<&'static TokenSet>,
    steps: Cell<usize>,
    max_steps: usize,
    furthest: Cell<usize>,
    trace: bool,
    failure: RefCell<Option<String>>,
    journal: RefCell<Vec<Deferred>>,
}

impl ParseContext {
    pub fn new(options: &ParseOptions) -> Self {
        Self {
            token_set: Cell::new(&MAIN),
            steps: Cell::new(0),
            max_steps: options.max_steps,
            furthest: Cell::new(0),
            trace: options.trace,
            failure: RefCell::new(None),
            journal: RefCell::new(Vec::new()),
        }
    }

    pub fn token_set(&self) -> &'static TokenSet {
        self.token_set.get()
    }

    /// Activates another token set, returning the previous one.
    pub fn swap_token_set(&self, set: &'static TokenSet) -> &'static TokenSet {
        self.token_set.replace(set)
    }

    /// Counts one lexing step. Returns false once the step budget is used up.
    fn step(&self) -> bool {
        let steps = self.steps.get() + 1;
        self.steps.set(steps);
        steps <= self.max_steps
    }

    pub fn steps(&self) -> usize {
        self.steps.get()
    }

    fn note_position(&self, position: usize) {
        if position > self.furthest.get() {
            self.furthest.set(position);
        }
    }

    /// The furthest position any token was requested at. Errors are reported there.
    pub fn furthest(&self) -> usize {
        self.furthest.get()
    }

    /// A message that explains a hard failure better than the winnow context does.
    pub fn take_failure(&self) -> Option<String> {
        self.failure.borrow_mut().take()
    }

    pub fn defer(&self, action: Deferred) {
        self.journal.borrow_mut().push(action);
    }

    fn journal_len(&self) -> usize {
        self.journal.borrow().len()
    }

    fn rollback(&self, len: usize) {
        self.journal.borrow_mut().truncate(len);
    }

    /// Runs the deferred actions of all branches that were not backtracked.
    pub fn finish(self) -> ParseEffects {
        let mut effects = ParseEffects::default();
        for action in self.journal.into_inner() {
            action(&mut effects);
        }
        effects
    }
}

impl fmt::Debug for ParseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseContext")
            .field("token_set", &self.token_set.get().name)
            .field("steps", &self.steps.get())
            .field("furthest", &self.furthest.get())
            .field("deferred", &self.journal.borrow().len())
            .finish()
    }
}

/// Fails with a hard error that aborts the whole parse.
pub fn hard_error<'a, O>(input: &mut Input<'a>, label: &'static str) -> PResult<O> {
    cut_err(fail).context(StrContext::Label(label)).parse_next(input)
}

/// Lexes exactly one token with the active token set, ignorable or not.
fn lex_one<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    let context = input.state;
    if !context.step() {
        *context.failure.borrow_mut() =
            Some(format!("parse step limit of {} exceeded", context.max_steps));
        return hard_error(input, "parse step limit");
    }
    let start = input.location();
    if input.eof_offset() == 0 {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }

    let set = context.token_set();
    let mut matched = None;
    for rule in set.rules {
        let checkpoint = input.checkpoint();
        match rule.matcher.take().parse_next(input) {
            Ok(text) if !text.is_empty() => {
                matched = Some((rule.kind, text));
                break;
            }
            Ok(_) | Err(ErrMode::Backtrack(_)) => input.reset(&checkpoint),
            Err(e) => return Err(e),
        }
    }
    let (kind, text) = match matched {
        Some(matched) => matched,
        None => (TokenKind::Unknown, any.take().parse_next(input)?),
    };

    let token = Token::from((kind, text, start..input.location()));
    if !set.ignores(kind) {
        context.note_position(start);
    }
    if context.trace {
        tracing::trace!(set = set.name, kind = ?token.kind, text = token.text, start, "token");
    }
    Ok(token)
}

/// The next token that the active token set does not ignore.
pub fn any_token<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    loop {
        let token = lex_one(input)?;
        if !input.state.token_set().ignores(token.kind) {
            return Ok(token);
        }
    }
}

/// Consumes ignorable tokens, so that the next position is the start of a real token.
pub fn skip_ignored(input: &mut Input<'_>) -> PResult<()> {
    loop {
        let checkpoint = input.checkpoint();
        match lex_one(input) {
            Ok(token) if input.state.token_set().ignores(token.kind) => {}
            Ok(_) | Err(ErrMode::Backtrack(_)) => {
                input.reset(&checkpoint);
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

pub fn kind<'a>(kind: TokenKind) -> impl Parser<Input<'a>, Token<'a>, ContextError> {
    any_token.verify(move |token: &Token<'a>| token.kind == kind)
}

/// A word, symbol, or directive with exactly this text.
pub fn text<'a>(expected: &'static str) -> impl Parser<Input<'a>, Token<'a>, ContextError> {
    any_token.verify(move |token: &Token<'a>| {
        token.text == expected
            && matches!(
                token.kind,
                TokenKind::Word | TokenKind::Symbol | TokenKind::Directive
            )
    })
}

/// A word that is not a keyword.
pub fn ident<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    any_token
        .verify(|token: &Token<'a>| token.kind == TokenKind::Word && !is_keyword(token.text))
        .parse_next(input)
}

/// After this point the syntax is unambiguous: failing is a hard, positioned error.
pub fn commit<'a, O, P>(parser: P, expected: &'static str) -> impl Parser<Input<'a>, O, ContextError>
where
    P: Parser<Input<'a>, O, ContextError>,
{
    cut_err(parser).context(StrContext::Expected(StrContextValue::Description(
        expected,
    )))
}

/// Runs a parser speculatively. When it backtracks, the side effects it deferred are dropped.
pub fn attempt<'a, O, P>(mut parser: P) -> impl Parser<Input<'a>, O, ContextError>
where
    P: Parser<Input<'a>, O, ContextError>,
{
    move |input: &mut Input<'a>| {
        let mark = input.state.journal_len();
        let result = parser.parse_next(input);
        if let Err(ErrMode::Backtrack(_)) = &result {
            input.state.rollback(mark);
        }
        result
    }
}

/// Records a warning that is only reported if the surrounding parse commits.
pub fn warn_later(input: &mut Input<'_>, span: Span, message: String) {
    input.state.defer(Box::new(move |effects: &mut ParseEffects| {
        effects.warnings.push((span, message))
    }));
}

/// Runs a parser with another token set, restoring the previous set afterwards.
pub fn with_token_set<'a, O, P>(
    set: &'static TokenSet,
    mut parser: P,
) -> impl Parser<Input<'a>, O, ContextError>
where
    P: Parser<Input<'a>, O, ContextError>,
{
    move |input: &mut Input<'a>| {
        let previous = input.state.swap_token_set(set);
        let result = parser.parse_next(input);
        input.state.swap_token_set(previous);
        result
    }
}

/// Also returns the span from the first to the last token the parser consumed.
pub fn spanned<'a, O, P>(mut parser: P) -> impl Parser<Input<'a>, (O, Span), ContextError>
where
    P: Parser<Input<'a>, O, ContextError>,
{
    move |input: &mut Input<'a>| {
        skip_ignored(input)?;
        let start = input.location();
        let value = parser.parse_next(input)?;
        Ok((value, Span::new(start, input.location())))
    }
}

/// A named grammar rule. Shows up in winnow's debug trace with the `trace` feature.
pub fn rule<'a, O, P>(name: &'static str, parser: P) -> impl Parser<Input<'a>, O, ContextError>
where
    P: Parser<Input<'a>, O, ContextError>,
{
    trace(name, parser)
}

/// Repeats a parser, appending all scope events in order.
pub fn join_all<'a, P>(parser: P) -> impl Parser<Input<'a>, ScopeEvents, ContextError>
where
    P: Parser<Input<'a>, ScopeEvents, ContextError>,
{
    repeat(0.., parser).fold(ScopeEvents::default, |events: ScopeEvents, more| {
        events.join(more)
    })
}

pub fn end_of_input(input: &mut Input<'_>) -> PResult<()> {
    not(any_token).parse_next(input)
}

#[cfg(test)]
mod tests {
    use winnow::combinator::alt;

    use super::*;

    /// Warns about the first token, then expects `then`.
    fn warn_then<'a>(then: &'static str) -> impl Parser<Input<'a>, Token<'a>, ContextError> {
        move |input: &mut Input<'a>| {
            let first = any_token.parse_next(input)?;
            warn_later(input, first.span, format!("saw `{}`", first.text));
            text(then).parse_next(input)
        }
    }

    #[test]
    fn backtracked_branches_drop_their_warnings() {
        let context = ParseContext::new(&ParseOptions::default());
        let mut input = new_input("a c", &context);
        let token = alt((attempt(warn_then("b")), any_token))
            .parse_next(&mut input)
            .unwrap();
        assert_eq!(token.text, "a");
        assert!(context.finish().warnings.is_empty());
    }

    #[test]
    fn successful_branches_keep_their_warnings() {
        let context = ParseContext::new(&ParseOptions::default());
        let mut input = new_input("a c", &context);
        let token = alt((attempt(warn_then("c")), any_token))
            .parse_next(&mut input)
            .unwrap();
        assert_eq!(token.text, "c");
        let effects = context.finish();
        assert_eq!(effects.warnings, [(Span::new(0, 1), "saw `a`".to_string())]);
    }

    #[test]
    fn an_outer_backtrack_drops_inner_warnings() {
        let context = ParseContext::new(&ParseOptions::default());
        let mut input = new_input("a c e", &context);
        let token = alt((attempt((attempt(warn_then("c")), text("d"))).map(|(t, _)| t), any_token))
            .parse_next(&mut input)
            .unwrap();
        assert_eq!(token.text, "a");
        assert!(context.finish().warnings.is_empty());
    }
}
