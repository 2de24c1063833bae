mod engine;
pub mod import_tree;
pub mod parser_output;
pub mod scope;
mod span;
pub mod token;
pub mod tokenizer;

use std::collections::HashMap;

use winnow::{
    combinator::{alt, opt, peek, preceded, repeat, terminated},
    error::{ContextError, ErrMode, StrContext},
    stream::Stream,
    PResult, Parser,
};

use crate::{
    parsed_module::{ModulePath, ParsedModule},
    rewriter::process_conditionals,
    src_map::{line_column, SourceId, SrcMap},
    warning::Warning,
};
use engine::{
    any_token, attempt, commit, end_of_input, hard_error, ident, join_all, kind, new_input, rule,
    spanned, text, warn_later, Input, ParseContext, ParseEffects,
};
use import_tree::{export_args, import_directive, import_tree, line_end, module_path, ImportTree};
use parser_output::{
    AbstractElem, DeclElem, DeclKind, ExportElem, ImportDialect, ImportElem, MemberElem,
    ModuleElem, ParseError, RefElem, RefKind, ScopeEvent, ScopeEvents, TextElem,
};
use scope::{IdentKind, ScopeKind, ScopeTree};
pub use span::Span;
use token::{is_keyword, Token, TokenKind};
use tokenizer::DIRECTIVE;

/// How a module is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Values for `#if` conditions. Missing conditions are false.
    pub conditions: HashMap<String, bool>,
    /// Upper bound on the number of lexed tokens, including the ones lexed again after
    /// backtracking.
    pub max_steps: usize,
    /// Logs every lexed token at trace level.
    pub trace: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            conditions: HashMap::new(),
            max_steps: 1_000_000,
            trace: false,
        }
    }
}

impl ParseOptions {
    pub fn with_condition(mut self, name: impl Into<String>, value: bool) -> Self {
        self.conditions.insert(name.into(), value);
        self
    }
}

/// A top level item, before scopes are built.
#[derive(Debug)]
enum RawItem {
    Module { path: Vec<String>, span: Span },
    Import {
        tree: ImportTree,
        dialect: ImportDialect,
        span: Span,
    },
    Export { params: Vec<String>, span: Span },
    Decl(RawDecl),
    Text(Span),
}

#[derive(Debug)]
struct RawDecl {
    kind: DeclKind,
    name: String,
    name_span: Span,
    span: Span,
    /// The `export` keyword in front of the declaration.
    export_keyword: Option<Span>,
    events: ScopeEvents,
}

impl RawDecl {
    fn new(kind: DeclKind, name: Token<'_>, events: ScopeEvents) -> Self {
        Self {
            kind,
            name: name.text.to_string(),
            name_span: name.span,
            span: Span::default(),
            export_keyword: None,
            events,
        }
    }
}

/// Where the token loop of a declaration body starts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mode {
    /// `name: type` declares `name`.
    Params,
    Code,
}

/// A parser for the purposes of linking WESL modules together. It needs to find
/// - Imports, exports and the module directive
/// - Top level declarations and their names
/// - Every identifier use inside a declaration, with the scope it is in
///
/// It does not need to precisely parse expressions, statements or operators.
/// Instead, it parses a simplified superset of WGSL. As long as identifiers are resolved
/// correctly, the parsing is a success.
pub struct WeslParser;

impl WeslParser {
    fn translation_unit(input: &mut Input<'_>) -> PResult<Vec<RawItem>> {
        let items: Vec<Option<RawItem>> =
            repeat(0.., attempt(Self::global_item)).parse_next(input)?;
        end_of_input.parse_next(input)?;
        Ok(items.into_iter().flatten().collect())
    }

    fn global_item(input: &mut Input<'_>) -> PResult<Option<RawItem>> {
        rule(
            "global_item",
            alt((
                Self::module_directive.map(Some),
                Self::import.map(Some),
                Self::export_directive.map(Some),
                Self::global_directive.map(Some),
                Self::declaration.map(Some),
                Self::unknown.map(|()| None),
            )),
        )
        .parse_next(input)
    }

    /// Logs and skips a token that starts no known construct.
    fn unknown(input: &mut Input<'_>) -> PResult<()> {
        let token = any_token.parse_next(input)?;
        warn_later(
            input,
            token.span,
            format!("unexpected `{}` at module level, skipped", token.text),
        );
        Ok(())
    }

    fn module_directive(input: &mut Input<'_>) -> PResult<RawItem> {
        let ((_, path), span) = spanned((
            alt((text("module"), text("#module"))),
            engine::with_token_set(
                &DIRECTIVE,
                terminated(
                    commit(module_path, "module path"),
                    commit(line_end, "end of line"),
                ),
            ),
        ))
        .parse_next(input)?;
        Ok(RawItem::Module { path, span })
    }

    fn import(input: &mut Input<'_>) -> PResult<RawItem> {
        let ((tree, dialect), span) = spanned(alt((
            preceded(
                text("#import"),
                engine::with_token_set(
                    &DIRECTIVE,
                    terminated(
                        commit(import_directive, "import"),
                        commit(line_end, "end of import"),
                    ),
                ),
            )
            .map(|tree| (tree, ImportDialect::Directive)),
            preceded(
                text("import"),
                engine::with_token_set(
                    &DIRECTIVE,
                    terminated(
                        commit(import_tree, "import path"),
                        commit(line_end, "end of import"),
                    ),
                ),
            )
            .map(|tree| (tree, ImportDialect::Tree)),
        )))
        .parse_next(input)?;
        Ok(RawItem::Import {
            tree,
            dialect,
            span,
        })
    }

    /// `#export` on its own line, or in front of a declaration on the same line.
    fn export_directive(input: &mut Input<'_>) -> PResult<RawItem> {
        let (params, span) = spanned(preceded(
            text("#export"),
            engine::with_token_set(&DIRECTIVE, terminated(export_args, opt(line_end))),
        ))
        .parse_next(input)?;
        Ok(RawItem::Export { params, span })
    }

    /// `enable`, `requires`, `diagnostic`, `const_assert` and empty statements are kept as text.
    fn global_directive(input: &mut Input<'_>) -> PResult<RawItem> {
        let (_, span) = spanned(alt((
            text(";").void(),
            (
                alt((
                    text("enable"),
                    text("requires"),
                    text("diagnostic"),
                    text("const_assert"),
                )),
                Self::balanced(";", Mode::Code),
            )
                .void(),
        )))
        .parse_next(input)?;
        Ok(RawItem::Text(span))
    }

    fn declaration(input: &mut Input<'_>) -> PResult<RawItem> {
        let export_keyword = opt(spanned(text("export")).map(|(_, span)| span)).parse_next(input)?;
        let result = spanned((
            Self::attributes,
            alt((
                Self::function,
                Self::structure,
                Self::global_value,
                Self::alias,
            )),
        ))
        .parse_next(input);
        let ((attributes, mut decl), span) = match result {
            Err(ErrMode::Backtrack(e)) if export_keyword.is_some() => return Err(ErrMode::Cut(e)),
            result => result?,
        };
        decl.span = span;
        decl.export_keyword = export_keyword;
        decl.events = attributes.join(decl.events);
        Ok(RawItem::Decl(decl))
    }

    fn attributes(input: &mut Input<'_>) -> PResult<ScopeEvents> {
        join_all(Self::attribute).parse_next(input)
    }

    fn attribute(input: &mut Input<'_>) -> PResult<ScopeEvents> {
        let _ = text("@").parse_next(input)?;
        let name = commit(kind(TokenKind::Word), "attribute name").parse_next(input)?;
        Self::attribute_args(input, name.text)
    }

    /// Only some attributes take expressions. The others take enumerants like `position`.
    fn attribute_args(input: &mut Input<'_>, name: &str) -> PResult<ScopeEvents> {
        if opt(text("(")).parse_next(input)?.is_none() {
            return Ok(ScopeEvents::new());
        }
        let events = Self::body_until(input, ")", Mode::Code)?;
        match name {
            "workgroup_size" | "align" | "binding" | "blend_src" | "group" | "id" | "location"
            | "size" => Ok(events),
            _ => Ok(ScopeEvents::new()),
        }
    }

    fn function(input: &mut Input<'_>) -> PResult<RawDecl> {
        let _ = text("fn").parse_next(input)?;
        let name = commit(ident, "function name").parse_next(input)?;
        let _ = commit(text("("), "`(`").parse_next(input)?;
        let params = Self::body_until(input, ")", Mode::Params)?;
        // Return type, up to the body
        let signature = Self::body_until(input, "{", Mode::Code)?;
        let body = Self::body_until(input, "}", Mode::Code)?;
        Ok(RawDecl::new(
            DeclKind::Fn,
            name,
            params.join(signature).join(body),
        ))
    }

    fn structure(input: &mut Input<'_>) -> PResult<RawDecl> {
        let _ = text("struct").parse_next(input)?;
        let name = commit(ident, "struct name").parse_next(input)?;
        let _ = commit(text("{"), "`{`").parse_next(input)?;
        let mut events = ScopeEvents::new();
        loop {
            if opt(text("}")).parse_next(input)?.is_some() {
                break;
            }
            let attributes = Self::attributes.parse_next(input)?;
            let member = commit(kind(TokenKind::Word), "member name").parse_next(input)?;
            let _ = commit(text(":"), "`:`").parse_next(input)?;
            let member_type = Self::member_type(input)?;
            events = events
                .join(attributes)
                .join(ScopeEvents::single(ScopeEvent::Member {
                    name: member.text.to_string(),
                    span: member.span,
                }))
                .join(member_type);
        }
        Ok(RawDecl::new(DeclKind::Struct, name, events))
    }

    /// A struct member type, up to a `,` or the closing `}`.
    fn member_type(input: &mut Input<'_>) -> PResult<ScopeEvents> {
        let mut events = ScopeEvents::new();
        let mut depth = 0usize;
        loop {
            let checkpoint = input.checkpoint();
            let token = commit(any_token, "`}`").parse_next(input)?;
            match (token.kind, token.text) {
                (TokenKind::Symbol, "<") => depth += 1,
                (TokenKind::Symbol, ">") => depth = depth.saturating_sub(1),
                (TokenKind::Symbol, ",") if depth == 0 => return Ok(events),
                (TokenKind::Symbol, "}") if depth == 0 => {
                    input.reset(&checkpoint);
                    return Ok(events);
                }
                (TokenKind::Symbol, "(") => {
                    events = events.join(Self::body_until(input, ")", Mode::Code)?);
                }
                (TokenKind::Word, word) if !is_keyword(word) => {
                    let (path, span, _) = Self::path(input, token)?;
                    events.push(ScopeEvent::Reference {
                        path,
                        span,
                        kind: RefKind::Type,
                    });
                }
                _ => {}
            }
        }
    }

    /// `var`, `const` and `override`.
    fn global_value(input: &mut Input<'_>) -> PResult<RawDecl> {
        let keyword =
            alt((text("var"), text("const"), text("override"))).parse_next(input)?;
        let kind = match keyword.text {
            "var" => DeclKind::Var,
            "const" => DeclKind::Const,
            _ => DeclKind::Override,
        };
        // Address space and access mode
        let _ = opt(preceded(text("<"), Self::balanced(">", Mode::Code))).parse_next(input)?;
        let name = commit(ident, "name").parse_next(input)?;
        let events = Self::body_until(input, ";", Mode::Code)?;
        Ok(RawDecl::new(kind, name, events))
    }

    fn alias(input: &mut Input<'_>) -> PResult<RawDecl> {
        let _ = text("alias").parse_next(input)?;
        let name = commit(ident, "alias name").parse_next(input)?;
        let _ = commit(text("="), "`=`").parse_next(input)?;
        let events = Self::body_until(input, ";", Mode::Code)?;
        Ok(RawDecl::new(DeclKind::Alias, name, events))
    }

    fn balanced<'a>(
        closer: &'static str,
        mode: Mode,
    ) -> impl Parser<Input<'a>, ScopeEvents, ContextError> {
        move |input: &mut Input<'a>| Self::body_until(input, closer, mode)
    }

    /// Consumes tokens up to and including `closer`, skipping over nested brackets.
    ///
    /// Declarations of `let`, `var` and `const` take effect at the end of their statement, so
    /// that `let x = x;` refers to an outer `x`.
    fn body_until<'a>(
        input: &mut Input<'a>,
        closer: &'static str,
        mode: Mode,
    ) -> PResult<ScopeEvents> {
        let mut events = ScopeEvents::new();
        let mut pending: Vec<ScopeEvent> = Vec::new();
        let mut previous = "";
        loop {
            let token = commit(any_token, closer_description(closer)).parse_next(input)?;
            match (token.kind, token.text) {
                (TokenKind::Symbol, symbol) if symbol == closer => {
                    events.0.append(&mut pending);
                    return Ok(events);
                }
                (TokenKind::Symbol, ";") => events.0.append(&mut pending),
                (TokenKind::Symbol, "{") => {
                    events.push(ScopeEvent::OpenBlock);
                    events = events.join(Self::body_until(input, "}", Mode::Code)?);
                    events.push(ScopeEvent::CloseBlock);
                }
                (TokenKind::Symbol, "(") => {
                    events = events.join(Self::body_until(input, ")", Mode::Code)?);
                }
                (TokenKind::Symbol, "[") => {
                    events = events.join(Self::body_until(input, "]", Mode::Code)?);
                }
                (TokenKind::Symbol, ")" | "]" | "}") => {
                    return hard_error(input, "unbalanced brackets");
                }
                (TokenKind::Symbol, "@") => {
                    let name = commit(kind(TokenKind::Word), "attribute name").parse_next(input)?;
                    events = events.join(Self::attribute_args(input, name.text)?);
                }
                (TokenKind::Symbol, ".") => {
                    // Member access or swizzle
                    let _ = opt(kind(TokenKind::Word)).parse_next(input)?;
                }
                (TokenKind::Word, "for") => {
                    // The loop header is in the same scope as the loop body
                    events.push(ScopeEvent::OpenBlock);
                    let _ = commit(text("("), "`(`").parse_next(input)?;
                    events = events.join(Self::body_until(input, ")", Mode::Code)?);
                    let _ = commit(text("{"), "`{`").parse_next(input)?;
                    events = events.join(Self::body_until(input, "}", Mode::Code)?);
                    events.push(ScopeEvent::CloseBlock);
                }
                (TokenKind::Word, "let" | "var" | "const") => {
                    let _ = opt(preceded(text("<"), Self::balanced(">", Mode::Code)))
                        .parse_next(input)?;
                    let name = commit(ident, "variable name").parse_next(input)?;
                    pending.push(ScopeEvent::Declare {
                        name: name.text.to_string(),
                        span: name.span,
                    });
                }
                (TokenKind::Word, word) if is_keyword(word) => {}
                (TokenKind::Word, word) => {
                    if mode == Mode::Params && opt(peek(text(":"))).parse_next(input)?.is_some() {
                        // A parameter
                        events.push(ScopeEvent::Declare {
                            name: word.to_string(),
                            span: token.span,
                        });
                        previous = token.text;
                        continue;
                    }
                    let (path, span, is_call) = Self::path(input, token)?;
                    let kind = if is_call {
                        RefKind::Call
                    } else if matches!(previous, ":" | "->" | "<") {
                        RefKind::Type
                    } else {
                        RefKind::Value
                    };
                    events.push(ScopeEvent::Reference { path, span, kind });
                }
                _ => {}
            }
            previous = token.text;
        }
    }

    /// The rest of a reference that starts with `first`.
    ///
    /// `a::b::c` is always a path. `a.b(` is a call of `b` in module `a`, while `a.b` without a
    /// call is the member `b` of the value `a`.
    fn path<'a>(input: &mut Input<'a>, first: Token<'a>) -> PResult<(Vec<String>, Span, bool)> {
        let mut path = vec![first.text.to_string()];
        let mut end = first.span.end;
        while let Some(segment) =
            opt(preceded(text("::"), kind(TokenKind::Word))).parse_next(input)?
        {
            path.push(segment.text.to_string());
            end = segment.span.end;
        }

        let checkpoint = input.checkpoint();
        let dotted: Vec<Token<'a>> =
            repeat(0.., preceded(text("."), kind(TokenKind::Word))).parse_next(input)?;
        let is_call = opt(peek(text("("))).parse_next(input)?.is_some();
        if is_call {
            if let Some(last) = dotted.last() {
                end = last.span.end;
            }
            path.extend(dotted.iter().map(|token| token.text.to_string()));
        } else if !dotted.is_empty() {
            input.reset(&checkpoint);
        }
        Ok((path, Span::new(first.span.start, end), is_call))
    }
}

fn closer_description(closer: &str) -> &'static str {
    match closer {
        ")" => "`)`",
        "]" => "`]`",
        "}" => "`}`",
        ";" => "`;`",
        "{" => "`{`",
        _ => "`>`",
    }
}

/// Parses a module. `path` names the module, like `lib/util.wgsl` or `lib::util`. A `module`
/// directive in the text takes precedence.
///
/// `#if` conditions are evaluated first, so everything else sees the preprocessed text.
pub fn parse_module(
    text: &str,
    path: &str,
    options: &ParseOptions,
) -> Result<ParsedModule, ParseError> {
    let source_id = SourceId::new(path);
    let conditioned = process_conditionals(text, &source_id, &options.conditions);
    let context = ParseContext::new(options);
    let result = {
        let mut input = new_input(&conditioned.text, &context);
        WeslParser::translation_unit.parse_next(&mut input)
    };
    let items = match result {
        Ok(items) => items,
        Err(error) => {
            let error = match error {
                ErrMode::Backtrack(e) | ErrMode::Cut(e) => e,
                ErrMode::Incomplete(_) => ContextError::new(),
            };
            return Err(parse_error(
                path,
                text,
                &conditioned.src_map,
                &context,
                &error,
            ));
        }
    };
    let steps = context.steps();
    let effects = context.finish();

    let mut module = assemble(items, effects, &conditioned.text);
    let mut warnings = conditioned.warnings;
    warnings.extend(module.warnings.drain(..).map(|(span, message)| {
        let offset = conditioned
            .src_map
            .dest_to_src(span.start)
            .map_or(span.start, |position| position.offset);
        Warning::new(&source_id, text, offset, message)
    }));

    let module_path = match module.path {
        Some(segments) => ModulePath::new(segments),
        None => ModulePath::from_file_path(path),
    };
    tracing::debug!(
        module = %module_path,
        elems = module.elems.len(),
        steps,
        "parsed module"
    );
    Ok(ParsedModule {
        path: module_path,
        source_id,
        source: text.to_string(),
        text: conditioned.text,
        src_map: conditioned.src_map,
        elems: module.elems,
        scopes: module.scopes,
        warnings,
        exports_all: module.exports_all,
    })
}

/// Lexes shader code into its tokens, skipping whitespace and comments.
pub fn tokenize(text: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let options = ParseOptions::default();
    let context = ParseContext::new(&options);
    let result = {
        let mut input = new_input(text, &context);
        repeat(0.., any_token.map(|token| (token.kind, token.span)))
            .parse_next(&mut input)
            .map(|tokens: Vec<(TokenKind, Span)>| tokens)
    };
    match result {
        Ok(tokens) => Ok(tokens
            .into_iter()
            .map(|(kind, span)| Token {
                kind,
                text: span.text(text),
                span,
            })
            .collect()),
        Err(error) => {
            let error = match error {
                ErrMode::Backtrack(e) | ErrMode::Cut(e) => e,
                ErrMode::Incomplete(_) => ContextError::new(),
            };
            let identity = SrcMap::identity(SourceId::new("tokens"), &SourceId::new(""), text);
            Err(parse_error("", text, &identity, &context, &error))
        }
    }
}

fn parse_error(
    module: &str,
    source: &str,
    src_map: &SrcMap,
    context: &ParseContext,
    error: &ContextError,
) -> ParseError {
    let position = src_map
        .dest_to_src(context.furthest())
        .map_or(context.furthest(), |position| position.offset)
        .min(source.len());
    let (line, column) = line_column(source, position);
    let excerpt: String = source
        .get(position..)
        .unwrap_or_default()
        .lines()
        .next()
        .unwrap_or_default()
        .trim_end()
        .chars()
        .take(40)
        .collect();
    let context_labels: Vec<String> = error.context().map(|c| c.to_string()).collect();
    let message = context.take_failure().unwrap_or_else(|| {
        let expected: Vec<String> = error
            .context()
            .filter_map(|c| match c {
                StrContext::Expected(value) => Some(value.to_string()),
                _ => None,
            })
            .collect();
        let label = error.context().find_map(|c| match c {
            StrContext::Label(label) => Some(*label),
            _ => None,
        });
        match (label, expected.is_empty()) {
            (_, false) => format!("expected {}", expected.join(" or ")),
            (Some(label), true) => format!("invalid {label}"),
            (None, true) => "unexpected syntax".to_string(),
        }
    });
    tracing::debug!(module, line, column, %message, "parse failed");
    ParseError {
        message,
        module: module.to_string(),
        position,
        line,
        column,
        excerpt,
        context: context_labels,
    }
}

struct Assembled {
    path: Option<Vec<String>>,
    elems: Vec<AbstractElem>,
    scopes: ScopeTree,
    warnings: Vec<(Span, String)>,
    exports_all: bool,
}

/// Builds the scope tree and the element list from the top level items.
fn assemble(items: Vec<RawItem>, effects: ParseEffects, text: &str) -> Assembled {
    let mut scopes = ScopeTree::new();
    let root = scopes.root();
    let mut elems = Vec::new();
    let mut warnings = effects.warnings;
    let mut path = None;

    // Module level declarations are visible everywhere, even before they are declared
    let decl_idents: Vec<_> = items
        .iter()
        .filter_map(|item| match item {
            RawItem::Decl(decl) => Some(scopes.add_ident(
                root,
                IdentKind::Decl,
                &decl.name,
                1,
                decl.name_span,
            )),
            _ => None,
        })
        .collect();
    let exports_all = !items.iter().any(|item| match item {
        RawItem::Export { .. } => true,
        RawItem::Decl(decl) => decl.export_keyword.is_some(),
        _ => false,
    });

    let mut decl_idents = decl_idents.into_iter();
    let mut pending_export: Option<ExportElem> = None;
    for item in items {
        match item {
            RawItem::Module { path: segments, span } => {
                elems.push(AbstractElem::Module(ModuleElem {
                    span,
                    path: segments.clone(),
                }));
                path = Some(segments);
            }
            RawItem::Import {
                tree,
                dialect,
                span,
            } => elems.push(AbstractElem::Import(ImportElem {
                span,
                tree,
                dialect,
            })),
            RawItem::Export { params, span } => {
                if let Some(unused) = pending_export.take() {
                    warnings.push((unused.span, "#export is not followed by a declaration".into()));
                }
                let export = ExportElem { span, params };
                elems.push(AbstractElem::Export(export.clone()));
                pending_export = Some(export);
            }
            RawItem::Text(span) => elems.push(AbstractElem::Text(TextElem { span })),
            RawItem::Decl(decl) => {
                let Some(ident) = decl_idents.next() else {
                    continue;
                };
                if let Some(span) = decl.export_keyword {
                    elems.push(AbstractElem::Export(ExportElem {
                        span: Span::new(span.start, decl.span.start),
                        params: Vec::new(),
                    }));
                }
                let export = pending_export.take();
                let exported = exports_all || export.is_some() || decl.export_keyword.is_some();
                let params = export.map(|export| export.params).unwrap_or_default();
                add_decl(&mut scopes, &mut elems, decl, ident, exported, params);
            }
        }
    }
    if let Some(unused) = pending_export {
        warnings.push((unused.span, "#export is not followed by a declaration".into()));
    }
    scopes.bind_all();

    debug_assert!(elems.iter().all(|elem| elem.span().end <= text.len()));
    Assembled {
        path,
        elems,
        scopes,
        warnings,
        exports_all,
    }
}

fn add_decl(
    scopes: &mut ScopeTree,
    elems: &mut Vec<AbstractElem>,
    decl: RawDecl,
    ident: scope::IdentId,
    exported: bool,
    params: Vec<String>,
) {
    let body = scopes.push_scope(scopes.root(), ScopeKind::Body);
    let index = elems.len();
    // Replaced once the children are known
    elems.push(AbstractElem::Text(TextElem { span: decl.span }));

    let mut stack = vec![body];
    for event in decl.events.0 {
        let current = *stack.last().unwrap_or(&body);
        match event {
            ScopeEvent::Declare { name, span } => {
                scopes.add_ident(current, IdentKind::Decl, &name, 1, span);
            }
            ScopeEvent::Reference { path, span, kind } => {
                let name = path.last().cloned().unwrap_or_default();
                let ident = scopes.add_ident(current, IdentKind::Ref, &name, path.len(), span);
                let reference = RefElem {
                    kind,
                    path,
                    span,
                    ident,
                };
                elems.push(match kind {
                    RefKind::Call => AbstractElem::Call(reference),
                    RefKind::Type => AbstractElem::TypeRef(reference),
                    RefKind::Value => AbstractElem::ValueRef(reference),
                });
            }
            ScopeEvent::OpenBlock => stack.push(scopes.push_scope(current, ScopeKind::Block)),
            ScopeEvent::CloseBlock => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            ScopeEvent::Member { name, span } => {
                elems.push(AbstractElem::StructMember(MemberElem { name, span }))
            }
        }
    }

    let elem = DeclElem {
        kind: decl.kind,
        name: decl.name,
        ident,
        name_span: decl.name_span,
        span: decl.span,
        scope: body,
        exported,
        params,
        children: index + 1..elems.len(),
    };
    elems[index] = match elem.kind {
        DeclKind::Fn => AbstractElem::Fn(elem),
        DeclKind::Struct => AbstractElem::Struct(elem),
        _ => AbstractElem::Global(elem),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedModule {
        parse_module(text, "test", &ParseOptions::default()).unwrap()
    }

    #[test]
    fn local_declarations_shadow_globals() {
        let module = parse("const x = 1;\nfn f() { let y = x; let x = 2; return x + y; }");
        let refs: Vec<_> = module
            .elems
            .iter()
            .filter_map(|elem| elem.as_reference())
            .map(|reference| module.scopes.is_global(module.scopes.ident(reference.ident).binding.unwrap()))
            .collect();
        assert_eq!(refs, [true, false, false]);
    }

    #[test]
    fn for_header_is_scoped_with_the_body() {
        let module = parse("fn f() { for (var i = 0; i < 4; i++) { g(i); } let j = i; }");
        let bound: Vec<_> = module
            .elems
            .iter()
            .filter_map(|elem| elem.as_reference())
            .map(|reference| {
                (
                    reference.path.join("::"),
                    module.scopes.ident(reference.ident).binding.is_some(),
                )
            })
            .collect();
        assert_eq!(
            bound,
            [
                ("i".to_string(), true),
                ("i".to_string(), true),
                ("g".to_string(), false),
                ("i".to_string(), true),
                ("i".to_string(), false),
            ]
        );
    }

    #[test]
    fn step_limit() {
        let options = ParseOptions {
            max_steps: 10,
            ..Default::default()
        };
        let error = parse_module("fn main() { let a = 1; let b = 2; }", "test", &options)
            .unwrap_err();
        assert!(error.message.contains("step limit"), "{error}");
    }
}
