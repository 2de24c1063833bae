use wesl_linker::parser::{token::TokenKind, tokenize};

fn kinds_and_texts(source: &str) -> Vec<(TokenKind, &str)> {
    tokenize(source)
        .unwrap()
        .into_iter()
        .map(|t| (t.kind, t.text))
        .collect()
}

#[test]
fn floats() {
    let sources = [
        "0x0.0", "0x0.0p1", "0xa.bp0h", "0XA.fp+2", "0x.fp0", "1.5e3f", ".5", "1u", "0.",
    ];
    for source in sources.iter() {
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens.len(), 1, "{source}");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, *source);
    }
}

#[test]
fn tokenizer() {
    use TokenKind::{Number, Symbol, Word};
    let source = "@binding(0) @group(0) var<uniform> frame : u32;
@vertex
fn vtx_main(@builtin(vertex_index) vertex_index : u32) -> @builtin(position) vec4f {
  return vec4f(pos[vertex_index], 0, 1);
}
";
    assert_eq!(
        kinds_and_texts(source),
        [
            (Symbol, "@"),
            (Word, "binding"),
            (Symbol, "("),
            (Number, "0"),
            (Symbol, ")"),
            (Symbol, "@"),
            (Word, "group"),
            (Symbol, "("),
            (Number, "0"),
            (Symbol, ")"),
            (Word, "var"),
            (Symbol, "<"),
            (Word, "uniform"),
            (Symbol, ">"),
            (Word, "frame"),
            (Symbol, ":"),
            (Word, "u32"),
            (Symbol, ";"),
            (Symbol, "@"),
            (Word, "vertex"),
            (Word, "fn"),
            (Word, "vtx_main"),
            (Symbol, "("),
            (Symbol, "@"),
            (Word, "builtin"),
            (Symbol, "("),
            (Word, "vertex_index"),
            (Symbol, ")"),
            (Word, "vertex_index"),
            (Symbol, ":"),
            (Word, "u32"),
            (Symbol, ")"),
            (Symbol, "->"),
            (Symbol, "@"),
            (Word, "builtin"),
            (Symbol, "("),
            (Word, "position"),
            (Symbol, ")"),
            (Word, "vec4f"),
            (Symbol, "{"),
            (Word, "return"),
            (Word, "vec4f"),
            (Symbol, "("),
            (Word, "pos"),
            (Symbol, "["),
            (Word, "vertex_index"),
            (Symbol, "]"),
            (Symbol, ","),
            (Number, "0"),
            (Symbol, ","),
            (Number, "1"),
            (Symbol, ")"),
            (Symbol, ";"),
            (Symbol, "}"),
        ]
    );
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        kinds_and_texts("a /* b /* nested */ c */ d // e\nf"),
        [
            (TokenKind::Word, "a"),
            (TokenKind::Word, "d"),
            (TokenKind::Word, "f")
        ]
    );
}

#[test]
fn paths_and_directives() {
    use TokenKind::{Directive, Symbol, Word};
    assert_eq!(
        kinds_and_texts("#import util::foo"),
        [
            (Directive, "#import"),
            (Word, "util"),
            (Symbol, "::"),
            (Word, "foo")
        ]
    );
}

#[test]
fn unknown_characters() {
    let tokens = tokenize("a $ b").unwrap();
    assert_eq!(tokens[1].kind, TokenKind::Unknown);
    assert_eq!(tokens[1].text, "$");
    assert_eq!(tokens[2].span.start, 4);
}

#[test]
fn unterminated_comment_is_an_error() {
    let error = tokenize("a /* b").unwrap_err();
    assert_eq!(error.line, 1);
}
