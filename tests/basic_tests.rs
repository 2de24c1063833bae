use wesl_linker::{
    parse_module,
    parser::{
        import_tree::ImportTree,
        parser_output::{AbstractElem, DeclKind, ImportDialect, RefKind},
    },
    ModulePath, ParseOptions, ParsedModule,
};

fn parse(text: &str) -> ParsedModule {
    parse_module(text, "test.wgsl", &ParseOptions::default()).unwrap()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[test]
fn declarations() {
    let module = parse(
        "struct Light { color: vec3f, @size(16) intensity: f32 }
var<uniform> light: Light;
const scale = 2.0;
override count: u32;
alias Color = vec3f;
fn shade(normal: vec3f) -> Color { return light.color * scale; }
",
    );
    let decls: Vec<_> = module
        .decls()
        .map(|(_, decl)| (decl.kind, decl.name.as_str()))
        .collect();
    assert_eq!(
        decls,
        [
            (DeclKind::Struct, "Light"),
            (DeclKind::Var, "light"),
            (DeclKind::Const, "scale"),
            (DeclKind::Override, "count"),
            (DeclKind::Alias, "Color"),
            (DeclKind::Fn, "shade"),
        ]
    );
    assert!(module.exports_all);
    assert_eq!(module.exports().count(), 6);

    let (_, shade) = module.find_decl("shade").unwrap();
    let references: Vec<_> = module
        .references(shade)
        .map(|reference| {
            let bound = module.scopes.ident(reference.ident).binding.is_some();
            (reference.path.join("::"), reference.kind, bound)
        })
        .collect();
    assert_eq!(
        references,
        [
            ("vec3f".to_string(), RefKind::Type, false),
            ("Color".to_string(), RefKind::Type, true),
            ("light".to_string(), RefKind::Value, true),
            ("scale".to_string(), RefKind::Value, true),
        ]
    );
}

#[test]
fn struct_members() {
    let module = parse("struct A { @align(16) a: B, b: array<C, 4>, }");
    let members: Vec<_> = module
        .elems
        .iter()
        .filter_map(|elem| match elem {
            AbstractElem::StructMember(member) => Some(member.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(members, ["a", "b"]);
    let (_, decl) = module.find_decl("A").unwrap();
    let types: Vec<_> = module
        .references(decl)
        .map(|reference| reference.path.join("::"))
        .collect();
    assert_eq!(types, ["B", "array", "C"]);
}

#[test]
fn calls_with_module_paths() {
    let module = parse("fn main() { util::foo(); bar.baz(1); let v = a.b; }");
    let references: Vec<_> = module
        .elems
        .iter()
        .filter_map(|elem| elem.as_reference())
        .map(|reference| (reference.path.clone(), reference.kind))
        .collect();
    assert_eq!(
        references,
        [
            (strings(&["util", "foo"]), RefKind::Call),
            (strings(&["bar", "baz"]), RefKind::Call),
            (strings(&["a"]), RefKind::Value),
        ]
    );
}

#[test]
fn both_import_dialects_agree() {
    let directive = parse("#import foo as bar from util\n");
    let tree = parse("import util/foo as bar;\n");
    assert_eq!(directive.import_trees().next(), tree.import_trees().next());
    assert_eq!(
        tree.import_trees().next(),
        Some(&ImportTree::Path {
            prefix: strings(&["util"]),
            tail: Box::new(ImportTree::Simple {
                name: "foo".to_string(),
                alias: Some("bar".to_string()),
                args: None,
            }),
        })
    );
    assert_eq!(
        directive.imports().next().map(|import| import.dialect),
        Some(ImportDialect::Directive)
    );
}

#[test]
fn import_tree_leaves() {
    let module = parse("import a/b/{c, d as e,\n  f/*};\nfn main() {}");
    let leaves: Vec<_> = module
        .import_leaves()
        .map(|(_, leaf)| (leaf.path.join("/"), leaf.alias, leaf.wildcard))
        .collect();
    assert_eq!(
        leaves,
        [
            ("a/b/c".to_string(), None, false),
            ("a/b/d".to_string(), Some("e".to_string()), false),
            ("a/b/f".to_string(), None, true),
        ]
    );
    assert!(module.find_decl("main").is_some());
}

#[test]
fn relative_and_generator_imports() {
    let module = parse("#import rand(f32, 4) from ../gen\nimport ./util::{x};\n");
    let leaves: Vec<_> = module.import_leaves().map(|(_, leaf)| leaf).collect();
    assert_eq!(leaves[0].path, strings(&["..", "gen", "rand"]));
    assert_eq!(leaves[0].args, Some(strings(&["f32", "4"])));
    assert_eq!(leaves[1].path, strings(&[".", "util", "x"]));
}

#[test]
fn export_markers() {
    let module = parse("#export\nfn a() {}\nfn b() {}\nexport fn c() {}");
    assert!(!module.exports_all);
    let exported: Vec<_> = module
        .exports()
        .map(|(_, decl)| decl.name.as_str())
        .collect();
    assert_eq!(exported, ["a", "c"]);

    let generic = parse("#export(T)\nfn id(x: T) -> T { return x; }");
    let (_, id) = generic.find_export("id").unwrap();
    assert_eq!(id.params, strings(&["T"]));
}

#[test]
fn export_on_the_declaration_line() {
    let module = parse("#export fn foo() {}\nfn bar() {}\n#export(T) fn id(x: T) -> T { return x; }");
    let decls: Vec<_> = module
        .decls()
        .map(|(_, decl)| (decl.name.as_str(), decl.exported))
        .collect();
    assert_eq!(decls, [("foo", true), ("bar", false), ("id", true)]);
    let (_, id) = module.find_export("id").unwrap();
    assert_eq!(id.params, strings(&["T"]));
    assert!(module.warnings.is_empty());
}

#[test]
fn module_directive() {
    let module = parse("module pkg.math\nfn add() {}");
    assert_eq!(module.path, ModulePath::from_slice(&["pkg", "math"]));
    let module = parse("#module lib/shapes\n");
    assert_eq!(module.path.to_string(), "lib/shapes");
    let module = parse("fn a() {}");
    assert_eq!(module.path, ModulePath::from_slice(&["test"]));
}

#[test]
fn global_directives_are_text() {
    let module = parse("enable f16;\nconst_assert 1 < 2;\nfn a() {}");
    let texts = module
        .elems
        .iter()
        .filter(|elem| matches!(elem, AbstractElem::Text(_)))
        .count();
    assert_eq!(texts, 2);
}

#[test]
fn conditions_apply_before_parsing() {
    let text = "#if big\nconst size = 64;\n#else\nconst size = 8;\n#endif\nfn f() {}";
    let options = ParseOptions::default().with_condition("big", true);
    let module = parse_module(text, "test", &options).unwrap();
    assert_eq!(module.decls().count(), 2);
    let (_, size) = module.find_decl("size").unwrap();
    assert_eq!(size.span.text(&module.text), "const size = 64;");
    // Spans point into the preprocessed text, the map leads back to the source
    assert_eq!(module.source_offset(size.span.start), 8);
}

#[test]
fn errors_point_at_the_source() {
    let error = parse_module("fn a() {}\nstruct {", "broken.wgsl", &ParseOptions::default())
        .unwrap_err();
    assert_eq!(error.module, "broken.wgsl");
    assert_eq!((error.line, error.column), (2, 8));
    assert_eq!(error.message, "expected struct name");
    assert_eq!(error.excerpt, "{");
}

#[test]
fn errors_skip_removed_lines() {
    let text = "#if never\nconst a = 1;\n#endif\nfn (";
    let error = parse_module(text, "test", &ParseOptions::default()).unwrap_err();
    assert_eq!(error.line, 4);
}

#[test]
fn unknown_tokens_warn() {
    let module = parse("fn a() {}\n$\nfn b() {}");
    assert_eq!(module.decls().count(), 2);
    assert_eq!(module.warnings.len(), 1);
    assert_eq!(module.warnings[0].line, 2);
}
