use std::collections::HashMap;

use super::slicer::{slice_replace, Slice};
use crate::{
    parser::Span,
    src_map::{SourceId, SrcMap},
    warning::Warning,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditioned {
    pub text: String,
    /// From `text` back to the unprocessed text.
    pub src_map: SrcMap,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, PartialEq, Eq)]
enum Directive<'a> {
    If { name: &'a str, negated: bool },
    Else,
    EndIf,
}

/// Recognizes `#if name`, `#if !name`, `#else` and `#endif` lines, also inside a line comment.
fn directive(line: &str) -> Option<Directive<'_>> {
    let mut rest = line.trim();
    if let Some(comment) = rest.strip_prefix("//") {
        rest = comment.trim_start();
    }
    let rest = rest.strip_prefix('#')?;
    let (word, argument) = match rest.find(char::is_whitespace) {
        Some(end) => (&rest[..end], rest[end..].trim()),
        None => (rest, ""),
    };
    match word {
        "if" => {
            let (negated, name) = match argument.strip_prefix('!') {
                Some(name) => (true, name.trim_start()),
                None => (false, argument),
            };
            Some(Directive::If { name, negated })
        }
        "else" => Some(Directive::Else),
        "endif" => Some(Directive::EndIf),
        _ => None,
    }
}

/// Removes the lines that are disabled by `#if` blocks, and all directive lines.
///
/// Conditions that are missing from `conditions` are false. An `#else` or `#endif` without an
/// `#if` is reported and otherwise ignored.
pub fn process_conditionals(
    text: &str,
    id: &SourceId,
    conditions: &HashMap<String, bool>,
) -> Conditioned {
    // One entry per open `#if`: whether its current branch is enabled, and where it started.
    let mut stack: Vec<(bool, usize)> = Vec::new();
    let mut slices = Vec::new();
    let mut warnings = Vec::new();

    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let span = Span::new(offset, offset + line.len());
        offset = span.end;
        match directive(line) {
            Some(Directive::If { name, negated }) => {
                let value = conditions.get(name).copied().unwrap_or(false);
                stack.push((value != negated, span.start));
                slices.push(Slice::delete(span));
            }
            Some(Directive::Else) => {
                match stack.last_mut() {
                    Some((enabled, _)) => *enabled = !*enabled,
                    None => warnings.push(Warning::new(id, text, span.start, "#else without #if")),
                }
                slices.push(Slice::delete(span));
            }
            Some(Directive::EndIf) => {
                if stack.pop().is_none() {
                    warnings.push(Warning::new(id, text, span.start, "#endif without #if"));
                }
                slices.push(Slice::delete(span));
            }
            None => {
                if !stack.iter().all(|(enabled, _)| *enabled) {
                    slices.push(Slice::delete(span));
                }
            }
        }
    }
    for (_, start) in stack {
        warnings.push(Warning::new(id, text, start, "#if without #endif"));
    }

    let sliced = slice_replace(text, id, &slices, None);
    let mut src_map = sliced.src_map;
    src_map.id = id.derived("conditioned");
    Conditioned {
        text: sliced.text,
        src_map,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, conditions: &[(&str, bool)]) -> Conditioned {
        let conditions = conditions
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        process_conditionals(text, &SourceId::new("test"), &conditions)
    }

    #[test]
    fn recognizes_directives() {
        assert_eq!(
            directive("  // #if !foo\n"),
            Some(Directive::If {
                name: "foo",
                negated: true
            })
        );
        assert_eq!(directive("#endif"), Some(Directive::EndIf));
        assert_eq!(directive("#ifdef foo"), None);
        assert_eq!(directive("let a = 1; // #else"), None);
    }

    #[test]
    fn simple_if() {
        assert_eq!(run("#if foo\nX\n#endif", &[("foo", false)]).text, "");
        assert_eq!(run("#if foo\nX\n#endif", &[("foo", true)]).text, "X\n");
        assert_eq!(run("#if foo\nX\n#endif", &[]).text, "");
    }

    #[test]
    fn nested_levels_are_independent() {
        let text = "a\n#if x\nb\n#if y\nc\n#else\nd\n#endif\ne\n#else\nf\n#endif\ng\n";
        assert_eq!(run(text, &[("x", true), ("y", false)]).text, "a\nb\nd\ne\ng\n");
        assert_eq!(run(text, &[("x", true), ("y", true)]).text, "a\nb\nc\ne\ng\n");
        assert_eq!(run(text, &[("x", false), ("y", true)]).text, "a\nf\ng\n");
    }

    #[test]
    fn unmatched_directives_warn() {
        let result = run("a\n#endif\nb\n#else\nc\n#if z\n", &[]);
        assert_eq!(result.text, "a\nb\nc\n");
        let messages: Vec<_> = result.warnings.iter().map(|w| w.message.as_str()).collect();
        assert_eq!(
            messages,
            ["#endif without #if", "#else without #if", "#if without #endif"]
        );
        assert_eq!(result.warnings[0].line, 2);
    }

    #[test]
    fn map_points_at_the_original_lines() {
        let result = run("#if foo\nfn a() {}\n#endif\nfn b() {}\n", &[("foo", true)]);
        assert_eq!(result.text, "fn a() {}\nfn b() {}\n");
        result.src_map.check_coverage().unwrap();
        let position = result.src_map.dest_to_src(10).unwrap();
        assert_eq!(position.offset, 25);
    }
}
