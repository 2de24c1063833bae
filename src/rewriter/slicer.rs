use crate::{
    parser::Span,
    src_map::{SourceId, SrcMap},
};

/// Replaces `span` of the input with `replacement`. An empty replacement deletes, an empty span
/// inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub span: Span,
    pub replacement: String,
}

impl Slice {
    pub fn new(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    pub fn delete(span: Span) -> Self {
        Self::new(span, "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sliced {
    pub text: String,
    /// From `text` back to the input.
    pub src_map: SrcMap,
}

/// Applies non-overlapping replacements to `text`, which is named `id` in the resulting map.
///
/// `bounds` restricts the output to a part of the input. Slices outside of it are ignored.
///
/// # Panics
/// When two slices overlap.
pub fn slice_replace(text: &str, id: &SourceId, slices: &[Slice], bounds: Option<Span>) -> Sliced {
    let bounds = bounds.unwrap_or(Span::new(0, text.len()));
    let mut sorted: Vec<&Slice> = slices
        .iter()
        .filter(|slice| bounds.contains(&slice.span))
        .collect();
    sorted.sort_by_key(|slice| (slice.span.start, slice.span.end));

    let mut src_map = SrcMap::new(id.derived("sliced"));
    let mut position = bounds.start;
    for slice in sorted {
        assert!(
            slice.span.start >= position,
            "slice {:?} overlaps the previous one",
            slice.span
        );
        src_map.add_copy(text, id, Span::new(position, slice.span.start));
        src_map.add(&slice.replacement, id, slice.span.start, slice.span.end);
        position = slice.span.end;
    }
    src_map.add_copy(text, id, Span::new(position, bounds.end));
    src_map.compact();

    Sliced {
        text: src_map.dest.clone(),
        src_map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_in_any_order() {
        let id = SourceId::new("a");
        let text = "fn foo() { bar(); }";
        let sliced = slice_replace(
            text,
            &id,
            &[
                Slice::new(Span::new(11, 14), "bar0"),
                Slice::new(Span::new(3, 6), "foo1"),
            ],
            None,
        );
        assert_eq!(sliced.text, "fn foo1() { bar0(); }");
        sliced.src_map.check_coverage().unwrap();
        assert_eq!(sliced.src_map.dest_to_src(13).unwrap().offset, 11);
        assert_eq!(sliced.src_map.dest_to_src(9).unwrap().offset, 8);
    }

    #[test]
    fn bounds_drop_the_outside() {
        let id = SourceId::new("a");
        let text = "const a = 1;\nconst b = a;\n";
        let sliced = slice_replace(
            text,
            &id,
            &[
                Slice::new(Span::new(6, 7), "x"),
                Slice::new(Span::new(23, 24), "a0"),
            ],
            Some(Span::new(13, 25)),
        );
        assert_eq!(sliced.text, "const b = a0;");
        assert_eq!(sliced.src_map.dest_to_src(0).unwrap().offset, 13);
    }

    #[test]
    fn no_slices_is_one_entry() {
        let id = SourceId::new("a");
        let sliced = slice_replace("fn main() {}", &id, &[], None);
        assert_eq!(sliced.src_map.entries.len(), 1);
    }
}
