use proptest::collection;
use test_strategy::proptest;
use wesl_linker::{parser::Span, slice_replace, Slice, SourceId, SrcMap};

/// Clamps random edits to the text and drops the ones that overlap an earlier edit.
fn non_overlapping(text: &str, edits: Vec<(usize, usize, String)>) -> Vec<Slice> {
    let mut edits: Vec<_> = edits
        .into_iter()
        .map(|(start, len, replacement)| {
            let start = start.min(text.len());
            let end = (start + len).min(text.len());
            (start, end, replacement)
        })
        .collect();
    edits.sort_by_key(|(start, end, _)| (*start, *end));
    let mut position = 0;
    let mut slices = Vec::new();
    for (start, end, replacement) in edits {
        if start >= position {
            slices.push(Slice::new(Span::new(start, end), replacement));
            position = end;
        }
    }
    slices
}

/// Lowercase text is only ever copied, so it has to map back to the same character.
fn assert_copies_map_back(map: &SrcMap, original: &str) {
    for (offset, c) in map.dest.char_indices() {
        if c.is_ascii_lowercase() {
            let position = map.dest_to_src(offset).unwrap();
            assert_eq!(original.as_bytes()[position.offset], c as u8, "at {offset}");
        }
    }
}

#[proptest]
fn slicing_covers_the_output(
    #[strategy("[a-z \n]{0,60}")] text: String,
    #[strategy(collection::vec((0usize..64, 0usize..8, "[A-Z]{0,5}"), 0..8))] edits: Vec<(
        usize,
        usize,
        String,
    )>,
) {
    let slices = non_overlapping(&text, edits);
    let sliced = slice_replace(&text, &SourceId::new("text"), &slices, None);
    sliced.src_map.check_coverage().unwrap();
    assert_eq!(sliced.src_map.dest, sliced.text);
    assert_copies_map_back(&sliced.src_map, &text);
}

#[proptest]
fn merged_passes_cover_the_output(
    #[strategy("[a-z \n]{0,60}")] text: String,
    #[strategy(collection::vec((0usize..64, 0usize..8, "[A-Z]{0,5}"), 0..8))] first: Vec<(
        usize,
        usize,
        String,
    )>,
    #[strategy(collection::vec((0usize..64, 0usize..8, "[A-Z]{0,5}"), 0..8))] second: Vec<(
        usize,
        usize,
        String,
    )>,
) {
    let original = SourceId::new("original");
    let first_slices = non_overlapping(&text, first);
    let first_pass = slice_replace(&text, &original, &first_slices, None);
    let second_slices = non_overlapping(&first_pass.text, second);
    let second_pass = slice_replace(
        &first_pass.text,
        &first_pass.src_map.id,
        &second_slices,
        None,
    );

    let merged = first_pass.src_map.merge(&second_pass.src_map);
    merged.check_coverage().unwrap();
    assert_eq!(merged.dest, second_pass.text);
    if !first_pass.text.is_empty() {
        assert!(merged.entries.iter().all(|entry| entry.src == original));
    }
    assert_copies_map_back(&merged, &text);
}

#[proptest]
fn compaction_is_idempotent(
    #[strategy("[a-z]{0,40}")] text: String,
    #[strategy(collection::vec(0usize..40, 0..10))] cuts: Vec<usize>,
) {
    let mut cuts: Vec<usize> = cuts.into_iter().map(|cut| cut.min(text.len())).collect();
    cuts.push(0);
    cuts.push(text.len());
    cuts.sort();
    let id = SourceId::new("text");
    let mut map = SrcMap::new(SourceId::new("out"));
    for pair in cuts.windows(2) {
        map.add_copy(&text, &id, Span::new(pair[0], pair[1]));
    }
    let once = map.compacted();
    assert!(once.entries.len() <= 1);
    assert_eq!(once.clone().compacted(), once);
    once.check_coverage().unwrap();
}

#[test]
fn line_breaks_survive_deletions() {
    let text = "a\nbb\nccc\n";
    let id = SourceId::new("text");
    let sliced = slice_replace(text, &id, &[Slice::delete(Span::new(2, 5))], None);
    assert_eq!(sliced.text, "a\nccc\n");
    assert_eq!(sliced.src_map.dest_to_src(2).unwrap().offset, 5);
    // The end of the text maps to the end of the source
    assert_eq!(sliced.src_map.dest_to_src(6).unwrap().offset, 9);
}
