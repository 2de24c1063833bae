use std::collections::HashMap;

use super::slicer::{slice_replace, Slice, Sliced};
use crate::{
    parser::{token::TokenKind, tokenize},
    src_map::SourceId,
};

/// Replaces whole identifiers that appear in `table`, lexed like shader code so that comments
/// and number suffixes are left alone. Member names after a `.` are not replaced either.
pub fn replace_words(text: &str, id: &SourceId, table: &HashMap<String, String>) -> Sliced {
    let tokens = match tokenize(text) {
        Ok(tokens) => tokens,
        Err(error) => {
            tracing::warn!(%id, %error, "text to replace words in does not lex, left as it is");
            Vec::new()
        }
    };
    let mut slices = Vec::new();
    let mut after_dot = false;
    for token in tokens {
        if token.kind == TokenKind::Word && !after_dot {
            if let Some(replacement) = table.get(token.text) {
                slices.push(Slice::new(token.span, replacement.clone()));
            }
        }
        after_dot = token.kind == TokenKind::Symbol && token.text == ".";
    }
    slice_replace(text, id, &slices, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_words_only() {
        let table = HashMap::from([("T".to_string(), "f32".to_string())]);
        let replaced = replace_words(
            "fn foo(a: T, b: Tx) -> T { /* T */ return a.T + T(1u); } // T",
            &SourceId::new("a"),
            &table,
        );
        assert_eq!(
            replaced.text,
            "fn foo(a: f32, b: Tx) -> f32 { /* T */ return a.T + f32(1u); } // T"
        );
        replaced.src_map.check_coverage().unwrap();
    }
}
