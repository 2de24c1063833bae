//! Fragment level correspondence between source texts and one destination text.
//!
//! Every rewriting pass produces a [`SrcMap`] from its input to its output. Passes are chained by
//! [`SrcMap::merge`], so the final map always points back at the text the user wrote.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::parser::Span;

/// Names a text that a [`SrcMap`] can point into: a module file, an intermediate text, or a
/// generator's output.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names the output of a pass over this text, like `util.wgsl#conditioned`.
    pub fn derived(&self, pass: &str) -> Self {
        Self::new(format!("{}#{pass}", self.0))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcMapEntry {
    pub src: SourceId,
    pub src_span: Span,
    pub dest_span: Span,
}

impl SrcMapEntry {
    /// A copy entry maps byte for byte. Everything else is a replacement and only maps as a whole.
    pub fn is_copy(&self) -> bool {
        self.src_span.len() == self.dest_span.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcPosition {
    pub src: SourceId,
    pub offset: usize,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SrcMapError {
    #[error("destination bytes {start}..{end} are not covered by any entry")]
    Gap { start: usize, end: usize },
    #[error("entries overlap at destination byte {at}")]
    Overlap { at: usize },
    #[error("entries cover {covered} bytes past the destination length {len}")]
    Overrun { covered: usize, len: usize },
}

/// A map from one destination text back to the source texts it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcMap {
    /// The identity of the destination text, so that a later pass can refer to it as its source.
    pub id: SourceId,
    pub dest: String,
    pub entries: Vec<SrcMapEntry>,
}

impl SrcMap {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            dest: String::new(),
            entries: Vec::new(),
        }
    }

    /// A map where the destination is an unchanged copy of `text`.
    pub fn identity(id: SourceId, src: &SourceId, text: &str) -> Self {
        let mut map = Self::new(id);
        map.add_copy(text, src, Span::new(0, text.len()));
        map
    }

    /// Appends `fragment` to the destination, attributing it to `src_start..src_end` of `src`.
    pub fn add(&mut self, fragment: &str, src: &SourceId, src_start: usize, src_end: usize) {
        let dest_start = self.dest.len();
        self.dest.push_str(fragment);
        self.entries.push(SrcMapEntry {
            src: src.clone(),
            src_span: Span::new(src_start, src_end),
            dest_span: Span::new(dest_start, self.dest.len()),
        });
    }

    /// Appends `span` of `src_text` unchanged.
    pub fn add_copy(&mut self, src_text: &str, src: &SourceId, span: Span) {
        self.add(span.text(src_text), src, span.start, span.end);
    }

    /// Concatenates another map's destination and entries onto this one.
    pub fn append(&mut self, other: &SrcMap) {
        let shift = self.dest.len();
        self.dest.push_str(&other.dest);
        self.entries
            .extend(other.entries.iter().map(|entry| SrcMapEntry {
                src: entry.src.clone(),
                src_span: entry.src_span,
                dest_span: Span::new(entry.dest_span.start + shift, entry.dest_span.end + shift),
            }));
    }

    /// Sorts the entries, drops empty destination ranges and joins neighbouring copies of
    /// contiguous source text.
    pub fn compact(&mut self) {
        self.entries.retain(|entry| !entry.dest_span.is_empty());
        self.entries.sort_by_key(|entry| entry.dest_span.start);

        let mut compacted: Vec<SrcMapEntry> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            match compacted.last_mut() {
                Some(prev)
                    if prev.src == entry.src
                        && prev.is_copy()
                        && entry.is_copy()
                        && prev.src_span.end == entry.src_span.start
                        && prev.dest_span.end == entry.dest_span.start =>
                {
                    prev.src_span.end = entry.src_span.end;
                    prev.dest_span.end = entry.dest_span.end;
                }
                _ => compacted.push(entry),
            }
        }
        self.entries = compacted;
    }

    pub fn compacted(mut self) -> Self {
        self.compact();
        self
    }

    /// Composes this map with a map that used this map's destination as one of its sources.
    ///
    /// The result maps `outer`'s destination back to this map's sources. Entries of `outer` that
    /// point at other sources are kept as they are.
    ///
    /// # Panics
    /// When `outer` refers to positions that this map does not cover.
    pub fn merge(&self, outer: &SrcMap) -> SrcMap {
        let inner = self.clone().compacted();
        let mut merged = SrcMap {
            id: outer.id.clone(),
            dest: outer.dest.clone(),
            entries: Vec::with_capacity(outer.entries.len()),
        };

        for entry in &outer.entries {
            if entry.src != inner.id {
                merged.entries.push(entry.clone());
            } else if entry.is_copy() && !entry.src_span.is_empty() {
                inner.split_copy(entry, &mut merged.entries);
            } else {
                let start = inner.map_start(entry.src_span.start);
                let end = if entry.src_span.is_empty() {
                    start.clone()
                } else {
                    inner.map_end(entry.src_span.end)
                };
                assert_eq!(
                    start.src, end.src,
                    "source map merge: replacement {:?} spans multiple sources",
                    entry.dest_span
                );
                merged.entries.push(SrcMapEntry {
                    src: start.src,
                    src_span: Span::new(start.offset, end.offset.max(start.offset)),
                    dest_span: entry.dest_span,
                });
            }
        }
        merged.compact();
        merged
    }

    /// Maps a copy entry of an outer map piece by piece through this map's entries.
    fn split_copy(&self, outer: &SrcMapEntry, out: &mut Vec<SrcMapEntry>) {
        let mut pos = outer.src_span.start;
        while pos < outer.src_span.end {
            let inner = self.entry_containing(pos).unwrap_or_else(|| {
                panic!(
                    "source map merge: position {pos} of {} is not covered",
                    self.id
                )
            });
            let piece_end = inner.dest_span.end.min(outer.src_span.end);
            let dest_start = outer.dest_span.start + (pos - outer.src_span.start);
            let dest_span = Span::new(dest_start, dest_start + (piece_end - pos));
            let src_span = if inner.is_copy() {
                let src_start = inner.src_span.start + (pos - inner.dest_span.start);
                Span::new(src_start, src_start + (piece_end - pos))
            } else {
                inner.src_span
            };
            out.push(SrcMapEntry {
                src: inner.src.clone(),
                src_span,
                dest_span,
            });
            pos = piece_end;
        }
    }

    fn entry_containing(&self, pos: usize) -> Option<&SrcMapEntry> {
        let index = self
            .entries
            .partition_point(|entry| entry.dest_span.end <= pos);
        self.entries
            .get(index)
            .filter(|entry| entry.dest_span.start <= pos)
    }

    fn entry_ending_at_or_after(&self, pos: usize) -> Option<&SrcMapEntry> {
        let index = self
            .entries
            .partition_point(|entry| entry.dest_span.end < pos);
        self.entries
            .get(index)
            .filter(|entry| entry.dest_span.start < pos || pos == 0)
    }

    fn map_start(&self, pos: usize) -> SrcPosition {
        match self.entry_containing(pos) {
            Some(entry) => point_in(entry, pos, entry.src_span.start),
            // The end of the text maps to the end of the last entry
            None => self.map_end(pos),
        }
    }

    fn map_end(&self, pos: usize) -> SrcPosition {
        if self.dest.is_empty() && self.entries.is_empty() {
            // An insertion into an empty text has nothing else to point at
            return SrcPosition {
                src: self.id.clone(),
                offset: 0,
            };
        }
        let entry = self.entry_ending_at_or_after(pos).unwrap_or_else(|| {
            panic!(
                "source map merge: position {pos} of {} is not covered",
                self.id
            )
        });
        point_in(entry, pos, entry.src_span.end)
    }

    /// Finds where a destination position came from.
    pub fn dest_to_src(&self, pos: usize) -> Option<SrcPosition> {
        let entry = self.entry_containing(pos).or_else(|| {
            self.entries
                .last()
                .filter(|entry| pos == entry.dest_span.end)
        })?;
        Some(point_in(entry, pos, entry.src_span.start))
    }

    /// Checks that the entries partition the destination text, in order, without gaps.
    pub fn check_coverage(&self) -> Result<(), SrcMapError> {
        let mut covered = 0;
        for entry in self.entries.iter().filter(|e| !e.dest_span.is_empty()) {
            if entry.dest_span.start > covered {
                return Err(SrcMapError::Gap {
                    start: covered,
                    end: entry.dest_span.start,
                });
            } else if entry.dest_span.start < covered {
                return Err(SrcMapError::Overlap {
                    at: entry.dest_span.start,
                });
            }
            covered = entry.dest_span.end;
        }
        if covered < self.dest.len() {
            Err(SrcMapError::Gap {
                start: covered,
                end: self.dest.len(),
            })
        } else if covered > self.dest.len() {
            Err(SrcMapError::Overrun {
                covered,
                len: self.dest.len(),
            })
        } else {
            Ok(())
        }
    }
}

fn point_in(entry: &SrcMapEntry, pos: usize, fallback: usize) -> SrcPosition {
    let offset = if entry.is_copy() {
        entry.src_span.start + (pos - entry.dest_span.start)
    } else {
        fallback
    };
    SrcPosition {
        src: entry.src.clone(),
        offset,
    }
}

/// 1-based line and column (in characters) of a byte offset.
pub fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = &text[..floor_char_boundary(text, offset)];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

fn floor_char_boundary(text: &str, mut offset: usize) -> usize {
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> SourceId {
        SourceId::new(name)
    }

    #[test]
    fn compact_joins_copies() {
        let src = "fn main() {}";
        let mut map = SrcMap::new(id("out"));
        map.add_copy(src, &id("a"), Span::new(0, 3));
        map.add_copy(src, &id("a"), Span::new(3, 9));
        map.add_copy(src, &id("a"), Span::new(9, 12));
        map.compact();
        assert_eq!(map.entries.len(), 1);
        assert_eq!(map.entries[0].src_span, Span::new(0, 12));
        assert_eq!(map.dest, src);
    }

    #[test]
    fn compact_keeps_replacements_apart() {
        let mut map = SrcMap::new(id("out"));
        map.add("fn ", &id("a"), 0, 3);
        map.add("foo0", &id("a"), 3, 6);
        map.add("()", &id("a"), 6, 8);
        map.compact();
        assert_eq!(map.entries.len(), 3);
        map.check_coverage().unwrap();
    }

    #[test]
    fn merge_follows_both_passes() {
        // "a\nbcd" -> "bcd" -> "xbcd"
        let original = "a\nbcd";
        let mut first = SrcMap::new(id("first"));
        first.add("", &id("orig"), 0, 2);
        first.add_copy(original, &id("orig"), Span::new(2, 5));

        let mut second = SrcMap::new(id("second"));
        second.add("x", &id("first"), 0, 0);
        second.add_copy(&first.dest.clone(), &id("first"), Span::new(0, 3));

        let merged = first.merge(&second);
        assert_eq!(merged.dest, "xbcd");
        merged.check_coverage().unwrap();
        let pos = merged.dest_to_src(2).unwrap();
        assert_eq!(pos.src, id("orig"));
        assert_eq!(pos.offset, 3);
    }

    #[test]
    fn merge_keeps_foreign_entries() {
        let inner = SrcMap::identity(id("pre"), &id("orig"), "abc");
        let mut outer = SrcMap::new(id("out"));
        outer.add("gen", &id("generator"), 0, 3);
        outer.add_copy("abc", &id("pre"), Span::new(0, 3));
        let merged = inner.merge(&outer);
        assert_eq!(merged.entries[0].src, id("generator"));
        assert_eq!(merged.entries[1].src, id("orig"));
    }

    #[test]
    fn coverage_reports_gaps() {
        let mut map = SrcMap::new(id("out"));
        map.add("ab", &id("a"), 0, 2);
        map.dest.push('c');
        assert_eq!(
            map.check_coverage(),
            Err(SrcMapError::Gap { start: 2, end: 3 })
        );
    }

    #[test]
    fn line_columns() {
        let text = "ab\ncd\n\nef";
        assert_eq!(line_column(text, 0), (1, 1));
        assert_eq!(line_column(text, 4), (2, 2));
        assert_eq!(line_column(text, 7), (4, 1));
    }
}
