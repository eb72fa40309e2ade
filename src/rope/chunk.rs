use std::{
    fmt,
    ops::Range,
    sync::{Arc, OnceLock},
};

use unicode_segmentation::{GraphemeCursor, UnicodeSegmentation};

/// Bounded, immutable run of content stored in the leaves of a [`Node`](super::Node).
pub trait Chunk: Clone + PartialEq + fmt::Debug {
    type Element<'a>: Copy + PartialEq + fmt::Debug
    where
        Self: 'a;

    fn empty() -> Self;

    /// Number of elements in the chunk.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `offset`. Callers guarantee `offset < len()`.
    fn element(&self, offset: usize) -> Self::Element<'_>;

    /// Copies the elements in `range` into a new chunk.
    fn slice(&self, range: Range<usize>) -> Self;

    /// Joins `parts` in order and cuts the result into chunks of at most `max_len` elements.
    /// Empty input yields no chunks.
    fn rechunk(parts: &[&Self], max_len: usize) -> Vec<Self>;
}

/// A run of text indexed by extended grapheme cluster.
#[derive(Clone)]
pub struct TextChunk(Arc<TextInner>);

struct TextInner {
    text: Box<str>,
    /// Byte offset of each grapheme start, followed by `text.len()`.
    bounds: Box<[usize]>,
    utf16: OnceLock<Utf16Chunk>,
}

impl TextChunk {
    pub fn new(text: &str) -> Self {
        let bounds = text
            .grapheme_indices(true)
            .map(|(start, _)| start)
            .chain(Some(text.len()))
            .collect();
        Self::from_parts(text.into(), bounds)
    }

    fn from_parts(text: Box<str>, bounds: Box<[usize]>) -> Self {
        Self(Arc::new(TextInner { text, bounds, utf16: OnceLock::new() }))
    }

    /// Splits `text` at grapheme boundaries into chunks of at most `max_len` graphemes.
    pub fn split(text: &str, max_len: usize) -> Vec<Self> {
        let max_len = max_len.max(1);
        let mut chunks = Vec::new();
        let mut start = 0;

        for (count, (offset, _)) in text.grapheme_indices(true).enumerate() {
            if count > 0 && count % max_len == 0 {
                chunks.push(Self::new(&text[start..offset]));
                start = offset;
            }
        }

        if start < text.len() {
            chunks.push(Self::new(&text[start..]));
        }

        chunks
    }

    pub fn as_str(&self) -> &str {
        &self.0.text
    }

    /// UTF-16 re-view of this chunk, encoded on first use and shared by every clone.
    pub fn utf16(&self) -> Utf16Chunk {
        self.0.utf16.get_or_init(|| Utf16Chunk::from(self.as_str())).clone()
    }
}

/// Whether byte offset `at` of `text` starts a new grapheme. Both ends of `text` count.
pub(crate) fn is_grapheme_boundary(text: &str, at: usize) -> bool {
    let mut cursor = GraphemeCursor::new(at, text.len(), true);
    cursor.is_boundary(text, 0).unwrap_or(true)
}

impl Chunk for TextChunk {
    type Element<'a> = &'a str;

    fn empty() -> Self {
        Self::from_parts(Box::default(), Box::new([0]))
    }

    fn len(&self) -> usize {
        self.0.bounds.len() - 1
    }

    fn element(&self, offset: usize) -> Self::Element<'_> {
        let bounds = &self.0.bounds;
        &self.0.text[bounds[offset]..bounds[offset + 1]]
    }

    fn slice(&self, range: Range<usize>) -> Self {
        let bounds = &self.0.bounds[range.start..=range.end];
        let base = bounds[0];
        let text = &self.0.text[base..bounds[bounds.len() - 1]];
        Self::from_parts(text.into(), bounds.iter().map(|bound| bound - base).collect())
    }

    fn rechunk(parts: &[&Self], max_len: usize) -> Vec<Self> {
        let joined: String = parts.iter().map(|part| part.as_str()).collect();
        Self::split(&joined, max_len)
    }
}

impl PartialEq for TextChunk {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TextChunk {}

impl fmt::Debug for TextChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

/// A run of UTF-16 code units.
#[derive(Clone, PartialEq, Eq)]
pub struct Utf16Chunk(Arc<[u16]>);

impl Utf16Chunk {
    pub fn units(&self) -> &[u16] {
        &self.0
    }
}

impl From<&str> for Utf16Chunk {
    fn from(text: &str) -> Self {
        Self(text.encode_utf16().collect())
    }
}

impl Chunk for Utf16Chunk {
    type Element<'a> = u16;

    fn empty() -> Self {
        Self(Arc::new([]))
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn element(&self, offset: usize) -> Self::Element<'_> {
        self.0[offset]
    }

    fn slice(&self, range: Range<usize>) -> Self {
        Self(self.0[range].into())
    }

    fn rechunk(parts: &[&Self], max_len: usize) -> Vec<Self> {
        let joined: Vec<u16> = parts.iter().flat_map(|part| part.units().iter().copied()).collect();
        joined.chunks(max_len.max(1)).map(|units| Self(units.into())).collect()
    }
}

impl fmt::Debug for Utf16Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|unit| format!("{unit:#06x}"))).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_graphemes_not_bytes() {
        let chunk = TextChunk::new("e\u{301}👍🏽x");
        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.element(0), "e\u{301}");
        assert_eq!(chunk.element(1), "👍🏽");
        assert_eq!(chunk.element(2), "x");
    }

    #[test]
    fn grapheme_boundaries_see_both_sides() {
        assert!(is_grapheme_boundary("ab", 1));
        assert!(!is_grapheme_boundary("e\u{301}", 1));
        assert!(!is_grapheme_boundary("😍\u{200d}🐻", 4));
        assert!(!is_grapheme_boundary("\r\n", 1));
        assert!(is_grapheme_boundary("e\u{301}", 0));
        assert!(is_grapheme_boundary("e\u{301}", 3));
    }

    #[test]
    fn split_respects_grapheme_boundaries() {
        let chunks = TextChunk::split("ab😍cde", 2);
        let texts: Vec<_> = chunks.iter().map(TextChunk::as_str).collect();
        assert_eq!(texts, ["ab", "😍c", "de"]);
        assert!(TextChunk::split("", 4).is_empty());
    }

    #[test]
    fn slice_rebases_bounds() {
        let chunk = TextChunk::new("hé😍lo");
        let middle = chunk.slice(1..4);
        assert_eq!(middle.as_str(), "é😍l");
        assert_eq!(middle.len(), 3);
        assert_eq!(middle.element(1), "😍");
        assert!(chunk.slice(2..2).is_empty());
    }

    #[test]
    fn rechunk_joins_parts() {
        let head = TextChunk::new("lu");
        let content = TextChunk::new("un");
        let tail = TextChunk::new("cky");
        let chunks = TextChunk::rechunk(&[&head, &content, &tail], 4);
        let texts: Vec<_> = chunks.iter().map(TextChunk::as_str).collect();
        assert_eq!(texts, ["luun", "cky"]);
    }

    #[test]
    fn utf16_is_cached_across_clones() {
        let chunk = TextChunk::new("a😍");
        let copy = chunk.clone();
        assert_eq!(chunk.utf16().units().to_vec(), vec![0x61u16, 0xd83d, 0xde0d]);
        assert!(Arc::ptr_eq(&chunk.utf16().0, &copy.utf16().0));
    }

    #[test]
    fn utf16_rechunk_cuts_by_units() {
        let chunk = Utf16Chunk::from("abcde");
        let pieces = Utf16Chunk::rechunk(&[&chunk, &Utf16Chunk::from("f")], 4);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].units().to_vec(), vec![b'e' as u16, b'f' as u16]);
        assert_eq!(chunk.slice(1..3).units().to_vec(), vec![b'b' as u16, b'c' as u16]);
    }
}
