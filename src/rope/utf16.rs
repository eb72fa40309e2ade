use std::{fmt, ops::Range, sync::Arc};

use super::{
    chunk::Utf16Chunk,
    geometry::Geometry,
    index::{Iter, RopeIndex},
    node::Node,
};
use crate::error::{Result, RopeError};

/// A read-only window of UTF-16 code units over a rope's content.
///
/// The view owns a UTF-16 copy of the rope's tree topology whose chunks share the per-chunk
/// encodings cached by [`TextChunk::utf16`](super::TextChunk::utf16), so building one is cheap
/// after the first time. Positions are code-unit offsets relative to the start of the view.
#[derive(Clone)]
pub struct Utf16View {
    roots: Arc<[Arc<Node<Utf16Chunk>>]>,
    range: Range<usize>,
    geometry: Geometry,
}

impl Utf16View {
    pub(crate) fn new(roots: Vec<Arc<Node<Utf16Chunk>>>, geometry: Geometry) -> Self {
        let len = roots.iter().map(|root| root.len()).sum();
        Self { roots: roots.into(), range: 0..len, geometry }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Code unit at `at`, relative to the start of the view.
    pub fn get(&self, at: usize) -> Result<u16> {
        if at >= self.len() {
            return Err(RopeError::IndexOutOfRange { index: at, len: self.len() });
        }

        let mut remaining = self.range.start + at;
        for root in self.roots.iter() {
            if remaining < root.len() {
                return root.element_at(remaining, self.geometry);
            }
            remaining -= root.len();
        }

        unreachable!("position {at} inside the view but past every root")
    }

    pub fn start_index(&self) -> RopeIndex<'_, Utf16Chunk> {
        RopeIndex::locate(&self.roots, self.range.start)
    }

    pub fn end_index(&self) -> RopeIndex<'_, Utf16Chunk> {
        RopeIndex::locate(&self.roots, self.range.end)
    }

    /// Sub-view over `range`, relative to this view.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(RopeError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                len: self.len(),
            });
        }

        let base = self.range.start;
        Ok(Self {
            roots: self.roots.clone(),
            range: base + range.start..base + range.end,
            geometry: self.geometry,
        })
    }

    /// Sub-view between two indices obtained from this view.
    pub fn slice_between(
        &self,
        start: &RopeIndex<'_, Utf16Chunk>,
        end: &RopeIndex<'_, Utf16Chunk>,
    ) -> Result<Self> {
        let base = self.range.start;
        let (from, to) = (start.position(), end.position());
        if from < base || to < from || to > self.range.end {
            return Err(RopeError::RangeOutOfBounds {
                start: from.saturating_sub(base),
                end: to.saturating_sub(base),
                len: self.len(),
            });
        }

        self.slice(from - base..to - base)
    }

    pub fn iter(&self) -> Iter<'_, Utf16Chunk> {
        Iter::new(self.start_index(), self.end_index())
    }

    /// Decodes the view back into a string, replacing unpaired surrogates.
    pub fn to_string_lossy(&self) -> String {
        char::decode_utf16(self.iter())
            .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

impl PartialEq for Utf16View {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for Utf16View {}

impl PartialEq<&str> for Utf16View {
    fn eq(&self, other: &&str) -> bool {
        self.iter().eq(other.encode_utf16())
    }
}

impl PartialEq<[u16]> for Utf16View {
    fn eq(&self, other: &[u16]) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter().copied())
    }
}

impl fmt::Debug for Utf16View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|unit| format!("{unit:#06x}"))).finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rope::Rope;

    fn small() -> Geometry {
        Geometry::new(1, 2).unwrap()
    }

    #[test]
    fn counts_code_units() {
        let rope = Rope::from_str_with("bam😍🐻📼", small());
        let view = rope.utf16();
        assert_eq!(rope.len(), 6);
        assert_eq!(view.len(), 9);
        assert_eq!(view.get(3).unwrap(), 0xd83d);
        assert_eq!(view.get(4).unwrap(), 0xde0d);
        assert_eq!(view, "bam😍🐻📼");
        assert!(view.get(9).is_err());
    }

    #[test]
    fn slices_are_relative_to_the_view() {
        let rope = Rope::from_str_with("bam😍🐻📼", small());
        let view = rope.utf16();
        let emoji = view.slice(3..9).unwrap();
        assert_eq!(emoji, "😍🐻📼");

        let bear = emoji.slice(2..4).unwrap();
        assert_eq!(bear, "🐻");
        assert_eq!(bear.get(0).unwrap(), view.get(5).unwrap());
        assert_eq!(bear.to_string_lossy(), "🐻");
        assert!(emoji.slice(4..7).is_err());
    }

    #[test]
    fn slice_between_uses_view_indices() {
        let rope = Rope::from_str_with("abc😍", small());
        let view = rope.utf16();
        let start = view.start_index().successor();
        let end = view.end_index().predecessor();
        let middle = view.slice_between(&start, &end).unwrap();
        assert_eq!(middle.len(), 3);
        assert_eq!(middle.iter().collect::<Vec<_>>(), vec![0x62u16, 0x63, 0xd83d]);
        assert!(view.slice_between(&end, &start).is_err());
    }

    #[test]
    fn follows_edits_across_regions() {
        let rope = Rope::from_str_with("hello", small()).replace_range(1..2, "E").unwrap();
        let rope = rope.insert("😍", 2).unwrap().append(" world");
        assert_eq!(rope.edit_window().as_str(), "E😍");
        let view = rope.utf16();
        assert_eq!(view, "hE😍llo world");
        assert_eq!(view.iter().next_back(), Some(u16::from(b'd')));
        assert_eq!(view.iter().len(), view.len());
    }

    #[test]
    fn empty_view() {
        let view = Rope::empty().utf16();
        assert!(view.is_empty());
        assert_eq!(view, "");
        assert_eq!(format!("{view:?}"), "[]");
    }
}
