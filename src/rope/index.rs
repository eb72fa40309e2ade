use std::{cmp::Ordering, fmt, sync::Arc};

use smallvec::SmallVec;

use super::{chunk::Chunk, node::Node};
use crate::error::{Result, RopeError};

type Path<'a, C> = SmallVec<[(&'a Node<C>, usize); 8]>;

/// A position in a forest of rope trees, remembered as the path of `(node, slot)` pairs from
/// the root down to the chunk holding the element. Moving to a neighbour only walks as far up
/// the path as needed.
///
/// The end position has no chunk and no path.
pub struct RopeIndex<'a, C: Chunk> {
    roots: &'a [Arc<Node<C>>],
    root: usize,
    path: Path<'a, C>,
    chunk: Option<&'a C>,
    offset: usize,
    position: usize,
}

impl<'a, C: Chunk> RopeIndex<'a, C> {
    pub(crate) fn start(roots: &'a [Arc<Node<C>>]) -> Self {
        Self::locate(roots, 0)
    }

    pub(crate) fn end(roots: &'a [Arc<Node<C>>]) -> Self {
        let len = roots.iter().map(|root| root.len()).sum();
        Self { roots, root: roots.len(), path: Path::new(), chunk: None, offset: 0, position: len }
    }

    /// The index of element `position`, or the end index when `position == len`.
    pub(crate) fn at(roots: &'a [Arc<Node<C>>], position: usize) -> Result<Self> {
        let len = roots.iter().map(|root| root.len()).sum();
        if position > len {
            return Err(RopeError::IndexOutOfRange { index: position, len });
        }

        Ok(Self::locate(roots, position))
    }

    /// Like [`RopeIndex::at`], clamping anything past the last element to the end index.
    pub(crate) fn locate(roots: &'a [Arc<Node<C>>], position: usize) -> Self {
        let mut before = 0;
        for (slot, root) in roots.iter().enumerate() {
            if before + root.len() > position {
                let mut index = Self {
                    roots,
                    root: slot,
                    path: Path::new(),
                    chunk: None,
                    offset: 0,
                    position,
                };
                index.descend(root, position - before);
                return index;
            }
            before += root.len();
        }

        Self::end(roots)
    }

    fn descend(&mut self, mut node: &'a Node<C>, mut remaining: usize) {
        loop {
            let mut slot = 0;
            while remaining >= node.slot_len(slot) {
                remaining -= node.slot_len(slot);
                slot += 1;
            }

            self.path.push((node, slot));
            match node.child(slot) {
                Some(child) => node = child,
                None => {
                    self.chunk = Some(&node.chunks()[slot]);
                    self.offset = remaining;
                    return;
                }
            }
        }
    }

    /// Enters `slot` of `node` and walks down to its first (or last) element, skipping empty
    /// chunks and subtrees.
    fn enter(&mut self, mut node: &'a Node<C>, mut slot: usize, from_back: bool) {
        loop {
            self.path.push((node, slot));
            match node.child(slot) {
                Some(child) => {
                    let next = if from_back { child.last_filled() } else { child.first_filled() };
                    let Some(next) = next else {
                        unreachable!("non-empty subtree without a non-empty slot");
                    };
                    node = child;
                    slot = next;
                }
                None => {
                    let chunk = &node.chunks()[slot];
                    self.chunk = Some(chunk);
                    self.offset = if from_back { chunk.len() - 1 } else { 0 };
                    return;
                }
            }
        }
    }

    /// The element under the index; `None` only at the end.
    pub fn value(&self) -> Option<C::Element<'a>> {
        self.chunk.map(|chunk| chunk.element(self.offset))
    }

    /// Absolute element position.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_end(&self) -> bool {
        self.chunk.is_none()
    }

    pub fn successor(&self) -> Self {
        let mut next = self.clone();
        next.advance();
        next
    }

    pub fn predecessor(&self) -> Self {
        let mut previous = self.clone();
        previous.retreat();
        previous
    }

    /// Moves to the next element, or to the end index after the last one.
    ///
    /// # Panics
    ///
    /// Panics when called on the end index.
    pub fn advance(&mut self) {
        let Some(chunk) = self.chunk else {
            panic!("cannot advance past the end of a rope");
        };

        self.position += 1;
        if self.offset + 1 < chunk.len() {
            self.offset += 1;
            return;
        }

        while let Some((node, slot)) = self.path.pop() {
            let next = (slot + 1..node.slot_count()).find(|&next| node.slot_len(next) > 0);
            if let Some(next) = next {
                self.enter(node, next, false);
                return;
            }
        }

        let roots = self.roots;
        if let Some(root) = (self.root + 1..roots.len()).find(|&root| !roots[root].is_empty()) {
            self.root = root;
            if let Some(slot) = roots[root].first_filled() {
                self.enter(&roots[root], slot, false);
                return;
            }
        }

        self.root = roots.len();
        self.chunk = None;
        self.offset = 0;
    }

    /// Moves to the previous element. From the end index this is the last element.
    ///
    /// # Panics
    ///
    /// Panics when called on the first element (or on the end index of an empty rope).
    pub fn retreat(&mut self) {
        if self.chunk.is_some() && self.offset > 0 {
            self.offset -= 1;
            self.position -= 1;
            return;
        }

        self.position = self
            .position
            .checked_sub(1)
            .expect("cannot retreat before the start of a rope");

        while let Some((node, slot)) = self.path.pop() {
            if let Some(previous) = (0..slot).rev().find(|&previous| node.slot_len(previous) > 0) {
                self.enter(node, previous, true);
                return;
            }
        }

        let roots = self.roots;
        let Some(root) = (0..self.root).rev().find(|&root| !roots[root].is_empty()) else {
            panic!("cannot retreat before the start of a rope");
        };
        self.root = root;
        if let Some(slot) = roots[root].last_filled() {
            self.enter(&roots[root], slot, true);
        }
    }
}

impl<C: Chunk> Clone for RopeIndex<'_, C> {
    fn clone(&self) -> Self {
        Self {
            roots: self.roots,
            root: self.root,
            path: self.path.clone(),
            chunk: self.chunk,
            offset: self.offset,
            position: self.position,
        }
    }
}

/// Two indices are equal when they sit at the same position over equal chunk content at the
/// same offset; node identity does not matter. Position is part of equality so that `==` agrees
/// with `PartialOrd`: repeated chunks would otherwise make distinct positions compare equal.
impl<C: Chunk> PartialEq for RopeIndex<'_, C> {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.offset == other.offset && self.chunk == other.chunk
    }
}

impl<C: Chunk> PartialOrd for RopeIndex<'_, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.position.cmp(&other.position) {
            Ordering::Equal if self != other => None,
            ordering => Some(ordering),
        }
    }
}

impl<C: Chunk> fmt::Debug for RopeIndex<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RopeIndex")
            .field("position", &self.position)
            .field("depth", &self.path.len())
            .field("chunk", &self.chunk)
            .field("offset", &self.offset)
            .finish()
    }
}

/// Double-ended iterator over the elements between two indices.
pub struct Iter<'a, C: Chunk> {
    front: RopeIndex<'a, C>,
    back: RopeIndex<'a, C>,
}

impl<'a, C: Chunk> Iter<'a, C> {
    pub(crate) fn new(front: RopeIndex<'a, C>, back: RopeIndex<'a, C>) -> Self {
        Self { front, back }
    }

    fn remaining(&self) -> usize {
        self.back.position.saturating_sub(self.front.position)
    }
}

impl<'a, C: Chunk> Iterator for Iter<'a, C> {
    type Item = C::Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining() == 0 {
            return None;
        }

        let value = self.front.value();
        self.front.advance();
        value
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl<C: Chunk> DoubleEndedIterator for Iter<'_, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining() == 0 {
            return None;
        }

        self.back.retreat();
        self.back.value()
    }
}

impl<C: Chunk> ExactSizeIterator for Iter<'_, C> {}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rope::{chunk::TextChunk, geometry::Geometry};

    fn forest(parts: &[&[&str]]) -> Vec<Arc<Node<TextChunk>>> {
        let geometry = Geometry::new(1, 2).unwrap();
        parts
            .iter()
            .map(|chunks| {
                let chunks = chunks.iter().map(|text| TextChunk::new(text)).collect();
                Node::from_chunks(chunks, geometry)
            })
            .collect()
    }

    fn collect(roots: &[Arc<Node<TextChunk>>]) -> String {
        let mut out = String::new();
        let mut index = RopeIndex::start(roots);
        while let Some(value) = index.value() {
            out.push_str(value);
            index.advance();
        }
        assert_eq!(index, RopeIndex::end(roots));
        out
    }

    #[test]
    fn walks_across_roots_and_skips_empty_chunks() {
        let roots = forest(&[&["ab", "", "c", ""], &[""], &[], &["", "de", "", "", "f"]]);
        assert_eq!(collect(&roots), "abcdef");
    }

    #[test]
    fn walks_backwards_from_the_end() {
        let roots = forest(&[&["ab", ""], &["", "c"], &["d", "", "ef"]]);
        let mut index = RopeIndex::end(&roots);
        let mut out = Vec::new();
        while index.position() > 0 {
            index.retreat();
            out.push(index.value().unwrap());
        }
        assert_eq!(out, ["f", "e", "d", "c", "b", "a"]);
        assert_eq!(index, RopeIndex::start(&roots));
    }

    #[test]
    fn at_matches_repeated_successors() {
        let roots = forest(&[&["abcd", "efgh", "ij"], &["k"], &["lmno", "p"]]);
        let mut walked = RopeIndex::start(&roots);
        for position in 0..16 {
            let located = RopeIndex::at(&roots, position).unwrap();
            assert_eq!(located, walked);
            assert_eq!(located.position(), position);
            walked = walked.successor();
        }
        assert!(walked.is_end());
        assert_eq!(RopeIndex::at(&roots, 16).unwrap(), walked);
        assert!(RopeIndex::at(&roots, 17).is_err());
    }

    #[test]
    fn empty_forest_start_is_end() {
        let roots = forest(&[&[], &[""], &[]]);
        assert!(RopeIndex::start(&roots).is_end());
        assert_eq!(RopeIndex::start(&roots), RopeIndex::end(&roots));
    }

    #[test]
    fn orders_by_position() {
        let other = forest(&[&["xyz"]]);
        let roots = forest(&[&["abab"]]);
        let first = RopeIndex::at(&roots, 0).unwrap();
        let third = RopeIndex::at(&roots, 2).unwrap();
        assert!(first < third);
        assert!(third.successor() > third);
        assert_ne!(first, third);
        assert_eq!(first.partial_cmp(&first.clone()), Some(Ordering::Equal));

        assert_eq!(first.partial_cmp(&RopeIndex::at(&other, 0).unwrap()), None);
    }

    #[test]
    fn repeated_chunks_at_different_positions_are_unequal() {
        let roots = forest(&[&["ab", "ab"]]);
        let first = RopeIndex::at(&roots, 0).unwrap();
        let third = RopeIndex::at(&roots, 2).unwrap();
        assert_eq!(first.value(), third.value());
        assert_ne!(first, third);
        assert!(first < third);
    }

    #[test]
    fn iterates_from_both_ends() {
        let roots = forest(&[&["ab", "c"], &["", "de"]]);
        let mut iter = Iter::new(RopeIndex::start(&roots), RopeIndex::end(&roots));
        assert_eq!(iter.len(), 5);
        assert_eq!(iter.next(), Some("a"));
        assert_eq!(iter.next_back(), Some("e"));
        assert_eq!(iter.next_back(), Some("d"));
        assert_eq!(iter.collect::<Vec<_>>(), ["b", "c"]);
    }

    #[test]
    #[should_panic(expected = "past the end")]
    fn advancing_the_end_panics() {
        let roots = forest(&[&["a"]]);
        RopeIndex::end(&roots).advance();
    }

    #[test]
    #[should_panic(expected = "before the start")]
    fn retreating_the_start_panics() {
        let roots = forest(&[&["", "a"]]);
        RopeIndex::start(&roots).retreat();
    }
}
