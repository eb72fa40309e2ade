use std::sync::Arc;

use super::{chunk::Chunk, geometry::Geometry};
use crate::error::{Result, RopeError};

/// Immutable tree node. Leaves hold chunks, internal nodes hold children; every leaf of a
/// tree sits at the same depth.
pub struct Node<C> {
    kind: Kind<C>,
    len: usize,
    height: usize,
    dense: bool,
}

enum Kind<C> {
    Leaf(Vec<C>),
    Internal(Vec<Arc<Node<C>>>),
}

impl<C: Chunk> Node<C> {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            kind: Kind::Leaf(Vec::new()),
            len: 0,
            height: 0,
            dense: true,
        })
    }

    pub(crate) fn new_leaf(chunks: Vec<C>, geometry: Geometry) -> Arc<Self> {
        let len = chunks.iter().map(C::len).sum();
        let dense = chunks.len() <= geometry.branching_factor()
            && match chunks.split_last() {
                None => true,
                Some((last, rest)) => {
                    last.len() <= geometry.leaf_length()
                        && rest.iter().all(|c| c.len() == geometry.leaf_length())
                }
            };

        Arc::new(Self { kind: Kind::Leaf(chunks), len, height: 0, dense })
    }

    pub(crate) fn new_internal(children: Vec<Arc<Self>>, geometry: Geometry) -> Arc<Self> {
        let len = children.iter().map(|child| child.len).sum();
        let height = children.iter().map(|child| child.height).max().unwrap_or(0) + 1;
        let fits = |child: &Arc<Self>| child.dense && child.height + 1 == height;
        let dense = children.len() <= geometry.branching_factor()
            && match children.split_last() {
                None => true,
                Some((last, rest)) => {
                    fits(last)
                        && rest
                            .iter()
                            .all(|c| fits(c) && c.len == geometry.capacity(c.height))
                }
            };

        Arc::new(Self { kind: Kind::Internal(children), len, height, dense })
    }

    /// Builds a balanced tree over `chunks`, packing every node full from the left.
    pub fn from_chunks(chunks: Vec<C>, geometry: Geometry) -> Arc<Self> {
        Self::from_siblings(Self::leaves(chunks, geometry), geometry)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distance to the leaves; a leaf has height 0.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether the subtree has the regular shape bit-sliced lookup relies on.
    pub fn is_dense(&self) -> bool {
        self.dense
    }

    pub fn children(&self) -> &[Arc<Self>] {
        match &self.kind {
            Kind::Internal(children) => children,
            Kind::Leaf(_) => &[],
        }
    }

    pub fn chunks(&self) -> &[C] {
        match &self.kind {
            Kind::Leaf(chunks) => chunks,
            Kind::Internal(_) => &[],
        }
    }

    pub(crate) fn slot_count(&self) -> usize {
        match &self.kind {
            Kind::Leaf(chunks) => chunks.len(),
            Kind::Internal(children) => children.len(),
        }
    }

    pub(crate) fn slot_len(&self, slot: usize) -> usize {
        match &self.kind {
            Kind::Leaf(chunks) => chunks[slot].len(),
            Kind::Internal(children) => children[slot].len,
        }
    }

    /// The child in `slot`, or `None` when this is a leaf.
    pub(crate) fn child(&self, slot: usize) -> Option<&Self> {
        match &self.kind {
            Kind::Internal(children) => Some(children[slot].as_ref()),
            Kind::Leaf(_) => None,
        }
    }

    pub(crate) fn first_filled(&self) -> Option<usize> {
        (0..self.slot_count()).find(|&slot| self.slot_len(slot) > 0)
    }

    pub(crate) fn last_filled(&self) -> Option<usize> {
        (0..self.slot_count()).rev().find(|&slot| self.slot_len(slot) > 0)
    }

    fn check_bounds(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(RopeError::IndexOutOfRange { index, len: self.len });
        }

        Ok(())
    }

    /// Scanning lookup: walks down by accumulating cached lengths. Correct for any shape.
    pub fn element(&self, index: usize) -> Result<C::Element<'_>> {
        self.check_bounds(index)?;

        let mut node = self;
        let mut index = index;
        loop {
            let lengths = (0..node.slot_count()).map(|slot| node.slot_len(slot));
            let (slot, before) = child_index(lengths, index);
            index -= before;
            match &node.kind {
                Kind::Internal(children) => node = &children[slot],
                Kind::Leaf(chunks) => return Ok(chunks[slot].element(index)),
            }
        }
    }

    /// Bit-sliced lookup. Dense subtrees are indexed by masking slices of `index`; any other
    /// shape falls back to [`Node::element`].
    pub fn element_at(&self, index: usize, geometry: Geometry) -> Result<C::Element<'_>> {
        self.check_bounds(index)?;
        if !self.dense {
            return self.element(index);
        }

        let mut node = self;
        loop {
            let slot = geometry.slot(index, node.height);
            match &node.kind {
                Kind::Internal(children) => node = &children[slot],
                Kind::Leaf(chunks) => return Ok(chunks[slot].element(geometry.leaf_offset(index))),
            }
        }
    }

    pub fn for_each_chunk(&self, f: &mut impl FnMut(&C)) {
        match &self.kind {
            Kind::Leaf(chunks) => chunks.iter().for_each(f),
            Kind::Internal(children) => children.iter().for_each(|child| child.for_each_chunk(f)),
        }
    }

    /// Re-roots the same topology over a different chunk type.
    pub fn map_chunks<D: Chunk>(&self, f: &impl Fn(&C) -> D, geometry: Geometry) -> Arc<Node<D>> {
        match &self.kind {
            Kind::Leaf(chunks) => Node::new_leaf(chunks.iter().map(f).collect(), geometry),
            Kind::Internal(children) => {
                let children = children
                    .iter()
                    .map(|child| child.map_chunks(f, geometry))
                    .collect();
                Node::new_internal(children, geometry)
            }
        }
    }

    fn leaves(chunks: Vec<C>, geometry: Geometry) -> Vec<Arc<Self>> {
        chunks
            .chunks(geometry.branching_factor())
            .map(|group| Self::new_leaf(group.to_vec(), geometry))
            .collect()
    }

    fn regroup(nodes: Vec<Arc<Self>>, geometry: Geometry) -> Vec<Arc<Self>> {
        nodes
            .chunks(geometry.branching_factor())
            .map(|group| Self::new_internal(group.to_vec(), geometry))
            .collect()
    }

    /// Stacks same-height siblings under new parents until a single root remains.
    fn from_siblings(mut nodes: Vec<Arc<Self>>, geometry: Geometry) -> Arc<Self> {
        loop {
            match nodes.len() {
                0 => return Self::empty(),
                1 => return nodes.swap_remove(0),
                _ => nodes = Self::regroup(nodes, geometry),
            }
        }
    }

    /// Drops single-child roots left behind by slicing.
    fn collapse(mut node: Arc<Self>) -> Arc<Self> {
        loop {
            let next = match &node.kind {
                Kind::Internal(children) => match children.as_slice() {
                    [only] => only.clone(),
                    [] => Self::empty(),
                    _ => break,
                },
                Kind::Leaf(_) => break,
            };
            node = next;
        }

        node
    }

    /// Returns a tree with `chunk` added after the last chunk. Only the rightmost path is rebuilt.
    pub(crate) fn push(self: &Arc<Self>, chunk: C, geometry: Geometry) -> Arc<Self> {
        Self::from_siblings(self.push_rec(chunk, geometry), geometry)
    }

    fn push_rec(self: &Arc<Self>, chunk: C, geometry: Geometry) -> Vec<Arc<Self>> {
        match &self.kind {
            Kind::Leaf(chunks) if chunks.len() < geometry.branching_factor() => {
                let mut chunks = chunks.clone();
                chunks.push(chunk);
                vec![Self::new_leaf(chunks, geometry)]
            }
            Kind::Leaf(_) => vec![self.clone(), Self::new_leaf(vec![chunk], geometry)],
            Kind::Internal(children) => {
                let mut children = children.clone();
                match children.pop() {
                    Some(last) => children.extend(last.push_rec(chunk, geometry)),
                    None => children.push(Self::new_leaf(vec![chunk], geometry)),
                }
                Self::regroup(children, geometry)
            }
        }
    }

    /// Returns a tree with `content` spliced in before element `index` (`index <= len`).
    /// The chunk owning `index` is split and re-chunked; overflowing nodes split upward.
    pub(crate) fn insert(
        self: &Arc<Self>,
        index: usize,
        content: &C,
        geometry: Geometry,
    ) -> Result<Arc<Self>> {
        if index > self.len {
            return Err(RopeError::IndexOutOfRange { index, len: self.len });
        }
        if content.is_empty() {
            return Ok(self.clone());
        }

        Ok(Self::from_siblings(self.insert_rec(index, content, geometry), geometry))
    }

    fn insert_rec(
        self: &Arc<Self>,
        index: usize,
        content: &C,
        geometry: Geometry,
    ) -> Vec<Arc<Self>> {
        match &self.kind {
            Kind::Leaf(chunks) if chunks.is_empty() => {
                Self::leaves(C::rechunk(&[content], geometry.leaf_length()), geometry)
            }
            Kind::Leaf(chunks) => {
                let (slot, before) = insertion_slot(chunks.iter().map(C::len), index);
                let target = &chunks[slot];
                let at = index - before;
                let head = target.slice(0..at);
                let tail = target.slice(at..target.len());

                let mut next = chunks[..slot].to_vec();
                next.extend(C::rechunk(&[&head, content, &tail], geometry.leaf_length()));
                next.extend_from_slice(&chunks[slot + 1..]);
                Self::leaves(next, geometry)
            }
            Kind::Internal(children) => {
                let (slot, before) = insertion_slot(children.iter().map(|child| child.len), index);

                let mut next = children[..slot].to_vec();
                next.extend(children[slot].insert_rec(index - before, content, geometry));
                next.extend_from_slice(&children[slot + 1..]);
                Self::regroup(next, geometry)
            }
        }
    }

    /// The first `count` elements, sharing every subtree that lies wholly inside them.
    pub(crate) fn take(self: &Arc<Self>, count: usize, geometry: Geometry) -> Arc<Self> {
        Self::collapse(self.prefix(count, geometry).unwrap_or_else(Self::empty))
    }

    /// Everything from element `start` onwards, sharing every subtree that lies wholly inside it.
    pub(crate) fn skip(self: &Arc<Self>, start: usize, geometry: Geometry) -> Arc<Self> {
        Self::collapse(self.suffix(start, geometry).unwrap_or_else(Self::empty))
    }

    fn prefix(self: &Arc<Self>, count: usize, geometry: Geometry) -> Option<Arc<Self>> {
        if count >= self.len {
            return Some(self.clone());
        }
        if count == 0 {
            return None;
        }

        let mut before = 0;
        match &self.kind {
            Kind::Leaf(chunks) => {
                let mut kept = Vec::new();
                for chunk in chunks {
                    if before >= count {
                        break;
                    }
                    let take = (count - before).min(chunk.len());
                    kept.push(if take == chunk.len() {
                        chunk.clone()
                    } else {
                        chunk.slice(0..take)
                    });
                    before += chunk.len();
                }
                Some(Self::new_leaf(kept, geometry))
            }
            Kind::Internal(children) => {
                let mut kept = Vec::new();
                for child in children {
                    if before >= count {
                        break;
                    }
                    kept.extend(child.prefix(count - before, geometry));
                    before += child.len;
                }
                Some(Self::new_internal(kept, geometry))
            }
        }
    }

    fn suffix(self: &Arc<Self>, start: usize, geometry: Geometry) -> Option<Arc<Self>> {
        if start == 0 {
            return Some(self.clone());
        }
        if start >= self.len {
            return None;
        }

        let mut before = 0;
        match &self.kind {
            Kind::Leaf(chunks) => {
                let mut kept = Vec::new();
                for chunk in chunks {
                    let end = before + chunk.len();
                    if end > start {
                        let skip = start.saturating_sub(before);
                        kept.push(if skip == 0 {
                            chunk.clone()
                        } else {
                            chunk.slice(skip..chunk.len())
                        });
                    }
                    before = end;
                }
                Some(Self::new_leaf(kept, geometry))
            }
            Kind::Internal(children) => {
                let mut kept = Vec::new();
                for child in children {
                    let end = before + child.len;
                    if end > start {
                        kept.extend(child.suffix(start.saturating_sub(before), geometry));
                    }
                    before = end;
                }
                Some(Self::new_internal(kept, geometry))
            }
        }
    }

    /// Joins two trees of any height. Only the seam between them is rebuilt.
    pub(crate) fn concat(left: &Arc<Self>, right: &Arc<Self>, geometry: Geometry) -> Arc<Self> {
        if right.is_empty() {
            return left.clone();
        }
        if left.is_empty() {
            return right.clone();
        }

        let siblings = if left.height >= right.height {
            left.graft_right(right, geometry)
        } else {
            right.graft_left(left, geometry)
        };
        Self::from_siblings(siblings, geometry)
    }

    fn graft_right(self: &Arc<Self>, tail: &Arc<Self>, geometry: Geometry) -> Vec<Arc<Self>> {
        match (&self.kind, &tail.kind) {
            (Kind::Leaf(chunks), Kind::Leaf(more)) => {
                Self::leaves([chunks.as_slice(), more.as_slice()].concat(), geometry)
            }
            (Kind::Internal(children), Kind::Internal(more)) if self.height == tail.height => {
                Self::regroup([children.as_slice(), more.as_slice()].concat(), geometry)
            }
            (Kind::Internal(children), _) => {
                let mut next = children.clone();
                match next.pop() {
                    Some(last) => next.extend(last.graft_right(tail, geometry)),
                    None => next.push(tail.clone()),
                }
                Self::regroup(next, geometry)
            }
            (Kind::Leaf(_), Kind::Internal(_)) => tail.graft_left(self, geometry),
        }
    }

    fn graft_left(self: &Arc<Self>, head: &Arc<Self>, geometry: Geometry) -> Vec<Arc<Self>> {
        match (&head.kind, &self.kind) {
            (Kind::Leaf(more), Kind::Leaf(chunks)) => {
                Self::leaves([more.as_slice(), chunks.as_slice()].concat(), geometry)
            }
            (Kind::Internal(more), Kind::Internal(children)) if self.height == head.height => {
                Self::regroup([more.as_slice(), children.as_slice()].concat(), geometry)
            }
            (_, Kind::Internal(children)) => {
                let mut next = Vec::with_capacity(children.len() + 1);
                match children.split_first() {
                    Some((first, rest)) => {
                        next.extend(first.graft_left(head, geometry));
                        next.extend_from_slice(rest);
                    }
                    None => next.push(head.clone()),
                }
                Self::regroup(next, geometry)
            }
            (Kind::Internal(_), Kind::Leaf(_)) => head.graft_right(self, geometry),
        }
    }

    /// Returns a tree with elements `start..end` replaced by `content`.
    pub(crate) fn replace(
        self: &Arc<Self>,
        start: usize,
        end: usize,
        content: &C,
        geometry: Geometry,
    ) -> Arc<Self> {
        let head = self.take(start, geometry);
        let middle = Self::from_chunks(C::rechunk(&[content], geometry.leaf_length()), geometry);
        let tail = self.skip(end, geometry);
        Self::collapse(Self::concat(&Self::concat(&head, &middle, geometry), &tail, geometry))
    }

    /// Verifies cached lengths and uniform leaf depth, panicking on the first mismatch.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        match &self.kind {
            Kind::Leaf(chunks) => {
                assert_eq!(self.height, 0);
                assert_eq!(self.len, chunks.iter().map(C::len).sum::<usize>(), "leaf length cache");
            }
            Kind::Internal(children) => {
                assert!(!children.is_empty(), "internal node without children");
                for child in children {
                    assert_eq!(child.height + 1, self.height, "uneven leaf depth");
                    child.assert_consistent();
                }
                assert_eq!(
                    self.len,
                    children.iter().map(|child| child.len).sum::<usize>(),
                    "internal length cache"
                );
            }
        }
    }
}

/// Returns the slot containing `index` and the total length of all slots before it,
/// in the order `(slot, before)`.
fn child_index(lengths: impl Iterator<Item = usize>, index: usize) -> (usize, usize) {
    let mut before = 0;
    let mut slot = 0;
    for len in lengths {
        if before + len > index {
            break;
        }
        before += len;
        slot += 1;
    }
    (slot, before)
}

/// Like [`child_index`], but an index sitting on a boundary belongs to the slot it ends.
fn insertion_slot(lengths: impl ExactSizeIterator<Item = usize>, index: usize) -> (usize, usize) {
    let last = lengths.len().saturating_sub(1);
    let mut before = 0;
    for (slot, len) in lengths.enumerate() {
        if before + len >= index || slot == last {
            return (slot, before);
        }
        before += len;
    }
    (0, 0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rope::chunk::TextChunk;

    fn geometry() -> Geometry {
        Geometry::new(2, 2).unwrap()
    }

    fn tree(text: &str) -> Arc<Node<TextChunk>> {
        Node::from_chunks(TextChunk::split(text, geometry().leaf_length()), geometry())
    }

    fn text(node: &Node<TextChunk>) -> String {
        let mut out = String::new();
        node.for_each_chunk(&mut |chunk| out.push_str(chunk.as_str()));
        out
    }

    const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

    #[test]
    fn from_chunks_builds_dense_tree() {
        let node = tree(ALPHABET);
        node.assert_consistent();
        assert!(node.is_dense());
        assert_eq!(node.len(), 36);
        // 9 chunks -> 3 leaves -> 1 internal node.
        assert_eq!(node.height(), 1);
        assert_eq!(text(&node), ALPHABET);
    }

    #[test]
    fn sliced_and_scanning_lookup_agree() {
        let node = tree(ALPHABET);
        for (index, expected) in ALPHABET.chars().enumerate() {
            let expected = expected.to_string();
            assert_eq!(node.element(index).unwrap(), expected);
            assert_eq!(node.element_at(index, geometry()).unwrap(), expected);
        }
    }

    #[test]
    fn lookup_is_bounds_checked() {
        let node = tree("abc");
        assert_eq!(node.element(3), Err(RopeError::IndexOutOfRange { index: 3, len: 3 }));
        assert_eq!(
            node.element_at(7, geometry()),
            Err(RopeError::IndexOutOfRange { index: 7, len: 3 })
        );
        assert!(Node::<TextChunk>::empty().element(0).is_err());
    }

    #[test]
    fn push_shares_untouched_subtrees() {
        let node = tree(&ALPHABET[..32]);
        let pushed = node.push(TextChunk::new("!"), geometry());
        pushed.assert_consistent();

        assert_eq!(text(&pushed), format!("{}!", &ALPHABET[..32]));
        assert_eq!(text(&node), &ALPHABET[..32]);
        assert!(Arc::ptr_eq(&node.children()[0], &pushed.children()[0]));
    }

    #[test]
    fn push_grows_a_new_level() {
        let mut node = Node::<TextChunk>::empty();
        for _ in 0..17 {
            node = node.push(TextChunk::new("abcd"), geometry());
            node.assert_consistent();
        }
        assert_eq!(node.height(), 2);
        assert!(node.is_dense());
        assert_eq!(node.element_at(66, geometry()).unwrap(), "c");
    }

    #[test]
    fn insert_splits_the_owning_chunk() {
        let node = tree(ALPHABET);
        let inserted = node.insert(5, &TextChunk::new("XYZ"), geometry()).unwrap();
        inserted.assert_consistent();

        assert_eq!(text(&inserted), "abcdeXYZfghijklmnopqrstuvwxyz0123456789");
        assert!(!inserted.is_dense());
        assert_eq!(inserted.element_at(7, geometry()).unwrap(), "Z");
        assert_eq!(inserted.element_at(8, geometry()).unwrap(), "f");
        assert_eq!(text(&node), ALPHABET);
    }

    #[test]
    fn insert_overflow_splits_upward() {
        let node = tree(ALPHABET);
        let inserted = node.insert(36, &TextChunk::new(&"x".repeat(80)), geometry()).unwrap();
        inserted.assert_consistent();
        assert_eq!(inserted.len(), 116);
        assert_eq!(text(&inserted), format!("{ALPHABET}{}", "x".repeat(80)));
        assert!(node.insert(37, &TextChunk::new("x"), geometry()).is_err());
    }

    #[test]
    fn take_and_skip_partition_the_tree() {
        let node = tree(ALPHABET);
        for split in 0..=ALPHABET.len() {
            let head = node.take(split, geometry());
            let tail = node.skip(split, geometry());
            head.assert_consistent();
            tail.assert_consistent();
            assert_eq!(text(&head), &ALPHABET[..split]);
            assert_eq!(text(&tail), &ALPHABET[split..]);
        }
    }

    #[test]
    fn concat_handles_uneven_heights() {
        let tall = tree(&ALPHABET.repeat(4));
        let short = tree("!?");
        let joined = Node::concat(&tall, &short, geometry());
        joined.assert_consistent();
        assert_eq!(text(&joined), format!("{}!?", ALPHABET.repeat(4)));

        let joined = Node::concat(&short, &tall, geometry());
        joined.assert_consistent();
        assert_eq!(text(&joined), format!("!?{}", ALPHABET.repeat(4)));
    }

    #[test]
    fn replace_swaps_a_range() {
        let node = tree(ALPHABET);
        let replaced = node.replace(3, 30, &TextChunk::new("-"), geometry());
        replaced.assert_consistent();
        assert_eq!(text(&replaced), "abc-456789");

        let removed = node.replace(0, 36, &TextChunk::empty(), geometry());
        assert!(removed.is_empty());
    }

    #[test]
    fn map_chunks_keeps_topology() {
        let node = tree("ab😍cdefgh");
        let utf16 = node.map_chunks(&TextChunk::utf16, geometry());
        utf16.assert_consistent();
        assert_eq!(utf16.height(), node.height());
        assert_eq!(utf16.len(), 10);
        assert_eq!(utf16.element(2).unwrap(), 0xd83d);
    }
}
