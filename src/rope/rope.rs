use std::{fmt, ops::Range, sync::Arc};

use tracing::{debug, trace};

use super::{
    chunk::{is_grapheme_boundary, Chunk, TextChunk},
    geometry::Geometry,
    index::{Iter, RopeIndex},
    node::Node,
    utf16::Utf16View,
};
use crate::error::{Result, RopeError};

const LEFT: usize = 0;
const RIGHT: usize = 2;

/// Persistent text sequence indexed by grapheme.
///
/// Content is split across three regions: everything before the edit window lives in the left
/// tree, the window itself is a single small chunk, and everything after it lives in the right
/// tree. Edits landing in the window only rebuild the window; anything else rebuilds the path to
/// the touched leaf. Every edit returns a new `Rope` and leaves `self` untouched, sharing all
/// unchanged nodes.
#[derive(Clone)]
pub struct Rope {
    /// `[left, window, right]`; the window is kept as a one-chunk leaf so cursors can walk all
    /// three regions as one forest.
    regions: [Arc<Node<TextChunk>>; 3],
    window: TextChunk,
    geometry: Geometry,
}

impl Rope {
    pub fn empty() -> Self {
        Self::with_geometry(Geometry::default())
    }

    pub fn with_geometry(geometry: Geometry) -> Self {
        Self::assemble(Node::empty(), TextChunk::empty(), Node::empty(), geometry)
    }

    pub fn from_str_with(text: &str, geometry: Geometry) -> Self {
        let left = Node::from_chunks(TextChunk::split(text, geometry.leaf_length()), geometry);
        Self::assemble(left, TextChunk::empty(), Node::empty(), geometry)
    }

    fn assemble(
        left: Arc<Node<TextChunk>>,
        window: TextChunk,
        right: Arc<Node<TextChunk>>,
        geometry: Geometry,
    ) -> Self {
        let window_leaf = Node::new_leaf(vec![window.clone()], geometry);
        Self {
            regions: [left, window_leaf, right],
            window,
            geometry,
        }
    }

    /// Installs `parts`, joined, as the edit window between `left` and `right`. Whatever does not
    /// fit in one chunk spills onto the end of `left`.
    fn with_window(
        left: Arc<Node<TextChunk>>,
        parts: &[&TextChunk],
        right: Arc<Node<TextChunk>>,
        geometry: Geometry,
    ) -> Self {
        let mut pieces = TextChunk::rechunk(parts, geometry.leaf_length());
        let window = pieces.pop().unwrap_or_else(TextChunk::empty);

        let left = if pieces.is_empty() {
            left
        } else {
            debug!(spilled = pieces.len(), "edit window overflowed into the left tree");
            Node::concat(&left, &Node::from_chunks(pieces, geometry), geometry)
        };

        Self::assemble(left, window, right, geometry)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Height of the tallest region tree.
    pub fn depth(&self) -> usize {
        self.regions.iter().map(|region| region.height()).max().unwrap_or(0)
    }

    pub fn left_root(&self) -> &Arc<Node<TextChunk>> {
        &self.regions[LEFT]
    }

    pub fn edit_window(&self) -> &TextChunk {
        &self.window
    }

    pub fn right_root(&self) -> &Arc<Node<TextChunk>> {
        &self.regions[RIGHT]
    }

    /// Position of the first element of the edit window.
    pub fn edit_offset(&self) -> usize {
        self.regions[LEFT].len()
    }

    /// Position of the first element of the right tree.
    pub fn right_offset(&self) -> usize {
        self.edit_offset() + self.window.len()
    }

    pub fn len(&self) -> usize {
        self.right_offset() + self.regions[RIGHT].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The grapheme at `at`.
    pub fn element(&self, at: usize) -> Result<&str> {
        if at >= self.len() {
            return Err(RopeError::IndexOutOfRange { index: at, len: self.len() });
        }

        let (edit_offset, right_offset) = (self.edit_offset(), self.right_offset());
        if at < edit_offset {
            self.regions[LEFT].element_at(at, self.geometry)
        } else if at < right_offset {
            Ok(self.window.element(at - edit_offset))
        } else {
            self.regions[RIGHT].element_at(at - right_offset, self.geometry)
        }
    }

    /// Returns a rope with `content` added at the end as a new chunk. Empty content still adds
    /// a zero-length chunk, which traversal and indexing skip over. Content that continues the
    /// last grapheme (a combining mark, say) is merged into it instead.
    pub fn append(&self, content: &str) -> Self {
        let len = self.len();
        if let Some((range, content)) = self.align_to_graphemes(len..len, content) {
            return self.splice(range, &content);
        }

        let chunks = match TextChunk::split(content, self.geometry.leaf_length()) {
            chunks if chunks.is_empty() => vec![TextChunk::empty()],
            chunks => chunks,
        };

        let geometry = self.geometry;
        let [left, _, right] = &self.regions;
        if self.window.is_empty() && right.is_empty() {
            let left = chunks
                .into_iter()
                .fold(left.clone(), |node, chunk| node.push(chunk, geometry));
            Self::assemble(left, self.window.clone(), right.clone(), geometry)
        } else {
            let right = chunks
                .into_iter()
                .fold(right.clone(), |node, chunk| node.push(chunk, geometry));
            Self::assemble(left.clone(), self.window.clone(), right, geometry)
        }
    }

    /// Returns a rope with `content` inserted before the grapheme at `at` (`at <= len`).
    pub fn insert(&self, content: &str, at: usize) -> Result<Self> {
        if at > self.len() {
            return Err(RopeError::IndexOutOfRange { index: at, len: self.len() });
        }
        if content.is_empty() {
            return Ok(self.clone());
        }
        if let Some((range, content)) = self.align_to_graphemes(at..at, content) {
            return Ok(self.splice(range, &content));
        }

        let geometry = self.geometry;
        let content = TextChunk::new(content);
        let (edit_offset, right_offset) = (self.edit_offset(), self.right_offset());
        let [left, _, right] = &self.regions;

        if (edit_offset..=right_offset).contains(&at) {
            trace!(at, "insert inside the edit window");
            let split = at - edit_offset;
            let head = self.window.slice(0..split);
            let tail = self.window.slice(split..self.window.len());
            let parts = [&head, &content, &tail];
            return Ok(Self::with_window(left.clone(), &parts, right.clone(), geometry));
        }

        trace!(at, edit_offset, right_offset, "insert outside the edit window");
        Ok(if at < edit_offset {
            let left = left.insert(at, &content, geometry)?;
            Self::assemble(left, self.window.clone(), right.clone(), geometry)
        } else {
            let right = right.insert(at - right_offset, &content, geometry)?;
            Self::assemble(left.clone(), self.window.clone(), right, geometry)
        })
    }

    /// Returns a rope with the graphemes in `range` replaced by `content`.
    ///
    /// Ranges inside the edit window rewrite only the window, and ranges in the right tree are
    /// edited in place there. Any other range moves the window: the left tree is cut at `start`,
    /// the right tree at `end`, and `content` (plus whatever survives of the old window) becomes
    /// the new window. Content of the left tree past `end` moves to the front of the right tree.
    pub fn replace_range(&self, range: Range<usize>, content: &str) -> Result<Self> {
        let Range { start, end } = range;
        if start > end || end > self.len() {
            return Err(RopeError::RangeOutOfBounds { start, end, len: self.len() });
        }
        if start == end && content.is_empty() {
            return Ok(self.clone());
        }

        Ok(match self.align_to_graphemes(range.clone(), content) {
            Some((range, content)) => self.splice(range, &content),
            None => self.splice(range, content),
        })
    }

    /// Grows `range` one grapheme at a time, pulling the neighbours into `content`, until both
    /// ends of the edit fall on grapheme boundaries of the edited text. `None` means the edit
    /// already lines up.
    fn align_to_graphemes(
        &self,
        range: Range<usize>,
        content: &str,
    ) -> Option<(Range<usize>, String)> {
        let mut range = range;
        let mut content = content.to_string();
        let mut grown = false;

        loop {
            let before = match range.start {
                0 => "",
                start => self.element(start - 1).unwrap_or_default(),
            };
            let after = match range.end {
                end if end < self.len() => self.element(end).unwrap_or_default(),
                _ => "",
            };

            let joined = format!("{before}{content}{after}");
            let (head, tail) = (before.len(), before.len() + content.len());
            let grow_start = !before.is_empty() && !is_grapheme_boundary(&joined, head);
            let grow_end = !after.is_empty() && !is_grapheme_boundary(&joined, tail);
            if !grow_start && !grow_end {
                return grown.then_some((range, content));
            }

            trace!(?range, grow_start, grow_end, "edit splits a grapheme, widening it");
            range.start -= usize::from(grow_start);
            range.end += usize::from(grow_end);
            let from = if grow_start { 0 } else { head };
            let to = if grow_end { joined.len() } else { tail };
            content = joined[from..to].to_string();
            grown = true;
        }
    }

    /// Replaces a checked, grapheme-aligned range.
    fn splice(&self, range: Range<usize>, content: &str) -> Self {
        let Range { start, end } = range;
        let geometry = self.geometry;
        let content = TextChunk::new(content);
        let (edit_offset, right_offset) = (self.edit_offset(), self.right_offset());
        let [left, _, right] = &self.regions;
        let window = &self.window;

        if edit_offset <= start && end <= right_offset {
            trace!(start, end, "replace inside the edit window");
            let head = window.slice(0..start - edit_offset);
            let tail = window.slice(end - edit_offset..window.len());
            let parts = [&head, &content, &tail];
            return Self::with_window(left.clone(), &parts, right.clone(), geometry);
        }

        if start >= right_offset {
            trace!(start, end, "replace inside the right tree");
            let right = right.replace(start - right_offset, end - right_offset, &content, geometry);
            return Self::assemble(left.clone(), window.clone(), right, geometry);
        }

        if end <= edit_offset {
            debug!(start, end, edit_offset, "replace inside the left tree, moving the edit window");
            let mut tail_tree = right.clone();
            if !window.is_empty() {
                let window_tree = Node::from_chunks(vec![window.clone()], geometry);
                tail_tree = Node::concat(&window_tree, &tail_tree, geometry);
            }
            let tail_tree = Node::concat(&left.skip(end, geometry), &tail_tree, geometry);
            return Self::with_window(left.take(start, geometry), &[&content], tail_tree, geometry);
        }

        debug!(
            start,
            end,
            edit_offset,
            right_offset,
            "replace across regions, moving the edit window"
        );
        let head_tree = left.take(start.min(edit_offset), geometry);
        let tail_tree = right.skip(end.max(right_offset) - right_offset, geometry);
        let head = window.slice(0..start.saturating_sub(edit_offset));
        let tail = if end < right_offset {
            window.slice(end - edit_offset..window.len())
        } else {
            TextChunk::empty()
        };

        Self::with_window(head_tree, &[&head, &content, &tail], tail_tree, geometry)
    }

    /// Returns a rope without the graphemes in `range`.
    pub fn remove(&self, range: Range<usize>) -> Result<Self> {
        self.replace_range(range, "")
    }

    /// Concatenates every region into one string. O(n); meant for display and saving.
    pub fn materialize(&self) -> String {
        let mut result = String::new();
        for region in &self.regions {
            region.for_each_chunk(&mut |chunk| result.push_str(chunk.as_str()));
        }
        result
    }

    pub fn start_index(&self) -> RopeIndex<'_, TextChunk> {
        RopeIndex::start(&self.regions)
    }

    pub fn end_index(&self) -> RopeIndex<'_, TextChunk> {
        RopeIndex::end(&self.regions)
    }

    /// Cursor at grapheme `position`; `position == len` gives the end index.
    pub fn index_at(&self, position: usize) -> Result<RopeIndex<'_, TextChunk>> {
        RopeIndex::at(&self.regions, position)
    }

    pub fn iter(&self) -> Iter<'_, TextChunk> {
        Iter::new(self.start_index(), self.end_index())
    }

    /// UTF-16 view over the same content.
    pub fn utf16(&self) -> Utf16View {
        let roots = self
            .regions
            .iter()
            .map(|region| region.map_chunks(&TextChunk::utf16, self.geometry))
            .collect();
        Utf16View::new(roots, self.geometry)
    }
}

impl Default for Rope {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Rope {
    fn from(text: &str) -> Self {
        Self::from_str_with(text, Geometry::default())
    }
}

impl From<String> for Rope {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}

impl std::ops::Index<usize> for Rope {
    type Output = str;

    fn index(&self, at: usize) -> &str {
        match self.element(at) {
            Ok(grapheme) => grapheme,
            Err(err) => panic!("{err}"),
        }
    }
}

impl PartialEq for Rope {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for Rope {}

impl fmt::Display for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for region in &self.regions {
            let mut result = Ok(());
            region.for_each_chunk(&mut |chunk| {
                if result.is_ok() {
                    result = f.write_str(chunk.as_str());
                }
            });
            result?;
        }
        Ok(())
    }
}

impl fmt::Debug for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rope")
            .field("len", &self.len())
            .field("edit_offset", &self.edit_offset())
            .field("right_offset", &self.right_offset())
            .field("depth", &self.depth())
            .field("text", &self.materialize())
            .finish()
    }
}
