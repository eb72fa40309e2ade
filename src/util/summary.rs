use std::fmt;

use text_rope::{
    rope::{Chunk, TextChunk},
    Rope,
};

/// Size and shape statistics for a rope, printed by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub graphemes: usize,
    pub utf16_units: usize,
    pub bytes: usize,
    pub chunks: usize,
    pub depth: usize,
    pub edit_offset: usize,
    pub right_offset: usize,
}

impl Summary {
    pub fn of(rope: &Rope) -> Self {
        let mut chunks = 0;
        let mut bytes = 0;
        let mut count = |chunk: &TextChunk| {
            chunks += 1;
            bytes += chunk.as_str().len();
        };

        rope.left_root().for_each_chunk(&mut count);
        if !rope.edit_window().is_empty() {
            count(rope.edit_window());
        }
        rope.right_root().for_each_chunk(&mut count);

        Self {
            graphemes: rope.len(),
            utf16_units: rope.utf16().len(),
            bytes,
            chunks,
            depth: rope.depth(),
            edit_offset: rope.edit_offset(),
            right_offset: rope.right_offset(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graphemes:    {}", self.graphemes)?;
        writeln!(f, "utf-16 units: {}", self.utf16_units)?;
        writeln!(f, "bytes:        {}", self.bytes)?;
        writeln!(f, "chunks:       {}", self.chunks)?;
        writeln!(f, "depth:        {}", self.depth)?;
        write!(f, "edit window:  {}..{}", self.edit_offset, self.right_offset)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use text_rope::Geometry;

    use super::*;

    #[test]
    fn counts_every_region() {
        let geometry = Geometry::new(1, 2).unwrap();
        let rope = Rope::from_str_with("héllo wörld", geometry).replace_range(5..6, "_").unwrap();
        let summary = Summary::of(&rope);

        assert_eq!(
            summary,
            Summary {
                graphemes: 11,
                utf16_units: 11,
                bytes: 13,
                chunks: 5,
                depth: rope.depth(),
                edit_offset: 5,
                right_offset: 6,
            }
        );
        assert!(summary.to_string().ends_with("edit window:  5..6"));
    }
}
