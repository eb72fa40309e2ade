mod chunk;
mod geometry;
mod index;
mod node;
mod rope;
mod utf16;

pub use self::chunk::{Chunk, TextChunk, Utf16Chunk};
pub use self::geometry::Geometry;
pub use self::index::{Iter, RopeIndex};
pub use self::node::Node;
pub use self::rope::Rope;
pub use self::utf16::Utf16View;
