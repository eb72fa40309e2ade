//! Persistent, grapheme-indexed text ropes.
//!
//! A [`Rope`] never changes once built: every edit returns a new rope that shares all untouched
//! nodes with the old one. Content lives in wide, shallow tries of bounded chunks, with a small
//! edit window kept beside the trees so runs of nearby edits stay cheap.
//!
//! ```
//! use text_rope::Rope;
//!
//! let rope = Rope::from("hello");
//! let edited = rope.insert("m", 3).unwrap();
//! assert_eq!(edited.to_string(), "helmlo");
//! assert_eq!(rope.to_string(), "hello");
//! ```

mod error;
mod macros;
pub mod rope;

pub use self::error::{Result, RopeError};
pub use self::rope::{Geometry, Rope, RopeIndex, Utf16View};
