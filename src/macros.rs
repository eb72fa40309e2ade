/// Builds a [`Rope`](crate::Rope) by appending each expression as its own chunk.
///
/// ```
/// use text_rope::{rope, Geometry};
///
/// let rope = rope!["hello", ", ", "world"];
/// assert_eq!(rope.to_string(), "hello, world");
///
/// let small = rope![geometry = Geometry::new(2, 2).unwrap(); "abc", "", "def"];
/// assert_eq!(small.len(), 6);
/// ```
#[macro_export]
macro_rules! rope {
    (@append $rope:expr; $($chunk:expr),*) => {{
        let rope = $rope;
        $(
            let rope = rope.append(::core::convert::AsRef::<str>::as_ref(&$chunk));
        )*
        rope
    }};

    () => {
        $crate::Rope::empty()
    };

    (geometry = $geometry:expr; $($chunk:expr),* $(,)?) => {
        $crate::rope!(@append $crate::Rope::with_geometry($geometry); $($chunk),*)
    };

    ($($chunk:expr),+ $(,)?) => {
        $crate::rope!(@append $crate::Rope::empty(); $($chunk),+)
    };
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{Geometry, Rope};

    #[test]
    fn empty_invocation() {
        assert!(rope![].is_empty());
    }

    #[test]
    fn appends_every_chunk() {
        let owned = String::from("c");
        let rope = rope!["a", "b", owned,];
        assert_eq!(rope.materialize(), "abc");
        assert_eq!(rope, Rope::from("abc"));
    }

    #[test]
    fn keeps_empty_chunks_out_of_sight() {
        let geometry = Geometry::new(1, 1).unwrap();
        let rope = rope![geometry = geometry; "ab", "", "", "cd"];
        assert_eq!(rope.geometry(), geometry);
        assert_eq!(rope.len(), 4);
        assert_eq!(rope.iter().collect::<String>(), "abcd");
        assert!(rope![geometry = geometry;].is_empty());
    }
}
