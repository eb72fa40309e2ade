use thiserror::Error;

pub type Result<T, E = RopeError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RopeError {
    /// An integer position outside `0..len` (or `0..=len` for insertion points).
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("range {start}..{end} is out of bounds for length {len}")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    #[error(
        "invalid geometry {branching_factor_bits}/{leaf_length_bits}: bit widths must be in 1..=8"
    )]
    InvalidGeometry { branching_factor_bits: u32, leaf_length_bits: u32 },
}
