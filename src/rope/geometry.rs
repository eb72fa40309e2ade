use crate::error::{Result, RopeError};

const MAX_BITS: u32 = 8;

/// Shape of the trie: `2^branching_factor_bits` slots per node and
/// `2^leaf_length_bits` elements per full chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    branching_factor_bits: u32,
    leaf_length_bits: u32,
}

impl Geometry {
    pub const DEFAULT_BRANCHING_FACTOR_BITS: u32 = 5;
    pub const DEFAULT_LEAF_LENGTH_BITS: u32 = 6;

    pub fn new(branching_factor_bits: u32, leaf_length_bits: u32) -> Result<Self> {
        let valid = 1..=MAX_BITS;
        if !valid.contains(&branching_factor_bits) || !valid.contains(&leaf_length_bits) {
            return Err(RopeError::InvalidGeometry { branching_factor_bits, leaf_length_bits });
        }

        Ok(Self { branching_factor_bits, leaf_length_bits })
    }

    pub fn branching_factor_bits(&self) -> u32 {
        self.branching_factor_bits
    }

    pub fn leaf_length_bits(&self) -> u32 {
        self.leaf_length_bits
    }

    /// Maximum number of children (or chunks) held by one node.
    pub fn branching_factor(&self) -> usize {
        1 << self.branching_factor_bits
    }

    /// Maximum number of elements held by one chunk. Also the capacity of the edit window.
    pub fn leaf_length(&self) -> usize {
        1 << self.leaf_length_bits
    }

    /// Number of elements a full subtree of the given height holds.
    pub(crate) fn capacity(&self, height: usize) -> usize {
        let bits =
            self.leaf_length_bits as usize + self.branching_factor_bits as usize * (height + 1);
        u32::try_from(bits)
            .ok()
            .and_then(|bits| 1usize.checked_shl(bits))
            .unwrap_or(usize::MAX)
    }

    /// Slot selected by `index` in a dense node of the given height.
    pub(crate) fn slot(&self, index: usize, height: usize) -> usize {
        let shift = self.leaf_length_bits as usize + self.branching_factor_bits as usize * height;
        let shifted = u32::try_from(shift)
            .ok()
            .and_then(|shift| index.checked_shr(shift))
            .unwrap_or(0);
        shifted & (self.branching_factor() - 1)
    }

    /// Offset of `index` within its chunk in a dense leaf.
    pub(crate) fn leaf_offset(&self, index: usize) -> usize {
        index & (self.leaf_length() - 1)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            branching_factor_bits: Self::DEFAULT_BRANCHING_FACTOR_BITS,
            leaf_length_bits: Self::DEFAULT_LEAF_LENGTH_BITS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_bits() {
        assert_eq!(
            Geometry::new(0, 4),
            Err(RopeError::InvalidGeometry { branching_factor_bits: 0, leaf_length_bits: 4 })
        );
        assert!(Geometry::new(2, 9).is_err());
        assert!(Geometry::new(8, 8).is_ok());
    }

    #[test]
    fn slices_index_into_slots() {
        let geometry = Geometry::new(2, 3).unwrap();

        // 8 elements per chunk, 4 chunks per leaf, 32 elements per leaf.
        assert_eq!(geometry.capacity(0), 32);
        assert_eq!(geometry.capacity(1), 128);

        let index = 0b10_11_101;
        assert_eq!(geometry.leaf_offset(index), 0b101);
        assert_eq!(geometry.slot(index, 0), 0b11);
        assert_eq!(geometry.slot(index, 1), 0b10);
    }
}
