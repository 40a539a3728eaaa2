//! Directly addressable codes (DACs): compressed integer arrays with random access.
//!
//! Values are split into chunks stored in a cascade of [`BitPackedArray`]
//! levels. Most values fit in the narrow first level; the rest continue into
//! later levels. Two encodings locate the continuation:
//!
//! - [`StandardDac`]: a one-bit overflow flag per entry in a rank-indexed
//!   [`BitVector`](crate::bit_vector::BitVector); decode costs one rank per
//!   extra level. Widths after the first level follow a [`LevelPolicy`].
//! - [`PointerDac`]: overflowing entries store a block-relative pointer to the
//!   next level in place of data bits, so decode is plain array indexing.
//!
//! [`BitPackedArray`]: crate::bit_packed::BitPackedArray

mod pointer;
mod standard;

pub use pointer::PointerDac;
pub use standard::StandardDac;

use crate::io::Persist;

/// Standard DAC with an 8-bit first level (type id 8).
pub type Dac8<'a> = StandardDac<'a, 8>;
/// Standard DAC with a 16-bit first level (type id 16).
pub type Dac16<'a> = StandardDac<'a, 16>;
/// Pointer-based DAC with 7 data bits in the first level (type id 7).
pub type PointerDac7<'a> = PointerDac<'a, 7>;
/// Pointer-based DAC with 15 data bits in the first level (type id 15).
pub type PointerDac15<'a> = PointerDac<'a, 15>;

/// How a standard DAC picks the widths of the levels after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelPolicy {
    /// Minimise stored bits (data plus overflow flags and their rank
    /// directory) using at most `max_levels` levels in total.
    Optimal {
        /// Upper bound on the number of levels, first level included.
        max_levels: usize,
    },
    /// Every level has the first level's width (the last may be narrower).
    Uniform,
}

impl Default for LevelPolicy {
    fn default() -> Self {
        LevelPolicy::Optimal { max_levels: 8 }
    }
}

/// Integer array used as the BASE/CHECK store of a trie.
pub trait CodeArray<'a>: Persist<'a> {
    /// Identifier written in the dictionary header.
    const TYPE_ID: u32;

    /// Compresses `values`.
    fn build(values: &[u64], policy: LevelPolicy) -> Self;

    /// Returns the value at `i`; `i` must be below [`CodeArray::len`].
    fn get(&self, i: usize) -> u64;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels in the cascade.
    fn num_levels(&self) -> usize;
}
