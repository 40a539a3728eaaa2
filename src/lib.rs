//! # cdat
//!
//! A static string dictionary built on a compressed double-array trie.
//!
//! Keys are byte strings; each stored key gets a dense id in `0..num_keys`.
//! The dictionary answers exact lookup (key to id), decode (id to key),
//! common-prefix search and predictive search. The BASE/CHECK arrays are
//! stored in directly addressable codes, so a dictionary is a few bytes per
//! key and can be queried straight out of a memory map.
//!
//! ## Example
//!
//! ```rust
//! use cdat::Trie8;
//!
//! let keys = ["a", "i", "in", "inn", "tea", "ted", "ten", "to"];
//! let trie = Trie8::build(&keys).unwrap();
//!
//! let id = trie.lookup(b"ted").unwrap();
//! assert_eq!(trie.decode(id).unwrap(), b"ted");
//! assert_eq!(trie.lookup(b"te"), None);
//!
//! let found: Vec<_> = trie.common_prefix_search(b"teddy").map(|(_, key)| key).collect();
//! assert_eq!(found, [b"ted".as_slice()]);
//! ```
//!
//! ## Variants
//!
//! | Type     | BASE/CHECK storage            | Type id |
//! |----------|-------------------------------|---------|
//! | [`Trie7`]  | pointer-based DAC, 7-bit first level  | 7  |
//! | [`Trie8`]  | standard DAC, 8-bit first level       | 8  |
//! | [`Trie15`] | pointer-based DAC, 15-bit first level | 15 |
//! | [`Trie16`] | standard DAC, 16-bit first level      | 16 |
//!
//! Pointer-based variants decode faster; standard variants are smaller.
//! [`AnyTrie`] loads whichever variant a file holds.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod bit_packed;
pub mod bit_vector;
pub mod dac;
pub mod error;
pub mod io;
pub mod trie;

#[cfg(test)]
mod proptests;

pub use bit_packed::BitPackedArray;
pub use bit_vector::{BitVector, BitVectorBuilder};
pub use dac::{CodeArray, LevelPolicy};
pub use error::{Error, Result};
pub use trie::{
    type_id_of, type_id_of_bytes, AnyTrie, BuildConfig, Dictionary, PredictiveIter, PrefixIter, Trie, TrieStats,
    FORMAT_VERSION,
};

/// Trie over a pointer-based DAC with a 7-bit first level.
pub type Trie7<'a> = Trie<'a, dac::PointerDac7<'a>>;
/// Trie over a standard DAC with an 8-bit first level.
pub type Trie8<'a> = Trie<'a, dac::Dac8<'a>>;
/// Trie over a pointer-based DAC with a 15-bit first level.
pub type Trie15<'a> = Trie<'a, dac::PointerDac15<'a>>;
/// Trie over a standard DAC with a 16-bit first level.
pub type Trie16<'a> = Trie<'a, dac::Dac16<'a>>;
