//! Compressed double-array trie.
//!
//! Each node is a cell of a double array. The child of node `s` along byte
//! `c` is `BASE(s) ^ code(c)` and is valid only if its `CHECK` names `s`.
//! `BASE` and `CHECK` live together in one [`CodeArray`]; subtrees holding a
//! single key are cut off at a leaf whose `BASE` slot points into the
//! [`TailStore`](tail::TailStore) instead. A key's id is the rank of its
//! node in the terminal bitmap, so ids are dense in `0..num_keys`.

mod any;
mod build;
mod code_table;
mod iter;
mod tail;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::bit_vector::BitVector;
use crate::dac::{CodeArray, LevelPolicy};
use crate::error::{Error, Result};
use crate::io::{self, Persist, ReaderSource, Sink, SliceSource, Source, WriterSink};

pub use any::AnyTrie;
pub use iter::{PredictiveIter, PrefixIter};

use code_table::CodeTable;
use tail::TailStore;

/// Version of the serialized layout written after the type id.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_BYTES: usize = 8;

// =============================================================================
// Configuration and statistics
// =============================================================================

/// Construction-time tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildConfig {
    /// Width policy of standard DACs; pointer-based DACs ignore it.
    pub levels: LevelPolicy,
    /// Number of trailing 256-cell blocks searched for free cells.
    pub free_blocks: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            levels: LevelPolicy::default(),
            free_blocks: 16,
        }
    }
}

/// Statistics about a built or loaded trie.
#[derive(Debug, Clone, Default)]
pub struct TrieStats {
    /// Number of keys stored.
    pub num_keys: usize,
    /// Cells in the double array (a multiple of 256).
    pub num_cells: usize,
    /// Distinct bytes occurring in keys.
    pub alphabet_size: usize,
    /// Length of the longest key.
    pub max_length: usize,
    /// Bytes in the tail store, dummy byte included.
    pub tail_bytes: usize,
    /// Levels in the BASE/CHECK array.
    pub dac_levels: usize,
    /// Serialized size, header included.
    pub total_bytes: usize,
    /// Average bytes per key.
    pub bytes_per_key: f64,
}

// =============================================================================
// Dictionary capability
// =============================================================================

/// Read-only string dictionary operations shared by every trie variant.
pub trait Dictionary {
    /// Number of keys stored.
    fn num_keys(&self) -> usize;

    /// Length of the longest key.
    fn max_length(&self) -> usize;

    /// Id of `key`, or `None` if it is not stored.
    fn lookup(&self, key: &[u8]) -> Option<u64>;

    /// Key with the given id, or `None` if `id >= num_keys()`.
    fn decode(&self, id: u64) -> Option<Vec<u8>>;

    /// Every stored key that is a prefix of `text`, shortest first.
    fn common_prefix_search<'s>(&'s self, text: &'s [u8]) -> Box<dyn Iterator<Item = (u64, &'s [u8])> + 's>;

    /// Every stored key that starts with `prefix`, in lexicographic order.
    fn predictive_search<'s>(&'s self, prefix: &[u8]) -> Box<dyn Iterator<Item = (u64, Vec<u8>)> + 's>;

    /// Serialized size in bytes, header included.
    fn memory_in_bytes(&self) -> usize;
}

// =============================================================================
// Trie
// =============================================================================

/// An immutable dictionary mapping byte strings to dense ids.
///
/// `C` stores BASE and CHECK; its [`CodeArray::TYPE_ID`] tags the file. `'a`
/// is the lifetime of borrowed storage when loaded with [`Trie::from_bytes`];
/// built tries own everything and can use any lifetime.
pub struct Trie<'a, C> {
    bc: C,
    leaves: BitVector<'a>,
    terms: BitVector<'a>,
    tail: TailStore<'a>,
    table: CodeTable,
    num_keys: usize,
    max_length: usize,
}

impl<'a, C: CodeArray<'a>> Trie<'a, C> {
    /// Builds a trie from strictly increasing keys.
    pub fn build<K: AsRef<[u8]>>(keys: &[K]) -> Result<Self> {
        Self::build_with_config(keys, &BuildConfig::default())
    }

    /// Builds a trie from strictly increasing keys with explicit tuning.
    pub fn build_with_config<K: AsRef<[u8]>>(keys: &[K], config: &BuildConfig) -> Result<Self> {
        if let Some(i) = (1..keys.len()).find(|&i| keys[i - 1].as_ref() >= keys[i].as_ref()) {
            return Err(Error::UnsortedKeys { index: i });
        }

        let table = CodeTable::build(keys);
        let layout = build::build(keys, &table, config.free_blocks)?;
        let bc = C::build(&layout.values, config.levels);

        let trie = Self {
            bc,
            leaves: BitVector::new(layout.leaves, false, false),
            terms: BitVector::new(layout.terms, true, true),
            tail: layout.tail,
            table,
            num_keys: keys.len(),
            max_length: keys.iter().map(|k| k.as_ref().len()).max().unwrap_or(0),
        };
        debug!(
            type_id = C::TYPE_ID,
            keys = trie.num_keys,
            cells = trie.num_cells(),
            tail_bytes = trie.tail.num_bytes(),
            bytes = trie.memory_in_bytes(),
            "built trie"
        );
        Ok(trie)
    }

    /// Builds a trie from keys in any order; duplicates are dropped.
    pub fn from_unsorted<I, K>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut keys: Vec<Vec<u8>> = keys.into_iter().map(|k| k.as_ref().to_vec()).collect();
        keys.sort_unstable();
        keys.dedup();
        Self::build(&keys)
    }

    #[inline]
    pub fn num_keys(&self) -> usize {
        self.num_keys
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_keys == 0
    }

    /// Length of the longest key.
    #[inline]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.leaves.len()
    }

    /// Type id written in the header.
    pub fn type_id(&self) -> u32 {
        C::TYPE_ID
    }

    /// Id of `key`, or `None` if it is not stored.
    pub fn lookup(&self, key: &[u8]) -> Option<u64> {
        let mut npos = 0;
        let mut kpos = 0;
        while !self.leaves.get(npos) {
            if kpos == key.len() {
                return self.terms.get(npos).then(|| self.id_of(npos));
            }
            npos = self.child(npos, key[kpos])?;
            kpos += 1;
        }
        self.tail.matches(self.link(npos), &key[kpos..]).then(|| self.id_of(npos))
    }

    /// Key with the given id, or `None` if `id >= num_keys()`.
    pub fn decode(&self, id: u64) -> Option<Vec<u8>> {
        let mut key = Vec::with_capacity(self.max_length);
        self.decode_into(id, &mut key).then_some(key)
    }

    /// Appends the key with the given id to `out`; returns `false` (leaving
    /// `out` untouched) if `id >= num_keys()` or the path to the root is
    /// broken.
    pub fn decode_into(&self, id: u64, out: &mut Vec<u8>) -> bool {
        if id >= self.num_keys as u64 {
            return false;
        }
        let Some(mut npos) = self.terms.select(id as usize) else {
            return false;
        };
        let start = out.len();
        let link = self.leaves.get(npos).then(|| self.link(npos));

        while npos != 0 {
            let parent = self.check(npos);
            let code = if parent < self.num_cells() { self.base(parent) ^ npos } else { usize::MAX };
            if code >= 256 || out.len() - start == self.max_length {
                out.truncate(start);
                return false;
            }
            out.push(self.table.byte(code));
            npos = parent;
        }
        out[start..].reverse();
        if let Some(link) = link {
            out.extend_from_slice(self.tail.fragment(link));
        }
        true
    }

    /// Every stored key that is a prefix of `text`, shortest first.
    pub fn common_prefix_search<'t, 'q>(&'t self, text: &'q [u8]) -> PrefixIter<'t, 'q, 'a, C> {
        PrefixIter::new(self, text)
    }

    /// Every stored key that starts with `prefix`, in lexicographic order.
    pub fn predictive_search(&self, prefix: &[u8]) -> PredictiveIter<'_, 'a, C> {
        PredictiveIter::new(self, prefix)
    }

    /// Every stored key in lexicographic order.
    pub fn iter(&self) -> PredictiveIter<'_, 'a, C> {
        self.predictive_search(b"")
    }

    /// Serialized size in bytes, header included.
    pub fn memory_in_bytes(&self) -> usize {
        self.size_in_bytes()
    }

    pub fn stats(&self) -> TrieStats {
        let total_bytes = self.memory_in_bytes();
        TrieStats {
            num_keys: self.num_keys,
            num_cells: self.num_cells(),
            alphabet_size: self.table.alphabet_size(),
            max_length: self.max_length,
            tail_bytes: self.tail.num_bytes(),
            dac_levels: self.bc.num_levels(),
            total_bytes,
            bytes_per_key: if self.num_keys > 0 {
                total_bytes as f64 / self.num_keys as f64
            } else {
                0.0
            },
        }
    }

    // -------------------------------------------------------------------------
    // Cell access
    // -------------------------------------------------------------------------

    #[inline]
    fn base(&self, npos: usize) -> usize {
        self.bc.get(2 * npos) as usize ^ npos
    }

    #[inline]
    fn check(&self, npos: usize) -> usize {
        self.bc.get(2 * npos + 1) as usize ^ npos
    }

    #[inline]
    fn link(&self, npos: usize) -> u64 {
        self.bc.get(2 * npos)
    }

    #[inline]
    fn id_of(&self, npos: usize) -> u64 {
        self.terms.rank(npos) as u64
    }

    /// Child of internal node `npos` along `byte`, if present.
    #[inline]
    fn child(&self, npos: usize, byte: u8) -> Option<usize> {
        let cpos = self.base(npos) ^ self.table.code(byte);
        (cpos < self.num_cells() && self.check(cpos) == npos).then_some(cpos)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Writes the trie to `path`, returning the number of bytes written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<u64> {
        let file = File::create(path)?;
        self.write_to_writer(BufWriter::new(file))
    }

    /// Writes the trie to `writer`, returning the number of bytes written.
    pub fn write_to_writer<W: Write>(&self, writer: W) -> Result<u64> {
        let mut sink = WriterSink::new(writer);
        self.write_to(&mut sink)?;
        let written = sink.bytes_written();
        sink.finish()?;
        Ok(written)
    }

    /// Reads a trie from `path`, copying it into memory.
    ///
    /// Use [`io::map_file`] with [`Trie::from_bytes`] to load without copying.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Reads a trie from a byte stream, copying it into memory.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let trie = Self::read_from(&mut ReaderSource::new(reader))?;
        debug!(type_id = C::TYPE_ID, bytes = trie.memory_in_bytes(), zero_copy = false, "loaded trie");
        Ok(trie)
    }

    /// Views a trie inside `bytes`, such as a memory map.
    ///
    /// Arrays are borrowed when `bytes` is 8-byte aligned and copied
    /// otherwise.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        let trie = Self::read_from(&mut SliceSource::new(bytes))?;
        let zero_copy = bytes.as_ptr() as usize % io::ALIGN == 0;
        debug!(type_id = C::TYPE_ID, bytes = trie.memory_in_bytes(), zero_copy, "loaded trie");
        Ok(trie)
    }

    /// Reads everything after the header.
    fn read_body<S: Source<'a>>(src: &mut S) -> Result<Self> {
        let bc = C::read_from(src)?;
        let leaves = BitVector::read_from(src)?;
        let terms = BitVector::read_from(src)?;
        let tail = TailStore::read_from(src)?;
        let table = CodeTable::read_from(src)?;
        let num_keys = src.read_usize()?;
        let max_length = src.read_usize()?;

        let num_cells = leaves.len();
        io::ensure(num_cells != 0 && num_cells % build::BLOCK_SIZE == 0, || {
            format!("double array of {num_cells} cells")
        })?;
        io::ensure(bc.len() == 2 * num_cells && terms.len() == num_cells, || {
            format!(
                "{} BASE/CHECK values and {} terminal bits for {num_cells} cells",
                bc.len(),
                terms.len()
            )
        })?;
        io::ensure(terms.has_select() && terms.num_ones() == num_keys, || {
            format!("{} terminal nodes for {num_keys} keys", terms.num_ones())
        })?;
        io::ensure(max_length <= num_cells + tail.num_bytes(), || {
            format!("longest key of {max_length} bytes in a trie of {num_cells} cells")
        })?;
        for npos in (0..num_cells).filter(|&npos| leaves.get(npos)) {
            let link = bc.get(2 * npos);
            io::ensure(link < tail.num_bytes() as u64, || {
                format!("leaf {npos} links to tail byte {link} of {}", tail.num_bytes())
            })?;
        }

        Ok(Self {
            bc,
            leaves,
            terms,
            tail,
            table,
            num_keys,
            max_length,
        })
    }
}

impl<'a, C: CodeArray<'a>> Persist<'a> for Trie<'a, C> {
    fn read_from<S: Source<'a>>(src: &mut S) -> Result<Self> {
        let found: u32 = src.read_scalar()?;
        if found != C::TYPE_ID {
            return Err(Error::TypeMismatch {
                expected: C::TYPE_ID,
                found,
            });
        }
        check_version(src)?;
        Self::read_body(src)
    }

    fn write_to<W: Sink>(&self, sink: &mut W) -> Result<()> {
        sink.write_scalar(&C::TYPE_ID)?;
        sink.write_scalar(&FORMAT_VERSION)?;
        self.bc.write_to(sink)?;
        self.leaves.write_to(sink)?;
        self.terms.write_to(sink)?;
        self.tail.write_to(sink)?;
        self.table.write_to(sink)?;
        sink.write_usize(self.num_keys)?;
        sink.write_usize(self.max_length)
    }

    fn size_in_bytes(&self) -> usize {
        HEADER_BYTES
            + self.bc.size_in_bytes()
            + self.leaves.size_in_bytes()
            + self.terms.size_in_bytes()
            + self.tail.size_in_bytes()
            + self.table.size_in_bytes()
            + 2 * io::scalar_bytes::<u64>()
    }
}

impl<'a, C: CodeArray<'a>> Dictionary for Trie<'a, C> {
    fn num_keys(&self) -> usize {
        self.num_keys
    }

    fn max_length(&self) -> usize {
        self.max_length
    }

    fn lookup(&self, key: &[u8]) -> Option<u64> {
        Trie::lookup(self, key)
    }

    fn decode(&self, id: u64) -> Option<Vec<u8>> {
        Trie::decode(self, id)
    }

    fn common_prefix_search<'s>(&'s self, text: &'s [u8]) -> Box<dyn Iterator<Item = (u64, &'s [u8])> + 's> {
        Box::new(Trie::common_prefix_search(self, text))
    }

    fn predictive_search<'s>(&'s self, prefix: &[u8]) -> Box<dyn Iterator<Item = (u64, Vec<u8>)> + 's> {
        Box::new(Trie::predictive_search(self, prefix))
    }

    fn memory_in_bytes(&self) -> usize {
        self.size_in_bytes()
    }
}

impl<C> std::fmt::Debug for Trie<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trie")
            .field("num_keys", &self.num_keys)
            .field("num_cells", &self.leaves.len())
            .field("max_length", &self.max_length)
            .finish()
    }
}

// =============================================================================
// Header
// =============================================================================

fn check_version<'a, S: Source<'a>>(src: &mut S) -> Result<()> {
    let version: u32 = src.read_scalar()?;
    if version != FORMAT_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok(())
}

/// Reads the type id from the header of the dictionary file at `path`.
pub fn type_id_of(path: impl AsRef<Path>) -> Result<u32> {
    let mut header = [0u8; 4];
    File::open(path)?.read_exact(&mut header).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::Truncated(0),
        _ => e.into(),
    })?;
    Ok(u32::from_ne_bytes(header))
}

/// Reads the type id from the header of a serialized dictionary.
pub fn type_id_of_bytes(bytes: &[u8]) -> Result<u32> {
    SliceSource::new(bytes).read_scalar()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Trie15, Trie16, Trie7, Trie8};

    const KEYS: [&str; 8] = ["a", "i", "in", "inn", "tea", "ted", "ten", "to"];

    fn check_sample<'a, C: CodeArray<'a>>(trie: &Trie<'a, C>) {
        assert_eq!(trie.num_keys(), 8);
        assert_eq!(trie.max_length(), 3);
        let mut seen = [false; 8];
        for key in KEYS {
            let id = trie.lookup(key.as_bytes()).expect(key);
            assert!(id < 8 && !seen[id as usize], "{key} -> {id}");
            seen[id as usize] = true;
            assert_eq!(trie.decode(id).as_deref(), Some(key.as_bytes()));
        }
        for absent in ["", "te", "z", "tenn", "ia", "t"] {
            assert_eq!(trie.lookup(absent.as_bytes()), None, "{absent}");
        }
        assert_eq!(trie.decode(8), None);
    }

    #[test]
    fn test_sample_all_variants() {
        check_sample(&Trie7::build(&KEYS).unwrap());
        check_sample(&Trie8::build(&KEYS).unwrap());
        check_sample(&Trie15::build(&KEYS).unwrap());
        check_sample(&Trie16::build(&KEYS).unwrap());
    }

    #[test]
    fn test_prefix_search_teddy() {
        let trie = Trie8::build(&KEYS).unwrap();
        let id = |k: &[u8]| trie.lookup(k).unwrap();
        let found: Vec<_> = trie.common_prefix_search(b"teddy").collect();
        assert_eq!(found, vec![(id(b"ted"), b"ted".as_slice())]);

        let found: Vec<_> = trie.common_prefix_search(b"inner").collect();
        assert_eq!(
            found,
            vec![(id(b"i"), b"i".as_slice()), (id(b"in"), b"in".as_slice()), (id(b"inn"), b"inn".as_slice())]
        );

        assert_eq!(trie.common_prefix_search(b"xyz").count(), 0);
        assert_eq!(trie.common_prefix_search(b"").count(), 0);
    }

    #[test]
    fn test_predictive_search() {
        let trie = Trie7::build(&KEYS).unwrap();
        let found: Vec<_> = trie.predictive_search(b"te").collect();
        let keys: Vec<_> = found.iter().map(|(_, k)| k.as_slice()).collect();
        assert_eq!(keys, [b"tea", b"ted", b"ten"]);
        for (id, key) in &found {
            assert_eq!(trie.lookup(key), Some(*id));
        }
        assert_eq!(trie.predictive_search(b"inn").count(), 1);
        assert_eq!(trie.predictive_search(b"innn").count(), 0);
        assert_eq!(trie.predictive_search(b"q").count(), 0);

        let all: Vec<_> = trie.iter().map(|(_, k)| k).collect();
        assert_eq!(all, KEYS.iter().map(|k| k.as_bytes().to_vec()).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_key_and_empty_set() {
        let trie = Trie8::build(&["", "a", "ab"]).unwrap();
        let id = trie.lookup(b"").unwrap();
        assert_eq!(trie.decode(id), Some(vec![]));
        assert_eq!(trie.common_prefix_search(b"abc").count(), 3);

        let empty = Trie16::build::<&str>(&[]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.lookup(b""), None);
        assert_eq!(empty.decode(0), None);
        assert_eq!(empty.iter().count(), 0);

        let only_empty = Trie7::build(&[""]).unwrap();
        assert_eq!(only_empty.lookup(b""), Some(0));
        assert_eq!(only_empty.lookup(b"a"), None);
        assert_eq!(only_empty.common_prefix_search(b"abc").collect::<Vec<_>>(), vec![(0, b"".as_slice())]);
    }

    #[test]
    fn test_binary_keys() {
        let keys: Vec<Vec<u8>> = vec![vec![0], vec![0, 0], vec![0, 255, 0], vec![1, 2, 3], vec![255; 10]];
        let trie = Trie15::build(&keys).unwrap();
        for key in &keys {
            let id = trie.lookup(key).unwrap();
            assert_eq!(trie.decode(id).as_ref(), Some(key));
        }
        assert_eq!(trie.lookup(&[0, 255]), None);
    }

    #[test]
    fn test_rejects_unsorted() {
        assert!(matches!(Trie8::build(&["b", "a"]), Err(Error::UnsortedKeys { index: 1 })));
        assert!(matches!(Trie8::build(&["a", "a"]), Err(Error::UnsortedKeys { index: 1 })));

        let trie = Trie8::from_unsorted(["to", "a", "ten", "a"]).unwrap();
        assert_eq!(trie.num_keys(), 3);
        let id = trie.lookup(b"a").unwrap();
        assert_eq!(trie.decode(id), Some(b"a".to_vec()));
    }

    #[test]
    fn test_save_load_round_trip() {
        let trie = Trie16::build(&KEYS).unwrap();
        let mut bytes = Vec::new();
        let written = trie.write_to_writer(&mut bytes).unwrap();
        assert_eq!(written as usize, bytes.len());
        assert_eq!(trie.memory_in_bytes(), bytes.len());

        let loaded = Trie16::from_reader(bytes.as_slice()).unwrap();
        check_sample(&loaded);
        let viewed = Trie16::from_bytes(&bytes).unwrap();
        check_sample(&viewed);
        assert_eq!(type_id_of_bytes(&bytes).unwrap(), 16);
    }

    #[test]
    fn test_type_mismatch() {
        let mut bytes = Vec::new();
        Trie7::build(&KEYS).unwrap().write_to_writer(&mut bytes).unwrap();
        assert!(matches!(
            Trie8::from_bytes(&bytes),
            Err(Error::TypeMismatch { expected: 8, found: 7 })
        ));
        assert!(matches!(Trie15::from_reader(bytes.as_slice()), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_rejects_bad_version_and_truncation() {
        let mut bytes = Vec::new();
        Trie8::build(&KEYS).unwrap().write_to_writer(&mut bytes).unwrap();

        let mut bumped = bytes.clone();
        bumped[4..8].copy_from_slice(&2u32.to_ne_bytes());
        assert!(matches!(Trie8::from_bytes(&bumped), Err(Error::UnsupportedVersion(2))));

        for cut in [0, 3, 8, bytes.len() / 2, bytes.len() - 1] {
            assert!(Trie8::from_bytes(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    /// Rebuilds the BASE/CHECK array after `edit` changes its stored values.
    fn rewire<'a, C: CodeArray<'a>>(trie: &mut Trie<'a, C>, edit: impl FnOnce(&mut Vec<u64>)) {
        let mut values: Vec<u64> = (0..trie.bc.len()).map(|i| trie.bc.get(i)).collect();
        edit(&mut values);
        trie.bc = C::build(&values, LevelPolicy::default());
    }

    fn to_bytes<'a, C: CodeArray<'a>>(trie: &Trie<'a, C>) -> Vec<u8> {
        let mut bytes = Vec::new();
        trie.write_to_writer(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_decode_stops_on_cyclic_parents() {
        let mut trie = Trie8::build(&KEYS).unwrap();
        let id = trie.lookup(b"ted").unwrap();
        let npos = trie.terms.select(id as usize).unwrap();
        // CHECK(npos) = npos.
        rewire(&mut trie, |values| values[2 * npos + 1] = 0);

        let mut out = b"xy".to_vec();
        assert!(!trie.decode_into(id, &mut out));
        assert_eq!(out, b"xy");
        assert_eq!(trie.decode(id), None);
    }

    #[test]
    fn test_predictive_search_stops_on_cycles() {
        let mut trie = Trie7::build(&KEYS).unwrap();
        // BASE(0) = 0 and CHECK(0) = 0 make the root its own child.
        rewire(&mut trie, |values| {
            values[0] = 0;
            values[1] = 0;
        });
        assert!(trie.iter().count() <= trie.num_cells());
        assert!(trie.predictive_search(b"t").count() <= trie.num_cells());
    }

    #[test]
    fn test_rejects_dangling_tail_link() {
        let mut trie = Trie16::build(&["apple", "banana"]).unwrap();
        let npos = trie.terms.select(trie.lookup(b"apple").unwrap() as usize).unwrap();
        assert!(trie.leaves.get(npos));
        assert_ne!(trie.link(npos), 0);

        let past_end = trie.tail.num_bytes() as u64 + 3;
        rewire(&mut trie, |values| values[2 * npos] = past_end);
        let bytes = to_bytes(&trie);
        assert!(matches!(Trie16::from_bytes(&bytes), Err(Error::Corrupt(_))));
        assert!(matches!(Trie16::from_reader(bytes.as_slice()), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_rejects_huge_declared_sizes() {
        let bytes = to_bytes(&Trie8::build(&KEYS).unwrap());

        // Word count of the first DAC level.
        let mut patched = bytes.clone();
        patched[32..40].copy_from_slice(&(1u64 << 61).to_ne_bytes());
        assert!(matches!(Trie8::from_reader(patched.as_slice()), Err(Error::Corrupt(_))));
        assert!(matches!(Trie8::from_bytes(&patched), Err(Error::Corrupt(_))));

        patched[32..40].copy_from_slice(&(1u64 << 40).to_ne_bytes());
        assert!(matches!(Trie8::from_reader(patched.as_slice()), Err(Error::Truncated(_))));
        assert!(matches!(Trie8::from_bytes(&patched), Err(Error::Truncated(_))));

        // Longest key length, the last field.
        let mut patched = bytes.clone();
        let at = patched.len() - 8;
        patched[at..].copy_from_slice(&u64::MAX.to_ne_bytes());
        assert!(matches!(Trie8::from_reader(patched.as_slice()), Err(Error::Corrupt(_))));
        assert!(matches!(Trie8::from_bytes(&patched), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_stats() {
        let trie = Trie8::build(&KEYS).unwrap();
        let stats = trie.stats();
        println!("{stats:?}");
        assert_eq!(stats.num_keys, 8);
        assert_eq!(stats.alphabet_size, 7);
        assert_eq!(stats.num_cells % 256, 0);
        assert_eq!(stats.total_bytes, trie.memory_in_bytes());
        assert!(stats.bytes_per_key > 0.0);
    }
}
