use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::io::{ReaderSource, SliceSource, Source};
use crate::{Trie15, Trie16, Trie7, Trie8};

use super::{check_version, Dictionary, Trie, TrieStats};

/// A trie of any variant, chosen from the file header at load time.
#[derive(Debug)]
pub enum AnyTrie<'a> {
    Trie7(Trie7<'a>),
    Trie8(Trie8<'a>),
    Trie15(Trie15<'a>),
    Trie16(Trie16<'a>),
}

macro_rules! dispatch {
    ($self:expr, $trie:ident => $body:expr) => {
        match $self {
            AnyTrie::Trie7($trie) => $body,
            AnyTrie::Trie8($trie) => $body,
            AnyTrie::Trie15($trie) => $body,
            AnyTrie::Trie16($trie) => $body,
        }
    };
}

impl<'a> AnyTrie<'a> {
    /// Type ids this crate can load.
    pub const TYPE_IDS: [u32; 4] = [7, 8, 15, 16];

    /// Reads a trie of any variant from `path`, copying it into memory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Reads a trie of any variant from a byte stream.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::read(&mut ReaderSource::new(reader))
    }

    /// Views a trie of any variant inside `bytes`, such as a memory map.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        Self::read(&mut SliceSource::new(bytes))
    }

    fn read<S: Source<'a>>(src: &mut S) -> Result<Self> {
        let type_id: u32 = src.read_scalar()?;
        if !Self::TYPE_IDS.contains(&type_id) {
            return Err(Error::UnknownType(type_id));
        }
        check_version(src)?;

        let trie = match type_id {
            7 => AnyTrie::Trie7(Trie::read_body(src)?),
            8 => AnyTrie::Trie8(Trie::read_body(src)?),
            15 => AnyTrie::Trie15(Trie::read_body(src)?),
            _ => AnyTrie::Trie16(Trie::read_body(src)?),
        };
        debug!(type_id, keys = trie.num_keys(), "loaded trie by header");
        Ok(trie)
    }

    pub fn type_id(&self) -> u32 {
        dispatch!(self, t => t.type_id())
    }

    pub fn stats(&self) -> TrieStats {
        dispatch!(self, t => t.stats())
    }

    /// Writes the trie to `path`, returning the number of bytes written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<u64> {
        dispatch!(self, t => t.save(path))
    }
}

impl Dictionary for AnyTrie<'_> {
    fn num_keys(&self) -> usize {
        dispatch!(self, t => t.num_keys())
    }

    fn max_length(&self) -> usize {
        dispatch!(self, t => t.max_length())
    }

    fn lookup(&self, key: &[u8]) -> Option<u64> {
        dispatch!(self, t => t.lookup(key))
    }

    fn decode(&self, id: u64) -> Option<Vec<u8>> {
        dispatch!(self, t => t.decode(id))
    }

    fn common_prefix_search<'s>(&'s self, text: &'s [u8]) -> Box<dyn Iterator<Item = (u64, &'s [u8])> + 's> {
        dispatch!(self, t => Box::new(t.common_prefix_search(text)))
    }

    fn predictive_search<'s>(&'s self, prefix: &[u8]) -> Box<dyn Iterator<Item = (u64, Vec<u8>)> + 's> {
        dispatch!(self, t => Box::new(t.predictive_search(prefix)))
    }

    fn memory_in_bytes(&self) -> usize {
        dispatch!(self, t => t.memory_in_bytes())
    }
}

macro_rules! impl_from {
    ($($variant:ident),*) => {
        $(
            impl<'a> From<$variant<'a>> for AnyTrie<'a> {
                fn from(trie: $variant<'a>) -> Self {
                    AnyTrie::$variant(trie)
                }
            }
        )*
    };
}

impl_from!(Trie7, Trie8, Trie15, Trie16);
