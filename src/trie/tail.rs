use std::borrow::Cow;

use crate::bit_vector::{BitVector, BitVectorBuilder};
use crate::error::Result;
use crate::io::{self, Persist, Sink, Source};

/// Key suffixes below the leaves of the double array.
///
/// Fragments are stored back to back; `ends` marks the last byte of each, so
/// fragments may contain any byte. Position 0 holds a dummy byte and link 0
/// stands for the empty fragment. A fragment that is a suffix of another one
/// shares its bytes.
#[derive(Clone, Debug)]
pub(crate) struct TailStore<'a> {
    chars: Cow<'a, [u8]>,
    ends: BitVector<'a>,
}

impl<'a> TailStore<'a> {
    /// Stores `suffixes` and returns the link of each, in input order.
    pub(crate) fn build(suffixes: &[&[u8]]) -> (Self, Vec<u64>) {
        let mut order: Vec<usize> = (0..suffixes.len()).collect();
        order.sort_by(|&a, &b| suffixes[b].iter().rev().cmp(suffixes[a].iter().rev()));

        let mut chars = vec![0u8];
        let mut ends = BitVectorBuilder::new();
        ends.push(true);
        let mut links = vec![0u64; suffixes.len()];
        let mut prev: Option<(&[u8], u64)> = None;

        for i in order {
            let suffix = suffixes[i];
            if suffix.is_empty() {
                continue;
            }
            let link = match prev {
                Some((p, plink)) if p.ends_with(suffix) => plink + (p.len() - suffix.len()) as u64,
                _ => {
                    let link = chars.len() as u64;
                    chars.extend_from_slice(suffix);
                    for j in 0..suffix.len() {
                        ends.push(j + 1 == suffix.len());
                    }
                    link
                }
            };
            links[i] = link;
            prev = Some((suffix, link));
        }

        let store = Self {
            chars: Cow::Owned(chars),
            ends: BitVector::new(ends, false, false),
        };
        (store, links)
    }

    /// The fragment at `link`.
    pub(crate) fn fragment(&self, link: u64) -> &[u8] {
        let start = link as usize;
        if start == 0 {
            return &[];
        }
        let mut end = start;
        while !self.ends.get(end) {
            end += 1;
        }
        &self.chars[start..=end]
    }

    /// Whether the fragment at `link` equals `rest`.
    #[inline]
    pub(crate) fn matches(&self, link: u64, rest: &[u8]) -> bool {
        self.prefix_len(link, rest) == Some(rest.len())
    }

    /// Length of the fragment at `link` if it is a prefix of `text`.
    pub(crate) fn prefix_len(&self, link: u64, text: &[u8]) -> Option<usize> {
        let start = link as usize;
        if start == 0 {
            return Some(0);
        }
        for (n, &b) in text.iter().enumerate() {
            let pos = start + n;
            if self.chars[pos] != b {
                return None;
            }
            if self.ends.get(pos) {
                return Some(n + 1);
            }
        }
        None
    }

    /// Total stored bytes, dummy included.
    pub(crate) fn num_bytes(&self) -> usize {
        self.chars.len()
    }
}

impl<'a> Persist<'a> for TailStore<'a> {
    fn read_from<S: Source<'a>>(src: &mut S) -> Result<Self> {
        let chars = src.read_array::<u8>()?;
        let ends = BitVector::read_from(src)?;
        io::ensure(!chars.is_empty() && ends.len() == chars.len(), || {
            format!("tail of {} bytes with {} end bits", chars.len(), ends.len())
        })?;
        io::ensure(ends.get(0) && ends.get(ends.len() - 1), || "tail fragments are not terminated".to_string())?;
        Ok(Self { chars, ends })
    }

    fn write_to<W: Sink>(&self, sink: &mut W) -> Result<()> {
        sink.write_array(&self.chars)?;
        self.ends.write_to(sink)
    }

    fn size_in_bytes(&self) -> usize {
        io::array_bytes::<u8>(self.chars.len()) + self.ends.size_in_bytes()
    }
}
