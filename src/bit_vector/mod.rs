//! Bit vector with rank/select support.
//!
//! # Layout
//!
//! - Raw bits in 64-bit words, least significant bit first.
//! - Rank directory: one [`RankTip`] per 256-bit block holding the number of
//!   ones before the block (`l1`) and the number of ones before each 32-bit
//!   sub-block within the block (`l2`). A sentinel tip follows the last block.
//! - Select directory: the rank block containing every 512th one.
//!
//! `rank(i)` is a tip lookup plus one popcount over less than 32 bits.
//! `select(k)` jumps to the sampled block, binary searches the tips up to the
//! next sample, then scans the block's sub-blocks.
//!
//! Both directories are optional; a vector built without them only answers
//! [`BitVector::get`].

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};

use crate::error::Result;
use crate::io::{self, Persist, Sink, Source};

const WORD_BITS: usize = 64;
const BLOCK_BITS: usize = 256;
const SUB_BITS: usize = 32;
const SUBS_PER_BLOCK: usize = BLOCK_BITS / SUB_BITS; // 8
const ONES_PER_SELECT_TIP: usize = 512;

/// Rank directory entry for one 256-bit block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RankTip {
    /// Ones before this block.
    pub l1: u32,
    /// Ones before each 32-bit sub-block, relative to the block start.
    pub l2: [u8; SUBS_PER_BLOCK],
}

// =============================================================================
// Builder
// =============================================================================

/// Accumulates bits before a [`BitVector`] is frozen.
#[derive(Clone, Debug, Default)]
pub struct BitVectorBuilder {
    words: Vec<u64>,
    len: usize,
}

impl BitVectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder holding `len` zero bits.
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut builder = Self::new();
        for bit in bits {
            builder.push(bit);
        }
        builder
    }

    pub fn push(&mut self, bit: bool) {
        if self.len % WORD_BITS == 0 {
            self.words.push(0);
        }
        if bit {
            self.words[self.len / WORD_BITS] |= 1 << (self.len % WORD_BITS);
        }
        self.len += 1;
    }

    pub fn set(&mut self, i: usize, bit: bool) {
        assert!(i < self.len, "bit {i} out of range for length {}", self.len);
        let mask = 1u64 << (i % WORD_BITS);
        if bit {
            self.words[i / WORD_BITS] |= mask;
        } else {
            self.words[i / WORD_BITS] &= !mask;
        }
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// =============================================================================
// BitVector
// =============================================================================

/// Immutable bit vector with optional rank and select directories.
#[derive(Clone)]
pub struct BitVector<'a> {
    bits: Cow<'a, [u64]>,
    rank_tips: Cow<'a, [RankTip]>,
    select_tips: Cow<'a, [u32]>,
    len: usize,
    num_ones: usize,
}

impl<'a> BitVector<'a> {
    /// Freezes `builder`, building the rank directory if `with_rank` and the
    /// select directory if `with_select` (select implies rank).
    ///
    /// The number of ones must fit in 32 bits when a directory is built.
    pub fn new(builder: BitVectorBuilder, with_rank: bool, with_select: bool) -> Self {
        let BitVectorBuilder { words, len } = builder;
        let num_ones = words.iter().map(|w| w.count_ones() as usize).sum();

        let with_rank = with_rank || with_select;
        let rank_tips = if with_rank { build_rank_tips(&words, len) } else { Vec::new() };
        let select_tips = if with_select { build_select_tips(&rank_tips) } else { Vec::new() };

        Self {
            bits: Cow::Owned(words),
            rank_tips: Cow::Owned(rank_tips),
            select_tips: Cow::Owned(select_tips),
            len,
            num_ones,
        }
    }

    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I, with_rank: bool, with_select: bool) -> Self {
        Self::new(BitVectorBuilder::from_bits(bits), with_rank, with_select)
    }

    /// Returns bit `i`; `i` must be below [`Self::len`].
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        (self.bits[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    /// Number of ones in `[0, i)`, for `i <= len`.
    ///
    /// Requires the rank directory.
    #[inline]
    pub fn rank(&self, i: usize) -> usize {
        debug_assert!(i <= self.len);
        debug_assert!(self.has_rank(), "rank directory was not built");
        let tip = &self.rank_tips[i / BLOCK_BITS];
        let mut r = tip.l1 as usize + tip.l2[(i % BLOCK_BITS) / SUB_BITS] as usize;
        let rem = i % SUB_BITS;
        if rem != 0 {
            let sub = (self.bits[i / WORD_BITS] >> ((i / SUB_BITS) % 2 * SUB_BITS)) as u32;
            r += (sub & ((1u32 << rem) - 1)).count_ones() as usize;
        }
        r
    }

    /// Position of the `k`-th one (0-indexed), or `None` if `k >= num_ones`.
    ///
    /// Requires the select directory.
    pub fn select(&self, k: usize) -> Option<usize> {
        if k >= self.num_ones {
            return None;
        }
        debug_assert!(self.has_select(), "select directory was not built");

        // Blocks [lo, hi) are candidates: the last tip with l1 <= k.
        let sample = k / ONES_PER_SELECT_TIP;
        let mut lo = self.select_tips[sample] as usize;
        let mut hi = match self.select_tips.get(sample + 1) {
            Some(&next) => next as usize + 1,
            None => self.rank_tips.len() - 1,
        };
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.rank_tips[mid].l1 as usize <= k {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let tip = &self.rank_tips[lo];
        let mut rest = k - tip.l1 as usize;
        let mut sub = SUBS_PER_BLOCK - 1;
        while tip.l2[sub] as usize > rest {
            sub -= 1;
        }
        rest -= tip.l2[sub] as usize;

        let sub_index = lo * SUBS_PER_BLOCK + sub;
        let word = (self.bits[sub_index * SUB_BITS / WORD_BITS] >> (sub_index % 2 * SUB_BITS)) as u32;
        Some(sub_index * SUB_BITS + select_in_word(word, rest))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn num_ones(&self) -> usize {
        self.num_ones
    }

    #[inline]
    pub fn num_zeros(&self) -> usize {
        self.len - self.num_ones
    }

    #[inline]
    pub fn has_rank(&self) -> bool {
        !self.rank_tips.is_empty()
    }

    #[inline]
    pub fn has_select(&self) -> bool {
        // An empty select directory is valid when there are no ones.
        self.has_rank() && (self.num_ones == 0 || !self.select_tips.is_empty())
    }

    /// Iterates over every bit.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

fn build_rank_tips(words: &[u64], len: usize) -> Vec<RankTip> {
    let num_blocks = len.div_ceil(BLOCK_BITS);
    let mut tips = Vec::with_capacity(num_blocks + 1);
    let mut total = 0usize;

    for block in 0..num_blocks {
        let mut tip = RankTip {
            l1: to_l1(total),
            l2: [0; SUBS_PER_BLOCK],
        };
        let mut in_block = 0usize;
        for (sub, l2) in tip.l2.iter_mut().enumerate() {
            *l2 = in_block as u8;
            let sub_index = block * SUBS_PER_BLOCK + sub;
            let word = words.get(sub_index * SUB_BITS / WORD_BITS).copied().unwrap_or(0);
            in_block += ((word >> (sub_index % 2 * SUB_BITS)) as u32).count_ones() as usize;
        }
        total += in_block;
        tips.push(tip);
    }

    // Sentinel so rank(len) works when len is a multiple of the block size.
    tips.push(RankTip {
        l1: to_l1(total),
        l2: [0; SUBS_PER_BLOCK],
    });
    tips
}

fn build_select_tips(rank_tips: &[RankTip]) -> Vec<u32> {
    let mut tips = Vec::new();
    let num_blocks = rank_tips.len() - 1;
    for block in 0..num_blocks {
        let before = rank_tips[block].l1 as usize;
        let after = rank_tips[block + 1].l1 as usize;
        // Every multiple of ONES_PER_SELECT_TIP in [before, after) lies in this block.
        let mut next = tips.len() * ONES_PER_SELECT_TIP;
        while next >= before && next < after {
            tips.push(block as u32);
            next += ONES_PER_SELECT_TIP;
        }
    }
    tips
}

#[inline]
fn to_l1(count: usize) -> u32 {
    debug_assert!(count <= u32::MAX as usize, "rank directory overflow");
    count as u32
}

/// Position of the `k`-th one in `word` (`k` below its popcount).
#[inline]
fn select_in_word(mut word: u32, k: usize) -> usize {
    debug_assert!(k < word.count_ones() as usize);
    for _ in 0..k {
        word &= word - 1;
    }
    word.trailing_zeros() as usize
}

impl<'a> Persist<'a> for BitVector<'a> {
    fn read_from<S: Source<'a>>(src: &mut S) -> Result<Self> {
        let len = src.read_usize()?;
        let num_ones = src.read_usize()?;
        let bits = src.read_array::<u64>()?;
        let rank_tips = src.read_array::<RankTip>()?;
        let select_tips = src.read_array::<u32>()?;

        io::ensure(bits.len() == len.div_ceil(WORD_BITS), || {
            format!("bit vector of {len} bits stored in {} words", bits.len())
        })?;
        let spare = len % WORD_BITS;
        io::ensure(spare == 0 || bits.last().is_some_and(|w| w >> spare == 0), || {
            format!("bit vector has ones past its {len} bits")
        })?;
        let popcount: usize = bits.iter().map(|w| w.count_ones() as usize).sum();
        io::ensure(popcount == num_ones, || format!("bit vector claims {num_ones} ones, holds {popcount}"))?;

        // Directories must equal what `BitVector::new` builds from these bits.
        if !rank_tips.is_empty() {
            io::ensure(rank_tips.len() == len.div_ceil(BLOCK_BITS) + 1, || {
                format!("rank directory has {} tips for {len} bits", rank_tips.len())
            })?;
            io::ensure(*rank_tips == *build_rank_tips(&bits, len), || {
                "rank directory disagrees with the bits".to_string()
            })?;
        }
        if !select_tips.is_empty() {
            io::ensure(!rank_tips.is_empty(), || "select directory without rank directory".to_string())?;
            io::ensure(*select_tips == *build_select_tips(&rank_tips), || {
                format!("select directory of {} tips disagrees with the rank directory", select_tips.len())
            })?;
        }

        Ok(Self {
            bits,
            rank_tips,
            select_tips,
            len,
            num_ones,
        })
    }

    fn write_to<W: Sink>(&self, sink: &mut W) -> Result<()> {
        sink.write_usize(self.len)?;
        sink.write_usize(self.num_ones)?;
        sink.write_array(&self.bits)?;
        sink.write_array(&self.rank_tips)?;
        sink.write_array(&self.select_tips)
    }

    fn size_in_bytes(&self) -> usize {
        2 * io::scalar_bytes::<u64>()
            + io::array_bytes::<u64>(self.bits.len())
            + io::array_bytes::<RankTip>(self.rank_tips.len())
            + io::array_bytes::<u32>(self.select_tips.len())
    }
}

impl std::fmt::Debug for BitVector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitVector")
            .field("len", &self.len)
            .field("ones", &self.num_ones)
            .field("rank", &self.has_rank())
            .field("select", &self.has_select())
            .finish()
    }
}
