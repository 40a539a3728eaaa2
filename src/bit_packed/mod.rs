//! Fixed-width integer array packed into 64-bit words.
//!
//! Element `i` occupies bits `[i * width, (i + 1) * width)` of the conceptual
//! bit stream, least significant bit first. An element may straddle two
//! adjacent words.

use std::borrow::Cow;

use crate::error::Result;
use crate::io::{self, Persist, Sink, Source};

const WORD_BITS: usize = 64;

/// Mask with the low `width` bits set (`width` in `1..=64`).
#[inline]
pub(crate) fn low_mask(width: u32) -> u64 {
    debug_assert!((1..=64).contains(&width));
    u64::MAX >> (64 - width)
}

/// Number of bits needed to represent `value` (at least 1).
#[inline]
pub(crate) fn bits_needed(value: u64) -> u32 {
    (64 - value.leading_zeros()).max(1)
}

/// Immutable array of `len` unsigned integers, `width` bits each.
#[derive(Clone)]
pub struct BitPackedArray<'a> {
    chunks: Cow<'a, [u64]>,
    len: usize,
    width: u32,
    mask: u64,
}

impl<'a> BitPackedArray<'a> {
    /// Packs `values` using the smallest width that fits the largest value.
    pub fn from_values(values: &[u64]) -> Self {
        let max = values.iter().copied().max().unwrap_or(0);
        Self::with_width(values, bits_needed(max))
    }

    /// Packs `values` with an explicit `width`.
    ///
    /// Every value must be below `2^width`.
    pub fn with_width(values: &[u64], width: u32) -> Self {
        assert!((1..=64).contains(&width), "width must be in 1..=64, got {width}");
        let mask = low_mask(width);
        let w = width as usize;
        let mut chunks = vec![0u64; num_chunks(values.len(), width)];

        for (i, &value) in values.iter().enumerate() {
            debug_assert_eq!(value & !mask, 0, "value {value} does not fit in {width} bits");
            let bit = i * w;
            let (pos, offset) = (bit / WORD_BITS, bit % WORD_BITS);
            chunks[pos] |= value << offset;
            if offset + w > WORD_BITS {
                chunks[pos + 1] |= value >> (WORD_BITS - offset);
            }
        }

        Self {
            chunks: Cow::Owned(chunks),
            len: values.len(),
            width,
            mask,
        }
    }

    /// Returns the value at `i`.
    ///
    /// `i` must be below [`Self::len`].
    #[inline]
    pub fn get(&self, i: usize) -> u64 {
        debug_assert!(i < self.len);
        let bit = i * self.width as usize;
        let (pos, offset) = (bit / WORD_BITS, bit % WORD_BITS);
        if offset + self.width as usize <= WORD_BITS {
            (self.chunks[pos] >> offset) & self.mask
        } else {
            ((self.chunks[pos] >> offset) | (self.chunks[pos + 1] << (WORD_BITS - offset))) & self.mask
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bits per element.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

#[inline]
fn num_chunks(len: usize, width: u32) -> usize {
    (len * width as usize).div_ceil(WORD_BITS)
}

impl<'a> Persist<'a> for BitPackedArray<'a> {
    fn read_from<S: Source<'a>>(src: &mut S) -> Result<Self> {
        let len = src.read_usize()?;
        let width: u64 = src.read_scalar()?;
        let chunks = src.read_array::<u64>()?;

        io::ensure((1..=64).contains(&width), || format!("bit-packed width {width} out of range"))?;
        let width = width as u32;
        let needed = len
            .checked_mul(width as usize)
            .map(|bits| bits.div_ceil(WORD_BITS));
        io::ensure(needed == Some(chunks.len()), || {
            format!("bit-packed array of {len} x {width} bits stored in {} words", chunks.len())
        })?;

        Ok(Self {
            chunks,
            len,
            width,
            mask: low_mask(width),
        })
    }

    fn write_to<W: Sink>(&self, sink: &mut W) -> Result<()> {
        sink.write_usize(self.len)?;
        sink.write_scalar(&u64::from(self.width))?;
        sink.write_array(&self.chunks)
    }

    fn size_in_bytes(&self) -> usize {
        2 * io::scalar_bytes::<u64>() + io::array_bytes::<u64>(self.chunks.len())
    }
}

impl std::fmt::Debug for BitPackedArray<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitPackedArray")
            .field("len", &self.len)
            .field("width", &self.width)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{SliceSource, WriterSink};

    #[test]
    fn test_minimal_width() {
        assert_eq!(BitPackedArray::from_values(&[]).width(), 1);
        assert_eq!(BitPackedArray::from_values(&[0, 0]).width(), 1);
        assert_eq!(BitPackedArray::from_values(&[1, 2, 3]).width(), 2);
        assert_eq!(BitPackedArray::from_values(&[255]).width(), 8);
        assert_eq!(BitPackedArray::from_values(&[256]).width(), 9);
        assert_eq!(BitPackedArray::from_values(&[u64::MAX]).width(), 64);
    }

    #[test]
    fn test_every_width() {
        for width in 1..=64u32 {
            let mask = low_mask(width);
            let values: Vec<u64> = (0..200u64)
                .map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(i as u32) & mask)
                .collect();
            let arr = BitPackedArray::with_width(&values, width);
            assert_eq!(arr.len(), values.len());
            for (i, &v) in values.iter().enumerate() {
                assert_eq!(arr.get(i), v, "width {width}, index {i}");
            }
        }
    }

    #[test]
    fn test_straddling_word_boundary() {
        // 5 * 13 = 65: element 4 starts at bit 52 and ends in the second word.
        let values = [0x1FFF, 0, 0x1555, 0x0AAA, 0x1ABC, 0x1FFF];
        let arr = BitPackedArray::with_width(&values, 13);
        assert_eq!(arr.iter().collect::<Vec<_>>(), values);
    }

    #[test]
    fn test_persist() {
        let values: Vec<u64> = (0..1000).map(|i| i * 37 % 1021).collect();
        let arr = BitPackedArray::from_values(&values);

        let mut sink = WriterSink::new(Vec::new());
        arr.write_to(&mut sink).unwrap();
        assert_eq!(sink.bytes_written() as usize, arr.size_in_bytes());
        let bytes = sink.finish().unwrap();

        let loaded = BitPackedArray::read_from(&mut SliceSource::new(&bytes)).unwrap();
        assert_eq!(loaded.width(), arr.width());
        assert_eq!(loaded.iter().collect::<Vec<_>>(), values);
    }

    #[test]
    fn test_rejects_bad_width() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_usize(4).unwrap();
        sink.write_scalar(&65u64).unwrap();
        sink.write_array(&[0u64; 5]).unwrap();
        let bytes = sink.finish().unwrap();

        assert!(BitPackedArray::read_from(&mut SliceSource::new(&bytes)).is_err());
    }
}
