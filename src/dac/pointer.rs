use std::borrow::Cow;

use crate::bit_packed::BitPackedArray;
use crate::error::Result;
use crate::io::{self, Persist, Sink, Source};

use super::{CodeArray, LevelPolicy};

/// Number of pointer levels before the final full-width level.
const POINTER_LEVELS: usize = 2;

/// One pointer level: `payload + 1`-bit units, low bit = overflow flag.
///
/// A unit with the flag clear holds the value itself. A unit with the flag set
/// holds the number of overflowing units before it in its block of
/// `2^payload` units; adding the block's entry in `ranks` gives the index in
/// the next level.
#[derive(Clone, Debug)]
struct PointerLevel<'a> {
    units: BitPackedArray<'a>,
    ranks: Cow<'a, [u64]>,
    payload: u32,
}

impl<'a> PointerLevel<'a> {
    /// Splits `values` into this level and the values that overflow it.
    fn build(values: &[u64], payload: u32) -> (Self, Vec<u64>) {
        let block = 1usize << payload;
        let mut units = Vec::with_capacity(values.len());
        let mut ranks = Vec::with_capacity(values.len().div_ceil(block));
        let mut overflow = Vec::new();

        for (i, &v) in values.iter().enumerate() {
            if i % block == 0 {
                ranks.push(overflow.len() as u64);
            }
            if v >> payload == 0 {
                units.push(v << 1);
            } else {
                let offset = overflow.len() as u64 - ranks[ranks.len() - 1];
                units.push((offset << 1) | 1);
                overflow.push(v);
            }
        }

        let level = Self {
            units: BitPackedArray::with_width(&units, payload + 1),
            ranks: Cow::Owned(ranks),
            payload,
        };
        (level, overflow)
    }

    /// Checks that every pointer is the one [`PointerLevel::build`] writes and
    /// that exactly `next_len` values overflow.
    fn validate(&self, next_len: usize) -> Result<()> {
        let block = 1usize << self.payload;
        let mut overflow = 0u64;
        for i in 0..self.units.len() {
            let start = self.ranks[i / block];
            if i % block == 0 {
                io::ensure(start == overflow, || {
                    format!("pointer DAC block {} starts at {start}, expected {overflow}", i / block)
                })?;
            }
            let unit = self.units.get(i);
            if unit & 1 == 1 {
                io::ensure(unit >> 1 == overflow - start, || format!("pointer DAC unit {i} is misdirected"))?;
                overflow += 1;
            }
        }
        io::ensure(overflow == next_len as u64, || {
            format!("pointer DAC level overflows {overflow} values into {next_len}")
        })
    }
}

/// DAC whose overflowing entries point directly into the next level.
///
/// Payload widths are `FIRST` then `2 * FIRST + 1` (7 then 15, or 15 then 31);
/// values too large for both live whole in a final bit-packed level.
#[derive(Clone, Debug)]
pub struct PointerDac<'a, const FIRST: u32> {
    levels: Vec<PointerLevel<'a>>,
    last: BitPackedArray<'a>,
}

impl<'a, const FIRST: u32> PointerDac<'a, FIRST> {
    const VALID: () = assert!(FIRST == 7 || FIRST == 15, "pointer-based DACs use 7 or 15 payload bits");

    fn payloads() -> [u32; POINTER_LEVELS] {
        [FIRST, 2 * FIRST + 1]
    }
}

impl<'a, const FIRST: u32> CodeArray<'a> for PointerDac<'a, FIRST> {
    const TYPE_ID: u32 = {
        let () = Self::VALID;
        FIRST
    };

    fn build(values: &[u64], _policy: LevelPolicy) -> Self {
        let mut levels = Vec::with_capacity(POINTER_LEVELS);
        let mut current = values.to_vec();
        for payload in Self::payloads() {
            let (level, overflow) = PointerLevel::build(&current, payload);
            levels.push(level);
            current = overflow;
        }
        tracing::trace!(
            first = FIRST,
            overflow = levels[0].ranks.last().copied().unwrap_or(0),
            wide = current.len(),
            "built pointer-based DAC"
        );

        Self {
            levels,
            last: BitPackedArray::from_values(&current),
        }
    }

    #[inline]
    fn get(&self, i: usize) -> u64 {
        let mut pos = i;
        for level in &self.levels {
            let unit = level.units.get(pos);
            if unit & 1 == 0 {
                return unit >> 1;
            }
            pos = level.ranks[pos >> level.payload] as usize + (unit >> 1) as usize;
        }
        self.last.get(pos)
    }

    fn len(&self) -> usize {
        self.levels[0].units.len()
    }

    fn num_levels(&self) -> usize {
        POINTER_LEVELS + 1
    }
}

impl<'a, const FIRST: u32> Persist<'a> for PointerDac<'a, FIRST> {
    fn read_from<S: Source<'a>>(src: &mut S) -> Result<Self> {
        let mut levels = Vec::with_capacity(POINTER_LEVELS);
        for payload in Self::payloads() {
            let units = BitPackedArray::read_from(src)?;
            let ranks = src.read_array::<u64>()?;
            io::ensure(units.width() == payload + 1, || {
                format!("pointer DAC level is {} bits wide, expected {}", units.width(), payload + 1)
            })?;
            io::ensure(ranks.len() == units.len().div_ceil(1usize << payload), || {
                format!("pointer DAC level has {} block ranks for {} units", ranks.len(), units.len())
            })?;
            levels.push(PointerLevel { units, ranks, payload });
        }
        let last = BitPackedArray::read_from(src)?;

        for (j, level) in levels.iter().enumerate() {
            let next_len = levels.get(j + 1).map_or(last.len(), |next| next.units.len());
            level.validate(next_len)?;
        }
        Ok(Self { levels, last })
    }

    fn write_to<W: Sink>(&self, sink: &mut W) -> Result<()> {
        for level in &self.levels {
            level.units.write_to(sink)?;
            sink.write_array(&level.ranks)?;
        }
        self.last.write_to(sink)
    }

    fn size_in_bytes(&self) -> usize {
        self.levels
            .iter()
            .map(|l| l.units.size_in_bytes() + io::array_bytes::<u64>(l.ranks.len()))
            .sum::<usize>()
            + self.last.size_in_bytes()
    }
}
