use crate::bit_packed::{low_mask, BitPackedArray};
use crate::bit_vector::{BitVector, BitVectorBuilder};
use crate::error::Result;
use crate::io::{self, Persist, Sink, Source};

use super::{CodeArray, LevelPolicy};

/// Cost of one overflow flag in eighths of a bit: the flag itself plus the
/// rank directory (12 bytes per 256 bits).
const FLAG_COST: usize = 8 + 3;

/// DAC whose levels are linked by rank over per-level overflow bitmaps.
///
/// Level `j` stores bits `[s_j, s_j + w_j)` of every value that reaches it.
/// `flags[j]` marks the entries of level `j` that continue; the position in
/// level `j + 1` is the rank of that flag.
#[derive(Clone, Debug)]
pub struct StandardDac<'a, const FIRST: u32> {
    levels: Vec<BitPackedArray<'a>>,
    flags: Vec<BitVector<'a>>,
}

impl<'a, const FIRST: u32> StandardDac<'a, FIRST> {
    const VALID: () = assert!(FIRST == 8 || FIRST == 16, "standard DACs use 8- or 16-bit first levels");

    /// Widths of every level, first level included.
    pub fn widths(&self) -> Vec<u32> {
        self.levels.iter().map(BitPackedArray::width).collect()
    }
}

impl<'a, const FIRST: u32> CodeArray<'a> for StandardDac<'a, FIRST> {
    const TYPE_ID: u32 = {
        let () = Self::VALID;
        FIRST
    };

    fn build(values: &[u64], policy: LevelPolicy) -> Self {
        let widths = plan_widths(values, FIRST, policy);
        tracing::trace!(first = FIRST, widths = ?widths, "chose DAC level widths");

        let mut levels = Vec::with_capacity(widths.len());
        let mut flags = Vec::with_capacity(widths.len() - 1);
        let mut current = values.to_vec();
        let mut shift = 0u32;

        for (j, &width) in widths.iter().enumerate() {
            let chunks: Vec<u64> = current.iter().map(|&v| (v >> shift) & low_mask(width)).collect();
            levels.push(BitPackedArray::with_width(&chunks, width));
            shift += width;

            if j + 1 == widths.len() {
                break;
            }
            let mut bits = BitVectorBuilder::new();
            let mut next = Vec::new();
            for &v in &current {
                let continues = shift < 64 && v >> shift != 0;
                bits.push(continues);
                if continues {
                    next.push(v);
                }
            }
            flags.push(BitVector::new(bits, true, false));
            current = next;
        }

        Self { levels, flags }
    }

    #[inline]
    fn get(&self, i: usize) -> u64 {
        let first = &self.levels[0];
        let mut value = first.get(i);
        let mut shift = first.width();
        let mut pos = i;
        for (flags, level) in self.flags.iter().zip(&self.levels[1..]) {
            if !flags.get(pos) {
                break;
            }
            pos = flags.rank(pos);
            value |= level.get(pos) << shift;
            shift += level.width();
        }
        value
    }

    fn len(&self) -> usize {
        self.levels[0].len()
    }

    fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

/// Chooses level widths for `values` with a fixed `first` width.
fn plan_widths(values: &[u64], first: u32, policy: LevelPolicy) -> Vec<u32> {
    let max_bits = values.iter().map(|v| 64 - v.leading_zeros()).max().unwrap_or(0);
    if max_bits <= first {
        return vec![first];
    }

    match policy {
        LevelPolicy::Uniform => {
            let mut widths = vec![first];
            let mut covered = first;
            while covered < max_bits {
                let w = first.min(max_bits - covered);
                widths.push(w);
                covered += w;
            }
            widths
        }
        LevelPolicy::Optimal { max_levels } => {
            let mut widths = vec![first];
            widths.extend(optimal_tail(values, first as usize, max_bits as usize, max_levels.max(2) - 1));
            widths
        }
    }
}

/// Widths covering bits `[start, max_bits)` with at most `max_levels` levels,
/// minimising data bits plus flag bits.
fn optimal_tail(values: &[u64], start: usize, max_bits: usize, max_levels: usize) -> Vec<u32> {
    // reaching[b]: entries whose bit length exceeds b, i.e. entries present in
    // a level that starts at bit b.
    let mut hist = [0usize; 65];
    for &v in values {
        hist[(64 - v.leading_zeros()) as usize] += 1;
    }
    let mut reaching = [0usize; 65];
    for b in (0..64).rev() {
        reaching[b] = reaching[b + 1] + hist[b + 1];
    }

    // best[k][s]: cost (eighths of a bit) of bits [s, max_bits) with <= k levels.
    const INF: usize = usize::MAX;
    let mut best = vec![[INF; 65]; max_levels + 1];
    let mut cut = vec![[0usize; 65]; max_levels + 1];
    for k in 1..=max_levels {
        best[k][max_bits] = 0;
        for s in (start..max_bits).rev() {
            let n = reaching[s];
            for e in s + 1..=max_bits {
                let data = n * (e - s) * 8;
                let cost = if e == max_bits {
                    data
                } else if best[k - 1][e] != INF {
                    data + n * FLAG_COST + best[k - 1][e]
                } else {
                    continue;
                };
                if cost < best[k][s] {
                    best[k][s] = cost;
                    cut[k][s] = e;
                }
            }
        }
    }

    let mut widths = Vec::new();
    let (mut k, mut s) = (max_levels, start);
    while s < max_bits {
        let e = cut[k][s];
        widths.push((e - s) as u32);
        s = e;
        k -= 1;
    }
    widths
}

impl<'a, const FIRST: u32> Persist<'a> for StandardDac<'a, FIRST> {
    fn read_from<S: Source<'a>>(src: &mut S) -> Result<Self> {
        let num_levels = src.read_usize()?;
        io::ensure((1..=64).contains(&num_levels), || format!("DAC with {num_levels} levels"))?;

        let mut levels = Vec::with_capacity(num_levels);
        for _ in 0..num_levels {
            levels.push(BitPackedArray::read_from(src)?);
        }
        let mut flags = Vec::with_capacity(num_levels - 1);
        for _ in 1..num_levels {
            flags.push(BitVector::read_from(src)?);
        }

        io::ensure(levels[0].width() == FIRST, || {
            format!("first DAC level is {} bits wide, expected {FIRST}", levels[0].width())
        })?;
        let total: u32 = levels.iter().map(BitPackedArray::width).sum();
        io::ensure(total <= 64 || num_levels == 1, || format!("DAC levels span {total} bits"))?;
        for (j, f) in flags.iter().enumerate() {
            io::ensure(f.has_rank() && f.len() == levels[j].len() && f.num_ones() == levels[j + 1].len(), || {
                format!("overflow flags of DAC level {j} do not match the next level")
            })?;
        }

        Ok(Self { levels, flags })
    }

    fn write_to<W: Sink>(&self, sink: &mut W) -> Result<()> {
        sink.write_usize(self.levels.len())?;
        for level in &self.levels {
            level.write_to(sink)?;
        }
        for flags in &self.flags {
            flags.write_to(sink)?;
        }
        Ok(())
    }

    fn size_in_bytes(&self) -> usize {
        io::scalar_bytes::<u64>()
            + self.levels.iter().map(Persist::size_in_bytes).sum::<usize>()
            + self.flags.iter().map(Persist::size_in_bytes).sum::<usize>()
    }
}
