//! Double-array construction over sorted, unique keys.

use crate::bit_vector::BitVectorBuilder;
use crate::error::{Error, Result};

use super::code_table::CodeTable;
use super::tail::TailStore;

/// Cells are allocated and searched in blocks of this many.
pub(crate) const BLOCK_SIZE: usize = 256;

const NIL: usize = usize::MAX;

/// Largest cell count whose DAC flag bitmaps stay within the 32-bit rank directory.
const MAX_CELLS: usize = (u32::MAX as usize) / 2;

/// Result of laying out a key set in a double array.
pub(crate) struct Layout<'a> {
    /// Interleaved stored values: `[2i]` is `BASE ^ i` (or the tail link of a
    /// leaf), `[2i + 1]` is `CHECK ^ i`.
    pub(crate) values: Vec<u64>,
    pub(crate) leaves: BitVectorBuilder,
    pub(crate) terms: BitVectorBuilder,
    pub(crate) tail: TailStore<'a>,
}

/// Pending subtree: node `npos` owns `keys[beg..end]`, which share their first
/// `depth` bytes.
struct Range {
    npos: usize,
    beg: usize,
    end: usize,
    depth: usize,
}

struct Builder<'t> {
    table: &'t CodeTable,
    base: Vec<usize>,
    check: Vec<usize>,
    used: Vec<bool>,
    // Circular doubly-linked list of free cells in open blocks.
    next: Vec<usize>,
    prev: Vec<usize>,
    head: usize,
    free_blocks: usize,
    leaves: BitVectorBuilder,
    terms: BitVectorBuilder,
}

pub(crate) fn build<'a, K: AsRef<[u8]>>(keys: &[K], table: &CodeTable, free_blocks: usize) -> Result<Layout<'a>> {
    let mut b = Builder {
        table,
        base: Vec::new(),
        check: Vec::new(),
        used: Vec::new(),
        next: Vec::new(),
        prev: Vec::new(),
        head: NIL,
        free_blocks: free_blocks.max(1),
        leaves: BitVectorBuilder::new(),
        terms: BitVectorBuilder::new(),
    };
    b.enlarge()?;
    b.fix(0);

    let mut suffixes: Vec<(usize, &[u8])> = Vec::new();
    let mut stack = vec![Range {
        npos: 0,
        beg: 0,
        end: keys.len(),
        depth: 0,
    }];
    let mut labels: Vec<(u8, usize, usize)> = Vec::new();
    let mut codes: Vec<usize> = Vec::new();

    while let Some(Range { npos, mut beg, end, depth }) = stack.pop() {
        if end == beg {
            continue;
        }
        if end - beg == 1 {
            b.leaves.set(npos, true);
            b.terms.set(npos, true);
            suffixes.push((npos, &keys[beg].as_ref()[depth..]));
            continue;
        }
        if keys[beg].as_ref().len() == depth {
            b.terms.set(npos, true);
            beg += 1;
        }

        labels.clear();
        for i in beg..end {
            let label = keys[i].as_ref()[depth];
            match labels.last_mut() {
                Some((l, _, e)) if *l == label => *e = i + 1,
                _ => labels.push((label, i, i + 1)),
            }
        }
        codes.clear();
        codes.extend(labels.iter().map(|&(l, _, _)| table.code(l)));

        let base = b.find_base(&codes);
        while base ^ codes[0] >= b.len() {
            b.enlarge()?;
        }
        b.base[npos] = base;
        for (&(_, cbeg, cend), &code) in labels.iter().zip(&codes).rev() {
            let cpos = base ^ code;
            b.fix(cpos);
            b.check[cpos] = npos;
            stack.push(Range {
                npos: cpos,
                beg: cbeg,
                end: cend,
                depth: depth + 1,
            });
        }
    }

    let num_cells = b.len();
    b.check[0] = num_cells;

    let fragments: Vec<&[u8]> = suffixes.iter().map(|&(_, s)| s).collect();
    let (tail, links) = TailStore::build(&fragments);

    let mut values = Vec::with_capacity(2 * num_cells);
    for i in 0..num_cells {
        values.push((b.base[i] ^ i) as u64);
        values.push((b.check[i] ^ i) as u64);
    }
    for (&(npos, _), &link) in suffixes.iter().zip(&links) {
        values[2 * npos] = link;
    }

    Ok(Layout {
        values,
        leaves: b.leaves,
        terms: b.terms,
        tail,
    })
}

impl Builder<'_> {
    #[inline]
    fn len(&self) -> usize {
        self.used.len()
    }

    /// Finds a BASE whose child cells for every code in `codes` are free.
    fn find_base(&self, codes: &[usize]) -> usize {
        debug_assert!(codes.iter().all(|&c| c < self.table.alphabet_size()));
        if self.head != NIL {
            let mut f = self.head;
            loop {
                let base = f ^ codes[0];
                if codes.iter().all(|&c| !self.used[base ^ c]) {
                    return base;
                }
                f = self.next[f];
                if f == self.head {
                    break;
                }
            }
        }
        self.len() ^ codes[0]
    }

    /// Appends one block of free cells, closing the oldest open block if needed.
    fn enlarge(&mut self) -> Result<()> {
        let old = self.len();
        let new = old + BLOCK_SIZE;
        if new > MAX_CELLS {
            return Err(Error::TooLarge(new));
        }

        let num_blocks = old / BLOCK_SIZE;
        if num_blocks >= self.free_blocks {
            self.close_block(num_blocks - self.free_blocks);
        }

        for i in old..new {
            self.base.push(i);
            self.check.push(i);
            self.used.push(false);
            self.next.push(NIL);
            self.prev.push(NIL);
            self.leaves.push(false);
            self.terms.push(false);
            self.link(i);
        }
        Ok(())
    }

    /// Takes the remaining free cells of `block` out of the search.
    fn close_block(&mut self, block: usize) {
        for i in block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE {
            if !self.used[i] && self.next[i] != NIL {
                self.unlink(i);
            }
        }
    }

    /// Marks cell `i` as used.
    fn fix(&mut self, i: usize) {
        debug_assert!(!self.used[i]);
        self.used[i] = true;
        self.unlink(i);
    }

    fn link(&mut self, i: usize) {
        if self.head == NIL {
            self.next[i] = i;
            self.prev[i] = i;
            self.head = i;
        } else {
            let last = self.prev[self.head];
            self.next[i] = self.head;
            self.prev[i] = last;
            self.next[last] = i;
            self.prev[self.head] = i;
        }
    }

    fn unlink(&mut self, i: usize) {
        let (n, p) = (self.next[i], self.prev[i]);
        if n == i {
            self.head = NIL;
        } else {
            self.next[p] = n;
            self.prev[n] = p;
            if self.head == i {
                self.head = n;
            }
        }
        self.next[i] = NIL;
        self.prev[i] = NIL;
    }
}
