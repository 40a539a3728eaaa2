use crate::dac::CodeArray;

use super::Trie;

/// Iterator over the stored keys that are prefixes of a query text.
///
/// Created by [`Trie::common_prefix_search`]. Yields `(id, prefix)` with
/// `prefix` borrowed from the text, shortest first.
pub struct PrefixIter<'t, 'q, 'a, C> {
    trie: &'t Trie<'a, C>,
    text: &'q [u8],
    npos: usize,
    kpos: usize,
    done: bool,
}

impl<'t, 'q, 'a, C: CodeArray<'a>> PrefixIter<'t, 'q, 'a, C> {
    pub(super) fn new(trie: &'t Trie<'a, C>, text: &'q [u8]) -> Self {
        Self {
            trie,
            text,
            npos: 0,
            kpos: 0,
            done: false,
        }
    }
}

impl<'t, 'q, 'a, C: CodeArray<'a>> Iterator for PrefixIter<'t, 'q, 'a, C> {
    type Item = (u64, &'q [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let trie = self.trie;
        while !self.done {
            let (npos, kpos) = (self.npos, self.kpos);

            if trie.leaves.get(npos) {
                self.done = true;
                let n = trie.tail.prefix_len(trie.link(npos), &self.text[kpos..])?;
                return Some((trie.id_of(npos), &self.text[..kpos + n]));
            }

            match self.text.get(kpos).and_then(|&b| trie.child(npos, b)) {
                Some(cpos) => {
                    self.npos = cpos;
                    self.kpos += 1;
                }
                None => self.done = true,
            }
            if trie.terms.get(npos) {
                return Some((trie.id_of(npos), &self.text[..kpos]));
            }
        }
        None
    }
}

/// Pending node of a predictive search: `key[..depth]` spells the path to its
/// parent and `label` leads from there to `npos`.
struct Frame {
    npos: usize,
    depth: usize,
    label: Option<u8>,
}

/// Iterator over the stored keys that start with a given prefix.
///
/// Created by [`Trie::predictive_search`]. Yields `(id, key)` in
/// lexicographic key order.
pub struct PredictiveIter<'t, 'a, C> {
    trie: &'t Trie<'a, C>,
    stack: Vec<Frame>,
    key: Vec<u8>,
    /// Result found while matching the prefix against a tail.
    pending: Option<(u64, Vec<u8>)>,
    /// Nodes left to visit; a well-formed trie visits each cell at most once.
    budget: usize,
}

impl<'t, 'a, C: CodeArray<'a>> PredictiveIter<'t, 'a, C> {
    pub(super) fn new(trie: &'t Trie<'a, C>, prefix: &[u8]) -> Self {
        let mut iter = Self {
            trie,
            stack: Vec::new(),
            key: Vec::with_capacity(trie.max_length),
            pending: None,
            budget: trie.num_cells(),
        };

        let mut npos = 0;
        for (kpos, &b) in prefix.iter().enumerate() {
            if trie.leaves.get(npos) {
                let fragment = trie.tail.fragment(trie.link(npos));
                if fragment.starts_with(&prefix[kpos..]) {
                    let mut key = prefix[..kpos].to_vec();
                    key.extend_from_slice(fragment);
                    iter.pending = Some((trie.id_of(npos), key));
                }
                return iter;
            }
            match trie.child(npos, b) {
                Some(cpos) => npos = cpos,
                None => return iter,
            }
        }

        iter.key.extend_from_slice(prefix);
        iter.stack.push(Frame {
            npos,
            depth: prefix.len(),
            label: None,
        });
        iter
    }
}

impl<'t, 'a, C: CodeArray<'a>> Iterator for PredictiveIter<'t, 'a, C> {
    type Item = (u64, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(found) = self.pending.take() {
            return Some(found);
        }

        let trie = self.trie;
        while let Some(Frame { npos, depth, label }) = self.stack.pop() {
            if self.budget == 0 || (label.is_some() && depth >= trie.max_length) {
                self.stack.clear();
                return None;
            }
            self.budget -= 1;
            self.key.truncate(depth);
            self.key.extend(label);

            if trie.leaves.get(npos) {
                self.key.extend_from_slice(trie.tail.fragment(trie.link(npos)));
                return Some((trie.id_of(npos), self.key.clone()));
            }

            let depth = self.key.len();
            for &b in trie.table.alphabet().iter().rev() {
                if let Some(cpos) = trie.child(npos, b) {
                    self.stack.push(Frame {
                        npos: cpos,
                        depth,
                        label: Some(b),
                    });
                }
            }
            if trie.terms.get(npos) {
                return Some((trie.id_of(npos), self.key.clone()));
            }
        }
        None
    }
}
