use crate::error::Result;
use crate::io::{self, Persist, Sink, Source};

/// Byte remapping applied before double-array placement.
///
/// Bytes are ranked by decreasing frequency across all keys, so the most
/// common labels get the smallest codes. Codes form a permutation of
/// `0..256`; the first `alphabet_size` codes belong to bytes that occur.
#[derive(Clone)]
pub(crate) struct CodeTable {
    /// `table[b]` is the code of byte `b`; `table[256 + c]` is the byte of code `c`.
    table: [u8; 512],
    alphabet_size: usize,
    /// Bytes that occur in some key, ascending.
    alphabet: Vec<u8>,
}

impl CodeTable {
    pub(crate) fn build<K: AsRef<[u8]>>(keys: &[K]) -> Self {
        let mut freqs = [0u64; 256];
        for key in keys {
            for &b in key.as_ref() {
                freqs[b as usize] += 1;
            }
        }

        let mut order: Vec<u8> = (0..=255u8).collect();
        order.sort_by(|&a, &b| freqs[b as usize].cmp(&freqs[a as usize]).then(a.cmp(&b)));

        let mut table = [0u8; 512];
        for (code, &byte) in order.iter().enumerate() {
            table[byte as usize] = code as u8;
            table[256 + code] = byte;
        }
        let alphabet_size = freqs.iter().filter(|&&f| f != 0).count();

        Self::from_parts(table, alphabet_size)
    }

    fn from_parts(table: [u8; 512], alphabet_size: usize) -> Self {
        let mut alphabet: Vec<u8> = table[256..256 + alphabet_size].to_vec();
        alphabet.sort_unstable();
        Self {
            table,
            alphabet_size,
            alphabet,
        }
    }

    #[inline]
    pub(crate) fn code(&self, byte: u8) -> usize {
        self.table[byte as usize] as usize
    }

    #[inline]
    pub(crate) fn byte(&self, code: usize) -> u8 {
        self.table[256 + code]
    }

    #[inline]
    pub(crate) fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// Occurring bytes in ascending order.
    #[inline]
    pub(crate) fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }
}

impl<'a> Persist<'a> for CodeTable {
    fn read_from<S: Source<'a>>(src: &mut S) -> Result<Self> {
        let raw = src.read_array::<u8>()?;
        let alphabet_size = src.read_usize()?;

        io::ensure(raw.len() == 512, || format!("code table holds {} bytes", raw.len()))?;
        io::ensure(alphabet_size <= 256, || format!("alphabet of {alphabet_size} bytes"))?;
        let mut table = [0u8; 512];
        table.copy_from_slice(&raw);
        io::ensure(
            (0..256).all(|c| table[table[256 + c] as usize] as usize == c),
            || "code table is not a permutation".to_string(),
        )?;

        Ok(Self::from_parts(table, alphabet_size))
    }

    fn write_to<W: Sink>(&self, sink: &mut W) -> Result<()> {
        sink.write_array(&self.table)?;
        sink.write_usize(self.alphabet_size)
    }

    fn size_in_bytes(&self) -> usize {
        io::array_bytes::<u8>(512) + io::scalar_bytes::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequent_bytes_get_small_codes() {
        let table = CodeTable::build(&["aaab", "ab", "c"]);
        assert_eq!(table.code(b'a'), 0);
        assert_eq!(table.code(b'b'), 1);
        assert_eq!(table.code(b'c'), 2);
        assert_eq!(table.alphabet_size(), 3);
        assert_eq!(table.alphabet(), b"abc");
        for b in 0..=255u8 {
            assert_eq!(table.byte(table.code(b)), b);
        }
    }

    #[test]
    fn test_unused_bytes_follow_alphabet() {
        let table = CodeTable::build(&[[0u8, 255]]);
        assert_eq!(table.alphabet_size(), 2);
        assert!(table.code(0) < 2 && table.code(255) < 2);
        assert!(table.code(b'x') >= 2);
    }
}
