use super::*;

use crate::io::{Persist, ReaderSource, Sink, SliceSource, WriterSink};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Checks the cross-structure invariants of a trie against its key set.
fn validate_trie<'a, C: CodeArray<'a>>(t: &Trie<'a, C>, keys: &BTreeSet<Vec<u8>>) {
    assert_eq!(t.num_keys(), keys.len());
    assert_eq!(t.max_length(), keys.iter().map(Vec::len).max().unwrap_or(0));
    assert_eq!(t.num_cells() % 256, 0, "cells come in whole blocks");

    // Ids are a permutation of 0..n and decode inverts lookup.
    let mut seen = vec![false; keys.len()];
    for key in keys {
        let id = t.lookup(key).expect("stored key must be found");
        assert!(!std::mem::replace(&mut seen[id as usize], true), "duplicate id {id}");
        assert_eq!(t.decode(id).as_ref(), Some(key));
    }
    assert_eq!(t.decode(keys.len() as u64), None);
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // A narrow alphabet produces shared prefixes and suffixes; the occasional
    // high byte exercises the full code table.
    let byte = prop_oneof![
        8 => b'a'..=b'e',
        1 => Just(0u8),
        1 => any::<u8>(),
    ];
    prop::collection::vec(byte, 0..=24)
}

fn key_set_strategy() -> impl Strategy<Value = BTreeSet<Vec<u8>>> {
    prop::collection::btree_set(key_strategy(), 0..=300)
}

fn serialize<'a, P: Persist<'a>>(p: &P) -> Vec<u8> {
    let mut sink = WriterSink::new(Vec::new());
    p.write_to(&mut sink).unwrap();
    assert_eq!(sink.bytes_written() as usize, p.size_in_bytes());
    sink.finish().unwrap()
}

/// Rounds `bytes` into `u64` storage so slices over it are word aligned.
fn aligned(bytes: &[u8]) -> Vec<u64> {
    let mut words = vec![0u64; bytes.len().div_ceil(8)];
    bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
    words
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_rank_select_match_naive(bits in prop::collection::vec(prop::bool::weighted(0.3), 0..=3000)) {
        let bv = BitVector::from_bits(bits.iter().copied(), true, true);
        let mut ones = 0usize;
        let mut positions = Vec::new();
        for (i, &bit) in bits.iter().enumerate() {
            prop_assert_eq!(bv.get(i), bit);
            prop_assert_eq!(bv.rank(i), ones);
            if bit {
                positions.push(i);
                ones += 1;
            }
        }
        prop_assert_eq!(bv.rank(bits.len()), ones);
        for (k, &pos) in positions.iter().enumerate() {
            prop_assert_eq!(bv.select(k), Some(pos));
            prop_assert_eq!(bv.rank(pos), k);
        }
        prop_assert_eq!(bv.select(ones), None);
    }

    #[test]
    fn prop_bit_packed_round_trip(width in 1u32..=64, raw in prop::collection::vec(any::<u64>(), 0..=500)) {
        let values: Vec<u64> = raw.iter().map(|v| v & bit_packed::low_mask(width)).collect();
        let arr = BitPackedArray::with_width(&values, width);
        let got: Vec<u64> = arr.iter().collect();
        prop_assert_eq!(got, values);
    }

    #[test]
    fn prop_dac_encodings_agree(values in prop::collection::vec(
        prop_oneof![8 => 0u64..300, 3 => 0u64..100_000, 1 => any::<u64>()],
        0..=2000,
    )) {
        let d8 = dac::Dac8::build(&values, LevelPolicy::default());
        let d16 = dac::Dac16::build(&values, LevelPolicy::Uniform);
        let p7 = dac::PointerDac7::build(&values, LevelPolicy::default());
        let p15 = dac::PointerDac15::build(&values, LevelPolicy::default());
        for (i, &v) in values.iter().enumerate() {
            prop_assert_eq!(d8.get(i), v);
            prop_assert_eq!(d16.get(i), v);
            prop_assert_eq!(p7.get(i), v);
            prop_assert_eq!(p15.get(i), v);
        }

        let bytes = serialize(&p7);
        let loaded = dac::PointerDac7::read_from(&mut ReaderSource::new(bytes.as_slice())).unwrap();
        prop_assert!(values.iter().enumerate().all(|(i, &v)| loaded.get(i) == v));
    }

    #[test]
    fn prop_trie_matches_model(keys in key_set_strategy(), queries in prop::collection::vec(key_strategy(), 0..=50)) {
        let sorted: Vec<&Vec<u8>> = keys.iter().collect();
        let t7 = Trie7::build(&sorted).unwrap();
        let t16 = Trie16::build(&sorted).unwrap();
        validate_trie(&t7, &keys);
        validate_trie(&t16, &keys);

        for query in &queries {
            prop_assert_eq!(t7.lookup(query).is_some(), keys.contains(query));
            prop_assert_eq!(t16.lookup(query).is_some(), keys.contains(query));

            let expected: Vec<&[u8]> = (0..=query.len())
                .map(|n| &query[..n])
                .filter(|p| keys.contains(*p))
                .collect();
            let got: Vec<&[u8]> = t7.common_prefix_search(query).map(|(_, k)| k).collect();
            prop_assert_eq!(&got, &expected);
            for (id, k) in t16.common_prefix_search(query) {
                prop_assert_eq!(t16.lookup(k), Some(id));
            }
        }
    }

    #[test]
    fn prop_predictive_search_matches_model(keys in key_set_strategy(), prefix in key_strategy()) {
        let t = Trie15::from_unsorted(keys.iter()).unwrap();
        let expected: Vec<Vec<u8>> = keys.iter().filter(|k| k.starts_with(&prefix)).cloned().collect();
        let got: Vec<(u64, Vec<u8>)> = t.predictive_search(&prefix).collect();
        for (id, key) in &got {
            prop_assert_eq!(t.lookup(key), Some(*id));
        }
        let got: Vec<Vec<u8>> = got.into_iter().map(|(_, k)| k).collect();
        prop_assert_eq!(got, expected);

        let all: Vec<Vec<u8>> = t.iter().map(|(_, k)| k).collect();
        let expected_all: Vec<Vec<u8>> = keys.iter().cloned().collect();
        prop_assert_eq!(all, expected_all);
    }

    #[test]
    fn prop_save_load_equivalent(keys in key_set_strategy(), free_blocks in 1usize..=4) {
        let sorted: Vec<&Vec<u8>> = keys.iter().collect();
        let config = BuildConfig { free_blocks, ..BuildConfig::default() };
        let t = Trie8::build_with_config(&sorted, &config).unwrap();
        let bytes = serialize(&t);
        prop_assert_eq!(bytes.len(), t.memory_in_bytes());

        let words = aligned(&bytes);
        let view: &[u8] = bytemuck::cast_slice::<u64, u8>(&words);
        let loaded = Trie8::from_bytes(&view[..bytes.len()]).unwrap();
        validate_trie(&loaded, &keys);
        for key in &keys {
            prop_assert_eq!(loaded.lookup(key), t.lookup(key));
        }

        let copied = Trie8::read_from(&mut SliceSource::new(&bytes)).unwrap();
        prop_assert_eq!(copied.stats().num_cells, t.stats().num_cells);
    }
}

fn for_each_subset<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    for mask in 0u32..(1 << items.len()) {
        let subset = items
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, item)| item.clone())
            .collect();
        f(subset);
    }
}

#[test]
fn exhaustive_small_key_sets() {
    let universe: Vec<Vec<u8>> = vec![
        b"".to_vec(),
        b"a".to_vec(),
        b"b".to_vec(),
        b"aa".to_vec(),
        b"ab".to_vec(),
        b"ba".to_vec(),
        b"aab".to_vec(),
        b"bab".to_vec(),
        vec![0],
        vec![0, 0],
    ];

    for_each_subset(&universe, |subset| {
        let keys: BTreeSet<Vec<u8>> = subset.into_iter().collect();
        let sorted: Vec<&Vec<u8>> = keys.iter().collect();

        let t8 = Trie8::build(&sorted).unwrap();
        let t15 = Trie15::build(&sorted).unwrap();
        validate_trie(&t8, &keys);
        validate_trie(&t15, &keys);

        for query in &universe {
            assert_eq!(t8.lookup(query).is_some(), keys.contains(query));
        }
    });
}

#[test]
fn ids_are_dense() {
    let keys = ["", "a", "ab", "abc", "b", "bc", "c"];
    let t = Trie7::build(&keys).unwrap();
    let mut by_id: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
    for key in keys {
        by_id.insert(t.lookup(key.as_bytes()).unwrap(), key.as_bytes().to_vec());
    }
    assert_eq!(by_id.keys().copied().collect::<Vec<_>>(), (0..keys.len() as u64).collect::<Vec<_>>());
    for (id, key) in by_id {
        assert_eq!(t.decode(id), Some(key));
    }
}

const DAMAGE_KEYS: [&str; 11] = [
    "", "a", "apple", "apply", "banana", "band", "bandana", "can", "cannot", "in", "inn",
];

/// Runs every query on a trie loaded from damaged bytes. Answers may be wrong;
/// the queries must still return.
fn query_everything(trie: &AnyTrie<'_>) {
    for key in DAMAGE_KEYS {
        let _ = trie.lookup(key.as_bytes());
        let _ = trie.common_prefix_search(key.as_bytes()).count();
    }
    for id in 0..=trie.num_keys() as u64 {
        if let Some(key) = trie.decode(id) {
            assert!(key.len() <= trie.max_length() + trie.stats().tail_bytes);
        }
    }
    let num_cells = trie.stats().num_cells;
    assert!(trie.predictive_search(b"").count() <= num_cells);
    assert!(trie.predictive_search(b"ban").count() <= num_cells);
}

fn load_damaged(bytes: &[u8]) {
    let words = aligned(bytes);
    let view = &bytemuck::cast_slice::<u64, u8>(&words)[..bytes.len()];
    if let Ok(trie) = AnyTrie::from_bytes(view) {
        query_everything(&trie);
    }
    if let Ok(trie) = AnyTrie::from_reader(bytes) {
        query_everything(&trie);
    }
}

#[test]
fn damaged_files_fail_cleanly() {
    let files = [
        serialize(&Trie7::build(&DAMAGE_KEYS).unwrap()),
        serialize(&Trie8::build(&DAMAGE_KEYS).unwrap()),
    ];
    for bytes in &files {
        query_everything(&AnyTrie::from_reader(bytes.as_slice()).unwrap());

        for cut in 0..bytes.len() {
            assert!(AnyTrie::from_bytes(&bytes[..cut]).is_err(), "cut at {cut}");
        }
        for at in 0..bytes.len() {
            for mask in [0x01u8, 0x80, 0xff] {
                let mut damaged = bytes.clone();
                damaged[at] ^= mask;
                load_damaged(&damaged);
            }
        }
    }
}
