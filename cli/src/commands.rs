//! Subcommand implementations.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cdat::{io::map_file, AnyTrie, Dictionary, Trie15, Trie16, Trie7, Trie8};
use tracing::info;

use crate::Variant;

/// Splits `reader` on `\n`, dropping a trailing `\r` from each line.
fn read_lines(reader: impl BufRead) -> impl Iterator<Item = io::Result<Vec<u8>>> {
    reader.split(b'\n').map(|line| {
        line.map(|mut l| {
            if l.last() == Some(&b'\r') {
                l.pop();
            }
            l
        })
    })
}

/// Format bytes as human-readable string.
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

fn write_entry(out: &mut impl Write, id: impl std::fmt::Display, key: &[u8]) -> io::Result<()> {
    write!(out, "{id}\t")?;
    out.write_all(key)?;
    out.write_all(b"\n")
}

/// Maps `index` and runs `f` over each stdin line, writing to stdout.
fn for_each_query<F>(index: &Path, mut f: F) -> Result<()>
where
    F: FnMut(&AnyTrie<'_>, &[u8], &mut BufWriter<io::StdoutLock<'static>>) -> io::Result<()>,
{
    let mmap = map_file(index).with_context(|| format!("cannot open {}", index.display()))?;
    let trie = AnyTrie::from_bytes(&mmap).with_context(|| format!("cannot load {}", index.display()))?;
    info!(type_id = trie.type_id(), keys = trie.num_keys(), "opened index");

    let mut out = BufWriter::new(io::stdout().lock());
    for line in read_lines(io::stdin().lock()) {
        f(&trie, &line?, &mut out)?;
    }
    out.flush()?;
    Ok(())
}

/// Run the build command.
pub fn build(keys_path: &Path, index: &Path, variant: Variant) -> Result<()> {
    let keys: Vec<Vec<u8>> = if keys_path == Path::new("-") {
        read_lines(io::stdin().lock()).collect::<io::Result<_>>()?
    } else {
        let file = File::open(keys_path).with_context(|| format!("cannot open {}", keys_path.display()))?;
        read_lines(BufReader::new(file)).collect::<io::Result<_>>()?
    };
    info!(lines = keys.len(), ?variant, "read keys");

    let trie: AnyTrie<'static> = match variant {
        Variant::Trie7 => Trie7::from_unsorted(&keys)?.into(),
        Variant::Trie8 => Trie8::from_unsorted(&keys)?.into(),
        Variant::Trie15 => Trie15::from_unsorted(&keys)?.into(),
        Variant::Trie16 => Trie16::from_unsorted(&keys)?.into(),
    };
    trie.save(index).with_context(|| format!("cannot write {}", index.display()))?;

    let stats = trie.stats();
    println!("Type id:      {}", trie.type_id());
    println!("Keys:         {}", stats.num_keys);
    println!("Cells:        {}", stats.num_cells);
    println!("Alphabet:     {}", stats.alphabet_size);
    println!("Max length:   {}", stats.max_length);
    println!("Tail bytes:   {}", stats.tail_bytes);
    println!("DAC levels:   {}", stats.dac_levels);
    println!(
        "Index size:   {} ({:.2} bytes/key)",
        format_bytes(stats.total_bytes),
        stats.bytes_per_key
    );
    Ok(())
}

/// Run the prefix-search command.
pub fn prefix_search(index: &Path) -> Result<()> {
    let mut results: Vec<(u64, usize)> = Vec::new();
    for_each_query(index, |trie, query, out| {
        results.clear();
        results.extend(trie.common_prefix_search(query).map(|(id, key)| (id, key.len())));
        writeln!(out, "{} found", results.len())?;
        for &(id, len) in &results {
            write_entry(out, id, &query[..len])?;
        }
        Ok(())
    })
}

/// Run the predictive-search command.
pub fn predictive_search(index: &Path, limit: Option<usize>) -> Result<()> {
    for_each_query(index, |trie, query, out| {
        let results: Vec<(u64, Vec<u8>)> = trie
            .predictive_search(query)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        writeln!(out, "{} found", results.len())?;
        for (id, key) in &results {
            write_entry(out, id, key)?;
        }
        Ok(())
    })
}

/// Run the lookup command.
pub fn lookup(index: &Path) -> Result<()> {
    for_each_query(index, |trie, query, out| match trie.lookup(query) {
        Some(id) => write_entry(out, id, query),
        None => write_entry(out, "not found", query),
    })
}

/// Run the decode command.
pub fn decode(index: &Path) -> Result<()> {
    for_each_query(index, |trie, query, out| {
        let id = std::str::from_utf8(query).ok().and_then(|s| s.trim().parse::<u64>().ok());
        match id.and_then(|id| trie.decode(id).map(|key| (id, key))) {
            Some((id, key)) => write_entry(out, id, &key),
            None => write_entry(out, "not found", query),
        }
    })
}

/// Run the enumerate command.
pub fn enumerate(index: &Path) -> Result<()> {
    let mmap = map_file(index).with_context(|| format!("cannot open {}", index.display()))?;
    let trie = AnyTrie::from_bytes(&mmap).with_context(|| format!("cannot load {}", index.display()))?;

    let mut out = BufWriter::new(io::stdout().lock());
    for (id, key) in trie.predictive_search(b"") {
        write_entry(&mut out, id, &key)?;
    }
    out.flush()?;
    Ok(())
}
