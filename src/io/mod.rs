//! Binary persistence boundary shared by every component.
//!
//! A dictionary is written as a flat sequence of fields:
//!
//! - scalars: plain-old-data written byte-for-byte in native layout
//! - arrays: `u64` element count, the raw elements, zero padding up to a
//!   multiple of 8 bytes
//!
//! Padding keeps every array word aligned relative to the start of the stream,
//! so a page-aligned memory map can be viewed in place. The layout is not
//! portable across byte orders or word sizes.
//!
//! Reading goes through [`Source`], writing through [`Sink`]. Components
//! implement [`Persist`] once and work with every backend.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use bytemuck::Pod;
use memmap2::Mmap;

use crate::error::{Error, Result};

/// Alignment (in bytes) of every array in the serialized stream.
pub const ALIGN: usize = 8;

/// Serialized size of a scalar of type `T`.
#[inline]
pub fn scalar_bytes<T>() -> usize {
    std::mem::size_of::<T>()
}

/// Serialized size of an array of `len` elements of type `T`.
#[inline]
pub fn array_bytes<T>(len: usize) -> usize {
    8 + padded(len * std::mem::size_of::<T>())
}

#[inline]
fn padded(n: usize) -> usize {
    n.div_ceil(ALIGN) * ALIGN
}

/// Byte length of `len` elements of `T` read from an untrusted stream.
fn array_data_bytes<T>(len: usize) -> Result<usize> {
    len.checked_mul(std::mem::size_of::<T>())
        .filter(|&n| n <= usize::MAX - ALIGN)
        .ok_or_else(|| Error::Corrupt(format!("array of {len} elements overflows")))
}

// =============================================================================
// Reading
// =============================================================================

/// A stream of serialized fields.
///
/// `'a` is the lifetime of borrowed arrays: owned backends can produce any
/// lifetime, the zero-copy backend ties arrays to its underlying bytes.
pub trait Source<'a> {
    /// Reads one fixed-size scalar.
    fn read_scalar<T: Pod>(&mut self) -> Result<T>;

    /// Reads one length-delimited array.
    fn read_array<T: Pod>(&mut self) -> Result<Cow<'a, [T]>>;

    /// Number of bytes consumed so far.
    fn position(&self) -> u64;

    /// Reads a `u64` scalar and converts it to `usize`.
    fn read_usize(&mut self) -> Result<usize> {
        let pos = self.position();
        let v: u64 = self.read_scalar()?;
        usize::try_from(v).map_err(|_| Error::Corrupt(format!("size {v} at byte {pos} overflows usize")))
    }
}

/// Source over any [`Read`] implementation; arrays are copied into owned storage.
///
/// Used for files (through a [`std::io::BufReader`]) and for in-memory byte
/// streams.
pub struct ReaderSource<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::Truncated(self.pos)),
            Err(e) => Err(e.into()),
        }
    }
}

impl<'a, R: Read> Source<'a> for ReaderSource<R> {
    fn read_scalar<T: Pod>(&mut self) -> Result<T> {
        let mut value = T::zeroed();
        self.fill(bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    fn read_array<T: Pod>(&mut self) -> Result<Cow<'a, [T]>> {
        let len = self.read_usize()?;
        let data = array_data_bytes::<T>(len)?;

        // The buffer only grows with bytes actually read; `len` is untrusted.
        let mut raw = Vec::new();
        let got = (&mut self.inner).take(data as u64).read_to_end(&mut raw)?;
        self.pos += got as u64;
        if got < data {
            return Err(Error::Truncated(self.pos));
        }
        let mut values = vec![T::zeroed(); len];
        bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(&raw);

        let mut pad = [0u8; ALIGN];
        self.fill(&mut pad[..padded(data) - data])?;
        Ok(Cow::Owned(values))
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

/// Source over a borrowed byte region such as a memory map.
///
/// Arrays are returned as views into the region when it is suitably aligned;
/// otherwise they are copied.
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(Error::Truncated(self.pos as u64))?;
        let bytes = self.bytes;
        let out = &bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}

impl<'a> Source<'a> for SliceSource<'a> {
    fn read_scalar<T: Pod>(&mut self) -> Result<T> {
        let raw = self.take(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(raw))
    }

    fn read_array<T: Pod>(&mut self) -> Result<Cow<'a, [T]>> {
        let len = self.read_usize()?;
        let data = array_data_bytes::<T>(len)?;
        let raw = self.take(data)?;
        self.take(padded(data) - data)?;
        match bytemuck::try_cast_slice(raw) {
            Ok(view) => Ok(Cow::Borrowed(view)),
            Err(_) => {
                let mut values = vec![T::zeroed(); len];
                bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(raw);
                Ok(Cow::Owned(values))
            }
        }
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }
}

// =============================================================================
// Writing
// =============================================================================

/// Destination for serialized fields.
pub trait Sink {
    /// Writes one fixed-size scalar.
    fn write_scalar<T: Pod>(&mut self, value: &T) -> Result<()>;

    /// Writes one length-delimited array.
    fn write_array<T: Pod>(&mut self, values: &[T]) -> Result<()>;

    /// Number of bytes written so far.
    fn bytes_written(&self) -> u64;

    /// Writes a `usize` as a `u64` scalar.
    fn write_usize(&mut self, value: usize) -> Result<()> {
        self.write_scalar(&(value as u64))
    }
}

/// Sink over any [`Write`] implementation.
pub struct WriterSink<W> {
    inner: W,
    written: u64,
}

impl<W: Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn write_scalar<T: Pod>(&mut self, value: &T) -> Result<()> {
        self.put(bytemuck::bytes_of(value))
    }

    fn write_array<T: Pod>(&mut self, values: &[T]) -> Result<()> {
        self.write_usize(values.len())?;
        let raw: &[u8] = bytemuck::cast_slice(values);
        self.put(raw)?;
        let pad = [0u8; ALIGN];
        self.put(&pad[..padded(raw.len()) - raw.len()])
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

// =============================================================================
// Components
// =============================================================================

/// A structure that can be written to a [`Sink`] and read back from a [`Source`].
pub trait Persist<'a>: Sized {
    /// Reads the structure, validating its fields.
    fn read_from<S: Source<'a>>(src: &mut S) -> Result<Self>;

    /// Writes the structure.
    fn write_to<W: Sink>(&self, sink: &mut W) -> Result<()>;

    /// Exact number of bytes [`Persist::write_to`] produces.
    fn size_in_bytes(&self) -> usize;
}

/// Maps a file read-only.
///
/// Structures loaded from the returned map borrow it, so the map must outlive
/// them.
pub fn map_file(path: impl AsRef<Path>) -> Result<Mmap> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only; callers must not truncate or rewrite the
    // file while it is mapped.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// Returns `Err(Corrupt)` with `msg` unless `cond` holds.
#[inline]
pub(crate) fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(Error::Corrupt(msg()))
    }
}
