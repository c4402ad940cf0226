//! Byte-stream wrappers used by the bank reader
//!
//! [`CountingReader`] tracks how far into the bank the shared source has been
//! read, so the reader never needs `Seek`. [`BoundedReader`] caps a single
//! entry's payload.

use std::io::{self, Read};

/// Reader that counts the bytes delivered by the wrapped source
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    bytes_read: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    /// Total bytes delivered so far
    #[inline]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Reader that reports end of data after `limit` bytes
///
/// Once the quota is used up no further read reaches the wrapped source, so
/// bytes past the limit stay available to whoever reads next.
#[derive(Debug)]
pub struct BoundedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> BoundedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }

    /// Bytes still allowed
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for BoundedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }

        let allowed = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..allowed])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}
