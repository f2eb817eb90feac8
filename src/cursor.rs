//! Primitive positioned reads over plugin bytes.
//!
//! Two cursors live here:
//!
//! - [`StreamCursor`] wraps a seekable stream (a pooled file handle) and tracks the
//!   byte position itself, so the pool can remember where a handle was left.
//! - [`FieldReader`] walks an in-memory record payload once the raw bytes have
//!   been pulled out of the stream.
//!
//! Neither knows anything about records. All multi-byte values are little-endian.

use crate::error::{Result, StoreError};
use crate::format::Tag;
use crate::ident::GlobalId;
use memchr::memchr;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Positioned cursor over a seekable byte stream
///
/// The cursor is the only thing that moves the underlying stream, which lets it
/// report its position without asking the OS. Peeks are read-then-rewind.
///
/// Reads fail on their own at end of stream, but a seek past the end does not,
/// so forward skips are checked against the stream length.
#[derive(Debug)]
pub struct StreamCursor<R> {
    inner: R,
    pos: u64,
    /// Total stream length, measured on first need unless given up front
    len: Option<u64>,
}

impl<R: Read + Seek> StreamCursor<R> {
    /// Wrap a stream whose current position is already known
    ///
    /// # Arguments
    /// * `inner` - The stream to read from
    /// * `pos` - Where the stream is currently positioned
    pub fn new(inner: R, pos: u64) -> Self {
        Self {
            inner,
            pos,
            len: None,
        }
    }

    /// Use a length already known to the caller instead of measuring the stream
    pub fn with_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }

    /// Current byte position.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Seek to an absolute position. A no-op when already there.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos != self.pos {
            self.inner.seek(SeekFrom::Start(pos))?;
            self.pos = pos;
        }
        Ok(())
    }

    /// Skip `n` bytes forward without reading them
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.skip_to(self.pos + n)
    }

    /// Move forward to `end`, which must not lie past the end of the stream.
    ///
    /// # Errors
    /// * `Truncated` if the stream holds fewer bytes than the skip covers;
    ///   the position is left unchanged
    pub fn skip_to(&mut self, end: u64) -> Result<()> {
        let len = self.stream_len()?;
        if end > len {
            return Err(StoreError::Truncated {
                offset: self.pos,
                needed: end.saturating_sub(self.pos),
                available: len.saturating_sub(self.pos),
            });
        }
        self.seek(end)
    }

    /// Length of the underlying stream in bytes
    pub fn stream_len(&mut self) -> Result<u64> {
        if let Some(len) = self.len {
            return Ok(len);
        }
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(self.pos))?;
        self.len = Some(len);
        Ok(len)
    }

    /// Fill `buf` completely or fail with `Truncated`
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.pos;
        let filled = self.fill(buf)?;
        if filled < buf.len() {
            return Err(StoreError::Truncated {
                offset: start,
                needed: buf.len() as u64,
                available: filled as u64,
            });
        }
        Ok(())
    }

    /// Read `n` bytes into a fresh buffer
    pub fn read_vec(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read up to `n` bytes and rewind to where we started
    ///
    /// Returns fewer than `n` bytes (possibly none) at end of stream; that is
    /// not an error.
    pub fn peek_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let start = self.pos;
        let mut buf = vec![0u8; n];
        let filled = self.fill(&mut buf)?;
        buf.truncate(filled);
        self.inner.seek(SeekFrom::Start(start))?;
        self.pos = start;
        Ok(buf)
    }

    pub fn read_tag(&mut self) -> Result<Tag> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(Tag::new(bytes))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0u8; 2];
        self.read_exact(&mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(i32::from_le_bytes(bytes))
    }

    /// Give back the stream, positioned at [`tell`](Self::tell)
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }
}

/// Read cursor over one field's bytes.
///
/// `base` is the absolute file offset of the owning record, used only for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8], base: u64) -> Self {
        Self { data, pos: 0, base }
    }

    /// Current position inside the field.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Remaining bytes from current position.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Whether we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read a slice of `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(StoreError::Truncated {
                offset: self.base + self.pos as u64,
                needed: n as u64,
                available: self.remaining() as u64,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.read_bytes(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read an identifier the manifest has already translated.
    ///
    /// Only valid for fields listed in [`crate::ident::manifest`]; anything
    /// else would still hold a file-local value.
    pub fn read_global_id(&mut self) -> Result<GlobalId> {
        self.read_u32().map(GlobalId::from_raw)
    }

    /// Read a NUL-terminated string. A missing terminator takes the rest of the field.
    pub fn read_zstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos..];
        let (len, consumed) = match memchr(0, rest) {
            Some(nul) => (nul, nul + 1),
            None => (rest.len(), rest.len()),
        };
        let text = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += consumed;
        Ok(text)
    }
}
