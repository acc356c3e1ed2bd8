/*
MIT License

Copyright (c) 2021 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/
//! Module for [`ByteSource`], the random access byte ranges every other part
//! of this crate reads from.
//!
//! All reads take an absolute offset and `&self`, so a source can serve
//! concurrent and out-of-order reads without a shared cursor.

use positioned_io::{ReadAt, Size};
use std::fmt::{Debug, Formatter};
use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Arc;

/// Something that can return exact byte ranges of an archive.
pub trait ByteSource {
    /// Label used in log messages.
    fn name(&self) -> &str {
        "<unnamed>"
    }

    /// Fills `buf` with the bytes starting at `offset`.
    ///
    /// Returns `Ok(false)` if fewer than `buf.len()` bytes are available.
    /// That is the regular end-of-data signal, not an error; errors are
    /// reserved for transport failures. The content of `buf` is unspecified
    /// after a short read.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<bool>;

    /// The total length of the source, if the backend knows it.
    fn size(&self) -> io::Result<Option<u64>> {
        Ok(None)
    }

    /// Allocating variant of [`Self::read_exact_at`]: `Ok(None)` on a short
    /// read.
    fn read_range(&self, offset: u64, len: usize) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0; len];
        Ok(self.read_exact_at(offset, &mut buf)?.then_some(buf))
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<bool> {
        (**self).read_exact_at(offset, buf)
    }

    fn size(&self) -> io::Result<Option<u64>> {
        (**self).size()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<bool> {
        (**self).read_exact_at(offset, buf)
    }

    fn size(&self) -> io::Result<Option<u64>> {
        (**self).size()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<bool> {
        (**self).read_exact_at(offset, buf)
    }

    fn size(&self) -> io::Result<Option<u64>> {
        (**self).size()
    }
}

/// A whole archive held in memory.
pub struct MemorySource {
    name: String,
    data: Box<[u8]>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Box<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl Debug for MemorySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("name", &self.name)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

impl ByteSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<bool> {
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(buf.len())?));
        match range.and_then(|range| self.data.get(range)) {
            Some(bytes) => {
                buf.copy_from_slice(bytes);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn size(&self) -> io::Result<Option<u64>> {
        Ok(Some(self.data.len() as u64))
    }
}

/// Adapts any [`positioned_io::ReadAt`] implementation, e.g. a local file or
/// a client issuing range requests against remote storage.
///
/// Retries and timeouts are up to the wrapped reader; `Interrupted` errors
/// are retried here, as [`std::io::Read::read_exact`] does.
pub struct ReadAtSource<R> {
    name: String,
    inner: R,
}

/// A local file. The handle is closed when the source is dropped.
pub type FileSource = ReadAtSource<File>;

impl<R> ReadAtSource<R> {
    pub fn new(name: impl Into<String>, inner: R) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    /// Get a reference to the underlying reader.
    #[must_use]
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Retrieve the ownership of the underlying reader.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl ReadAtSource<File> {
    /// Opens a local archive for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("opened {}", path.display());
        Ok(Self::new(path.display().to_string(), file))
    }
}

impl<R: Debug> Debug for ReadAtSource<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadAtSource")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .finish()
    }
}

impl<R: ReadAt + Size> ByteSource for ReadAtSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<bool> {
        while !buf.is_empty() {
            match self.inner.read_at(offset, buf) {
                Ok(0) => {
                    log::trace!(
                        "{}: short read at offset {offset}, {} bytes missing",
                        self.name,
                        buf.len()
                    );
                    return Ok(false);
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    fn size(&self) -> io::Result<Option<u64>> {
        Size::size(&self.inner)
    }
}
