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
//! Mapping from entry paths to the byte range of their payload.
//!
//! [`TarIndex`] is the only thing [`TarArchive`](crate::TarArchive) needs.
//! Several backings implement it:
//! - [`NdjsonIndex`]: the line based text encoding, one `["path", offset, size]`
//!   JSON array per line, held in a hash map.
//! - [`SortedIndex`]: records sorted by path, looked up by binary search.
//! - [`BinaryIndex`]: a compact fixed-width encoding for very large archives.
//!
//! If a path occurs more than once, every backing resolves it to the record
//! that came last, as extracting the archive would overwrite earlier
//! occurrences.

mod binary;
mod ndjson;
mod sorted;

pub use binary::BinaryIndex;
pub use ndjson::{to_ndjson, write_ndjson, NdjsonIndex};
pub use sorted::SortedIndex;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Byte range of an entry's payload inside the archive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FileRange {
    /// Absolute offset of the first payload byte.
    pub offset: u64,
    /// Payload length in bytes.
    pub size: u64,
}

/// One indexed file. Serialized as the JSON array `[path, offset, size]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, u64, u64)", into = "(String, u64, u64)")]
pub struct IndexRecord {
    pub path: String,
    pub offset: u64,
    pub size: u64,
}

impl IndexRecord {
    pub fn new(path: impl Into<String>, offset: u64, size: u64) -> Self {
        Self {
            path: path.into(),
            offset,
            size,
        }
    }

    #[must_use]
    pub const fn range(&self) -> FileRange {
        FileRange {
            offset: self.offset,
            size: self.size,
        }
    }
}

impl From<(String, u64, u64)> for IndexRecord {
    fn from((path, offset, size): (String, u64, u64)) -> Self {
        Self { path, offset, size }
    }
}

impl From<IndexRecord> for (String, u64, u64) {
    fn from(record: IndexRecord) -> Self {
        (record.path, record.offset, record.size)
    }
}

/// Exact-match lookup of a path.
pub trait TarIndex {
    /// Returns the payload range of `path`, or `None` if the archive has no
    /// such file.
    fn lookup(&self, path: &str) -> Option<FileRange>;

    /// Number of distinct paths.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: TarIndex + ?Sized> TarIndex for &T {
    fn lookup(&self, path: &str) -> Option<FileRange> {
        (**self).lookup(path)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl<T: TarIndex + ?Sized> TarIndex for Box<T> {
    fn lookup(&self, path: &str) -> Option<FileRange> {
        (**self).lookup(path)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl<T: TarIndex + ?Sized> TarIndex for Arc<T> {
    fn lookup(&self, path: &str) -> Option<FileRange> {
        (**self).lookup(path)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}
