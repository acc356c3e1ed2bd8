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
//! Error types of this crate.
//!
//! A path that is missing from an index is not an error: lookups return
//! `Ok(None)` for it.

use std::io;

/// Result alias with [`Error`] as the default error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised while parsing an archive or reading an entry from it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A header block could not be decoded. The whole enumeration or indexing
    /// pass is aborted.
    #[error("corrupt tar archive at offset {offset}: {reason}")]
    CorruptArchive {
        /// Absolute offset of the offending header block.
        offset: u64,
        reason: CorruptReason,
    },
    /// The index promised bytes the source could not deliver, so archive and
    /// index disagree.
    #[error("truncated tar archive: {path:?} needs {size} bytes at offset {offset}")]
    TruncatedArchive { path: String, offset: u64, size: u64 },
    /// The entry is larger than what fits into memory on this platform.
    #[error("entry {path:?} of {size} bytes is too large to be loaded")]
    EntryTooLarge { path: String, size: u64 },
    #[error("malformed index: {0}")]
    Index(#[from] IndexError),
    /// Transport failure of the underlying byte source.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What exactly is wrong with a header block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CorruptReason {
    #[error("header checksum mismatch, stored {stored:#o} but computed {computed:#o}")]
    ChecksumMismatch { stored: u64, computed: u64 },
    #[error("invalid numeric header field `{0}`")]
    InvalidNumber(&'static str),
    #[error("entry path is empty")]
    EmptyPath,
    #[error("entry path is not valid UTF-8")]
    InvalidPath,
    #[error("extension header of {size} bytes exceeds the limit of {limit} bytes")]
    ExtensionTooLarge { size: u64, limit: usize },
    #[error("extension header payload is truncated")]
    TruncatedExtension,
    #[error("malformed PAX extended header record")]
    MalformedPax,
    #[error("payload of {size} bytes at offset {payload_offset} ends past the archive end at {archive_len}")]
    PayloadOutOfBounds {
        payload_offset: u64,
        size: u64,
        archive_len: u64,
    },
}

/// Errors raised while decoding or building a persisted index.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum IndexError {
    #[error("invalid record on line {line}: {source}")]
    Json {
        /// 1-based line number.
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid binary index magic")]
    InvalidMagic,
    #[error("binary index length mismatch, expected {expected} bytes but got {got}")]
    LengthMismatch { expected: u64, got: usize },
    #[error("binary index slots are not sorted by path hash")]
    Unsorted,
    #[error("paths {first:?} and {second:?} share the hash {hash:#018x}")]
    HashCollision {
        first: String,
        second: String,
        hash: u64,
    },
}
