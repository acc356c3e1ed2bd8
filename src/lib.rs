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
//! Random access to the files of a Tar archive.
//!
//! Extracting one file from a Tar archive normally means reading the archive
//! up to that file. This crate instead walks the headers once, records where
//! each file's payload starts, and afterwards serves any file with a single
//! range read. That makes archives on slow or remote storage, where only
//! partial reads are affordable, usable as read-only file collections.
//!
//! The pieces:
//! - [`ByteSource`]: exact byte ranges at absolute offsets, from memory
//!   ([`MemorySource`]), a local file ([`FileSource`]) or any
//!   [`positioned_io::ReadAt`] implementation ([`ReadAtSource`]).
//! - [`TarReader`]: lazily enumerates entries and builds index records.
//! - [`TarIndex`]: path to byte range lookup, with the interchangeable
//!   backings [`NdjsonIndex`], [`SortedIndex`] and [`BinaryIndex`].
//! - [`TarArchive`]: resolves a path to its content.
//!
//! ```no_run
//! use tar_random_access::{Config, FileSource, NdjsonIndex, TarArchive, TarReader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // once: index the archive and persist the index
//! let records = TarReader::new(FileSource::open("site.tar")?).index()?;
//! std::fs::write("site.tar.index", tar_random_access::to_ndjson(&records))?;
//!
//! // later: one range read per file
//! let index = NdjsonIndex::from_slice(&std::fs::read("site.tar.index")?)?;
//! let archive = TarArchive::new(FileSource::open("site.tar")?, index);
//! if let Some(html) = archive.get("index.html")? {
//!     println!("{} bytes", html.len());
//! }
//!
//! // or both in one go, keeping the index in memory
//! let archive = TarArchive::scan(FileSource::open("site.tar")?, &Config::default())?;
//! # let _ = archive;
//! # Ok(())
//! # }
//! ```
//!
//! Supported are the v7, ustar and GNU formats, including GNU long names,
//! PAX path/size records and base-256 encoded sizes. Sparse files, hard link
//! resolution and multi-volume archives are not. Archives are never written
//! or modified.

#![deny(rustdoc::all)]
#![allow(rustdoc::missing_doc_code_examples)]
#![deny(clippy::all)]
#![deny(missing_debug_implementations)]

/// Each Archive Entry (either Header or Data Block) is a block of 512 bytes.
const BLOCKSIZE: usize = 512;

mod archive;
mod error;
mod header;
mod index;
mod reader;
mod source;
mod tar_format_types;
#[cfg(test)]
mod test_utils;

pub use archive::*;
pub use error::*;
pub use header::*;
pub use index::*;
pub use reader::*;
pub use source::*;
pub use tar_format_types::*;

pub use positioned_io;
