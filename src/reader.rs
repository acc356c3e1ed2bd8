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
//! Module for [`TarReader`], which walks the headers of an archive through a
//! [`ByteSource`] without touching file contents.

use crate::error::{CorruptReason, Error, Result};
use crate::header::{EntryHeader, EntryKind, ModeFlags, PosixHeader, TypeFlag};
use crate::index::IndexRecord;
use crate::source::ByteSource;
use crate::BLOCKSIZE;
use std::fmt::{Debug, Formatter};

/// Tuning knobs of the parser.
#[derive(Debug, Clone)]
pub struct Config {
    extension_size_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extension_size_limit: 1 << 20,
        }
    }
}

impl Config {
    /// Upper bound for the payload of GNU long name and PAX extension
    /// headers, which are loaded into memory. Larger ones are treated as
    /// corruption.
    pub fn extension_size_limit(mut self, limit: usize) -> Self {
        self.extension_size_limit = limit;
        self
    }
}

/// An entry of the archive together with the absolute offset of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    pub header: EntryHeader,
    /// Absolute offset of the first payload byte.
    pub offset: u64,
}

impl TarEntry {
    /// The index record of this entry.
    #[must_use]
    pub fn to_record(&self) -> IndexRecord {
        IndexRecord {
            path: self.header.path.clone(),
            offset: self.offset,
            size: self.header.size,
        }
    }
}

/// Reads the entry headers of a Tar archive.
pub struct TarReader<S> {
    source: S,
    config: Config,
}

impl<S: Debug> Debug for TarReader<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarReader")
            .field("source", &self.source)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: ByteSource> TarReader<S> {
    pub fn new(source: S) -> Self {
        Self::new_with_config(source, Config::default())
    }

    pub fn new_with_config(source: S, config: Config) -> Self {
        Self { source, config }
    }

    /// Get a reference to the underlying source.
    #[must_use]
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Retrieve the ownership of the underlying source.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Iterates over all entries of the archive, starting at its first block.
    ///
    /// The iterator is lazy: each step reads the next header block only.
    /// Dropping it early needs no cleanup. After the first error it yields
    /// nothing more.
    pub fn entries(&self) -> Entries<'_, S> {
        Entries {
            source: &self.source,
            config: &self.config,
            cursor: 0,
            archive_len: None,
            started: false,
            done: false,
        }
    }

    /// Collects an [`IndexRecord`] for every regular file in the archive, in
    /// archive order. Nothing is returned if any header is corrupt.
    pub fn index(&self) -> Result<Vec<IndexRecord>> {
        let mut records = Vec::new();
        let mut skipped = 0usize;
        for entry in self.entries() {
            let entry = entry?;
            if entry.header.kind == EntryKind::Regular {
                records.push(entry.to_record());
            } else {
                skipped += 1;
            }
        }
        log::debug!(
            "{}: indexed {} files, skipped {} other entries",
            self.source.name(),
            records.len(),
            skipped
        );
        Ok(records)
    }
}

/// Metadata collected from extension headers for the next real entry.
#[derive(Debug, Default)]
struct Overrides {
    path: Option<Vec<u8>>,
    link_name: Option<Vec<u8>>,
    size: Option<u64>,
}

impl Overrides {
    fn is_empty(&self) -> bool {
        self.path.is_none() && self.link_name.is_none() && self.size.is_none()
    }

    /// Applies the records of a PAX extended header. Each record reads
    /// `"<len> <key>=<value>\n"`, where `len` counts the whole record.
    fn apply_pax(&mut self, mut data: &[u8]) -> core::result::Result<(), CorruptReason> {
        while let Some(&first) = data.first() {
            if first == 0 {
                break;
            }
            let space = memchr::memchr(b' ', data).ok_or(CorruptReason::MalformedPax)?;
            let len = parse_decimal(&data[..space])
                .and_then(|len| usize::try_from(len).ok())
                .filter(|&len| len > space + 1 && len <= data.len())
                .ok_or(CorruptReason::MalformedPax)?;
            let record = data[space + 1..len]
                .strip_suffix(b"\n")
                .ok_or(CorruptReason::MalformedPax)?;
            let eq = memchr::memchr(b'=', record).ok_or(CorruptReason::MalformedPax)?;
            let value = &record[eq + 1..];
            match &record[..eq] {
                b"path" => self.path = Some(value.to_vec()),
                b"linkpath" => self.link_name = Some(value.to_vec()),
                b"size" => {
                    self.size = Some(parse_decimal(value).ok_or(CorruptReason::MalformedPax)?)
                }
                _ => {}
            }
            data = &data[len..];
        }
        Ok(())
    }
}

fn parse_decimal(bytes: &[u8]) -> Option<u64> {
    core::str::from_utf8(bytes).ok()?.parse().ok()
}

/// The part of a GNU long name payload before its NUL terminator.
fn until_nul(bytes: &[u8]) -> &[u8] {
    memchr::memchr(0, bytes).map_or(bytes, |end| &bytes[..end])
}

/// Offset of the block following a payload of `size` bytes.
fn padded_end(payload_offset: u64, size: u64) -> Option<u64> {
    payload_offset.checked_add(size.checked_next_multiple_of(BLOCKSIZE as u64)?)
}

/// Iterator over the entries of an archive, see [`TarReader::entries`].
/// Each iteration step starts at the next Tar header entry.
pub struct Entries<'a, S: ?Sized> {
    source: &'a S,
    config: &'a Config,
    /// Offset of the next header block.
    cursor: u64,
    archive_len: Option<u64>,
    started: bool,
    done: bool,
}

impl<S: ?Sized> Debug for Entries<'_, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entries")
            .field("cursor", &self.cursor)
            .field("archive_len", &self.archive_len)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<S: ByteSource + ?Sized> Entries<'_, S> {
    fn next_entry(&mut self) -> Result<Option<TarEntry>> {
        if !self.started {
            self.started = true;
            self.archive_len = self.source.size()?;
        }

        let mut overrides = Overrides::default();
        loop {
            let header_offset = self.cursor;
            let corrupt = |reason| Error::CorruptArchive {
                offset: header_offset,
                reason,
            };

            let mut block = [0u8; BLOCKSIZE];
            if !self.source.read_exact_at(header_offset, &mut block)? {
                log::warn!(
                    "{}: reached end of Tar archive data at offset {} without finding zero/end blocks!",
                    self.source.name(),
                    header_offset
                );
                return Ok(None);
            }

            let hdr = PosixHeader::from_block(&block);
            // check if we found end of archive
            if hdr.is_zero_block() {
                self.finish(header_offset, &overrides)?;
                return Ok(None);
            }

            let checksum = hdr.verify_checksum().map_err(corrupt)?;
            let header_size = hdr.payload_size().map_err(corrupt)?;
            let payload_offset = header_offset + BLOCKSIZE as u64;

            if let Ok(flag) = hdr.typeflag.try_to_type_flag() {
                if flag.is_extension() {
                    let payload = self.read_extension(header_offset, payload_offset, header_size)?;
                    match flag {
                        TypeFlag::GNU_LONGNAME => {
                            overrides.path = Some(until_nul(&payload).to_vec());
                        }
                        TypeFlag::GNU_LONGLINK => {
                            overrides.link_name = Some(until_nul(&payload).to_vec());
                        }
                        TypeFlag::XHDTYPE => overrides.apply_pax(&payload).map_err(corrupt)?,
                        _ => log::debug!(
                            "{}: skipping global extended header at offset {}",
                            self.source.name(),
                            header_offset
                        ),
                    }
                    self.cursor = padded_end(payload_offset, header_size)
                        .ok_or(corrupt(CorruptReason::InvalidNumber("size")))?;
                    continue;
                }
            }

            let path = overrides.path.take().unwrap_or_else(|| hdr.path_bytes());
            let path = String::from_utf8(path).map_err(|_| corrupt(CorruptReason::InvalidPath))?;
            if path.is_empty() {
                return Err(corrupt(CorruptReason::EmptyPath));
            }
            let size = overrides.size.unwrap_or(header_size);
            if let Some(archive_len) = self.archive_len {
                if payload_offset.saturating_add(size) > archive_len {
                    return Err(corrupt(CorruptReason::PayloadOutOfBounds {
                        payload_offset,
                        size,
                        archive_len,
                    }));
                }
            }
            let link_name = match overrides.link_name.take() {
                Some(link_name) => Some(String::from_utf8_lossy(&link_name).into_owned()),
                None if !hdr.linkname.is_empty() => {
                    Some(String::from_utf8_lossy(hdr.linkname.as_bytes()).into_owned())
                }
                None => None,
            };

            let header = EntryHeader {
                kind: EntryKind::classify(hdr.typeflag, &path),
                path,
                size,
                checksum,
                mode: hdr.mode.to_flags().unwrap_or(ModeFlags::empty()),
                mtime: hdr.mtime.as_u64().unwrap_or_default(),
                link_name,
                header_offset,
            };
            log::trace!(
                "{}: {:?} {:?} of {} bytes at offset {}",
                self.source.name(),
                header.kind,
                header.path,
                header.size,
                payload_offset
            );

            // in next iteration: start at next Archive entry header
            self.cursor = padded_end(payload_offset, size)
                .ok_or(corrupt(CorruptReason::InvalidNumber("size")))?;
            return Ok(Some(TarEntry {
                header,
                offset: payload_offset,
            }));
        }
    }

    fn read_extension(
        &self,
        header_offset: u64,
        payload_offset: u64,
        size: u64,
    ) -> Result<Vec<u8>> {
        let limit = self.config.extension_size_limit;
        let corrupt = |reason| Error::CorruptArchive {
            offset: header_offset,
            reason,
        };
        let len = usize::try_from(size)
            .ok()
            .filter(|&len| len <= limit)
            .ok_or(corrupt(CorruptReason::ExtensionTooLarge { size, limit }))?;
        self.source
            .read_range(payload_offset, len)?
            .ok_or(corrupt(CorruptReason::TruncatedExtension))
    }

    /// Logs how the archive ended at the zero block at `offset`.
    fn finish(&self, offset: u64, overrides: &Overrides) -> Result<()> {
        if !overrides.is_empty() {
            log::warn!(
                "{}: extension header without a following entry at the end of the archive",
                self.source.name()
            );
        }
        let mut next = [0u8; BLOCKSIZE];
        let next_offset = offset + BLOCKSIZE as u64;
        if self.source.read_exact_at(next_offset, &mut next)?
            && PosixHeader::from_block(&next).is_zero_block()
        {
            // gracefully terminated Archive
            log::debug!("{}: end of Tar archive with two zero blocks!", self.source.name());
        } else {
            log::warn!(
                "{}: zero block found at end of Tar archive, but only one instead of two!",
                self.source.name()
            );
        }
        Ok(())
    }
}

impl<S: ByteSource + ?Sized> Iterator for Entries<'_, S> {
    type Item = Result<TarEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.next_entry();
        if !matches!(next, Ok(Some(_))) {
            self.done = true;
        }
        next.transpose()
    }
}

impl<S: ByteSource + ?Sized> core::iter::FusedIterator for Entries<'_, S> {}
