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
//! Module for [`TarArchive`].

use crate::error::{Error, Result};
use crate::index::{SortedIndex, TarIndex};
use crate::reader::{Config, TarReader};
use crate::source::ByteSource;

/// Random access to the files of an archive: one index lookup and one range
/// read per file.
///
/// Neither the source nor the index is mutated, so `get` may be called from
/// several threads at once if both are [`Sync`].
#[derive(Debug)]
pub struct TarArchive<S, I> {
    source: S,
    index: I,
}

impl<S: ByteSource, I: TarIndex> TarArchive<S, I> {
    /// Binds an index to the archive it was built from.
    pub const fn new(source: S, index: I) -> Self {
        Self { source, index }
    }

    /// Returns the content of the file at `path`, exactly as stored in the
    /// archive, or `None` if the index has no such file.
    pub fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(range) = self.index.lookup(path) else {
            log::trace!("{}: no entry {:?}", self.source.name(), path);
            return Ok(None);
        };
        if range.size == 0 {
            return Ok(Some(Vec::new()));
        }
        let truncated = || Error::TruncatedArchive {
            path: path.to_owned(),
            offset: range.offset,
            size: range.size,
        };
        // a stale index must not make us allocate beyond the archive
        if let Some(archive_len) = self.source.size()? {
            match range.offset.checked_add(range.size) {
                Some(end) if end <= archive_len => {}
                _ => return Err(truncated()),
            }
        }
        let too_large = || Error::EntryTooLarge {
            path: path.to_owned(),
            size: range.size,
        };
        let len = usize::try_from(range.size).map_err(|_| too_large())?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| too_large())?;
        data.resize(len, 0);
        log::trace!(
            "{}: reading {:?}, {} bytes at offset {}",
            self.source.name(),
            path,
            range.size,
            range.offset
        );
        if self.source.read_exact_at(range.offset, &mut data)? {
            Ok(Some(data))
        } else {
            Err(truncated())
        }
    }

    /// Whether the index knows `path`. Does not touch the source.
    pub fn contains(&self, path: &str) -> bool {
        self.index.lookup(path).is_some()
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub const fn index(&self) -> &I {
        &self.index
    }

    /// Splits the archive into its source and index.
    pub fn into_parts(self) -> (S, I) {
        (self.source, self.index)
    }
}

impl<S: ByteSource> TarArchive<S, SortedIndex> {
    /// Indexes `source` with a full pass over its headers and binds the
    /// result.
    pub fn scan(source: S, config: &Config) -> Result<Self> {
        let reader = TarReader::new_with_config(source, config.clone());
        let index = SortedIndex::new(reader.index()?);
        Ok(Self::new(reader.into_inner(), index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{to_ndjson, BinaryIndex, IndexRecord, NdjsonIndex};
    use crate::source::{FileSource, MemorySource};
    use crate::test_utils::ArchiveBuilder;
    use crate::CorruptReason;
    use std::io::Write;
    use std::sync::Arc;

    fn files() -> Vec<(String, Vec<u8>)> {
        vec![
            ("hello_world.txt".into(), b"Hello World\n".to_vec()),
            ("bye_world_513b.txt".into(), vec![b'b'; 513]),
            ("exactly_one_block.bin".into(), (0..=255).chain(0..=255).collect()),
            ("empty".into(), Vec::new()),
            (format!("{}/deep.txt", "nested".repeat(20)), b"deep".to_vec()),
        ]
    }

    fn archive_of(files: &[(String, Vec<u8>)]) -> Vec<u8> {
        files
            .iter()
            .fold(ArchiveBuilder::new().dir("nested"), |builder, (path, data)| {
                builder.file(path, data)
            })
            .finish()
    }

    fn memory_source(data: Vec<u8>) -> MemorySource {
        MemorySource::new("test.tar", data)
    }

    #[test]
    fn test_round_trip_through_line_index() {
        let files = files();
        let data = archive_of(&files);
        let records = TarReader::new(memory_source(data.clone())).index().unwrap();
        assert_eq!(records.len(), files.len());

        let encoded = to_ndjson(&records);
        let index = NdjsonIndex::from_slice(encoded.as_bytes()).unwrap();
        let archive = TarArchive::new(memory_source(data), index);
        for (path, content) in &files {
            assert_eq!(archive.get(path).unwrap().as_ref(), Some(content), "{path}");
        }
    }

    #[test]
    fn test_round_trip_file_source_binary_index() {
        let files = files();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&archive_of(&files)).unwrap();
        file.flush().unwrap();

        let source = Arc::new(FileSource::open(file.path()).unwrap());
        let records = TarReader::new(Arc::clone(&source)).index().unwrap();
        let encoded = BinaryIndex::build(records).unwrap().to_bytes();
        let index = BinaryIndex::from_bytes(&encoded).unwrap();
        let archive = TarArchive::new(source, index);
        for (path, content) in &files {
            assert_eq!(archive.get(path).unwrap().as_ref(), Some(content), "{path}");
        }
    }

    #[test]
    fn test_small_archive() {
        let data = ArchiveBuilder::new()
            .file("a.txt", b"0123456789")
            .file("b/c.txt", b"")
            .finish();
        let archive = TarArchive::scan(memory_source(data), &Config::default()).unwrap();
        let records = archive.index().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "a.txt");
        assert_eq!(records[1].path, "b/c.txt");
        assert!(records
            .iter()
            .all(|record| record.offset >= 512 && record.offset % 512 == 0));

        assert_eq!(archive.get("a.txt").unwrap(), Some(b"0123456789".to_vec()));
        assert_eq!(archive.get("b/c.txt").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_not_found_is_not_empty() {
        let data = ArchiveBuilder::new().file("empty.txt", b"").finish();
        let archive = TarArchive::scan(memory_source(data), &Config::default()).unwrap();
        assert_eq!(archive.get("does/not/exist").unwrap(), None);
        assert!(!archive.contains("does/not/exist"));
        assert_eq!(archive.get("empty.txt").unwrap(), Some(vec![]));
        assert!(archive.contains("empty.txt"));
    }

    #[test]
    fn test_directories_are_not_retrievable() {
        let data = ArchiveBuilder::new()
            .dir("docs")
            .file("docs/readme.md", b"# hi")
            .finish();
        let archive = TarArchive::scan(memory_source(data), &Config::default()).unwrap();
        assert_eq!(archive.index().len(), 1);
        assert_eq!(archive.get("docs").unwrap(), None);
        assert_eq!(archive.get("docs/").unwrap(), None);
        assert_eq!(archive.get("docs/readme.md").unwrap(), Some(b"# hi".to_vec()));
    }

    #[test]
    fn test_duplicate_path_last_wins() {
        let data = ArchiveBuilder::new()
            .file("dup.txt", b"first")
            .file("other.txt", b"other")
            .file("dup.txt", b"second")
            .finish();
        let source = memory_source(data);
        let reader = TarReader::new(&source);
        // enumeration reports both occurrences
        let dups = reader
            .entries()
            .filter(|entry| entry.as_ref().unwrap().header.path == "dup.txt")
            .count();
        assert_eq!(dups, 2);

        let records = reader.index().unwrap();
        let by_lines = TarArchive::new(&source, NdjsonIndex::from_records(records.clone()));
        let sorted = TarArchive::new(&source, SortedIndex::new(records.clone()));
        let binary = TarArchive::new(&source, BinaryIndex::build(records).unwrap());
        assert_eq!(by_lines.get("dup.txt").unwrap(), Some(b"second".to_vec()));
        assert_eq!(sorted.get("dup.txt").unwrap(), Some(b"second".to_vec()));
        assert_eq!(binary.get("dup.txt").unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_truncated_source() {
        let data = ArchiveBuilder::new()
            .file("a.txt", b"abc")
            .file("big.bin", &[9; 2000])
            .finish();
        let records = TarReader::new(memory_source(data.clone())).index().unwrap();
        let archive = TarArchive::new(
            memory_source(data[..2000].to_vec()),
            SortedIndex::new(records),
        );
        let err = archive.get("big.bin").unwrap_err();
        assert!(
            matches!(
                err,
                Error::TruncatedArchive {
                    ref path,
                    offset: 1536,
                    size: 2000
                } if path == "big.bin"
            ),
            "{err}"
        );
        // other lookups are unaffected
        assert_eq!(archive.get("a.txt").unwrap(), Some(b"abc".to_vec()));
    }

    #[test]
    fn test_stale_index() {
        let index = SortedIndex::new([IndexRecord::new("ghost", 1 << 40, 1)]);
        let archive = TarArchive::new(memory_source(vec![0; 1024]), index);
        assert!(matches!(
            archive.get("ghost"),
            Err(Error::TruncatedArchive { .. })
        ));
    }

    #[test]
    fn test_stale_index_huge_size() {
        let index = SortedIndex::new([
            IndexRecord::new("ghost", 512, 1 << 63),
            IndexRecord::new("wrapping", u64::MAX, 2),
        ]);
        let archive = TarArchive::new(memory_source(vec![0; 1024]), index);
        assert!(matches!(
            archive.get("ghost"),
            Err(Error::TruncatedArchive { size, .. }) if size == 1 << 63
        ));
        assert!(matches!(
            archive.get("wrapping"),
            Err(Error::TruncatedArchive { offset: u64::MAX, .. })
        ));
    }

    /// Source of unknown length, so only the allocation guards a bad size.
    struct UnknownLength(MemorySource);

    impl ByteSource for UnknownLength {
        fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<bool> {
            self.0.read_exact_at(offset, buf)
        }
    }

    #[test]
    fn test_stale_index_unknown_length() {
        let index = SortedIndex::new([
            IndexRecord::new("ghost", 512, u64::MAX),
            IndexRecord::new("short", 512, 600),
        ]);
        let archive = TarArchive::new(UnknownLength(memory_source(vec![0; 1024])), index);
        assert!(matches!(
            archive.get("ghost"),
            Err(Error::EntryTooLarge { size: u64::MAX, .. })
        ));
        assert!(matches!(
            archive.get("short"),
            Err(Error::TruncatedArchive { size: 600, .. })
        ));
    }

    #[test]
    fn test_scan_corrupt_archive() {
        let mut data = ArchiveBuilder::new().file("a.txt", b"abc").finish();
        data[0] = b'A';
        let err = TarArchive::scan(memory_source(data), &Config::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::CorruptArchive {
                offset: 0,
                reason: CorruptReason::ChecksumMismatch { .. }
            }
        ));
    }

    #[test]
    fn test_concurrent_get() {
        let files = files();
        let archive =
            TarArchive::scan(memory_source(archive_of(&files)), &Config::default()).unwrap();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for (path, content) in files.iter().rev() {
                        assert_eq!(archive.get(path).unwrap().as_ref(), Some(content));
                    }
                });
            }
        });
    }
}
