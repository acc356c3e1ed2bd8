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
//! Index sorted by path.

use super::{FileRange, IndexRecord, TarIndex};

/// Records sorted by path, looked up by binary search.
#[derive(Debug, Clone, Default)]
pub struct SortedIndex {
    records: Box<[IndexRecord]>,
}

impl SortedIndex {
    /// Sorts the records. For duplicate paths the last record is kept.
    pub fn new(records: impl IntoIterator<Item = IndexRecord>) -> Self {
        let mut records = records.into_iter().collect::<Vec<_>>();
        // stable, so duplicates stay in archive order
        records.sort_by(|a, b| a.path.cmp(&b.path));
        // `dedup_by` keeps the first of a run; move the later record into
        // the kept slot before dropping it.
        records.dedup_by(|later, kept| {
            if later.path == kept.path {
                core::mem::swap(later, kept);
                true
            } else {
                false
            }
        });
        Self {
            records: records.into_boxed_slice(),
        }
    }

    /// All records, sorted by path.
    #[must_use]
    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }
}

impl FromIterator<IndexRecord> for SortedIndex {
    fn from_iter<T: IntoIterator<Item = IndexRecord>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl TarIndex for SortedIndex {
    fn lookup(&self, path: &str) -> Option<FileRange> {
        self.records
            .binary_search_by(|record| record.path.as_str().cmp(path))
            .ok()
            .map(|i| self.records[i].range())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted() {
        let index: SortedIndex = ["c", "a", "b", "a", "a"]
            .into_iter()
            .enumerate()
            .map(|(i, path)| IndexRecord::new(path, 512 * (i as u64 + 1), i as u64))
            .collect();
        let paths = index
            .records()
            .iter()
            .map(|r| r.path.as_str())
            .collect::<Vec<_>>();
        assert_eq!(paths, ["a", "b", "c"]);
        // the third "a" was the fifth record
        assert_eq!(index.lookup("a").map(|r| r.offset), Some(2560));
        assert_eq!(index.lookup("c").map(|r| r.offset), Some(512));
        assert_eq!(index.lookup("d"), None);
    }

    #[test]
    fn test_empty() {
        let index = SortedIndex::default();
        assert!(index.is_empty());
        assert_eq!(index.lookup("a"), None);
    }
}
