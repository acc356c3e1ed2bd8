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
//! The line based index encoding.

use super::{FileRange, IndexRecord, TarIndex};
use crate::error::IndexError;
use std::collections::HashMap;
use std::io::{self, Write};

/// Writes one JSON array per record, in the given order.
pub fn write_ndjson<W: Write>(records: &[IndexRecord], mut writer: W) -> io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Encodes the records like [`write_ndjson`] into a string.
#[must_use]
pub fn to_ndjson(records: &[IndexRecord]) -> String {
    let mut out = String::new();
    for record in records {
        // a string and two integers always serialize
        if let Ok(line) = serde_json::to_string(record) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Index decoded from the line based encoding, backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct NdjsonIndex {
    entries: HashMap<String, FileRange>,
}

impl NdjsonIndex {
    /// Decodes the line based encoding. Blank lines and `\r\n` line endings
    /// are accepted. Line order only matters for a path listed more than
    /// once: the later line wins.
    pub fn from_slice(data: &[u8]) -> Result<Self, IndexError> {
        let mut entries = HashMap::new();
        for (i, line) in data.split(|&byte| byte == b'\n').enumerate() {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let record: IndexRecord = serde_json::from_slice(line)
                .map_err(|source| IndexError::Json { line: i + 1, source })?;
            let range = record.range();
            entries.insert(record.path, range);
        }
        log::debug!("decoded line index with {} paths", entries.len());
        Ok(Self { entries })
    }

    pub fn from_records(records: impl IntoIterator<Item = IndexRecord>) -> Self {
        records.into_iter().collect()
    }
}

impl FromIterator<IndexRecord> for NdjsonIndex {
    fn from_iter<T: IntoIterator<Item = IndexRecord>>(iter: T) -> Self {
        let entries = iter
            .into_iter()
            .map(|record| {
                let range = record.range();
                (record.path, range)
            })
            .collect();
        Self { entries }
    }
}

impl TarIndex for NdjsonIndex {
    fn lookup(&self, path: &str) -> Option<FileRange> {
        self.entries.get(path).copied()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
