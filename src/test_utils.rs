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
//! Helpers to create Tar archives in unit tests.

use std::io;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Thin wrapper around [`tar::Builder`] writing GNU headers.
pub struct ArchiveBuilder {
    inner: tar::Builder<Vec<u8>>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        init_logger();
        Self {
            inner: tar::Builder::new(Vec::new()),
        }
    }

    fn header(entry_type: tar::EntryType, size: u64) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header
    }

    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        let mut header = Self::header(tar::EntryType::Regular, data.len() as u64);
        self.inner.append_data(&mut header, path, data).unwrap();
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        let mut header = Self::header(tar::EntryType::Directory, 0);
        header.set_mode(0o755);
        self.inner
            .append_data(&mut header, path, io::empty())
            .unwrap();
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = Self::header(tar::EntryType::Symlink, 0);
        header.set_link_name(target).unwrap();
        self.inner
            .append_data(&mut header, path, io::empty())
            .unwrap();
        self
    }

    /// Appends a metadata entry of the given type with a raw payload.
    pub fn extension(mut self, entry_type: tar::EntryType, path: &str, payload: &[u8]) -> Self {
        let mut header = Self::header(entry_type, payload.len() as u64);
        self.inner.append_data(&mut header, path, payload).unwrap();
        self
    }

    /// Appends a PAX extended header with the given records. It applies to
    /// the entry appended next.
    pub fn pax(self, records: &[(&str, &str)]) -> Self {
        self.extension(
            tar::EntryType::XHeader,
            "PaxHeaders/entry",
            &pax_records(records),
        )
    }

    /// Appends a PAX global header, which applies to all entries after it.
    pub fn global_pax(self, records: &[(&str, &str)]) -> Self {
        self.extension(
            tar::EntryType::XGlobalHeader,
            "PaxHeaders/global",
            &pax_records(records),
        )
    }

    /// Appends a GNU long link name for the entry appended next.
    pub fn long_link(self, target: &str) -> Self {
        let mut payload = target.as_bytes().to_vec();
        payload.push(0);
        self.extension(tar::EntryType::GNULongLink, "././@LongLink", &payload)
    }

    /// Writes the end-of-archive blocks and returns the archive bytes.
    pub fn finish(self) -> Vec<u8> {
        self.inner.into_inner().unwrap()
    }
}

fn pax_records(records: &[(&str, &str)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (key, value) in records {
        // "<len> <key>=<value>\n", the length counting itself
        let rest = key.len() + value.len() + 3;
        let mut len = rest + 1;
        while len != rest + len.to_string().len() {
            len = rest + len.to_string().len();
        }
        payload.extend_from_slice(format!("{len} {key}={value}\n").as_bytes());
    }
    payload
}
