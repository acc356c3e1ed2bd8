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
//! Compact binary index for archives with many entries.
//!
//! Layout, all integers little endian:
//!
//! | bytes  | content                       |
//! |--------|-------------------------------|
//! | 8      | magic `b"TARIDX\x01\0"`       |
//! | 8      | number of slots               |
//! | 24 * n | slots, sorted by `path_hash`  |
//!
//! Each slot holds the XXH3-64 hash of the path, then payload offset and size.
//! Paths themselves are not stored, so a path that is *not* in the archive
//! could in theory match the hash of one that is. With 64 bit hashes this is
//! negligible; two paths of the same archive sharing a hash are rejected when
//! building the index.

use super::{FileRange, IndexRecord, TarIndex};
use crate::error::IndexError;
use core::mem::size_of;
use std::collections::HashMap;
use xxhash_rust::xxh3::xxh3_64;
use zerocopy::{little_endian as le, FromBytes, Immutable, IntoBytes, KnownLayout};

const MAGIC: [u8; 8] = *b"TARIDX\x01\0";

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct Header {
    magic: [u8; 8],
    slot_count: le::U64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct Slot {
    path_hash: le::U64,
    offset: le::U64,
    size: le::U64,
}

const HEADER_SIZE: u64 = size_of::<Header>() as u64;
const SLOT_SIZE: u64 = size_of::<Slot>() as u64;

fn path_hash(path: &str) -> u64 {
    xxh3_64(path.as_bytes())
}

/// Fixed-width slots sorted by path hash, looked up by binary search.
#[derive(Debug, Clone, Default)]
pub struct BinaryIndex {
    slots: Box<[Slot]>,
}

impl BinaryIndex {
    /// Builds the index. For duplicate paths the last record is kept.
    pub fn build(records: impl IntoIterator<Item = IndexRecord>) -> Result<Self, IndexError> {
        let mut latest = HashMap::new();
        for record in records {
            let range = record.range();
            latest.insert(record.path, range);
        }

        let mut hashed = latest
            .iter()
            .map(|(path, range)| (path_hash(path), path, *range))
            .collect::<Vec<_>>();
        hashed.sort_unstable_by_key(|&(hash, _, _)| hash);
        if let Some(pair) = hashed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(IndexError::HashCollision {
                first: pair[0].1.clone(),
                second: pair[1].1.clone(),
                hash: pair[0].0,
            });
        }

        let slots = hashed
            .into_iter()
            .map(|(hash, _, range)| Slot {
                path_hash: le::U64::new(hash),
                offset: le::U64::new(range.offset),
                size: le::U64::new(range.size),
            })
            .collect();
        Ok(Self { slots })
    }

    /// Decodes and validates an encoded index.
    pub fn from_bytes(data: &[u8]) -> Result<Self, IndexError> {
        let (header, body) =
            Header::ref_from_prefix(data).map_err(|_| IndexError::LengthMismatch {
                expected: HEADER_SIZE,
                got: data.len(),
            })?;
        if header.magic != MAGIC {
            return Err(IndexError::InvalidMagic);
        }
        let slot_count = header.slot_count.get();
        let expected = slot_count
            .checked_mul(SLOT_SIZE)
            .and_then(|len| len.checked_add(HEADER_SIZE))
            .unwrap_or(u64::MAX);
        let slots = <[Slot]>::ref_from_bytes(body)
            .ok()
            .filter(|slots| slots.len() as u64 == slot_count)
            .ok_or(IndexError::LengthMismatch {
                expected,
                got: data.len(),
            })?;
        if !slots
            .windows(2)
            .all(|pair| pair[0].path_hash.get() < pair[1].path_hash.get())
        {
            return Err(IndexError::Unsorted);
        }
        log::debug!("decoded binary index with {} slots", slots.len());
        Ok(Self {
            slots: slots.into(),
        })
    }

    /// Encodes the index into the layout described in the module docs.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = Header {
            magic: MAGIC,
            slot_count: le::U64::new(self.slots.len() as u64),
        };
        let mut out = Vec::with_capacity(HEADER_SIZE as usize + self.slots.as_bytes().len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(self.slots.as_bytes());
        out
    }
}

impl TarIndex for BinaryIndex {
    fn lookup(&self, path: &str) -> Option<FileRange> {
        let hash = path_hash(path);
        let i = self
            .slots
            .binary_search_by_key(&hash, |slot| slot.path_hash.get())
            .ok()?;
        let slot = &self.slots[i];
        Some(FileRange {
            offset: slot.offset.get(),
            size: slot.size.get(),
        })
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}
