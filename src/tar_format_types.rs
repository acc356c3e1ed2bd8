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
//! Fixed-width fields of a Tar header block. Strings are NUL padded, numbers
//! are ASCII in a given radix (octal for everything the header stores) or, as
//! a GNU extension, big-endian base-256 binary.

use core::fmt::{Debug, Formatter};
use core::str::{from_utf8, Utf8Error};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Base type for strings embedded in a Tar header. The length depends on the
/// context. The returned string is likely to be UTF-8/ASCII, which is verified
/// by getters, such as [`TarFormatString::as_str`].
///
/// An optionally null terminated string. The contents are either:
/// 1. A fully populated string with no null termination or
/// 2. A partially populated string where the unused bytes are zero.
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct TarFormatString<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> TarFormatString<N> {
    /// Constructor.
    ///
    /// # Panics
    /// Panics of `N` is zero, i.e., the underlying array has no length.
    #[must_use]
    pub const fn new(bytes: [u8; N]) -> Self {
        assert!(N > 0, "array should have at least one element");
        Self { bytes }
    }

    /// True if the is string empty (ignoring NULL bytes).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }

    /// Returns the length of the payload in bytes. This is either the full
    /// capacity `N` or the data until the first NULL byte.
    #[must_use]
    pub fn size(&self) -> usize {
        memchr::memchr(0, &self.bytes).unwrap_or(N)
    }

    /// The whole field including padding.
    #[must_use]
    pub const fn as_raw(&self) -> &[u8; N] {
        &self.bytes
    }

    /// The payload bytes without terminating or padding NULL bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.size()]
    }

    /// Returns a str ref without terminating or intermediate NULL bytes. The
    /// string is truncated at the first NULL byte, in case not the full length
    /// was used.
    ///
    /// # Errors
    /// Returns a [`Utf8Error`] error for invalid strings.
    pub fn as_str(&self) -> Result<&str, Utf8Error> {
        from_utf8(self.as_bytes())
    }

    /// The numeric text of the field: leading spaces are skipped and the
    /// text ends at the first space. Some ustar implementations pad numbers
    /// with spaces on either side, which prevents parsing them directly.
    fn numeric_text(&self) -> Result<&str, Utf8Error> {
        self.as_str().map(|str| {
            let str = str.trim_start_matches(' ');
            let end_index_exclusive = str.find(' ').unwrap_or(str.len());
            &str[0..end_index_exclusive]
        })
    }
}

impl<const N: usize> Debug for TarFormatString<N> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        write!(
            f,
            "str='{:?}',byte_usage={}/{}",
            from_utf8(self.as_bytes()),
            self.size(),
            N
        )
    }
}

/// A number with a specified base. Surrounding spaces in the string are
/// ignored and an empty field reads as zero.
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct TarFormatNumber<const N: usize, const R: u32>(TarFormatString<N>);

/// An octal number, the encoding of every numeric header field.
pub type TarFormatOctal<const N: usize> = TarFormatNumber<N, 8>;

impl<const N: usize, const R: u32> TarFormatNumber<N, R> {
    #[cfg(test)]
    pub(crate) const fn new(bytes: [u8; N]) -> Self {
        Self(TarFormatString::new(bytes))
    }

    /// Interprets the underlying value as a number of the specified type using
    /// its respective radix. Returns `None` if the field is not valid text in
    /// that radix or does not fit into `T`.
    pub fn as_number<T>(&self) -> Option<T>
    where
        T: num_traits::Num,
    {
        let str = self.0.numeric_text().ok()?;
        if str.is_empty() {
            return Some(T::zero());
        }
        T::from_str_radix(str, R).ok()
    }

    /// Like [`Self::as_number`], but also understands the GNU base-256
    /// encoding: if the high bit of the first byte is set, the remaining bits
    /// of the field are a big-endian binary integer. GNU tar falls back to it
    /// for values that don't fit the octal field, e.g. sizes beyond 8GiB.
    /// Negative base-256 values are rejected.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        let bytes = &self.0.bytes;
        let first = bytes[0];
        if first & 0x80 == 0 {
            return self.as_number::<u64>();
        }
        // sign bit
        if first & 0x40 != 0 {
            return None;
        }
        bytes[1..]
            .iter()
            .try_fold(u64::from(first & 0x3f), |acc, &byte| {
                acc.checked_mul(256)?.checked_add(u64::from(byte))
            })
    }
}

impl<const N: usize, const R: u32> Debug for TarFormatNumber<N, R> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self.as_u64() {
            None => write!(f, "<invalid> [{:?}]", self.0.as_bytes()),
            Some(val) => write!(f, "{} [{:?}]", val, from_utf8(self.0.as_bytes())),
        }
    }
}
