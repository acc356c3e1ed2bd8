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
//! TAR header definition taken from <https://www.gnu.org/software/tar/manual/html_node/Standard.html>.
//! A Tar-archive is a collection of 512-byte sized blocks. Unfortunately there are several
//! TAR-like archive specifications. An Overview can be found here:
//! <https://www.gnu.org/software/tar/manual/html_node/Formats.html#Formats>
//!
//! The v7, ustar and GNU variants share the layout of [`PosixHeader`]; they
//! differ in the magic and in how the trailing fields are used.

#![allow(non_upper_case_globals)]

use crate::error::CorruptReason;
use crate::{TarFormatOctal, TarFormatString, BLOCKSIZE};
use core::fmt::{Debug, Display, Formatter};
use core::ops::Range;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Length of the `name` and `linkname` fields.
pub const NAME_LEN: usize = 100;
/// Length of the ustar `prefix` field.
pub const PREFIX_LEN: usize = 155;

/// Byte range of the checksum field inside a header block.
const CKSUM_RANGE: Range<usize> = 148..156;

/// Wrapper around the UNIX file permissions given in octal ASCII.
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct Mode(TarFormatOctal<8>);

impl Mode {
    /// Parses the [`ModeFlags`] from the mode string. File type bits, which
    /// some writers store in the mode as well, are dropped.
    #[must_use]
    pub fn to_flags(self) -> Option<ModeFlags> {
        self.0.as_u64().map(ModeFlags::from_bits_truncate)
    }
}

impl Debug for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&self.to_flags(), f)
    }
}

/// Header of the TAR format as specified by POSIX (POSIX 1003.1-1990.
/// "New" (version?) GNU Tar versions use this archive format by default.
/// (<https://www.gnu.org/software/tar/manual/html_node/Formats.html#Formats>).
///
/// Each file is started by such a header, that describes the size and
/// the file name. After that, the file content stands in chunks of 512 bytes.
/// The number of bytes can be derived from the file size.
///
/// This is also mostly compatible with the "Ustar"-header and the "GNU format".
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct PosixHeader {
    pub name: TarFormatString<NAME_LEN>,
    pub mode: Mode,
    pub uid: TarFormatOctal<8>,
    pub gid: TarFormatOctal<8>,
    // confusing; size is stored as ASCII string
    pub size: TarFormatOctal<12>,
    pub mtime: TarFormatOctal<12>,
    pub cksum: TarFormatOctal<8>,
    pub typeflag: TypeFlagRaw,
    /// Name. There is always a null byte, therefore
    /// the max len is 99.
    pub linkname: TarFormatString<NAME_LEN>,
    pub magic: TarFormatString<6>,
    pub version: TarFormatString<2>,
    /// Username. There is always a null byte, therefore
    /// the max len is N-1.
    pub uname: TarFormatString<32>,
    /// Groupname. There is always a null byte, therefore
    /// the max len is N-1.
    pub gname: TarFormatString<32>,
    pub dev_major: TarFormatOctal<8>,
    pub dev_minor: TarFormatOctal<8>,
    pub prefix: TarFormatString<PREFIX_LEN>,
    // padding => to BLOCKSIZE bytes
    pub _pad: [u8; 12],
}

impl PosixHeader {
    /// Views a raw block as header.
    #[must_use]
    pub fn from_block(block: &[u8; BLOCKSIZE]) -> &Self {
        zerocopy::transmute_ref!(block)
    }

    /// A Tar archive is terminated, if an end-of-archive entry, which consists
    /// of two 512 blocks of zero bytes, is found.
    #[must_use]
    pub fn is_zero_block(&self) -> bool {
        self.as_bytes().iter().all(|&byte| byte == 0)
    }

    /// Whether the POSIX ustar magic is present. Only then the `prefix` field
    /// holds the leading part of the path; GNU headers store other data there.
    #[must_use]
    pub fn is_ustar(&self) -> bool {
        self.magic.as_raw() == b"ustar\0"
    }

    /// The raw path of the entry: `prefix/name` for ustar headers with a
    /// prefix, `name` otherwise.
    #[must_use]
    pub fn path_bytes(&self) -> Vec<u8> {
        let name = self.name.as_bytes();
        if !self.is_ustar() || self.prefix.is_empty() {
            return name.to_vec();
        }
        let prefix = self.prefix.as_bytes();
        let mut path = Vec::with_capacity(prefix.len() + 1 + name.len());
        path.extend_from_slice(prefix);
        path.push(b'/');
        path.extend_from_slice(name);
        path
    }

    /// Payload size in bytes.
    pub fn payload_size(&self) -> Result<u64, CorruptReason> {
        self.size
            .as_u64()
            .ok_or(CorruptReason::InvalidNumber("size"))
    }

    /// Recomputes the header checksum: the sum of all header bytes with the
    /// checksum field itself counted as ASCII spaces. Returns the unsigned
    /// sum used by POSIX and the signed sum some historic writers produced.
    #[must_use]
    pub fn computed_checksums(&self) -> (u64, i64) {
        let bytes = self.as_bytes();
        let (mut unsigned, mut signed) = (0u64, 0i64);
        for (i, &byte) in bytes.iter().enumerate() {
            let byte = if CKSUM_RANGE.contains(&i) { b' ' } else { byte };
            unsigned += u64::from(byte);
            signed += i64::from(byte as i8);
        }
        (unsigned, signed)
    }

    /// Checks the stored checksum against the recomputed one and returns the
    /// stored value.
    pub fn verify_checksum(&self) -> Result<u64, CorruptReason> {
        let stored = self
            .cksum
            .as_u64()
            .ok_or(CorruptReason::InvalidNumber("cksum"))?;
        let (unsigned, signed) = self.computed_checksums();
        if stored == unsigned || i64::try_from(stored) == Ok(signed) {
            Ok(stored)
        } else {
            Err(CorruptReason::ChecksumMismatch {
                stored,
                computed: unsigned,
            })
        }
    }
}

#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Eq)]
pub struct InvalidTypeFlagError(u8);

impl Display for InvalidTypeFlagError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{:x} is not a valid TypeFlag", self.0))
    }
}

impl std::error::Error for InvalidTypeFlagError {}

#[derive(Copy, Clone, PartialOrd, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct TypeFlagRaw(u8);

impl TypeFlagRaw {
    /// Tries to parse the underlying value as [`TypeFlag`]. This fails for
    /// vendor specific or corrupt types.
    pub fn try_to_type_flag(self) -> Result<TypeFlag, InvalidTypeFlagError> {
        TypeFlag::try_from(self)
    }
}

impl Debug for TypeFlagRaw {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&self.try_to_type_flag(), f)
    }
}

/// Describes the kind of payload, that follows after a
/// [`PosixHeader`]. The properties of this payload are
/// described inside the header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
#[allow(unused)]
pub enum TypeFlag {
    /// Represents a regular file. In order to be compatible with older versions of tar, a typeflag
    /// value of AREGTYPE should be silently recognized as a regular file. New archives should be
    /// created using REGTYPE. Also, for backward compatibility, tar treats a regular file whose
    /// name ends with a slash as a directory.
    REGTYPE = b'0',
    /// Legacy spelling of [`TypeFlag::REGTYPE`].
    AREGTYPE = b'\0',
    /// This flag represents a file linked to another file, of any type, previously archived. Such
    /// files are identified in Unix by each file having the same device and inode number. The
    /// linked-to name is specified in the linkname field with a trailing null.
    LINK = b'1',
    /// This represents a symbolic link to another file. The linked-to name is specified in the
    /// linkname field with a trailing null.
    SYMTYPE = b'2',
    /// Character special file.
    CHRTYPE = b'3',
    /// Block special file.
    BLKTYPE = b'4',
    /// This flag specifies a directory or sub-directory. The directory name in the name field
    /// should end with a slash.
    DIRTYPE = b'5',
    /// This specifies a FIFO special file. Note that the archiving of a FIFO file archives the
    /// existence of this file and not its contents.
    FIFOTYPE = b'6',
    /// This specifies a contiguous file, which is the same as a normal file except that, in
    /// operating systems which support it, all its space is allocated contiguously on the disk.
    /// Operating systems which do not allow contiguous allocation should silently treat this type
    /// as a normal file.
    CONTTYPE = b'7',
    /// Extended header referring to the next file in the archive
    XHDTYPE = b'x',
    /// Global extended header
    XGLTYPE = b'g',
    /// GNU extension: the payload is the long name of the next entry.
    GNU_LONGNAME = b'L',
    /// GNU extension: the payload is the long link name of the next entry.
    GNU_LONGLINK = b'K',
}

impl TypeFlag {
    /// Whether we have a regular file.
    #[must_use]
    pub fn is_regular_file(self) -> bool {
        // equivalent, see the GNU tar manual
        self == Self::AREGTYPE || self == Self::REGTYPE || self == Self::CONTTYPE
    }

    /// Whether the entry only carries metadata for the entry that follows.
    #[must_use]
    pub fn is_extension(self) -> bool {
        matches!(
            self,
            Self::XHDTYPE | Self::XGLTYPE | Self::GNU_LONGNAME | Self::GNU_LONGLINK
        )
    }
}

impl TryFrom<TypeFlagRaw> for TypeFlag {
    type Error = InvalidTypeFlagError;

    fn try_from(value: TypeFlagRaw) -> Result<Self, Self::Error> {
        match value.0 {
            b'0' => Ok(Self::REGTYPE),
            b'\0' => Ok(Self::AREGTYPE),
            b'1' => Ok(Self::LINK),
            b'2' => Ok(Self::SYMTYPE),
            b'3' => Ok(Self::CHRTYPE),
            b'4' => Ok(Self::BLKTYPE),
            b'5' => Ok(Self::DIRTYPE),
            b'6' => Ok(Self::FIFOTYPE),
            b'7' => Ok(Self::CONTTYPE),
            b'x' => Ok(Self::XHDTYPE),
            b'g' => Ok(Self::XGLTYPE),
            b'L' => Ok(Self::GNU_LONGNAME),
            b'K' => Ok(Self::GNU_LONGLINK),
            e => Err(InvalidTypeFlagError(e)),
        }
    }
}

/// Coarse classification of an entry. Only [`EntryKind::Regular`] entries
/// carry content that can be retrieved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    Other,
}

impl EntryKind {
    /// Classifies an entry by its type flag and path. A regular file whose
    /// path ends with a slash is a directory, as old tar versions wrote them
    /// that way.
    #[must_use]
    pub fn classify(typeflag: TypeFlagRaw, path: &str) -> Self {
        match typeflag.try_to_type_flag() {
            Ok(flag) if flag.is_regular_file() => {
                if path.ends_with('/') {
                    Self::Directory
                } else {
                    Self::Regular
                }
            }
            Ok(TypeFlag::DIRTYPE) => Self::Directory,
            Ok(TypeFlag::SYMTYPE) => Self::Symlink,
            _ => Self::Other,
        }
    }
}

/// A decoded entry header, owning its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Path of the entry inside the archive.
    pub path: String,
    /// Payload size in bytes.
    pub size: u64,
    pub kind: EntryKind,
    /// Checksum stored in the header block, already verified.
    pub checksum: u64,
    pub mode: ModeFlags,
    /// Modification time in seconds since the UNIX epoch.
    pub mtime: u64,
    /// Target of symbolic and hard links.
    pub link_name: Option<String>,
    /// Absolute offset of the header block. Extension headers, if any, come
    /// before it.
    pub header_offset: u64,
}

bitflags::bitflags! {
    /// UNIX file permissions in octal format.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u64 {
        /// Set UID on execution.
        const SetUID = 0o4000;
        /// Set GID on execution.
        const SetGID = 0o2000;
        /// Reserved.
        const TSVTX = 0o1000;
        /// Owner read.
        const OwnerRead = 0o400;
        /// Owner write.
        const OwnerWrite = 0o200;
        /// Owner execute.
        const OwnerExec = 0o100;
        /// Group read.
        const GroupRead = 0o040;
        /// Group write.
        const GroupWrite = 0o020;
        /// Group execute.
        const GroupExec = 0o010;
        /// Others read.
        const OthersRead = 0o004;
        /// Others read.
        const OthersWrite = 0o002;
        /// Others execute.
        const OthersExec = 0o001;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    fn gnu_header(path: &str, size: u64, entry_type: tar::EntryType) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(size);
        header.set_mode(0o644);
        header.set_entry_type(entry_type);
        header.set_cksum();
        header
    }

    #[test]
    fn test_size() {
        assert_eq!(BLOCKSIZE, size_of::<PosixHeader>());
    }

    #[test]
    fn test_parse_gnu_header() {
        let raw = gnu_header("bye_world_513b.txt", 513, tar::EntryType::Regular);
        let hdr = PosixHeader::from_block(raw.as_bytes());
        assert_eq!(hdr.name.as_str(), Ok("bye_world_513b.txt"));
        assert_eq!(hdr.path_bytes(), b"bye_world_513b.txt");
        assert_eq!(hdr.payload_size(), Ok(513));
        assert_eq!(hdr.typeflag.try_to_type_flag(), Ok(TypeFlag::REGTYPE));
        assert_eq!(
            hdr.mode.to_flags(),
            Some(
                ModeFlags::OwnerRead
                    | ModeFlags::OwnerWrite
                    | ModeFlags::GroupRead
                    | ModeFlags::OthersRead
            )
        );
        assert!(!hdr.is_ustar());
        assert!(!hdr.is_zero_block());
    }

    #[test]
    fn test_checksum() {
        let raw = gnu_header("hello_world.txt", 12, tar::EntryType::Regular);
        let hdr = PosixHeader::from_block(raw.as_bytes());
        let stored = hdr.verify_checksum().unwrap();
        assert_eq!(Some(stored), raw.cksum().ok().map(u64::from));
    }

    #[test]
    fn test_checksum_mismatch() {
        let raw = gnu_header("hello_world.txt", 12, tar::EntryType::Regular);
        let mut block = *raw.as_bytes();
        block[0] = b'j';
        let hdr = PosixHeader::from_block(&block);
        assert!(matches!(
            hdr.verify_checksum(),
            Err(CorruptReason::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_signed_checksum_accepted() {
        let mut block = *gnu_header("x", 0, tar::EntryType::Regular).as_bytes();
        // a byte with the high bit set makes both sums differ
        block[1] = 0xe4;
        let (_, signed) = PosixHeader::from_block(&block).computed_checksums();
        let cksum = format!("{:06o}\0 ", signed);
        block[CKSUM_RANGE].copy_from_slice(cksum.as_bytes());
        assert_eq!(
            PosixHeader::from_block(&block).verify_checksum(),
            Ok(signed as u64)
        );
    }

    #[test]
    fn test_zero_block() {
        let block = [0u8; BLOCKSIZE];
        assert!(PosixHeader::from_block(&block).is_zero_block());
    }

    #[test]
    fn test_ustar_prefix() {
        let mut raw = tar::Header::new_ustar();
        let dir = "d".repeat(120);
        raw.set_path(format!("{dir}/file.txt")).unwrap();
        raw.set_cksum();
        let hdr = PosixHeader::from_block(raw.as_bytes());
        assert!(hdr.is_ustar());
        assert_eq!(hdr.prefix.as_str(), Ok(dir.as_str()));
        assert_eq!(hdr.path_bytes(), format!("{dir}/file.txt").into_bytes());
    }

    #[test]
    fn test_classify() {
        let file = gnu_header("a.txt", 0, tar::EntryType::Regular);
        let dir = gnu_header("b", 0, tar::EntryType::Directory);
        let link = gnu_header("c", 0, tar::EntryType::Symlink);
        let fifo = gnu_header("d", 0, tar::EntryType::Fifo);
        let kind = |h: &tar::Header, path| {
            EntryKind::classify(PosixHeader::from_block(h.as_bytes()).typeflag, path)
        };
        assert_eq!(kind(&file, "a.txt"), EntryKind::Regular);
        assert_eq!(kind(&file, "a/"), EntryKind::Directory);
        assert_eq!(kind(&dir, "b"), EntryKind::Directory);
        assert_eq!(kind(&link, "c"), EntryKind::Symlink);
        assert_eq!(kind(&fifo, "d"), EntryKind::Other);
    }
}
