//! Record framing: magic tags, the header-record/block-record layout,
//! and the format-version profile that lets v1 and v2 archives share one
//! decode path.

use crate::checksum::fletcher32;
use crate::dico::Dictionary;
use crate::error::{FatalError, MinorError};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// A 4-byte ASCII magic tag, drawn from the closed set in [`ALL_MAGICS`].
pub type Magic = [u8; 4];

pub const MAGIC_VOLUME_HEADER: Magic = *b"AVIH";
pub const MAGIC_VOLUME_FOOTER: Magic = *b"AVIF";
pub const MAGIC_MAIN_HEADER: Magic = *b"AVMH";
pub const MAGIC_FILESYSTEM_HEADER: Magic = *b"AVFH";
pub const MAGIC_DIRECTORY_INFO: Magic = *b"AVDI";
pub const MAGIC_OBJECT_HEADER: Magic = *b"AVOH";
pub const MAGIC_DATA_BLOCK: Magic = *b"AVDB";
pub const MAGIC_BLOCK_END: Magic = *b"AVBE";
pub const MAGIC_ARCHIVE_END: Magic = *b"AVAE";

pub const ALL_MAGICS: &[Magic] = &[
    MAGIC_VOLUME_HEADER,
    MAGIC_VOLUME_FOOTER,
    MAGIC_MAIN_HEADER,
    MAGIC_FILESYSTEM_HEADER,
    MAGIC_DIRECTORY_INFO,
    MAGIC_OBJECT_HEADER,
    MAGIC_DATA_BLOCK,
    MAGIC_BLOCK_END,
    MAGIC_ARCHIVE_END,
];

pub fn is_magic_valid(window: &[u8]) -> bool {
    window.len() == 4 && ALL_MAGICS.iter().any(|m| m == window)
}

/// Sentinel filesystem-id for records not tied to a particular filesystem
/// (volume headers/footers, the main header).
pub const FSID_NONE: u16 = 0;

/// Minimum bytes the scanner pulls once format-version probing begins.
pub const FSA_CACHE_HEADER: usize = 64;

/// Format-version identifier strings, each 10 bytes, probed at a fixed
/// offset within the first `FSA_CACHE_HEADER` bytes of a volume header's
/// header-bytes region.
const VERSION_STRING_V1A: &[u8; 10] = b"AVIOFMT_01";
const VERSION_STRING_V1B: &[u8; 10] = b"AVIOFMT_0Y";
const VERSION_STRING_V2: &[u8; 10] = b"AVIOFMT_02";
const VERSION_OFFSET_V1: usize = 40;
const VERSION_OFFSET_V2: usize = 42;

/// Per-session parsing profile, fixed once at the first volume-header
/// decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatProfile {
    V1,
    V2,
}

impl FormatProfile {
    /// Probe `region` (the first `FSA_CACHE_HEADER`+ bytes available after a
    /// volume-header magic) for a recognized version string.
    pub fn detect(region: &[u8]) -> Result<Self, FatalError> {
        if region.len() >= VERSION_OFFSET_V1 + 10 {
            let slice = &region[VERSION_OFFSET_V1..VERSION_OFFSET_V1 + 10];
            if slice == VERSION_STRING_V1A || slice == VERSION_STRING_V1B {
                return Ok(FormatProfile::V1);
            }
        }
        if region.len() >= VERSION_OFFSET_V2 + 10 {
            let slice = &region[VERSION_OFFSET_V2..VERSION_OFFSET_V2 + 10];
            if slice == VERSION_STRING_V2 {
                return Ok(FormatProfile::V2);
            }
        }
        Err(FatalError::UnknownFormatVersion)
    }

    pub fn version_string(self) -> &'static [u8; 10] {
        match self {
            FormatProfile::V1 => VERSION_STRING_V1A,
            FormatProfile::V2 => VERSION_STRING_V2,
        }
    }

    pub fn version_offset(self) -> usize {
        match self {
            FormatProfile::V1 => VERSION_OFFSET_V1,
            FormatProfile::V2 => VERSION_OFFSET_V2,
        }
    }

    fn header_length_width(self) -> usize {
        match self {
            FormatProfile::V1 => 2,
            FormatProfile::V2 => 4,
        }
    }

    /// Numeric version tag for diagnostics (`FatalError::FormatVersionMismatch`).
    pub fn version_number(self) -> u32 {
        match self {
            FormatProfile::V1 => 1,
            FormatProfile::V2 => 2,
        }
    }
}

/// A fully decoded header record: magic, archive-id, fsid, and dictionary.
#[derive(Debug, Clone)]
pub struct HeaderRecord {
    pub magic: Magic,
    pub archive_id: u32,
    pub fsid: u16,
    pub dico: Dictionary,
}

/// Encode a header record (magic + archive-id + fsid + framed dico) to `out`.
pub fn encode_header(
    out: &mut Vec<u8>,
    profile: FormatProfile,
    magic: Magic,
    archive_id: u32,
    fsid: u16,
    dico: &Dictionary,
) -> std::io::Result<()> {
    let header_bytes = dico.encode()?;
    let checksum = fletcher32(&header_bytes);

    out.write_all(&magic)?;
    out.write_u32::<LittleEndian>(archive_id)?;
    out.write_u16::<LittleEndian>(fsid)?;
    match profile.header_length_width() {
        2 => out.write_u16::<LittleEndian>(header_bytes.len() as u16)?,
        4 => out.write_u32::<LittleEndian>(header_bytes.len() as u32)?,
        _ => unreachable!(),
    }
    out.write_all(&header_bytes)?;
    out.write_u32::<LittleEndian>(checksum)?;
    Ok(())
}

/// Result of decoding one header record from a byte source.
pub enum HeaderDecode {
    Ok(HeaderRecord),
    Minor(MinorError),
}

/// Decode a header record whose magic has already been consumed from
/// `src` (the caller read 4 bytes to find `magic` via the scanner).
/// `read_exact` is a closure over the lookahead cache so this module stays
/// transport-agnostic.
/// The frame-level fields of a header record, before the header-bytes are
/// interpreted as a dico (volume headers interpret them differently — see
/// [`decode_volume_header_bytes`]).
pub struct RawHeader {
    pub archive_id: u32,
    pub fsid: u16,
    pub header_bytes: Vec<u8>,
}

pub enum RawHeaderDecode {
    Ok(RawHeader),
    Minor(MinorError),
}

/// Decode the frame fields of a header record without interpreting
/// `header_bytes` as a dico yet.
pub fn decode_header_raw(
    profile: FormatProfile,
    mut read_exact: impl FnMut(usize) -> Result<Vec<u8>, FatalError>,
) -> Result<RawHeaderDecode, FatalError> {
    let archive_id = {
        let b = read_exact(4)?;
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    };
    let fsid = {
        let b = read_exact(2)?;
        u16::from_le_bytes([b[0], b[1]])
    };
    let header_len = match profile.header_length_width() {
        2 => {
            let b = read_exact(2)?;
            u16::from_le_bytes([b[0], b[1]]) as usize
        }
        4 => {
            let b = read_exact(4)?;
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize
        }
        _ => unreachable!(),
    };
    let header_bytes = read_exact(header_len)?;
    let stored_checksum = {
        let b = read_exact(4)?;
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    };

    if fletcher32(&header_bytes) != stored_checksum {
        return Ok(RawHeaderDecode::Minor(MinorError::HeaderChecksum));
    }

    Ok(RawHeaderDecode::Ok(RawHeader {
        archive_id,
        fsid,
        header_bytes,
    }))
}

pub fn decode_header(
    magic: Magic,
    profile: FormatProfile,
    read_exact: impl FnMut(usize) -> Result<Vec<u8>, FatalError>,
) -> Result<HeaderDecode, FatalError> {
    match decode_header_raw(profile, read_exact)? {
        RawHeaderDecode::Minor(e) => Ok(HeaderDecode::Minor(e)),
        RawHeaderDecode::Ok(raw) => {
            let dico = Dictionary::decode(&raw.header_bytes).map_err(FatalError::Io)?;
            Ok(HeaderDecode::Ok(HeaderRecord {
                magic,
                archive_id: raw.archive_id,
                fsid: raw.fsid,
                dico,
            }))
        }
    }
}

/// Section/key used for the block-header attributes, shared by writer and
/// reader so both sides agree on where to find them.
pub const BLOCKHEAD_SECTION: u8 = 0;
pub const BLOCKHEADITEMKEY_ARSIZE: u16 = 1;
pub const BLOCKHEADITEMKEY_ARCSUM: u16 = 2;
pub const BLOCKHEADITEMKEY_OFFSET: u16 = 3;
pub const BLOCKHEADITEMKEY_COMPALGO: u16 = 4;
pub const BLOCKHEADITEMKEY_ENCALGO: u16 = 5;
/// Logical (pre-compression) size of the payload.
pub const BLOCKHEADITEMKEY_REALSIZE: u16 = 6;
/// Size of the payload after compression, before any on-archive framing.
/// Equal to `REALSIZE` when `COMPALGO` is the no-op algorithm.
pub const BLOCKHEADITEMKEY_COMPSIZE: u16 = 7;

/// Bytes of reserved padding at the start of a volume header's `header-bytes`,
/// before the format-version string. Exists so the version string lands at a
/// fixed absolute offset from the record's magic (40 for v1, 42 for v2 — the
/// two-byte gap accounts for the `header-length` scalar's width), letting the
/// scanner probe for it blind, before any dico parsing.
pub const VOLHEAD_RESERVED_LEN: usize = 28;

/// Build a volume header's `header-bytes`: reserved padding, then the fixed
/// version string, then the normal dico encoding of `dico`.
pub fn encode_volume_header_bytes(profile: FormatProfile, dico: &Dictionary) -> std::io::Result<Vec<u8>> {
    let mut hb = vec![0u8; VOLHEAD_RESERVED_LEN];
    hb.extend_from_slice(profile.version_string());
    hb.extend_from_slice(&dico.encode()?);
    Ok(hb)
}

/// Inverse of [`encode_volume_header_bytes`]: strip the reserved+version
/// prefix and decode the remaining bytes as a normal dico.
pub fn decode_volume_header_bytes(header_bytes: &[u8]) -> std::io::Result<Dictionary> {
    let prefix = VOLHEAD_RESERVED_LEN + 10;
    if header_bytes.len() < prefix {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "volume header too short for reserved+version prefix",
        ));
    }
    Dictionary::decode(&header_bytes[prefix..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_v2() {
        let mut d = Dictionary::new();
        d.add_u32(0, 1, 42).unwrap();
        let mut buf = Vec::new();
        encode_header(&mut buf, FormatProfile::V2, MAGIC_MAIN_HEADER, 0xDEADBEEF, 7, &d).unwrap();

        assert_eq!(&buf[0..4], &MAGIC_MAIN_HEADER);
        let rest = buf[4..].to_vec();
        let mut idx = 0usize;
        let mut reader = move |n: usize| -> Result<Vec<u8>, FatalError> {
            let out = rest[idx..idx + n].to_vec();
            idx += n;
            Ok(out)
        };
        match decode_header(MAGIC_MAIN_HEADER, FormatProfile::V2, &mut reader).unwrap() {
            HeaderDecode::Ok(rec) => {
                assert_eq!(rec.archive_id, 0xDEADBEEF);
                assert_eq!(rec.fsid, 7);
                assert_eq!(rec.dico.get_u32(0, 1), Some(42));
            }
            HeaderDecode::Minor(e) => panic!("unexpected minor error: {e}"),
        }
    }

    #[test]
    fn detects_corrupted_header_checksum() {
        let mut d = Dictionary::new();
        d.add_u32(0, 1, 42).unwrap();
        let mut buf = Vec::new();
        encode_header(&mut buf, FormatProfile::V2, MAGIC_MAIN_HEADER, 1, 0, &d).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;

        let rest = buf[4..].to_vec();
        let mut idx = 0usize;
        let mut reader = move |n: usize| -> Result<Vec<u8>, FatalError> {
            let out = rest[idx..idx + n].to_vec();
            idx += n;
            Ok(out)
        };
        match decode_header(MAGIC_MAIN_HEADER, FormatProfile::V2, &mut reader).unwrap() {
            HeaderDecode::Minor(MinorError::HeaderChecksum) => {}
            other => panic!("expected header checksum minor error, got {other:?}"),
        }
    }

    impl std::fmt::Debug for HeaderDecode {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                HeaderDecode::Ok(r) => write!(f, "Ok({:?} fsid={})", r.magic, r.fsid),
                HeaderDecode::Minor(e) => write!(f, "Minor({e})"),
            }
        }
    }

    #[test]
    fn magic_set_is_closed() {
        assert!(is_magic_valid(b"AVIH"));
        assert!(!is_magic_valid(b"ZZZZ"));
    }
}
