//! The reader engine: volume-header validation, per-record decode
//! with Minor/Fatal classification, and volume advance on EOF.

use crate::cache::Cache;
use crate::checksum::fletcher32;
use crate::dico::Dictionary;
use crate::error::{FatalError, MinorError, ReadOutcome};
use crate::frame::{
    decode_header_raw, decode_volume_header_bytes, FormatProfile, HeaderRecord, RawHeaderDecode,
    BLOCKHEADITEMKEY_ARCSUM, BLOCKHEADITEMKEY_ARSIZE, BLOCKHEADITEMKEY_COMPALGO,
    BLOCKHEADITEMKEY_COMPSIZE, BLOCKHEADITEMKEY_ENCALGO, BLOCKHEADITEMKEY_OFFSET,
    BLOCKHEADITEMKEY_REALSIZE, BLOCKHEAD_SECTION, FSA_CACHE_HEADER, MAGIC_VOLUME_FOOTER,
    MAGIC_VOLUME_HEADER,
};
use crate::scanner::scan_for_magic;
use crate::transport::{self, Transport};
use crate::writer::get_path_to_volume;
use std::io::{self, Read};

const VOLHEAD_SECTION: u8 = 255;
const VOLHEADITEMKEY_VOLNUM: u16 = 1;
const VOLFOOTITEMKEY_LASTVOL: u16 = 2;

/// Adapts a `Box<dyn Transport>` to `std::io::Read` so it can sit behind a
/// [`Cache`].
struct TransportRead(Box<dyn Transport>);

impl Read for TransportRead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

pub struct Reader {
    profile: Option<FormatProfile>,
    expected_archive_id: Option<u32>,
    basepath: String,
    curvol: u32,
    cache: Cache<TransportRead>,
    devblocksize: u64,
    abort_flag: bool,
}

/// Outcome of reading a block payload, including the metadata fields
/// carried alongside the checksummed payload in the block header.
pub struct BlockData {
    pub payload: Vec<u8>,
    pub sumok: bool,
    pub logical_offset: u64,
    pub comp_algo: u8,
    pub enc_algo: u8,
    /// Logical (pre-compression) size, from `REALSIZE`.
    pub real_size: u64,
    /// Size after compression, from `COMPSIZE`. Equals `real_size` when no
    /// compression codec is in play.
    pub comp_size: u64,
}

impl Reader {
    /// Open volume 0 of the archive at `basepath` and validate its header.
    pub fn open(basepath: &str, datablocksize: u64, devblocksize: u64) -> Result<Self, FatalError> {
        let path0 = get_path_to_volume(basepath, 0);
        let transport = transport::open_for_read(&path0, devblocksize)?;
        let cache = Cache::new(TransportRead(transport), datablocksize, devblocksize);
        let mut r = Self {
            profile: None,
            expected_archive_id: None,
            basepath: basepath.to_string(),
            curvol: 0,
            cache,
            devblocksize,
            abort_flag: false,
        };
        r.read_volume_header(0)?;
        Ok(r)
    }

    pub fn archive_id(&self) -> Option<u32> {
        self.expected_archive_id
    }

    /// Validate and consume a volume-header record for `expected_volnum`:
    /// checks magic, archive-id (after the first volume), volnum, and
    /// resolves/validates the format-version profile.
    fn read_volume_header(&mut self, expected_volnum: u32) -> Result<(), FatalError> {
        let abort_flag = self.abort_flag;
        let magic = scan_for_magic(&mut self.cache, &|| abort_flag)?;
        if magic != MAGIC_VOLUME_HEADER {
            return Err(FatalError::UnknownMagic);
        }

        // Always re-probe this volume's own version-string region: a split
        // archive whose later volume was written under a different format
        // profile must be caught here, not silently read with the profile
        // adopted from volume 0.
        let extra = self.cache.read(FSA_CACHE_HEADER - 4)?;
        let mut region = magic.to_vec();
        region.extend_from_slice(&extra);
        let detected = FormatProfile::detect(&region)?;
        self.cache.unread(extra.len());

        let profile = match self.profile {
            Some(adopted) if adopted != detected => {
                return Err(FatalError::FormatVersionMismatch {
                    found: detected.version_number(),
                    expected: adopted.version_number(),
                });
            }
            Some(adopted) => adopted,
            None => detected,
        };

        let raw = match decode_header_raw(profile, |n| self.cache.read_exact_or_fatal(n))? {
            RawHeaderDecode::Ok(raw) => raw,
            RawHeaderDecode::Minor(_) => return Err(FatalError::UnknownMagic),
        };

        if let Some(expected) = self.expected_archive_id {
            if raw.archive_id != expected {
                return Err(FatalError::ArchiveIdMismatch {
                    found: raw.archive_id,
                    expected,
                });
            }
        } else {
            self.expected_archive_id = Some(raw.archive_id);
        }

        let dico = decode_volume_header_bytes(&raw.header_bytes).map_err(FatalError::Io)?;
        let volnum = dico.get_u32(VOLHEAD_SECTION, VOLHEADITEMKEY_VOLNUM).unwrap_or(0);
        if volnum != expected_volnum {
            return Err(FatalError::VolumeNumberMismatch {
                path: get_path_to_volume(&self.basepath, self.curvol),
                found: volnum,
                expected: expected_volnum,
            });
        }

        self.profile = Some(profile);
        Ok(())
    }

    /// Move to the next volume after hitting its footer/EOF, and validate
    /// the new volume's header.
    fn advance_volume(&mut self) -> Result<(), FatalError> {
        self.curvol += 1;
        let path = get_path_to_volume(&self.basepath, self.curvol);
        let transport = transport::open_for_read(&path, self.devblocksize).map_err(|e| match e {
            FatalError::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => FatalError::VolumeNumberMismatch {
                path: path.clone(),
                found: self.curvol.wrapping_sub(1),
                expected: self.curvol,
            },
            other => other,
        })?;
        self.cache = Cache::new(
            TransportRead(transport),
            self.cache.buffered_len().max(1) as u64,
            self.devblocksize,
        );
        self.read_volume_header(self.curvol)
    }

    /// Scan for and decode the next record's header. Returns the footer's
    /// `lastvol` via [`ReadOutcome::EndOfArchive`] when appropriate, else
    /// the decoded `(magic, fsid, dico)` triple.
    pub fn read_header(&mut self) -> Result<ReadOutcome<HeaderRecord>, FatalError> {
        loop {
            let abort_flag = self.abort_flag;
            let magic = scan_for_magic(&mut self.cache, &|| abort_flag)?;
            let profile = self.profile.ok_or(FatalError::UnknownFormatVersion)?;

            let raw = match decode_header_raw(profile, |n| self.cache.read_exact_or_fatal(n))? {
                RawHeaderDecode::Minor(e) => return Ok(ReadOutcome::Minor(e)),
                RawHeaderDecode::Ok(raw) => raw,
            };

            if let Some(expected) = self.expected_archive_id {
                if raw.archive_id != expected {
                    return Ok(ReadOutcome::Minor(MinorError::ArchiveIdMismatch {
                        found: raw.archive_id,
                        expected,
                    }));
                }
            }

            if magic == MAGIC_VOLUME_FOOTER {
                let dico = Dictionary::decode(&raw.header_bytes).map_err(FatalError::Io)?;
                let lastvol = dico.get_u16(VOLHEAD_SECTION, VOLFOOTITEMKEY_LASTVOL).unwrap_or(0) != 0;
                if lastvol {
                    return Ok(ReadOutcome::EndOfArchive);
                }
                self.advance_volume()?;
                continue;
            }

            let dico = Dictionary::decode(&raw.header_bytes).map_err(FatalError::Io)?;
            return Ok(ReadOutcome::Success(HeaderRecord {
                magic,
                archive_id: raw.archive_id,
                fsid: raw.fsid,
                dico,
            }));
        }
    }

    /// Read a block's payload given its already-decoded header dico.
    /// If `skip_flag`, skips `ARSIZE` bytes on the transport and returns
    /// `None`. Otherwise reads, verifies against `ARCSUM`, and on mismatch
    /// unreads the payload, zero-fills the return buffer, and reports the
    /// checksum failure via `sumok = false`.
    ///
    /// Also extracts offset, compression/encryption algo, and logical/
    /// compressed size from the header dico, for callers that need them.
    pub fn read_block(
        &mut self,
        header_dico: &Dictionary,
        skip_flag: bool,
    ) -> Result<Option<BlockData>, FatalError> {
        let arsize = header_dico
            .get_u64(BLOCKHEAD_SECTION, BLOCKHEADITEMKEY_ARSIZE)
            .ok_or(FatalError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "block header missing ARSIZE",
            )))? as usize;
        let arcsum = header_dico
            .get_u32(BLOCKHEAD_SECTION, BLOCKHEADITEMKEY_ARCSUM)
            .ok_or(FatalError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "block header missing ARCSUM",
            )))?;
        let logical_offset = header_dico.get_u64(BLOCKHEAD_SECTION, BLOCKHEADITEMKEY_OFFSET).unwrap_or(0);
        let comp_algo = header_dico.get_u16(BLOCKHEAD_SECTION, BLOCKHEADITEMKEY_COMPALGO).unwrap_or(0) as u8;
        let enc_algo = header_dico.get_u16(BLOCKHEAD_SECTION, BLOCKHEADITEMKEY_ENCALGO).unwrap_or(0) as u8;
        let real_size = header_dico
            .get_u64(BLOCKHEAD_SECTION, BLOCKHEADITEMKEY_REALSIZE)
            .unwrap_or(arsize as u64);
        let comp_size = header_dico
            .get_u64(BLOCKHEAD_SECTION, BLOCKHEADITEMKEY_COMPSIZE)
            .unwrap_or(arsize as u64);

        if skip_flag {
            self.cache.skip(arsize)?;
            return Ok(None);
        }

        let payload = self.cache.read_exact_or_fatal(arsize)?;
        let actual = fletcher32(&payload);
        if actual != arcsum {
            self.cache.unread(payload.len());
            return Ok(Some(BlockData {
                payload: vec![0u8; arsize],
                sumok: false,
                logical_offset,
                comp_algo,
                enc_algo,
                real_size,
                comp_size,
            }));
        }
        Ok(Some(BlockData {
            payload,
            sumok: true,
            logical_offset,
            comp_algo,
            enc_algo,
            real_size,
            comp_size,
        }))
    }

    pub fn request_abort(&mut self) {
        self.abort_flag = true;
    }
}
