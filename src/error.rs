//! The closed error taxonomy for the volume I/O core.
//!
//! Three kinds — recoverable per-record corruption, unrecoverable failure,
//! and a clean end-of-archive signal that is not itself an error.

use thiserror::Error;

/// Recoverable, per-record corruption. The caller may skip the affected
/// record and keep reading; the stream position is already resynchronized.
#[derive(Error, Debug)]
pub enum MinorError {
    #[error("header checksum mismatch")]
    HeaderChecksum,
    #[error("block payload checksum mismatch")]
    PayloadChecksum,
    #[error("archive-id mismatch: found {found:#010x}, expected {expected:#010x}")]
    ArchiveIdMismatch { found: u32, expected: u32 },
}

/// Unrecoverable: I/O failure, corrupt framing beyond resync, protocol
/// mismatch, or user abort. The writer/reader object must not be used again.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("system call failed: {0}")]
    Errno(#[from] nix::errno::Errno),
    #[error("no valid magic found before end of stream")]
    NoMagicFound,
    #[error("volume number mismatch in {path}: found {found}, expected {expected}")]
    VolumeNumberMismatch {
        path: String,
        found: u32,
        expected: u32,
    },
    #[error("archive-id mismatch in volume header: found {found:#010x}, expected {expected:#010x}")]
    ArchiveIdMismatch { found: u32, expected: u32 },
    #[error(
        "format version mismatch: archive is version {found}, session is based on version {expected}"
    )]
    FormatVersionMismatch { found: u32, expected: u32 },
    #[error("unrecognized magic bytes")]
    UnknownMagic,
    #[error("unrecognized format version signature")]
    UnknownFormatVersion,
    #[error("attribute value of {0} bytes exceeds the 65535-byte limit")]
    AttributeTooLarge(usize),
    #[error("path '{path}' already exists; pass overwrite to replace it")]
    AlreadyExists { path: String },
    #[error("'{path}' is not a file type this archiver can write to or read from")]
    UnsupportedFileType { path: String },
    #[error("operation aborted by user request")]
    Aborted,
    #[error("out of memory: {0}")]
    OutOfMemory(String),
    #[error("short write: wrote {wrote} of {requested} bytes; {detail}")]
    ShortWrite {
        wrote: i64,
        requested: i64,
        detail: String,
    },
}

/// Top-level result kind surfaced to the caller of a reader operation.
#[derive(Debug)]
pub enum ReadOutcome<T> {
    /// The record decoded and verified cleanly.
    Success(T),
    /// Recoverable corruption; the affected record/filesystem may be skipped.
    Minor(MinorError),
    /// A terminal volume footer with `lastvol = true` was observed.
    EndOfArchive,
}

/// Convenience alias for fatal-or-success operations (open/close/writes).
pub type FatalResult<T> = Result<T, FatalError>;
