//! archvolio — archive volume I/O core.
//!
//! Frames a byte stream into checksummed, length-prefixed records across
//! six transport kinds (regular file, block device, tape, character
//! device, Unix socket, FIFO) plus stdin/stdout pipe mode. See
//! [`writer::Writer`] and [`reader::Reader`] for the two engines.
//!
//! Format guarantees:
//! - All multi-byte scalars on the wire are little-endian.
//! - Every header record's header-bytes carry a trailing Fletcher-32
//!   checksum; every block payload's checksum lives in the block header's
//!   dictionary (`BLOCKHEADITEMKEY_ARCSUM`), not appended separately.
//! - Magic tags are 4 ASCII bytes from a closed set (`frame::ALL_MAGICS`).
//! - Volume numbers are strictly monotone from 0; the terminal volume's
//!   footer carries `lastvol = true`.

pub mod cache;
pub mod checksum;
pub mod config;
pub mod dico;
pub mod error;
pub mod frame;
pub mod reader;
pub mod scanner;
pub mod transport;
pub mod writer;

pub use config::ArchiveOptions;
pub use dico::Dictionary;
pub use error::{FatalError, MinorError, ReadOutcome};
pub use reader::Reader;
pub use writer::Writer;
