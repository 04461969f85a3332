//! Magic scanner & resynchronization: slides a 4-byte window across
//! the lookahead cache looking for a recognized magic tag, and detects the
//! archive's format-version profile from the first volume header.

use crate::cache::Cache;
use crate::error::FatalError;
use crate::frame::{is_magic_valid, FormatProfile, Magic, FSA_CACHE_HEADER};
use std::io::Read;

/// Scan forward for the next valid magic tag.
///
/// On a match at window position `i` within the pulled bytes, `unread`s
/// `readsize - i` bytes so the caller's next `read(4)` returns the magic
/// in place.
pub fn scan_for_magic<R: Read>(
    cache: &mut Cache<R>,
    abort: &impl Fn() -> bool,
) -> Result<Magic, FatalError> {
    let mut pull_size = 4usize;
    loop {
        if abort() {
            return Err(FatalError::Aborted);
        }
        let chunk = cache.read(pull_size)?;
        if chunk.len() < 4 {
            return Err(FatalError::NoMagicFound);
        }
        if let Some(i) = find_window(&chunk) {
            cache.unread(chunk.len() - i);
            let magic_bytes = cache.read(4)?;
            let magic: Magic = magic_bytes.try_into().expect("exactly 4 bytes");
            return Ok(magic);
        }
        // No match anywhere in this pull: keep the last 3 bytes (a magic
        // may straddle the boundary) and grow the next pull.
        cache.unread(3.min(chunk.len()));
        pull_size = FSA_CACHE_HEADER;
    }
}

fn find_window(chunk: &[u8]) -> Option<usize> {
    if chunk.len() < 4 {
        return None;
    }
    (0..=chunk.len() - 4).find(|&i| is_magic_valid(&chunk[i..i + 4]))
}

/// Probe `region` — the header-bytes of a just-decoded volume header,
/// at least `FSA_CACHE_HEADER` bytes — to pin the session's `FormatProfile`.
pub fn detect_format_profile(region: &[u8]) -> Result<FormatProfile, FatalError> {
    FormatProfile::detect(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MAGIC_MAIN_HEADER;
    use std::io::Cursor;

    #[test]
    fn finds_magic_immediately() {
        let data = [&MAGIC_MAIN_HEADER[..], b"payload"].concat();
        let mut cache = Cache::new(Cursor::new(data), 16, 1);
        let m = scan_for_magic(&mut cache, &|| false).unwrap();
        assert_eq!(m, MAGIC_MAIN_HEADER);
        let rest = cache.read(7).unwrap();
        assert_eq!(rest, b"payload");
    }

    #[test]
    fn finds_magic_after_garbage_prefix() {
        let mut data = b"garbagebytesXX".to_vec();
        data.extend_from_slice(&MAGIC_MAIN_HEADER);
        data.extend_from_slice(b"tail");
        let mut cache = Cache::new(Cursor::new(data), 16, 1);
        let m = scan_for_magic(&mut cache, &|| false).unwrap();
        assert_eq!(m, MAGIC_MAIN_HEADER);
        let rest = cache.read(4).unwrap();
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn finds_magic_at_buffer_boundary() {
        // Put the magic straddling the FSA_CACHE_HEADER-2 offset (S6).
        let mut data = vec![b'x'; FSA_CACHE_HEADER - 2];
        data.extend_from_slice(&MAGIC_MAIN_HEADER);
        data.extend_from_slice(b"ok");
        let mut cache = Cache::new(Cursor::new(data), 16, 1);
        let m = scan_for_magic(&mut cache, &|| false).unwrap();
        assert_eq!(m, MAGIC_MAIN_HEADER);
        let rest = cache.read(2).unwrap();
        assert_eq!(rest, b"ok");
    }

    #[test]
    fn no_magic_is_fatal() {
        let data = vec![b'z'; 10];
        let mut cache = Cache::new(Cursor::new(data), 16, 1);
        assert!(scan_for_magic(&mut cache, &|| false).is_err());
    }
}
