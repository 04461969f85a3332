//! The lookahead cache: an owned, growable byte buffer with
//! `read`/`unread`/`skip`, sitting between a transport and the magic
//! scanner / frame codec.
//!
//! Buffer bookkeeping uses plain offsets into a `Vec<u8>` — no raw pointer
//! arithmetic, no manual `malloc`/`realloc`.

use crate::error::FatalError;
use std::io::Read;

/// `base ≤ read_off ≤ write_off ≤ buf.len()`.
pub struct Cache<R: Read> {
    transport: R,
    buf: Vec<u8>,
    read_off: usize,
    write_off: usize,
    datablocksize: u64,
    devblocksize: u64,
}

impl<R: Read> Cache<R> {
    pub fn new(transport: R, datablocksize: u64, devblocksize: u64) -> Self {
        Self {
            transport,
            buf: Vec::new(),
            read_off: 0,
            write_off: 0,
            datablocksize: datablocksize.max(1),
            devblocksize: devblocksize.max(1),
        }
    }

    fn buffered(&self) -> usize {
        self.write_off - self.read_off
    }

    /// Round `need` up to a `datablocksize` multiple, then to a
    /// `devblocksize` multiple.
    fn grown_capacity(&self, need: usize) -> usize {
        let need = need as u64;
        let to_data = need.div_ceil(self.datablocksize) * self.datablocksize;
        let to_dev = to_data.div_ceil(self.devblocksize) * self.devblocksize;
        to_dev as usize
    }

    /// Compact buffered bytes down to offset 0, dropping already-consumed
    /// prefix. Keeps the buffer from growing unboundedly across a long scan.
    fn compact(&mut self) {
        if self.read_off == 0 {
            return;
        }
        self.buf.copy_within(self.read_off..self.write_off, 0);
        self.write_off -= self.read_off;
        self.read_off = 0;
        self.buf.truncate(self.write_off);
    }

    /// Pull from the transport until at least `need` bytes are buffered
    /// ahead of `read_off`, or the transport is exhausted.
    fn fill(&mut self, need: usize) -> Result<(), FatalError> {
        if self.buffered() >= need {
            return Ok(());
        }
        self.compact();
        let required = self.write_off + (need - self.buffered());
        if required > self.buf.len() {
            let new_cap = self.grown_capacity(required);
            self.buf.resize(new_cap.max(required), 0);
        }
        while self.buffered() < need {
            let n = self.transport.read(&mut self.buf[self.write_off..])?;
            if n == 0 {
                break; // transport exhausted; caller sees a short read
            }
            self.write_off += n;
        }
        Ok(())
    }

    /// Read exactly `n` bytes, or fewer at EOF. Returns the bytes read.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>, FatalError> {
        self.fill(n)?;
        let avail = self.buffered().min(n);
        let out = self.buf[self.read_off..self.read_off + avail].to_vec();
        self.read_off += avail;
        Ok(out)
    }

    /// Read exactly `n` bytes; a short read is a fatal error (EOF while
    /// expecting data,.
    pub fn read_exact_or_fatal(&mut self, n: usize) -> Result<Vec<u8>, FatalError> {
        let bytes = self.read(n)?;
        if bytes.len() != n {
            return Err(FatalError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {n} bytes, got {}", bytes.len()),
            )));
        }
        Ok(bytes)
    }

    /// Rewind `read_off` by `n` bytes; `n` must not exceed how far we've
    /// already advanced past the buffer's live start.
    pub fn unread(&mut self, n: usize) {
        debug_assert!(n <= self.read_off, "unread past buffer start");
        self.read_off = self.read_off.saturating_sub(n);
    }

    /// Skip `n` bytes: consume from the cached suffix first, then
    /// read-and-discard from the transport for the remainder.
    pub fn skip(&mut self, mut n: usize) -> Result<(), FatalError> {
        let cached = self.buffered().min(n);
        self.read_off += cached;
        n -= cached;
        let chunk = self.grown_capacity(n.min(1)).max(self.datablocksize as usize);
        let mut discard = vec![0u8; chunk.min(n.max(1))];
        while n > 0 {
            let want = n.min(discard.len());
            let got = self.transport.read(&mut discard[..want])?;
            if got == 0 {
                break;
            }
            n -= got;
        }
        Ok(())
    }

    pub fn buffered_len(&self) -> usize {
        self.buffered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_advances_and_unread_rewinds() {
        let data = b"0123456789".to_vec();
        let mut cache = Cache::new(Cursor::new(data), 4, 1);
        let a = cache.read(4).unwrap();
        assert_eq!(a, b"0123");
        cache.unread(2);
        let b = cache.read(4).unwrap();
        assert_eq!(b, b"2345");
    }

    #[test]
    fn skip_consumes_cached_then_transport() {
        let data = b"abcdefghij".to_vec();
        let mut cache = Cache::new(Cursor::new(data), 4, 1);
        let _ = cache.read(2).unwrap(); // "ab" cached-consumed, rest buffered
        cache.skip(3).unwrap(); // skip "cde"
        let rest = cache.read(5).unwrap();
        assert_eq!(rest, b"fghij");
    }

    #[test]
    fn read_past_eof_is_short() {
        let data = b"xy".to_vec();
        let mut cache = Cache::new(Cursor::new(data), 4, 1);
        let got = cache.read(10).unwrap();
        assert_eq!(got, b"xy");
        assert!(cache.read_exact_or_fatal(1).is_err());
    }

    #[test]
    fn grows_to_datablocksize_then_devblocksize_multiple() {
        let cache = Cache::new(Cursor::new(Vec::<u8>::new()), 10, 7);
        // need=5 -> round to 10 (datablocksize) -> round to 14 (devblocksize multiple)
        assert_eq!(cache.grown_capacity(5), 14);
    }
}
