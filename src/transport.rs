//! Transport abstraction: one `Transport` trait, one concrete type
//! per stat-detected file kind, chosen once at open time.

use crate::error::FatalError;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::select::{select, FdSet};
use nix::sys::stat::{stat, SFlag};
use nix::sys::time::TimeVal;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

/// Default device-block quantum used by tape transports when the drive's
/// reported block size is queried at open (`FSA_TAPE_BLOCK` equivalent).
pub const DEFAULT_TAPE_BLOCK: u64 = 512;

pub trait Transport {
    /// Read up to `buf.len()` bytes; returns the count read (may be short,
    /// never an error at clean EOF).
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Write all of `buf`; quantization/buffering is internal to the impl.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    /// Skip forward `n` bytes, by seek or by read-and-discard.
    fn skip(&mut self, n: u64) -> io::Result<u64>;
    /// The physical write/read quantum; `1` for byte-granular transports.
    fn devblocksize(&self) -> u64 {
        1
    }
    /// Flush any buffered bytes, zero-padding to `devblocksize` if needed.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── Regular files ───────────────────────────────────────────────────────────

pub struct RegularTransport {
    file: File,
    path: String,
}

impl RegularTransport {
    pub fn open_for_write(path: &str, overwrite: bool) -> Result<Self, FatalError> {
        let p = Path::new(path);
        if p.exists() && !overwrite {
            return Err(FatalError::AlreadyExists {
                path: path.to_string(),
            });
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(p)?;
        Ok(Self {
            file,
            path: path.to_string(),
        })
    }

    pub fn open_for_read(path: &str) -> Result<Self, FatalError> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_string(),
        })
    }

    /// Probe free space on the containing filesystem after a short write;
    /// the FAT 32-bit-size limit is the classic cause.
    fn disk_space_hint(&self) -> String {
        match nix::sys::statvfs::statvfs(Path::new(&self.path)) {
            Ok(vfs) => {
                let free = vfs.blocks_available() * vfs.fragment_size();
                if free < 2 * 1024 * 1024 * 1024 {
                    format!(
                        "{free} bytes free on the containing filesystem; \
                         if it is FAT-formatted, single-file size is capped at 2 GiB"
                    )
                } else {
                    format!("{free} bytes free on the containing filesystem")
                }
            }
            Err(e) => format!("could not query free space: {e}"),
        }
    }
}

impl Transport for RegularTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        if n < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!(
                    "short write: wrote {n} of {} bytes; {}",
                    buf.len(),
                    self.disk_space_hint()
                ),
            ));
        }
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        self.file.seek(SeekFrom::Current(n as i64))?;
        Ok(n)
    }

    fn close(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

// ── Block devices ───────────────────────────────────────────────────────────

/// Accumulates bytes and flushes only at `devblocksize` boundaries,
/// retaining any remainder.
pub struct BlockTransport {
    file: File,
    devblocksize: u64,
    write_buf: Vec<u8>,
}

impl BlockTransport {
    pub fn open_for_write(path: &str, devblocksize: u64) -> Result<Self, FatalError> {
        let file = OpenOptions::new().write(true).open(path)?;
        Ok(Self {
            file,
            devblocksize: devblocksize.max(1),
            write_buf: Vec::new(),
        })
    }

    pub fn open_for_read(path: &str, devblocksize: u64) -> Result<Self, FatalError> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self {
            file,
            devblocksize: devblocksize.max(1),
            write_buf: Vec::new(),
        })
    }

    fn flush_quantized(&mut self, pad_remainder: bool) -> io::Result<()> {
        let dbs = self.devblocksize as usize;
        let mut flush_len = (self.write_buf.len() / dbs) * dbs;
        if pad_remainder && !self.write_buf.len().is_multiple_of(dbs) {
            let pad = dbs - (self.write_buf.len() % dbs);
            self.write_buf.extend(std::iter::repeat_n(0u8, pad));
            flush_len = self.write_buf.len();
        }
        if flush_len > 0 {
            self.file.write_all(&self.write_buf[..flush_len])?;
            self.write_buf.drain(..flush_len);
        }
        Ok(())
    }
}

impl Transport for BlockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let dbs = self.devblocksize as usize;
        let rounded = buf.len().div_ceil(dbs.max(1)) * dbs.max(1);
        let mut tmp = vec![0u8; rounded.max(dbs)];
        let n = self.file.read(&mut tmp)?;
        let copy = n.min(buf.len());
        buf[..copy].copy_from_slice(&tmp[..copy]);
        Ok(copy)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_buf.extend_from_slice(buf);
        self.flush_quantized(false)?;
        Ok(buf.len())
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let dbs = self.devblocksize;
        let rounded = n.div_ceil(dbs) * dbs;
        self.file.seek(SeekFrom::Current(rounded as i64))?;
        Ok(n)
    }

    fn devblocksize(&self) -> u64 {
        self.devblocksize
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush_quantized(true)?;
        self.file.flush()
    }
}

// ── Tape (SCSI character device) ────────────────────────────────────────────

#[repr(C)]
struct MtGet {
    mt_type: libc::c_long,
    mt_resid: libc::c_long,
    mt_dsreg: libc::c_long,
    mt_gstat: libc::c_long,
    mt_erreg: libc::c_long,
    mt_fileno: libc::c_int,
    mt_blkno: libc::c_int,
}

#[repr(C)]
struct MtOp {
    mt_op: libc::c_short,
    mt_count: libc::c_int,
}

const MTSETBLK: libc::c_short = 20;

nix::ioctl_read!(mt_iocget, b'm', 2, MtGet);
nix::ioctl_write_ptr!(mt_ioctop, b'm', 1, MtOp);

pub struct TapeTransport {
    file: File,
    devblocksize: u64,
    write_buf: Vec<u8>,
    original_blocksize: Option<i32>,
}

impl TapeTransport {
    fn set_block_size(fd: RawFd, blocksize: u64) -> Result<(), FatalError> {
        let op = MtOp {
            mt_op: MTSETBLK,
            mt_count: blocksize as libc::c_int,
        };
        unsafe { mt_ioctop(fd, &op) }
            .map_err(|e| FatalError::Io(io::Error::from(e)))?;
        Ok(())
    }

    fn query_block_size(fd: RawFd) -> Result<i32, FatalError> {
        let mut get = MtGet {
            mt_type: 0,
            mt_resid: 0,
            mt_dsreg: 0,
            mt_gstat: 0,
            mt_erreg: 0,
            mt_fileno: 0,
            mt_blkno: 0,
        };
        unsafe { mt_iocget(fd, &mut get) }
            .map_err(|e| FatalError::Io(io::Error::from(e)))?;
        // mt_dsreg high bits hold the current block size on Linux st driver.
        Ok(((get.mt_dsreg >> 16) & 0xffffff) as i32)
    }

    fn open(path: &str, write: bool, devblocksize: u64) -> Result<Self, FatalError> {
        let file = if write {
            OpenOptions::new().write(true).open(path)?
        } else {
            OpenOptions::new().read(true).open(path)?
        };
        let fd = file.as_raw_fd();
        let original = Self::query_block_size(fd).ok();
        if let Some(orig) = original {
            if orig != devblocksize as i32 && devblocksize > 0 {
                Self::set_block_size(fd, devblocksize)?;
            }
        }
        Ok(Self {
            file,
            devblocksize: devblocksize.max(DEFAULT_TAPE_BLOCK),
            write_buf: Vec::new(),
            original_blocksize: original,
        })
    }

    pub fn open_for_write(path: &str, devblocksize: u64) -> Result<Self, FatalError> {
        Self::open(path, true, devblocksize)
    }

    pub fn open_for_read(path: &str, devblocksize: u64) -> Result<Self, FatalError> {
        Self::open(path, false, devblocksize)
    }

    fn flush_quantized(&mut self, pad_remainder: bool) -> io::Result<()> {
        let dbs = self.devblocksize as usize;
        let mut flush_len = (self.write_buf.len() / dbs) * dbs;
        if pad_remainder && !self.write_buf.len().is_multiple_of(dbs) {
            let pad = dbs - (self.write_buf.len() % dbs);
            self.write_buf.extend(std::iter::repeat_n(0u8, pad));
            flush_len = self.write_buf.len();
        }
        if flush_len > 0 {
            self.file.write_all(&self.write_buf[..flush_len])?;
            self.write_buf.drain(..flush_len);
        }
        Ok(())
    }
}

impl Transport for TapeTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let dbs = self.devblocksize as usize;
        let rounded = buf.len().div_ceil(dbs.max(1)) * dbs.max(1);
        let mut tmp = vec![0u8; rounded.max(dbs)];
        let n = self.file.read(&mut tmp)?;
        let copy = n.min(buf.len());
        buf[..copy].copy_from_slice(&tmp[..copy]);
        Ok(copy)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_buf.extend_from_slice(buf);
        self.flush_quantized(false)?;
        Ok(buf.len())
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        // Tape skip reuses the block-quantized skip logic: the drive has
        // no random seek, so this still walks forward read-and-discard at
        // `devblocksize` granularity via the reader engine.
        let dbs = self.devblocksize;
        let rounded = n.div_ceil(dbs) * dbs;
        let mut discard = vec![0u8; dbs as usize];
        let mut remaining = rounded;
        while remaining > 0 {
            let got = self.file.read(&mut discard)?;
            if got == 0 {
                break;
            }
            remaining = remaining.saturating_sub(got as u64);
        }
        Ok(n)
    }

    fn devblocksize(&self) -> u64 {
        self.devblocksize
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush_quantized(true)?;
        self.file.flush()?;
        if let Some(orig) = self.original_blocksize {
            if orig > 0 {
                let _ = Self::set_block_size(self.file.as_raw_fd(), orig as u64);
            }
        }
        Ok(())
    }
}

// ── select()-based readiness-polled devices (char dev / socket / fifo) ─────

fn wait_readable(fd: RawFd) -> Result<(), FatalError> {
    // SAFETY: `fd` is borrowed only for the duration of this `select` call,
    // and the owning `File`/stream outlives every caller of this function.
    let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
    let mut set = FdSet::new();
    set.insert(borrowed);
    let mut timeout = TimeVal::new(1, 0);
    loop {
        match select(fd + 1, &mut set, None, None, &mut timeout) {
            Ok(n) if n > 0 => return Ok(()),
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(FatalError::Errno(e)),
        }
    }
}

fn set_nonblocking(fd: RawFd) -> Result<(), FatalError> {
    // SAFETY: `fd` is borrowed only for the duration of these `fcntl` calls.
    let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
    let flags = fcntl(borrowed, FcntlArg::F_GETFL)?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(borrowed, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

/// Shared select+EAGAIN-retry read loop for char devices, sockets, FIFOs.
fn select_read(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let fd = file.as_raw_fd();
    loop {
        wait_readable(fd).map_err(io::Error::from)?;
        match file.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
}

impl From<FatalError> for io::Error {
    fn from(e: FatalError) -> Self {
        match e {
            FatalError::Io(io_err) => io_err,
            other => io::Error::other(other.to_string()),
        }
    }
}

pub struct CharDevTransport {
    file: File,
}

impl CharDevTransport {
    pub fn open_for_read(path: &str) -> Result<Self, FatalError> {
        let file = OpenOptions::new().read(true).open(path)?;
        set_nonblocking(file.as_raw_fd())?;
        Ok(Self { file })
    }

    pub fn open_for_write(path: &str) -> Result<Self, FatalError> {
        let file = OpenOptions::new().write(true).open(path)?;
        Ok(Self { file })
    }
}

impl Transport for CharDevTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        select_read(&mut self.file, buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.file.flush()?;
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut discard = vec![0u8; n.min(64 * 1024) as usize];
        let mut remaining = n;
        while remaining > 0 {
            let want = remaining.min(discard.len() as u64) as usize;
            let got = select_read(&mut self.file, &mut discard[..want])?;
            if got == 0 {
                break;
            }
            remaining -= got as u64;
        }
        Ok(n)
    }
}

pub struct SocketTransport {
    stream: std::os::unix::net::UnixStream,
}

impl SocketTransport {
    pub fn connect(path: &str) -> Result<Self, FatalError> {
        let stream = std::os::unix::net::UnixStream::connect(path)?;
        stream.set_nonblocking(true)?;
        Ok(Self { stream })
    }
}

impl Transport for SocketTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            wait_readable(self.stream.as_raw_fd()).map_err(io::Error::from)?;
            match self.stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.stream.write(buf)?;
        self.stream.flush()?;
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut discard = vec![0u8; n.min(64 * 1024) as usize];
        let mut remaining = n;
        while remaining > 0 {
            let want = remaining.min(discard.len() as u64) as usize;
            let got = self.read(&mut discard[..want])?;
            if got == 0 {
                break;
            }
            remaining -= got as u64;
        }
        Ok(n)
    }
}

pub struct FifoTransport {
    file: File,
    writing: bool,
}

impl FifoTransport {
    pub fn open_for_read(path: &str) -> Result<Self, FatalError> {
        let file = OpenOptions::new().read(true).open(path)?;
        set_nonblocking(file.as_raw_fd())?;
        Ok(Self {
            file,
            writing: false,
        })
    }

    pub fn open_for_write(path: &str) -> Result<Self, FatalError> {
        let file = OpenOptions::new().write(true).open(path)?;
        Ok(Self {
            file,
            writing: true,
        })
    }
}

impl Transport for FifoTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        debug_assert!(!self.writing);
        select_read(&mut self.file, buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.file.flush()?;
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut discard = vec![0u8; n.min(64 * 1024) as usize];
        let mut remaining = n;
        while remaining > 0 {
            let want = remaining.min(discard.len() as u64) as usize;
            let got = select_read(&mut self.file, &mut discard[..want])?;
            if got == 0 {
                break;
            }
            remaining -= got as u64;
        }
        Ok(n)
    }
}

// ── Standard pipes ("-") ─────────────────────────────────────────────────

pub struct PipeInTransport {
    stdin: io::Stdin,
}

impl PipeInTransport {
    pub fn new() -> Self {
        Self { stdin: io::stdin() }
    }
}

impl Default for PipeInTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for PipeInTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdin.lock().read(buf)
    }

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "PipeIn is read-only"))
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut discard = vec![0u8; n.min(64 * 1024) as usize];
        let mut remaining = n;
        while remaining > 0 {
            let want = remaining.min(discard.len() as u64) as usize;
            let got = self.stdin.lock().read(&mut discard[..want])?;
            if got == 0 {
                break;
            }
            remaining -= got as u64;
        }
        Ok(n)
    }
}

pub struct PipeOutTransport {
    stdout: io::Stdout,
}

impl PipeOutTransport {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Default for PipeOutTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for PipeOutTransport {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "PipeOut is write-only"))
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut lock = self.stdout.lock();
        lock.write_all(buf)?;
        lock.flush()?;
        Ok(buf.len())
    }

    fn skip(&mut self, _n: u64) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "PipeOut cannot skip"))
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────

/// Linux SCSI tape driver major number (`st`/`nst` character devices).
const SCSI_TAPE_MAJOR: u64 = 9;

/// Identify whether a character device's `st_rdev` belongs to the SCSI tape
/// driver, vs. any other character device. Major-number based, not a
/// filename heuristic: a tape exposed under a custom name is still
/// recognized, and a non-tape device merely named `/dev/st*` is not.
fn is_scsi_tape(rdev: libc::dev_t) -> bool {
    libc::major(rdev) as u64 == SCSI_TAPE_MAJOR
}

pub fn open_for_write(
    path: &str,
    devblocksize: u64,
    overwrite: bool,
) -> Result<Box<dyn Transport>, FatalError> {
    if path == "-" {
        return Ok(Box::new(PipeOutTransport::new()));
    }
    let meta = stat(Path::new(path));
    match meta {
        Ok(st) => {
            let mode = SFlag::from_bits_truncate(st.st_mode);
            if mode.contains(SFlag::S_IFBLK) {
                Ok(Box::new(BlockTransport::open_for_write(path, devblocksize)?))
            } else if mode.contains(SFlag::S_IFCHR) && is_scsi_tape(st.st_rdev) {
                Ok(Box::new(TapeTransport::open_for_write(path, devblocksize)?))
            } else if mode.contains(SFlag::S_IFCHR) {
                Ok(Box::new(CharDevTransport::open_for_write(path)?))
            } else if mode.contains(SFlag::S_IFSOCK) {
                Ok(Box::new(SocketTransport::connect(path)?))
            } else if mode.contains(SFlag::S_IFIFO) {
                Ok(Box::new(FifoTransport::open_for_write(path)?))
            } else if mode.contains(SFlag::S_IFREG) {
                Ok(Box::new(RegularTransport::open_for_write(path, overwrite)?))
            } else {
                Err(FatalError::UnsupportedFileType {
                    path: path.to_string(),
                })
            }
        }
        // Nothing there yet: a new regular-file archive.
        Err(_) => Ok(Box::new(RegularTransport::open_for_write(path, overwrite)?)),
    }
}

pub fn open_for_read(path: &str, devblocksize: u64) -> Result<Box<dyn Transport>, FatalError> {
    if path == "-" {
        return Ok(Box::new(PipeInTransport::new()));
    }
    let st = stat(Path::new(path))?;
    let mode = SFlag::from_bits_truncate(st.st_mode);
    if mode.contains(SFlag::S_IFBLK) {
        Ok(Box::new(BlockTransport::open_for_read(path, devblocksize)?))
    } else if mode.contains(SFlag::S_IFCHR) && is_scsi_tape(st.st_rdev) {
        Ok(Box::new(TapeTransport::open_for_read(path, devblocksize)?))
    } else if mode.contains(SFlag::S_IFCHR) {
        Ok(Box::new(CharDevTransport::open_for_read(path)?))
    } else if mode.contains(SFlag::S_IFSOCK) {
        Ok(Box::new(SocketTransport::connect(path)?))
    } else if mode.contains(SFlag::S_IFIFO) {
        Ok(Box::new(FifoTransport::open_for_read(path)?))
    } else if mode.contains(SFlag::S_IFREG) {
        Ok(Box::new(RegularTransport::open_for_read(path)?))
    } else {
        Err(FatalError::UnsupportedFileType {
            path: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scsi_tape_identified_by_major_number_not_name() {
        // Major 9, any minor: a real `st`/`nst` device regardless of name.
        assert!(is_scsi_tape(libc::makedev(9, 0)));
        assert!(is_scsi_tape(libc::makedev(9, 131))); // e.g. a custom-named nst-style minor
        // Any other major, even a device named like a tape, is not one.
        assert!(!is_scsi_tape(libc::makedev(21, 0))); // major 21 is the generic SCSI char driver (sg)
        assert!(!is_scsi_tape(libc::makedev(5, 0)));
    }

    #[test]
    fn regular_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.fvol");
        let path_str = path.to_str().unwrap();

        let mut w = RegularTransport::open_for_write(path_str, false).unwrap();
        w.write(b"hello world").unwrap();
        w.close().unwrap();

        let mut r = RegularTransport::open_for_read(path_str).unwrap();
        let mut buf = Vec::new();
        r.read_to_end_for_test(&mut buf);
        assert_eq!(buf, b"hello world");
    }

    impl RegularTransport {
        fn read_to_end_for_test(&mut self, out: &mut Vec<u8>) {
            let mut buf = [0u8; 4096];
            loop {
                let n = self.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&buf[..n]);
            }
        }
    }

    #[test]
    fn refuses_overwrite_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.fvol");
        std::fs::write(&path, b"existing").unwrap();
        let err = RegularTransport::open_for_write(path.to_str().unwrap(), false);
        assert!(matches!(err, Err(FatalError::AlreadyExists { .. })));
    }

    #[test]
    fn block_writer_pads_remainder_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blk.img");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        let mut w = BlockTransport::open_for_write(path.to_str().unwrap(), 512).unwrap();
        w.write(b"short").unwrap();
        w.close().unwrap();
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(&on_disk[..5], b"short");
        assert_eq!(&on_disk[5..512], &vec![0u8; 507][..]);
    }
}
