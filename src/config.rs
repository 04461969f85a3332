//! The ambient configuration object (`g_options` in the C original), passed
//! explicitly into writer/reader constructors rather than consulted as
//! global state at operation time.

/// Options governing volume I/O, independent of any single archive session.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Cache growth quantum in bytes. The lookahead cache always grows to a
    /// multiple of this size (then rounds up to a `devblocksize` multiple).
    pub datablocksize: u64,
    /// Per-volume byte cap. `0` means unlimited (single volume).
    pub splitsize: u64,
    /// Whether an existing regular-file archive may be replaced.
    pub overwrite: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            datablocksize: 256 * 1024,
            splitsize: 0,
            overwrite: false,
        }
    }
}
