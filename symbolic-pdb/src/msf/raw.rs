use scroll::Pread;

/// The magic bytes at the start of every MSF 7.00 ("big") container.
///
/// The magic string itself is 29 bytes; the fixed 30-byte prefix includes its NUL terminator.
pub(crate) const MAGIC: &[u8; 30] = b"Microsoft C/C++ MSF 7.00\r\n\x1a\x44\x53\x00";

/// The size of [`SuperBlock`] on disk.
///
/// The page list of the stream directory's page list immediately follows the super block.
pub(crate) const SUPER_BLOCK_SIZE: usize = 52;

/// The smallest supported page size.
pub(crate) const MIN_PAGE_SIZE: u32 = 512;

/// The largest supported page size.
pub(crate) const MAX_PAGE_SIZE: u32 = 65536;

/// The header at the start of page 0.
#[derive(Debug, Clone, Copy, Pread)]
pub(crate) struct SuperBlock {
    /// [`MAGIC`], padded with NUL bytes.
    pub magic: [u8; 32],
    /// The size of a page in bytes, a power of two.
    pub page_size: u32,
    /// The page holding the active free page map.
    pub free_page_map: u32,
    /// The number of pages in the file.
    pub pages_used: u32,
    /// The size of the stream directory in bytes.
    pub directory_size: u32,
    /// Unused.
    pub _reserved: u32,
}
