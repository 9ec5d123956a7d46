//! The Multi-Stream File (MSF) container that wraps all PDB streams.
//!
//! An MSF file is an array of fixed-size pages. Every logical stream is described by its byte
//! length and an ordered list of page numbers; reading the pages in that order and concatenating
//! their contents yields the stream. Pages of a stream need not be adjacent or even in ascending
//! order.
//!
//! The list of all streams, the stream directory, is itself scattered across pages. Its page list
//! is stored in yet another set of pages, whose numbers follow the header in page 0:
//!
//! ```text
//! page 0:  [ SuperBlock | bootstrap page numbers ]
//!                               |
//!                               v
//!          [ directory page numbers ] --> [ stream directory ] --> [ stream pages ]
//! ```

mod directory;
mod raw;
mod stream;

use std::error::Error;

use scroll::{Pread, LE};
use smallvec::SmallVec;
use thiserror::Error;

pub use directory::StreamDirectory;
pub use stream::Stream;

use raw::SuperBlock;

/// The kind of an [`MsfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MsfErrorKind {
    /// The file does not start with the MSF 7.00 magic.
    #[error("invalid magic, not an MSF 7.00 file")]
    InvalidMagic,
    /// The header in page 0 is truncated or inconsistent.
    #[error("invalid MSF header")]
    InvalidHeader,
    /// The page size is not a supported power of two.
    #[error("invalid page size {0}")]
    InvalidPageSize(u32),
    /// The stream directory is truncated or inconsistent.
    #[error("invalid stream directory")]
    InvalidDirectory,
    /// A page list references a page beyond the end of the file.
    #[error("page {0} is out of range")]
    PageOutOfRange(u32),
    /// A read extends past the end of a stream or the file.
    #[error("unexpected end of stream")]
    UnexpectedEof,
    /// A zero-copy slice was requested across a page boundary.
    #[error("slice of {len} bytes at offset {offset} spans multiple pages")]
    UnsupportedSlice {
        /// Offset of the requested slice in the stream.
        offset: usize,
        /// Length of the requested slice.
        len: usize,
    },
    /// The requested stream is absent or not listed in the directory.
    #[error("stream {0} does not exist")]
    StreamNotFound(u32),
}

/// An error encountered while reading an [`Msf`] container.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct MsfError {
    pub(crate) kind: MsfErrorKind,
    #[source]
    pub(crate) source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl MsfError {
    /// Creates a new error from a known kind of error as well as an arbitrary error payload.
    pub(crate) fn new<E>(kind: MsfErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let source = Some(source.into());
        Self { kind, source }
    }

    /// Returns the corresponding [`MsfErrorKind`] for this error.
    pub fn kind(&self) -> MsfErrorKind {
        self.kind
    }
}

impl From<MsfErrorKind> for MsfError {
    fn from(kind: MsfErrorKind) -> Self {
        Self { kind, source: None }
    }
}

/// Zero-copy views of a byte range that is scattered across pages.
///
/// Most ranges touched during decoding lie within a single page, so two inline slots are enough
/// to avoid allocating in the common case.
pub type PageChunks<'data> = SmallVec<[&'data [u8]; 2]>;

/// Random access to the pages of a file.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Pages<'data> {
    data: &'data [u8],
    page_size: usize,
}

impl<'data> Pages<'data> {
    /// The number of (possibly partial) pages in the file.
    fn count(&self) -> u32 {
        let pages = (self.data.len() + self.page_size - 1) / self.page_size;
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// The number of pages needed to hold `bytes` bytes.
    pub(crate) fn pages_for(&self, bytes: usize) -> usize {
        (bytes + self.page_size - 1) / self.page_size
    }

    /// Returns the contents of a single page.
    ///
    /// The final page of a file may be shorter than the page size.
    fn page(&self, index: u32) -> Result<&'data [u8], MsfError> {
        let start = (index as usize)
            .checked_mul(self.page_size)
            .ok_or(MsfErrorKind::PageOutOfRange(index))?;
        if start >= self.data.len() {
            return Err(MsfErrorKind::PageOutOfRange(index).into());
        }
        let end = (start + self.page_size).min(self.data.len());
        Ok(&self.data[start..end])
    }

    /// Maps `len` bytes starting at `offset` of the stream described by `page_list`.
    ///
    /// The returned views are split exactly at page boundaries.
    pub(crate) fn map(
        &self,
        page_list: &[u32],
        offset: usize,
        len: usize,
    ) -> Result<PageChunks<'data>, MsfError> {
        let mut chunks = PageChunks::new();
        if len == 0 {
            return Ok(chunks);
        }

        let first = offset / self.page_size;
        let mut in_page = offset % self.page_size;
        let mut remaining = len;

        for &page in page_list.get(first..).ok_or(MsfErrorKind::UnexpectedEof)? {
            let contents = self.page(page)?;
            let take = (self.page_size - in_page).min(remaining);
            let chunk = contents
                .get(in_page..in_page + take)
                .ok_or(MsfErrorKind::UnexpectedEof)?;

            chunks.push(chunk);
            remaining -= take;
            in_page = 0;

            if remaining == 0 {
                return Ok(chunks);
            }
        }

        Err(MsfErrorKind::UnexpectedEof.into())
    }

    /// Reads `len` bytes starting at `offset` into a single contiguous buffer.
    pub(crate) fn read(
        &self,
        page_list: &[u32],
        offset: usize,
        len: usize,
    ) -> Result<Vec<u8>, MsfError> {
        let mut buf = Vec::with_capacity(len);
        for chunk in self.map(page_list, offset, len)? {
            buf.extend_from_slice(chunk);
        }
        Ok(buf)
    }
}

/// A parsed MSF container.
///
/// This validates the header, loads the stream directory and hands out [`Stream`]s. All data is
/// borrowed from the input buffer, which is typically a memory mapped
/// [`ByteView`](symbolic_common::ByteView).
#[derive(Clone, Debug)]
pub struct Msf<'data> {
    pages: Pages<'data>,
    header: SuperBlock,
    directory_pages: Vec<u32>,
    directory: StreamDirectory,
}

impl<'data> Msf<'data> {
    /// Tests whether the buffer starts with the MSF 7.00 magic.
    pub fn test(data: &[u8]) -> bool {
        data.starts_with(raw::MAGIC)
    }

    /// Parses the container header and stream directory.
    #[tracing::instrument(level = "trace", name = "Msf::parse", skip_all)]
    pub fn parse(data: &'data [u8]) -> Result<Self, MsfError> {
        if !Self::test(data) {
            return Err(MsfErrorKind::InvalidMagic.into());
        }

        let header: SuperBlock = data
            .pread_with(0, LE)
            .map_err(|e| MsfError::new(MsfErrorKind::InvalidHeader, e))?;

        let page_size = header.page_size;
        if !page_size.is_power_of_two()
            || !(raw::MIN_PAGE_SIZE..=raw::MAX_PAGE_SIZE).contains(&page_size)
        {
            return Err(MsfErrorKind::InvalidPageSize(page_size).into());
        }

        let pages = Pages {
            data,
            page_size: page_size as usize,
        };

        // The directory's own page list is stored in the pages listed right after the header.
        let directory_size = header.directory_size as usize;
        let list_size = pages.pages_for(directory_size) * 4;
        let bootstrap_count = pages.pages_for(list_size);
        if raw::SUPER_BLOCK_SIZE + bootstrap_count * 4 > pages.page_size {
            return Err(MsfErrorKind::InvalidHeader.into());
        }

        let bootstrap = read_u32_list(&data[raw::SUPER_BLOCK_SIZE..], bootstrap_count)
            .map_err(|e| MsfError::new(MsfErrorKind::InvalidHeader, e))?;
        let list = pages.read(&bootstrap, 0, list_size)?;
        let directory_pages = read_u32_list(&list, list_size / 4)
            .map_err(|e| MsfError::new(MsfErrorKind::InvalidDirectory, e))?;

        let directory_data = pages.read(&directory_pages, 0, directory_size)?;
        let directory = StreamDirectory::parse(&directory_data, pages.page_size, pages.count())?;

        tracing::trace!(
            page_size,
            streams = directory.stream_count(),
            "parsed stream directory"
        );

        Ok(Msf {
            pages,
            header,
            directory_pages,
            directory,
        })
    }

    /// The size of a page in bytes.
    pub fn page_size(&self) -> usize {
        self.pages.page_size
    }

    /// The number of pages the header claims to be in use.
    pub fn pages_used(&self) -> u32 {
        self.header.pages_used
    }

    /// The number of pages needed to hold `bytes` bytes.
    pub fn pages_for(&self, bytes: usize) -> usize {
        self.pages.pages_for(bytes)
    }

    /// Maps a byte range of a page list to zero-copy views, split at page boundaries.
    ///
    /// The views add up to exactly `len` bytes.
    pub fn map_pages(
        &self,
        page_list: &[u32],
        offset: usize,
        len: usize,
    ) -> Result<PageChunks<'data>, MsfError> {
        self.pages.map(page_list, offset, len)
    }

    /// Reads a byte range of a page list into one contiguous, copied buffer.
    pub fn read_pages(
        &self,
        page_list: &[u32],
        offset: usize,
        len: usize,
    ) -> Result<Vec<u8>, MsfError> {
        self.pages.read(page_list, offset, len)
    }

    /// The stream directory of this file.
    pub fn directory(&self) -> &StreamDirectory {
        &self.directory
    }

    /// The stream directory as a raw stream.
    pub fn directory_stream(&self) -> Stream<'data> {
        Stream::new(
            self.pages,
            self.directory_pages.clone(),
            self.header.directory_size as usize,
        )
    }

    /// Opens the stream with the given index.
    ///
    /// Returns [`MsfErrorKind::StreamNotFound`] if the directory does not list the stream or marks
    /// it as absent.
    pub fn stream(&self, index: u32) -> Result<Stream<'data>, MsfError> {
        let size = self
            .directory
            .stream_size(index)
            .ok_or(MsfErrorKind::StreamNotFound(index))?;
        let page_list = self
            .directory
            .stream_pages(index)
            .ok_or(MsfErrorKind::StreamNotFound(index))?;

        Ok(Stream::new(self.pages, page_list.to_vec(), size as usize))
    }
}

/// Reads `count` little-endian `u32` values from the start of `data`.
pub(crate) fn read_u32_list(data: &[u8], count: usize) -> Result<Vec<u32>, scroll::Error> {
    let mut offset = 0;
    let mut list = Vec::with_capacity(count);
    for _ in 0..count {
        list.push(data.gread_with::<u32>(&mut offset, LE)?);
    }
    Ok(list)
}
