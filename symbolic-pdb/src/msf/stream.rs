use std::borrow::Cow;

use scroll::{Pread, LE};

use super::{MsfError, MsfErrorKind, PageChunks, Pages};

/// A logical stream of an MSF container.
///
/// Streams present their scattered pages as one contiguous byte sequence of [`len`](Self::len)
/// bytes. Reads never go past the stream length, even if the last page contains more data.
#[derive(Clone, Debug)]
pub struct Stream<'data> {
    pages: Pages<'data>,
    page_list: Vec<u32>,
    size: usize,
}

impl<'data> Stream<'data> {
    pub(crate) fn new(pages: Pages<'data>, page_list: Vec<u32>, size: usize) -> Self {
        Stream {
            pages,
            page_list,
            size,
        }
    }

    /// The length of this stream in bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if this stream contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The ordered list of pages backing this stream.
    pub fn page_list(&self) -> &[u32] {
        &self.page_list
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), MsfError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(MsfErrorKind::UnexpectedEof.into()),
        }
    }

    /// Returns zero-copy views of a byte range, split at page boundaries.
    pub fn chunks(&self, offset: usize, len: usize) -> Result<PageChunks<'data>, MsfError> {
        self.check_range(offset, len)?;
        self.pages.map(&self.page_list, offset, len)
    }

    /// Reads a single byte.
    pub fn byte(&self, offset: usize) -> Result<u8, MsfError> {
        let chunks = self.chunks(offset, 1)?;
        chunks
            .first()
            .and_then(|chunk| chunk.first())
            .copied()
            .ok_or_else(|| MsfErrorKind::UnexpectedEof.into())
    }

    /// Reads a little-endian `u16`, which may straddle a page boundary.
    pub fn read_u16(&self, offset: usize) -> Result<u16, MsfError> {
        let bytes = self.read(offset, 2)?;
        bytes
            .pread_with(0, LE)
            .map_err(|e| MsfError::new(MsfErrorKind::UnexpectedEof, e))
    }

    /// Reads a little-endian `u32`, which may straddle a page boundary.
    pub fn read_u32(&self, offset: usize) -> Result<u32, MsfError> {
        let bytes = self.read(offset, 4)?;
        bytes
            .pread_with(0, LE)
            .map_err(|e| MsfError::new(MsfErrorKind::UnexpectedEof, e))
    }

    /// Borrows a byte range that lies within a single page.
    ///
    /// Returns [`MsfErrorKind::UnsupportedSlice`] if the range crosses a page boundary. Use
    /// [`read`](Self::read) for ranges that may span pages.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'data [u8], MsfError> {
        let chunks = self.chunks(offset, len)?;
        match chunks.as_slice() {
            [] => Ok(&[]),
            [chunk] => Ok(*chunk),
            _ => Err(MsfErrorKind::UnsupportedSlice { offset, len }.into()),
        }
    }

    /// Reads a byte range, borrowing when it lies within one page and copying otherwise.
    pub fn read(&self, offset: usize, len: usize) -> Result<Cow<'data, [u8]>, MsfError> {
        let chunks = self.chunks(offset, len)?;
        Ok(match chunks.as_slice() {
            [] => Cow::Borrowed(&[]),
            [chunk] => Cow::Borrowed(*chunk),
            chunks => Cow::Owned(chunks.concat()),
        })
    }

    /// Reads the entire stream into a contiguous buffer.
    pub fn as_bytes(&self) -> Result<Cow<'data, [u8]>, MsfError> {
        self.read(0, self.size)
    }
}
