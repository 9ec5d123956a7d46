use std::ops::Range;

use scroll::{Pread, LE};

use super::{MsfError, MsfErrorKind};

/// The size recorded for streams that have been deleted or never written.
const ABSENT_STREAM: u32 = u32::MAX;

#[derive(Clone, Debug)]
struct StreamEntry {
    size: Option<u32>,
    pages: Range<usize>,
}

/// The list of all streams in an MSF container.
///
/// Stream indices are dense, starting at 0. A stream may be *absent*, in which case it has no size
/// and no pages, but its index still counts towards [`stream_count`](Self::stream_count).
#[derive(Clone, Debug, Default)]
pub struct StreamDirectory {
    streams: Vec<StreamEntry>,
    pages: Vec<u32>,
}

impl StreamDirectory {
    /// Parses the directory from its raw bytes.
    ///
    /// The layout is a stream count, one size per stream, and then the concatenated page lists of
    /// all present streams. Every page number is checked against `page_count`.
    pub(crate) fn parse(data: &[u8], page_size: usize, page_count: u32) -> Result<Self, MsfError> {
        let invalid = |e| MsfError::new(MsfErrorKind::InvalidDirectory, e);

        let mut offset = 0;
        let count: u32 = data.gread_with(&mut offset, LE).map_err(invalid)?;

        // Every stream needs at least four bytes for its size.
        if (count as usize).saturating_mul(4) > data.len() - offset {
            return Err(MsfErrorKind::InvalidDirectory.into());
        }

        let mut sizes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let size: u32 = data.gread_with(&mut offset, LE).map_err(invalid)?;
            sizes.push((size != ABSENT_STREAM).then_some(size));
        }

        let mut streams = Vec::with_capacity(sizes.len());
        let mut pages = Vec::new();

        for size in sizes {
            let start = pages.len();
            let needed = size.map_or(0, |size| (size as usize + page_size - 1) / page_size);

            for _ in 0..needed {
                let page: u32 = data.gread_with(&mut offset, LE).map_err(invalid)?;
                if page >= page_count {
                    return Err(MsfErrorKind::PageOutOfRange(page).into());
                }
                pages.push(page);
            }

            streams.push(StreamEntry {
                size,
                pages: start..pages.len(),
            });
        }

        Ok(StreamDirectory { streams, pages })
    }

    /// The number of stream slots, including absent streams.
    pub fn stream_count(&self) -> u32 {
        self.streams.len() as u32
    }

    /// The byte length of a stream, or `None` if the stream is absent or out of range.
    pub fn stream_size(&self, index: u32) -> Option<u32> {
        self.streams.get(index as usize)?.size
    }

    /// Returns whether the stream exists and is not marked as absent.
    pub fn has_stream(&self, index: u32) -> bool {
        self.stream_size(index).is_some()
    }

    /// The ordered page list of a stream, or `None` if the stream is absent or out of range.
    pub fn stream_pages(&self, index: u32) -> Option<&[u32]> {
        let entry = self.streams.get(index as usize)?;
        entry.size?;
        self.pages.get(entry.pages.clone())
    }
}
