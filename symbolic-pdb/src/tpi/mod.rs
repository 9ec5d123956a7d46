//! Type information from the TPI stream.
//!
//! The TPI stream is a header followed by a flat sequence of CodeView type records. Records do not
//! store their own type index; the index is implied by the position of the record, starting at
//! the header's minimum index. Finding a record by index therefore requires walking record
//! headers, which the optional hash stream speeds up with sparse offset samples.

mod buffer;
mod data;
mod flags;
mod hash;
mod header;
pub mod leaf;
mod primitive;

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use scroll::{Pread, LE};
use thiserror::Error;

use crate::msf::{MsfError, Stream};

pub use buffer::{Numeric, ParseBuffer, RawString};
pub use data::*;
pub use flags::*;
pub use hash::{hash_name, IndexOffset, TypeHashIndex};
pub use primitive::{Indirection, PrimitiveKind, PrimitiveType};

use header::TypeStreamHeader;

/// The stream index of the TPI stream.
pub const TPI_STREAM: u32 = 2;

/// The index of a type.
///
/// Indices below the stream's minimum index denote [primitive types](PrimitiveType). All other
/// indices refer to records in the TPI stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(pub u32);

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u32> for TypeIndex {
    fn from(index: u32) -> Self {
        TypeIndex(index)
    }
}

/// The kind of a [`TypeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TypeErrorKind {
    /// The TPI header is truncated or inconsistent.
    #[error("invalid type stream header")]
    InvalidHeader,
    /// The hash stream does not match the TPI header.
    #[error("invalid type hash stream")]
    InvalidHashStream,
    /// Hash keys are not 4 bytes wide.
    #[error("unsupported hash key size {0}")]
    UnsupportedHashKeySize(u32),
    /// The hash stream contains a hash adjustment table.
    #[error("unsupported hash adjustments")]
    UnsupportedHashAdjustments,
    /// A numeric literal uses an unknown tag.
    #[error("unsupported numeric leaf {0:#x}")]
    UnsupportedNumeric(u16),
    /// A pointer to member uses an addressing model without a known trailer size.
    #[error("unsupported member pointer (kind {kind:#x}, mode {mode})")]
    UnsupportedPointer {
        /// The raw pointer kind.
        kind: u8,
        /// The raw pointer mode.
        mode: u8,
    },
    /// The record kind is not supported.
    #[error("unsupported type leaf {0:#x}")]
    UnsupportedLeaf(u16),
    /// The index does not denote a known primitive type.
    #[error("unsupported primitive type {0:#x}")]
    UnsupportedPrimitive(u32),
    /// A record was read past its declared end.
    #[error("record overrun: read up to {offset}, record ends at {end}")]
    RecordOverrun {
        /// The declared end of the record.
        end: usize,
        /// The position reached while decoding.
        offset: usize,
    },
    /// A record was not fully consumed.
    #[error("record underrun: stopped at {offset}, record ends at {end}")]
    RecordUnderrun {
        /// The declared end of the record.
        end: usize,
        /// The position reached while decoding.
        offset: usize,
    },
    /// A padding marker is malformed.
    #[error("invalid padding byte {0:#x}")]
    InvalidPadding(u8),
    /// The stream ended in the middle of a record.
    #[error("unexpected end of type stream")]
    UnexpectedEof,
    /// A numeric literal does not fit the field it encodes.
    #[error("invalid numeric literal")]
    InvalidNumeric,
    /// The index is beyond the last record.
    #[error("type index {0} out of range")]
    TypeIndexOutOfRange(TypeIndex),
    /// The index denotes a primitive type, which has no record.
    #[error("type index {0} is a primitive type")]
    PrimitiveIndex(TypeIndex),
    /// The operation requires the hash stream.
    #[error("type stream has no hash index")]
    MissingHashIndex,
    /// No record matches the query.
    #[error("type not found")]
    NotFound,
    /// Reading the underlying stream failed.
    #[error("failed to read type stream")]
    Stream,
}

/// An error encountered while reading type information.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct TypeError {
    kind: TypeErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl TypeError {
    /// Creates a new error from a known kind of error as well as an arbitrary error payload.
    pub(crate) fn new<E>(kind: TypeErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let source = Some(source.into());
        Self { kind, source }
    }

    /// Returns the corresponding [`TypeErrorKind`] for this error.
    pub fn kind(&self) -> TypeErrorKind {
        self.kind
    }
}

impl From<TypeErrorKind> for TypeError {
    fn from(kind: TypeErrorKind) -> Self {
        Self { kind, source: None }
    }
}

impl From<MsfError> for TypeError {
    fn from(e: MsfError) -> Self {
        Self::new(TypeErrorKind::Stream, e)
    }
}

/// A raw type record.
///
/// Holds the record's leaf and payload. Use [`parse`](Self::parse) to decode it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Type<'data> {
    index: TypeIndex,
    offset: usize,
    leaf: u16,
    data: Cow<'data, [u8]>,
}

impl<'data> Type<'data> {
    /// The index of this record.
    pub fn index(&self) -> TypeIndex {
        self.index
    }

    /// The offset of the record header within the TPI stream.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The leaf code identifying the record kind.
    pub fn leaf(&self) -> u16 {
        self.leaf
    }

    /// The payload following the leaf, including trailing padding.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decodes the record.
    pub fn parse(&self) -> Result<TypeData<'_>, TypeError> {
        decode_record(self.leaf, &self.data)
    }
}

/// The type information stream of a PDB.
#[derive(Clone, Debug)]
pub struct TypeInformation<'data> {
    stream: Stream<'data>,
    header: TypeStreamHeader,
    hash: Option<TypeHashIndex>,
}

impl<'data> TypeInformation<'data> {
    /// Parses the TPI header and, if given, the hash stream it references.
    ///
    /// Without a hash stream, or with a hash stream lacking offset samples, every
    /// [`get`](Self::get) scans from the first record.
    #[tracing::instrument(level = "trace", name = "TypeInformation::parse", skip_all)]
    pub fn parse(stream: Stream<'data>, hash_stream: Option<Stream<'data>>) -> Result<Self, TypeError> {
        let header_bytes = stream.read(0, TypeStreamHeader::SIZE.min(stream.len()))?;
        let header: TypeStreamHeader = header_bytes
            .pread_with(0, LE)
            .map_err(|e| TypeError::new(TypeErrorKind::InvalidHeader, e))?;

        let header_size = header.header_size as usize;
        if header_size < TypeStreamHeader::SIZE
            || header_size > stream.len()
            || header.maximum_index < header.minimum_index
        {
            return Err(TypeErrorKind::InvalidHeader.into());
        }

        if !header::KNOWN_VERSIONS.contains(&header.version) {
            tracing::warn!(version = header.version, "unknown type stream version");
        }
        if header.hash_key_size != 4 {
            return Err(TypeErrorKind::UnsupportedHashKeySize(header.hash_key_size).into());
        }
        if header.hash_adjustments.size != 0 {
            return Err(TypeErrorKind::UnsupportedHashAdjustments.into());
        }

        tracing::trace!(
            minimum_index = header.minimum_index,
            maximum_index = header.maximum_index,
            records_size = header.records_size,
            "parsed type stream header"
        );

        let hash = match hash_stream {
            Some(hash_stream) => Some(TypeHashIndex::parse(&hash_stream, &header)?),
            None => None,
        };

        if hash.as_ref().map_or(true, |hash| hash.samples().is_empty()) {
            tracing::debug!(
                types = header.maximum_index - header.minimum_index,
                "no index offsets, type lookups scan from the first record"
            );
        }

        Ok(TypeInformation {
            stream,
            header,
            hash,
        })
    }

    /// The index of the first record.
    pub fn minimum_index(&self) -> TypeIndex {
        TypeIndex(self.header.minimum_index)
    }

    /// The index one past the last record.
    pub fn maximum_index(&self) -> TypeIndex {
        TypeIndex(self.header.maximum_index)
    }

    /// The number of records.
    pub fn len(&self) -> usize {
        (self.header.maximum_index - self.header.minimum_index) as usize
    }

    /// Returns `true` if the stream holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The TPI format version.
    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// The hash stream number recorded in the header, if any.
    pub fn hash_stream(&self) -> Option<u32> {
        self.header.hash_stream()
    }

    /// The decoded hash stream, if one was supplied.
    pub fn hash_index(&self) -> Option<&TypeHashIndex> {
        self.hash.as_ref()
    }

    /// Returns `true` if the index refers to a record in this stream.
    pub fn contains(&self, index: TypeIndex) -> bool {
        (self.header.minimum_index..self.header.maximum_index).contains(&index.0)
    }

    fn check_index(&self, index: TypeIndex) -> Result<(), TypeError> {
        if index.0 < self.header.minimum_index {
            Err(TypeErrorKind::PrimitiveIndex(index).into())
        } else if index.0 >= self.header.maximum_index {
            Err(TypeErrorKind::TypeIndexOutOfRange(index).into())
        } else {
            Ok(())
        }
    }

    fn first_record(&self) -> usize {
        self.header.header_size as usize
    }

    /// Reads the `(length, leaf)` header of the record at `offset`.
    fn record_length(&self, offset: usize) -> Result<usize, TypeError> {
        let length = self.stream.read_u16(offset)? as usize;
        if length < 2 {
            return Err(TypeErrorKind::RecordOverrun {
                end: offset + 2 + length,
                offset: offset + 4,
            }
            .into());
        }
        Ok(length)
    }

    fn read_record(&self, offset: usize, index: TypeIndex) -> Result<(Type<'data>, usize), TypeError> {
        let length = self.record_length(offset)?;
        let leaf = self.stream.read_u16(offset + 2)?;
        let data = self.stream.read(offset + 4, length - 2)?;

        let record = Type {
            index,
            offset,
            leaf,
            data,
        };
        Ok((record, offset + 2 + length))
    }

    /// Returns the byte offset of the record with the given index.
    ///
    /// Starts at the nearest offset sample before `index` and walks forward over record headers.
    fn seek(&self, index: TypeIndex) -> Result<usize, TypeError> {
        self.check_index(index)?;

        let sample = self.hash.as_ref().and_then(|hash| hash.nearest_sample(index));
        let (mut current, mut offset) = match sample {
            Some(sample) => (sample.index.0, self.first_record() + sample.offset as usize),
            None => (self.header.minimum_index, self.first_record()),
        };

        while current < index.0 {
            offset += 2 + self.record_length(offset)?;
            current += 1;
        }

        Ok(offset)
    }

    /// Iterates all records in index order.
    pub fn iter(&self) -> TypeIter<'_, 'data> {
        TypeIter {
            info: self,
            offset: self.first_record(),
            next: self.header.minimum_index,
        }
    }

    /// Iterates records in index order, starting at the given index.
    pub fn iter_from(&self, index: TypeIndex) -> Result<TypeIter<'_, 'data>, TypeError> {
        let offset = self.seek(index)?;
        Ok(TypeIter {
            info: self,
            offset,
            next: index.0,
        })
    }

    /// Returns the record with the given index.
    pub fn get(&self, index: TypeIndex) -> Result<Type<'data>, TypeError> {
        let offset = self.seek(index)?;
        self.read_record(offset, index).map(|(record, _)| record)
    }

    /// The indices of records whose name may equal `name`.
    ///
    /// This returns the hash bucket verbatim, including collisions. Use
    /// [`find_by_name`](Self::find_by_name) to filter by the decoded name.
    pub fn lookup_candidates(
        &self,
        name: &str,
    ) -> Result<impl Iterator<Item = TypeIndex> + '_, TypeError> {
        let hash = self.hash.as_ref().ok_or(TypeErrorKind::MissingHashIndex)?;
        Ok(hash.candidates(name.as_bytes()))
    }

    /// Visits records that may be named `name` until `f` returns `Some`.
    ///
    /// Only records whose leaf passes `accept` are decoded. Records that fail to decode are
    /// skipped, as a hash bucket may hold arbitrary colliding records.
    fn search<T, A, F>(&self, name: &[u8], accept: A, mut f: F) -> Result<Option<T>, TypeError>
    where
        A: Fn(u16) -> bool,
        F: FnMut(&Type<'data>, &TypeData<'_>) -> Option<T>,
    {
        let mut visit = |record: Type<'data>| -> Result<Option<T>, TypeError> {
            if !accept(record.leaf()) {
                return Ok(None);
            }
            let data = match record.parse() {
                Ok(data) => data,
                Err(e) => {
                    tracing::debug!(
                        index = record.index().0,
                        error = %e,
                        "skipping undecodable type record"
                    );
                    return Ok(None);
                }
            };
            if data.name().map(|n| n.as_bytes()) != Some(name) {
                return Ok(None);
            }
            Ok(f(&record, &data))
        };

        match self.hash {
            Some(ref hash) if hash.bucket_count() > 0 => {
                for index in hash.candidates(name) {
                    if let Some(found) = visit(self.get(index)?)? {
                        return Ok(Some(found));
                    }
                }
            }
            _ => {
                tracing::debug!("searching type names without hash index");
                for record in self.iter() {
                    if let Some(found) = visit(record?)? {
                        return Ok(Some(found));
                    }
                }
            }
        }

        Ok(None)
    }

    /// Returns all records named `name`, in index order.
    ///
    /// Records that fail to decode are skipped.
    pub fn find_by_name(&self, name: &str) -> Result<Vec<Type<'data>>, TypeError> {
        let mut found = Vec::new();
        self.search(name.as_bytes(), is_supported_leaf, |record, _| {
            found.push(record.clone());
            None::<()>
        })?;
        Ok(found)
    }

    /// Returns the defining record of the class, structure, interface or union named `name`.
    ///
    /// Forward references are skipped. Fails with [`TypeErrorKind::NotFound`] if there is no
    /// definition.
    pub fn find_class(&self, name: &str) -> Result<Type<'data>, TypeError> {
        self.find_definition(name.as_bytes(), None)
    }

    /// Like [`find_class`](Self::find_class), additionally matching the decorated name when both
    /// the query and the candidate have one.
    pub fn find_definition(
        &self,
        name: &[u8],
        unique_name: Option<&[u8]>,
    ) -> Result<Type<'data>, TypeError> {
        let found = self.search(name, leaf::is_class_like, |record, data| {
            let TypeData::Class(class) = data else {
                return None;
            };
            if class.properties.is_forward_reference() {
                return None;
            }
            if let (Some(expected), Some(actual)) = (unique_name, class.unique_name) {
                if expected != actual.as_bytes() {
                    return None;
                }
            }
            Some(record.clone())
        })?;

        found.ok_or_else(|| TypeErrorKind::NotFound.into())
    }
}

/// An iterator over the records of a [`TypeInformation`].
///
/// Stops after the first error.
#[derive(Clone, Debug)]
pub struct TypeIter<'a, 'data> {
    info: &'a TypeInformation<'data>,
    offset: usize,
    next: u32,
}

impl<'a, 'data> Iterator for TypeIter<'a, 'data> {
    type Item = Result<Type<'data>, TypeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.info.header.maximum_index {
            return None;
        }

        let index = TypeIndex(self.next);
        match self.info.read_record(self.offset, index) {
            Ok((record, next_offset)) => {
                self.offset = next_offset;
                self.next += 1;
                Some(Ok(record))
            }
            Err(e) => {
                self.next = self.info.header.maximum_index;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.info.header.maximum_index.saturating_sub(self.next) as usize;
        (0, Some(remaining))
    }
}
