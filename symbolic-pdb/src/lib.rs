//! Provides support for reading Microsoft Program Database (PDB) files,
//! specifically the CodeView type information they carry.
//!
//! # Functionality
//!
//! * Open the paged container with [`Pdb::parse`] and read any of its streams with
//!   [`Pdb::stream`].
//! * Identify the PDB with [`Pdb::pdb_information`] and [`PdbInformation::debug_id`].
//! * Read type records by index or name through [`Pdb::type_information`].
//! * Build a graph of resolved types with [`ResolveCache`], which follows forward declarations
//!   to their definitions.
//!
//! ## Example
//!
//! ```no_run
//! use symbolic_common::ByteView;
//! use symbolic_pdb::{Pdb, ResolveCache};
//!
//! let view = ByteView::open("app.pdb").unwrap();
//! let pdb = Pdb::parse(&view).unwrap();
//! let types = pdb.type_information().unwrap();
//!
//! let cache = ResolveCache::new(&types);
//! let node = cache.resolve_name("Yolo").unwrap();
//! for member in cache.flatten_members(&node).unwrap() {
//!     println!("{} @ {}: {}", member.name, member.offset, cache.type_name(member.ty.index()).unwrap());
//! }
//! ```
//!
//! # Structure of a PDB file
//!
//! A PDB is a Multi-Stream File (MSF): a sequence of fixed-size pages holding a number of logical
//! streams. See the [`msf`] module for the container layout. The streams used here are:
//!
//! * Stream 1, the [PDB information stream](pdbi), which identifies the PDB.
//! * Stream 2, the [TPI stream](tpi), a sequence of type records addressed by consecutive type
//!   indices, and its auxiliary hash stream, whose number is stored in the TPI header.

#![warn(missing_docs)]

pub mod msf;
pub mod pdbi;
pub mod resolve;
pub mod tpi;

pub use msf::{Msf, MsfError, MsfErrorKind, Stream, StreamDirectory};
pub use pdbi::PdbInformation;
pub use resolve::{NodeId, NodeKind, ResolveCache, TypeNode, TypeRef};
pub use tpi::{Type, TypeData, TypeError, TypeErrorKind, TypeIndex, TypeInformation};

/// A Program Database file.
#[derive(Debug)]
pub struct Pdb<'data> {
    msf: Msf<'data>,
}

impl<'data> Pdb<'data> {
    /// Returns `true` if the buffer starts with the MSF 7.00 magic.
    pub fn test(data: &[u8]) -> bool {
        Msf::test(data)
    }

    /// Parses the MSF container and its stream directory.
    pub fn parse(data: &'data [u8]) -> Result<Self, MsfError> {
        let msf = Msf::parse(data)?;
        Ok(Pdb { msf })
    }

    /// The underlying container.
    pub fn msf(&self) -> &Msf<'data> {
        &self.msf
    }

    /// The stream directory.
    pub fn stream_directory(&self) -> &StreamDirectory {
        self.msf.directory()
    }

    /// Opens the stream with the given index.
    pub fn stream(&self, index: u32) -> Result<Stream<'data>, MsfError> {
        self.msf.stream(index)
    }

    /// Parses the PDB information stream.
    pub fn pdb_information(&self) -> Result<PdbInformation<'data>, MsfError> {
        let stream = self.msf.stream(pdbi::PDB_INFORMATION_STREAM)?;
        PdbInformation::parse(&stream)
    }

    /// Parses the TPI stream together with its hash stream.
    ///
    /// A hash stream that is not present in the directory is ignored. Lookups then fall back to
    /// scanning the records.
    pub fn type_information(&self) -> Result<TypeInformation<'data>, TypeError> {
        let stream = self.msf.stream(tpi::TPI_STREAM)?;
        let types = TypeInformation::parse(stream.clone(), None)?;

        let hash_stream = match types.hash_stream() {
            Some(index) if self.msf.directory().has_stream(index) => self.msf.stream(index)?,
            Some(index) => {
                tracing::debug!(index, "type hash stream is missing");
                return Ok(types);
            }
            None => return Ok(types),
        };

        TypeInformation::parse(stream, Some(hash_stream))
    }
}
