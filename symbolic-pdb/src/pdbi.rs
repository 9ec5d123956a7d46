//! The PDB information stream.
//!
//! Stream 1 identifies the PDB: it carries the GUID and age that the matching executable records
//! in its debug directory. Together they form the [`DebugId`] used to match PDBs to binaries.

use std::borrow::Cow;

use scroll::{Pread, LE};
use symbolic_common::{DebugId, Uuid};

use crate::msf::{MsfError, MsfErrorKind, Stream};

/// The stream index of the PDB information stream.
pub const PDB_INFORMATION_STREAM: u32 = 1;

#[derive(Debug, Clone, Copy, Pread)]
struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

#[derive(Debug, Clone, Copy, Pread)]
struct InfoHeader {
    version: u32,
    signature: u32,
    age: u32,
    guid: Guid,
    names_size: u32,
}

/// Identifying information of a PDB file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdbInformation<'data> {
    /// The format version, e.g. `20000404` for VC70.
    pub version: u32,
    /// A timestamp written when the PDB was created.
    pub signature: u32,
    /// The number of times this PDB has been written.
    pub age: u32,
    /// The unique identifier of this PDB.
    pub guid: Uuid,
    /// The raw serialized named stream map.
    pub names: Cow<'data, [u8]>,
}

impl<'data> PdbInformation<'data> {
    /// Parses the information stream.
    ///
    /// The named stream map is borrowed unless it straddles a page boundary.
    pub fn parse(stream: &Stream<'data>) -> Result<Self, MsfError> {
        let header_size = 28 + 4;
        let header_bytes = stream.read(0, header_size.min(stream.len()))?;
        let header: InfoHeader = header_bytes
            .pread_with(0, LE)
            .map_err(|e| MsfError::new(MsfErrorKind::UnexpectedEof, e))?;

        let available = stream.len() - header_size;
        let names_len = (header.names_size as usize).min(available);
        let names = stream.read(header_size, names_len)?;

        let Guid {
            data1,
            data2,
            data3,
            data4,
        } = header.guid;

        Ok(PdbInformation {
            version: header.version,
            signature: header.signature,
            age: header.age,
            guid: Uuid::from_fields(data1, data2, data3, &data4),
            names,
        })
    }

    /// The identifier combining [`guid`](Self::guid) and [`age`](Self::age).
    pub fn debug_id(&self) -> DebugId {
        DebugId::from_parts(self.guid, self.age)
    }
}
