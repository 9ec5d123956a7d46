//! Common functionality for `symbolic`.
//!
//! This crate exposes the plumbing shared by the format crates:
//!
//!  - [`ByteView`]: Gives read-only access to binary data in-memory or memory mapped from the
//!    file system. PDB files are opened through it and then parsed without copying.
//!  - Re-exports of [`DebugId`] and [`Uuid`], which identify a PDB and the image it belongs to.
//!
//! This module is part of the `symbolic` crate.

#![warn(missing_docs)]

mod byteview;

pub use crate::byteview::*;

pub use debugid::*;
pub use uuid::Uuid;
