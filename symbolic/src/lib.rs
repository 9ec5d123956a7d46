//! Symbolic is a library to read debug information from native applications. This package bundles
//! the format crates behind features so they can be used through a single dependency.
//!
//! # What's in the package
//!
//! - Reading of Microsoft Program Database (PDB) files
//!   - The paged Multi-Stream File container and its stream directory
//!   - PDB identification (GUID and age)
//!   - CodeView type records, looked up by index or by name through the TPI hash stream
//!   - A memoizing type graph that follows forward declarations to their definitions
//! - Memory mapped access to input files
//!
//! # Usage
//!
//! Add `symbolic` as a dependency to your `Cargo.toml`. The following features are available:
//!
//! - **`pdb`** (default): Support for PDB files and their type information.

#![warn(missing_docs)]

#[doc(inline)]
pub use symbolic_common as common;
#[doc(inline)]
#[cfg(feature = "pdb")]
pub use symbolic_pdb as pdb;
