//! A read-only view of binary data, either owned or memory mapped.
//!
//! See the [`ByteView`] struct for more documentation.

use std::borrow::Cow;
use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

/// The storage behind a [`ByteView`].
#[derive(Debug)]
enum Backing<'a> {
    Buf(Cow<'a, [u8]>),
    Mmap(Mmap),
}

impl Deref for Backing<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        match *self {
            Backing::Buf(ref buf) => buf,
            Backing::Mmap(ref mmap) => mmap,
        }
    }
}

/// A cheaply clonable, read-only handle to a byte buffer.
///
/// Debug files are usually large and only sparsely accessed, so the most common way to obtain a
/// `ByteView` is [`ByteView::open`], which maps the file into memory. Parsers borrow from the view
/// and never mutate it. Tests and in-memory producers can use [`ByteView::from_vec`] and
/// [`ByteView::from_slice`] instead.
///
/// # Example
///
/// ```
/// use std::io::Write;
/// use symbolic_common::ByteView;
///
/// fn main() -> Result<(), std::io::Error> {
///     let mut file = tempfile::tempfile()?;
///     file.write_all(b"Microsoft C/C++ MSF 7.00\r\n")?;
///
///     let view = ByteView::map_file(file)?;
///     assert!(view.starts_with(b"Microsoft"));
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct ByteView<'a> {
    backing: Arc<Backing<'a>>,
}

impl<'a> ByteView<'a> {
    fn with_backing(backing: Backing<'a>) -> Self {
        ByteView {
            backing: Arc::new(backing),
        }
    }

    /// Constructs a `ByteView` that borrows the given slice.
    ///
    /// ```
    /// use symbolic_common::ByteView;
    ///
    /// let view = ByteView::from_slice(b"1234");
    /// assert_eq!(view.len(), 4);
    /// ```
    pub fn from_slice(buffer: &'a [u8]) -> Self {
        ByteView::with_backing(Backing::Buf(Cow::Borrowed(buffer)))
    }

    /// Constructs a `ByteView` that owns the given vector.
    ///
    /// ```
    /// use symbolic_common::ByteView;
    ///
    /// let view = ByteView::from_vec(b"1234".to_vec());
    /// assert_eq!(view.as_slice(), b"1234");
    /// ```
    pub fn from_vec(buffer: Vec<u8>) -> Self {
        ByteView::with_backing(Backing::Buf(Cow::Owned(buffer)))
    }

    /// Memory maps an open file handle.
    ///
    /// The mapping stays valid after the handle is dropped. Empty files cannot be mapped on all
    /// platforms and are represented by an empty buffer instead.
    pub fn map_file(file: File) -> Result<Self, io::Error> {
        Self::map_file_ref(&file)
    }

    /// Memory maps a file handle without consuming it.
    pub fn map_file_ref(file: &File) -> Result<Self, io::Error> {
        let backing = match unsafe { Mmap::map(file) } {
            Ok(mmap) => Backing::Mmap(mmap),
            Err(err) => {
                // Raised for empty files. On Windows, error 1006 reads "The volume for a file has
                // been externally altered so that the opened file is no longer valid."
                if err.kind() == io::ErrorKind::InvalidInput
                    || (cfg!(windows) && err.raw_os_error() == Some(1006))
                {
                    Backing::Buf(Cow::Borrowed(b""))
                } else {
                    return Err(err);
                }
            }
        };

        Ok(ByteView::with_backing(backing))
    }

    /// Opens the file at the given path and memory maps it read-only.
    ///
    /// ```no_run
    /// use symbolic_common::ByteView;
    ///
    /// fn main() -> Result<(), std::io::Error> {
    ///     let view = ByteView::open("minimal.pdb")?;
    ///     Ok(())
    /// }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let file = File::open(path)?;
        Self::map_file(file)
    }

    /// Returns the underlying bytes.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        self.backing.deref()
    }
}

impl AsRef<[u8]> for ByteView<'_> {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Deref for ByteView<'_> {
    type Target = [u8];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use similar_asserts::assert_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_empty_file() -> Result<(), std::io::Error> {
        let tmp = NamedTempFile::new()?;

        let view = ByteView::open(tmp.path())?;
        assert_eq!(&*view, b"");

        Ok(())
    }

    #[test]
    fn test_open_file() -> Result<(), std::io::Error> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"MSF\x00\x02")?;

        let view = ByteView::open(tmp.path())?;
        assert_eq!(&*view, b"MSF\x00\x02");

        Ok(())
    }

    #[test]
    fn test_clone_shares_backing() {
        let view = ByteView::from_vec(vec![1, 2, 3]);
        let other = view.clone();
        assert_eq!(view.as_ptr(), other.as_ptr());
    }

    #[test]
    fn test_mapping_outlives_file() -> Result<(), std::io::Error> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"1234")?;

        let view = ByteView::map_file_ref(tmp.as_file())?;
        drop(tmp);

        assert_eq!(&*view, b"1234");
        Ok(())
    }
}
