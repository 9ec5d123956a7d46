use std::borrow::Cow;
use std::fmt;

use scroll::ctx::TryFromCtx;
use scroll::{Pread, LE};

use super::leaf::*;
use super::{TypeError, TypeErrorKind, TypeIndex};

/// A string stored in a type record.
///
/// Names are not guaranteed to be valid UTF-8, so the raw bytes are kept until a caller asks for a
/// string.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawString<'b>(&'b [u8]);

impl<'b> RawString<'b> {
    /// The raw bytes of the string, without terminator or length prefix.
    pub fn as_bytes(&self) -> &'b [u8] {
        self.0
    }

    /// Returns `true` if the string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the string to UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> Cow<'b, str> {
        String::from_utf8_lossy(self.0)
    }
}

impl fmt::Debug for RawString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for RawString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_lossy())
    }
}

impl<'b> From<&'b str> for RawString<'b> {
    fn from(s: &'b str) -> Self {
        RawString(s.as_bytes())
    }
}

/// A variable-length numeric literal.
///
/// Values below `0x8000` are stored inline in the tag. Larger values follow the tag in one of the
/// fixed-width encodings below.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Numeric {
    /// An unsigned 8-bit value.
    U8(u8),
    /// A signed 16-bit value.
    I16(i16),
    /// An unsigned 16-bit value, including inline values.
    U16(u16),
    /// A signed 32-bit value.
    I32(i32),
    /// An unsigned 32-bit value.
    U32(u32),
    /// A signed 64-bit value.
    I64(i64),
    /// An unsigned 64-bit value.
    U64(u64),
    /// A single precision float.
    F32(f32),
    /// A double precision float.
    F64(f64),
    /// An 80-bit extended precision float, kept as raw bytes.
    F80([u8; 10]),
    /// A 128-bit float, kept as raw bytes.
    F128([u8; 16]),
}

impl Numeric {
    /// Returns the value as `u64` if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Numeric::U8(v) => Some(v.into()),
            Numeric::I16(v) => u64::try_from(v).ok(),
            Numeric::U16(v) => Some(v.into()),
            Numeric::I32(v) => u64::try_from(v).ok(),
            Numeric::U32(v) => Some(v.into()),
            Numeric::I64(v) => u64::try_from(v).ok(),
            Numeric::U64(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Numeric::U8(v) => Some(v.into()),
            Numeric::I16(v) => Some(v.into()),
            Numeric::U16(v) => Some(v.into()),
            Numeric::I32(v) => Some(v.into()),
            Numeric::U32(v) => Some(v.into()),
            Numeric::I64(v) => Some(v),
            Numeric::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Numeric::U8(v) => write!(f, "{v}"),
            Numeric::I16(v) => write!(f, "{v}"),
            Numeric::U16(v) => write!(f, "{v}"),
            Numeric::I32(v) => write!(f, "{v}"),
            Numeric::U32(v) => write!(f, "{v}"),
            Numeric::I64(v) => write!(f, "{v}"),
            Numeric::U64(v) => write!(f, "{v}"),
            Numeric::F32(v) => write!(f, "{v}"),
            Numeric::F64(v) => write!(f, "{v}"),
            Numeric::F80(_) => f.write_str("<f80>"),
            Numeric::F128(_) => f.write_str("<f128>"),
        }
    }
}

/// A cursor over the bytes of one type record.
///
/// The buffer is bounded by the record's declared length, so any read past its end is reported as
/// [`TypeErrorKind::RecordOverrun`].
#[derive(Clone, Debug)]
pub struct ParseBuffer<'b> {
    data: &'b [u8],
    pos: usize,
}

impl<'b> ParseBuffer<'b> {
    /// Creates a buffer positioned at the start of `data`.
    pub fn new(data: &'b [u8]) -> Self {
        ParseBuffer { data, pos: 0 }
    }

    /// The current position relative to the start of the buffer.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The total length of the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// The number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn overrun(&self, needed: usize) -> TypeError {
        TypeErrorKind::RecordOverrun {
            end: self.data.len(),
            offset: self.pos + needed,
        }
        .into()
    }

    /// Reads a little-endian scalar.
    pub fn parse<T>(&mut self) -> Result<T, TypeError>
    where
        T: TryFromCtx<'b, scroll::Endian, Error = scroll::Error>,
    {
        let start = self.pos;
        self.data
            .gread_with(&mut self.pos, LE)
            .map_err(|_| self.overrun_from(start, std::mem::size_of::<T>()))
    }

    fn overrun_from(&self, start: usize, needed: usize) -> TypeError {
        TypeErrorKind::RecordOverrun {
            end: self.data.len(),
            offset: start + needed,
        }
        .into()
    }

    /// Reads a single byte.
    pub fn parse_u8(&mut self) -> Result<u8, TypeError> {
        self.parse()
    }

    /// Reads a little-endian `u16`.
    pub fn parse_u16(&mut self) -> Result<u16, TypeError> {
        self.parse()
    }

    /// Reads a little-endian `u32`.
    pub fn parse_u32(&mut self) -> Result<u32, TypeError> {
        self.parse()
    }

    /// Reads a type index.
    pub fn parse_type_index(&mut self) -> Result<TypeIndex, TypeError> {
        self.parse_u32().map(TypeIndex)
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Returns the next `u16` without consuming it.
    pub fn peek_u16(&self) -> Option<u16> {
        self.data.pread_with(self.pos, LE).ok()
    }

    /// Consumes `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'b [u8], TypeError> {
        let bytes = self
            .data
            .get(self.pos..)
            .and_then(|rest| rest.get(..len))
            .ok_or_else(|| self.overrun(len))?;
        self.pos += len;
        Ok(bytes)
    }

    /// Reads a variable-length numeric literal.
    pub fn parse_numeric(&mut self) -> Result<Numeric, TypeError> {
        let tag = self.parse_u16()?;
        if tag < LF_NUMERIC {
            return Ok(Numeric::U16(tag));
        }

        Ok(match tag {
            LF_CHAR => Numeric::U8(self.parse()?),
            LF_SHORT => Numeric::I16(self.parse()?),
            LF_USHORT => Numeric::U16(self.parse()?),
            LF_LONG => Numeric::I32(self.parse()?),
            LF_ULONG => Numeric::U32(self.parse()?),
            LF_REAL32 => Numeric::F32(f32::from_bits(self.parse()?)),
            LF_REAL64 => Numeric::F64(f64::from_bits(self.parse()?)),
            LF_REAL80 => Numeric::F80(self.parse_array()?),
            LF_REAL128 => Numeric::F128(self.parse_array()?),
            LF_QUADWORD => Numeric::I64(self.parse()?),
            LF_UQUADWORD => Numeric::U64(self.parse()?),
            other => return Err(TypeErrorKind::UnsupportedNumeric(other).into()),
        })
    }

    fn parse_array<const N: usize>(&mut self) -> Result<[u8; N], TypeError> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    /// Reads a NUL-terminated string. The terminator is consumed but not returned.
    pub fn parse_cstring(&mut self) -> Result<RawString<'b>, TypeError> {
        let rest = self.data.get(self.pos..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.overrun(rest.len() + 1))?;
        let s = RawString(&rest[..len]);
        self.pos += len + 1;
        Ok(s)
    }

    /// Reads a string prefixed with a single length byte.
    pub fn parse_pascal_string(&mut self) -> Result<RawString<'b>, TypeError> {
        let len = self.parse_u8()?;
        self.take(len.into()).map(RawString)
    }

    /// Reads a name in the encoding used by records with the given leaf.
    pub fn parse_name(&mut self, leaf: u16) -> Result<RawString<'b>, TypeError> {
        if uses_pascal_strings(leaf) {
            self.parse_pascal_string()
        } else {
            self.parse_cstring()
        }
    }

    /// Skips one padding marker at the current position, if present.
    ///
    /// A marker `0xF0 + n` stands for `n` bytes of padding including itself. Returns the number of
    /// bytes skipped.
    pub fn skip_padding(&mut self) -> Result<usize, TypeError> {
        match self.peek_u8() {
            Some(byte) if byte > LF_PAD0 => {
                let len = usize::from(byte & 0x0f);
                let padding = self.take(len)?;
                // Markers count down to the next aligned position: F3 F2 F1.
                for (&pad, expected) in padding.iter().zip((1..=len as u8).rev()) {
                    if pad != LF_PAD0 + expected {
                        return Err(TypeErrorKind::InvalidPadding(pad).into());
                    }
                }
                Ok(len)
            }
            _ => Ok(0),
        }
    }

    /// Consumes trailing padding and checks that the buffer ends exactly here.
    pub fn finish(&mut self) -> Result<(), TypeError> {
        if !self.is_empty() {
            self.skip_padding()?;
        }

        if self.pos != self.data.len() {
            return Err(TypeErrorKind::RecordUnderrun {
                end: self.data.len(),
                offset: self.pos,
            }
            .into());
        }

        Ok(())
    }
}
