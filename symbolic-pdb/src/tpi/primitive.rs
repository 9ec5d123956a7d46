use std::fmt;

use super::{TypeError, TypeErrorKind, TypeIndex};

/// A built-in type encoded directly in a type index below the first record index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Uncharacterized type.
    NoType,
    /// `void`
    Void,
    /// Type not translated by cvpack.
    NotTranslated,
    /// OLE/COM `HRESULT`
    HResult,
    /// 8-bit signed character.
    SignedChar,
    /// 8-bit unsigned character.
    UnsignedChar,
    /// `char`
    Char,
    /// `wchar_t`
    WideChar,
    /// `char8_t`
    Char8,
    /// `char16_t`
    Char16,
    /// `char32_t`
    Char32,
    /// 8-bit signed integer.
    I8,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit signed short.
    Short,
    /// 16-bit unsigned short.
    UShort,
    /// 16-bit signed integer.
    I16,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit signed long.
    Long,
    /// 32-bit unsigned long.
    ULong,
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit signed quad.
    Quad,
    /// 64-bit unsigned quad.
    UQuad,
    /// 64-bit signed integer.
    I64,
    /// 64-bit unsigned integer.
    U64,
    /// 128-bit signed octet.
    Octa,
    /// 128-bit unsigned octet.
    UOcta,
    /// 128-bit signed integer.
    I128,
    /// 128-bit unsigned integer.
    U128,
    /// 16-bit float.
    F16,
    /// 32-bit float.
    F32,
    /// 32-bit partial precision float.
    F32PP,
    /// 48-bit float.
    F48,
    /// 64-bit float.
    F64,
    /// 80-bit float.
    F80,
    /// 128-bit float.
    F128,
    /// 16-bit complex.
    Complex16,
    /// 32-bit complex.
    Complex32,
    /// 32-bit partial precision complex.
    Complex32PP,
    /// 48-bit complex.
    Complex48,
    /// 64-bit complex.
    Complex64,
    /// 80-bit complex.
    Complex80,
    /// 128-bit complex.
    Complex128,
    /// 8-bit boolean.
    Bool8,
    /// 16-bit boolean.
    Bool16,
    /// 32-bit boolean.
    Bool32,
    /// 64-bit boolean.
    Bool64,
    /// 128-bit boolean.
    Bool128,
}

impl PrimitiveKind {
    fn from_raw(raw: u8) -> Option<Self> {
        use PrimitiveKind::*;

        Some(match raw {
            0x00 => NoType,
            0x03 => Void,
            0x07 => NotTranslated,
            0x08 => HResult,
            0x10 => SignedChar,
            0x20 => UnsignedChar,
            0x70 => Char,
            0x71 => WideChar,
            0x7c => Char8,
            0x7a => Char16,
            0x7b => Char32,
            0x68 => I8,
            0x69 => U8,
            0x11 => Short,
            0x21 => UShort,
            0x72 => I16,
            0x73 => U16,
            0x12 => Long,
            0x22 => ULong,
            0x74 => I32,
            0x75 => U32,
            0x13 => Quad,
            0x23 => UQuad,
            0x76 => I64,
            0x77 => U64,
            0x14 => Octa,
            0x24 => UOcta,
            0x78 => I128,
            0x79 => U128,
            0x46 => F16,
            0x40 => F32,
            0x45 => F32PP,
            0x44 => F48,
            0x41 => F64,
            0x42 => F80,
            0x43 => F128,
            0x56 => Complex16,
            0x50 => Complex32,
            0x55 => Complex32PP,
            0x54 => Complex48,
            0x51 => Complex64,
            0x52 => Complex80,
            0x53 => Complex128,
            0x30 => Bool8,
            0x31 => Bool16,
            0x32 => Bool32,
            0x33 => Bool64,
            0x34 => Bool128,
            _ => return None,
        })
    }

    /// The size of a value of this type in bytes, if it has one.
    pub fn size(self) -> Option<u32> {
        use PrimitiveKind::*;

        Some(match self {
            NoType | Void | NotTranslated => return None,
            SignedChar | UnsignedChar | Char | Char8 | I8 | U8 | Bool8 => 1,
            WideChar | Char16 | Short | UShort | I16 | U16 | F16 | Bool16 => 2,
            HResult | Char32 | Long | ULong | I32 | U32 | F32 | F32PP | Complex16 | Bool32 => 4,
            F48 => 6,
            Quad | UQuad | I64 | U64 | F64 | Complex32 | Complex32PP | Bool64 => 8,
            F80 => 10,
            Complex48 => 12,
            Octa | UOcta | I128 | U128 | F128 | Complex64 | Bool128 => 16,
            Complex80 => 20,
            Complex128 => 32,
        })
    }

    /// The C name of this type.
    pub fn name(self) -> &'static str {
        use PrimitiveKind::*;

        match self {
            NoType => "<no type>",
            Void => "void",
            NotTranslated => "<not translated>",
            HResult => "HRESULT",
            SignedChar => "signed char",
            UnsignedChar => "unsigned char",
            Char => "char",
            WideChar => "wchar_t",
            Char8 => "char8_t",
            Char16 => "char16_t",
            Char32 => "char32_t",
            I8 => "__int8",
            U8 => "unsigned __int8",
            Short => "short",
            UShort => "unsigned short",
            I16 => "__int16",
            U16 => "unsigned __int16",
            Long => "long",
            ULong => "unsigned long",
            I32 => "int",
            U32 => "unsigned int",
            Quad => "__int64",
            UQuad => "unsigned __int64",
            I64 => "int64_t",
            U64 => "uint64_t",
            Octa => "__int128",
            UOcta => "unsigned __int128",
            I128 => "int128_t",
            U128 => "uint128_t",
            F16 => "__half",
            F32 => "float",
            F32PP => "float",
            F48 => "__float48",
            F64 => "double",
            F80 => "long double",
            F128 => "__float128",
            Complex16 => "_Complex __half",
            Complex32 => "_Complex float",
            Complex32PP => "_Complex float",
            Complex48 => "_Complex __float48",
            Complex64 => "_Complex double",
            Complex80 => "_Complex long double",
            Complex128 => "_Complex __float128",
            Bool8 => "bool",
            Bool16 => "__bool16",
            Bool32 => "__bool32",
            Bool64 => "__bool64",
            Bool128 => "__bool128",
        }
    }
}

/// How a primitive type is referenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Indirection {
    /// The value itself.
    None,
    /// 16-bit near pointer.
    Near16,
    /// 16:16 far pointer.
    Far16,
    /// 16:16 huge pointer.
    Huge16,
    /// 32-bit near pointer.
    Near32,
    /// 16:32 far pointer.
    Far32,
    /// 64-bit near pointer.
    Near64,
    /// 128-bit near pointer.
    Near128,
}

impl Indirection {
    /// The size of the pointer in bytes, or `None` for direct values.
    pub fn pointer_size(self) -> Option<u32> {
        match self {
            Indirection::None => None,
            Indirection::Near16 => Some(2),
            Indirection::Far16 | Indirection::Huge16 | Indirection::Near32 => Some(4),
            Indirection::Far32 => Some(6),
            Indirection::Near64 => Some(8),
            Indirection::Near128 => Some(16),
        }
    }
}

/// A primitive type, optionally behind a pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PrimitiveType {
    /// The basic type.
    pub kind: PrimitiveKind,
    /// The pointer mode.
    pub indirection: Indirection,
}

impl PrimitiveType {
    /// Splits a type index below the first record index into kind and indirection.
    ///
    /// The low byte holds the kind and bits 8 to 11 hold the pointer mode.
    pub fn from_index(index: TypeIndex) -> Result<Self, TypeError> {
        if index.0 > 0xfff {
            return Err(TypeErrorKind::UnsupportedPrimitive(index.0).into());
        }

        let kind = PrimitiveKind::from_raw((index.0 & 0xff) as u8)
            .ok_or(TypeErrorKind::UnsupportedPrimitive(index.0))?;

        let indirection = match (index.0 >> 8) & 0xf {
            0 => Indirection::None,
            1 => Indirection::Near16,
            2 => Indirection::Far16,
            3 => Indirection::Huge16,
            4 => Indirection::Near32,
            5 => Indirection::Far32,
            6 => Indirection::Near64,
            7 => Indirection::Near128,
            _ => return Err(TypeErrorKind::UnsupportedPrimitive(index.0).into()),
        };

        Ok(PrimitiveType { kind, indirection })
    }

    /// The size of a value of this type, taking indirection into account.
    pub fn size(self) -> Option<u32> {
        self.indirection.pointer_size().or_else(|| self.kind.size())
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.name())?;
        if self.indirection != Indirection::None {
            f.write_str("*")?;
        }
        Ok(())
    }
}
