//! CodeView leaf codes.
//!
//! Codes below [`LF_ST_MAX`] belong to the older record layouts that store names as
//! length-prefixed strings. Later layouts use NUL-terminated strings.

#![allow(missing_docs)]

pub const LF_MODIFIER: u16 = 0x1001;
pub const LF_POINTER: u16 = 0x1002;
pub const LF_ARRAY_ST: u16 = 0x1003;
pub const LF_CLASS_ST: u16 = 0x1004;
pub const LF_STRUCTURE_ST: u16 = 0x1005;
pub const LF_UNION_ST: u16 = 0x1006;
pub const LF_ENUM_ST: u16 = 0x1007;
pub const LF_PROCEDURE: u16 = 0x1008;
pub const LF_MFUNCTION: u16 = 0x1009;

pub const LF_ARGLIST: u16 = 0x1201;
pub const LF_FIELDLIST: u16 = 0x1203;
pub const LF_BITFIELD: u16 = 0x1205;
pub const LF_METHODLIST: u16 = 0x1206;

pub const LF_BCLASS: u16 = 0x1400;
pub const LF_VBCLASS: u16 = 0x1401;
pub const LF_IVBCLASS: u16 = 0x1402;
pub const LF_FRIENDFCN_ST: u16 = 0x1403;
pub const LF_INDEX: u16 = 0x1404;
pub const LF_MEMBER_ST: u16 = 0x1405;
pub const LF_STMEMBER_ST: u16 = 0x1406;
pub const LF_METHOD_ST: u16 = 0x1407;
pub const LF_NESTTYPE_ST: u16 = 0x1408;
pub const LF_VFUNCTAB: u16 = 0x1409;
pub const LF_FRIENDCLS: u16 = 0x140a;
pub const LF_ONEMETHOD_ST: u16 = 0x140b;
pub const LF_ENUMERATE_ST: u16 = 0x0403;

/// The first leaf code that uses NUL-terminated names.
pub const LF_ST_MAX: u16 = 0x1500;

pub const LF_ENUMERATE: u16 = 0x1502;
pub const LF_ARRAY: u16 = 0x1503;
pub const LF_CLASS: u16 = 0x1504;
pub const LF_STRUCTURE: u16 = 0x1505;
pub const LF_UNION: u16 = 0x1506;
pub const LF_ENUM: u16 = 0x1507;
pub const LF_FRIENDFCN: u16 = 0x150c;
pub const LF_MEMBER: u16 = 0x150d;
pub const LF_STMEMBER: u16 = 0x150e;
pub const LF_METHOD: u16 = 0x150f;
pub const LF_NESTTYPE: u16 = 0x1510;
pub const LF_ONEMETHOD: u16 = 0x1511;
pub const LF_INTERFACE: u16 = 0x1519;
pub const LF_BINTERFACE: u16 = 0x151a;

/// Numeric leaves introduce a fixed-width value following the tag.
pub const LF_NUMERIC: u16 = 0x8000;
pub const LF_CHAR: u16 = 0x8000;
pub const LF_SHORT: u16 = 0x8001;
pub const LF_USHORT: u16 = 0x8002;
pub const LF_LONG: u16 = 0x8003;
pub const LF_ULONG: u16 = 0x8004;
pub const LF_REAL32: u16 = 0x8005;
pub const LF_REAL64: u16 = 0x8006;
pub const LF_REAL80: u16 = 0x8007;
pub const LF_REAL128: u16 = 0x8008;
pub const LF_QUADWORD: u16 = 0x8009;
pub const LF_UQUADWORD: u16 = 0x800a;

/// Padding bytes `0xF1..=0xFF` encode how many bytes to skip in their low nibble.
pub const LF_PAD0: u8 = 0xf0;

/// Returns `true` if records with this leaf store names as length-prefixed strings.
#[inline]
pub fn uses_pascal_strings(leaf: u16) -> bool {
    leaf < LF_ST_MAX
}

/// Returns `true` for records describing classes, structures, interfaces and unions.
pub fn is_class_like(leaf: u16) -> bool {
    matches!(
        leaf,
        LF_CLASS
            | LF_STRUCTURE
            | LF_UNION
            | LF_INTERFACE
            | LF_CLASS_ST
            | LF_STRUCTURE_ST
            | LF_UNION_ST
    )
}
