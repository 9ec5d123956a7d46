//! Decoded CodeView type records.
//!
//! [`decode_record`] turns the payload of a record into a [`TypeData`] value. Every decoder reads
//! its fixed fields, then any variable-length literals and names, and must end exactly at the
//! record's declared end, optionally followed by alignment padding.

use super::buffer::{Numeric, ParseBuffer, RawString};
use super::flags::*;
use super::leaf::*;
use super::{TypeError, TypeErrorKind, TypeIndex};

/// Distinguishes the record kinds that share the class layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// `class`
    Class,
    /// `struct`
    Struct,
    /// `interface`
    Interface,
    /// `union`
    Union,
}

/// A class, structure, interface or union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassType<'t> {
    /// The keyword this type was declared with.
    pub kind: ClassKind,
    /// The number of elements in the field list.
    pub count: u16,
    /// Type properties, including the forward reference flag.
    pub properties: TypeProperties,
    /// The field list, absent for forward references.
    pub fields: Option<TypeIndex>,
    /// The derivation list. Always `None` for unions.
    pub derived_from: Option<TypeIndex>,
    /// The vtable shape. Always `None` for unions.
    pub vtable_shape: Option<TypeIndex>,
    /// The size of an instance in bytes.
    pub size: u64,
    /// The display name.
    pub name: RawString<'t>,
    /// The decorated name, if [`TypeProperties::has_unique_name`] is set.
    pub unique_name: Option<RawString<'t>>,
}

/// An enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumerationType<'t> {
    /// The number of enumerators.
    pub count: u16,
    /// Type properties.
    pub properties: TypeProperties,
    /// The integral type backing the enumeration.
    pub underlying_type: TypeIndex,
    /// The field list holding the enumerators.
    pub fields: Option<TypeIndex>,
    /// The display name.
    pub name: RawString<'t>,
    /// The decorated name, if present.
    pub unique_name: Option<RawString<'t>>,
}

/// A single enumerator of an enumeration.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumerateType<'t> {
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The value of the enumerator.
    pub value: Numeric,
    /// The name of the enumerator.
    pub name: RawString<'t>,
}

/// The containing class of a pointer to member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberPointerInfo {
    /// The class containing the member.
    pub containing_class: TypeIndex,
    /// The representation of the pointer (CV_pmtype_e).
    pub representation: u16,
}

/// A pointer or reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerType {
    /// The pointee.
    pub underlying_type: TypeIndex,
    /// Pointer attributes.
    pub attributes: PointerAttributes,
    /// Present for pointers to members.
    pub containing_class: Option<MemberPointerInfo>,
}

/// A `const`, `volatile` or `__unaligned` qualified type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModifierType {
    /// The qualified type.
    pub underlying_type: TypeIndex,
    /// The qualifiers.
    pub attributes: ModifierAttributes,
}

/// A free function signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcedureType {
    /// The return type.
    pub return_type: Option<TypeIndex>,
    /// The calling convention (CV_call_e).
    pub calling_convention: u8,
    /// Function attributes.
    pub attributes: FunctionAttributes,
    /// The number of parameters.
    pub parameter_count: u16,
    /// The argument list record.
    pub argument_list: TypeIndex,
}

/// A member function signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberFunctionType {
    /// The return type.
    pub return_type: TypeIndex,
    /// The class declaring the function.
    pub class_type: TypeIndex,
    /// The type of `this`, absent for static functions.
    pub this_pointer_type: Option<TypeIndex>,
    /// The calling convention (CV_call_e).
    pub calling_convention: u8,
    /// Function attributes.
    pub attributes: FunctionAttributes,
    /// The number of parameters.
    pub parameter_count: u16,
    /// The argument list record.
    pub argument_list: TypeIndex,
    /// The adjustment applied to `this`.
    pub this_adjustment: i32,
}

/// The parameter types of a function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgumentList {
    /// The parameter types in order.
    pub arguments: Vec<TypeIndex>,
}

/// One overload in a [`MethodList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodListEntry {
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The member function signature.
    pub method_type: TypeIndex,
    /// The vtable offset for introducing virtual methods.
    pub vtable_offset: Option<u32>,
}

/// The overloads of a method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodList {
    /// The overloads in declaration order.
    pub methods: Vec<MethodListEntry>,
}

/// A bitfield.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitfieldType {
    /// The integral type holding the bits.
    pub underlying_type: TypeIndex,
    /// The number of bits.
    pub length: u8,
    /// The index of the first bit.
    pub position: u8,
}

/// A fixed-size array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayType<'t> {
    /// The element type.
    pub element_type: TypeIndex,
    /// The type used for indexing.
    pub indexing_type: TypeIndex,
    /// The total size in bytes.
    pub size: u64,
    /// The name, usually empty.
    pub name: RawString<'t>,
}

/// A non-static data member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberType<'t> {
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The type of the member.
    pub field_type: TypeIndex,
    /// The byte offset within the containing type.
    pub offset: u64,
    /// The member name.
    pub name: RawString<'t>,
}

/// A static data member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticMemberType<'t> {
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The type of the member.
    pub field_type: TypeIndex,
    /// The member name.
    pub name: RawString<'t>,
}

/// A direct base class or interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseClassType {
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The base class.
    pub base_class: TypeIndex,
    /// The offset of the base within the derived class.
    pub offset: u64,
}

/// A direct or indirect virtual base class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VirtualBaseClassType {
    /// Whether the base is only inherited indirectly.
    pub indirect: bool,
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The virtual base class.
    pub base_class: TypeIndex,
    /// The type of the virtual base pointer.
    pub base_pointer: TypeIndex,
    /// The offset of the virtual base pointer from the address point.
    pub base_pointer_offset: u64,
    /// The index of the base in the virtual base table.
    pub virtual_base_offset: u64,
}

/// An overloaded method, referencing a [`MethodList`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverloadedMethodType<'t> {
    /// The number of overloads.
    pub count: u16,
    /// The method list record.
    pub method_list: TypeIndex,
    /// The method name.
    pub name: RawString<'t>,
}

/// A method without overloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodType<'t> {
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The member function signature.
    pub method_type: TypeIndex,
    /// The vtable offset for introducing virtual methods.
    pub vtable_offset: Option<u32>,
    /// The method name.
    pub name: RawString<'t>,
}

/// A type declared inside another type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NestedType<'t> {
    /// The nested type.
    pub nested_type: TypeIndex,
    /// The name of the nested type within its parent.
    pub name: RawString<'t>,
}

/// The virtual function table pointer of a class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VirtualFunctionTablePointerType {
    /// The pointer type.
    pub table: TypeIndex,
}

/// A friend class declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FriendClassType {
    /// The friend class.
    pub friend_class: TypeIndex,
}

/// A friend function declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FriendFunctionType<'t> {
    /// The signature of the friend function.
    pub function_type: TypeIndex,
    /// The function name.
    pub name: RawString<'t>,
}

/// The fields of a class or enumeration.
///
/// Long field lists are split into several records chained with [`TypeData::Index`] entries.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldList<'t> {
    /// The entries in declaration order.
    pub fields: Vec<TypeData<'t>>,
}

impl FieldList<'_> {
    /// The field list record continuing this one, if any.
    pub fn continuation(&self) -> Option<TypeIndex> {
        self.fields.iter().find_map(|field| match *field {
            TypeData::Index(index) => Some(index),
            _ => None,
        })
    }
}

/// A decoded type record.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum TypeData<'t> {
    /// `LF_CLASS`, `LF_STRUCTURE`, `LF_INTERFACE`, `LF_UNION` and their `_ST` variants.
    Class(ClassType<'t>),
    /// `LF_ENUM`
    Enumeration(EnumerationType<'t>),
    /// `LF_ENUMERATE`
    Enumerate(EnumerateType<'t>),
    /// `LF_POINTER`
    Pointer(PointerType),
    /// `LF_MODIFIER`
    Modifier(ModifierType),
    /// `LF_PROCEDURE`
    Procedure(ProcedureType),
    /// `LF_MFUNCTION`
    MemberFunction(MemberFunctionType),
    /// `LF_ARGLIST`
    ArgumentList(ArgumentList),
    /// `LF_METHODLIST`
    MethodList(MethodList),
    /// `LF_FIELDLIST`
    FieldList(FieldList<'t>),
    /// `LF_BITFIELD`
    Bitfield(BitfieldType),
    /// `LF_ARRAY`
    Array(ArrayType<'t>),
    /// `LF_MEMBER`
    Member(MemberType<'t>),
    /// `LF_STMEMBER`
    StaticMember(StaticMemberType<'t>),
    /// `LF_BCLASS` and `LF_BINTERFACE`
    BaseClass(BaseClassType),
    /// `LF_VBCLASS` and `LF_IVBCLASS`
    VirtualBaseClass(VirtualBaseClassType),
    /// `LF_METHOD`
    OverloadedMethod(OverloadedMethodType<'t>),
    /// `LF_ONEMETHOD`
    Method(MethodType<'t>),
    /// `LF_NESTTYPE`
    Nested(NestedType<'t>),
    /// `LF_VFUNCTAB`
    VirtualFunctionTablePointer(VirtualFunctionTablePointerType),
    /// `LF_FRIENDCLS`
    FriendClass(FriendClassType),
    /// `LF_FRIENDFCN`
    FriendFunction(FriendFunctionType<'t>),
    /// `LF_INDEX`, continuing a field list in another record.
    Index(TypeIndex),
}

impl<'t> TypeData<'t> {
    /// The name of this type or field, if it has one.
    pub fn name(&self) -> Option<RawString<'t>> {
        Some(match *self {
            TypeData::Class(ref c) => c.name,
            TypeData::Enumeration(ref e) => e.name,
            TypeData::Enumerate(ref e) => e.name,
            TypeData::Array(ref a) => a.name,
            TypeData::Member(ref m) => m.name,
            TypeData::StaticMember(ref m) => m.name,
            TypeData::OverloadedMethod(ref m) => m.name,
            TypeData::Method(ref m) => m.name,
            TypeData::Nested(ref n) => n.name,
            TypeData::FriendFunction(ref f) => f.name,
            _ => return None,
        })
    }

    /// The decorated name of a user-defined type, if present.
    pub fn unique_name(&self) -> Option<RawString<'t>> {
        match *self {
            TypeData::Class(ref c) => c.unique_name,
            TypeData::Enumeration(ref e) => e.unique_name,
            _ => None,
        }
    }

    /// The type properties of a user-defined type.
    pub fn properties(&self) -> Option<TypeProperties> {
        match *self {
            TypeData::Class(ref c) => Some(c.properties),
            TypeData::Enumeration(ref e) => Some(e.properties),
            _ => None,
        }
    }

    /// Returns `true` for forward references to classes and enumerations.
    pub fn is_forward_reference(&self) -> bool {
        self.properties()
            .map_or(false, |props| props.is_forward_reference())
    }
}

type DecodeFn = for<'t> fn(u16, &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError>;

/// Decoders for top-level records, sorted by leaf.
static RECORD_DECODERS: &[(u16, DecodeFn)] = &[
    (LF_MODIFIER, decode_modifier),
    (LF_POINTER, decode_pointer),
    (LF_ARRAY_ST, decode_array),
    (LF_CLASS_ST, decode_class),
    (LF_STRUCTURE_ST, decode_class),
    (LF_UNION_ST, decode_union),
    (LF_ENUM_ST, decode_enumeration),
    (LF_PROCEDURE, decode_procedure),
    (LF_MFUNCTION, decode_member_function),
    (LF_ARGLIST, decode_argument_list),
    (LF_FIELDLIST, decode_field_list),
    (LF_BITFIELD, decode_bitfield),
    (LF_METHODLIST, decode_method_list),
    (LF_ARRAY, decode_array),
    (LF_CLASS, decode_class),
    (LF_STRUCTURE, decode_class),
    (LF_UNION, decode_union),
    (LF_ENUM, decode_enumeration),
    (LF_INTERFACE, decode_class),
];

/// Decoders for field list entries, sorted by leaf.
static FIELD_DECODERS: &[(u16, DecodeFn)] = &[
    (LF_ENUMERATE_ST, decode_enumerate),
    (LF_BCLASS, decode_base_class),
    (LF_VBCLASS, decode_virtual_base_class),
    (LF_IVBCLASS, decode_virtual_base_class),
    (LF_FRIENDFCN_ST, decode_friend_function),
    (LF_INDEX, decode_index),
    (LF_MEMBER_ST, decode_member),
    (LF_STMEMBER_ST, decode_static_member),
    (LF_METHOD_ST, decode_overloaded_method),
    (LF_NESTTYPE_ST, decode_nested),
    (LF_VFUNCTAB, decode_vfunctab),
    (LF_FRIENDCLS, decode_friend_class),
    (LF_ONEMETHOD_ST, decode_method),
    (LF_ENUMERATE, decode_enumerate),
    (LF_FRIENDFCN, decode_friend_function),
    (LF_MEMBER, decode_member),
    (LF_STMEMBER, decode_static_member),
    (LF_METHOD, decode_overloaded_method),
    (LF_NESTTYPE, decode_nested),
    (LF_ONEMETHOD, decode_method),
    (LF_BINTERFACE, decode_base_class),
];

fn lookup(table: &[(u16, DecodeFn)], leaf: u16) -> Option<DecodeFn> {
    table
        .binary_search_by_key(&leaf, |&(code, _)| code)
        .ok()
        .map(|index| table[index].1)
}

/// Returns `true` if the leaf denotes a top-level record this crate can decode.
pub fn is_supported_leaf(leaf: u16) -> bool {
    lookup(RECORD_DECODERS, leaf).is_some()
}

/// Decodes the payload of a type record.
///
/// `payload` is everything after the leaf code, bounded by the record's declared length. The whole
/// payload must be consumed, with trailing bytes only allowed as alignment padding.
pub fn decode_record(leaf: u16, payload: &[u8]) -> Result<TypeData<'_>, TypeError> {
    let decode = lookup(RECORD_DECODERS, leaf).ok_or(TypeErrorKind::UnsupportedLeaf(leaf))?;
    let mut buf = ParseBuffer::new(payload);
    let data = decode(leaf, &mut buf)?;
    buf.finish()?;
    Ok(data)
}

/// Treats index 0 as "no type".
fn optional(index: TypeIndex) -> Option<TypeIndex> {
    (index.0 != 0).then_some(index)
}

fn parse_size(buf: &mut ParseBuffer<'_>) -> Result<u64, TypeError> {
    buf.parse_numeric()?
        .as_u64()
        .ok_or_else(|| TypeErrorKind::InvalidNumeric.into())
}

fn parse_unique_name<'t>(
    buf: &mut ParseBuffer<'t>,
    leaf: u16,
    properties: TypeProperties,
) -> Result<Option<RawString<'t>>, TypeError> {
    if properties.has_unique_name() {
        buf.parse_name(leaf).map(Some)
    } else {
        Ok(None)
    }
}

fn decode_class<'t>(leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    let kind = match leaf {
        LF_CLASS | LF_CLASS_ST => ClassKind::Class,
        LF_INTERFACE => ClassKind::Interface,
        _ => ClassKind::Struct,
    };

    let count = buf.parse_u16()?;
    let properties = TypeProperties(buf.parse_u16()?);
    let fields = optional(buf.parse_type_index()?);
    let derived_from = optional(buf.parse_type_index()?);
    let vtable_shape = optional(buf.parse_type_index()?);
    let size = parse_size(buf)?;
    let name = buf.parse_name(leaf)?;
    let unique_name = parse_unique_name(buf, leaf, properties)?;

    Ok(TypeData::Class(ClassType {
        kind,
        count,
        properties,
        fields,
        derived_from,
        vtable_shape,
        size,
        name,
        unique_name,
    }))
}

fn decode_union<'t>(leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    let count = buf.parse_u16()?;
    let properties = TypeProperties(buf.parse_u16()?);
    let fields = optional(buf.parse_type_index()?);
    let size = parse_size(buf)?;
    let name = buf.parse_name(leaf)?;
    let unique_name = parse_unique_name(buf, leaf, properties)?;

    Ok(TypeData::Class(ClassType {
        kind: ClassKind::Union,
        count,
        properties,
        fields,
        derived_from: None,
        vtable_shape: None,
        size,
        name,
        unique_name,
    }))
}

fn decode_enumeration<'t>(
    leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    let count = buf.parse_u16()?;
    let properties = TypeProperties(buf.parse_u16()?);
    let underlying_type = buf.parse_type_index()?;
    let fields = optional(buf.parse_type_index()?);
    let name = buf.parse_name(leaf)?;
    let unique_name = parse_unique_name(buf, leaf, properties)?;

    Ok(TypeData::Enumeration(EnumerationType {
        count,
        properties,
        underlying_type,
        fields,
        name,
        unique_name,
    }))
}

fn decode_enumerate<'t>(leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::Enumerate(EnumerateType {
        attributes: FieldAttributes(buf.parse_u16()?),
        value: buf.parse_numeric()?,
        name: buf.parse_name(leaf)?,
    }))
}

fn decode_pointer<'t>(_leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    let underlying_type = buf.parse_type_index()?;
    let attributes = PointerAttributes(buf.parse_u32()?);

    let mut containing_class = None;
    if attributes.mode().is_member() {
        if attributes.kind() != PointerKind::Ptr64 {
            return Err(TypeErrorKind::UnsupportedPointer {
                kind: attributes.raw_kind(),
                mode: attributes.raw_mode(),
            }
            .into());
        }

        // Eight trailing bytes: the class, the representation and two bytes of filler.
        let start = buf.pos();
        containing_class = Some(MemberPointerInfo {
            containing_class: buf.parse_type_index()?,
            representation: buf.parse_u16()?,
        });
        buf.take(8 - (buf.pos() - start))?;
    }

    Ok(TypeData::Pointer(PointerType {
        underlying_type,
        attributes,
        containing_class,
    }))
}

fn decode_modifier<'t>(_leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::Modifier(ModifierType {
        underlying_type: buf.parse_type_index()?,
        attributes: ModifierAttributes(buf.parse_u16()?),
    }))
}

fn decode_procedure<'t>(_leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::Procedure(ProcedureType {
        return_type: optional(buf.parse_type_index()?),
        calling_convention: buf.parse_u8()?,
        attributes: FunctionAttributes(buf.parse_u8()?),
        parameter_count: buf.parse_u16()?,
        argument_list: buf.parse_type_index()?,
    }))
}

fn decode_member_function<'t>(
    _leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::MemberFunction(MemberFunctionType {
        return_type: buf.parse_type_index()?,
        class_type: buf.parse_type_index()?,
        this_pointer_type: optional(buf.parse_type_index()?),
        calling_convention: buf.parse_u8()?,
        attributes: FunctionAttributes(buf.parse_u8()?),
        parameter_count: buf.parse_u16()?,
        argument_list: buf.parse_type_index()?,
        this_adjustment: buf.parse()?,
    }))
}

fn decode_argument_list<'t>(
    _leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    let count = buf.parse_u32()?;
    if (count as usize).saturating_mul(4) > buf.remaining() {
        return Err(TypeErrorKind::RecordOverrun {
            end: buf.len(),
            offset: buf.pos().saturating_add((count as usize).saturating_mul(4)),
        }
        .into());
    }

    let arguments = (0..count)
        .map(|_| buf.parse_type_index())
        .collect::<Result<_, _>>()?;
    Ok(TypeData::ArgumentList(ArgumentList { arguments }))
}

fn decode_method_list<'t>(
    _leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    let mut methods = Vec::new();
    while buf.remaining() > 0 {
        let attributes = FieldAttributes(buf.parse_u16()?);
        buf.parse_u16()?;
        let method_type = buf.parse_type_index()?;
        let vtable_offset = if attributes.method_properties().is_intro() {
            Some(buf.parse_u32()?)
        } else {
            None
        };

        methods.push(MethodListEntry {
            attributes,
            method_type,
            vtable_offset,
        });
    }

    Ok(TypeData::MethodList(MethodList { methods }))
}

fn decode_bitfield<'t>(_leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::Bitfield(BitfieldType {
        underlying_type: buf.parse_type_index()?,
        length: buf.parse_u8()?,
        position: buf.parse_u8()?,
    }))
}

fn decode_array<'t>(leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::Array(ArrayType {
        element_type: buf.parse_type_index()?,
        indexing_type: buf.parse_type_index()?,
        size: parse_size(buf)?,
        name: buf.parse_name(leaf)?,
    }))
}

fn decode_member<'t>(leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::Member(MemberType {
        attributes: FieldAttributes(buf.parse_u16()?),
        field_type: buf.parse_type_index()?,
        offset: parse_size(buf)?,
        name: buf.parse_name(leaf)?,
    }))
}

fn decode_static_member<'t>(
    leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::StaticMember(StaticMemberType {
        attributes: FieldAttributes(buf.parse_u16()?),
        field_type: buf.parse_type_index()?,
        name: buf.parse_name(leaf)?,
    }))
}

fn decode_base_class<'t>(_leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::BaseClass(BaseClassType {
        attributes: FieldAttributes(buf.parse_u16()?),
        base_class: buf.parse_type_index()?,
        offset: parse_size(buf)?,
    }))
}

fn decode_virtual_base_class<'t>(
    leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::VirtualBaseClass(VirtualBaseClassType {
        indirect: leaf == LF_IVBCLASS,
        attributes: FieldAttributes(buf.parse_u16()?),
        base_class: buf.parse_type_index()?,
        base_pointer: buf.parse_type_index()?,
        base_pointer_offset: parse_size(buf)?,
        virtual_base_offset: parse_size(buf)?,
    }))
}

fn decode_overloaded_method<'t>(
    leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    Ok(TypeData::OverloadedMethod(OverloadedMethodType {
        count: buf.parse_u16()?,
        method_list: buf.parse_type_index()?,
        name: buf.parse_name(leaf)?,
    }))
}

fn decode_method<'t>(leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    let attributes = FieldAttributes(buf.parse_u16()?);
    let method_type = buf.parse_type_index()?;
    let vtable_offset = if attributes.method_properties().is_intro() {
        Some(buf.parse_u32()?)
    } else {
        None
    };

    Ok(TypeData::Method(MethodType {
        attributes,
        method_type,
        vtable_offset,
        name: buf.parse_name(leaf)?,
    }))
}

fn decode_nested<'t>(leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    buf.parse_u16()?;
    Ok(TypeData::Nested(NestedType {
        nested_type: buf.parse_type_index()?,
        name: buf.parse_name(leaf)?,
    }))
}

fn decode_vfunctab<'t>(_leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    buf.parse_u16()?;
    Ok(TypeData::VirtualFunctionTablePointer(
        VirtualFunctionTablePointerType {
            table: buf.parse_type_index()?,
        },
    ))
}

fn decode_friend_class<'t>(
    _leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    buf.parse_u16()?;
    Ok(TypeData::FriendClass(FriendClassType {
        friend_class: buf.parse_type_index()?,
    }))
}

fn decode_friend_function<'t>(
    leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    buf.parse_u16()?;
    Ok(TypeData::FriendFunction(FriendFunctionType {
        function_type: buf.parse_type_index()?,
        name: buf.parse_name(leaf)?,
    }))
}

fn decode_index<'t>(_leaf: u16, buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>, TypeError> {
    buf.parse_u16()?;
    Ok(TypeData::Index(buf.parse_type_index()?))
}

/// Decodes entries until the declared end of the field list.
///
/// Entries are separated by optional padding. Any gap that is neither padding nor a known entry
/// means a preceding entry was decoded short.
fn decode_field_list<'t>(
    _leaf: u16,
    buf: &mut ParseBuffer<'t>,
) -> Result<TypeData<'t>, TypeError> {
    let mut fields = Vec::new();

    while !buf.is_empty() {
        if buf.skip_padding()? > 0 {
            continue;
        }

        let underrun = TypeErrorKind::RecordUnderrun {
            end: buf.len(),
            offset: buf.pos(),
        };
        let leaf = buf.peek_u16().ok_or(underrun)?;
        let decode = match lookup(FIELD_DECODERS, leaf) {
            Some(decode) => decode,
            None if leaf == 0 || buf.remaining() < 4 => return Err(underrun.into()),
            None => return Err(TypeErrorKind::UnsupportedLeaf(leaf).into()),
        };

        buf.parse_u16()?;
        fields.push(decode(leaf, buf)?);
    }

    Ok(TypeData::FieldList(FieldList { fields }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn is_sorted(table: &[(u16, DecodeFn)]) -> bool {
        table.windows(2).all(|pair| pair[0].0 < pair[1].0)
    }

    #[test]
    fn test_decoder_tables_sorted() {
        assert!(is_sorted(RECORD_DECODERS));
        assert!(is_sorted(FIELD_DECODERS));
    }

    #[test]
    fn test_structure() {
        let mut payload = vec![];
        payload.extend_from_slice(&3u16.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&0x1000u32.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&16u16.to_le_bytes());
        payload.extend_from_slice(b"Yolo\0");
        payload.extend_from_slice(&[0xf1]);

        let data = decode_record(LF_STRUCTURE, &payload).unwrap();
        let TypeData::Class(class) = data else {
            panic!("expected a class, got {data:?}");
        };

        assert_eq!(class.kind, ClassKind::Struct);
        assert_eq!(class.count, 3);
        assert_eq!(class.fields, Some(TypeIndex(0x1000)));
        assert_eq!(class.derived_from, None);
        assert_eq!(class.size, 16);
        assert_eq!(class.name.as_bytes(), b"Yolo");
        assert_eq!(class.unique_name, None);
    }

    #[test]
    fn test_union_with_unique_name() {
        let mut payload = vec![];
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.extend_from_slice(&0x200u16.to_le_bytes());
        payload.extend_from_slice(&0x1000u32.to_le_bytes());
        payload.extend_from_slice(&4u16.to_le_bytes());
        payload.extend_from_slice(b"U\0.?ATU@@\0");

        let data = decode_record(LF_UNION, &payload).unwrap();
        assert_eq!(data.name().unwrap().as_bytes(), b"U");
        assert_eq!(data.unique_name().unwrap().as_bytes(), b".?ATU@@");
    }

    #[test]
    fn test_member_pointer() {
        let attrs = 0x0cu32 | (2 << 5) | (8 << 13);
        let mut payload = vec![];
        payload.extend_from_slice(&0x74u32.to_le_bytes());
        payload.extend_from_slice(&attrs.to_le_bytes());
        payload.extend_from_slice(&0x1001u32.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.extend_from_slice(&[0, 0]);

        let data = decode_record(LF_POINTER, &payload).unwrap();
        let TypeData::Pointer(pointer) = data else {
            panic!("expected a pointer, got {data:?}");
        };
        assert_eq!(
            pointer.containing_class,
            Some(MemberPointerInfo {
                containing_class: TypeIndex(0x1001),
                representation: 1,
            })
        );
    }

    #[test]
    fn test_unsupported_member_pointer() {
        let attrs = 0x0au32 | (3 << 5);
        let mut payload = vec![];
        payload.extend_from_slice(&0x74u32.to_le_bytes());
        payload.extend_from_slice(&attrs.to_le_bytes());
        payload.extend_from_slice(&[0; 8]);

        let err = decode_record(LF_POINTER, &payload).unwrap_err();
        assert_eq!(
            err.kind(),
            TypeErrorKind::UnsupportedPointer { kind: 0x0a, mode: 3 }
        );
    }

    #[test]
    fn test_one_method_vtable_offset() {
        // LF_ONEMETHOD, intro virtual, followed by LF_ONEMETHOD, vanilla
        let mut payload = vec![];
        payload.extend_from_slice(&LF_ONEMETHOD.to_le_bytes());
        payload.extend_from_slice(&(3u16 | (4 << 2)).to_le_bytes());
        payload.extend_from_slice(&0x1002u32.to_le_bytes());
        payload.extend_from_slice(&8u32.to_le_bytes());
        payload.extend_from_slice(b"f\0");
        payload.extend_from_slice(&[0xf2, 0xf1]);
        payload.extend_from_slice(&LF_ONEMETHOD.to_le_bytes());
        payload.extend_from_slice(&3u16.to_le_bytes());
        payload.extend_from_slice(&0x1003u32.to_le_bytes());
        payload.extend_from_slice(b"g\0");
        payload.extend_from_slice(&[0xf2, 0xf1]);

        let data = decode_record(LF_FIELDLIST, &payload).unwrap();
        let TypeData::FieldList(list) = data else {
            panic!("expected a field list, got {data:?}");
        };

        let offsets: Vec<_> = list
            .fields
            .iter()
            .map(|field| match field {
                TypeData::Method(method) => method.vtable_offset,
                other => panic!("unexpected field {other:?}"),
            })
            .collect();
        assert_eq!(offsets, vec![Some(8), None]);
    }

    #[test]
    fn test_field_list_continuation() {
        let mut payload = vec![];
        payload.extend_from_slice(&LF_INDEX.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&0x1005u32.to_le_bytes());

        let data = decode_record(LF_FIELDLIST, &payload).unwrap();
        let TypeData::FieldList(list) = data else {
            panic!("expected a field list, got {data:?}");
        };
        assert_eq!(list.continuation(), Some(TypeIndex(0x1005)));
    }

    fn member_payload(offset: &[u8], name: &[u8]) -> Vec<u8> {
        let mut payload = vec![];
        payload.extend_from_slice(&LF_MEMBER.to_le_bytes());
        payload.extend_from_slice(&3u16.to_le_bytes());
        payload.extend_from_slice(&0x74u32.to_le_bytes());
        payload.extend_from_slice(offset);
        payload.extend_from_slice(name);
        payload
    }

    #[test]
    fn test_member_char_offset() {
        // LF_CHAR 0x90
        let mut payload = member_payload(&[0x00, 0x80, 0x90], b"x\0");
        payload.extend_from_slice(&[0xf3, 0xf2, 0xf1]);

        let data = decode_record(LF_FIELDLIST, &payload).unwrap();
        let TypeData::FieldList(list) = data else {
            panic!("expected a field list, got {data:?}");
        };
        let TypeData::Member(ref member) = list.fields[0] else {
            panic!("expected a member, got {:?}", list.fields[0]);
        };
        assert_eq!(member.offset, 144);
        assert_eq!(member.name.as_bytes(), b"x");
    }

    #[test]
    fn test_field_list_padded_to_end() {
        let mut payload = member_payload(&4u16.to_le_bytes(), b"x\0");
        payload.extend_from_slice(&[0xf2, 0xf1]);
        assert_eq!(payload.len(), 14);

        let data = decode_record(LF_FIELDLIST, &payload).unwrap();
        let TypeData::FieldList(list) = data else {
            panic!("expected a field list, got {data:?}");
        };
        assert_eq!(list.fields.len(), 1);
        assert_eq!(list.fields[0].name().unwrap().as_bytes(), b"x");
    }

    #[test]
    fn test_field_list_missing_padding() {
        let mut payload = member_payload(&4u16.to_le_bytes(), b"x\0");
        payload.extend_from_slice(&[0x00, 0x00]);

        let err = decode_record(LF_FIELDLIST, &payload).unwrap_err();
        assert_eq!(
            err.kind(),
            TypeErrorKind::RecordUnderrun { end: 14, offset: 12 }
        );
    }

    #[test]
    fn test_unsupported_leaf() {
        let err = decode_record(0x1ff0, &[]).unwrap_err();
        assert_eq!(err.kind(), TypeErrorKind::UnsupportedLeaf(0x1ff0));
    }

    #[test]
    fn test_pascal_names() {
        let mut payload = vec![];
        payload.extend_from_slice(&LF_MEMBER_ST.to_le_bytes());
        payload.extend_from_slice(&3u16.to_le_bytes());
        payload.extend_from_slice(&0x74u32.to_le_bytes());
        payload.extend_from_slice(&4u16.to_le_bytes());
        payload.extend_from_slice(b"\x03abc");

        let data = decode_record(LF_FIELDLIST, &payload).unwrap();
        let TypeData::FieldList(list) = data else {
            panic!("expected a field list, got {data:?}");
        };
        assert_eq!(list.fields[0].name().unwrap().as_bytes(), b"abc");
    }
}
