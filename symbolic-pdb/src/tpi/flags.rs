//! Bit-packed attribute words embedded in type records.

use std::fmt;

/// Member access protection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    /// No protection recorded.
    None,
    /// `private`
    Private,
    /// `protected`
    Protected,
    /// `public`
    Public,
}

/// How a method participates in dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodProperties {
    /// A non-virtual method.
    Vanilla,
    /// An override of a virtual method.
    Virtual,
    /// A static method.
    Static,
    /// A friend function.
    Friend,
    /// The introducing declaration of a virtual method.
    Intro,
    /// A pure virtual override.
    PureVirtual,
    /// The introducing declaration of a pure virtual method.
    PureIntro,
    /// A value not defined by CodeView.
    Unknown(u8),
}

impl MethodProperties {
    /// Returns `true` if this method introduces a new vtable slot.
    ///
    /// Such methods carry their vtable offset in the record.
    pub fn is_intro(self) -> bool {
        matches!(self, MethodProperties::Intro | MethodProperties::PureIntro)
    }
}

/// Attributes of a field list entry (CV_fldattr_t).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldAttributes(pub u16);

impl FieldAttributes {
    /// The access protection of the field.
    pub fn access(self) -> Access {
        match self.0 & 0x3 {
            1 => Access::Private,
            2 => Access::Protected,
            3 => Access::Public,
            _ => Access::None,
        }
    }

    /// The method properties, meaningful for methods only.
    pub fn method_properties(self) -> MethodProperties {
        match ((self.0 >> 2) & 0x7) as u8 {
            0 => MethodProperties::Vanilla,
            1 => MethodProperties::Virtual,
            2 => MethodProperties::Static,
            3 => MethodProperties::Friend,
            4 => MethodProperties::Intro,
            5 => MethodProperties::PureVirtual,
            6 => MethodProperties::PureIntro,
            other => MethodProperties::Unknown(other),
        }
    }

    /// Compiler-generated function that does not exist.
    pub fn is_pseudo(self) -> bool {
        self.0 & (1 << 5) != 0
    }

    /// The class cannot be inherited.
    pub fn is_noinherit(self) -> bool {
        self.0 & (1 << 6) != 0
    }

    /// The class cannot be constructed.
    pub fn is_noconstruct(self) -> bool {
        self.0 & (1 << 7) != 0
    }

    /// The function is compiler generated but does exist.
    pub fn is_compiler_generated(self) -> bool {
        self.0 & (1 << 8) != 0
    }

    /// The method cannot be overridden.
    pub fn is_sealed(self) -> bool {
        self.0 & (1 << 9) != 0
    }
}

impl fmt::Debug for FieldAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAttributes")
            .field("access", &self.access())
            .field("method_properties", &self.method_properties())
            .field("pseudo", &self.is_pseudo())
            .field("compiler_generated", &self.is_compiler_generated())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

/// Properties of a user-defined type (CV_prop_t).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TypeProperties(pub u16);

impl TypeProperties {
    /// The type is packed.
    pub fn is_packed(self) -> bool {
        self.0 & (1 << 0) != 0
    }

    /// The type has constructors or destructors.
    pub fn has_constructors(self) -> bool {
        self.0 & (1 << 1) != 0
    }

    /// The type has overloaded operators.
    pub fn has_overloaded_operators(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    /// The type is nested within another type.
    pub fn is_nested(self) -> bool {
        self.0 & (1 << 3) != 0
    }

    /// The type contains nested types.
    pub fn contains_nested(self) -> bool {
        self.0 & (1 << 4) != 0
    }

    /// The type has an overloaded assignment operator.
    pub fn has_overloaded_assignment(self) -> bool {
        self.0 & (1 << 5) != 0
    }

    /// The type has casting methods.
    pub fn has_casting_operators(self) -> bool {
        self.0 & (1 << 6) != 0
    }

    /// The record is a forward reference; the definition is stored elsewhere under the same name.
    pub fn is_forward_reference(self) -> bool {
        self.0 & (1 << 7) != 0
    }

    /// The type is scoped to a function or block.
    pub fn is_scoped(self) -> bool {
        self.0 & (1 << 8) != 0
    }

    /// A decorated unique name follows the display name.
    pub fn has_unique_name(self) -> bool {
        self.0 & (1 << 9) != 0
    }

    /// The type cannot be used as a base class.
    pub fn is_sealed(self) -> bool {
        self.0 & (1 << 10) != 0
    }

    /// The homogeneous floating-point aggregate classification.
    pub fn hfa(self) -> u8 {
        ((self.0 >> 11) & 0x3) as u8
    }

    /// The type is an intrinsic, such as `__m128d`.
    pub fn is_intrinsic(self) -> bool {
        self.0 & (1 << 13) != 0
    }

    /// The managed object model classification.
    pub fn mocom(self) -> u8 {
        ((self.0 >> 14) & 0x3) as u8
    }
}

impl fmt::Debug for TypeProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeProperties")
            .field("packed", &self.is_packed())
            .field("forward_reference", &self.is_forward_reference())
            .field("scoped", &self.is_scoped())
            .field("unique_name", &self.has_unique_name())
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

/// Attributes of a function type (CV_funcattr_t).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FunctionAttributes(pub u8);

impl FunctionAttributes {
    /// The function returns a user-defined type in a C++ style.
    pub fn cxx_return_udt(self) -> bool {
        self.0 & 0x1 != 0
    }

    /// The function is an instance constructor.
    pub fn is_constructor(self) -> bool {
        self.0 & 0x2 != 0
    }

    /// The function is a constructor of a class with virtual bases.
    pub fn is_constructor_with_virtual_bases(self) -> bool {
        self.0 & 0x4 != 0
    }
}

/// The addressing model of a pointer (CV_ptrtype_e).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// 16-bit near pointer.
    Near16,
    /// 16:16 far pointer.
    Far16,
    /// 16:16 huge pointer.
    Huge16,
    /// Based on segment.
    BaseSeg,
    /// Based on value of base.
    BaseVal,
    /// Based on segment value of base.
    BaseSegVal,
    /// Based on address of base.
    BaseAddr,
    /// Based on segment address of base.
    BaseSegAddr,
    /// Based on type.
    BaseType,
    /// Based on self.
    BaseSelf,
    /// 32-bit pointer.
    Near32,
    /// 16:32 pointer.
    Far32,
    /// 64-bit pointer.
    Ptr64,
    /// A value not defined by CodeView.
    Unknown(u8),
}

impl PointerKind {
    fn from_raw(kind: u8) -> Self {
        match kind {
            0x00 => PointerKind::Near16,
            0x01 => PointerKind::Far16,
            0x02 => PointerKind::Huge16,
            0x03 => PointerKind::BaseSeg,
            0x04 => PointerKind::BaseVal,
            0x05 => PointerKind::BaseSegVal,
            0x06 => PointerKind::BaseAddr,
            0x07 => PointerKind::BaseSegAddr,
            0x08 => PointerKind::BaseType,
            0x09 => PointerKind::BaseSelf,
            0x0a => PointerKind::Near32,
            0x0b => PointerKind::Far32,
            0x0c => PointerKind::Ptr64,
            other => PointerKind::Unknown(other),
        }
    }
}

/// What a pointer points to (CV_ptrmode_e).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerMode {
    /// An ordinary pointer.
    Pointer,
    /// An lvalue reference.
    LValueReference,
    /// A pointer to a data member.
    Member,
    /// A pointer to a member function.
    MemberFunction,
    /// An rvalue reference.
    RValueReference,
    /// A value not defined by CodeView.
    Unknown(u8),
}

impl PointerMode {
    fn from_raw(mode: u8) -> Self {
        match mode {
            0 => PointerMode::Pointer,
            1 => PointerMode::LValueReference,
            2 => PointerMode::Member,
            3 => PointerMode::MemberFunction,
            4 => PointerMode::RValueReference,
            other => PointerMode::Unknown(other),
        }
    }

    /// Returns `true` for pointers to members, which carry the containing class.
    pub fn is_member(self) -> bool {
        matches!(self, PointerMode::Member | PointerMode::MemberFunction)
    }
}

/// Attributes of a pointer record (lfPointerAttr).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PointerAttributes(pub u32);

impl PointerAttributes {
    /// The raw five-bit pointer kind.
    pub fn raw_kind(self) -> u8 {
        (self.0 & 0x1f) as u8
    }

    /// The raw three-bit pointer mode.
    pub fn raw_mode(self) -> u8 {
        ((self.0 >> 5) & 0x7) as u8
    }

    /// The addressing model.
    pub fn kind(self) -> PointerKind {
        PointerKind::from_raw(self.raw_kind())
    }

    /// What the pointer points to.
    pub fn mode(self) -> PointerMode {
        PointerMode::from_raw(self.raw_mode())
    }

    /// A flat 32-bit pointer.
    pub fn is_flat32(self) -> bool {
        self.0 & (1 << 8) != 0
    }

    /// The pointer is `volatile`.
    pub fn is_volatile(self) -> bool {
        self.0 & (1 << 9) != 0
    }

    /// The pointer is `const`.
    pub fn is_const(self) -> bool {
        self.0 & (1 << 10) != 0
    }

    /// The pointer is `__unaligned`.
    pub fn is_unaligned(self) -> bool {
        self.0 & (1 << 11) != 0
    }

    /// The pointer is `__restrict`.
    pub fn is_restrict(self) -> bool {
        self.0 & (1 << 12) != 0
    }

    /// The size of the pointer in bytes.
    pub fn size(self) -> u8 {
        ((self.0 >> 13) & 0x3f) as u8
    }

    /// A managed object model pointer.
    pub fn is_mocom(self) -> bool {
        self.0 & (1 << 19) != 0
    }

    /// A `&` qualified member function.
    pub fn is_lref(self) -> bool {
        self.0 & (1 << 20) != 0
    }

    /// A `&&` qualified member function.
    pub fn is_rref(self) -> bool {
        self.0 & (1 << 21) != 0
    }

    /// Returns `true` for lvalue and rvalue references.
    pub fn is_reference(self) -> bool {
        matches!(
            self.mode(),
            PointerMode::LValueReference | PointerMode::RValueReference
        )
    }
}

impl fmt::Debug for PointerAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerAttributes")
            .field("kind", &self.kind())
            .field("mode", &self.mode())
            .field("size", &self.size())
            .field("const", &self.is_const())
            .field("volatile", &self.is_volatile())
            .finish_non_exhaustive()
    }
}

/// `const`, `volatile` and `unaligned` modifiers (CV_modifier_t).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModifierAttributes(pub u16);

impl ModifierAttributes {
    /// The type is `const`.
    pub fn is_const(self) -> bool {
        self.0 & 0x1 != 0
    }

    /// The type is `volatile`.
    pub fn is_volatile(self) -> bool {
        self.0 & 0x2 != 0
    }

    /// The type is `__unaligned`.
    pub fn is_unaligned(self) -> bool {
        self.0 & 0x4 != 0
    }
}
