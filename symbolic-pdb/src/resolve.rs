//! A memoizing graph of resolved types.
//!
//! [`ResolveCache`] turns raw type records into [`TypeNode`]s. References between nodes are
//! [`TypeRef`]s, which only resolve when [followed](ResolveCache::follow). Resolving a class
//! therefore reads its field list but not the types of its members, which keeps self-referential
//! types such as linked list nodes finite.
//!
//! Every type index maps to exactly one node. A forward reference to a class and the class
//! definition share a node, so node identity can be compared with [`TypeNode::id`].

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::tpi::{
    ClassKind, FieldAttributes, FunctionAttributes, ModifierAttributes, Numeric,
    PointerAttributes, PointerMode, PrimitiveType, TypeData, TypeError, TypeErrorKind, TypeIndex,
    TypeInformation, TypeProperties,
};

/// The identity of a node in a [`ResolveCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A lazily resolved reference to another type.
#[derive(Clone, Debug)]
pub struct TypeRef {
    index: TypeIndex,
    node: OnceCell<NodeId>,
}

impl TypeRef {
    fn new(index: TypeIndex) -> Self {
        TypeRef {
            index,
            node: OnceCell::new(),
        }
    }

    /// The referenced type index.
    pub fn index(&self) -> TypeIndex {
        self.index
    }

    /// The node, if this reference has been followed before.
    pub fn resolved(&self) -> Option<NodeId> {
        self.node.get().copied()
    }
}

/// A data member of a class.
#[derive(Clone, Debug)]
pub struct Member {
    /// The member name.
    pub name: String,
    /// The byte offset within the class.
    pub offset: u64,
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The member type.
    pub ty: TypeRef,
}

/// A static data member of a class.
#[derive(Clone, Debug)]
pub struct StaticMember {
    /// The member name.
    pub name: String,
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The member type.
    pub ty: TypeRef,
}

/// A base class.
#[derive(Clone, Debug)]
pub struct BaseClass {
    /// The offset of the base in the derived class. `None` for virtual bases.
    pub offset: Option<u64>,
    /// Field attributes.
    pub attributes: FieldAttributes,
    /// The base class type.
    pub ty: TypeRef,
}

/// A method of a class. Overloads appear as separate methods with the same name.
#[derive(Clone, Debug)]
pub struct Method {
    /// The method name.
    pub name: String,
    /// Field attributes, including virtual-ness.
    pub attributes: FieldAttributes,
    /// The member function signature.
    pub ty: TypeRef,
    /// The vtable offset for introducing virtual methods.
    pub vtable_offset: Option<u32>,
}

/// A type nested within a class.
#[derive(Clone, Debug)]
pub struct Nested {
    /// The name within the parent.
    pub name: String,
    /// The nested type.
    pub ty: TypeRef,
}

/// A class, structure, interface or union with its fields.
#[derive(Clone, Debug)]
pub struct ClassNode {
    /// The keyword this type was declared with.
    pub kind: ClassKind,
    /// The display name.
    pub name: String,
    /// The decorated name.
    pub unique_name: Option<String>,
    /// The instance size in bytes.
    pub size: u64,
    /// Type properties.
    pub properties: TypeProperties,
    /// Direct and virtual base classes.
    pub bases: Vec<BaseClass>,
    /// Non-static data members, in declaration order.
    pub members: Vec<Member>,
    /// Static data members.
    pub static_members: Vec<StaticMember>,
    /// Methods, in declaration order.
    pub methods: Vec<Method>,
    /// Nested types.
    pub nested: Vec<Nested>,
    /// The vtable pointer type, if the class has one.
    pub vtable: Option<TypeRef>,
}

/// An enumeration with its enumerators.
#[derive(Clone, Debug)]
pub struct EnumerationNode {
    /// The display name.
    pub name: String,
    /// The decorated name.
    pub unique_name: Option<String>,
    /// Type properties.
    pub properties: TypeProperties,
    /// The integral type backing the enumeration.
    pub underlying_type: TypeRef,
    /// Enumerator names and values, in declaration order.
    pub variants: Vec<(String, Numeric)>,
}

/// A pointer or reference.
#[derive(Clone, Debug)]
pub struct PointerNode {
    /// The pointee.
    pub pointee: TypeRef,
    /// Pointer attributes.
    pub attributes: PointerAttributes,
    /// The containing class of pointers to members.
    pub containing_class: Option<TypeRef>,
}

/// A qualified type.
#[derive(Clone, Debug)]
pub struct ModifierNode {
    /// The qualified type.
    pub underlying_type: TypeRef,
    /// The qualifiers.
    pub attributes: ModifierAttributes,
}

/// A fixed-size array.
#[derive(Clone, Debug)]
pub struct ArrayNode {
    /// The element type.
    pub element_type: TypeRef,
    /// The indexing type.
    pub indexing_type: TypeRef,
    /// The total size in bytes.
    pub size: u64,
}

/// A bitfield.
#[derive(Clone, Debug)]
pub struct BitfieldNode {
    /// The integral type holding the bits.
    pub underlying_type: TypeRef,
    /// The number of bits.
    pub length: u8,
    /// The index of the first bit.
    pub position: u8,
}

/// A function signature, free or member.
#[derive(Clone, Debug)]
pub struct FunctionNode {
    /// The return type, if any.
    pub return_type: Option<TypeRef>,
    /// The declaring class of member functions.
    pub class_type: Option<TypeRef>,
    /// The type of `this` for non-static member functions.
    pub this_pointer_type: Option<TypeRef>,
    /// The parameter types.
    pub arguments: Vec<TypeRef>,
    /// The calling convention.
    pub calling_convention: u8,
    /// Function attributes.
    pub attributes: FunctionAttributes,
    /// The adjustment applied to `this`.
    pub this_adjustment: i32,
}

/// The resolved contents of a [`TypeNode`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum NodeKind {
    /// A built-in type.
    Primitive(PrimitiveType),
    /// A class, structure, interface or union.
    Class(ClassNode),
    /// An enumeration.
    Enumeration(EnumerationNode),
    /// A pointer or reference.
    Pointer(PointerNode),
    /// A qualified type.
    Modifier(ModifierNode),
    /// A fixed-size array.
    Array(ArrayNode),
    /// A bitfield.
    Bitfield(BitfieldNode),
    /// A free function signature.
    Procedure(FunctionNode),
    /// A member function signature.
    MemberFunction(FunctionNode),
    /// A record without a dedicated node representation, such as a field list.
    Other {
        /// The leaf code of the record.
        leaf: u16,
    },
}

/// A resolved type.
#[derive(Debug)]
pub struct TypeNode {
    id: NodeId,
    index: TypeIndex,
    kind: NodeKind,
}

impl TypeNode {
    /// The identity of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The index of the record this node was built from.
    ///
    /// For forward references, this is the index of the definition.
    pub fn index(&self) -> TypeIndex {
        self.index
    }

    /// The resolved contents.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The name of a class or enumeration.
    pub fn name(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Class(ref class) => Some(&class.name),
            NodeKind::Enumeration(ref e) => Some(&e.name),
            _ => None,
        }
    }

    /// The class contents, if this node is a class.
    pub fn as_class(&self) -> Option<&ClassNode> {
        match self.kind {
            NodeKind::Class(ref class) => Some(class),
            _ => None,
        }
    }
}

/// A member reached through [`ResolveCache::flatten_members`].
#[derive(Clone, Debug)]
pub struct FlatMember {
    /// The class declaring the member.
    pub owner: NodeId,
    /// The member name.
    pub name: String,
    /// The offset from the start of the flattened class.
    pub offset: u64,
    /// The member type.
    pub ty: TypeRef,
}

#[derive(Debug, Default)]
struct CacheState {
    slots: HashMap<TypeIndex, NodeId>,
    /// `None` marks a node that is being built.
    nodes: Vec<Option<Arc<TypeNode>>>,
}

/// Collects the entries of a chain of field lists.
#[derive(Default)]
struct Fields {
    bases: Vec<BaseClass>,
    members: Vec<Member>,
    static_members: Vec<StaticMember>,
    methods: Vec<Method>,
    nested: Vec<Nested>,
    vtable: Option<TypeRef>,
    variants: Vec<(String, Numeric)>,
}

/// Memoized resolution of type indices into [`TypeNode`]s.
///
/// The cache is safe to share between threads. Concurrent calls for the same index always
/// observe the same node.
pub struct ResolveCache<'t, 'data> {
    types: &'t TypeInformation<'data>,
    state: Mutex<CacheState>,
}

impl<'t, 'data> ResolveCache<'t, 'data> {
    /// Creates an empty cache over the given type stream.
    pub fn new(types: &'t TypeInformation<'data>) -> Self {
        ResolveCache {
            types,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// The type stream this cache resolves against.
    pub fn types(&self) -> &'t TypeInformation<'data> {
        self.types
    }

    /// The number of nodes built so far.
    pub fn len(&self) -> usize {
        self.state.lock().nodes.len()
    }

    /// Returns `true` if nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a type index into its node.
    ///
    /// Indices below the stream's minimum index resolve to primitive types. Forward references to
    /// classes resolve to the node of their definition.
    pub fn resolve(&self, index: TypeIndex) -> Result<Arc<TypeNode>, TypeError> {
        let mut state = self.state.lock();
        let id = self.resolve_locked(&mut state, index)?;
        state
            .nodes
            .get(id.0)
            .and_then(Option::clone)
            .ok_or_else(|| TypeErrorKind::NotFound.into())
    }

    /// Resolves the class definition named `name`.
    pub fn resolve_name(&self, name: &str) -> Result<Arc<TypeNode>, TypeError> {
        let record = self.types.find_class(name)?;
        self.resolve(record.index())
    }

    /// Returns a previously built node.
    pub fn node(&self, id: NodeId) -> Option<Arc<TypeNode>> {
        self.state.lock().nodes.get(id.0).and_then(Option::clone)
    }

    /// Resolves a reference, memoizing the result in the reference itself.
    pub fn follow(&self, reference: &TypeRef) -> Result<Arc<TypeNode>, TypeError> {
        if let Some(node) = reference.resolved().and_then(|id| self.node(id)) {
            return Ok(node);
        }

        let node = self.resolve(reference.index)?;
        let _ = reference.node.set(node.id());
        Ok(node)
    }

    fn resolve_locked(&self, state: &mut CacheState, index: TypeIndex) -> Result<NodeId, TypeError> {
        if let Some(&id) = state.slots.get(&index) {
            return Ok(id);
        }

        if index < self.types.minimum_index() {
            let kind = NodeKind::Primitive(PrimitiveType::from_index(index)?);
            return Ok(Self::insert(state, index, index, kind));
        }

        let record = self.types.get(index)?;
        let data = record.parse()?;

        if let TypeData::Class(ref class) = data {
            if class.properties.is_forward_reference() {
                let unique_name = class.unique_name.map(|name| name.as_bytes());
                let definition = self
                    .types
                    .find_definition(class.name.as_bytes(), unique_name)?;

                tracing::debug!(
                    %index,
                    definition = %definition.index(),
                    name = %class.name,
                    "resolved forward reference"
                );

                let id = self.resolve_locked(state, definition.index())?;
                state.slots.insert(index, id);
                return Ok(id);
            }
        }

        // Reserve the slot so that the node is reachable while it is being built.
        let id = NodeId(state.nodes.len());
        state.nodes.push(None);
        state.slots.insert(index, id);

        match self.build(record.leaf(), &data) {
            Ok(kind) => {
                state.nodes[id.0] = Some(Arc::new(TypeNode { id, index, kind }));
                Ok(id)
            }
            Err(e) => {
                state.slots.remove(&index);
                state.nodes.pop();
                Err(e)
            }
        }
    }

    fn insert(state: &mut CacheState, slot: TypeIndex, index: TypeIndex, kind: NodeKind) -> NodeId {
        let id = NodeId(state.nodes.len());
        state.nodes.push(Some(Arc::new(TypeNode { id, index, kind })));
        state.slots.insert(slot, id);
        id
    }

    fn build(&self, leaf: u16, data: &TypeData<'_>) -> Result<NodeKind, TypeError> {
        Ok(match *data {
            TypeData::Class(ref class) => {
                let fields = match class.fields {
                    Some(fields) => self.collect_fields(fields)?,
                    None => Fields::default(),
                };

                NodeKind::Class(ClassNode {
                    kind: class.kind,
                    name: class.name.to_string_lossy().into_owned(),
                    unique_name: class.unique_name.map(|n| n.to_string_lossy().into_owned()),
                    size: class.size,
                    properties: class.properties,
                    bases: fields.bases,
                    members: fields.members,
                    static_members: fields.static_members,
                    methods: fields.methods,
                    nested: fields.nested,
                    vtable: fields.vtable,
                })
            }
            TypeData::Enumeration(ref e) => {
                let fields = match e.fields {
                    Some(fields) => self.collect_fields(fields)?,
                    None => Fields::default(),
                };

                NodeKind::Enumeration(EnumerationNode {
                    name: e.name.to_string_lossy().into_owned(),
                    unique_name: e.unique_name.map(|n| n.to_string_lossy().into_owned()),
                    properties: e.properties,
                    underlying_type: TypeRef::new(e.underlying_type),
                    variants: fields.variants,
                })
            }
            TypeData::Pointer(ref p) => NodeKind::Pointer(PointerNode {
                pointee: TypeRef::new(p.underlying_type),
                attributes: p.attributes,
                containing_class: p
                    .containing_class
                    .map(|info| TypeRef::new(info.containing_class)),
            }),
            TypeData::Modifier(ref m) => NodeKind::Modifier(ModifierNode {
                underlying_type: TypeRef::new(m.underlying_type),
                attributes: m.attributes,
            }),
            TypeData::Array(ref a) => NodeKind::Array(ArrayNode {
                element_type: TypeRef::new(a.element_type),
                indexing_type: TypeRef::new(a.indexing_type),
                size: a.size,
            }),
            TypeData::Bitfield(ref b) => NodeKind::Bitfield(BitfieldNode {
                underlying_type: TypeRef::new(b.underlying_type),
                length: b.length,
                position: b.position,
            }),
            TypeData::Procedure(ref p) => NodeKind::Procedure(FunctionNode {
                return_type: p.return_type.map(TypeRef::new),
                class_type: None,
                this_pointer_type: None,
                arguments: self.collect_arguments(p.argument_list)?,
                calling_convention: p.calling_convention,
                attributes: p.attributes,
                this_adjustment: 0,
            }),
            TypeData::MemberFunction(ref f) => NodeKind::MemberFunction(FunctionNode {
                return_type: Some(TypeRef::new(f.return_type)),
                class_type: Some(TypeRef::new(f.class_type)),
                this_pointer_type: f.this_pointer_type.map(TypeRef::new),
                arguments: self.collect_arguments(f.argument_list)?,
                calling_convention: f.calling_convention,
                attributes: f.attributes,
                this_adjustment: f.this_adjustment,
            }),
            _ => NodeKind::Other { leaf },
        })
    }

    fn collect_arguments(&self, index: TypeIndex) -> Result<Vec<TypeRef>, TypeError> {
        if !self.types.contains(index) {
            return Ok(Vec::new());
        }

        let record = self.types.get(index)?;
        match record.parse()? {
            TypeData::ArgumentList(list) => {
                Ok(list.arguments.into_iter().map(TypeRef::new).collect())
            }
            _ => Err(TypeErrorKind::UnsupportedLeaf(record.leaf()).into()),
        }
    }

    /// Reads a field list and all of its continuations.
    fn collect_fields(&self, first: TypeIndex) -> Result<Fields, TypeError> {
        let mut fields = Fields::default();
        let mut seen = HashSet::new();
        let mut next = Some(first);

        while let Some(index) = next.take() {
            if !seen.insert(index) {
                break;
            }

            let record = self.types.get(index)?;
            let data = record.parse()?;
            let TypeData::FieldList(list) = data else {
                return Err(TypeErrorKind::UnsupportedLeaf(record.leaf()).into());
            };

            for field in &list.fields {
                match *field {
                    TypeData::Member(ref m) => fields.members.push(Member {
                        name: m.name.to_string_lossy().into_owned(),
                        offset: m.offset,
                        attributes: m.attributes,
                        ty: TypeRef::new(m.field_type),
                    }),
                    TypeData::StaticMember(ref m) => fields.static_members.push(StaticMember {
                        name: m.name.to_string_lossy().into_owned(),
                        attributes: m.attributes,
                        ty: TypeRef::new(m.field_type),
                    }),
                    TypeData::BaseClass(ref b) => fields.bases.push(BaseClass {
                        offset: Some(b.offset),
                        attributes: b.attributes,
                        ty: TypeRef::new(b.base_class),
                    }),
                    TypeData::VirtualBaseClass(ref b) => fields.bases.push(BaseClass {
                        offset: None,
                        attributes: b.attributes,
                        ty: TypeRef::new(b.base_class),
                    }),
                    TypeData::Method(ref m) => fields.methods.push(Method {
                        name: m.name.to_string_lossy().into_owned(),
                        attributes: m.attributes,
                        ty: TypeRef::new(m.method_type),
                        vtable_offset: m.vtable_offset,
                    }),
                    TypeData::OverloadedMethod(ref m) => {
                        let name = m.name.to_string_lossy();
                        let record = self.types.get(m.method_list)?;
                        let TypeData::MethodList(list) = record.parse()? else {
                            return Err(TypeErrorKind::UnsupportedLeaf(record.leaf()).into());
                        };
                        for overload in list.methods {
                            fields.methods.push(Method {
                                name: name.clone().into_owned(),
                                attributes: overload.attributes,
                                ty: TypeRef::new(overload.method_type),
                                vtable_offset: overload.vtable_offset,
                            });
                        }
                    }
                    TypeData::Nested(ref n) => fields.nested.push(Nested {
                        name: n.name.to_string_lossy().into_owned(),
                        ty: TypeRef::new(n.nested_type),
                    }),
                    TypeData::VirtualFunctionTablePointer(ref v) => {
                        fields.vtable = Some(TypeRef::new(v.table));
                    }
                    TypeData::Enumerate(ref e) => fields
                        .variants
                        .push((e.name.to_string_lossy().into_owned(), e.value)),
                    TypeData::Index(continuation) => next = Some(continuation),
                    _ => {}
                }
            }
        }

        Ok(fields)
    }

    /// Returns all data members of a class including inherited ones.
    ///
    /// Members of non-virtual base classes come first, with offsets adjusted to the start of
    /// `node`. Members of virtual bases are omitted since their offset is only known at runtime.
    /// A base class already being flattened, as in corrupt cyclic hierarchies, is skipped.
    pub fn flatten_members(&self, node: &TypeNode) -> Result<Vec<FlatMember>, TypeError> {
        let mut members = Vec::new();
        let mut visiting = HashSet::new();
        self.flatten_into(node, 0, &mut visiting, &mut members)?;
        Ok(members)
    }

    fn flatten_into(
        &self,
        node: &TypeNode,
        base_offset: u64,
        visiting: &mut HashSet<NodeId>,
        out: &mut Vec<FlatMember>,
    ) -> Result<(), TypeError> {
        let Some(class) = node.as_class() else {
            return Ok(());
        };
        if !visiting.insert(node.id()) {
            return Ok(());
        }

        for base in &class.bases {
            if let Some(offset) = base.offset {
                let base_node = self.follow(&base.ty)?;
                self.flatten_into(&base_node, base_offset + offset, visiting, out)?;
            }
        }

        out.extend(class.members.iter().map(|member| FlatMember {
            owner: node.id(),
            name: member.name.clone(),
            offset: base_offset + member.offset,
            ty: member.ty.clone(),
        }));

        visiting.remove(&node.id());
        Ok(())
    }

    /// The size of a value of the given type in bytes, if known.
    pub fn size_of(&self, index: TypeIndex) -> Result<Option<u64>, TypeError> {
        let mut visiting = HashSet::new();
        self.size_of_inner(index, &mut visiting)
    }

    fn size_of_inner(
        &self,
        index: TypeIndex,
        visiting: &mut HashSet<TypeIndex>,
    ) -> Result<Option<u64>, TypeError> {
        if !visiting.insert(index) {
            return Ok(None);
        }

        let node = self.resolve(index)?;
        let size = match node.kind {
            NodeKind::Primitive(primitive) => primitive.size().map(u64::from),
            NodeKind::Class(ref class) => Some(class.size),
            NodeKind::Enumeration(ref e) => self.size_of_inner(e.underlying_type.index, visiting)?,
            NodeKind::Pointer(ref p) => Some(u64::from(p.attributes.size())),
            NodeKind::Modifier(ref m) => self.size_of_inner(m.underlying_type.index, visiting)?,
            NodeKind::Array(ref a) => Some(a.size),
            _ => None,
        };

        visiting.remove(&index);
        Ok(size)
    }

    /// Renders a C-like name for the given type.
    ///
    /// Cycles through pointers and qualifiers, which only occur in corrupt data, render as `...`.
    pub fn type_name(&self, index: TypeIndex) -> Result<String, TypeError> {
        let mut name = String::new();
        let mut visiting = HashSet::new();
        self.write_type_name(index, &mut visiting, &mut name)?;
        Ok(name)
    }

    fn write_type_name(
        &self,
        index: TypeIndex,
        visiting: &mut HashSet<TypeIndex>,
        out: &mut String,
    ) -> Result<(), TypeError> {
        if !visiting.insert(index) {
            out.push_str("...");
            return Ok(());
        }

        let node = self.resolve(index)?;
        match node.kind {
            NodeKind::Primitive(primitive) => {
                let _ = write!(out, "{primitive}");
            }
            NodeKind::Class(ref class) => out.push_str(&class.name),
            NodeKind::Enumeration(ref e) => out.push_str(&e.name),
            NodeKind::Pointer(ref p) => {
                self.write_type_name(p.pointee.index, visiting, out)?;
                out.push_str(match p.attributes.mode() {
                    PointerMode::LValueReference => "&",
                    PointerMode::RValueReference => "&&",
                    _ => "*",
                });
                if p.attributes.is_const() {
                    out.push_str(" const");
                }
            }
            NodeKind::Modifier(ref m) => {
                if m.attributes.is_const() {
                    out.push_str("const ");
                }
                if m.attributes.is_volatile() {
                    out.push_str("volatile ");
                }
                self.write_type_name(m.underlying_type.index, visiting, out)?;
            }
            NodeKind::Array(ref a) => {
                self.write_type_name(a.element_type.index, visiting, out)?;
                match self.size_of(a.element_type.index)? {
                    Some(element) if element > 0 => {
                        let _ = write!(out, "[{}]", a.size / element);
                    }
                    _ => out.push_str("[]"),
                }
            }
            NodeKind::Bitfield(ref b) => {
                self.write_type_name(b.underlying_type.index, visiting, out)?;
                let _ = write!(out, " : {}", b.length);
            }
            NodeKind::Procedure(ref f) | NodeKind::MemberFunction(ref f) => {
                match f.return_type {
                    Some(ref ret) => self.write_type_name(ret.index, visiting, out)?,
                    None => out.push_str("void"),
                }
                out.push('(');
                for (i, arg) in f.arguments.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type_name(arg.index, visiting, out)?;
                }
                out.push(')');
            }
            NodeKind::Other { leaf } => {
                let _ = write!(out, "<leaf {leaf:#x}>");
            }
        }

        visiting.remove(&index);
        Ok(())
    }
}

impl std::fmt::Debug for ResolveCache<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveCache")
            .field("nodes", &self.len())
            .finish()
    }
}
