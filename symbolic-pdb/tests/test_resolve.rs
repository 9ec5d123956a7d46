use std::sync::Arc;

use similar_asserts::assert_eq;
use symbolic_pdb::resolve::FlatMember;
use symbolic_pdb::tpi::leaf::*;
use symbolic_pdb::tpi::{hash_name, ClassKind, Numeric, PrimitiveKind};
use symbolic_pdb::{NodeKind, Pdb, ResolveCache, TypeErrorKind, TypeIndex};
use symbolic_testutils::{
    build_pdb, FieldListBuilder, PdbInfoBuilder, RecordBuilder, TypeStreamBuilder,
};

const PUBLIC: u16 = 3;
const INTRO_VIRTUAL: u16 = PUBLIC | (4 << 2);
const FORWARD_REF: u16 = 0x80;
const POINTER_64: u32 = 0x0c | (8 << 13);

fn structure(count: u16, properties: u16, fields: u32, size: u64, name: &str) -> Vec<u8> {
    RecordBuilder::new(LF_STRUCTURE)
        .u16(count)
        .u16(properties)
        .u32(fields)
        .u32(0)
        .u32(0)
        .numeric(size)
        .cstring(name)
        .build()
}

fn pointer(pointee: u32, attributes: u32) -> Vec<u8> {
    RecordBuilder::new(LF_POINTER)
        .u32(pointee)
        .u32(attributes)
        .build()
}

fn build(types: &TypeStreamBuilder) -> Vec<u8> {
    build_pdb(4096, &PdbInfoBuilder::default(), types, |name| hash_name(name))
}

fn member_names(members: &[FlatMember]) -> Vec<(&str, u64)> {
    members
        .iter()
        .map(|member| (member.name.as_str(), member.offset))
        .collect()
}

#[test]
fn test_resolve_yolo() {
    let mut types = TypeStreamBuilder::new();
    let fields = FieldListBuilder::new()
        .member(PUBLIC, 0x74, 0, "x")
        .member(PUBLIC, 0x40, 4, "y")
        .member(PUBLIC, 0x641, 8, "z")
        .build();
    let fields = types.add(fields, None);
    types.add(structure(3, 0, fields, 16, "Yolo"), Some("Yolo"));

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    let yolo = cache.resolve_name("Yolo").unwrap();
    assert_eq!(yolo.index(), TypeIndex(0x1001));
    assert_eq!(yolo.name(), Some("Yolo"));

    let class = yolo.as_class().unwrap();
    assert_eq!(class.kind, ClassKind::Struct);
    assert_eq!(class.size, 16);
    assert_eq!(class.members.len(), 3);

    let x = cache.follow(&class.members[0].ty).unwrap();
    match x.kind() {
        NodeKind::Primitive(primitive) => assert_eq!(primitive.kind, PrimitiveKind::I32),
        other => panic!("unexpected node {other:?}"),
    }
    assert_eq!(class.members[0].ty.resolved(), Some(x.id()));

    let names: Vec<_> = class
        .members
        .iter()
        .map(|member| cache.type_name(member.ty.index()).unwrap())
        .collect();
    assert_eq!(names, vec!["int", "float", "double*"]);

    let flat = cache.flatten_members(&yolo).unwrap();
    assert_eq!(member_names(&flat), vec![("x", 0), ("y", 4), ("z", 8)]);
    assert_eq!(cache.size_of(TypeIndex(0x1001)).unwrap(), Some(16));
    assert_eq!(cache.size_of(TypeIndex(0x641)).unwrap(), Some(8));
}

/// A linked list node referenced through a forward declaration.
fn linked_list() -> TypeStreamBuilder {
    let mut types = TypeStreamBuilder::new();
    let forward = types.add(structure(0, FORWARD_REF, 0, 0, "Node"), Some("Node"));
    let ptr = types.add(pointer(forward, POINTER_64), None);
    let fields = FieldListBuilder::new()
        .member(PUBLIC, ptr, 0, "next")
        .member(PUBLIC, 0x74, 8, "value")
        .build();
    let fields = types.add(fields, None);
    types.add(structure(2, 0, fields, 16, "Node"), Some("Node"));
    types
}

#[test]
fn test_forward_reference_identity() {
    let data = build(&linked_list());
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    let forward = cache.resolve(TypeIndex(0x1000)).unwrap();
    let definition = cache.resolve(TypeIndex(0x1003)).unwrap();
    assert!(Arc::ptr_eq(&forward, &definition));
    assert_eq!(forward.id(), definition.id());
    assert_eq!(forward.index(), TypeIndex(0x1003));

    let by_name = cache.resolve_name("Node").unwrap();
    assert_eq!(by_name.id(), definition.id());

    // next -> Node* -> Node closes the cycle on the same node.
    let class = definition.as_class().unwrap();
    let next = cache.follow(&class.members[0].ty).unwrap();
    let NodeKind::Pointer(pointer) = next.kind() else {
        panic!("expected a pointer");
    };
    let pointee = cache.follow(&pointer.pointee).unwrap();
    assert_eq!(pointee.id(), definition.id());

    assert_eq!(cache.type_name(TypeIndex(0x1001)).unwrap(), "Node*");
    assert_eq!(cache.size_of(TypeIndex(0x1001)).unwrap(), Some(8));
}

#[test]
fn test_resolve_is_memoized() {
    let data = build(&linked_list());
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);
    assert!(cache.is_empty());

    let first = cache.resolve(TypeIndex(0x1003)).unwrap();
    let nodes = cache.len();
    let second = cache.resolve(TypeIndex(0x1003)).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), nodes);
    assert!(cache.node(first.id()).is_some());
}

#[test]
fn test_resolve_concurrently() {
    let data = build(&linked_list());
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    let ids: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = &cache;
                let index = if i % 2 == 0 { 0x1000 } else { 0x1003 };
                scope.spawn(move || cache.resolve(TypeIndex(index)).unwrap().id())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_forward_reference_without_definition() {
    let mut types = TypeStreamBuilder::new();
    types.add(structure(0, FORWARD_REF, 0, 0, "Opaque"), Some("Opaque"));
    types.add(pointer(0x1000, POINTER_64), None);

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    let err = cache.resolve(TypeIndex(0x1000)).unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::NotFound);
    assert!(cache.is_empty());

    // The pointer itself resolves, only following it fails.
    let ptr = cache.resolve(TypeIndex(0x1001)).unwrap();
    let NodeKind::Pointer(pointer) = ptr.kind() else {
        panic!("expected a pointer");
    };
    let err = cache.follow(&pointer.pointee).unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::NotFound);
}

#[test]
fn test_unsupported_primitive() {
    let data = build(&linked_list());
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    let err = cache.resolve(TypeIndex(0x0f)).unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::UnsupportedPrimitive(0x0f));
}

#[test]
fn test_flatten_inherited_members() {
    let mut types = TypeStreamBuilder::new();
    let base_fields = types.add(
        FieldListBuilder::new()
            .member(PUBLIC, 0x74, 0, "a")
            .member(PUBLIC, 0x74, 4, "b")
            .build(),
        None,
    );
    let base = types.add(structure(2, 0, base_fields, 8, "Base"), Some("Base"));
    let derived_fields = types.add(
        FieldListBuilder::new()
            .vtable(0x603)
            .base_class(PUBLIC, base, 8)
            .member(PUBLIC, 0x41, 16, "c")
            .build(),
        None,
    );
    let derived = types.add(
        structure(3, 0, derived_fields, 24, "Derived"),
        Some("Derived"),
    );

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    let node = cache.resolve(TypeIndex(derived)).unwrap();
    let class = node.as_class().unwrap();
    assert_eq!(class.bases.len(), 1);
    assert_eq!(class.bases[0].offset, Some(8));
    assert!(class.vtable.is_some());

    let flat = cache.flatten_members(&node).unwrap();
    assert_eq!(member_names(&flat), vec![("a", 8), ("b", 12), ("c", 16)]);

    let base_node = cache.resolve(TypeIndex(base)).unwrap();
    assert_eq!(flat[0].owner, base_node.id());
    assert_eq!(flat[2].owner, node.id());
}

#[test]
fn test_field_list_continuation() {
    let mut types = TypeStreamBuilder::new();
    let tail = types.add(FieldListBuilder::new().member(PUBLIC, 0x74, 4, "b").build(), None);
    let head = types.add(
        FieldListBuilder::new()
            .member(PUBLIC, 0x74, 0, "a")
            .continuation(tail)
            .build(),
        None,
    );
    types.add(structure(2, 0, head, 8, "Split"), Some("Split"));

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    let node = cache.resolve_name("Split").unwrap();
    let names: Vec<_> = node
        .as_class()
        .unwrap()
        .members
        .iter()
        .map(|member| member.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_methods() {
    let mut types = TypeStreamBuilder::new();
    let forward = types.add(structure(0, FORWARD_REF, 0, 0, "Widget"), Some("Widget"));
    let this = types.add(pointer(forward, POINTER_64), None);
    let args = types.add(RecordBuilder::new(LF_ARGLIST).u32(1).u32(0x74).build(), None);
    let no_args = types.add(RecordBuilder::new(LF_ARGLIST).u32(0).build(), None);

    let member_function = |args: u32| {
        RecordBuilder::new(LF_MFUNCTION)
            .u32(0x03)
            .u32(forward)
            .u32(this)
            .u8(0)
            .u8(0)
            .u16(0)
            .u32(args)
            .u32(0)
            .build()
    };
    let resize = types.add(member_function(args), None);
    let clear = types.add(member_function(no_args), None);

    let overloads = types.add(
        RecordBuilder::new(LF_METHODLIST)
            .u16(PUBLIC)
            .u16(0)
            .u32(resize)
            .u16(INTRO_VIRTUAL)
            .u16(0)
            .u32(clear)
            .u32(8)
            .build(),
        None,
    );
    let fields = types.add(
        FieldListBuilder::new()
            .member(PUBLIC, 0x74, 0, "size")
            .overloaded_method(2, overloads, "resize")
            .method(INTRO_VIRTUAL, clear, Some(16), "clear")
            .nested(0x1000, "Self")
            .static_member(PUBLIC, 0x74, "instances")
            .build(),
        None,
    );
    let widget = types.add(structure(5, 0, fields, 4, "Widget"), Some("Widget"));

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    let node = cache.resolve(TypeIndex(widget)).unwrap();
    let class = node.as_class().unwrap();

    let methods: Vec<_> = class
        .methods
        .iter()
        .map(|method| (method.name.as_str(), method.ty.index().0, method.vtable_offset))
        .collect();
    assert_eq!(
        methods,
        vec![
            ("resize", resize, None),
            ("resize", clear, Some(8)),
            ("clear", clear, Some(16)),
        ]
    );
    assert_eq!(class.nested[0].name, "Self");
    assert_eq!(class.static_members[0].name, "instances");

    assert_eq!(cache.type_name(TypeIndex(resize)).unwrap(), "void(int)");
    assert_eq!(cache.type_name(TypeIndex(clear)).unwrap(), "void()");

    let function = cache.resolve(TypeIndex(resize)).unwrap();
    let NodeKind::MemberFunction(function) = function.kind() else {
        panic!("expected a member function");
    };
    let class_type = cache.follow(function.class_type.as_ref().unwrap()).unwrap();
    assert_eq!(class_type.id(), node.id());
}

#[test]
fn test_enumeration() {
    let mut types = TypeStreamBuilder::new();
    let fields = types.add(
        FieldListBuilder::new()
            .enumerate(PUBLIC, 0, "Red")
            .enumerate(PUBLIC, 1, "Green")
            .build(),
        None,
    );
    let color = types.add(
        RecordBuilder::new(LF_ENUM)
            .u16(2)
            .u16(0)
            .u32(0x74)
            .u32(fields)
            .cstring("Color")
            .build(),
        Some("Color"),
    );

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    let node = cache.resolve(TypeIndex(color)).unwrap();
    let NodeKind::Enumeration(e) = node.kind() else {
        panic!("expected an enumeration");
    };
    assert_eq!(e.name, "Color");
    assert_eq!(
        e.variants,
        vec![
            ("Red".to_owned(), Numeric::U16(0)),
            ("Green".to_owned(), Numeric::U16(1)),
        ]
    );
    assert_eq!(cache.size_of(TypeIndex(color)).unwrap(), Some(4));
    assert_eq!(cache.type_name(TypeIndex(color)).unwrap(), "Color");
}

#[test]
fn test_type_names() {
    let mut types = TypeStreamBuilder::new();
    let const_int = types.add(
        RecordBuilder::new(LF_MODIFIER).u32(0x74).u16(1).build(),
        None,
    );
    let array = types.add(
        RecordBuilder::new(LF_ARRAY)
            .u32(0x74)
            .u32(0x23)
            .numeric(16)
            .cstring("")
            .build(),
        None,
    );
    let reference = types.add(pointer(const_int, POINTER_64 | (1 << 5)), None);
    let bitfield = types.add(
        RecordBuilder::new(LF_BITFIELD).u32(0x75).u8(3).u8(2).build(),
        None,
    );
    let args = types.add(
        RecordBuilder::new(LF_ARGLIST).u32(2).u32(reference).u32(0x670).build(),
        None,
    );
    let procedure = types.add(
        RecordBuilder::new(LF_PROCEDURE)
            .u32(0x74)
            .u8(0)
            .u8(0)
            .u16(2)
            .u32(args)
            .build(),
        None,
    );

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    assert_eq!(cache.type_name(TypeIndex(const_int)).unwrap(), "const int");
    assert_eq!(cache.type_name(TypeIndex(array)).unwrap(), "int[4]");
    assert_eq!(cache.type_name(TypeIndex(reference)).unwrap(), "const int&");
    assert_eq!(cache.type_name(TypeIndex(bitfield)).unwrap(), "unsigned int : 3");
    assert_eq!(
        cache.type_name(TypeIndex(procedure)).unwrap(),
        "int(const int&, char*)"
    );
    assert_eq!(cache.size_of(TypeIndex(array)).unwrap(), Some(16));
    assert_eq!(cache.size_of(TypeIndex(const_int)).unwrap(), Some(4));
}

#[test]
fn test_cyclic_pointer() {
    // A pointer to itself only occurs in corrupt data.
    let mut types = TypeStreamBuilder::new();
    types.add(pointer(0x1000, POINTER_64), None);

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    let cache = ResolveCache::new(&types);

    assert_eq!(cache.type_name(TypeIndex(0x1000)).unwrap(), "...*");
}
