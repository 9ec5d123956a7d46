use similar_asserts::assert_eq;
use symbolic_pdb::tpi::leaf::*;
use symbolic_pdb::tpi::{hash_name, ClassKind, Numeric};
use symbolic_pdb::{Pdb, TypeData, TypeErrorKind, TypeIndex};
use symbolic_testutils::{
    build_pdb, FieldListBuilder, MsfBuilder, PdbInfoBuilder, RecordBuilder, TypeStreamBuilder,
};

const PUBLIC: u16 = 3;
const FORWARD_REF: u16 = 0x80;

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

fn build(types: &TypeStreamBuilder) -> Vec<u8> {
    build_pdb(4096, &PdbInfoBuilder::default(), types, |name| hash_name(name))
}

fn yolo() -> TypeStreamBuilder {
    let mut types = TypeStreamBuilder::new();
    let fields = FieldListBuilder::new()
        .member(PUBLIC, 0x74, 0, "x")
        .member(PUBLIC, 0x40, 4, "y")
        .member(PUBLIC, 0x641, 8, "z")
        .build();
    let fields = types.add(fields, None);
    types.add(structure(3, 0, fields, 16, "Yolo"), Some("Yolo"));
    types
}

/// Many small records spread over several pages, with frequent offset samples.
fn many(count: u32) -> TypeStreamBuilder {
    let mut types = TypeStreamBuilder::new();
    types.sample_interval(Some(256));
    for i in 0..count {
        let name = format!("T{i}");
        types.add(structure(0, 0, 0, u64::from(i % 64), &name), Some(&name));
    }
    types
}

#[test]
fn test_header() {
    let data = build(&yolo());
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    assert_eq!(types.minimum_index(), TypeIndex(0x1000));
    assert_eq!(types.maximum_index(), TypeIndex(0x1002));
    assert_eq!(types.len(), 2);
    assert_eq!(types.version(), 20040203);
    assert_eq!(types.hash_stream(), Some(5));
    assert_eq!(types.hash_index().map(|hash| hash.bucket_count()), Some(4096));
}

#[test]
fn test_get_structure() {
    let data = build(&yolo());
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    let record = types.get(TypeIndex(0x1001)).unwrap();
    assert_eq!(record.leaf(), LF_STRUCTURE);

    let TypeData::Class(class) = record.parse().unwrap() else {
        panic!("expected a structure");
    };
    assert_eq!(class.kind, ClassKind::Struct);
    assert_eq!(class.name.to_string(), "Yolo");
    assert_eq!(class.count, 3);
    assert_eq!(class.size, 16);
    assert_eq!(class.fields, Some(TypeIndex(0x1000)));
    assert!(!class.properties.is_forward_reference());
}

#[test]
fn test_get_field_list() {
    let data = build(&yolo());
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    let record = types.get(TypeIndex(0x1000)).unwrap();
    let TypeData::FieldList(list) = record.parse().unwrap() else {
        panic!("expected a field list");
    };

    let members: Vec<_> = list
        .fields
        .iter()
        .map(|field| match field {
            TypeData::Member(member) => (member.name.to_string(), member.field_type, member.offset),
            other => panic!("unexpected field {other:?}"),
        })
        .collect();

    assert_eq!(
        members,
        vec![
            ("x".to_owned(), TypeIndex(0x74), 0),
            ("y".to_owned(), TypeIndex(0x40), 4),
            ("z".to_owned(), TypeIndex(0x641), 8),
        ]
    );
    assert_eq!(list.continuation(), None);
}

#[test]
fn test_index_bounds() {
    let data = build(&yolo());
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    let err = types.get(TypeIndex(0x1002)).unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::TypeIndexOutOfRange(TypeIndex(0x1002)));

    let err = types.get(TypeIndex(0x74)).unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::PrimitiveIndex(TypeIndex(0x74)));
}

#[test]
fn test_iter_matches_get() {
    let data = build(&many(1500));
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    let samples = types.hash_index().unwrap().samples();
    assert!(samples.len() > 10);

    let records = types.iter().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(records.len(), 1500);

    for record in &records {
        assert_eq!(&types.get(record.index()).unwrap(), record);
    }

    // Boundaries and the exact positions of samples, where an off-by-one would show.
    let mut probes = vec![TypeIndex(0x1000), TypeIndex(0x1000 + 1499)];
    probes.extend(samples.iter().map(|sample| sample.index));
    probes.extend(samples.iter().map(|sample| TypeIndex(sample.index.0 - 1)));
    for index in probes.into_iter().filter(|&index| types.contains(index)) {
        let record = types.get(index).unwrap();
        assert_eq!(record, records[(index.0 - 0x1000) as usize]);
    }
}

#[test]
fn test_iter_from() {
    let data = build(&many(300));
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    let tail = types
        .iter_from(TypeIndex(0x1000 + 290))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(tail.len(), 10);
    assert_eq!(tail[0].index(), TypeIndex(0x1000 + 290));
    assert_eq!(tail[9].index(), TypeIndex(0x1000 + 299));
}

#[test]
fn test_without_samples() {
    let mut types = many(200);
    types.sample_interval(None);
    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    assert!(types.hash_index().unwrap().samples().is_empty());
    let record = types.get(TypeIndex(0x1000 + 150)).unwrap();
    let TypeData::Class(class) = record.parse().unwrap() else {
        panic!("expected a structure");
    };
    assert_eq!(class.name.to_string(), "T150");
}

#[test]
fn test_bucket_lookup() {
    let data = build(&many(1000));
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    for i in 0..1000 {
        let name = format!("T{i}");
        let index = TypeIndex(0x1000 + i);
        let candidates: Vec<_> = types.lookup_candidates(&name).unwrap().collect();
        assert!(candidates.contains(&index), "{name} not in its bucket");

        let found = types.find_by_name(&name).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index(), index);
    }

    assert!(types.find_by_name("T1000").unwrap().is_empty());
}

#[test]
fn test_find_class_skips_forward_reference() {
    let mut types = TypeStreamBuilder::new();
    types.add(structure(0, FORWARD_REF, 0, 0, "Yolo"), Some("Yolo"));
    let fields = types.add(FieldListBuilder::new().member(PUBLIC, 0x74, 0, "x").build(), None);
    let definition = types.add(structure(1, 0, fields, 4, "Yolo"), Some("Yolo"));

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    let found = types.find_by_name("Yolo").unwrap();
    let indices: Vec<_> = found.iter().map(|record| record.index()).collect();
    assert_eq!(indices, vec![TypeIndex(0x1000), TypeIndex(definition)]);

    let class = types.find_class("Yolo").unwrap();
    assert_eq!(class.index(), TypeIndex(definition));

    let err = types.find_class("Missing").unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::NotFound);
}

#[test]
fn test_find_class_skips_undecodable_collisions() {
    let mut types = TypeStreamBuilder::new();
    // A member pointer of an unsupported kind, hashed into the same bucket.
    let pointer = RecordBuilder::new(LF_POINTER)
        .u32(0x74)
        .u32(0x0a | (3 << 5))
        .bytes(&[0; 8])
        .build();
    types.add(pointer, Some("Yolo"));
    // A structure with trailing bytes that are not padding.
    let broken = RecordBuilder::new(LF_STRUCTURE)
        .u16(0)
        .u16(0)
        .u32(0)
        .u32(0)
        .u32(0)
        .numeric(4)
        .cstring("Yolo")
        .bytes(b"AA")
        .build();
    types.add(broken, Some("Yolo"));
    let fields = types.add(FieldListBuilder::new().member(PUBLIC, 0x74, 0, "x").build(), None);
    let definition = types.add(structure(1, 0, fields, 4, "Yolo"), Some("Yolo"));

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    assert!(types.get(TypeIndex(0x1000)).unwrap().parse().is_err());
    assert!(types.get(TypeIndex(0x1001)).unwrap().parse().is_err());

    let class = types.find_class("Yolo").unwrap();
    assert_eq!(class.index(), TypeIndex(definition));

    let found = types.find_by_name("Yolo").unwrap();
    let indices: Vec<_> = found.iter().map(|record| record.index()).collect();
    assert_eq!(indices, vec![TypeIndex(definition)]);
}

#[test]
fn test_no_hash_stream() {
    let mut types = yolo();
    types.hash_stream(0xffff);
    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    assert_eq!(types.hash_stream(), None);
    assert!(types.hash_index().is_none());

    let err = types.lookup_candidates("Yolo").err().unwrap();
    assert_eq!(err.kind(), TypeErrorKind::MissingHashIndex);

    // Name lookups fall back to a scan.
    assert_eq!(types.find_class("Yolo").unwrap().index(), TypeIndex(0x1001));
}

#[test]
fn test_absent_hash_stream() {
    let mut types = yolo();
    types.hash_stream(7);
    let streams = types.build(|name| hash_name(name));

    let mut msf = MsfBuilder::new(4096);
    msf.add_stream(Vec::new());
    msf.add_stream(PdbInfoBuilder::default().build());
    msf.add_stream(streams.tpi);
    let data = msf.build();

    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();
    assert_eq!(types.hash_stream(), Some(7));
    assert!(types.hash_index().is_none());
    assert_eq!(types.get(TypeIndex(0x1001)).unwrap().leaf(), LF_STRUCTURE);
}

#[test]
fn test_unsupported_hash_key_size() {
    let mut types = yolo();
    types.hash_key_size(2);
    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();

    let err = pdb.type_information().unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::UnsupportedHashKeySize(2));
}

#[test]
fn test_unsupported_hash_adjustments() {
    let mut types = yolo();
    types.hash_adjustments(vec![0; 8]);
    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();

    let err = pdb.type_information().unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::UnsupportedHashAdjustments);
}

#[test]
fn test_record_underrun() {
    let mut types = TypeStreamBuilder::new();
    // A modifier is six bytes, followed here by two bytes that are not padding.
    let modifier = RecordBuilder::new(LF_MODIFIER)
        .u32(0x74)
        .u16(1)
        .bytes(&[0, 0])
        .unpadded()
        .build();
    types.add(modifier, None);

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    let record = types.get(TypeIndex(0x1000)).unwrap();
    let err = record.parse().unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::RecordUnderrun { end: 8, offset: 6 });
}

#[test]
fn test_unsupported_leaf_is_skipped() {
    let mut types = TypeStreamBuilder::new();
    types.add(RecordBuilder::new(0x1602).u32(0).u32(0).cstring("Yolo").build(), Some("Yolo"));
    let fields = types.add(FieldListBuilder::new().build(), None);
    types.add(structure(0, 0, fields, 0, "Yolo"), Some("Yolo"));

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    let err = types.get(TypeIndex(0x1000)).unwrap().parse().unwrap_err();
    assert_eq!(err.kind(), TypeErrorKind::UnsupportedLeaf(0x1602));

    let found = types.find_by_name("Yolo").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].index(), TypeIndex(0x1002));
}

#[test]
fn test_enumeration() {
    let mut types = TypeStreamBuilder::new();
    let fields = FieldListBuilder::new()
        .enumerate(PUBLIC, 0, "Red")
        .enumerate(PUBLIC, 0x1_0000, "Green")
        .build();
    let fields = types.add(fields, None);
    let record = RecordBuilder::new(LF_ENUM)
        .u16(2)
        .u16(0)
        .u32(0x74)
        .u32(fields)
        .cstring("Color")
        .build();
    types.add(record, Some("Color"));

    let data = build(&types);
    let pdb = Pdb::parse(&data).unwrap();
    let types = pdb.type_information().unwrap();

    let item = types.get(TypeIndex(0x1000)).unwrap();
    let TypeData::FieldList(list) = item.parse().unwrap() else {
        panic!("expected a field list");
    };
    let values: Vec<_> = list
        .fields
        .iter()
        .map(|field| match field {
            TypeData::Enumerate(e) => (e.name.to_string(), e.value),
            other => panic!("unexpected field {other:?}"),
        })
        .collect();
    assert_eq!(
        values,
        vec![
            ("Red".to_owned(), Numeric::U16(0)),
            ("Green".to_owned(), Numeric::U32(0x1_0000)),
        ]
    );

    let record = types.find_by_name("Color").unwrap();
    assert!(matches!(record[0].parse().unwrap(), TypeData::Enumeration(_)));
}
