use crate::config::{Checkpoints, Options};
use crate::de::Deserializer;
use crate::error::{DecodeError, Error, Status};
use crate::ser::Serializer;
use crate::tag::ViewKind;
use crate::value::{Exception, ObjectRef, Property, RegExpFlags, Value};

fn arbitrary_value<T>() -> T
where
    T: for<'x> ::arbitrary::Arbitrary<'x>,
{
    let bytes = Vec::from_iter(std::iter::repeat_with(::rand::random::<u8>).take(1024));
    <T as ::arbitrary::Arbitrary>::arbitrary(&mut ::arbitrary::Unstructured::new(&bytes))
        .unwrap_or_else(|e| {
            panic!(
                "failed to generate arbitrary value of type {}: {e}",
                std::any::type_name::<T>()
            )
        })
}

fn round_trip(given: &Value) -> Value {
    let out = crate::serialize(given, &[]).unwrap();
    Deserializer::new(&out.bytes, out.transferred)
        .try_deserialize()
        .unwrap()
}

fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
    Deserializer::new(bytes, Vec::new()).try_deserialize()
}

fn obj(value: &Value) -> &ObjectRef {
    value.as_object().expect("expected an object")
}

fn prop(value: &Value, name: &str) -> Value {
    obj(value).get(name).unwrap().expect("missing property")
}

macro_rules! assert_round_trip {
    ($($val:expr),* $(,)?) => {
        $({
            let given: Value = $val.into();
            let decoded = round_trip(&given);
            assert!(given.deep_equals(&decoded), "{:?} decoded as {:?}", given, decoded);
        })*
    };
}

#[test]
fn test_primitive_round_trips() {
    assert_round_trip!(
        Value::Undefined,
        Value::Null,
        true,
        false,
        0i32,
        i32::MIN,
        i32::MAX,
        u32::MAX,
        0.5f64,
        f64::NAN,
        f64::INFINITY,
        f64::MIN,
        "",
        "héllo",
        "日本語",
        "emoji 🦀",
    );
}

#[test]
fn test_exact_object_encoding() {
    let o = ObjectRef::plain();
    o.set("a", 1i32);
    let out = crate::serialize(&o.into(), &[]).unwrap();
    assert_eq!(
        out.bytes,
        vec![0xff, 1, b'?', 0, b'o', b'?', 1, b'S', 1, b'a', b'?', 1, b'I', 2, b'{', 1]
    );
}

#[test]
fn test_negative_int_uses_zigzag() {
    let out = crate::serialize(&Value::Int32(-1), &[]).unwrap();
    assert_eq!(out.bytes, vec![0xff, 1, b'?', 0, b'I', 1]);
}

#[derive(Debug, ::arbitrary::Arbitrary)]
enum Tree {
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Uint(u32),
    Num(f64),
    Str(String),
    List(Vec<Tree>),
    Map(Vec<(String, Tree)>),
}

impl Tree {
    fn build(&self) -> Value {
        match self {
            Tree::Undefined => Value::Undefined,
            Tree::Null => Value::Null,
            Tree::Bool(b) => Value::Bool(*b),
            Tree::Int(v) => Value::Int32(*v),
            Tree::Uint(v) => Value::Uint32(*v),
            Tree::Num(v) => Value::Number(*v),
            Tree::Str(s) => Value::string(s),
            Tree::List(items) => {
                let array = ObjectRef::array(0);
                for (i, item) in items.iter().enumerate() {
                    array.set_index(i as u32, item.build());
                }
                array.into()
            }
            Tree::Map(entries) => {
                let object = ObjectRef::plain();
                for (k, v) in entries {
                    object.set(k, v.build());
                }
                object.into()
            }
        }
    }
}

#[test]
fn test_arbitrary_tree_round_trips() {
    for _ in 0..200 {
        let tree: Tree = arbitrary_value();
        assert_round_trip!(tree.build());
    }
}

#[test]
fn test_shared_references_keep_identity() {
    let shared = ObjectRef::plain();
    shared.set("x", 1i32);
    let root = ObjectRef::plain();
    root.set("a", shared.clone());
    root.set("b", shared);

    let decoded = round_trip(&root.clone().into());
    let a = prop(&decoded, "a");
    let b = prop(&decoded, "b");
    assert!(obj(&a).ptr_eq(obj(&b)));
    assert!(Value::from(root).deep_equals(&decoded));
}

#[test]
fn test_self_cycle() {
    let a = ObjectRef::plain();
    a.set("self", a.clone());
    let decoded = round_trip(&a.clone().into());
    let inner = prop(&decoded, "self");
    assert!(obj(&inner).ptr_eq(obj(&decoded)));
    assert!(Value::from(a).deep_equals(&decoded));
}

#[test]
fn test_cycle_through_array() {
    let array = ObjectRef::array(0);
    let o = ObjectRef::plain();
    o.set("owner", array.clone());
    array.set_index(0, o);
    array.set_index(1, array.clone());

    let decoded = round_trip(&array.into());
    let first = obj(&decoded).get_index(0).unwrap();
    let back = prop(&first, "owner");
    assert!(obj(&back).ptr_eq(obj(&decoded)));
    let second = obj(&decoded).get_index(1).unwrap();
    assert!(obj(&second).ptr_eq(obj(&decoded)));
}

fn array_with_present(length: u32, present: u32) -> ObjectRef {
    let array = ObjectRef::array(length);
    for i in 0..present {
        array.set_index(i * (length / present), Value::Int32(i as i32));
    }
    array
}

#[test]
fn test_dense_sparse_boundary() {
    let mostly_full = ObjectRef::array(100);
    for i in 0..90 {
        mostly_full.set_index(i, Value::Int32(i as i32));
    }
    let out = crate::serialize(&mostly_full.clone().into(), &[]).unwrap();
    assert!(out.bytes.ends_with(&[b'$', 0, 100]), "{:?}", out.bytes);
    let decoded = crate::deserialize(&out.bytes, out.transferred);
    assert!(Value::from(mostly_full).deep_equals(&decoded));

    let mostly_empty = array_with_present(100, 10);
    let out = crate::serialize(&mostly_empty.clone().into(), &[]).unwrap();
    assert!(out.bytes.ends_with(&[b'@', 10, 100]), "{:?}", out.bytes);
    let decoded = crate::deserialize(&out.bytes, out.transferred);
    assert!(Value::from(mostly_empty).deep_equals(&decoded));
}

#[test]
fn test_dense_array_keeps_holes_and_undefined() {
    let array = ObjectRef::array(6);
    array.set_index(0, 1i32);
    array.set_index(1, Value::Undefined);
    array.set_index(3, 3i32);
    array.set_index(4, 4i32);
    array.set("label", "kept");

    let decoded = round_trip(&array.clone().into());
    let d = obj(&decoded);
    assert_eq!(d.array_length(), Some(6));
    assert!(d.has_own("1"));
    assert!(!d.has_own("2"));
    assert!(!d.has_own("5"));
    assert_eq!(prop(&decoded, "label").as_str(), Some("kept"));
    assert!(Value::from(array).deep_equals(&decoded));
}

#[test]
fn test_sparse_array_keeps_length_and_names() {
    let array = ObjectRef::array(1000);
    array.set_index(5, "five");
    array.set("name", 7u32);
    let decoded = round_trip(&array.clone().into());
    assert_eq!(obj(&decoded).array_length(), Some(1000));
    assert_eq!(obj(&decoded).own_property_names().len(), 2);
    assert!(Value::from(array).deep_equals(&decoded));
}

#[test]
fn test_dates_regexps_and_boxed_values() {
    let date = ObjectRef::date(1_600_000_000_000.0);
    let root = ObjectRef::array(0);
    root.set_index(0, date.clone());
    root.set_index(1, date);
    root.set_index(
        2,
        ObjectRef::regexp("a+b", RegExpFlags::GLOBAL | RegExpFlags::MULTILINE),
    );
    root.set_index(3, ObjectRef::boxed_string("boxed"));
    root.set_index(4, ObjectRef::boxed_number(-4.25));
    root.set_index(5, ObjectRef::boxed_boolean(true));
    root.set_index(6, ObjectRef::boxed_boolean(false));

    let decoded = round_trip(&root.clone().into());
    let d = obj(&decoded);
    let first = d.get_index(0).unwrap();
    let second = d.get_index(1).unwrap();
    assert!(obj(&first).ptr_eq(obj(&second)));
    assert!(Value::from(root).deep_equals(&decoded));
}

#[test]
fn test_image_data_round_trip() {
    let pixels: Vec<u8> = (0..2 * 3 * 4).map(|i| i as u8).collect();
    let image = ObjectRef::image_data(2, 3, pixels).unwrap();
    assert_round_trip!(image);
}

#[test]
fn test_buffers_and_views_round_trip() {
    let buffer = ObjectRef::array_buffer((0u8..32).collect());
    let root = ObjectRef::plain();
    let kinds = [
        ViewKind::Int8,
        ViewKind::Uint8,
        ViewKind::Uint8Clamped,
        ViewKind::Int16,
        ViewKind::Uint16,
        ViewKind::Int32,
        ViewKind::Uint32,
        ViewKind::Float32,
        ViewKind::Float64,
        ViewKind::DataView,
    ];
    for (i, kind) in kinds.into_iter().enumerate() {
        let view = ObjectRef::view(kind, &buffer, 8, 16).unwrap();
        root.set(&format!("v{i}"), view);
    }
    root.set("buffer", buffer);

    let decoded = round_trip(&root.clone().into());
    let v0 = prop(&decoded, "v0");
    let v9 = prop(&decoded, "v9");
    let buffer_of = |v: &Value| match &obj(v).borrow().kind {
        crate::value::ObjectKind::ArrayBufferView(view) => view.buffer.clone(),
        _ => panic!("not a view"),
    };
    assert!(buffer_of(&v0).ptr_eq(&buffer_of(&v9)));
    assert!(buffer_of(&v0).ptr_eq(obj(&prop(&decoded, "buffer"))));
    assert_eq!(obj(&v9).view_bytes().unwrap(), (8u8..24).collect::<Vec<_>>());
    assert!(Value::from(root).deep_equals(&decoded));
}

#[test]
fn test_transfer_neuters_and_moves_contents() {
    let buffer = ObjectRef::array_buffer(vec![1, 2, 3, 4]);
    let view = ObjectRef::view(ViewKind::Uint8, &buffer, 1, 2).unwrap();
    let root = ObjectRef::plain();
    root.set("buf", buffer.clone());
    root.set("again", buffer.clone());
    root.set("view", view.clone());

    let out = crate::serialize(&root.into(), &[buffer.clone()]).unwrap();
    assert!(buffer.is_neutered());
    assert_eq!(buffer.buffer_byte_length(), Some(0));
    assert_eq!(view.view_byte_length(), Some(0));
    assert_eq!(out.transferred, vec![vec![1, 2, 3, 4]]);

    let decoded = crate::deserialize(&out.bytes, out.transferred);
    let buf = prop(&decoded, "buf");
    let again = prop(&decoded, "again");
    assert!(obj(&buf).ptr_eq(obj(&again)));
    assert_eq!(obj(&buf).buffer_bytes(), Some(vec![1, 2, 3, 4]));
    assert_eq!(obj(&prop(&decoded, "view")).view_bytes(), Some(vec![2, 3]));
}

#[test]
fn test_duplicate_transfers_coalesce() {
    let a = ObjectRef::array_buffer(vec![9]);
    let b = ObjectRef::array_buffer(vec![8, 8]);
    let root = ObjectRef::array(0);
    root.set_index(0, a.clone());
    root.set_index(1, b.clone());
    let out = crate::serialize(&root.into(), &[a.clone(), b, a]).unwrap();
    assert_eq!(out.transferred, vec![vec![9], vec![8, 8], vec![]]);
    let decoded = crate::deserialize(&out.bytes, out.transferred);
    let first = obj(&decoded).get_index(0).unwrap();
    assert_eq!(obj(&first).buffer_bytes(), Some(vec![9]));
}

#[test]
fn test_bad_transfer_lists() {
    let not_a_buffer = ObjectRef::plain();
    let err = crate::serialize(&Value::Null, &[not_a_buffer]).unwrap_err();
    assert_eq!(err.status(), Status::DataCloneError);

    let neutered = ObjectRef::array_buffer(vec![1]);
    neutered.neuter();
    let err = crate::serialize(&Value::Null, &[neutered.clone()]).unwrap_err();
    assert_eq!(err.status(), Status::DataCloneError);
    let err = crate::serialize(&neutered.into(), &[]).unwrap_err();
    assert_eq!(err.status(), Status::DataCloneError);
}

#[test]
fn test_failed_serialization_does_not_neuter() {
    let buffer = ObjectRef::array_buffer(vec![1, 2]);
    let root = ObjectRef::plain();
    root.set("buf", buffer.clone());
    root.set("f", ObjectRef::function("callback"));
    let err = crate::serialize(&root.into(), &[buffer.clone()]).unwrap_err();
    assert!(matches!(err, Error::DataClone(_)));
    assert!(!buffer.is_neutered());
    assert_eq!(buffer.buffer_bytes(), Some(vec![1, 2]));
}

#[test]
fn test_deep_nesting_is_rejected() {
    let nodes: Vec<ObjectRef> = (0..25_000).map(|_| ObjectRef::plain()).collect();
    for pair in nodes.windows(2) {
        pair[0].set("next", pair[1].clone());
    }
    let result = crate::serialize(&nodes[0].clone().into(), &[]);
    assert_eq!(Status::from(&result), Status::InputError);
    assert!(matches!(result, Err(Error::Input(msg)) if msg.contains("too deeply nested")));
}

#[test]
fn test_moderate_nesting_round_trips() {
    let nodes: Vec<ObjectRef> = (0..500).map(|_| ObjectRef::plain()).collect();
    for pair in nodes.windows(2) {
        pair[0].set("next", pair[1].clone());
    }
    let decoded = round_trip(&nodes[0].clone().into());
    assert!(Value::from(nodes[0].clone()).deep_equals(&decoded));
}

#[test]
fn test_deep_decoded_graph_drops() {
    let head = ObjectRef::plain();
    let mut tail = head.clone();
    for _ in 1..19_000 {
        let next = ObjectRef::plain();
        tail.set("next", next.clone());
        tail = next;
    }
    drop(tail);
    let out = crate::serialize(&head.into(), &[]).unwrap();
    let decoded = crate::deserialize(&out.bytes, out.transferred);
    assert!(!decoded.is_null());
    drop(decoded);
}

/// `depth` nested `{ "n": ... }` objects around an empty one.
fn nested_object_stream(depth: usize) -> Vec<u8> {
    let mut bytes = vec![0xff, 1];
    for _ in 0..depth {
        bytes.extend_from_slice(&[b'o', b'S', 1, b'n']);
    }
    bytes.extend_from_slice(&[b'o', b'{', 0]);
    for _ in 0..depth {
        bytes.extend_from_slice(&[b'{', 1]);
    }
    bytes
}

#[test]
fn test_decoder_rejects_excessive_nesting() {
    let bytes = nested_object_stream(30_000);
    assert_eq!(
        decode(&bytes).unwrap_err(),
        DecodeError::TooDeep(Options::DEFAULT_MAX_DEPTH)
    );
    assert!(crate::deserialize(&bytes, Vec::new()).is_null());

    let roomy = Options::default().with_max_depth(40_000);
    let decoded = Deserializer::with_options(roomy, &bytes, Vec::new())
        .try_deserialize()
        .unwrap();
    let mut cursor = decoded.clone();
    for _ in 0..30_000 {
        cursor = prop(&cursor, "n");
    }
    assert_eq!(obj(&cursor).own_property_names().len(), 0);
    drop(cursor);
    drop(decoded);
}

#[test]
fn test_max_depth_option() {
    let outer = ObjectRef::plain();
    let middle = ObjectRef::plain();
    middle.set("inner", ObjectRef::plain());
    outer.set("middle", middle);
    let root: Value = outer.into();

    let shallow = Options::default().with_max_depth(2);
    let err = Serializer::with_options(shallow, &[])
        .serialize(&root)
        .unwrap_err();
    assert_eq!(err.status(), Status::InputError);

    let enough = Options::default().with_max_depth(3);
    assert!(Serializer::with_options(enough, &[]).serialize(&root).is_ok());
}

#[test]
fn test_uncloneable_values() {
    for value in [
        ObjectRef::function("f"),
        ObjectRef::host("Window"),
        ObjectRef::host("Node"),
        ObjectRef::error("boom"),
    ] {
        let err = crate::serialize(&value.into(), &[]).unwrap_err();
        assert_eq!(err.status(), Status::DataCloneError);
    }

    let err = crate::serialize(&Value::Empty, &[]).unwrap_err();
    assert_eq!(err.status(), Status::InputError);
}

#[test]
fn test_throwing_getter_is_a_script_exception() {
    let o = ObjectRef::plain();
    o.set("fine", 1i32);
    o.define(
        "broken",
        Property::accessor(|| Err(Exception("getter failed".into()))),
    );
    let err = crate::serialize(&o.into(), &[]).unwrap_err();
    assert_eq!(err.status(), Status::ScriptException);
    assert!(matches!(err, Error::Script(Exception(msg)) if msg == "getter failed"));
}

#[test]
fn test_getters_and_enumerability() {
    let o = ObjectRef::plain();
    o.define("computed", Property::accessor(|| Ok(Value::Int32(42))));
    o.define("hidden", Property::data(1i32, false));
    let decoded = round_trip(&o.into());
    assert_eq!(prop(&decoded, "computed").as_f64(), Some(42.0));
    assert!(!obj(&decoded).has_own("hidden"));
}

#[test]
fn test_corrupted_checkpoint_fails() {
    let o = ObjectRef::plain();
    o.set("a", 1i32);
    let mut bytes = crate::serialize(&o.into(), &[]).unwrap().bytes;
    assert!(decode(&bytes).is_ok());
    assert_eq!(bytes[5], b'?');
    bytes[6] = 5;
    assert_eq!(
        decode(&bytes).unwrap_err(),
        DecodeError::ReferenceCountMismatch {
            expected: 5,
            actual: 1
        }
    );
    assert!(crate::deserialize(&bytes, Vec::new()).is_null());
}

#[test]
fn test_version_zero_streams() {
    let object = decode(&[b'S', 1, b'a', b'I', 2, b'{', 1]).unwrap();
    assert_eq!(prop(&object, "a").as_f64(), Some(1.0));

    let array = decode(&[b'I', 2, b'I', 4, b'$', 0, 2]).unwrap();
    assert_eq!(obj(&array).array_length(), Some(2));
    assert_eq!(obj(&array).get_index(1).unwrap().as_f64(), Some(2.0));

    let sparse = decode(&[b'S', 1, b'3', b'T', b'@', 1, 10]).unwrap();
    assert_eq!(obj(&sparse).array_length(), Some(10));
    assert!(obj(&sparse).has_own("3"));

    assert_eq!(
        decode(&[b'o', b'{', 0]).unwrap_err(),
        DecodeError::RequiresVersion(b'o')
    );
    assert_eq!(
        decode(&[b'^', 0]).unwrap_err(),
        DecodeError::RequiresVersion(b'^')
    );
}

#[test]
fn test_unsupported_version() {
    assert_eq!(
        decode(&[0xff, 9, b'0']).unwrap_err(),
        DecodeError::UnsupportedVersion(9)
    );
    let lenient = Options::default().with_max_version(9);
    let v = Deserializer::with_options(lenient, &[0xff, 9, b'T'], Vec::new()).deserialize();
    assert!(matches!(v, Value::Bool(true)));
}

#[test]
fn test_truncated_streams_fail() {
    let root = ObjectRef::plain();
    root.set("list", ObjectRef::array(3));
    root.set("text", "日本");
    root.set("n", 2.5f64);
    let bytes = crate::serialize(&root.into(), &[]).unwrap().bytes;
    for end in 0..bytes.len() {
        assert!(decode(&bytes[..end]).is_err(), "prefix of length {end}");
    }
    assert!(decode(&bytes).is_ok());
}

#[test]
fn test_malformed_streams_fail() {
    let cases: [&[u8]; 8] = [
        &[0xff, 1, b'^', 5],
        &[0xff, 1, b'!'],
        &[0xff, 1, b'Z'],
        &[0xff, 1, b'0', b'0'],
        &[0xff, 1, b'-'],
        &[0xff, 1, b'{', 0],
        &[0xff, 1, b't', 0],
        &[0xff, 1, b'0', 0xff, 1],
    ];
    for bytes in cases {
        assert!(decode(bytes).is_err(), "{bytes:?}");
        assert!(crate::deserialize(bytes, Vec::new()).is_null());
    }
}

#[test]
fn test_padding_is_skipped() {
    let decoded = decode(&[0xff, 1, 0, 0, b'T']).unwrap();
    assert!(matches!(decoded, Value::Bool(true)));
}

#[test]
fn test_composite_boundary_checkpoints() {
    let root = ObjectRef::plain();
    root.set("a", 1i32);
    root.set("b", "two");
    root.set("c", ObjectRef::date(3.0));
    let value: Value = root.into();

    let full = crate::serialize(&value, &[]).unwrap().bytes;
    let options = Options::default().with_checkpoints(Checkpoints::CompositeBoundaries);
    let lean = Serializer::with_options(options, &[])
        .serialize(&value)
        .unwrap()
        .bytes;
    assert!(lean.len() < full.len());
    assert!(value.deep_equals(&decode(&lean).unwrap()));
}

#[test]
fn test_encoded_size_matches_output() {
    let value: Value = "size".into();
    assert_eq!(
        crate::encoded_size(&value).unwrap(),
        crate::serialize(&value, &[]).unwrap().bytes.len()
    );
}

#[test]
fn test_serde_values_round_trip() {
    #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
    enum Shape {
        Point,
        Circle(f64),
        Rect { w: u32, h: u32 },
        Line(i32, i32),
    }

    #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
    struct Record {
        id: u64,
        name: String,
        tags: Vec<String>,
        parent: Option<u32>,
        #[serde(with = "serde_bytes")]
        blob: Vec<u8>,
        shapes: Vec<Shape>,
        scores: std::collections::BTreeMap<u8, i64>,
    }

    let record = Record {
        id: u64::MAX,
        name: "record".into(),
        tags: vec!["a".into(), "日本".into()],
        parent: None,
        blob: vec![1, 2, 3],
        shapes: vec![
            Shape::Point,
            Shape::Circle(1.5),
            Shape::Rect { w: 2, h: 3 },
            Shape::Line(-1, 1),
        ],
        scores: [(1, -5), (2, 1 << 40)].into_iter().collect(),
    };

    let value = crate::convert::to_value(&record).unwrap();
    let decoded = round_trip(&value);
    assert!(value.deep_equals(&decoded));
    assert_eq!(prop(&decoded, "id").as_f64(), Some(u64::MAX as f64));
    assert!(prop(&decoded, "parent").is_null());
    assert_eq!(
        obj(&prop(&decoded, "blob")).buffer_bytes(),
        Some(vec![1, 2, 3])
    );
    let shapes = prop(&decoded, "shapes");
    assert_eq!(obj(&shapes).get_index(0).unwrap().as_str(), Some("Point"));
    let rect = obj(&shapes).get_index(2).unwrap();
    assert_eq!(prop(&prop(&rect, "Rect"), "h").as_f64(), Some(3.0));
    assert_eq!(prop(&prop(&decoded, "scores"), "1").as_f64(), Some(-5.0));

    let bytes = crate::to_bytes(&record).unwrap();
    assert!(value.deep_equals(&decode(&bytes).unwrap()));
    assert_eq!(crate::from_bytes::<Record>(&bytes).unwrap(), record);
    assert_eq!(crate::convert::from_value::<Record>(&decoded).unwrap(), record);
}

fn typed_round_trip<T>(given: &T) -> T
where
    T: ::serde::Serialize + ::serde::de::DeserializeOwned,
{
    let bytes = crate::to_bytes(given).unwrap();
    crate::from_bytes(&bytes).unwrap()
}

macro_rules! assert_typed_round_trip {
    ($($val:expr),* $(,)?) => {
        $({
            let given = $val;
            assert_eq!(given, typed_round_trip(&given));
        })*
    };
}

#[derive(Debug, PartialEq, ::arbitrary::Arbitrary, ::serde::Serialize, ::serde::Deserialize)]
enum Kind {
    Empty,
    Count(u32),
    Pair(i8, bool),
    Named { label: String },
}

#[derive(Debug, PartialEq, ::arbitrary::Arbitrary, ::serde::Serialize, ::serde::Deserialize)]
struct Sample {
    small: i16,
    count: u32,
    signed: i32,
    flag: bool,
    name: String,
    letters: Vec<char>,
    items: Vec<u8>,
    maybe: Option<i32>,
    pair: (u8, String),
    nested: Vec<Vec<bool>>,
    lookup: std::collections::BTreeMap<u16, String>,
    kind: Kind,
}

#[test]
fn test_typed_round_trips() {
    assert_typed_round_trip!(
        true,
        -7i8,
        u16::MAX,
        i32::MIN,
        u32::MAX,
        i64::MIN,
        u64::MAX,
        0.25f64,
        'é',
        String::from("日本語"),
        Some(5u8),
        None::<String>,
        vec![1i64, -2, 1 << 50],
        (1u8, "two".to_string(), [3u32, 4]),
        Kind::Empty,
        Kind::Pair(-1, true),
        Kind::Named {
            label: "x".into()
        },
    );
    for _ in 0..100 {
        let sample: Sample = arbitrary_value();
        assert_typed_round_trip!(sample);
    }
}

#[test]
fn test_cyclic_values_hit_the_recursion_limit() {
    #[derive(Debug, ::serde::Deserialize)]
    #[allow(dead_code)]
    struct Node {
        next: Option<Box<Node>>,
    }

    let a = ObjectRef::plain();
    a.set("next", a.clone());
    let err = crate::convert::from_value::<Node>(&a.into()).unwrap_err();
    assert!(matches!(err, Error::Generic(msg) if msg.contains("recursion limit")));
}

#[test]
fn test_uncloneable_kinds_do_not_convert() {
    let err = crate::convert::from_value::<Vec<u8>>(&ObjectRef::function("f").into()).unwrap_err();
    assert!(matches!(err, Error::Generic(_)));
}

#[test]
fn test_from_bytes_reports_decode_errors() {
    let err = crate::from_bytes::<u32>(&[0xff, 1, b'Z']).unwrap_err();
    assert!(matches!(err, Error::Decode(DecodeError::UnknownTag(b'Z'))));
    assert_eq!(err.status(), Status::InputError);
}

#[test]
fn test_options_read_from_values() {
    let raw = ObjectRef::plain();
    raw.set("max_depth", 64u32);
    raw.set("checkpoints", "composite_boundaries");
    let options: Options = crate::convert::from_value(&raw.into()).unwrap();
    let expected = Options::default()
        .with_max_depth(64)
        .with_checkpoints(Checkpoints::CompositeBoundaries);
    assert_eq!(options, expected);

    let value = crate::convert::to_value(&options).unwrap();
    assert_eq!(prop(&value, "checkpoints").as_str(), Some("composite_boundaries"));
    assert_eq!(crate::convert::from_value::<Options>(&value).unwrap(), expected);
}

#[test]
fn test_serde_rejects_composite_map_keys() {
    let mut map = std::collections::BTreeMap::new();
    map.insert(vec![1u8], 1);
    let err = crate::convert::to_value(&map).unwrap_err();
    assert!(matches!(err, Error::Generic(_)));
}
