use bytes::Bytes;
#[cfg(feature = "chrono")]
use chrono::{DateTime, NaiveDateTime, Utc};
#[cfg(feature = "indexmap")]
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use transfer_codec::{
    Object, Registry, Transfer, TransferError, TransferType, Transferable, TypeRef, Value,
};

#[derive(Transferable, Default, Debug, PartialEq, Clone)]
#[transfer(id = 1)]
struct Point {
    x: i32,
    y: i32,
}

#[derive(Transferable, Default, Debug, PartialEq)]
#[transfer(id = 2)]
struct Shape {
    name: String,
    corners: Vec<Point>,
    origin: Option<Point>,
    tags: BTreeSet<String>,
    weights: HashMap<String, f64>,
    color: Color,
}

#[derive(Transferable, Debug, PartialEq, Clone, Copy, Default)]
#[transfer(id = 3)]
enum Color {
    #[default]
    Red,
    Green,
    Blue,
}

#[derive(Transferable, Default, Debug, PartialEq)]
#[transfer(id = 4)]
struct Session {
    user: String,
    #[transfer(transient)]
    token: String,
    #[transfer(ignore)]
    cache: Vec<i32>,
    hits: u32,
}

#[derive(Transferable, Default, Debug, PartialEq)]
#[transfer(id = 5)]
struct Pair(i32, String);

#[derive(Transferable, Default, Debug, PartialEq)]
#[transfer(id = 6)]
struct Empty;

fn round_trip<T: TransferType + PartialEq + Debug>(registry: &Registry, value: T) {
    let bytes = registry.encode(&value).unwrap();
    let decoded: T = registry.decode(bytes).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_primitives() {
    let registry = Registry::new();
    round_trip(&registry, true);
    round_trip(&registry, false);
    round_trip(&registry, i8::MIN);
    round_trip(&registry, i16::MAX);
    round_trip(&registry, -123456i32);
    round_trip(&registry, i64::MIN);
    round_trip(&registry, 200u8);
    round_trip(&registry, u16::MAX);
    round_trip(&registry, u32::MAX);
    round_trip(&registry, usize::MAX);
    round_trip(&registry, -7isize);
    round_trip(&registry, 1.25f32);
    round_trip(&registry, -0.1f64);
    round_trip(&registry, 'é');
    round_trip(&registry, String::new());
    round_trip(&registry, "hello".to_string());
    round_trip(&registry, Box::<str>::from("boxed"));
}

#[test]
fn test_u64_above_i64_max_survives() {
    let registry = Registry::new();
    round_trip(&registry, u64::MAX);
    round_trip(&registry, i64::MAX as u64 + 1);
    let bytes = registry.encode(&u64::MAX).unwrap();
    assert_eq!(bytes.len(), 2);
}

#[test]
fn test_narrowing_out_of_range_fails() {
    let registry = Registry::new();
    let bytes = registry.encode(&300i32).unwrap();
    assert!(matches!(
        registry.decode::<i8>(bytes.clone()),
        Err(TransferError::TypeMismatch { expected: "i8", .. })
    ));
    assert_eq!(registry.decode::<i16>(bytes).unwrap(), 300);
}

#[test]
fn test_float_widens_to_double() {
    let registry = Registry::new();
    let bytes = registry.encode(&0.5f32).unwrap();
    assert_eq!(registry.decode::<f64>(bytes).unwrap(), 0.5);
}

#[test]
fn test_double_narrows_to_float_only_when_exact() {
    let registry = Registry::new();
    assert_eq!(registry.decode::<f32>(registry.encode(&0.5f64).unwrap()).unwrap(), 0.5);
    assert!(registry
        .decode::<f32>(registry.encode(&f64::NAN).unwrap())
        .unwrap()
        .is_nan());
    for lossy in [0.1f64, 1e300] {
        assert!(matches!(
            registry.decode::<f32>(registry.encode(&lossy).unwrap()),
            Err(TransferError::TypeMismatch { expected: "f32", .. })
        ));
    }
}

#[test]
fn test_str_encodes_as_string() {
    let registry = Registry::new();
    let bytes = registry.encode(&"static").unwrap();
    assert_eq!(registry.decode::<String>(bytes).unwrap(), "static");
}

#[test]
fn test_bytes_are_shared_on_decode() {
    let registry = Registry::new();
    let payload = Bytes::from_static(b"\x00\x01\x02binary");
    round_trip(&registry, payload.clone());
    round_trip(&registry, payload.to_vec());
    round_trip(&registry, Vec::<u8>::new());
}

#[test]
fn test_system_time() {
    let registry = Registry::new();
    round_trip(&registry, UNIX_EPOCH + Duration::from_millis(1_700_000_000_123));
    round_trip(&registry, UNIX_EPOCH - Duration::from_millis(86_400_000));

    let now = SystemTime::now();
    let bytes = registry.encode(&now).unwrap();
    let decoded: SystemTime = registry.decode(bytes).unwrap();
    let drift = now.duration_since(decoded).unwrap_or_default();
    assert!(drift < Duration::from_millis(1));
}

#[test]
fn test_system_time_saturates_past_millisecond_range() {
    let registry = Registry::new();
    let Some(far) = UNIX_EPOCH.checked_add(Duration::from_millis(u64::MAX)) else {
        return;
    };
    let value = registry
        .decode_value(registry.encode(&far).unwrap(), &TypeRef::Any)
        .unwrap();
    assert!(matches!(value, Value::DateTime(i64::MAX)));
}

#[cfg(feature = "chrono")]
#[test]
fn test_chrono_date_times() {
    let registry = Registry::new();
    let utc = DateTime::<Utc>::from_timestamp_millis(1_600_000_000_250).unwrap();
    round_trip(&registry, utc);
    round_trip(&registry, utc.naive_utc());

    let bytes = registry.encode(&utc).unwrap();
    let as_system: SystemTime = registry.decode(bytes).unwrap();
    assert_eq!(
        as_system,
        UNIX_EPOCH + Duration::from_millis(1_600_000_000_250)
    );
    let bytes = registry.encode(&as_system).unwrap();
    let naive: NaiveDateTime = registry.decode(bytes).unwrap();
    assert_eq!(naive, utc.naive_utc());
}

#[test]
fn test_options() {
    let registry = Registry::new();
    round_trip(&registry, Some(5i32));
    round_trip(&registry, None::<i32>);
    round_trip(&registry, Some("x".to_string()));
    round_trip(&registry, vec![Some(1i32), None, Some(3)]);
}

#[test]
fn test_containers() {
    let registry = Registry::new();
    round_trip(&registry, vec![1i64, -2, 3]);
    round_trip(&registry, Vec::<String>::new());
    round_trip(&registry, VecDeque::from(vec![1u16, 2, 3]));
    round_trip(&registry, [1.5f64, 2.5, 3.5]);
    round_trip(&registry, vec![vec![1i32], vec![], vec![2, 3]]);
    round_trip(
        &registry,
        ["a", "b"].iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
    );
    round_trip(&registry, (1..10).collect::<BTreeSet<i32>>());

    let mut map = HashMap::new();
    map.insert("one".to_string(), vec![1i32]);
    map.insert("two".to_string(), vec![1, 2]);
    round_trip(&registry, map);

    let mut nested = BTreeMap::new();
    nested.insert(1u8, BTreeMap::from([(true, 'y')]));
    round_trip(&registry, nested);

    round_trip(&registry, ("key".to_string(), 42i32));
}

#[test]
fn test_array_length_is_checked() {
    let registry = Registry::new();
    let bytes = registry.encode(&[1i32, 2, 3]).unwrap();
    assert!(matches!(
        registry.decode::<[i32; 2]>(bytes),
        Err(TransferError::TypeMismatch {
            expected: "array",
            ..
        })
    ));
}

#[cfg(feature = "indexmap")]
#[test]
fn test_indexmap_keeps_order() {
    let registry = Registry::new();
    let mut map = IndexMap::new();
    map.insert("z".to_string(), 1i32);
    map.insert("a".to_string(), 2);
    let bytes = registry.encode(&map).unwrap();
    let decoded: IndexMap<String, i32> = registry.decode(bytes).unwrap();
    assert_eq!(decoded.keys().collect::<Vec<_>>(), vec!["z", "a"]);

    let set: IndexSet<i32> = [3, 1, 2].into_iter().collect();
    round_trip(&registry, set);
}

#[test]
fn test_pointers_are_transparent() {
    let registry = Registry::new();
    let boxed = registry.encode(&Box::new(Point { x: 1, y: 2 })).unwrap();
    let plain = registry.encode(&Point { x: 1, y: 2 }).unwrap();
    assert_eq!(boxed, plain);
    round_trip(&registry, Arc::new(7i32));
}

#[test]
fn test_atomics() {
    let registry = Registry::new();
    let counter = AtomicI64::new(-42);
    let bytes = registry.encode(&counter).unwrap();
    let decoded: AtomicI64 = registry.decode(bytes.clone()).unwrap();
    assert_eq!(decoded.load(Ordering::SeqCst), -42);
    assert_eq!(registry.decode::<i64>(bytes).unwrap(), -42);
}

#[test]
fn test_registered_objects() {
    let registry = Registry::new();
    round_trip(&registry, Point { x: 3, y: -1 });
    round_trip(&registry, Color::Blue);
    round_trip(
        &registry,
        Shape {
            name: "triangle".to_string(),
            corners: vec![
                Point { x: 0, y: 0 },
                Point { x: 4, y: 0 },
                Point { x: 0, y: 3 },
            ],
            origin: Some(Point { x: 1, y: 1 }),
            tags: ["flat".to_string()].into_iter().collect(),
            weights: HashMap::from([("area".to_string(), 6.0)]),
            color: Color::Green,
        },
    );
    round_trip(&registry, Shape::default());
    round_trip(&registry, Pair(-5, "five".to_string()));
    round_trip(&registry, Empty);
}

#[test]
fn test_transient_and_ignored_fields_are_skipped() {
    let registry = Registry::new();
    let session = Session {
        user: "ann".to_string(),
        token: "secret".to_string(),
        cache: vec![1, 2, 3],
        hits: 9,
    };
    let bytes = registry.encode(&session).unwrap();
    assert!(!bytes.windows(6).any(|window| window == b"secret"));

    let decoded: Session = registry.decode(bytes).unwrap();
    assert_eq!(
        decoded,
        Session {
            user: "ann".to_string(),
            token: String::new(),
            cache: Vec::new(),
            hits: 9,
        }
    );

    let info = registry.class_info(&<Session as transfer_codec::Registrable>::key()).unwrap();
    let names: Vec<_> = info.fields().iter().map(|field| field.name()).collect();
    assert_eq!(names, vec!["user", "hits"]);
}

#[test]
fn test_polymorphic_objects() {
    let registry = Registry::new();
    let items: Vec<Box<dyn Object>> = vec![
        Box::new(Point { x: 1, y: 2 }),
        Box::new(Color::Red),
        Box::new(Pair(3, "three".to_string())),
    ];
    let bytes = registry.encode(&items).unwrap();
    let decoded: Vec<Box<dyn Object>> = registry.decode(bytes).unwrap();

    assert_eq!(decoded.len(), 3);
    assert_eq!(
        decoded[0].as_any().downcast_ref::<Point>(),
        Some(&Point { x: 1, y: 2 })
    );
    assert_eq!(decoded[1].as_any().downcast_ref::<Color>(), Some(&Color::Red));
    assert_eq!(
        decoded[2].as_any().downcast_ref::<Pair>(),
        Some(&Pair(3, "three".to_string()))
    );
}

#[test]
fn test_untyped_decode_follows_the_tags() {
    let registry = Registry::new();
    let mut map = BTreeMap::new();
    map.insert("p".to_string(), Point { x: 5, y: 6 });
    let bytes = registry.encode(&map).unwrap();

    let value = registry.decode_value(bytes, &TypeRef::Any).unwrap();
    let pairs = value.into_pairs("map").unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].0.as_str(), Some("p"));
    assert_eq!(pairs[0].1.downcast_ref::<Point>(), Some(&Point { x: 5, y: 6 }));
}

#[test]
fn test_value_re_encodes_identically() {
    let registry = Registry::new();
    let original = vec![
        Some(Point { x: 1, y: 1 }),
        None,
        Some(Point { x: -1, y: 2 }),
    ];
    let bytes = registry.encode(&original).unwrap();
    let value: Value = registry.decode(bytes.clone()).unwrap();
    assert_eq!(registry.encode(&value).unwrap(), bytes);
}

#[test]
fn test_object_as_transfer() {
    let registry = Registry::new();
    let object: Box<dyn Object> = Box::new(Point { x: 8, y: 9 });
    let bytes = registry.encode(object.as_transfer()).unwrap();
    assert_eq!(
        registry.decode::<Point>(bytes).unwrap(),
        Point { x: 8, y: 9 }
    );
}

#[test]
fn test_wrong_type_is_a_mismatch() {
    let registry = Registry::new();
    let bytes = registry.encode(&Color::Green).unwrap();
    assert!(matches!(
        registry.decode::<Vec<i32>>(bytes),
        Err(TransferError::UnexpectedTag { .. })
    ));

    let bytes = registry.encode(&"text".to_string()).unwrap();
    let value = registry.decode_value(bytes, &TypeRef::Any).unwrap();
    assert!(matches!(
        bool::from_value(value),
        Err(TransferError::TypeMismatch { expected: "bool", .. })
    ));
}
