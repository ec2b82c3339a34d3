use std::collections::BTreeMap;
use transfer_codec::{Object, Registry, Transfer, TransferConfig, Transferable, TypeRef};

#[derive(Transferable, Default, Debug, PartialEq, Clone)]
#[transfer(id = 30)]
struct Order {
    id: u64,
    lines: Vec<Line>,
    note: Option<String>,
    status: Status,
    attributes: BTreeMap<String, i64>,
    #[transfer(transient)]
    cached_total: i64,
}

#[derive(Transferable, Default, Debug, PartialEq, Clone)]
#[transfer(id = 31)]
struct Line {
    sku: String,
    quantity: u32,
    price: f64,
}

#[derive(Transferable, Default, Debug, PartialEq, Clone, Copy)]
#[transfer(id = 32)]
enum Status {
    #[default]
    Open,
    Shipped,
}

#[derive(Transferable, Default, Debug)]
#[transfer(id = 33)]
struct Envelope {
    payload: Option<Box<dyn Object>>,
    order: Option<Order>,
}

#[derive(Transferable, Default, Debug, PartialEq)]
#[transfer(id = 34)]
struct Point {
    x: i32,
    y: i32,
}

fn sample() -> Order {
    Order {
        id: 9001,
        lines: vec![
            Line {
                sku: "A-1".to_string(),
                quantity: 2,
                price: 3.5,
            },
            Line {
                sku: "B-22".to_string(),
                quantity: 1,
                price: 10.0,
            },
        ],
        note: None,
        status: Status::Shipped,
        attributes: BTreeMap::from([("priority".to_string(), 2)]),
        cached_total: 0,
    }
}

fn generic_only() -> Registry {
    Registry::with_config(TransferConfig::default().with_compile_threshold(None))
}

#[test]
fn test_compiled_output_matches_generic() {
    let generic = generic_only();
    let compiled = generic_only();
    compiled.compile::<Order>().unwrap();
    compiled.compile::<Line>().unwrap();

    let order = sample();
    let expected = generic.encode(&order).unwrap();
    let actual = compiled.encode(&order).unwrap();
    assert_eq!(actual, expected);

    let decoded: Order = compiled.decode(actual).unwrap();
    assert_eq!(decoded, order);
}

#[test]
fn test_compiled_handles_absent_and_polymorphic_fields() {
    let generic = generic_only();
    let compiled = generic_only();
    compiled.compile::<Envelope>().unwrap();

    for envelope in [
        Envelope::default(),
        Envelope {
            payload: Some(Box::new(Point { x: 1, y: 2 })),
            order: Some(sample()),
        },
        Envelope {
            payload: Some(Box::new(Status::Open)),
            order: None,
        },
    ] {
        let expected = generic.encode(&envelope).unwrap();
        let actual = compiled.encode(&envelope).unwrap();
        assert_eq!(actual, expected);

        let decoded: Envelope = compiled.decode(actual).unwrap();
        assert_eq!(decoded.order, envelope.order);
        assert_eq!(
            decoded.payload.as_ref().map(|payload| payload.runtime_type()),
            envelope.payload.as_ref().map(|payload| payload.runtime_type())
        );
    }
}

#[test]
fn test_threshold_switches_to_compiled_codec() {
    let registry = Registry::with_config(TransferConfig::default().with_compile_threshold(Some(2)));
    registry.register_type::<Point>(34);
    let point = Point { x: -3, y: 3 };

    let before = registry.epoch();
    let first = registry.encode(&point).unwrap();
    assert_eq!(registry.epoch(), before);

    let second = registry.encode(&point).unwrap();
    assert_eq!(registry.epoch(), before + 1);

    let third = registry.encode(&point).unwrap();
    assert_eq!(registry.epoch(), before + 1);
    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(registry.decode::<Point>(third).unwrap(), point);
}

#[test]
fn test_explicit_registration_drops_compiled_codecs() {
    let generic = generic_only();
    let registry = generic_only();
    registry.compile::<Order>().unwrap();
    registry.register_type::<Line>(131);
    generic.register_type::<Line>(131);

    let order = sample();
    let bytes = registry.encode(&order).unwrap();
    assert_eq!(bytes, generic.encode(&order).unwrap());
    assert_eq!(registry.decode::<Order>(bytes).unwrap(), order);

    let value = registry
        .decode_value(registry.encode(&order.lines).unwrap(), &TypeRef::Any)
        .unwrap();
    let items = value.into_elements("collection").unwrap();
    assert_eq!(items[0].downcast_ref::<Line>(), Some(&order.lines[0]));
}

#[test]
fn test_failed_decodes_do_not_count_toward_compilation() {
    let registry = Registry::with_config(TransferConfig::default().with_compile_threshold(Some(1)));
    registry.register_type::<Point>(34);
    let point = Point { x: 5, y: 6 };
    let bytes = generic_only().encode(&point).unwrap();

    let before = registry.epoch();
    assert!(registry.decode::<Point>(bytes.slice(..bytes.len() - 1)).is_err());
    assert_eq!(registry.epoch(), before);

    assert_eq!(registry.decode::<Point>(bytes).unwrap(), point);
    assert_eq!(registry.epoch(), before + 1);
}
