use std::any::Any;
use std::sync::Arc;
use transfer_codec::codec::NumberCodec;
use transfer_codec::{
    decode, decode_value, encode, iterator, register_codec, register_type, Kind, Registry,
    Transfer, TransferError, TransferType, Transferable, TypeKey, TypeRef, Value, View,
};

#[derive(Transferable, Default, Debug, PartialEq)]
struct Reading {
    sensor: String,
    value: f64,
}

#[derive(Debug, PartialEq)]
struct Celsius(i64);

impl Transfer for Celsius {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Number(self.0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TransferType for Celsius {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<Celsius>(Kind::Custom))
    }

    fn from_value(value: Value) -> transfer_codec::Result<Self> {
        i64::from_value(value).map(Celsius)
    }
}

// The process-wide registry is shared by every test in this binary, so the
// whole lifecycle lives in one test.
#[test]
fn test_process_wide_registry() {
    let readings = vec![
        Reading {
            sensor: "north".to_string(),
            value: 1.5,
        },
        Reading {
            sensor: "south".to_string(),
            value: -0.25,
        },
    ];
    assert!(matches!(
        encode(&readings),
        Err(TransferError::UnsupportedType(_))
    ));

    register_type::<Reading>(500);
    let bytes = encode(&readings).unwrap();
    assert_eq!(decode::<Vec<Reading>>(bytes.clone()).unwrap(), readings);

    let sensors: Vec<String> = iterator::<Reading>(bytes.clone())
        .unwrap()
        .map(|reading| reading.unwrap().sensor)
        .collect();
    assert_eq!(sensors, vec!["north", "south"]);

    let value = decode_value(bytes, &TypeRef::Any).unwrap();
    assert_eq!(value.into_elements("collection").unwrap().len(), 2);

    register_codec::<Celsius>(Arc::new(NumberCodec), Arc::new(NumberCodec));
    let bytes = encode(&Celsius(-40)).unwrap();
    assert_eq!(decode::<Celsius>(bytes.clone()).unwrap(), Celsius(-40));
    assert_eq!(decode::<i64>(bytes).unwrap(), -40);

    Registry::global().reset();
    assert!(matches!(
        encode(&readings),
        Err(TransferError::UnsupportedType(_))
    ));
    assert!(matches!(
        encode(&Celsius(0)),
        Err(TransferError::UnsupportedType(_))
    ));
    assert_eq!(decode::<i32>(encode(&7i32).unwrap()).unwrap(), 7);
}
