use bytes::Bytes;
use transfer_codec::core::*;
use transfer_codec::{Registry, TransferError, Transferable};

#[derive(Transferable, Default, Debug, PartialEq, Clone)]
#[transfer(id = 1)]
struct Entity {
    id: u64,
    label: String,
    scores: Vec<i32>,
}

fn entities(count: usize) -> Vec<Entity> {
    (0..count)
        .map(|index| Entity {
            id: index as u64,
            label: format!("entity-{}", index),
            scores: (0..index as i32).collect(),
        })
        .collect()
}

#[test]
fn test_iterates_like_eager_decode() {
    let registry = Registry::new();
    let list = entities(25);
    let bytes = registry.encode(&list).unwrap();

    let eager: Vec<Entity> = registry.decode(bytes.clone()).unwrap();
    let lazy: Vec<Entity> = registry
        .iterator::<Entity>(bytes)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(lazy, eager);
    assert_eq!(lazy, list);
}

#[test]
fn test_counts_and_exhaustion() {
    let registry = Registry::new();
    let bytes = registry.encode(&entities(3)).unwrap();
    let mut iter = registry.iterator::<Entity>(bytes).unwrap();

    assert_eq!(iter.len(), 3);
    assert!(!iter.is_empty());
    assert_eq!(iter.size_hint(), (3, Some(3)));

    let first = iter.next_element().unwrap();
    assert_eq!(first.label, "entity-0");
    assert_eq!(iter.remaining(), 2);
    assert!(iter.has_next());

    iter.next_element().unwrap();
    iter.next_element().unwrap();
    assert!(!iter.has_next());
    assert!(matches!(
        iter.next_element(),
        Err(TransferError::IteratorExhausted { count: 3 })
    ));
    assert!(iter.next().is_none());
}

#[test]
fn test_does_not_read_ahead() {
    let registry = Registry::new();
    let mut bytes = registry.encode(&entities(2)).unwrap().to_vec();
    // Garbage after the first element only fails once it is reached.
    let first_len = registry.encode(&entities(1)[0]).unwrap().len();
    let header_len = 3;
    bytes.truncate(header_len + first_len);
    bytes.push(0xE0);

    let mut iter = registry.iterator::<Entity>(Bytes::from(bytes)).unwrap();
    assert_eq!(iter.next_element().unwrap().id, 0);
    assert!(matches!(
        iter.next_element(),
        Err(TransferError::UnexpectedTag { .. }) | Err(TransferError::UnsupportedTag(_))
    ));
    // A failed element ends the iteration.
    assert!(iter.next().is_none());
}

#[test]
fn test_null_is_empty() {
    let registry = Registry::new();
    let bytes = registry.encode(&None::<Vec<Entity>>).unwrap();
    let mut iter = registry.iterator::<Entity>(bytes).unwrap();
    assert!(iter.is_empty());
    assert!(iter.next().is_none());
}

#[test]
fn test_rejects_non_sequences() {
    let registry = Registry::new();
    let bytes = registry.encode(&42i32).unwrap();
    assert!(matches!(
        registry.iterator::<i32>(bytes),
        Err(TransferError::UnexpectedTag {
            found: TAG_NUMBER,
            ..
        })
    ));
    assert!(matches!(
        registry.iterator::<i32>(Bytes::new()),
        Err(TransferError::MalformedBuffer { .. })
    ));
}

#[test]
fn test_iterates_arrays() {
    let registry = Registry::new();
    let bytes = registry.encode(&[10u16, 20, 30]).unwrap();
    assert_eq!(bytes[0], TAG_ARRAY);
    let values: Vec<u16> = registry
        .iterator::<u16>(bytes)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(values, vec![10, 20, 30]);
}

#[test]
fn test_source_buffer_is_untouched() {
    let registry = Registry::new();
    let bytes = registry.encode(&vec![1i64, 2, 3]).unwrap();
    let copy = bytes.clone();
    let sum: i64 = registry
        .iterator::<i64>(bytes.clone())
        .unwrap()
        .map(Result::unwrap)
        .sum();
    assert_eq!(sum, 6);
    assert_eq!(bytes, copy);
}
