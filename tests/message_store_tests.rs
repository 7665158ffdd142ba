//! Integration tests for the TTL message store

use robomq::store::{DataTopic, Order, PayloadRef, RetentionPolicy};

fn topic(retention_s: f64) -> DataTopic {
    DataTopic::new("test", RetentionPolicy::new(retention_s))
}

fn push(topic: &mut DataTopic, data: &[u8], now: f64) {
    topic.push(PayloadRef::inline(data.to_vec()), now);
}

fn payloads(msgs: &[robomq::store::TimedMessage]) -> Vec<Vec<u8>> {
    msgs.iter()
        .map(|m| match &m.payload {
            PayloadRef::Inline(data) => (**data).clone(),
            PayloadRef::Shm(_) => panic!("heap topic produced an shm payload"),
        })
        .collect()
}

#[test]
fn test_peek_is_non_destructive() {
    let mut t = topic(100.0);
    push(&mut t, b"a", 0.0);
    push(&mut t, b"b", 0.1);
    push(&mut t, b"c", 0.2);

    let first = t.peek(Order::Earliest, -1, 0.5);
    let second = t.peek(Order::Earliest, -1, 0.5);
    assert_eq!(payloads(&first), payloads(&second));
    assert_eq!(t.len(0.5), 3);
}

#[test]
fn test_peek_earliest_is_insertion_order() {
    let mut t = topic(100.0);
    for (i, data) in [b"a", b"b", b"c", b"d"].iter().enumerate() {
        push(&mut t, *data, i as f64 * 0.1);
    }

    let msgs = t.peek(Order::Earliest, -1, 1.0);
    assert_eq!(payloads(&msgs), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);

    // Latest: the n newest, newest first
    let msgs = t.peek(Order::Latest, 2, 1.0);
    assert_eq!(payloads(&msgs), vec![b"d".to_vec(), b"c".to_vec()]);
}

#[test]
fn test_pop_latest_leaves_earliest_remainder() {
    let mut t = topic(100.0);
    for (i, data) in [b"a", b"b", b"c", b"d"].iter().enumerate() {
        push(&mut t, *data, i as f64 * 0.1);
    }

    let taken = t.pop(Order::Latest, 2, 1.0);
    assert_eq!(payloads(&taken), vec![b"d".to_vec(), b"c".to_vec()]);

    // Remainder is exactly the complement, still in insertion order
    let left = t.peek(Order::Earliest, -1, 1.0);
    assert_eq!(payloads(&left), vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn test_count_clamping() {
    let mut t = topic(100.0);
    push(&mut t, b"a", 0.0);
    push(&mut t, b"b", 0.0);

    assert_eq!(t.peek(Order::Earliest, 5, 0.1).len(), 2);
    assert_eq!(t.peek(Order::Earliest, 0, 0.1).len(), 0);
    assert_eq!(t.peek(Order::Earliest, -5, 0.1).len(), 2);
    assert_eq!(t.peek(Order::Earliest, 1, 0.1).len(), 1);
}

#[test]
fn test_empty_topic_yields_empty() {
    let mut t = topic(10.0);
    assert!(t.peek(Order::Earliest, 1, 0.0).is_empty());
    assert!(t.peek(Order::Latest, -1, 0.0).is_empty());
    assert!(t.pop(Order::Earliest, 3, 0.0).is_empty());
    assert_eq!(t.len(0.0), 0);
}

#[test]
fn test_retention_evicts_only_expired_prefix() {
    let mut t = topic(10.0);
    push(&mut t, b"a", 0.0);
    push(&mut t, b"b", 1.0);
    push(&mut t, b"c", 9.0);

    // At t=10.5: `a` is 10.5s old (expired), `b` is 9.5s (kept)
    let msgs = t.peek(Order::Earliest, -1, 10.5);
    assert_eq!(payloads(&msgs), vec![b"b".to_vec(), b"c".to_vec()]);
    assert_eq!(t.len(10.5), 2);
}

#[test]
fn test_retention_applies_to_every_access() {
    let mut t = topic(5.0);
    push(&mut t, b"old", 0.0);

    // Expired data is invisible to len, peek and pop alike
    assert_eq!(t.len(6.0), 0);
    push(&mut t, b"fresh", 6.0);
    assert!(t.pop(Order::Earliest, -1, 20.0).is_empty());
}

#[test]
fn test_sequence_numbers_survive_eviction() {
    let mut t = topic(5.0);
    let s1 = t.push(PayloadRef::inline(b"a".to_vec()), 0.0);
    let s2 = t.push(PayloadRef::inline(b"b".to_vec()), 10.0);
    assert!(s2 > s1);

    // `a` is gone, but the sequence counter never reuses its number
    let s3 = t.push(PayloadRef::inline(b"c".to_vec()), 11.0);
    assert!(s3 > s2);
    assert_eq!(t.len(11.0), 2);
}

#[test]
fn test_pop_all_then_push_again() {
    let mut t = topic(100.0);
    push(&mut t, b"a", 0.0);
    t.pop(Order::Earliest, -1, 0.1);
    assert_eq!(t.len(0.1), 0);

    push(&mut t, b"b", 0.2);
    let msgs = t.peek(Order::Latest, -1, 0.3);
    assert_eq!(payloads(&msgs), vec![b"b".to_vec()]);
}

#[test]
fn test_order_parse_round_trip() {
    assert_eq!("earliest".parse::<Order>().unwrap(), Order::Earliest);
    assert_eq!("latest".parse::<Order>().unwrap(), Order::Latest);
    assert!("sideways".parse::<Order>().is_err());
    assert_eq!(Order::Earliest.as_str(), "earliest");
}
