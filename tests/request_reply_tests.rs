//! Integration tests for request/reply correlation

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use robomq::rpc::{RequestBroker, TimedPayload};
use robomq::store::PayloadRef;

fn payload(bytes: &[u8]) -> Vec<TimedPayload> {
    vec![TimedPayload {
        payload: PayloadRef::inline(bytes.to_vec()),
        timestamp: 0.0,
    }]
}

#[test]
fn test_fifo_reply_matching_across_requesters() {
    let broker = Arc::new(RequestBroker::new());

    let first = {
        let broker = broker.clone();
        thread::spawn(move || broker.request("policy", payload(b"first"), Duration::from_secs(5), 0.0))
    };
    // Ensure the first request is enqueued before the second
    while broker.pending_count() < 1 {
        thread::sleep(Duration::from_millis(2));
    }
    let second = {
        let broker = broker.clone();
        thread::spawn(move || broker.request("policy", payload(b"second"), Duration::from_secs(5), 0.0))
    };
    while broker.pending_count() < 2 {
        thread::sleep(Duration::from_millis(2));
    }

    // Replies land on requests oldest-first
    assert!(broker.reply("policy", vec![b"r1".to_vec()]));
    assert!(broker.reply("policy", vec![b"r2".to_vec()]));

    assert_eq!(first.join().unwrap(), vec![b"r1".to_vec()]);
    assert_eq!(second.join().unwrap(), vec![b"r2".to_vec()]);
    assert_eq!(broker.pending_count(), 0);
}

#[test]
fn test_claimed_request_still_matches_reply() {
    let broker = Arc::new(RequestBroker::new());

    let requester = {
        let broker = broker.clone();
        thread::spawn(move || broker.request("cmd", payload(b"go"), Duration::from_secs(5), 0.0))
    };

    // Server claims the request, then replies
    let (topic, payloads) = broker.wait_for_request(Duration::from_secs(5)).unwrap();
    assert_eq!(topic, "cmd");
    assert_eq!(payloads.len(), 1);
    assert_eq!(broker.pending_count(), 1);

    assert!(broker.reply("cmd", vec![b"done".to_vec()]));
    assert_eq!(requester.join().unwrap(), vec![b"done".to_vec()]);
}

#[test]
fn test_timeout_bounds() {
    let broker = RequestBroker::new();
    let timeout = Duration::from_millis(200);

    let start = Instant::now();
    let reply = broker.request("nobody", payload(b"x"), timeout, 0.0);
    let elapsed = start.elapsed();

    assert!(reply.is_empty());
    // The wait returns at the deadline, not much before or after
    assert!(elapsed >= Duration::from_millis(190));
    assert!(elapsed < Duration::from_millis(800));
}

#[test]
fn test_timed_out_request_never_gets_the_reply() {
    let broker = Arc::new(RequestBroker::new());

    let reply = broker.request("slow", payload(b"x"), Duration::from_millis(50), 0.0);
    assert!(reply.is_empty());

    // The request was removed at expiry; this reply has nothing to match
    assert!(!broker.reply("slow", vec![b"late".to_vec()]));
    assert_eq!(broker.pending_count(), 0);
}

#[test]
fn test_wait_for_request_sees_queued_backlog() {
    let broker = Arc::new(RequestBroker::new());

    for tag in [b"a", b"b"] {
        let broker = broker.clone();
        let tag = tag.to_vec();
        thread::spawn(move || broker.request("jobs", payload(&tag), Duration::from_secs(5), 0.0));
    }
    while broker.pending_count() < 2 {
        thread::sleep(Duration::from_millis(2));
    }

    // Both claims succeed without waiting on new arrivals
    assert!(broker.wait_for_request(Duration::from_millis(50)).is_some());
    assert!(broker.wait_for_request(Duration::from_millis(50)).is_some());
    assert!(broker.wait_for_request(Duration::from_millis(50)).is_none());

    broker.reply("jobs", vec![Vec::new()]);
    broker.reply("jobs", vec![Vec::new()]);
}

#[test]
fn test_topics_are_isolated() {
    let broker = Arc::new(RequestBroker::new());

    let requester = {
        let broker = broker.clone();
        thread::spawn(move || broker.request("imu", payload(b"q"), Duration::from_secs(5), 0.0))
    };
    while broker.pending_count() == 0 {
        thread::sleep(Duration::from_millis(2));
    }

    assert!(!broker.reply("camera", vec![b"wrong".to_vec()]));
    assert!(broker.reply("imu", vec![b"right".to_vec()]));
    assert_eq!(requester.join().unwrap(), vec![b"right".to_vec()]);
}
