use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use robomq::arena::ShmArena;
use robomq::server::Broker;
use robomq::store::Order;

fn bench_topic_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("topic_put");
    for size in [64usize, 1024, 16 * 1024] {
        let broker = Broker::new("bench").unwrap();
        broker.add_topic("t", 0.5).unwrap();
        let data = vec![0u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{}b", size), |b| {
            b.iter(|| broker.put_data("t", black_box(&data)).unwrap())
        });
    }
    group.finish();
}

fn bench_topic_peek(c: &mut Criterion) {
    let broker = Broker::new("bench").unwrap();
    broker.add_topic("t", 3600.0).unwrap();
    for i in 0..100u32 {
        broker.put_data("t", &i.to_le_bytes()).unwrap();
    }

    c.bench_function("peek_latest_10_of_100", |b| {
        b.iter(|| black_box(broker.peek_data("t", Order::Latest, 10)))
    });
    c.bench_function("peek_all_100", |b| {
        b.iter(|| black_box(broker.peek_data("t", Order::Earliest, -1)))
    });
}

fn bench_arena_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena");
    for size in [1024usize, 64 * 1024] {
        let name = format!("bench_arena_{}_{}", std::process::id(), size);
        let arena = ShmArena::create_named(&name, 8 * 1024 * 1024).unwrap();
        let data = vec![0u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("write_{}b", size), |b| {
            b.iter(|| arena.write(black_box(&data)).unwrap())
        });

        let handle = arena.write(&data).unwrap();
        group.bench_function(format!("read_{}b", size), |b| {
            b.iter(|| black_box(arena.read(&handle).unwrap()))
        });
    }
    group.finish();
}

fn bench_status(c: &mut Criterion) {
    let broker = Broker::new("bench").unwrap();
    for i in 0..32 {
        broker.add_topic(&format!("topic_{}", i), 3600.0).unwrap();
        broker.put_data(&format!("topic_{}", i), b"x").unwrap();
    }

    c.bench_function("topic_status", |b| {
        b.iter(|| black_box(broker.get_topic_status("topic_7")))
    });
    c.bench_function("all_topic_status_32", |b| {
        b.iter(|| black_box(broker.get_all_topic_status()))
    });
}

criterion_group!(
    benches,
    bench_topic_put,
    bench_topic_peek,
    bench_arena_write_read,
    bench_status
);
criterion_main!(benches);
