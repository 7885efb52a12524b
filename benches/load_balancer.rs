//! Benchmarks for relaylb components.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use relaylb::backend::algorithms::{for_algorithm, LoadBalancer};
use relaylb::backend::{Backend, ServerPool};
use relaylb::config::Algorithm;
use relaylb::metrics::MetricsCollector;
use relaylb::util::generate_request_id;
use std::time::Duration;

fn create_pool(num_servers: usize) -> ServerPool {
    (0..num_servers)
        .map(|i| Backend::parse(&format!("http://127.0.0.1:{}", 9000 + i)).unwrap())
        .collect()
}

fn benchmark_round_robin(c: &mut Criterion) {
    let pool = create_pool(10);
    let policy = for_algorithm(Algorithm::RoundRobin);

    c.bench_function("round_robin_select", |b| {
        b.iter(|| {
            black_box(policy.select(&pool));
        })
    });
}

fn benchmark_round_robin_partial(c: &mut Criterion) {
    let pool = create_pool(10);
    for backend in pool.backends().iter().step_by(2) {
        backend.set_alive(false);
    }
    let policy = for_algorithm(Algorithm::RoundRobin);

    c.bench_function("round_robin_select_half_down", |b| {
        b.iter(|| {
            black_box(policy.select(&pool));
        })
    });
}

fn benchmark_least_connections(c: &mut Criterion) {
    let pool = create_pool(10);

    // Simulate some connections
    for (i, backend) in pool.backends().iter().enumerate() {
        for _ in 0..(10 - i) {
            backend.increment_connections();
        }
    }
    let policy = for_algorithm(Algorithm::LeastConnections);

    c.bench_function("least_connections_select", |b| {
        b.iter(|| {
            black_box(policy.select(&pool));
        })
    });
}

fn benchmark_metrics(c: &mut Criterion) {
    let collector = MetricsCollector::new();

    let mut group = c.benchmark_group("metrics");
    group.throughput(Throughput::Elements(1));

    group.bench_function("record_request", |b| {
        b.iter(|| {
            collector.record_request(
                black_box("GET"),
                black_box(200),
                black_box(Duration::from_millis(10)),
            );
        })
    });

    group.bench_function("record_attempt", |b| {
        b.iter(|| {
            collector.record_attempt(black_box("http://127.0.0.1:9000/"), black_box(true));
        })
    });

    group.finish();
}

fn benchmark_request_id(c: &mut Criterion) {
    c.bench_function("request_id_uuid", |b| {
        b.iter(|| {
            black_box(generate_request_id());
        })
    });
}

criterion_group!(
    benches,
    benchmark_round_robin,
    benchmark_round_robin_partial,
    benchmark_least_connections,
    benchmark_metrics,
    benchmark_request_id,
);
criterion_main!(benches);
