//! Client transaction benchmarks over an in-process store.

use consus_bench::{in_process_session, keys, payload};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark begin + commit with no operations.
fn bench_empty_commit(c: &mut Criterion) {
    let (_server, session) = in_process_session();

    c.bench_function("empty_commit", |b| {
        b.iter(|| {
            let mut txn = session.begin_transaction().unwrap();
            txn.commit().unwrap();
        });
    });
}

/// Benchmark single-record writes.
fn bench_single_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_put");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (_server, session) = in_process_session();
            let data = payload(size);
            let mut n = 0u64;

            b.iter(|| {
                n += 1;
                let mut txn = session.begin_transaction().unwrap();
                txn.put("bench", n.to_string(), black_box(&data)).unwrap();
                txn.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark multi-record writes in one transaction.
fn bench_batch_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_put");

    for batch_size in [10, 100].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let (_server, session) = in_process_session();
                let keys = keys(batch_size);
                let data = payload(256);

                b.iter(|| {
                    let mut txn = session.begin_transaction().unwrap();
                    for key in &keys {
                        txn.put("bench", key, black_box(&data)).unwrap();
                    }
                    txn.commit().unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark reads of existing records.
fn bench_get(c: &mut Criterion) {
    let (_server, session) = in_process_session();
    let keys = keys(1000);
    let mut seed = session.begin_transaction().unwrap();
    for key in &keys {
        seed.put("bench", key, payload(256)).unwrap();
    }
    seed.commit().unwrap();

    let mut i = 0;
    c.bench_function("get_existing", |b| {
        b.iter(|| {
            i = (i + 1) % keys.len();
            let mut txn = session.begin_transaction().unwrap();
            black_box(txn.get("bench", &keys[i]).unwrap());
            txn.commit().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_empty_commit,
    bench_single_put,
    bench_batch_put,
    bench_get
);
criterion_main!(benches);
