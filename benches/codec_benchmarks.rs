//! Benchmarks for interaction encoding and replay
//!
//! These benchmarks measure:
//! - Encoding wide recordings into documents
//! - Decoding documents into replay substitutes
//! - Draining replayed attribute queues
//! - Document fingerprinting

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use interaction_replay::{
    Args, DocumentHasher, InteractionCodec, Live, ObjectSubject, Proxy, RecordingProxy,
};

// ============================================================================
// Helper Functions
// ============================================================================

/// A repository dependency read `num_records` times, each read returning a distinct row
fn create_recording(num_records: usize) -> RecordingProxy {
    let proxy = RecordingProxy::new(
        ObjectSubject::new("Repository")
            .with_method("fetch", |args| {
                let id = args.get(0).and_then(|v| v.as_i64()).unwrap_or_default();
                Ok(Live::map([
                    ("id", Live::from(id)),
                    ("owner", Live::from(format!("user{:06}", id))),
                    ("tags", Live::from(vec!["a", "b"])),
                ]))
            })
            .with_field("region", "eu-west-1"),
    );

    for i in 0..num_records {
        proxy
            .call_method("fetch", Args::new().arg(i as i64))
            .expect("benchmark recording");
        proxy.attribute("region").expect("benchmark recording");
    }
    proxy
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let codec = InteractionCodec::new();

    for num_records in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*num_records as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_records),
            num_records,
            |b, &num_records| {
                let recording = create_recording(num_records);

                b.iter(|| black_box(codec.encode(&recording).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let codec = InteractionCodec::new();

    for num_records in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*num_records as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_records),
            num_records,
            |b, &num_records| {
                let document = codec.encode(&create_recording(num_records)).unwrap().unwrap();

                b.iter(|| black_box(codec.decode(&document).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    let codec = InteractionCodec::new();

    for num_records in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*num_records as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_records),
            num_records,
            |b, &num_records| {
                let document = codec.encode(&create_recording(num_records)).unwrap().unwrap();

                b.iter(|| {
                    let substitute = codec.decode(&document).unwrap();
                    for i in 0..num_records {
                        black_box(substitute.call_method("fetch", Args::new().arg(i as i64)).unwrap());
                        black_box(substitute.attribute("region").unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    let hasher = DocumentHasher::new();
    let codec = InteractionCodec::new();

    for num_records in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_records),
            num_records,
            |b, &num_records| {
                let document = codec.encode(&create_recording(num_records)).unwrap().unwrap();

                b.iter(|| black_box(hasher.hash(&document)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_replay, bench_fingerprint);
criterion_main!(benches);
