//! Checksum cost over allocations of increasing size.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use guardstack::ChecksumKind;

fn bench_digest_slots(c: &mut Criterion) {
    let sizes: &[usize] = &[16, 256, 4096, 65536];
    let mut group = c.benchmark_group("digest_slots");

    for &size in sizes {
        let slots: Vec<i32> = (0..size as i32).collect();
        group.throughput(Throughput::Bytes((size * 4) as u64));
        for kind in [ChecksumKind::Djb2, ChecksumKind::Blake3] {
            group.bench_with_input(BenchmarkId::new(kind.as_str(), size), &slots, |b, slots| {
                b.iter(|| criterion::black_box(kind.digest_slots(slots)));
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_digest_slots);
criterion_main!(benches);
