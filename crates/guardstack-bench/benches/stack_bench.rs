//! Push/pop throughput per instrumentation level, against a bare `Vec`.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use guardstack::{DiagnosticSink, GuardedStack, InstrumentationLevel, StackConfig};

const LEVELS: [InstrumentationLevel; 3] = [
    InstrumentationLevel::Diagnostic,
    InstrumentationLevel::Production,
    InstrumentationLevel::Minimal,
];

fn config(level: InstrumentationLevel) -> StackConfig {
    StackConfig::new(level).with_sink(DiagnosticSink::Silent)
}

fn bench_push_pop_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop_cycle");

    group.bench_function("vec", |b| {
        let mut v: Vec<i32> = Vec::with_capacity(16);
        b.iter(|| {
            v.push(criterion::black_box(7));
            criterion::black_box(v.pop());
        });
    });

    for level in LEVELS {
        group.bench_function(level.as_str(), |b| {
            let Ok(mut stack) = GuardedStack::construct_with(16, config(level)) else {
                return;
            };
            b.iter(|| {
                let _ = stack.push(criterion::black_box(7));
                criterion::black_box(stack.pop()).ok();
            });
        });
    }
    group.finish();
}

fn bench_fill_drain(c: &mut Criterion) {
    let counts: &[usize] = &[16, 256, 4096];
    let mut group = c.benchmark_group("fill_drain");

    for &n in counts {
        group.bench_with_input(BenchmarkId::new("vec", n), &n, |b, &n| {
            b.iter(|| {
                let mut v: Vec<i32> = Vec::with_capacity(1);
                for i in 0..n {
                    v.push(i as i32);
                }
                while let Some(x) = v.pop() {
                    criterion::black_box(x);
                }
            });
        });

        for level in LEVELS {
            group.bench_with_input(BenchmarkId::new(level.as_str(), n), &n, |b, &n| {
                b.iter(|| {
                    let Ok(mut stack) = GuardedStack::construct_with(1, config(level)) else {
                        return;
                    };
                    for i in 0..n {
                        let _ = stack.push(i as i32);
                    }
                    while let Ok(x) = stack.pop() {
                        criterion::black_box(x);
                    }
                    stack.destroy();
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_push_pop_cycle, bench_fill_drain);
criterion_main!(benches);
