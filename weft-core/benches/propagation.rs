//! Write fan-out and computed read benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use weft_core::reactive::Runtime;

fn fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for effects in [1usize, 16, 256] {
        let rt = Runtime::new();
        let state = rt.reactive_object(json!({ "count": 0 })).unwrap();
        for _ in 0..effects {
            let s = state.clone();
            rt.effect(move || {
                black_box(s.get("count")?);
                Ok(())
            })
            .unwrap();
        }

        let mut n = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(effects), &effects, |b, _| {
            b.iter(|| {
                n += 1;
                state.set("count", n).unwrap();
            })
        });
    }

    group.finish();
}

fn computed_chain(c: &mut Criterion) {
    let rt = Runtime::new();
    let base = rt.reference(0i64);

    let b = base.clone();
    let mut top = rt.computed(move || Ok(b.get() + 1));
    for _ in 0..32 {
        let prev = top.clone();
        top = rt.computed(move || Ok(prev.get()? + 1));
    }

    c.bench_function("computed_chain_32", |bench| {
        let mut n = 0i64;
        bench.iter(|| {
            n += 1;
            base.set(n).unwrap();
            black_box(top.get().unwrap())
        })
    });

    c.bench_function("computed_cached_read", |bench| {
        bench.iter(|| black_box(top.get().unwrap()))
    });
}

criterion_group!(benches, fan_out, computed_chain);
criterion_main!(benches);
