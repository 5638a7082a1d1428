//! Compile and execute benchmarks.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tern_engine::Engine;

const FIB: &str = "
    function fib(n: int): int {
        if (n < 2) { return n; }
        return fib(n - 1) + fib(n - 2);
    }
    fib(20);
";

const LOOP_SUM: &str = "
    let sum = 0;
    for (let i = 0; i < 100000; i++) { sum += i % 7; }
    sum;
";

const STRINGS: &str = "
    let s = \"\";
    for (let i = 0; i < 200; i++) { s = s + `${i},`; }
    len(s);
";

const WORKLOADS: &[(&str, &str)] = &[("fib", FIB), ("loop_sum", LOOP_SUM), ("strings", STRINGS)];

fn bench_compile(c: &mut Criterion) {
    let engine = Engine::new();
    let mut group = c.benchmark_group("compile");
    for (name, source) in WORKLOADS {
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, source| {
            b.iter(|| engine.compile(black_box(source)).unwrap())
        });
    }
    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let mut engine = Engine::new();
    let mut group = c.benchmark_group("execute");
    for (name, source) in WORKLOADS {
        let program = engine.compile(source).unwrap();
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| engine.run(black_box(&program)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
