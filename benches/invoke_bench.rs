use std::fmt::Write;

use boa_engine::JsValue;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use worklets::{
    Snapshot, WorkletDescriptor, WorkletInvoker, marshal, runtime::Environment,
};

fn build_closure_source(size: usize) -> String {
    let mut src = String::with_capacity(size * 16 + 32);
    src.push_str("({ items: [");
    for i in 0..size {
        if i != 0 {
            src.push_str(", ");
        }
        let _ = write!(src, "{{ id: {}, label: \"item{}\" }}", i, i);
    }
    src.push_str("] })");
    src
}

fn bench_cached_call(c: &mut Criterion) {
    let mut env = Environment::new().expect("environment");
    let invoker = WorkletInvoker::new(
        WorkletDescriptor::builder("function add(a, b) { return a + b + this._closure.bias; }")
            .location("<bench:add>")
            .closure(Snapshot::object([("bias", Snapshot::Number(1.0))]))
            .build()
            .expect("descriptor"),
    );
    let args = [JsValue::from(2), JsValue::from(3)];

    c.bench_function("invoke/cached_call", |b| {
        b.iter(|| black_box(invoker.call(&mut env, &JsValue::undefined(), &args)))
    });
}

fn bench_first_call(c: &mut Criterion) {
    let descriptor = WorkletDescriptor::builder("function () { return 1; }")
        .location("<bench:first>")
        .build()
        .expect("descriptor");

    c.bench_function("invoke/materialize_and_call", |b| {
        b.iter_with_setup(
            || {
                (
                    Environment::new().expect("environment"),
                    WorkletInvoker::new(descriptor.clone()),
                )
            },
            |(mut env, invoker)| {
                black_box(invoker.call(&mut env, &JsValue::undefined(), &[]));
                drop(invoker);
                drop(env);
            },
        )
    });
}

fn bench_marshal(c: &mut Criterion) {
    let mut group = c.benchmark_group("marshal/closure");
    for size in [10usize, 100, 1000] {
        let mut source = Environment::new().expect("environment");
        let mut target = Environment::new().expect("environment");
        let value = source
            .eval(&build_closure_source(size), "<bench:closure>")
            .expect("closure");
        let snapshot = marshal::wrap(source.context_mut(), &value);

        group.bench_with_input(BenchmarkId::new("wrap", size), &size, |b, _| {
            b.iter(|| black_box(marshal::wrap(source.context_mut(), &value)))
        });
        group.bench_with_input(BenchmarkId::new("unwrap", size), &size, |b, _| {
            b.iter(|| black_box(marshal::unwrap(&snapshot, target.context_mut())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cached_call, bench_first_call, bench_marshal);
criterion_main!(benches);
