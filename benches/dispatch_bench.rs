//! Benchmark for method dispatch and resolve cascades.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mixin_runtime::{DefineOptions, Definition, Method, ModuleId, Runtime, Value};

/// Цепочка из `depth` модулей, каждый дописывает свой символ через super.
fn build_chain(rt: &mut Runtime, depth: usize) -> ModuleId {
    let mut previous = rt
        .new_module(
            Some("Root"),
            Definition::new().method("render", Method::new(|_, _| Ok(Value::Int(0)))),
            DefineOptions::default(),
        )
        .unwrap();
    for level in 0..depth {
        let method = Method::with_super(|rt, inv| {
            let below = inv.call_super(rt, vec![])?.as_int().unwrap_or(0);
            Ok(Value::Int(below + 1))
        });
        previous = rt
            .new_module(
                Some(&format!("Level{}", level)),
                Definition::new().include(previous).method("render", method),
                DefineOptions::default(),
            )
            .unwrap();
    }
    rt.new_class(Some("Leaf"), None, Definition::new().include(previous), DefineOptions::default())
        .unwrap()
}

fn benchmark_send_plain(c: &mut Criterion) {
    let mut rt = Runtime::new();
    let class = build_chain(&mut rt, 0);
    let obj = rt.instantiate(class, vec![]).unwrap();
    c.bench_function("send without super", |b| {
        b.iter(|| black_box(rt.send(obj, "render", vec![]).unwrap()));
    });
}

fn benchmark_send_super_chain(c: &mut Criterion) {
    let mut rt = Runtime::new();
    let class = build_chain(&mut rt, 16);
    let obj = rt.instantiate(class, vec![]).unwrap();
    c.bench_function("send through 16 super calls", |b| {
        b.iter(|| black_box(rt.send(obj, "render", vec![]).unwrap()));
    });
}

fn benchmark_resolve_cascade(c: &mut Criterion) {
    let mut rt = Runtime::new();
    let trait_module = rt
        .new_module(Some("Shared"), Definition::new(), DefineOptions::default())
        .unwrap();
    for i in 0..32 {
        rt.new_class(
            Some(&format!("Class{}", i)),
            None,
            Definition::new().include(trait_module),
            DefineOptions::default(),
        )
        .unwrap();
    }
    c.bench_function("resolve trait with 32 dependent classes", |b| {
        b.iter(|| black_box(rt.resolve(trait_module).unwrap()));
    });
}

criterion_group!(
    benches,
    benchmark_send_plain,
    benchmark_send_super_chain,
    benchmark_resolve_cascade
);
criterion_main!(benches);
