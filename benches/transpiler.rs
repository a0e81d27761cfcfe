mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lualower::ast::File;
use lualower::{Options, Transpiler};

fn bench_transpiler(c: &mut Criterion) {
    let options = Options::default();

    for (label, tree) in common::workloads() {
        c.bench_function(&format!("transpile_{label}"), |b| {
            b.iter(|| {
                let out = Transpiler::new(&options)
                    .convert(black_box(&tree))
                    .expect("transpile");
                black_box(out);
            })
        });
    }

    let long = common::long_program(200);
    c.bench_function("transpile_long", |b| {
        b.iter(|| {
            let out = Transpiler::new(&options)
                .convert(black_box(&long))
                .expect("transpile");
            black_box(out);
        })
    });

    let source = common::WORKLOADS[0].1;
    let raw = std::fs::read_to_string(source).expect("read workload");
    c.bench_function("decode_and_transpile_closure", |b| {
        b.iter(|| {
            let tree: File = serde_json::from_str(black_box(&raw)).expect("decode");
            let out = lualower::transpile(&tree, &options).expect("transpile");
            black_box(out);
        })
    });
}

criterion_group!(benches, bench_transpiler);
criterion_main!(benches);
