//! Native call gateway benchmarks
//!
//! Measures the raw word gateway against typed calls through `FunctionCall`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nativecall::interop::{syscall15x, CallFrame};
use nativecall::{call_native, FunctionCall, ScalarKind, Value};

extern "C" fn add(a: usize, b: usize) -> usize {
    a.wrapping_add(b)
}

extern "C" fn mix(a: i32, x: f64, b: i64) -> f64 {
    a as f64 + x + b as f64
}

fn bench_raw_gateway(c: &mut Criterion) {
    let mut group = c.benchmark_group("gateway");

    for words in [0usize, 2, 6, 15] {
        let args: Vec<usize> = (0..words).collect();
        group.bench_with_input(BenchmarkId::new("words", words), &args, |b, args| {
            b.iter(|| unsafe { call_native(black_box(add as usize), black_box(args)) })
        });
    }

    group.bench_function("frame", |b| {
        let mut frame = CallFrame::with_args(add as usize, &[1, 2]).unwrap();
        b.iter(|| unsafe { nativecall::interop::call_frame(black_box(&mut frame)) })
    });

    group.finish();
}

fn bench_typed_call(c: &mut Criterion) {
    let call = FunctionCall::new(
        mix as usize,
        vec![ScalarKind::I32, ScalarKind::F64, ScalarKind::I64],
        Some(ScalarKind::F64),
    );
    let args = [Value::I32(1), Value::F64(2.5), Value::I64(3)];

    c.bench_function("typed_call", |b| {
        b.iter(|| unsafe { call.call(black_box(&args)) })
    });

    c.bench_function("syscall15x", |b| {
        b.iter(|| unsafe { syscall15x(black_box(add as usize), black_box(&[1, 2])) })
    });
}

criterion_group!(benches, bench_raw_gateway, bench_typed_call);
criterion_main!(benches);
