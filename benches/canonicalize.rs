//! Benchmarks for expression canonicalization.
//!
//! Measures the full tag/rank/rename pipeline for:
//! - A single small tree with repeated registers
//! - A batch of trees sharing registers
//! - Address anonymization against an image workspace
//! - Deep left-leaning trees
//! - Parallel canonicalization of independent batches

extern crate symcanon;

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use symcanon::prelude::*;

const I386_REGISTERS: [&str; 7] = ["eax", "ecx", "edx", "ebx", "esi", "edi", "ebp"];

fn v(name: &str) -> Expr {
    Expr::variable(name, 4)
}

fn image() -> MemoryWorkspace {
    let mut workspace = MemoryWorkspace::new();
    workspace.add_memory_map(0x56560000, 0x2000, "image");
    workspace.add_function(0x56561000, Some("kernel32.CreateFileA"));
    workspace.add_string(0x56560100, "hello");
    workspace
}

/// A left-leaning chain `((r0 + r1) * r2) ^ r3 ...` over the i386 registers.
fn chain(depth: usize) -> Expr {
    let kinds = [OperatorKind::Add, OperatorKind::Mul, OperatorKind::Xor];
    (1..depth).fold(v(I386_REGISTERS[0]), |acc, i| {
        Expr::binary(
            kinds[i % kinds.len()],
            acc,
            v(I386_REGISTERS[i % I386_REGISTERS.len()]),
        )
    })
}

/// Benchmark canonicalizing `(arg0 + ecx) * (ebx + ebx)`.
fn bench_canonicalize_small(c: &mut Criterion) {
    let registers = Architecture::I386.register_table();
    let workspace = image();
    let solver = SymbolicSolver::new();
    let engine = Canonicalizer::new(&solver, &registers, &workspace);
    let options = CanonicalizeOptions::default();
    let trees = [(v("arg0") + v("ecx")) * (v("ebx") + v("ebx"))];

    c.bench_function("canonicalize_small", |b| {
        b.iter(|| {
            let result = engine.canonicalize(black_box(&trees), None, &options).unwrap();
            black_box(result)
        });
    });
}

/// Benchmark a batch of 32 trees that share their registers.
fn bench_canonicalize_batch(c: &mut Criterion) {
    let registers = Architecture::I386.register_table();
    let workspace = image();
    let solver = SymbolicSolver::new();
    let engine = Canonicalizer::new(&solver, &registers, &workspace);
    let options = CanonicalizeOptions::default();
    let trees: Vec<Expr> = (0..32u64)
        .map(|i| {
            let reg = I386_REGISTERS[i as usize % I386_REGISTERS.len()];
            (v(reg) + Expr::constant(i, 4)) * (v("arg0") - v("ecx"))
        })
        .collect();

    c.bench_function("canonicalize_batch_32", |b| {
        b.iter(|| {
            let result = engine.canonicalize(black_box(&trees), None, &options).unwrap();
            black_box(result)
        });
    });
}

/// Benchmark address anonymization including thunk and string lookups.
fn bench_canonicalize_addresses(c: &mut Criterion) {
    let registers = Architecture::I386.register_table();
    let workspace = image();
    let solver = SymbolicSolver::new();
    let engine = Canonicalizer::new(&solver, &registers, &workspace);
    let options = CanonicalizeOptions::default().with_anonymize_addresses(true);
    let trees = [
        Expr::memory(Expr::constant(0x56560020, 4), Expr::constant(4, 4)) - v("eax"),
        v("arg0") + Expr::constant(0x56561000, 4),
        v("esi") ^ Expr::constant(0x56560100, 4),
    ];

    c.bench_function("canonicalize_addresses", |b| {
        b.iter(|| {
            let result = engine.canonicalize(black_box(&trees), None, &options).unwrap();
            black_box(result)
        });
    });
}

/// Benchmark a single deep tree; fingerprints grow with depth.
fn bench_canonicalize_deep(c: &mut Criterion) {
    let registers = Architecture::I386.register_table();
    let workspace = image();
    let solver = SymbolicSolver::new();
    let engine = Canonicalizer::new(&solver, &registers, &workspace);
    let options = CanonicalizeOptions::default();
    let trees = [chain(64)];

    c.bench_function("canonicalize_deep_64", |b| {
        b.iter(|| {
            let result = engine.canonicalize(black_box(&trees), None, &options).unwrap();
            black_box(result)
        });
    });
}

/// Benchmark 64 independent batches through the rayon pool.
fn bench_canonicalize_batches_parallel(c: &mut Criterion) {
    let registers = Architecture::I386.register_table();
    let workspace = image();
    let solver = SymbolicSolver::new();
    let engine = Canonicalizer::new(&solver, &registers, &workspace);
    let options = CanonicalizeOptions::default();
    let batches: Vec<Vec<Expr>> = (4..68).map(|depth| vec![chain(depth)]).collect();

    c.bench_function("canonicalize_batches_parallel_64", |b| {
        b.iter(|| {
            let results = engine.canonicalize_batches(black_box(&batches), None, &options);
            black_box(results)
        });
    });
}

criterion_group!(
    benches,
    bench_canonicalize_small,
    bench_canonicalize_batch,
    bench_canonicalize_addresses,
    bench_canonicalize_deep,
    bench_canonicalize_batches_parallel,
);
criterion_main!(benches);
