//! Benchmarks cpipe (Criterion)
//!
//! Suites :
//!   1) tokenize : sources synthétiques de 16 à 1024 lignes
//!   2) cfg      : dérivation + couches, IR de référence puis IR répétée
//!   3) export   : rendus texte/dot et archive zip d'une session
//!
//! Lancement :
//!   cargo bench -p cpipe-benches
//!   cargo bench -p cpipe-benches -- --save-baseline main

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use cpipe_compiler::{Compiler, Session};
use cpipe_ir::{Instr, Opcode, Operation};
use cpipe_tools::{export_at, Artifact, Format};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;

const SNIPPET: &str = "int sum = a + b;\nif (sum > 10) { printf(\"big %d\", sum); }\nfor (int i = 0; i < 3; i++) { total = total * 2; }\n";

fn synthetic_source(lines: usize) -> String {
    let mut s = String::with_capacity(lines * 40);
    for i in 0..lines {
        let _ = writeln!(s, "int v{i} = {i} + w{i}; return v{i};");
    }
    s
}

/// IR de référence dupliquée `n` fois, étiquettes renommées pour rester bien formée.
fn repeated_ir(n: usize) -> Vec<Instr> {
    let base = cpipe_compiler::fixture_ir();
    let mut out = Vec::with_capacity(base.len() * n);
    for k in 0..n {
        for ins in &base {
            out.push(match ins {
                Instr::Label { label } => Instr::label(&format!("{label}_{k}")),
                Instr::Op(op) => {
                    let mut op = op.clone();
                    if let Some(t) = op.target.take() {
                        op.target = Some(format!("{t}_{k}"));
                    }
                    Instr::Op(op)
                }
            });
        }
    }
    out.push(Operation::new(Opcode::Ret).value(0).into());
    out
}

fn session() -> Session {
    let mut rng = StdRng::seed_from_u64(1);
    match Compiler::default().compile("compile_bench", SNIPPET, &mut rng) {
        Ok(s) => s,
        Err(e) => panic!("bench session: {e}"),
    }
}

fn bench_tokenize(c: &mut Criterion) {
    let mut g = c.benchmark_group("tokenize");
    g.bench_function("snippet", |b| b.iter(|| cpipe_lexer::tokenize(black_box(SNIPPET))));
    for lines in [16usize, 128, 1024] {
        let src = synthetic_source(lines);
        g.throughput(Throughput::Bytes(src.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(lines), &src, |b, s| b.iter(|| cpipe_lexer::tokenize(black_box(s))));
    }
    g.finish();
}

fn bench_cfg(c: &mut Criterion) {
    let mut g = c.benchmark_group("cfg");
    for n in [1usize, 16, 128] {
        let ir = repeated_ir(n);
        g.throughput(Throughput::Elements(ir.len() as u64));
        g.bench_with_input(BenchmarkId::new("derive+layers", n), &ir, |b, ir| {
            b.iter(|| {
                let cfg = cpipe_ir::derive_cfg(black_box(ir));
                cfg.layers()
            });
        });
    }
    g.finish();
}

fn bench_export(c: &mut Criterion) {
    let s = session();
    let now = NaiveDateTime::default();
    let mut g = c.benchmark_group("export");
    for (artifact, format) in [
        (Artifact::Tokens, Format::Txt),
        (Artifact::Ast, Format::Dot),
        (Artifact::Ir, Format::Txt),
        (Artifact::Cfg, Format::Dot),
        (Artifact::All, Format::Json),
    ] {
        g.bench_function(format!("{artifact}.{format}"), |b| {
            b.iter(|| export_at(black_box(&s), artifact, format, now).map(|d| d.bytes.len()));
        });
    }
    g.finish();
}

criterion_group!(benches, bench_tokenize, bench_cfg, bench_export);
criterion_main!(benches);
