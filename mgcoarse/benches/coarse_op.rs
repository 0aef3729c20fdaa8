use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use mgcoarse::{
    blas::{inner_product_vec, norm2_vec, xmy_norm2_vec},
    field::CoarseSpinor,
    helpers::{clover_fixture, gauge_fixture, spinor_fixture},
    CoarseDiracOpBuilder, LatticeInfo,
};

fn coarse_op_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("Coarse Dirac operator");
    group
        .sample_size(20)
        .measurement_time(Duration::from_secs(10));

    for (n_colors, n_smt) in [(8, 1), (16, 1), (16, 2), (32, 2)] {
        let info = LatticeInfo::new([8, 8, 8, 8], n_colors, 2).unwrap();
        let op = CoarseDiracOpBuilder::new().n_smt(n_smt).build(&info);
        // The default team size may not be divisible by the SMT factor
        let Ok(op) = op else { continue };

        let gauge = gauge_fixture(&info, 0);
        let clover = clover_fixture(&info, 1);
        let input = spinor_fixture(&info, 2);
        let mut output = CoarseSpinor::new(&info);

        group.bench_function(
            format!("apply, n_colorspins={}, n_smt={}", 2 * n_colors, n_smt),
            |b| b.iter(|| op.unprec_apply(&mut output, &gauge, &clover, &input)),
        );

        group.bench_function(
            format!("dslash, n_colorspins={}, n_smt={}", 2 * n_colors, n_smt),
            |b| b.iter(|| op.dslash_parallel(&mut output, &gauge, &input, 0)),
        );
    }
}

fn coarse_blas(c: &mut Criterion) {
    let mut group = c.benchmark_group("Coarse BLAS");
    group
        .sample_size(20)
        .measurement_time(Duration::from_secs(5));

    let info = LatticeInfo::new([8, 8, 8, 8], 16, 2).unwrap();
    let x = spinor_fixture(&info, 0);
    let y = spinor_fixture(&info, 1);
    let mut z = spinor_fixture(&info, 2);

    group.bench_function("norm2", |b| b.iter(|| norm2_vec(&x)));
    group.bench_function("inner product", |b| b.iter(|| inner_product_vec(&x, &y)));
    group.bench_function("xmy_norm2", |b| b.iter(|| xmy_norm2_vec(&mut z, &y)));
}

criterion_group!(coarse_op, coarse_op_apply);
criterion_group!(blas, coarse_blas);

criterion_main!(coarse_op, blas);
