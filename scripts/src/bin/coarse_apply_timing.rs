//! Time the full coarse Dirac operator on random coarse fields
use std::time::Instant;

use clap::Parser;
use mgcoarse::{
    blas::{gaussian_seeded, norm2_vec},
    field::CoarseSpinor,
    helpers::{clover_fixture, gauge_fixture},
    CoarseDiracOpBuilder, CoarseError, LatticeInfo,
};

/// Struct for parsing command-line arguments
#[derive(Parser)]
struct Args {
    /// Lattice extents, ordered x y z t
    #[arg(long, num_args = 4, default_values_t = [8usize, 8, 8, 8])]
    dims: Vec<usize>,

    /// Colours per coarse site, the number of near null vectors
    #[arg(long, default_value_t = 8)]
    n_colors: usize,

    /// Spins per coarse site, the number of aggregates
    #[arg(long, default_value_t = 2)]
    n_spins: usize,

    /// Size of the thread team, defaults to the rayon default
    #[arg(long)]
    n_threads: Option<usize>,

    /// Threads per core
    #[arg(long, default_value_t = 1)]
    n_smt: usize,

    /// Number of timed applications
    #[arg(long, default_value_t = 100)]
    iterations: usize,
}

fn main() -> Result<(), CoarseError> {
    let args = Args::parse();

    let dims: [usize; 4] = args.dims.as_slice().try_into().map_err(|_| {
        CoarseError::InvalidGeometry(format!("expected 4 lattice extents, found {:?}", args.dims))
    })?;
    let info = LatticeInfo::new(dims, args.n_colors, args.n_spins)?;

    let op = CoarseDiracOpBuilder::new()
        .n_threads(args.n_threads)
        .n_smt(args.n_smt)
        .build(&info)?;

    let gauge = gauge_fixture(&info, 0);
    let clover = clover_fixture(&info, 1);
    let mut input = CoarseSpinor::new(&info);
    gaussian_seeded(&mut input, 2);
    let mut output = CoarseSpinor::new(&info);

    // Warm up
    op.unprec_apply(&mut output, &gauge, &clover, &input);

    let start = Instant::now();
    for _ in 0..args.iterations {
        op.unprec_apply(&mut output, &gauge, &clover, &input);
    }
    let runtime = start.elapsed();

    let ncs = info.n_colorspins() as f64;
    let half = ncs / 2.0;
    // A complex multiply-add is 8 flops, 8 dense links and 2 chiral blocks per site
    let flops_per_site = 8.0 * (8.0 * ncs * ncs + 2.0 * half * half);
    let total_flops = flops_per_site * info.n_sites() as f64 * args.iterations as f64;
    let seconds = runtime.as_secs_f64();

    println!(
        "dims={:?} n_colorspins={} n_threads={} n_smt={} isa={}",
        dims,
        info.n_colorspins(),
        op.n_threads(),
        op.n_smt(),
        op.isa().target_name()
    );
    println!(
        "iterations={} time={:.3}s per_apply={:.3}ms gflops={:.2} |out|^2={:.6e}",
        args.iterations,
        seconds,
        1e3 * seconds / args.iterations.max(1) as f64,
        total_flops / seconds / 1e9,
        norm2_vec(&output)
    );

    Ok(())
}
