//! Seeded random fields, used as fixtures in tests and benchmarks.
use rand::{distributions::Uniform, prelude::Distribution, rngs::StdRng, SeedableRng};

use crate::{
    field::{CoarseClover, CoarseGauge, CoarseSpinor},
    lattice::LatticeInfo,
    traits::CoarseField,
};

fn fill_uniform<'a, F: CoarseField<'a>>(field: &mut F, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let between = Uniform::from(-1f32..1f32);
    for value in field.data_mut().iter_mut() {
        *value = between.sample(&mut rng);
    }
}

/// Spinor with components drawn uniformly from `[-1, 1)`.
///
/// # Arguments
/// * `info` - Geometry of the spinor.
/// * `seed` - Random seed.
pub fn spinor_fixture(info: &LatticeInfo, seed: u64) -> CoarseSpinor<'_> {
    let mut spinor = CoarseSpinor::new(info);
    fill_uniform(&mut spinor, seed);
    spinor
}

/// Gauge field with every link entry drawn uniformly from `[-1, 1)`.
///
/// # Arguments
/// * `info` - Geometry of the field.
/// * `seed` - Random seed.
pub fn gauge_fixture(info: &LatticeInfo, seed: u64) -> CoarseGauge<'_> {
    let mut gauge = CoarseGauge::new(info);
    fill_uniform(&mut gauge, seed);
    gauge
}

/// Clover field with every block entry drawn uniformly from `[-1, 1)`.
///
/// # Arguments
/// * `info` - Geometry of the field.
/// * `seed` - Random seed.
pub fn clover_fixture(info: &LatticeInfo, seed: u64) -> CoarseClover<'_> {
    let mut clover = CoarseClover::new(info);
    fill_uniform(&mut clover, seed);
    clover
}
