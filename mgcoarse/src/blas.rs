//! Level 1 BLAS over coarse spinors.
//!
//! Every kernel runs site parallel over both checkerboards on the current rayon pool. Reductions are
//! accumulated in `f64` and passed through the [`crate::comm::GlobalReduce`] of the first operand before
//! being returned, the order of the partial sums is not fixed.
use num_complex::Complex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::{
    field::CoarseSpinor,
    lattice::{assert_compatible, LatticeInfo},
    traits::CoarseField,
};

/// Golden ratio increment separating the seeds of neighbouring sites.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// `x = x - y`, returning `|x|^2` of the updated `x`.
pub fn xmy_norm2_vec(x: &mut CoarseSpinor, y: &CoarseSpinor) -> f64 {
    assert_compatible(x.info(), y.info());
    let offset = x.site_offset();

    let mut norm2 = x
        .data_mut()
        .par_chunks_mut(offset)
        .zip(y.data().par_chunks(offset))
        .map(|(xs, ys)| {
            let mut site_norm2 = 0f64;
            for (xi, &yi) in xs.iter_mut().zip(ys) {
                *xi -= yi;
                site_norm2 += (*xi as f64) * (*xi as f64);
            }
            site_norm2
        })
        .sum::<f64>();

    x.info().reducer().global_sum(&mut norm2);
    norm2
}

/// `|x|^2`, the sum of squared magnitudes of every component.
pub fn norm2_vec(x: &CoarseSpinor) -> f64 {
    let mut norm2 = x
        .data()
        .par_chunks(x.site_offset())
        .map(|xs| xs.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>())
        .sum::<f64>();

    x.info().reducer().global_sum(&mut norm2);
    norm2
}

/// `<x|y> = sum_i conj(x_i) y_i`.
///
/// Real and imaginary parts are reduced together as one array of two values.
pub fn inner_product_vec(x: &CoarseSpinor, y: &CoarseSpinor) -> Complex<f64> {
    assert_compatible(x.info(), y.info());
    let n_colorspins = x.n_colorspins();

    let partial = x
        .as_complex()
        .par_chunks(n_colorspins)
        .zip(y.as_complex().par_chunks(n_colorspins))
        .map(|(xs, ys)| {
            let mut site = [0f64; 2];
            for (xi, yi) in xs.iter().zip(ys) {
                let (xr, xim) = (xi.re as f64, xi.im as f64);
                let (yr, yim) = (yi.re as f64, yi.im as f64);
                site[0] += xr * yr + xim * yim;
                site[1] += xr * yim - xim * yr;
            }
            site
        })
        .reduce(|| [0f64; 2], |a, b| [a[0] + b[0], a[1] + b[1]]);

    let mut result = partial;
    x.info().reducer().global_sum_array(&mut result);
    Complex::new(result[0], result[1])
}

/// Set every component of `x` to zero.
pub fn zero_vec(x: &mut CoarseSpinor) {
    x.data_mut().par_iter_mut().for_each(|v| *v = 0f32);
}

/// `x = y`.
pub fn copy_vec(x: &mut CoarseSpinor, y: &CoarseSpinor) {
    assert_compatible(x.info(), y.info());
    x.data_mut()
        .par_iter_mut()
        .zip(y.data().par_iter())
        .for_each(|(xi, &yi)| *xi = yi);
}

/// `x = alpha x` for real `alpha`.
pub fn scale_vec(alpha: f32, x: &mut CoarseSpinor) {
    x.data_mut().par_iter_mut().for_each(|v| *v *= alpha);
}

/// `x = alpha x` for complex `alpha`.
pub fn scale_vec_complex(alpha: Complex<f32>, x: &mut CoarseSpinor) {
    x.as_complex_mut()
        .par_iter_mut()
        .for_each(|v| *v *= alpha);
}

/// `y = y + alpha x` for real `alpha`.
pub fn axpy_vec(alpha: f32, x: &CoarseSpinor, y: &mut CoarseSpinor) {
    assert_compatible(x.info(), y.info());
    y.data_mut()
        .par_iter_mut()
        .zip(x.data().par_iter())
        .for_each(|(yi, &xi)| *yi += alpha * xi);
}

/// `y = y + alpha x` for complex `alpha`.
pub fn axpy_vec_complex(alpha: Complex<f32>, x: &CoarseSpinor, y: &mut CoarseSpinor) {
    assert_compatible(x.info(), y.info());
    y.as_complex_mut()
        .par_iter_mut()
        .zip(x.as_complex().par_iter())
        .for_each(|(yi, &xi)| *yi += alpha * xi);
}

/// Fill every component of `x` with an independent standard normal draw.
///
/// Each worker seeds its own generator from the operating system, results differ between runs and
/// thread counts. See [`gaussian_seeded`] for a reproducible fill.
pub fn gaussian(x: &mut CoarseSpinor) {
    let offset = x.site_offset();
    x.data_mut().par_chunks_mut(offset).for_each_init(
        StdRng::from_entropy,
        |rng, site| {
            for v in site.iter_mut() {
                *v = rng.sample(StandardNormal);
            }
        },
    );
}

/// Fill every component of `x` with standard normal draws from a generator keyed by the global
/// lexicographic index of each site, the result depends only on the seed and the lattice.
///
/// # Arguments
/// * `x` - Spinor to fill.
/// * `seed` - Random seed.
pub fn gaussian_seeded(x: &mut CoarseSpinor, seed: u64) {
    let info: &LatticeInfo = x.info();
    let offset = x.site_offset();
    let n_cb_sites = info.n_cb_sites();

    x.data_mut()
        .par_chunks_mut(offset)
        .enumerate()
        .for_each(|(index, site)| {
            let coords = info.cb_index_to_coords(index / n_cb_sites, index % n_cb_sites);
            let global_site = info.coords_to_site(&coords) as u64;
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(global_site.wrapping_mul(SEED_STRIDE)));
            for v in site.iter_mut() {
                *v = rng.sample(StandardNormal);
            }
        });
}

/// Zero every link or chiral block of a gauge or clover field.
pub fn zero_gauge<'a, F: CoarseField<'a>>(field: &mut F) {
    field.data_mut().par_iter_mut().for_each(|v| *v = 0f32);
}
