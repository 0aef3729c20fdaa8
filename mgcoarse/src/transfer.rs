//! Aggregation based transfer between a fine lattice and its blocked coarse lattice.
//!
//! Near null vectors are fine spinors (`n_spins = 4`, `n_colors = 3`, colour-spin index
//! `color + n_colors * spin`). Restricted to one block and one aggregate they form the coarse basis of
//! that block, so a coarse site corresponds to a block and carries `n_vecs` colours per aggregate, with
//! coarse colour-spin index `vec + n_vecs * aggregate`.
//!
//! Block reductions are local to the block and never pass through the global reducer.
use itertools::iproduct;
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    aggregation::Aggregation,
    block::{Block, BlockList},
    constants::N_DIM,
    field::CoarseSpinor,
    lattice::{assert_compatible, LatticeInfo},
    traits::CoarseField,
};

/// Ratio of norms after and before projection below which a vector is treated as linearly dependent.
const LINEAR_DEPENDENCE_TOLERANCE: f64 = 1e-5;

/// Colour-spin indices of an aggregate, spin major.
///
/// Panics if the fine lattice does not carry every spin and colour the aggregate reads.
#[track_caller]
fn aggregate_components<A: Aggregation + ?Sized>(
    aggregation: &A,
    aggregate: usize,
    info: &LatticeInfo,
) -> Vec<usize> {
    let (n_colors, n_spins) = (info.n_colors(), info.n_spins());
    let spins = aggregation.source_spins(aggregate);
    let colors = aggregation.source_colors(aggregate);
    assert!(
        spins.iter().all(|&spin| spin < n_spins) && colors.iter().all(|&color| color < n_colors),
        "Fine lattice with {} colours and {} spins cannot hold aggregate {} (spins {:?}, colours {:?})",
        n_colors,
        n_spins,
        aggregate,
        spins,
        colors
    );

    iproduct!(
        aggregation.source_spins(aggregate).iter(),
        aggregation.source_colors(aggregate).iter()
    )
    .map(|(&spin, &color)| color + n_colors * spin)
    .collect()
}

/// Checkerboard coordinates of the sites of a block.
fn block_cb_sites<'b>(
    info: &'b LatticeInfo,
    block: &'b Block,
) -> impl Iterator<Item = (usize, usize)> + 'b {
    block
        .site_list()
        .iter()
        .map(move |&site| info.site_to_cb_index(site))
}

#[inline]
fn widen(z: Complex<f32>) -> Complex<f64> {
    Complex::new(z.re as f64, z.im as f64)
}

#[inline]
fn narrow(z: Complex<f64>) -> Complex<f32> {
    Complex::new(z.re as f32, z.im as f32)
}

/// `|v|^2` over the components of one aggregate on one block.
pub fn norm2_block_aggr<A: Aggregation + ?Sized>(
    v: &CoarseSpinor,
    block: &Block,
    aggregation: &A,
    aggregate: usize,
) -> f64 {
    let components = aggregate_components(aggregation, aggregate, v.info());

    block_cb_sites(v.info(), block)
        .map(|(cb, cb_site)| {
            let site = v.site_complex(cb, cb_site);
            components
                .iter()
                .map(|&c| widen(site[c]).norm_sqr())
                .sum::<f64>()
        })
        .sum()
}

/// `<left|right>` over the components of one aggregate on one block.
pub fn inner_product_block_aggr<A: Aggregation + ?Sized>(
    left: &CoarseSpinor,
    right: &CoarseSpinor,
    block: &Block,
    aggregation: &A,
    aggregate: usize,
) -> Complex<f64> {
    assert_compatible(left.info(), right.info());
    let components = aggregate_components(aggregation, aggregate, left.info());

    block_cb_sites(left.info(), block)
        .map(|(cb, cb_site)| {
            let l = left.site_complex(cb, cb_site);
            let r = right.site_complex(cb, cb_site);
            components
                .iter()
                .map(|&c| widen(l[c]).conj() * widen(r[c]))
                .sum::<Complex<f64>>()
        })
        .sum()
}

/// `v = alpha v` on the components of one aggregate on one block.
pub fn ax_block_aggr<A: Aggregation + ?Sized>(
    alpha: f64,
    v: &mut CoarseSpinor,
    block: &Block,
    aggregation: &A,
    aggregate: usize,
) {
    let info = v.info();
    let components = aggregate_components(aggregation, aggregate, info);

    for (cb, cb_site) in block_cb_sites(info, block) {
        let site = v.site_complex_mut(cb, cb_site);
        for &c in components.iter() {
            site[c] = narrow(widen(site[c]) * alpha);
        }
    }
}

/// `y = y + alpha x` on the components of one aggregate on one block.
pub fn caxpy_block_aggr<A: Aggregation + ?Sized>(
    alpha: Complex<f64>,
    x: &CoarseSpinor,
    y: &mut CoarseSpinor,
    block: &Block,
    aggregation: &A,
    aggregate: usize,
) {
    assert_compatible(x.info(), y.info());
    let info = y.info();
    let components = aggregate_components(aggregation, aggregate, info);

    for (cb, cb_site) in block_cb_sites(info, block) {
        let xs = x.site_complex(cb, cb_site);
        let ys = y.site_complex_mut(cb, cb_site);
        for &c in components.iter() {
            ys[c] = narrow(widen(ys[c]) + alpha * widen(xs[c]));
        }
    }
}

/// Copy the components of one aggregate on one block from `src` into `target`, every other component
/// of `target` is zeroed.
pub fn extract_aggregate<A: Aggregation + ?Sized>(
    target: &mut CoarseSpinor,
    src: &CoarseSpinor,
    block: &Block,
    aggregation: &A,
    aggregate: usize,
) {
    assert_compatible(target.info(), src.info());
    let info = src.info();
    let components = aggregate_components(aggregation, aggregate, info);

    target.data_mut().fill(0f32);
    for (cb, cb_site) in block_cb_sites(info, block) {
        let s = src.site_complex(cb, cb_site);
        let t = target.site_complex_mut(cb, cb_site);
        for &c in components.iter() {
            t[c] = s[c];
        }
    }
}

/// Orthonormalise the near null vectors on every block and aggregate with modified Gram-Schmidt.
///
/// A vector which is linearly dependent on its predecessors on some block and aggregate is zeroed
/// there, and a warning is logged.
///
/// # Arguments
/// * `vecs` - Near null vectors, updated in place.
/// * `blocks` - Blocks of the fine lattice.
/// * `aggregation` - Aggregates of the fine degrees of freedom.
pub fn orthonormalize_block_aggregates<A: Aggregation + ?Sized>(
    vecs: &mut [CoarseSpinor],
    blocks: &BlockList,
    aggregation: &A,
) {
    for (block_index, block) in blocks.blocks().iter().enumerate() {
        for aggregate in 0..aggregation.n_aggregates() {
            for current in 0..vecs.len() {
                let (done, rest) = vecs.split_at_mut(current);
                let vec = &mut rest[0];
                let initial = norm2_block_aggr(vec, block, aggregation, aggregate).sqrt();

                for prev in done.iter() {
                    let projection = inner_product_block_aggr(prev, vec, block, aggregation, aggregate);
                    caxpy_block_aggr(-projection, prev, vec, block, aggregation, aggregate);
                }

                let norm = norm2_block_aggr(vec, block, aggregation, aggregate).sqrt();
                if norm <= LINEAR_DEPENDENCE_TOLERANCE * initial {
                    tracing::warn!(
                        block = block_index,
                        aggregate,
                        vec = current,
                        norm,
                        "linearly dependent near null vector"
                    );
                    ax_block_aggr(0.0, vec, block, aggregation, aggregate);
                } else {
                    ax_block_aggr(1.0 / norm, vec, block, aggregation, aggregate);
                }
            }
        }
    }
}

/// Panics unless the coarse lattice is the blocked lattice carrying one colour per vector and one spin
/// per aggregate.
#[track_caller]
fn assert_coarse_geometry<A: Aggregation + ?Sized>(
    coarse: &LatticeInfo,
    blocks: &BlockList,
    aggregation: &A,
    n_vecs: usize,
) {
    let matches = coarse.lattice_dims() == blocks.blocked_lattice_dims()
        && aggregation.blocks_per_dim() == blocks.blocked_lattice_dims()
        && coarse.n_spins() == aggregation.n_aggregates()
        && coarse.n_colors() == n_vecs;

    if !matches {
        tracing::error!(
            coarse_dims = ?coarse.lattice_dims(),
            blocked_dims = ?blocks.blocked_lattice_dims(),
            n_colors = coarse.n_colors(),
            n_spins = coarse.n_spins(),
            n_vecs,
            n_aggregates = aggregation.n_aggregates(),
            "incompatible coarse lattice"
        );
        panic!(
            "Incompatible coarse lattice: dims {:?} with {} colours and {} spins, blocks {:?} with {} vectors and {} aggregates",
            coarse.lattice_dims(),
            coarse.n_colors(),
            coarse.n_spins(),
            blocks.blocked_lattice_dims(),
            n_vecs,
            aggregation.n_aggregates()
        );
    }
}

/// Restrict a fine spinor to the coarse lattice, `coarse[vec + n_vecs * aggr] = <v_vec|fine>` over
/// each block and aggregate.
///
/// # Arguments
/// * `blocks` - Blocks of the fine lattice, block `b` is coarse site `b`.
/// * `aggregation` - Aggregates of the fine degrees of freedom.
/// * `vecs` - Near null vectors, orthonormal on every block and aggregate.
/// * `fine_in` - Fine spinor.
/// * `coarse_out` - Coarse spinor, overwritten.
pub fn restrict_spinor<A: Aggregation + Sync + ?Sized>(
    blocks: &BlockList,
    aggregation: &A,
    vecs: &[CoarseSpinor],
    fine_in: &CoarseSpinor,
    coarse_out: &mut CoarseSpinor,
) {
    let n_vecs = vecs.len();
    let coarse_info = coarse_out.info();
    assert_coarse_geometry(coarse_info, blocks, aggregation, n_vecs);
    for vec in vecs.iter() {
        assert_compatible(vec.info(), fine_in.info());
    }

    let coarse_sites: Vec<Vec<Complex<f32>>> = blocks
        .blocks()
        .par_iter()
        .map(|block| {
            let mut site = vec![Complex::new(0f32, 0f32); coarse_info.n_colorspins()];
            for (aggregate, (index, vec)) in
                iproduct!(0..aggregation.n_aggregates(), vecs.iter().enumerate())
            {
                let projection =
                    inner_product_block_aggr(vec, fine_in, block, aggregation, aggregate);
                site[index + n_vecs * aggregate] = narrow(projection);
            }
            site
        })
        .collect();

    for (coarse_site, values) in coarse_sites.iter().enumerate() {
        let (cb, cb_site) = coarse_info.site_to_cb_index(coarse_site);
        coarse_out
            .site_complex_mut(cb, cb_site)
            .copy_from_slice(values);
    }
}

/// Prolongate a coarse spinor to the fine lattice, `fine = sum_vec v_vec coarse[vec + n_vecs * aggr]`
/// on each block and aggregate.
///
/// # Arguments
/// * `blocks` - Blocks of the fine lattice, block `b` is coarse site `b`.
/// * `aggregation` - Aggregates of the fine degrees of freedom.
/// * `vecs` - Near null vectors.
/// * `coarse_in` - Coarse spinor.
/// * `fine_out` - Fine spinor, overwritten.
pub fn prolongate_spinor<A: Aggregation + Sync + ?Sized>(
    blocks: &BlockList,
    aggregation: &A,
    vecs: &[CoarseSpinor],
    coarse_in: &CoarseSpinor,
    fine_out: &mut CoarseSpinor,
) {
    let n_vecs = vecs.len();
    let coarse_info = coarse_in.info();
    let fine_info = fine_out.info();
    assert_coarse_geometry(coarse_info, blocks, aggregation, n_vecs);
    for vec in vecs.iter() {
        assert_compatible(vec.info(), fine_info);
    }

    let block_dims = *aggregation.block_dims();
    let n_cb_sites = fine_info.n_cb_sites();
    let aggregates: Vec<Vec<usize>> = (0..aggregation.n_aggregates())
        .map(|aggregate| aggregate_components(aggregation, aggregate, fine_info))
        .collect();

    fine_out
        .as_complex_mut()
        .par_chunks_mut(fine_info.n_colorspins())
        .enumerate()
        .for_each(|(index, site_out)| {
            let (cb, cb_site) = (index / n_cb_sites, index % n_cb_sites);
            let coords = fine_info.cb_index_to_coords(cb, cb_site);

            let mut block_coords = [0; N_DIM];
            for mu in 0..N_DIM {
                block_coords[mu] = coords[mu] / block_dims[mu];
            }
            let (coarse_cb, coarse_cb_site) = coarse_info.coords_to_cb_index(&block_coords);
            let coarse_site = coarse_in.site_complex(coarse_cb, coarse_cb_site);

            site_out.fill(Complex::new(0f32, 0f32));
            for (aggregate, components) in aggregates.iter().enumerate() {
                for &c in components.iter() {
                    let value = vecs
                        .iter()
                        .enumerate()
                        .map(|(vec_index, vec)| {
                            widen(vec.site_complex(cb, cb_site)[c])
                                * widen(coarse_site[vec_index + n_vecs * aggregate])
                        })
                        .sum::<Complex<f64>>();
                    site_out[c] = narrow(value);
                }
            }
        });
}
