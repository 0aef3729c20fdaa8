//! The coarse grid Dirac operator.
//!
//! At every site of the target checkerboard the operator applies the chiral clover blocks to the local
//! spinor and accumulates the eight stencil links applied to the neighbouring spinors, which live on the
//! opposite checkerboard. Boundaries are periodic.
//!
//! Work is statically partitioned over the operator's thread team at construction, see
//! [`crate::thread_limits`]. The per-thread entry points take a rank and cover exactly that rank's
//! share of the output, so a full application is one call per rank. The `_parallel` drivers make those
//! calls on the operator's own pool.
use pulp::{Simd, WithSimd};
use rayon::ThreadPool;

use crate::{
    builder::CoarseDiracOpBuilder,
    constants::{N_CHECKERBOARD, N_CHIRALITY, N_COMPLEX, N_DIRECTIONS, N_GAUGE_LINKS},
    error::CoarseError,
    field::{CoarseClover, CoarseGauge, CoarseSpinor},
    isa::Isa,
    lattice::LatticeInfo,
    matvec::{cmat_mult_add_rows, cmat_mult_rows},
    send_ptr::SendPtrMut,
    thread_limits::{ThreadLimits, ThreadPartition},
    traits::CoarseField,
};

/// Which part of the operator a kernel evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    /// Clover term plus all stencil directions.
    Full,
    /// Stencil directions only.
    Dslash,
    /// Clover term only.
    Clover,
    /// A single stencil direction.
    Direction(usize),
}

/// Coarse Dirac operator bound to a lattice and a fixed thread team.
#[derive(Debug)]
pub struct CoarseDiracOp<'a> {
    pub(crate) info: &'a LatticeInfo,
    pub(crate) n_colorspins: usize,
    pub(crate) n_chiral_colorspins: usize,
    pub(crate) n_xh: usize,
    pub(crate) n_x: usize,
    pub(crate) n_y: usize,
    pub(crate) n_z: usize,
    pub(crate) n_t: usize,
    pub(crate) partition: ThreadPartition,
    pub(crate) pool: ThreadPool,
    pub(crate) isa: Isa,
}

impl<'a> CoarseDiracOp<'a> {
    /// Operator on a pool of `rayon::current_num_threads()` threads.
    ///
    /// # Arguments
    /// * `info` - Geometry of the fields the operator acts on.
    /// * `n_smt` - Threads per core, must divide the number of threads.
    pub fn new(info: &'a LatticeInfo, n_smt: usize) -> Result<Self, CoarseError> {
        CoarseDiracOpBuilder::new().n_smt(n_smt).build(info)
    }

    /// Geometry of the fields the operator acts on.
    pub fn info(&self) -> &'a LatticeInfo {
        self.info
    }

    /// Number of colour-spin components per site.
    pub fn n_colorspins(&self) -> usize {
        self.n_colorspins
    }

    /// Number of vector rows in a site's output.
    pub fn n_vrows(&self) -> usize {
        self.partition.n_vrows()
    }

    /// Size of the thread team.
    pub fn n_threads(&self) -> usize {
        self.partition.n_threads()
    }

    /// Threads per core.
    pub fn n_smt(&self) -> usize {
        self.partition.n_smt()
    }

    /// Work assigned to a thread.
    pub fn thread_limits(&self, tid: usize) -> &ThreadLimits {
        self.partition.limits(tid)
    }

    /// Instruction set the kernels run with.
    pub fn isa(&self) -> Isa {
        self.isa
    }

    /// Checkerboard site indices of the eight periodic neighbours of a site, on the opposite
    /// checkerboard, ordered `x+, x-, y+, y-, z+, z-, t+, t-`.
    ///
    /// # Arguments
    /// * `target_cb` - Checkerboard of the site.
    /// * `cb_site` - Index of the site on its checkerboard.
    #[inline(always)]
    pub fn neighbours(&self, target_cb: usize, cb_site: usize) -> [usize; N_DIRECTIONS] {
        let (n_xh, n_x, n_y, n_z, n_t) = (self.n_xh, self.n_x, self.n_y, self.n_z, self.n_t);

        let yzt = cb_site / n_xh;
        let xcb = cb_site - n_xh * yzt;
        let zt = yzt / n_y;
        let y = yzt - n_y * zt;
        let t = zt / n_z;
        let z = zt - n_z * t;
        let x = 2 * xcb + ((target_cb + y + z + t) & 1);

        let x_plus = (if x < n_x - 1 { x + 1 } else { 0 }) / 2;
        let x_minus = (if x > 0 { x - 1 } else { n_x - 1 }) / 2;
        let y_plus = if y < n_y - 1 { y + 1 } else { 0 };
        let y_minus = if y > 0 { y - 1 } else { n_y - 1 };
        let z_plus = if z < n_z - 1 { z + 1 } else { 0 };
        let z_minus = if z > 0 { z - 1 } else { n_z - 1 };
        let t_plus = if t < n_t - 1 { t + 1 } else { 0 };
        let t_minus = if t > 0 { t - 1 } else { n_t - 1 };

        let index = |xcb: usize, y: usize, z: usize, t: usize| xcb + n_xh * (y + n_y * (z + n_z * t));

        [
            index(x_plus, y, z, t),
            index(x_minus, y, z, t),
            index(xcb, y_plus, z, t),
            index(xcb, y_minus, z, t),
            index(xcb, y, z_plus, t),
            index(xcb, y, z_minus, t),
            index(xcb, y, z, t_plus),
            index(xcb, y, z, t_minus),
        ]
    }

    /// Apply the full operator on one thread's share of the target checkerboard,
    /// `out = A_clov in + sum_mu U_mu in(x + mu)`.
    ///
    /// Only the output rows and sites assigned to `tid` are written.
    ///
    /// # Arguments
    /// * `out` - Output spinor.
    /// * `gauge` - Stencil links.
    /// * `clover` - Chiral clover blocks.
    /// * `input` - Input spinor, read on the target checkerboard for the clover term and on the opposite
    ///   checkerboard for the stencil.
    /// * `target_cb` - Checkerboard written.
    /// * `tid` - Rank of the calling thread in the operator's team.
    pub fn apply(
        &self,
        out: &mut CoarseSpinor,
        gauge: &CoarseGauge,
        clover: &CoarseClover,
        input: &CoarseSpinor,
        target_cb: usize,
        tid: usize,
    ) {
        self.run_thread(
            Term::Full,
            out,
            gauge.data(),
            clover.data(),
            input.data(),
            target_cb,
            tid,
        )
    }

    /// Apply the stencil term only on one thread's share of the target checkerboard, the output is
    /// zeroed before accumulating the eight directions.
    ///
    /// # Arguments
    /// * `out` - Output spinor.
    /// * `gauge` - Stencil links.
    /// * `input` - Input spinor, read on the opposite checkerboard.
    /// * `target_cb` - Checkerboard written.
    /// * `tid` - Rank of the calling thread in the operator's team.
    pub fn dslash(
        &self,
        out: &mut CoarseSpinor,
        gauge: &CoarseGauge,
        input: &CoarseSpinor,
        target_cb: usize,
        tid: usize,
    ) {
        self.run_thread(Term::Dslash, out, gauge.data(), &[], input.data(), target_cb, tid)
    }

    /// Apply the clover term only on one thread's share of the target checkerboard.
    ///
    /// # Arguments
    /// * `out` - Output spinor.
    /// * `clover` - Chiral clover blocks.
    /// * `input` - Input spinor, read on the target checkerboard.
    /// * `target_cb` - Checkerboard written.
    /// * `tid` - Rank of the calling thread in the operator's team.
    pub fn clover_apply(
        &self,
        out: &mut CoarseSpinor,
        clover: &CoarseClover,
        input: &CoarseSpinor,
        target_cb: usize,
        tid: usize,
    ) {
        self.run_thread(Term::Clover, out, &[], clover.data(), input.data(), target_cb, tid)
    }

    /// Apply a single stencil direction on one thread's share of the target checkerboard, overwriting
    /// the output.
    ///
    /// # Arguments
    /// * `out` - Output spinor.
    /// * `gauge` - Stencil links.
    /// * `input` - Input spinor, read on the opposite checkerboard.
    /// * `target_cb` - Checkerboard written.
    /// * `dir` - Direction, `0..8` ordered `x+, x-, y+, y-, z+, z-, t+, t-`.
    /// * `tid` - Rank of the calling thread in the operator's team.
    pub fn dslash_dir(
        &self,
        out: &mut CoarseSpinor,
        gauge: &CoarseGauge,
        input: &CoarseSpinor,
        target_cb: usize,
        dir: usize,
        tid: usize,
    ) {
        assert!(dir < N_DIRECTIONS, "Invalid stencil direction {}", dir);
        self.run_thread(
            Term::Direction(dir),
            out,
            gauge.data(),
            &[],
            input.data(),
            target_cb,
            tid,
        )
    }

    /// [`CoarseDiracOp::apply`] for every rank of the operator's team, covering the whole target
    /// checkerboard.
    pub fn apply_parallel(
        &self,
        out: &mut CoarseSpinor,
        gauge: &CoarseGauge,
        clover: &CoarseClover,
        input: &CoarseSpinor,
        target_cb: usize,
    ) {
        self.run_parallel(
            Term::Full,
            out,
            gauge.data(),
            clover.data(),
            input.data(),
            target_cb,
        )
    }

    /// [`CoarseDiracOp::dslash`] for every rank of the operator's team.
    pub fn dslash_parallel(
        &self,
        out: &mut CoarseSpinor,
        gauge: &CoarseGauge,
        input: &CoarseSpinor,
        target_cb: usize,
    ) {
        self.run_parallel(Term::Dslash, out, gauge.data(), &[], input.data(), target_cb)
    }

    /// [`CoarseDiracOp::clover_apply`] for every rank of the operator's team.
    pub fn clover_apply_parallel(
        &self,
        out: &mut CoarseSpinor,
        clover: &CoarseClover,
        input: &CoarseSpinor,
        target_cb: usize,
    ) {
        self.run_parallel(Term::Clover, out, &[], clover.data(), input.data(), target_cb)
    }

    /// Apply the full operator to both checkerboards.
    pub fn unprec_apply(
        &self,
        out: &mut CoarseSpinor,
        gauge: &CoarseGauge,
        clover: &CoarseClover,
        input: &CoarseSpinor,
    ) {
        for target_cb in 0..N_CHECKERBOARD {
            self.apply_parallel(out, gauge, clover, input, target_cb);
        }
    }

    /// Tiles are written through a raw pointer, so the output length is checked once per call.
    fn check_output(&self, out: &CoarseSpinor, target_cb: usize) {
        assert!(
            target_cb < N_CHECKERBOARD,
            "Invalid target checkerboard {}",
            target_cb
        );
        let expected = N_CHECKERBOARD * self.info.n_cb_sites() * N_COMPLEX * self.n_colorspins;
        assert_eq!(
            out.data().len(),
            expected,
            "Output spinor has {} floats, operator expects {}",
            out.data().len(),
            expected
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn run_thread(
        &self,
        term: Term,
        out: &mut CoarseSpinor,
        gauge: &[f32],
        clover: &[f32],
        input: &[f32],
        target_cb: usize,
        tid: usize,
    ) {
        self.check_output(out, target_cb);
        let limits = *self.partition.limits(tid);

        self.isa.vectorize(SiteKernel {
            op: self,
            term,
            out: SendPtrMut::new(out.data_mut()),
            gauge,
            clover,
            input,
            target_cb,
            limits,
        })
    }

    fn run_parallel(
        &self,
        term: Term,
        out: &mut CoarseSpinor,
        gauge: &[f32],
        clover: &[f32],
        input: &[f32],
        target_cb: usize,
    ) {
        self.check_output(out, target_cb);
        let out = SendPtrMut::new(out.data_mut());

        self.pool.broadcast(|ctx| {
            let limits = *self.partition.limits(ctx.index());
            self.isa.vectorize(SiteKernel {
                op: self,
                term,
                out,
                gauge,
                clover,
                input,
                target_cb,
                limits,
            })
        });
    }
}

/// One thread's share of an operator application.
struct SiteKernel<'op, 'a, 'b> {
    op: &'op CoarseDiracOp<'a>,
    term: Term,
    out: SendPtrMut<f32>,
    gauge: &'b [f32],
    clover: &'b [f32],
    input: &'b [f32],
    target_cb: usize,
    limits: ThreadLimits,
}

impl WithSimd for SiteKernel<'_, '_, '_> {
    type Output = ();

    #[inline(always)]
    fn with_simd<S: Simd>(self, _simd: S) -> Self::Output {
        let op = self.op;
        let n_colorspins = op.n_colorspins;
        let (row_min, row_max) = self.limits.rows(n_colorspins);
        if row_min == row_max {
            return;
        }

        let n_cb_sites = op.info.n_cb_sites();
        let spinor_offset = N_COMPLEX * n_colorspins;
        let link_offset = N_COMPLEX * n_colorspins * n_colorspins;
        let gauge_offset = N_GAUGE_LINKS * link_offset;
        let half = op.n_chiral_colorspins;
        let block_offset = N_COMPLEX * half * half;
        let clover_offset = N_CHIRALITY * block_offset;

        let source_cb = 1 - self.target_cb;
        let source = &self.input
            [source_cb * n_cb_sites * spinor_offset..(source_cb + 1) * n_cb_sites * spinor_offset];
        let tile_len = N_COMPLEX * (row_max - row_min);

        for site in self.limits.min_site..self.limits.max_site {
            let target_site = self.target_cb * n_cb_sites + site;

            // SAFETY: the output length was checked against the operator geometry. Ranks own disjoint
            // (site, row) tiles, ranks sharing a site range own disjoint row ranges.
            let out = unsafe {
                std::slice::from_raw_parts_mut(
                    self.out
                        .raw
                        .add(target_site * spinor_offset + N_COMPLEX * row_min),
                    tile_len,
                )
            };

            match self.term {
                Term::Full | Term::Clover => {
                    let local = &self.input[target_site * spinor_offset..(target_site + 1) * spinor_offset];
                    let blocks = &self.clover
                        [target_site * clover_offset..(target_site + 1) * clover_offset];

                    // Chirality 0 owns rows 0..half, chirality 1 owns rows half..n_colorspins
                    let upper_max = row_max.min(half);
                    if row_min < upper_max {
                        cmat_mult_rows(
                            &mut out[..N_COMPLEX * (upper_max - row_min)],
                            &blocks[..block_offset],
                            &local[..N_COMPLEX * half],
                            half,
                            row_min,
                            upper_max,
                        );
                    }

                    let lower_min = row_min.max(half);
                    if lower_min < row_max {
                        cmat_mult_rows(
                            &mut out[N_COMPLEX * (lower_min - row_min)..],
                            &blocks[block_offset..],
                            &local[N_COMPLEX * half..],
                            half,
                            lower_min - half,
                            row_max - half,
                        );
                    }
                }
                Term::Dslash => out.fill(0f32),
                Term::Direction(_) => {}
            }

            match self.term {
                Term::Full | Term::Dslash => {
                    let links =
                        &self.gauge[target_site * gauge_offset..(target_site + 1) * gauge_offset];
                    for (link, neighbour) in links
                        .chunks_exact(link_offset)
                        .zip(op.neighbours(self.target_cb, site))
                    {
                        cmat_mult_add_rows(
                            out,
                            link,
                            &source[neighbour * spinor_offset..(neighbour + 1) * spinor_offset],
                            n_colorspins,
                            row_min,
                            row_max,
                        );
                    }
                }
                Term::Direction(dir) => {
                    let link = &self.gauge[target_site * gauge_offset + dir * link_offset
                        ..target_site * gauge_offset + (dir + 1) * link_offset];
                    let neighbour = op.neighbours(self.target_cb, site)[dir];
                    cmat_mult_rows(
                        out,
                        link,
                        &source[neighbour * spinor_offset..(neighbour + 1) * spinor_offset],
                        n_colorspins,
                        row_min,
                        row_max,
                    );
                }
                Term::Clover => {}
            }
        }
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use num_complex::Complex;

    use crate::{
        builder::CoarseDiracOpBuilder,
        constants::{N_CHECKERBOARD, N_DIM, N_DIRECTIONS},
        field::{CoarseClover, CoarseGauge, CoarseSpinor},
        helpers::{clover_fixture, gauge_fixture, spinor_fixture},
        isa::Isa,
        lattice::LatticeInfo,
        traits::CoarseField,
    };

    use super::CoarseDiracOp;

    fn operator(info: &LatticeInfo, n_threads: usize, n_smt: usize) -> CoarseDiracOp<'_> {
        CoarseDiracOpBuilder::new()
            .n_threads(Some(n_threads))
            .n_smt(n_smt)
            .build(info)
            .unwrap()
    }

    fn complex_at(data: &[f32], index: usize) -> Complex<f64> {
        Complex::new(data[2 * index] as f64, data[2 * index + 1] as f64)
    }

    fn mat_vec(matrix: &[f32], vector: &[f32], n: usize, row: usize) -> Complex<f64> {
        (0..n)
            .map(|col| complex_at(matrix, row * n + col) * complex_at(vector, col))
            .sum()
    }

    /// Operator evaluated site by site from lattice coordinates, in double precision.
    fn reference(
        info: &LatticeInfo,
        gauge: &CoarseGauge,
        clover: &CoarseClover,
        input: &CoarseSpinor,
        target_cb: usize,
    ) -> Vec<Complex<f64>> {
        let ncs = info.n_colorspins();
        let half = ncs / 2;
        let dims = info.lattice_dims();
        let mut out = vec![Complex::new(0.0, 0.0); info.n_cb_sites() * ncs];

        for cb_site in 0..info.n_cb_sites() {
            let coords = info.cb_index_to_coords(target_cb, cb_site);
            let local = input.site_data(target_cb, cb_site);

            for row in 0..ncs {
                let chiral = row / half;
                let block = clover.site_chiral_data(target_cb, cb_site, chiral);
                let mut value = mat_vec(block, &local[2 * chiral * half..], half, row - chiral * half);

                for mu in 0..N_DIM {
                    for (sign, dir) in [(1, 2 * mu), (-1, 2 * mu + 1)] {
                        let mut neighbour = coords;
                        neighbour[mu] =
                            ((coords[mu] as i64 + sign).rem_euclid(dims[mu] as i64)) as usize;
                        let (cb, n_site) = info.coords_to_cb_index(&neighbour);
                        assert_eq!(cb, 1 - target_cb);
                        value += mat_vec(
                            gauge.site_dir_data(target_cb, cb_site, dir),
                            input.site_data(cb, n_site),
                            ncs,
                            row,
                        );
                    }
                }
                out[cb_site * ncs + row] = value;
            }
        }

        out
    }

    fn assert_matches_reference(
        info: &LatticeInfo,
        out: &CoarseSpinor,
        expected: &[Complex<f64>],
        target_cb: usize,
    ) {
        let ncs = info.n_colorspins();
        for cb_site in 0..info.n_cb_sites() {
            let site = out.site_data(target_cb, cb_site);
            for row in 0..ncs {
                let e = expected[cb_site * ncs + row];
                assert_relative_eq!(site[2 * row] as f64, e.re, epsilon = 1e-4);
                assert_relative_eq!(site[2 * row + 1] as f64, e.im, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_neighbours() {
        let info = LatticeInfo::new([4, 2, 2, 4], 1, 2).unwrap();
        let op = operator(&info, 1, 1);

        for target_cb in 0..N_CHECKERBOARD {
            for cb_site in 0..info.n_cb_sites() {
                let coords = info.cb_index_to_coords(target_cb, cb_site);
                let neighbours = op.neighbours(target_cb, cb_site);

                for (dir, &n_site) in neighbours.iter().enumerate() {
                    let mu = dir / 2;
                    let n = info.lattice_dims()[mu];
                    let mut expected = coords;
                    expected[mu] = if dir % 2 == 0 {
                        (coords[mu] + 1) % n
                    } else {
                        (coords[mu] + n - 1) % n
                    };
                    assert_eq!(info.cb_index_to_coords(1 - target_cb, n_site), expected);
                }
            }
        }
    }

    #[test]
    fn test_apply_against_reference() {
        for (dims, n_colors, n_spins) in [([4, 2, 2, 4], 2, 2), ([4, 4, 2, 2], 3, 4)] {
            let info = LatticeInfo::new(dims, n_colors, n_spins).unwrap();
            let gauge = gauge_fixture(&info, 0);
            let clover = clover_fixture(&info, 1);
            let input = spinor_fixture(&info, 2);

            for (n_threads, n_smt) in [(1, 1), (4, 1), (4, 2), (2, 2)] {
                let op = operator(&info, n_threads, n_smt);
                let mut out = CoarseSpinor::new(&info);

                for target_cb in 0..N_CHECKERBOARD {
                    op.apply_parallel(&mut out, &gauge, &clover, &input, target_cb);
                    let expected = reference(&info, &gauge, &clover, &input, target_cb);
                    assert_matches_reference(&info, &out, &expected, target_cb);
                }
            }
        }
    }

    #[test]
    fn test_dslash_overwrites_output() {
        let info = LatticeInfo::new([4, 4, 2, 2], 3, 4).unwrap();
        let gauge = gauge_fixture(&info, 21);
        let no_clover = CoarseClover::new(&info);
        let input = spinor_fixture(&info, 22);
        let op = operator(&info, 4, 2);

        for target_cb in 0..N_CHECKERBOARD {
            let expected = reference(&info, &gauge, &no_clover, &input, target_cb);

            let mut parallel = CoarseSpinor::new(&info);
            parallel.data_mut().fill(1234.5);
            op.dslash_parallel(&mut parallel, &gauge, &input, target_cb);
            assert_matches_reference(&info, &parallel, &expected, target_cb);

            let mut sequential = CoarseSpinor::new(&info);
            sequential.data_mut().fill(-1234.5);
            for tid in 0..op.n_threads() {
                op.dslash(&mut sequential, &gauge, &input, target_cb, tid);
            }
            assert_matches_reference(&info, &sequential, &expected, target_cb);
        }
    }

    #[test]
    fn test_thread_calls_match_parallel_driver() {
        let info = LatticeInfo::new([4, 4, 2, 2], 3, 4).unwrap();
        let gauge = gauge_fixture(&info, 3);
        let clover = clover_fixture(&info, 4);
        let input = spinor_fixture(&info, 5);
        let op = operator(&info, 4, 2);

        let mut parallel = CoarseSpinor::new(&info);
        op.unprec_apply(&mut parallel, &gauge, &clover, &input);

        let mut sequential = CoarseSpinor::new(&info);
        for target_cb in 0..N_CHECKERBOARD {
            for tid in 0..op.n_threads() {
                op.apply(&mut sequential, &gauge, &clover, &input, target_cb, tid);
            }
        }

        assert_eq!(parallel.data(), sequential.data());
    }

    #[test]
    fn test_thread_writes_only_its_tile() {
        let info = LatticeInfo::new([4, 4, 2, 2], 3, 4).unwrap();
        let gauge = gauge_fixture(&info, 6);
        let clover = clover_fixture(&info, 7);
        let input = spinor_fixture(&info, 8);
        let op = operator(&info, 4, 2);

        let sentinel = 1234.5f32;
        let target_cb = 1;
        let tid = 1;
        let mut out = CoarseSpinor::new(&info);
        out.data_mut().fill(sentinel);
        op.apply(&mut out, &gauge, &clover, &input, target_cb, tid);

        let limits = *op.thread_limits(tid);
        let (row_min, row_max) = limits.rows(info.n_colorspins());
        assert!(row_min < row_max);

        for cb in 0..N_CHECKERBOARD {
            for cb_site in 0..info.n_cb_sites() {
                let owned = cb == target_cb && (limits.min_site..limits.max_site).contains(&cb_site);
                for (row, value) in out.site_data(cb, cb_site).chunks_exact(2).enumerate() {
                    let written = owned && (row_min..row_max).contains(&row);
                    assert_eq!(value[0] != sentinel, written, "cb {} site {} row {}", cb, cb_site, row);
                }
            }
        }
    }

    #[test]
    fn test_zero_input_gives_zero_output() {
        let info = LatticeInfo::new([4, 4, 4, 4], 3, 4).unwrap();
        let gauge = gauge_fixture(&info, 9);
        let clover = clover_fixture(&info, 10);
        let input = CoarseSpinor::new(&info);
        let op = operator(&info, 3, 1);

        let mut out = CoarseSpinor::new(&info);
        out.data_mut().fill(1.0);
        op.unprec_apply(&mut out, &gauge, &clover, &input);

        assert!(out.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_linearity() {
        let info = LatticeInfo::new([4, 2, 2, 4], 2, 2).unwrap();
        let gauge = gauge_fixture(&info, 11);
        let clover = clover_fixture(&info, 12);
        let a = spinor_fixture(&info, 13);
        let b = spinor_fixture(&info, 14);
        let c = -0.75f32;
        let op = operator(&info, 2, 1);

        let mut combined = CoarseSpinor::new(&info);
        for ((x, &ai), &bi) in combined
            .data_mut()
            .iter_mut()
            .zip(a.data())
            .zip(b.data())
        {
            *x = c * ai + bi;
        }

        let mut out_combined = CoarseSpinor::new(&info);
        let mut out_a = CoarseSpinor::new(&info);
        let mut out_b = CoarseSpinor::new(&info);
        op.unprec_apply(&mut out_combined, &gauge, &clover, &combined);
        op.unprec_apply(&mut out_a, &gauge, &clover, &a);
        op.unprec_apply(&mut out_b, &gauge, &clover, &b);

        for ((&oc, &oa), &ob) in out_combined
            .data()
            .iter()
            .zip(out_a.data())
            .zip(out_b.data())
        {
            assert_relative_eq!(oc, c * oa + ob, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_terms_sum_to_full_operator() {
        let info = LatticeInfo::new([4, 4, 2, 2], 3, 4).unwrap();
        let gauge = gauge_fixture(&info, 15);
        let clover = clover_fixture(&info, 16);
        let input = spinor_fixture(&info, 17);
        let op = operator(&info, 4, 2);
        let target_cb = 0;

        let mut full = CoarseSpinor::new(&info);
        let mut local = CoarseSpinor::new(&info);
        let mut hopping = CoarseSpinor::new(&info);
        op.apply_parallel(&mut full, &gauge, &clover, &input, target_cb);
        op.clover_apply_parallel(&mut local, &clover, &input, target_cb);
        op.dslash_parallel(&mut hopping, &gauge, &input, target_cb);

        for ((&f, &l), &h) in full
            .cb_data(target_cb)
            .iter()
            .zip(local.cb_data(target_cb))
            .zip(hopping.cb_data(target_cb))
        {
            assert_relative_eq!(f, l + h, epsilon = 1e-4);
        }

        // Directions one at a time
        let mut summed = CoarseSpinor::new(&info);
        let mut single = CoarseSpinor::new(&info);
        for dir in 0..N_DIRECTIONS {
            for tid in 0..op.n_threads() {
                op.dslash_dir(&mut single, &gauge, &input, target_cb, dir, tid);
            }
            for (s, &d) in summed.data_mut().iter_mut().zip(single.data()) {
                *s += d;
            }
        }

        for (&s, &h) in summed.cb_data(target_cb).iter().zip(hopping.cb_data(target_cb)) {
            assert_relative_eq!(s, h, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_scalar_and_vector_isa_agree() {
        let info = LatticeInfo::new([4, 2, 2, 4], 3, 4).unwrap();
        let gauge = gauge_fixture(&info, 18);
        let clover = clover_fixture(&info, 19);
        let input = spinor_fixture(&info, 20);

        let vectorised = operator(&info, 2, 1);
        let scalar = CoarseDiracOpBuilder::new()
            .n_threads(Some(2))
            .isa(Isa::Default)
            .build(&info)
            .unwrap();

        let mut out_vectorised = CoarseSpinor::new(&info);
        let mut out_scalar = CoarseSpinor::new(&info);
        vectorised.unprec_apply(&mut out_vectorised, &gauge, &clover, &input);
        scalar.unprec_apply(&mut out_scalar, &gauge, &clover, &input);

        for (&v, &s) in out_vectorised.data().iter().zip(out_scalar.data()) {
            assert_relative_eq!(v, s, epsilon = 1e-4);
        }
    }

    #[test]
    #[should_panic(expected = "Output spinor")]
    fn test_mismatched_output_panics() {
        let info = LatticeInfo::new([4, 2, 2, 4], 2, 2).unwrap();
        let other = LatticeInfo::new([4, 4, 2, 4], 2, 2).unwrap();
        let gauge = gauge_fixture(&info, 0);
        let input = spinor_fixture(&info, 1);
        let op = operator(&info, 1, 1);

        let mut out = CoarseSpinor::new(&other);
        op.dslash(&mut out, &gauge, &input, 0, 0);
    }
}
