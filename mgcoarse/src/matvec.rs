//! Dense complex matrix-vector products, the innermost primitive of the coarse operator.
//!
//! Matrices are `n x n`, row major, vectors have length `n`, and every complex number is stored as an
//! interleaved `[re, im]` pair of `f32`. Sums are accumulated in `f32` in column order.
use pulp::{Simd, WithSimd};

use crate::{constants::N_COMPLEX, isa::Isa};

/// Complex dot product of one matrix row with a vector.
#[inline(always)]
fn row_dot(row: &[f32], vector: &[f32]) -> (f32, f32) {
    let mut sum_re = 0f32;
    let mut sum_im = 0f32;

    for (m, v) in row
        .chunks_exact(N_COMPLEX)
        .zip(vector.chunks_exact(N_COMPLEX))
    {
        sum_re += m[0] * v[0] - m[1] * v[1];
        sum_im += m[0] * v[1] + m[1] * v[0];
    }

    (sum_re, sum_im)
}

/// Rows `row_min..row_max` of `M v`.
///
/// # Arguments
/// * `out` - Output rows, `row_max - row_min` complex numbers starting with row `row_min`.
/// * `matrix` - Row major `n x n` matrix.
/// * `vector` - Input vector of length `n`.
/// * `n` - Dimension.
/// * `row_min` - First row computed.
/// * `row_max` - One past the last row computed.
#[inline(always)]
pub fn cmat_mult_rows(
    out: &mut [f32],
    matrix: &[f32],
    vector: &[f32],
    n: usize,
    row_min: usize,
    row_max: usize,
) {
    let row_len = N_COMPLEX * n;
    let vector = &vector[..row_len];

    for (row, o) in (row_min..row_max).zip(out.chunks_exact_mut(N_COMPLEX)) {
        let (re, im) = row_dot(&matrix[row * row_len..(row + 1) * row_len], vector);
        o[0] = re;
        o[1] = im;
    }
}

/// Accumulate rows `row_min..row_max` of `M v` into `out`.
///
/// # Arguments
/// * `out` - Output rows, `row_max - row_min` complex numbers starting with row `row_min`.
/// * `matrix` - Row major `n x n` matrix.
/// * `vector` - Input vector of length `n`.
/// * `n` - Dimension.
/// * `row_min` - First row computed.
/// * `row_max` - One past the last row computed.
#[inline(always)]
pub fn cmat_mult_add_rows(
    out: &mut [f32],
    matrix: &[f32],
    vector: &[f32],
    n: usize,
    row_min: usize,
    row_max: usize,
) {
    let row_len = N_COMPLEX * n;
    let vector = &vector[..row_len];

    for (row, o) in (row_min..row_max).zip(out.chunks_exact_mut(N_COMPLEX)) {
        let (re, im) = row_dot(&matrix[row * row_len..(row + 1) * row_len], vector);
        o[0] += re;
        o[1] += im;
    }
}

/// `out = M v` without instruction set dispatch.
#[inline(always)]
pub fn cmat_mult_naive(out: &mut [f32], matrix: &[f32], vector: &[f32], n: usize) {
    cmat_mult_rows(out, matrix, vector, n, 0, n)
}

/// `out += M v` without instruction set dispatch.
#[inline(always)]
pub fn cmat_mult_add_naive(out: &mut [f32], matrix: &[f32], vector: &[f32], n: usize) {
    cmat_mult_add_rows(out, matrix, vector, n, 0, n)
}

struct MatVec<'a> {
    out: &'a mut [f32],
    matrix: &'a [f32],
    vector: &'a [f32],
    n: usize,
    accumulate: bool,
}

impl WithSimd for MatVec<'_> {
    type Output = ();

    #[inline(always)]
    fn with_simd<S: Simd>(self, _simd: S) -> Self::Output {
        if self.accumulate {
            cmat_mult_add_naive(self.out, self.matrix, self.vector, self.n)
        } else {
            cmat_mult_naive(self.out, self.matrix, self.vector, self.n)
        }
    }
}

/// `out = M v`, compiled for the given instruction set.
///
/// # Arguments
/// * `isa` - Instruction set to run on.
/// * `out` - Output vector of length `n`.
/// * `matrix` - Row major `n x n` matrix.
/// * `vector` - Input vector of length `n`.
/// * `n` - Dimension.
pub fn cmat_mult(isa: Isa, out: &mut [f32], matrix: &[f32], vector: &[f32], n: usize) {
    isa.vectorize(MatVec {
        out,
        matrix,
        vector,
        n,
        accumulate: false,
    })
}

/// `out += M v`, compiled for the given instruction set.
///
/// # Arguments
/// * `isa` - Instruction set to run on.
/// * `out` - Output vector of length `n`.
/// * `matrix` - Row major `n x n` matrix.
/// * `vector` - Input vector of length `n`.
/// * `n` - Dimension.
pub fn cmat_mult_add(isa: Isa, out: &mut [f32], matrix: &[f32], vector: &[f32], n: usize) {
    isa.vectorize(MatVec {
        out,
        matrix,
        vector,
        n,
        accumulate: true,
    })
}
