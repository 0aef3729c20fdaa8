//! Crate wide constants

/// Number of spacetime dimensions of the lattice.
pub const N_DIM: usize = 4;

/// Number of checkerboards (even/odd sites).
pub const N_CHECKERBOARD: usize = 2;

/// Number of floats in a complex number, stored as `[re, im]`.
pub const N_COMPLEX: usize = 2;

/// Number of stencil directions, forward and backward along each axis.
pub const N_DIRECTIONS: usize = 2 * N_DIM;

/// Number of link blocks stored per site of a coarse gauge field, the 8 stencil
/// directions followed by the local term.
pub const N_GAUGE_LINKS: usize = N_DIRECTIONS + 1;

/// Index of the local term among the gauge link blocks.
pub const LOCAL_LINK: usize = N_DIRECTIONS;

/// Number of chiral blocks of a coarse clover field.
pub const N_CHIRALITY: usize = 2;

/// Number of `f32` lanes in a vector register, used to partition output rows.
pub const VECLEN: usize = 8;

/// Cache line size in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Floats per cache line.
pub(crate) const FLOATS_PER_CACHE_LINE: usize = CACHE_LINE_SIZE / std::mem::size_of::<f32>();
