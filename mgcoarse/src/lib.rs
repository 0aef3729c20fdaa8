//! # Coarse grid core of an aggregation based multigrid solver for lattice Dirac operators
//!
//! The crate provides the pieces of a multigrid solver which act on the coarse lattice:
//! * Lattice geometry with even/odd checkerboarding, and aggregation of the fine spin/colour degrees of
//!   freedom over spatial blocks.
//! * Restriction and prolongation through block orthonormalised near null vectors.
//! * Coarse spinor, gauge and clover containers, with site parallel level 1 BLAS.
//! * The coarse Dirac operator, a dense local term plus a nearest neighbour stencil of dense links,
//!   evaluated by a fixed thread team over a static, cache line aware partition of the work.
//!
//! Reductions pass through a pluggable [`comm::GlobalReduce`], a no-op for single process runs and
//! `MPI_Allreduce` with the `mpi` feature.
//!
//! ## Example
//! ```
//! use mgcoarse::{CoarseDiracOpBuilder, LatticeInfo};
//! use mgcoarse::field::{CoarseClover, CoarseGauge, CoarseSpinor};
//!
//! let info = LatticeInfo::new([4, 4, 4, 4], 8, 2).unwrap();
//! let op = CoarseDiracOpBuilder::new()
//!     .n_threads(Some(2))
//!     .build(&info)
//!     .unwrap();
//!
//! let gauge = CoarseGauge::new(&info);
//! let clover = CoarseClover::new(&info);
//! let input = CoarseSpinor::new(&info);
//! let mut output = CoarseSpinor::new(&info);
//! op.unprec_apply(&mut output, &gauge, &clover, &input);
//! ```
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod aggregation;
pub mod blas;
pub mod block;
pub mod builder;
pub mod coarse_op;
pub mod comm;
pub mod constants;
pub mod error;
pub mod field;
pub mod helpers;
pub mod isa;
pub mod lattice;
pub mod matvec;
pub mod send_ptr;
pub mod thread_limits;
pub mod traits;
pub mod transfer;

// Public API
#[doc(inline)]
pub use builder::CoarseDiracOpBuilder;
#[doc(inline)]
pub use coarse_op::CoarseDiracOp;
#[doc(inline)]
pub use error::CoarseError;
#[doc(inline)]
pub use lattice::LatticeInfo;
