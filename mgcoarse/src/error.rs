//! Error type for configuration failures.
use crate::lattice::IndexArray;

/// Errors raised while configuring lattices, aggregations and operators.
///
/// Every variant describes an invalid configuration detected at construction time.
/// Mismatched geometries passed to field operations are programming errors and panic instead.
#[derive(Debug, thiserror::Error)]
pub enum CoarseError {
    /// Lattice extents which cannot be checkerboarded.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Block extents which do not divide the lattice extents.
    #[error("Block dimensions {block:?} do not divide lattice dimensions {lattice:?}")]
    IndivisibleBlocks {
        /// Lattice extents
        lattice: IndexArray,
        /// Block extents
        block: IndexArray,
    },

    /// Unusable thread team layout.
    #[error("Invalid thread layout: {0}")]
    InvalidThreadLayout(String),

    /// Failure to build the thread pool backing an operator.
    #[error("Thread pool: {0}")]
    ThreadPool(String),
}
