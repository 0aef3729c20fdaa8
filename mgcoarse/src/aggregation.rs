//! Aggregation of fine spin/colour degrees of freedom and blocking of the lattice.
use crate::{constants::N_DIM, error::CoarseError, lattice::IndexArray};

/// Interface for an aggregation, a partition of the per-site spin/colour degrees of freedom into
/// disjoint aggregates, together with the shape of the spatial blocks shared by all aggregates.
pub trait Aggregation {
    /// Extents of a block.
    fn block_dims(&self) -> &IndexArray;

    /// Number of sites in a block.
    fn block_volume(&self) -> usize;

    /// Total number of blocks covering the lattice.
    fn n_blocks(&self) -> usize;

    /// Number of blocks along each axis.
    fn blocks_per_dim(&self) -> &IndexArray;

    /// Number of aggregates.
    fn n_aggregates(&self) -> usize;

    /// Fine spin indices feeding an aggregate, `aggregate` must be less than [`Aggregation::n_aggregates`].
    fn source_spins(&self, aggregate: usize) -> &[usize];

    /// Fine colour indices feeding an aggregate, `aggregate` must be less than [`Aggregation::n_aggregates`].
    fn source_colors(&self, aggregate: usize) -> &[usize];
}

/// Block shape shared by every aggregation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockShape {
    block_dims: IndexArray,
    blocks_per_dim: IndexArray,
    n_blocks: usize,
    block_volume: usize,
}

impl BlockShape {
    /// Constructor
    ///
    /// # Arguments
    /// * `lattice_dims` - Extents of the lattice being blocked.
    /// * `block_dims` - Extents of a block, must divide `lattice_dims` along every axis.
    pub fn new(lattice_dims: &IndexArray, block_dims: &IndexArray) -> Result<Self, CoarseError> {
        assert_dims_divide(lattice_dims, block_dims)?;

        let mut blocks_per_dim = [0; N_DIM];
        for mu in 0..N_DIM {
            blocks_per_dim[mu] = lattice_dims[mu] / block_dims[mu];
        }

        Ok(Self {
            block_dims: *block_dims,
            blocks_per_dim,
            n_blocks: blocks_per_dim.iter().product(),
            block_volume: block_dims.iter().product(),
        })
    }

    /// Extents of a block.
    pub fn block_dims(&self) -> &IndexArray {
        &self.block_dims
    }

    /// Number of blocks along each axis.
    pub fn blocks_per_dim(&self) -> &IndexArray {
        &self.blocks_per_dim
    }

    /// Total number of blocks.
    pub fn n_blocks(&self) -> usize {
        self.n_blocks
    }

    /// Number of sites in a block.
    pub fn block_volume(&self) -> usize {
        self.block_volume
    }
}

/// Check that block extents divide lattice extents exactly along every axis.
pub fn assert_dims_divide(
    lattice_dims: &IndexArray,
    block_dims: &IndexArray,
) -> Result<(), CoarseError> {
    let divides = lattice_dims
        .iter()
        .zip(block_dims.iter())
        .all(|(&l, &b)| b != 0 && l % b == 0);

    if divides {
        Ok(())
    } else {
        Err(CoarseError::IndivisibleBlocks {
            lattice: *lattice_dims,
            block: *block_dims,
        })
    }
}

/// A single aggregate holding every spin and every colour.
#[derive(Debug, Clone)]
pub struct FullSpinAggregation {
    shape: BlockShape,
    source_spins: Vec<usize>,
    source_colors: Vec<usize>,
}

impl FullSpinAggregation {
    /// Constructor
    ///
    /// # Arguments
    /// * `lattice_dims` - Extents of the fine lattice.
    /// * `block_dims` - Extents of a block.
    pub fn new(lattice_dims: &IndexArray, block_dims: &IndexArray) -> Result<Self, CoarseError> {
        Ok(Self {
            shape: BlockShape::new(lattice_dims, block_dims)?,
            source_spins: vec![0, 1, 2, 3],
            source_colors: vec![0, 1, 2],
        })
    }
}

impl Aggregation for FullSpinAggregation {
    fn block_dims(&self) -> &IndexArray {
        self.shape.block_dims()
    }

    fn block_volume(&self) -> usize {
        self.shape.block_volume()
    }

    fn n_blocks(&self) -> usize {
        self.shape.n_blocks()
    }

    fn blocks_per_dim(&self) -> &IndexArray {
        self.shape.blocks_per_dim()
    }

    fn n_aggregates(&self) -> usize {
        1
    }

    fn source_spins(&self, _aggregate: usize) -> &[usize] {
        &self.source_spins
    }

    fn source_colors(&self, _aggregate: usize) -> &[usize] {
        &self.source_colors
    }
}

/// Chiral aggregation, upper spins `{0, 1}` and lower spins `{2, 3}` form two aggregates each carrying
/// every colour.
#[derive(Debug, Clone)]
pub struct StandardAggregation {
    shape: BlockShape,
    source_spins: [Vec<usize>; 2],
    source_colors: [Vec<usize>; 2],
}

impl StandardAggregation {
    /// Constructor
    ///
    /// # Arguments
    /// * `lattice_dims` - Extents of the fine lattice.
    /// * `block_dims` - Extents of a block.
    pub fn new(lattice_dims: &IndexArray, block_dims: &IndexArray) -> Result<Self, CoarseError> {
        Ok(Self {
            shape: BlockShape::new(lattice_dims, block_dims)?,
            source_spins: [vec![0, 1], vec![2, 3]],
            source_colors: [vec![0, 1, 2], vec![0, 1, 2]],
        })
    }
}

impl Aggregation for StandardAggregation {
    fn block_dims(&self) -> &IndexArray {
        self.shape.block_dims()
    }

    fn block_volume(&self) -> usize {
        self.shape.block_volume()
    }

    fn n_blocks(&self) -> usize {
        self.shape.n_blocks()
    }

    fn blocks_per_dim(&self) -> &IndexArray {
        self.shape.blocks_per_dim()
    }

    fn n_aggregates(&self) -> usize {
        2
    }

    fn source_spins(&self, aggregate: usize) -> &[usize] {
        &self.source_spins[aggregate]
    }

    fn source_colors(&self, aggregate: usize) -> &[usize] {
        &self.source_colors[aggregate]
    }
}
