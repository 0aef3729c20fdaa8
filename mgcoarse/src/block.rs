//! Spatial blocks of the fine lattice, the unit of aggregation based coarsening.
use itertools::iproduct;

use crate::{
    aggregation::BlockShape,
    constants::N_DIM,
    error::CoarseError,
    lattice::IndexArray,
};

/// An axis aligned sub-volume of the lattice and the lexicographic indices of the sites it contains.
///
/// A block starts out empty, [`Block::create`] fills its site list once.
#[derive(Debug, Clone, Default)]
pub struct Block {
    origin: IndexArray,
    dims: IndexArray,
    created: bool,
    site_list: Vec<usize>,
}

impl Block {
    /// Enumerate the sites of the block, `x` fastest over the block's local coordinates.
    ///
    /// # Arguments
    /// * `lattice_dims` - Extents of the lattice the site indices refer to.
    /// * `origin` - Coordinates of the block corner with the smallest coordinates.
    /// * `dims` - Extents of the block, `origin + dims` may not exceed `lattice_dims`.
    ///
    /// # Panics
    /// If the block was already created or does not fit inside the lattice.
    pub fn create(&mut self, lattice_dims: &IndexArray, origin: &IndexArray, dims: &IndexArray) {
        assert!(!self.created, "Block at {:?} created twice", self.origin);
        for mu in 0..N_DIM {
            assert!(
                origin[mu] + dims[mu] <= lattice_dims[mu],
                "Block at {:?} with extent {:?} exceeds lattice {:?}",
                origin,
                dims,
                lattice_dims
            );
        }

        let [nx, ny, nz, _] = *lattice_dims;
        self.site_list = iproduct!(0..dims[3], 0..dims[2], 0..dims[1], 0..dims[0])
            .map(|(t, z, y, x)| {
                let coords = [origin[0] + x, origin[1] + y, origin[2] + z, origin[3] + t];
                coords[0] + nx * (coords[1] + ny * (coords[2] + nz * coords[3]))
            })
            .collect();

        self.origin = *origin;
        self.dims = *dims;
        self.created = true;
    }

    /// Lexicographic indices of the sites in the block, in creation order.
    pub fn site_list(&self) -> &[usize] {
        &self.site_list
    }

    /// Whether [`Block::create`] has been called.
    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Number of sites in the block.
    pub fn n_sites(&self) -> usize {
        self.site_list.len()
    }

    /// Block corner with the smallest coordinates.
    pub fn origin(&self) -> &IndexArray {
        &self.origin
    }

    /// Block extents.
    pub fn dims(&self) -> &IndexArray {
        &self.dims
    }
}

/// All blocks covering a lattice, with the extents of the blocked (coarse) lattice.
///
/// Block `b` corresponds to the coarse site with lexicographic index `b` on the blocked lattice.
#[derive(Debug, Clone)]
pub struct BlockList {
    blocks: Vec<Block>,
    blocked_lattice_dims: IndexArray,
}

impl BlockList {
    /// Partition a lattice into blocks.
    ///
    /// # Arguments
    /// * `lattice_dims` - Extents of the fine lattice.
    /// * `block_dims` - Extents of each block, must divide `lattice_dims` along every axis.
    pub fn new(lattice_dims: &IndexArray, block_dims: &IndexArray) -> Result<Self, CoarseError> {
        let shape = BlockShape::new(lattice_dims, block_dims)?;
        let blocked_lattice_dims = *shape.blocks_per_dim();
        let [bx, by, bz, bt] = blocked_lattice_dims;

        let blocks = iproduct!(0..bt, 0..bz, 0..by, 0..bx)
            .map(|(t, z, y, x)| {
                let origin = [
                    x * block_dims[0],
                    y * block_dims[1],
                    z * block_dims[2],
                    t * block_dims[3],
                ];
                let mut block = Block::default();
                block.create(lattice_dims, &origin, block_dims);
                block
            })
            .collect();

        Ok(Self {
            blocks,
            blocked_lattice_dims,
        })
    }

    /// The blocks, ordered lexicographically over the blocked lattice.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Extents of the blocked lattice.
    pub fn blocked_lattice_dims(&self) -> &IndexArray {
        &self.blocked_lattice_dims
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
