//! Lattice geometry, checkerboarding and site indexing.
//!
//! Sites are numbered lexicographically with `x` fastest,
//! `site = x + nx * (y + ny * (z + nz * t))`. Within a checkerboard the index halves the `x` extent,
//! `cb_site = x / 2 + nxh * (y + ny * (z + nz * t))`, and the checkerboard of a site is the parity of
//! `x + y + z + t`.
use std::sync::Arc;

use crate::{
    comm::{GlobalReduce, LocalReduce},
    constants::{N_CHECKERBOARD, N_DIM},
    error::CoarseError,
};

/// Extents or coordinates along each of the four lattice axes, ordered `[x, y, z, t]`.
pub type IndexArray = [usize; N_DIM];

/// Immutable description of a lattice and the degrees of freedom carried at each site.
#[derive(Debug, Clone)]
pub struct LatticeInfo {
    lattice_dims: IndexArray,
    cb_lattice_dims: IndexArray,
    n_sites: usize,
    n_cb_sites: usize,
    n_colors: usize,
    n_spins: usize,
    reducer: Arc<dyn GlobalReduce>,
}

impl LatticeInfo {
    /// Constructor, for a single process lattice.
    ///
    /// # Arguments
    /// * `lattice_dims` - Extents of the lattice, each must be positive and even so that periodic
    ///   neighbours always lie on the opposite checkerboard.
    /// * `n_colors` - Number of colours per site.
    /// * `n_spins` - Number of spins per site, must be positive. Clover fields and the coarse operator
    ///   further need an even count so that sites split into two chiralities.
    pub fn new(
        lattice_dims: IndexArray,
        n_colors: usize,
        n_spins: usize,
    ) -> Result<Self, CoarseError> {
        Self::with_reducer(lattice_dims, n_colors, n_spins, Arc::new(LocalReduce))
    }

    /// Constructor with an explicit global reduction backend.
    ///
    /// # Arguments
    /// * `lattice_dims` - Extents of the lattice.
    /// * `n_colors` - Number of colours per site.
    /// * `n_spins` - Number of spins per site.
    /// * `reducer` - Backend used to sum partial reductions over processes.
    pub fn with_reducer(
        lattice_dims: IndexArray,
        n_colors: usize,
        n_spins: usize,
        reducer: Arc<dyn GlobalReduce>,
    ) -> Result<Self, CoarseError> {
        if lattice_dims.iter().any(|&d| d == 0 || d % 2 != 0) {
            return Err(CoarseError::InvalidGeometry(format!(
                "lattice dimensions {:?} must be positive and even",
                lattice_dims
            )));
        }

        if n_colors == 0 {
            return Err(CoarseError::InvalidGeometry(
                "number of colours must be positive".to_string(),
            ));
        }

        if n_spins == 0 {
            return Err(CoarseError::InvalidGeometry(
                "number of spins must be positive".to_string(),
            ));
        }

        let mut cb_lattice_dims = lattice_dims;
        cb_lattice_dims[0] /= 2;

        let n_sites = lattice_dims.iter().product::<usize>();

        Ok(Self {
            lattice_dims,
            cb_lattice_dims,
            n_sites,
            n_cb_sites: n_sites / N_CHECKERBOARD,
            n_colors,
            n_spins,
            reducer,
        })
    }

    /// Lattice extents.
    pub fn lattice_dims(&self) -> &IndexArray {
        &self.lattice_dims
    }

    /// Extents of a single checkerboard, the `x` extent is halved.
    pub fn cb_lattice_dims(&self) -> &IndexArray {
        &self.cb_lattice_dims
    }

    /// Number of lattice sites.
    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    /// Number of sites on each checkerboard.
    pub fn n_cb_sites(&self) -> usize {
        self.n_cb_sites
    }

    /// Number of colours.
    pub fn n_colors(&self) -> usize {
        self.n_colors
    }

    /// Number of spins.
    pub fn n_spins(&self) -> usize {
        self.n_spins
    }

    /// Number of combined colour-spin components per site.
    pub fn n_colorspins(&self) -> usize {
        self.n_colors * self.n_spins
    }

    /// Backend used for reductions over processes.
    pub fn reducer(&self) -> &dyn GlobalReduce {
        self.reducer.as_ref()
    }

    /// Two lattices are compatible when extents, colours and spins all match.
    /// The reduction backend does not take part in the comparison.
    pub fn is_compatible(&self, other: &LatticeInfo) -> bool {
        self.lattice_dims == other.lattice_dims
            && self.cb_lattice_dims == other.cb_lattice_dims
            && self.n_cb_sites == other.n_cb_sites
            && self.n_colors == other.n_colors
            && self.n_spins == other.n_spins
    }

    /// Lexicographic index of a site.
    pub fn coords_to_site(&self, coords: &IndexArray) -> usize {
        let [nx, ny, nz, _] = self.lattice_dims;
        coords[0] + nx * (coords[1] + ny * (coords[2] + nz * coords[3]))
    }

    /// Coordinates of a site from its lexicographic index.
    pub fn site_to_coords(&self, site: usize) -> IndexArray {
        let [nx, ny, nz, _] = self.lattice_dims;
        let x = site % nx;
        let yzt = site / nx;
        let y = yzt % ny;
        let zt = yzt / ny;
        [x, y, zt % nz, zt / nz]
    }

    /// Checkerboard of a site, the parity of its coordinate sum.
    pub fn checkerboard(coords: &IndexArray) -> usize {
        coords.iter().sum::<usize>() & 1
    }

    /// Checkerboard and index within the checkerboard of a site.
    pub fn coords_to_cb_index(&self, coords: &IndexArray) -> (usize, usize) {
        let [nxh, ny, nz, _] = self.cb_lattice_dims;
        let cb_site = coords[0] / 2 + nxh * (coords[1] + ny * (coords[2] + nz * coords[3]));
        (Self::checkerboard(coords), cb_site)
    }

    /// Coordinates of the site with a given index on a given checkerboard.
    pub fn cb_index_to_coords(&self, cb: usize, cb_site: usize) -> IndexArray {
        let [nxh, ny, nz, _] = self.cb_lattice_dims;
        let yzt = cb_site / nxh;
        let xcb = cb_site - nxh * yzt;
        let zt = yzt / ny;
        let y = yzt - ny * zt;
        let t = zt / nz;
        let z = zt - nz * t;
        let x = 2 * xcb + ((cb + y + z + t) & 1);
        [x, y, z, t]
    }

    /// Checkerboard and index within the checkerboard of a site given by lexicographic index.
    pub fn site_to_cb_index(&self, site: usize) -> (usize, usize) {
        self.coords_to_cb_index(&self.site_to_coords(site))
    }
}

/// Assert that two lattices are compatible.
///
/// Continuing with mismatched fields would silently corrupt results, so a mismatch is fatal.
///
/// # Panics
/// If the extents, colours or spins of the two lattices differ.
#[track_caller]
pub fn assert_compatible(a: &LatticeInfo, b: &LatticeInfo) {
    if !a.is_compatible(b) {
        tracing::error!(
            left_dims = ?a.lattice_dims(),
            right_dims = ?b.lattice_dims(),
            left_colors = a.n_colors(),
            right_colors = b.n_colors(),
            left_spins = a.n_spins(),
            right_spins = b.n_spins(),
            "incompatible lattices"
        );
        panic!(
            "Incompatible lattices: dims {:?} vs {:?}, colors {} vs {}, spins {} vs {}",
            a.lattice_dims(),
            b.lattice_dims(),
            a.n_colors(),
            b.n_colors(),
            a.n_spins(),
            b.n_spins()
        );
    }
}
