//! Coarse spinor, gauge and clover field containers.
//!
//! All three containers hold `f32` data over both checkerboards, laid out per site as
//! `[direction or chirality][row][col][re, im]`. The number of floats per site is fixed at construction
//! from the colour and spin counts of the [`LatticeInfo`], which each field borrows and must outlive it.
use std::ops::{Deref, DerefMut};

use num_complex::Complex;

use crate::{
    constants::{N_CHECKERBOARD, N_CHIRALITY, N_COMPLEX, N_GAUGE_LINKS},
    lattice::LatticeInfo,
    traits::CoarseField,
};

/// Backing memory of a spinor, owned or borrowed from the caller.
#[derive(Debug)]
enum Storage<'a> {
    Owned(Vec<f32>),
    Borrowed(&'a mut [f32]),
}

impl Deref for Storage<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        match self {
            Storage::Owned(data) => data,
            Storage::Borrowed(data) => data,
        }
    }
}

impl DerefMut for Storage<'_> {
    fn deref_mut(&mut self) -> &mut [f32] {
        match self {
            Storage::Owned(data) => data,
            Storage::Borrowed(data) => data,
        }
    }
}

/// A coarse spinor, `n_colorspins` complex components per site.
#[derive(Debug)]
pub struct CoarseSpinor<'a> {
    info: &'a LatticeInfo,
    n_colorspins: usize,
    site_offset: usize,
    data: Storage<'a>,
}

impl<'a> CoarseSpinor<'a> {
    /// Allocate a zeroed spinor.
    ///
    /// # Arguments
    /// * `info` - Geometry of the spinor.
    pub fn new(info: &'a LatticeInfo) -> Self {
        let n_colorspins = info.n_colorspins();
        let site_offset = N_COMPLEX * n_colorspins;
        let data = vec![0f32; N_CHECKERBOARD * info.n_cb_sites() * site_offset];

        Self {
            info,
            n_colorspins,
            site_offset,
            data: Storage::Owned(data),
        }
    }

    /// Wrap caller owned memory as a spinor, the memory is borrowed for the lifetime of the spinor.
    ///
    /// # Arguments
    /// * `info` - Geometry of the spinor.
    /// * `data` - Buffer of exactly `2 * n_cb_sites * 2 * n_colorspins` floats.
    ///
    /// # Panics
    /// If the buffer has the wrong length.
    pub fn from_slice(info: &'a LatticeInfo, data: &'a mut [f32]) -> Self {
        let n_colorspins = info.n_colorspins();
        let site_offset = N_COMPLEX * n_colorspins;
        let expected = N_CHECKERBOARD * info.n_cb_sites() * site_offset;
        assert_eq!(
            data.len(),
            expected,
            "Spinor buffer has {} floats, expected {}",
            data.len(),
            expected
        );

        Self {
            info,
            n_colorspins,
            site_offset,
            data: Storage::Borrowed(data),
        }
    }

    /// Number of colour-spin components per site.
    pub fn n_colorspins(&self) -> usize {
        self.n_colorspins
    }

    /// Whether the spinor wraps caller owned memory.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.data, Storage::Borrowed(_))
    }

    /// Components of a site as complex numbers.
    pub fn site_complex(&self, cb: usize, cb_site: usize) -> &[Complex<f32>] {
        bytemuck::cast_slice(self.site_data(cb, cb_site))
    }

    /// Components of a site as complex numbers, mutably.
    pub fn site_complex_mut(&mut self, cb: usize, cb_site: usize) -> &mut [Complex<f32>] {
        bytemuck::cast_slice_mut(self.site_data_mut(cb, cb_site))
    }

    /// The whole buffer as complex numbers.
    pub fn as_complex(&self) -> &[Complex<f32>] {
        bytemuck::cast_slice(&self.data)
    }

    /// The whole buffer as complex numbers, mutably.
    pub fn as_complex_mut(&mut self) -> &mut [Complex<f32>] {
        bytemuck::cast_slice_mut(&mut self.data)
    }
}

impl Clone for CoarseSpinor<'_> {
    /// Clones always own their memory, even when the original wraps a caller buffer.
    fn clone(&self) -> Self {
        Self {
            info: self.info,
            n_colorspins: self.n_colorspins,
            site_offset: self.site_offset,
            data: Storage::Owned(self.data.to_vec()),
        }
    }
}

impl<'a> CoarseField<'a> for CoarseSpinor<'a> {
    fn info(&self) -> &'a LatticeInfo {
        self.info
    }

    fn site_offset(&self) -> usize {
        self.site_offset
    }

    fn data(&self) -> &[f32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

/// A coarse gauge field, per site the 8 stencil links followed by the local term, each a dense
/// `n_colorspins x n_colorspins` complex matrix stored row major.
///
/// Link order is `x+, x-, y+, y-, z+, z-, t+, t-, local`.
#[derive(Debug, Clone)]
pub struct CoarseGauge<'a> {
    info: &'a LatticeInfo,
    n_colorspins: usize,
    link_offset: usize,
    site_offset: usize,
    data: Vec<f32>,
}

impl<'a> CoarseGauge<'a> {
    /// Allocate a zeroed gauge field.
    ///
    /// # Arguments
    /// * `info` - Geometry of the field.
    pub fn new(info: &'a LatticeInfo) -> Self {
        let n_colorspins = info.n_colorspins();
        let link_offset = N_COMPLEX * n_colorspins * n_colorspins;
        let site_offset = N_GAUGE_LINKS * link_offset;

        Self {
            info,
            n_colorspins,
            link_offset,
            site_offset,
            data: vec![0f32; N_CHECKERBOARD * info.n_cb_sites() * site_offset],
        }
    }

    /// Number of colour-spin components, the row and column count of each link.
    pub fn n_colorspins(&self) -> usize {
        self.n_colorspins
    }

    /// Number of floats in a single link matrix.
    pub fn link_offset(&self) -> usize {
        self.link_offset
    }

    /// The link matrix in a given direction at a site.
    pub fn site_dir_data(&self, cb: usize, cb_site: usize, dir: usize) -> &[f32] {
        let start = dir * self.link_offset;
        &self.site_data(cb, cb_site)[start..start + self.link_offset]
    }

    /// The link matrix in a given direction at a site, mutably.
    pub fn site_dir_data_mut(&mut self, cb: usize, cb_site: usize, dir: usize) -> &mut [f32] {
        let start = dir * self.link_offset;
        let link_offset = self.link_offset;
        &mut self.site_data_mut(cb, cb_site)[start..start + link_offset]
    }
}

impl<'a> CoarseField<'a> for CoarseGauge<'a> {
    fn info(&self) -> &'a LatticeInfo {
        self.info
    }

    fn site_offset(&self) -> usize {
        self.site_offset
    }

    fn data(&self) -> &[f32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

/// A coarse clover (local) term, split by chirality into two dense complex blocks per site, each of
/// size `n_colorspins / 2 x n_colorspins / 2` stored row major.
///
/// Chiral block 0 acts on the first half of the colour-spin components, block 1 on the second half.
#[derive(Debug, Clone)]
pub struct CoarseClover<'a> {
    info: &'a LatticeInfo,
    n_chiral_colorspins: usize,
    block_offset: usize,
    site_offset: usize,
    data: Vec<f32>,
}

impl<'a> CoarseClover<'a> {
    /// Allocate a zeroed clover field.
    ///
    /// # Arguments
    /// * `info` - Geometry of the field, with an even number of spins.
    pub fn new(info: &'a LatticeInfo) -> Self {
        assert!(
            info.n_spins() % N_CHIRALITY == 0,
            "Clover field needs an even number of spins, found {}",
            info.n_spins()
        );
        let n_chiral_colorspins = info.n_colorspins() / N_CHIRALITY;
        let block_offset = N_COMPLEX * n_chiral_colorspins * n_chiral_colorspins;
        let site_offset = N_CHIRALITY * block_offset;

        Self {
            info,
            n_chiral_colorspins,
            block_offset,
            site_offset,
            data: vec![0f32; N_CHECKERBOARD * info.n_cb_sites() * site_offset],
        }
    }

    /// Number of colour-spin components of a single chirality.
    pub fn n_chiral_colorspins(&self) -> usize {
        self.n_chiral_colorspins
    }

    /// Number of floats in a single chiral block.
    pub fn block_offset(&self) -> usize {
        self.block_offset
    }

    /// The chiral block of a site.
    pub fn site_chiral_data(&self, cb: usize, cb_site: usize, chiral: usize) -> &[f32] {
        let start = chiral * self.block_offset;
        &self.site_data(cb, cb_site)[start..start + self.block_offset]
    }

    /// The chiral block of a site, mutably.
    pub fn site_chiral_data_mut(&mut self, cb: usize, cb_site: usize, chiral: usize) -> &mut [f32] {
        let start = chiral * self.block_offset;
        let block_offset = self.block_offset;
        &mut self.site_data_mut(cb, cb_site)[start..start + block_offset]
    }
}

impl<'a> CoarseField<'a> for CoarseClover<'a> {
    fn info(&self) -> &'a LatticeInfo {
        self.info
    }

    fn site_offset(&self) -> usize {
        self.site_offset
    }

    fn data(&self) -> &[f32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

#[cfg(test)]
mod test {
    use num_complex::Complex;

    use super::{CoarseClover, CoarseGauge, CoarseSpinor};
    use crate::{constants::LOCAL_LINK, lattice::LatticeInfo, traits::CoarseField};

    #[test]
    fn test_sizes() {
        let info = LatticeInfo::new([2, 2, 2, 4], 4, 2).unwrap();

        let spinor = CoarseSpinor::new(&info);
        assert_eq!(spinor.site_offset(), 16);
        assert_eq!(spinor.data().len(), 32 * 16);

        let gauge = CoarseGauge::new(&info);
        assert_eq!(gauge.link_offset(), 2 * 64);
        assert_eq!(gauge.site_offset(), 9 * 2 * 64);

        let clover = CoarseClover::new(&info);
        assert_eq!(clover.n_chiral_colorspins(), 4);
        assert_eq!(clover.block_offset(), 32);
        assert_eq!(clover.site_offset(), 64);
    }

    #[test]
    fn test_site_addressing() {
        let info = LatticeInfo::new([2, 2, 2, 2], 1, 2).unwrap();
        let mut spinor = CoarseSpinor::new(&info);

        spinor.site_complex_mut(1, 3)[1] = Complex::new(1.0, -2.0);

        // cb 1 starts after 8 sites of 2 complex components
        let offset = (8 + 3) * 4 + 2;
        assert_eq!(&spinor.data()[offset..offset + 2], &[1.0, -2.0]);
        assert_eq!(spinor.as_complex()[(8 + 3) * 2 + 1], Complex::new(1.0, -2.0));
        assert_eq!(spinor.cb_data(1).len(), 8 * 4);
    }

    #[test]
    fn test_gauge_and_clover_addressing() {
        let info = LatticeInfo::new([2, 2, 2, 2], 1, 2).unwrap();

        let mut gauge = CoarseGauge::new(&info);
        gauge.site_dir_data_mut(0, 2, LOCAL_LINK)[0] = 5.0;
        let start = 2 * gauge.site_offset() + 8 * gauge.link_offset();
        assert_eq!(gauge.data()[start], 5.0);
        assert_eq!(gauge.site_dir_data(0, 2, LOCAL_LINK)[0], 5.0);

        let mut clover = CoarseClover::new(&info);
        clover.site_chiral_data_mut(1, 0, 1)[1] = 7.0;
        let start = 8 * clover.site_offset() + clover.block_offset() + 1;
        assert_eq!(clover.data()[start], 7.0);
    }

    #[test]
    fn test_borrowed_storage() {
        let info = LatticeInfo::new([2, 2, 2, 2], 1, 2).unwrap();
        let mut buffer = vec![1f32; 16 * 4];

        {
            let mut spinor = CoarseSpinor::from_slice(&info, &mut buffer);
            assert!(spinor.is_borrowed());
            spinor.site_data_mut(0, 0)[0] = 3.0;

            let copy = spinor.clone();
            assert!(!copy.is_borrowed());
            assert_eq!(copy.data(), spinor.data());
        }

        assert_eq!(buffer[0], 3.0);
    }

    #[test]
    #[should_panic(expected = "even number of spins")]
    fn test_clover_needs_chirality() {
        let info = LatticeInfo::new([2, 2, 2, 2], 6, 1).unwrap();
        let _clover = CoarseClover::new(&info);
    }

    #[test]
    #[should_panic(expected = "Spinor buffer")]
    fn test_borrowed_storage_length() {
        let info = LatticeInfo::new([2, 2, 2, 2], 1, 2).unwrap();
        let mut buffer = vec![0f32; 10];
        let _spinor = CoarseSpinor::from_slice(&info, &mut buffer);
    }
}
