//! # Trait Definitions
use crate::lattice::LatticeInfo;

/// Dense per-site storage over both checkerboards of a lattice.
///
/// The buffer is laid out `[checkerboard][cb_site][site payload]` with a fixed number of floats per site,
/// complex numbers are stored as interleaved `[re, im]` pairs.
pub trait CoarseField<'a> {
    /// Geometry of the field.
    fn info(&self) -> &'a LatticeInfo;

    /// Number of floats stored per site.
    fn site_offset(&self) -> usize;

    /// The whole buffer.
    fn data(&self) -> &[f32];

    /// The whole buffer, mutably.
    fn data_mut(&mut self) -> &mut [f32];

    /// Data for a single site.
    fn site_data(&self, cb: usize, cb_site: usize) -> &[f32] {
        let offset = self.site_offset();
        let start = (cb * self.info().n_cb_sites() + cb_site) * offset;
        &self.data()[start..start + offset]
    }

    /// Data for a single site, mutably.
    fn site_data_mut(&mut self, cb: usize, cb_site: usize) -> &mut [f32] {
        let offset = self.site_offset();
        let start = (cb * self.info().n_cb_sites() + cb_site) * offset;
        &mut self.data_mut()[start..start + offset]
    }

    /// Data for every site of one checkerboard.
    fn cb_data(&self, cb: usize) -> &[f32] {
        let len = self.info().n_cb_sites() * self.site_offset();
        &self.data()[cb * len..(cb + 1) * len]
    }
}
