//! Builder for the coarse Dirac operator and its thread team.
use rayon::ThreadPoolBuilder;

use crate::{
    coarse_op::CoarseDiracOp,
    constants::N_CHIRALITY,
    error::CoarseError,
    isa::Isa,
    lattice::LatticeInfo,
    thread_limits::{check_layout, ThreadPartition},
};

/// Configures the thread team of a [`CoarseDiracOp`].
///
/// The team size is fixed when the operator is built, changing it requires building a new operator.
#[derive(Debug, Default)]
pub struct CoarseDiracOpBuilder {
    n_threads: Option<usize>,
    n_smt: Option<usize>,
    isa: Option<Isa>,
}

impl CoarseDiracOpBuilder {
    /// Initialise an empty builder
    pub fn new() -> Self {
        Self {
            n_threads: None,
            n_smt: None,
            isa: None,
        }
    }

    /// Set the size of the thread team
    ///
    /// # Arguments
    /// * `n_threads` - Number of threads, if none is specified `rayon::current_num_threads()` is used.
    pub fn n_threads(mut self, n_threads: Option<usize>) -> Self {
        self.n_threads = n_threads;
        self
    }

    /// Set the number of hardware threads per core
    ///
    /// # Arguments
    /// * `n_smt` - Threads per core, must divide the number of threads. Defaults to 1.
    pub fn n_smt(mut self, n_smt: usize) -> Self {
        self.n_smt = Some(n_smt);
        self
    }

    /// Override the detected instruction set
    ///
    /// # Arguments
    /// * `isa` - Instruction set the kernels are compiled for.
    pub fn isa(mut self, isa: Isa) -> Self {
        self.isa = Some(isa);
        self
    }

    /// Build the thread team and compute its static work partition.
    ///
    /// # Arguments
    /// * `info` - Geometry of the fields the operator acts on.
    pub fn build(self, info: &LatticeInfo) -> Result<CoarseDiracOp<'_>, CoarseError> {
        let n_threads = self.n_threads.unwrap_or_else(rayon::current_num_threads);
        let n_smt = self.n_smt.unwrap_or(1);
        let isa = self.isa.unwrap_or_default();

        if info.n_spins() % N_CHIRALITY != 0 {
            return Err(CoarseError::InvalidGeometry(format!(
                "the coarse operator needs an even number of spins, found {}",
                info.n_spins()
            )));
        }

        // Rayon reads a team size of zero as "use the default", so it is rejected up front
        check_layout(n_threads, n_smt)?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|index| format!("mgcoarse-{}", index))
            .build()
            .map_err(|e| CoarseError::ThreadPool(e.to_string()))?;

        let n_colorspins = info.n_colorspins();
        let partition = ThreadPartition::from_pool(&pool, n_smt, info.n_cb_sites(), n_colorspins)?;
        let [n_x, n_y, n_z, n_t] = *info.lattice_dims();

        tracing::info!(
            n_threads,
            n_smt,
            n_cores = n_threads / n_smt,
            n_cb_sites = info.n_cb_sites(),
            n_colorspins,
            n_vrows = partition.n_vrows(),
            compile_target = isa.target_name(),
            "coarse Dirac operator team"
        );

        Ok(CoarseDiracOp {
            info,
            n_colorspins,
            n_chiral_colorspins: n_colorspins / N_CHIRALITY,
            n_xh: info.cb_lattice_dims()[0],
            n_x,
            n_y,
            n_z,
            n_t,
            partition,
            pool,
            isa,
        })
    }
}

#[cfg(test)]
mod test {
    use super::CoarseDiracOpBuilder;
    use crate::{error::CoarseError, lattice::LatticeInfo};

    #[test]
    fn test_build() {
        let info = LatticeInfo::new([4, 4, 4, 4], 3, 4).unwrap();
        let op = CoarseDiracOpBuilder::new()
            .n_threads(Some(4))
            .n_smt(2)
            .build(&info)
            .unwrap();

        assert_eq!(op.n_threads(), 4);
        assert_eq!(op.n_smt(), 2);
        assert_eq!(op.n_colorspins(), 12);
        assert_eq!(op.n_vrows(), 3);

        // Cores split the checkerboard, SMT siblings split the rows
        assert_eq!(op.thread_limits(0).min_site, op.thread_limits(1).min_site);
        assert_eq!(op.thread_limits(2).min_site, 64);
    }

    #[test]
    fn test_default_team() {
        let info = LatticeInfo::new([2, 2, 2, 2], 1, 2).unwrap();
        let op = CoarseDiracOpBuilder::new().build(&info).unwrap();
        assert_eq!(op.n_threads(), rayon::current_num_threads());
        assert_eq!(op.n_smt(), 1);
    }

    #[test]
    fn test_invalid_team() {
        let info = LatticeInfo::new([2, 2, 2, 2], 1, 2).unwrap();

        let empty = CoarseDiracOpBuilder::new().n_threads(Some(0)).build(&info);
        assert!(matches!(empty, Err(CoarseError::InvalidThreadLayout(_))));

        let uneven = CoarseDiracOpBuilder::new()
            .n_threads(Some(3))
            .n_smt(2)
            .build(&info);
        assert!(matches!(uneven, Err(CoarseError::InvalidThreadLayout(_))));
    }

    #[test]
    fn test_odd_spins_rejected() {
        let info = LatticeInfo::new([2, 2, 2, 2], 6, 1).unwrap();
        let op = CoarseDiracOpBuilder::new().n_threads(Some(1)).build(&info);
        assert!(matches!(op, Err(CoarseError::InvalidGeometry(_))));
    }
}
