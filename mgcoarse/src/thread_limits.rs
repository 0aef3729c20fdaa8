//! Static partition of coarse operator work over a fixed thread team.
//!
//! Threads are ranked `tid = smt_id + n_smt * core_id`. Sites of a checkerboard are divided between
//! cores, every SMT sibling of a core receives the same site range. Output rows of the per-site
//! matrix-vector products are divided between the SMT siblings of a core in whole cache lines, so
//! siblings never write the same memory.
use rayon::ThreadPool;

use crate::{
    constants::{FLOATS_PER_CACHE_LINE, N_COMPLEX, VECLEN},
    error::CoarseError,
};

/// Iteration bounds owned by a single thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadLimits {
    /// First checkerboard site.
    pub min_site: usize,
    /// One past the last checkerboard site.
    pub max_site: usize,
    /// First vector row.
    pub min_vrow: usize,
    /// One past the last vector row.
    pub max_vrow: usize,
}

impl ThreadLimits {
    /// Compute the bounds of one thread.
    ///
    /// # Arguments
    /// * `tid` - Rank of the thread in the team.
    /// * `n_threads` - Size of the team.
    /// * `n_smt` - Threads per core, must divide `n_threads`.
    /// * `n_cb_sites` - Number of sites on a checkerboard.
    /// * `n_vrows` - Number of vector rows in a site's output, see [`n_vrows`].
    pub fn new(
        tid: usize,
        n_threads: usize,
        n_smt: usize,
        n_cb_sites: usize,
        n_vrows: usize,
    ) -> Self {
        let n_cores = n_threads / n_smt;
        let core_id = tid / n_smt;
        let smt_id = tid - n_smt * core_id;

        let n_cachelines = (n_vrows * VECLEN).div_ceil(FLOATS_PER_CACHE_LINE);
        let cl_per_smt = n_cachelines.div_ceil(n_smt);
        let min_cl = (smt_id * cl_per_smt).min(n_cachelines);
        let max_cl = ((smt_id + 1) * cl_per_smt).min(n_cachelines);
        let min_vrow = (min_cl * FLOATS_PER_CACHE_LINE / VECLEN).min(n_vrows);
        let max_vrow = (max_cl * FLOATS_PER_CACHE_LINE / VECLEN).min(n_vrows);

        let sites_per_core = n_cb_sites.div_ceil(n_cores);
        let min_site = (core_id * sites_per_core).min(n_cb_sites);
        let max_site = ((core_id + 1) * sites_per_core).min(n_cb_sites);

        Self {
            min_site,
            max_site,
            min_vrow,
            max_vrow,
        }
    }

    /// Range of complex output rows covered by this thread's vector rows.
    ///
    /// # Arguments
    /// * `n_colorspins` - Number of complex rows in a site's output.
    pub fn rows(&self, n_colorspins: usize) -> (usize, usize) {
        let complex_per_vrow = VECLEN / N_COMPLEX;
        (
            (self.min_vrow * complex_per_vrow).min(n_colorspins),
            (self.max_vrow * complex_per_vrow).min(n_colorspins),
        )
    }

    /// Number of sites owned.
    pub fn n_sites(&self) -> usize {
        self.max_site - self.min_site
    }
}

/// Number of vector rows needed to hold the `2 * n_colorspins` floats of a site.
pub fn n_vrows(n_colorspins: usize) -> usize {
    (N_COMPLEX * n_colorspins).div_ceil(VECLEN)
}

/// Bounds of every thread in a team, fixed for the team's lifetime.
#[derive(Debug, Clone)]
pub struct ThreadPartition {
    limits: Vec<ThreadLimits>,
    n_smt: usize,
    n_vrows: usize,
}

impl ThreadPartition {
    /// Compute the partition for a team of a given size.
    ///
    /// # Arguments
    /// * `n_threads` - Size of the team.
    /// * `n_smt` - Threads per core, must divide `n_threads`.
    /// * `n_cb_sites` - Number of sites on a checkerboard.
    /// * `n_colorspins` - Number of complex rows in a site's output.
    pub fn new(
        n_threads: usize,
        n_smt: usize,
        n_cb_sites: usize,
        n_colorspins: usize,
    ) -> Result<Self, CoarseError> {
        check_layout(n_threads, n_smt)?;
        let n_vrows = n_vrows(n_colorspins);

        let limits = (0..n_threads)
            .map(|tid| ThreadLimits::new(tid, n_threads, n_smt, n_cb_sites, n_vrows))
            .collect();

        Ok(Self {
            limits,
            n_smt,
            n_vrows,
        })
    }

    /// Compute the partition on the threads of a pool, each thread computes its own entry, keyed by
    /// its index in the pool. Returns once every thread has written its entry.
    ///
    /// # Arguments
    /// * `pool` - The team, its size fixes the number of entries.
    /// * `n_smt` - Threads per core, must divide the size of the pool.
    /// * `n_cb_sites` - Number of sites on a checkerboard.
    /// * `n_colorspins` - Number of complex rows in a site's output.
    pub fn from_pool(
        pool: &ThreadPool,
        n_smt: usize,
        n_cb_sites: usize,
        n_colorspins: usize,
    ) -> Result<Self, CoarseError> {
        let n_threads = pool.current_num_threads();
        check_layout(n_threads, n_smt)?;
        let n_vrows = n_vrows(n_colorspins);

        let limits = pool.broadcast(|ctx| {
            let tid = ctx.index();
            let limits = ThreadLimits::new(tid, ctx.num_threads(), n_smt, n_cb_sites, n_vrows);
            tracing::debug!(
                tid,
                smt_id = tid % n_smt,
                n_sites_cb = n_cb_sites,
                n_vrows,
                min_vrow = limits.min_vrow,
                max_vrow = limits.max_vrow,
                min_site = limits.min_site,
                max_site = limits.max_site,
                "thread limits"
            );
            limits
        });

        Ok(Self {
            limits,
            n_smt,
            n_vrows,
        })
    }

    /// Bounds of a thread, `tid` must be less than [`ThreadPartition::n_threads`].
    pub fn limits(&self, tid: usize) -> &ThreadLimits {
        &self.limits[tid]
    }

    /// Bounds of every thread, indexed by rank.
    pub fn all_limits(&self) -> &[ThreadLimits] {
        &self.limits
    }

    /// Size of the team.
    pub fn n_threads(&self) -> usize {
        self.limits.len()
    }

    /// Threads per core.
    pub fn n_smt(&self) -> usize {
        self.n_smt
    }

    /// Number of vector rows in a site's output.
    pub fn n_vrows(&self) -> usize {
        self.n_vrows
    }
}

pub(crate) fn check_layout(n_threads: usize, n_smt: usize) -> Result<(), CoarseError> {
    if n_threads == 0 {
        return Err(CoarseError::InvalidThreadLayout(
            "thread team is empty".to_string(),
        ));
    }

    if n_smt == 0 || n_threads % n_smt != 0 {
        return Err(CoarseError::InvalidThreadLayout(format!(
            "{} threads cannot be grouped into cores of {} SMT threads",
            n_threads, n_smt
        )));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::{n_vrows, ThreadLimits, ThreadPartition};
    use crate::error::CoarseError;

    #[test]
    fn test_vrows() {
        assert_eq!(n_vrows(24), 6);
        assert_eq!(n_vrows(12), 3);
        // Partial vector rows are rounded up
        assert_eq!(n_vrows(2), 1);
    }

    #[test]
    fn test_site_ranges_cover_checkerboard() {
        for n_cb_sites in [1, 7, 8, 128, 1000] {
            for n_smt in [1, 2, 4] {
                for n_cores in [1, 3, 4, 16] {
                    let n_threads = n_cores * n_smt;
                    let partition = ThreadPartition::new(n_threads, n_smt, n_cb_sites, 24).unwrap();

                    // One representative per core, the SMT siblings share its range
                    let mut covered = vec![0usize; n_cb_sites];
                    for core in 0..n_cores {
                        let limits = partition.limits(core * n_smt);
                        for smt in 1..n_smt {
                            let sibling = partition.limits(core * n_smt + smt);
                            assert_eq!(sibling.min_site, limits.min_site);
                            assert_eq!(sibling.max_site, limits.max_site);
                        }
                        assert!(limits.min_site <= limits.max_site);
                        for site in limits.min_site..limits.max_site {
                            covered[site] += 1;
                        }
                    }

                    assert!(covered.iter().all(|&c| c == 1));
                }
            }
        }
    }

    #[test]
    fn test_row_ranges_cover_site_output() {
        for n_colorspins in [2, 6, 12, 24, 48] {
            for n_smt in [1, 2, 3, 4] {
                let partition = ThreadPartition::new(2 * n_smt, n_smt, 64, n_colorspins).unwrap();

                for core in 0..2 {
                    let mut covered = vec![0usize; n_colorspins];
                    for smt in 0..n_smt {
                        let (row_min, row_max) =
                            partition.limits(core * n_smt + smt).rows(n_colorspins);
                        assert!(row_min <= row_max);
                        for row in row_min..row_max {
                            covered[row] += 1;
                        }
                    }
                    assert!(covered.iter().all(|&c| c == 1));
                }
            }
        }
    }

    #[test]
    fn test_cache_line_split() {
        // 24 colour-spins are 48 floats, three cache lines split 2 + 1 between two SMT threads
        let first = ThreadLimits::new(0, 2, 2, 16, 6);
        let second = ThreadLimits::new(1, 2, 2, 16, 6);
        assert_eq!((first.min_vrow, first.max_vrow), (0, 4));
        assert_eq!((second.min_vrow, second.max_vrow), (4, 6));
        assert_eq!((first.min_site, first.max_site), (0, 16));
        assert_eq!(first, ThreadLimits { min_vrow: 0, max_vrow: 4, ..second });
    }

    #[test]
    fn test_invalid_layouts() {
        assert!(matches!(
            ThreadPartition::new(0, 1, 16, 24),
            Err(CoarseError::InvalidThreadLayout(_))
        ));
        assert!(ThreadPartition::new(3, 2, 16, 24).is_err());
        assert!(ThreadPartition::new(4, 0, 16, 24).is_err());
    }

    #[test]
    fn test_partition_from_pool() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        let from_pool = ThreadPartition::from_pool(&pool, 2, 100, 24).unwrap();
        let direct = ThreadPartition::new(4, 2, 100, 24).unwrap();

        assert_eq!(from_pool.n_threads(), 4);
        assert_eq!(from_pool.all_limits(), direct.all_limits());
    }
}
