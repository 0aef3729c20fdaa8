//! Reductions of partial sums across processes.
//!
//! Every reducing kernel in [`crate::blas`] and [`crate::transfer`] routes its partial sums through the
//! [`GlobalReduce`] attached to the [`crate::lattice::LatticeInfo`] of its operands. Single process runs
//! use [`LocalReduce`], which leaves values untouched.
use std::fmt::Debug;

/// Interface for summing partial results over all processes taking part in a computation.
///
/// Implementations must be collective: every process calls each method the same number of times, in the
/// same order, with arrays of the same length.
pub trait GlobalReduce: Debug + Send + Sync {
    /// Sum a scalar in place over all processes.
    fn global_sum(&self, value: &mut f64);

    /// Elementwise sum of an array in place over all processes.
    fn global_sum_array(&self, values: &mut [f64]);
}

/// Single process reduction, values are returned unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalReduce;

impl GlobalReduce for LocalReduce {
    #[inline]
    fn global_sum(&self, _value: &mut f64) {}

    #[inline]
    fn global_sum_array(&self, _values: &mut [f64]) {}
}

#[cfg(feature = "mpi")]
pub use mpi_reduce::MpiReduce;

#[cfg(feature = "mpi")]
mod mpi_reduce {
    use mpi::{
        collective::SystemOperation,
        topology::SimpleCommunicator,
        traits::{Communicator, CommunicatorCollectives},
    };

    use super::GlobalReduce;

    /// Sum reduction over all ranks of an MPI communicator via `MPI_Allreduce`.
    pub struct MpiReduce {
        communicator: SimpleCommunicator,
    }

    impl MpiReduce {
        /// Constructor
        ///
        /// # Arguments
        /// * `communicator` - Communicator spanning every rank holding part of the lattice.
        pub fn new(communicator: SimpleCommunicator) -> Self {
            Self { communicator }
        }
    }

    // Reductions are only issued by the thread driving a kernel, after its parallel region has completed.
    unsafe impl Send for MpiReduce {}
    unsafe impl Sync for MpiReduce {}

    impl std::fmt::Debug for MpiReduce {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MpiReduce")
                .field("rank", &self.communicator.rank())
                .field("size", &self.communicator.size())
                .finish()
        }
    }

    impl GlobalReduce for MpiReduce {
        fn global_sum(&self, value: &mut f64) {
            let local = *value;
            self.communicator
                .all_reduce_into(&local, value, SystemOperation::sum());
        }

        fn global_sum_array(&self, values: &mut [f64]) {
            let local = values.to_vec();
            self.communicator
                .all_reduce_into(&local[..], values, SystemOperation::sum());
        }
    }
}

#[cfg(test)]
mod test {
    use super::{GlobalReduce, LocalReduce};

    #[test]
    fn test_local_reduce_is_identity() {
        let reducer = LocalReduce;

        let mut value = 3.25;
        reducer.global_sum(&mut value);
        assert_eq!(value, 3.25);

        let mut values = [1.0, -2.5];
        reducer.global_sum_array(&mut values);
        assert_eq!(values, [1.0, -2.5]);
    }
}
