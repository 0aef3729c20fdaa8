//? mpirun -n {{NPROCESSES}} --features "mpi"

#[cfg(feature = "mpi")]
fn main() {
    use std::sync::Arc;

    use mgcoarse::{
        blas::{gaussian_seeded, inner_product_vec, norm2_vec},
        comm::MpiReduce,
        field::CoarseSpinor,
        LatticeInfo,
    };
    use mpi::traits::Communicator;

    let (universe, _threading) = mpi::initialize_with_threading(mpi::Threading::Single).unwrap();
    let world = universe.world();
    let size = world.size() as f64;
    let rank = world.rank();

    let local = LatticeInfo::new([4, 4, 4, 4], 4, 2).unwrap();
    let global = LatticeInfo::with_reducer(
        [4, 4, 4, 4],
        4,
        2,
        Arc::new(MpiReduce::new(world.duplicate())),
    )
    .unwrap();

    // Every rank holds the same data, so global sums are the local sums times the number of ranks
    let mut x_local = CoarseSpinor::new(&local);
    let mut y_local = CoarseSpinor::new(&local);
    let mut x = CoarseSpinor::new(&global);
    let mut y = CoarseSpinor::new(&global);
    gaussian_seeded(&mut x_local, 0);
    gaussian_seeded(&mut y_local, 1);
    gaussian_seeded(&mut x, 0);
    gaussian_seeded(&mut y, 1);

    let norm2 = norm2_vec(&x);
    let expected = size * norm2_vec(&x_local);
    assert!((norm2 - expected).abs() <= 1e-10 * expected);

    let ip = inner_product_vec(&x, &y);
    let expected = inner_product_vec(&x_local, &y_local) * size;
    assert!((ip - expected).norm() <= 1e-10 * expected.norm());

    if rank == 0 {
        println!("...test_global_reduce passed")
    }
}

#[cfg(not(feature = "mpi"))]
fn main() {}
