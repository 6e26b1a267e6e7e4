use crate::error::{LsaError, Result};
use crate::rank_reducer::{
    DenseSvd, RandomizedSvd, RandomizedSvdConfig, RankReducer, TruncatedSvd, TruncatedSvdSolver,
};
use crate::sparse::SparseMatrix;
use crate::sparse_format::TripletList;
use approx::assert_abs_diff_eq;
use ndarray::{array, Array1, Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_sparse_triplets(rows: usize, cols: usize, density: f64, seed: u64) -> TripletList {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut triplets = TripletList::new();
    for row in 0..rows {
        for col in 0..cols {
            if rng.gen_bool(density) {
                triplets.push(row, col, rng.gen_range(0.0..5.0));
            }
        }
    }
    triplets
}

/// Sparse matrix of exact rank 3 built from non-negative outer products.
fn low_rank_matrix(rows: usize, cols: usize, seed: u64) -> SparseMatrix {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let left = Array2::from_shape_fn((rows, 3), |_| if rng.gen_bool(0.5) { rng.gen_range(0.5..2.0) } else { 0.0 });
    let right = Array2::from_shape_fn((3, cols), |_| if rng.gen_bool(0.5) { rng.gen_range(0.5..2.0) } else { 0.0 });
    let weights = array![[10.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 1.0]];
    let dense = left.dot(&weights).dot(&right);

    let mut triplets = TripletList::new();
    for ((row, col), &value) in dense.indexed_iter() {
        if value != 0.0 {
            triplets.push(row, col, value);
        }
    }
    SparseMatrix::from_triplets(rows, cols, triplets).unwrap()
}

fn reconstruct(factors: &TruncatedSvd) -> Array2<f64> {
    (&factors.u * &factors.singular_values).dot(&factors.v.t())
}

fn assert_orthonormal_columns(matrix: ArrayView2<f64>, context: &str) {
    let gram = matrix.t().dot(&matrix);
    let identity = Array2::<f64>::eye(matrix.ncols());
    for ((i, j), &value) in gram.indexed_iter() {
        assert!(
            (value - identity[[i, j]]).abs() < 1e-8,
            "{}: gram[{}, {}] = {}",
            context,
            i,
            j,
            value
        );
    }
}

struct PanickingSolver;

impl TruncatedSvdSolver for PanickingSolver {
    fn truncated_svd(&self, _matrix: &SparseMatrix, _k: usize) -> Result<TruncatedSvd> {
        panic!("the solver must not run for an invalid rank");
    }
}

struct WrongShapeSolver;

impl TruncatedSvdSolver for WrongShapeSolver {
    fn truncated_svd(&self, matrix: &SparseMatrix, k: usize) -> Result<TruncatedSvd> {
        Ok(TruncatedSvd {
            u: Array2::zeros((matrix.nrows(), k + 1)),
            singular_values: Array1::zeros(k),
            v: Array2::zeros((matrix.ncols(), k)),
        })
    }
}

#[test]
fn diagonal_matrix_singular_values_are_its_diagonal() {
    let mut triplets = TripletList::new();
    triplets.push(0, 0, 3.0);
    triplets.push(1, 1, 5.0);
    triplets.push(2, 2, 1.0);
    let reducer = RankReducer::new(RandomizedSvd::default());

    let factors = reducer.reduce_triplets(4, 3, triplets, 2).unwrap();
    assert_eq!(factors.rank(), 2);
    assert_abs_diff_eq!(factors.singular_values, array![5.0, 3.0], epsilon = 1e-10);
    assert_abs_diff_eq!(factors.u[[1, 0]].abs(), 1.0, epsilon = 1e-10);
    assert_abs_diff_eq!(factors.u[[0, 1]].abs(), 1.0, epsilon = 1e-10);
}

#[test]
fn full_sketch_matches_dense_decomposition() {
    let (rows, cols, k) = (30, 20, 6);
    let matrix = SparseMatrix::from_triplets(rows, cols, random_sparse_triplets(rows, cols, 0.3, 11)).unwrap();

    // k + oversampling covers min(rows, cols), so the range finder is exact.
    let randomized = RankReducer::new(RandomizedSvd::new(RandomizedSvdConfig {
        oversampling: 20,
        ..RandomizedSvdConfig::default()
    }))
    .reduce(&matrix, k)
    .unwrap();
    let dense = RankReducer::new(DenseSvd).reduce(&matrix, k).unwrap();

    assert_abs_diff_eq!(randomized.singular_values, dense.singular_values, epsilon = 1e-8);
    assert_abs_diff_eq!(reconstruct(&randomized), reconstruct(&dense), epsilon = 1e-8);
}

#[test]
fn randomized_svd_recovers_low_rank_structure() {
    let matrix = low_rank_matrix(120, 80, 3);
    let reducer = RankReducer::new(RandomizedSvd::new(RandomizedSvdConfig {
        oversampling: 5,
        power_iterations: 2,
        random_seed: 99,
    }));

    let factors = reducer.reduce(&matrix, 3).unwrap();
    assert_eq!(factors.u.dim(), (120, 3));
    assert_eq!(factors.v.dim(), (80, 3));
    assert_orthonormal_columns(factors.u.view(), "U");
    assert_orthonormal_columns(factors.v.view(), "V");
    for pair in factors.singular_values.windows(2) {
        assert!(pair[0] >= pair[1], "singular values not descending: {:?}", factors.singular_values);
    }
    assert_abs_diff_eq!(reconstruct(&factors), matrix.to_dense(), epsilon = 1e-6);
}

#[test]
fn same_seed_gives_identical_factors() {
    let matrix = SparseMatrix::from_triplets(50, 40, random_sparse_triplets(50, 40, 0.1, 5)).unwrap();
    let reducer = RankReducer::new(RandomizedSvd::default());
    let first = reducer.reduce(&matrix, 4).unwrap();
    let second = reducer.reduce(&matrix, 4).unwrap();
    assert_eq!(first.u, second.u);
    assert_eq!(first.singular_values, second.singular_values);
}

#[test]
fn duplicate_triplets_add_before_factorization() {
    let mut triplets = TripletList::new();
    triplets.push(0, 0, 1.0);
    triplets.push(0, 0, 2.0);
    triplets.push(1, 1, 1.0);
    let factors = RankReducer::new(DenseSvd).reduce_triplets(2, 2, triplets, 1).unwrap();
    assert_abs_diff_eq!(factors.singular_values[0], 3.0, epsilon = 1e-12);
}

#[test]
fn invalid_rank_is_rejected_before_the_solver_runs() {
    let matrix = SparseMatrix::from_triplets(3, 2, random_sparse_triplets(3, 2, 0.5, 1)).unwrap();
    let reducer = RankReducer::new(PanickingSolver);

    assert!(matches!(reducer.reduce(&matrix, 0), Err(LsaError::Dimension(_))));
    assert!(matches!(reducer.reduce(&matrix, 3), Err(LsaError::Dimension(_))));
    assert!(matches!(
        reducer.reduce_triplets(3, 2, TripletList::new(), 5),
        Err(LsaError::Dimension(_))
    ));
}

#[test]
fn out_of_range_triplets_fail_assembly() {
    let mut triplets = TripletList::new();
    triplets.push(5, 0, 1.0);
    let err = RankReducer::new(DenseSvd).reduce_triplets(2, 2, triplets, 1).unwrap_err();
    assert!(matches!(err, LsaError::Dimension(_)));
}

#[test]
fn malformed_solver_output_is_reported() {
    let matrix = SparseMatrix::from_triplets(4, 4, random_sparse_triplets(4, 4, 0.5, 2)).unwrap();
    let err = RankReducer::new(WrongShapeSolver).reduce(&matrix, 2).unwrap_err();
    assert!(matches!(err, LsaError::Linalg(_)));
}

#[test]
fn rank_equal_to_smaller_dimension_is_allowed() {
    let matrix = SparseMatrix::from_triplets(6, 3, random_sparse_triplets(6, 3, 0.8, 8)).unwrap();
    let factors = RankReducer::new(RandomizedSvd::default()).reduce(&matrix, 3).unwrap();
    assert_abs_diff_eq!(reconstruct(&factors), matrix.to_dense(), epsilon = 1e-9);
}

#[test]
fn config_round_trips_through_json() {
    let config = RandomizedSvdConfig {
        oversampling: 4,
        power_iterations: 0,
        random_seed: 17,
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: RandomizedSvdConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.oversampling, 4);
    assert_eq!(parsed.power_iterations, 0);
    assert_eq!(parsed.random_seed, 17);
}

#[test]
fn wide_matrix_yields_thin_right_factor() {
    let (rows, cols) = (3, 4000);
    let matrix = SparseMatrix::from_triplets(rows, cols, random_sparse_triplets(rows, cols, 0.01, 21)).unwrap();

    for factors in [
        RankReducer::new(RandomizedSvd::default()).reduce(&matrix, 1).unwrap(),
        RankReducer::new(DenseSvd).reduce(&matrix, 1).unwrap(),
    ] {
        assert_eq!(factors.u.dim(), (rows, 1));
        assert_eq!(factors.v.dim(), (cols, 1));
        assert_orthonormal_columns(factors.v.view(), "V");
    }
}
