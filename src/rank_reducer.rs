// src/rank_reducer.rs

//! Rank reduction of the sparse matrix through a truncated SVD.

use crate::error::{LsaError, Result};
use crate::linalg_backends::{BackendQR, BackendSVD, LinAlgBackendProvider};
use crate::sparse::SparseMatrix;
use crate::sparse_format::TripletList;
use log::{debug, info, trace};
use ndarray::{s, Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The top-`k` singular triplets of a matrix.
#[derive(Clone, Debug)]
pub struct TruncatedSvd {
    /// Left singular vectors. Shape: `(rows, k)`.
    pub u: Array2<f64>,
    /// Singular values in descending order. Shape: `(k)`.
    pub singular_values: Array1<f64>,
    /// Right singular vectors. Shape: `(cols, k)`. Not used by the output stages.
    pub v: Array2<f64>,
}

impl TruncatedSvd {
    pub fn rank(&self) -> usize {
        self.singular_values.len()
    }
}

/// A truncated SVD algorithm for sparse matrices.
pub trait TruncatedSvdSolver {
    /// Computes the top `k` singular triplets of `matrix`.
    /// Callers guarantee `1 <= k <= min(rows, cols)`.
    fn truncated_svd(&self, matrix: &SparseMatrix, k: usize) -> Result<TruncatedSvd>;
}

/// Configuration for the randomized range-finder SVD.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RandomizedSvdConfig {
    /// Extra sketch columns beyond `k` (L = k + oversampling, clamped to min(rows, cols)).
    pub oversampling: usize,
    /// Number of power iterations refining the sketch.
    pub power_iterations: usize,
    /// Seed for the Gaussian test matrix.
    pub random_seed: u64,
}

impl Default for RandomizedSvdConfig {
    fn default() -> Self {
        RandomizedSvdConfig {
            oversampling: 10,
            power_iterations: 2,
            random_seed: 2025,
        }
    }
}

/// Randomized truncated SVD (Halko, Martinsson & Tropp) driven entirely by
/// sparse products, so the matrix is never densified.
///
/// The result is exact up to rounding when the sketch covers min(rows, cols).
#[derive(Clone, Debug, Default)]
pub struct RandomizedSvd {
    config: RandomizedSvdConfig,
}

impl RandomizedSvd {
    pub fn new(config: RandomizedSvdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RandomizedSvdConfig {
        &self.config
    }
}

impl TruncatedSvdSolver for RandomizedSvd {
    fn truncated_svd(&self, matrix: &SparseMatrix, k: usize) -> Result<TruncatedSvd> {
        let (rows, cols) = (matrix.nrows(), matrix.ncols());
        let sketch_dimension_l = (k + self.config.oversampling).min(rows.min(cols));
        trace!(
            "Randomized SVD: k={}, sketch L={}, matrix {} x {}, {} power iterations",
            k,
            sketch_dimension_l,
            rows,
            cols,
            self.config.power_iterations
        );

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_seed);
        let normal_dist = Normal::new(0.0, 1.0)
            .map_err(|e| LsaError::Linalg(format!("failed to create normal distribution: {}", e)))?;
        // Omega: cols x L
        let omega = Array2::from_shape_fn((cols, sketch_dimension_l), |_| normal_dist.sample(&mut rng));

        let backend = LinAlgBackendProvider::new();

        // Q = orth(A * Omega): rows x L
        let mut q_basis = backend.qr_q_factor(&matrix.dot_dense(&omega.view())?)?;
        for iteration in 0..self.config.power_iterations {
            trace!("Randomized SVD power iteration {}/{}", iteration + 1, self.config.power_iterations);
            let q_tilde = backend.qr_q_factor(&matrix.transpose_dot_dense(&q_basis.view())?)?;
            q_basis = backend.qr_q_factor(&matrix.dot_dense(&q_tilde.view())?)?;
        }

        // B = Q^T * A = (A^T * Q)^T: L x cols
        let projected_b = matrix.transpose_dot_dense(&q_basis.view())?.reversed_axes();
        let svd_b = backend.svd_into(projected_b, true, true)?;
        let u_b = svd_b
            .u
            .ok_or_else(|| LsaError::Linalg("SVD of the projected sketch returned no U".to_string()))?;
        let vt_b = svd_b
            .vt
            .ok_or_else(|| LsaError::Linalg("SVD of the projected sketch returned no V^T".to_string()))?;
        if svd_b.s.len() < k {
            return Err(LsaError::Linalg(format!(
                "projected sketch yielded {} singular values, {} requested",
                svd_b.s.len(),
                k
            )));
        }

        // U_A = Q * U_B
        let u = q_basis.dot(&u_b.slice(s![.., ..k]));
        let singular_values = svd_b.s.slice(s![..k]).to_owned();
        let v = vt_b.slice(s![..k, ..]).t().to_owned();
        Ok(TruncatedSvd { u, singular_values, v })
    }
}

/// Exact truncated SVD through a dense decomposition. Memory grows with
/// `rows * cols`, so this is meant for small matrices.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseSvd;

impl TruncatedSvdSolver for DenseSvd {
    fn truncated_svd(&self, matrix: &SparseMatrix, k: usize) -> Result<TruncatedSvd> {
        let output = LinAlgBackendProvider::new().svd_into(matrix.to_dense(), true, true)?;
        let u = output
            .u
            .ok_or_else(|| LsaError::Linalg("dense SVD returned no U".to_string()))?;
        let vt = output
            .vt
            .ok_or_else(|| LsaError::Linalg("dense SVD returned no V^T".to_string()))?;
        if output.s.len() < k {
            return Err(LsaError::Linalg(format!(
                "dense SVD yielded {} singular values, {} requested",
                output.s.len(),
                k
            )));
        }
        Ok(TruncatedSvd {
            u: u.slice(s![.., ..k]).to_owned(),
            singular_values: output.s.slice(s![..k]).to_owned(),
            v: vt.slice(s![..k, ..]).t().to_owned(),
        })
    }
}

/// Checks `k` against the matrix shape before any factorization is attempted.
pub fn validate_rank(rows: usize, cols: usize, k: usize) -> Result<()> {
    if k == 0 {
        return Err(LsaError::dimension("requested rank must be at least 1"));
    }
    let max_rank = rows.min(cols);
    if k > max_rank {
        return Err(LsaError::dimension(format!(
            "requested rank {} exceeds min(rows, cols) = {} for a {} x {} matrix",
            k, max_rank, rows, cols
        )));
    }
    Ok(())
}

/// Hands a sparse matrix to a truncated SVD solver and checks what comes back.
#[derive(Clone, Debug, Default)]
pub struct RankReducer<S: TruncatedSvdSolver> {
    solver: S,
}

impl<S: TruncatedSvdSolver> RankReducer<S> {
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    /// Computes the rank-`k` factors of `matrix`.
    ///
    /// # Errors
    /// `Dimension` if `k` is zero or exceeds min(rows, cols); `Linalg` if the
    /// solver fails or returns factors of the wrong shape.
    pub fn reduce(&self, matrix: &SparseMatrix, k: usize) -> Result<TruncatedSvd> {
        let (rows, cols) = (matrix.nrows(), matrix.ncols());
        validate_rank(rows, cols, k)?;

        info!(
            "Computing rank-{} SVD of a {} x {} matrix with {} stored entries",
            k,
            rows,
            cols,
            matrix.nnz()
        );
        let start_time = Instant::now();
        let factors = self.solver.truncated_svd(matrix, k)?;
        info!("SVD complete in {:?}", start_time.elapsed());

        if factors.u.dim() != (rows, k) || factors.singular_values.len() != k || factors.v.dim() != (cols, k) {
            return Err(LsaError::Linalg(format!(
                "solver returned U {:?}, s ({}), V {:?}; expected U ({}, {}), s ({}), V ({}, {})",
                factors.u.dim(),
                factors.singular_values.len(),
                factors.v.dim(),
                rows,
                k,
                k,
                cols,
                k
            )));
        }
        debug!("Leading singular values: {:?}", factors.singular_values.slice(s![..k.min(10)]));
        Ok(factors)
    }

    /// Assembles the matrix from `triplets` and reduces it to rank `k`.
    /// The rank is validated before assembly.
    pub fn reduce_triplets(&self, rows: usize, cols: usize, triplets: TripletList, k: usize) -> Result<TruncatedSvd> {
        validate_rank(rows, cols, k)?;
        let matrix = SparseMatrix::from_triplets(rows, cols, triplets)?;
        self.reduce(&matrix, k)
    }
}
