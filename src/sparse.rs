// src/sparse.rs

use crate::error::{LsaError, Result};
use crate::sparse_format::TripletList;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;

/// A sparse term/document matrix in compressed sparse row form.
///
/// The transpose is kept alongside so that both `A * X` and `A^T * X` are
/// row-parallel products.
#[derive(Clone, Debug)]
pub struct SparseMatrix {
    csr: CsrMatrix<f64>,
    csr_transposed: CsrMatrix<f64>,
}

impl SparseMatrix {
    /// Assembles a `rows x cols` matrix from a triplet list.
    /// Duplicate coordinates are summed.
    ///
    /// # Errors
    /// `Dimension` if any triplet lies outside the declared shape.
    pub fn from_triplets(rows: usize, cols: usize, triplets: TripletList) -> Result<Self> {
        let TripletList {
            row_indices,
            col_indices,
            values,
        } = triplets;
        let coo = CooMatrix::try_from_triplets(rows, cols, row_indices, col_indices, values).map_err(|e| {
            LsaError::dimension(format!("cannot assemble a {} x {} sparse matrix: {}", rows, cols, e))
        })?;
        Ok(Self::from_csr(CsrMatrix::from(&coo)))
    }

    pub fn from_csr(csr: CsrMatrix<f64>) -> Self {
        let csr_transposed = csr.transpose();
        Self { csr, csr_transposed }
    }

    pub fn nrows(&self) -> usize {
        self.csr.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.csr.ncols()
    }

    /// Number of stored entries after duplicate summation.
    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }

    /// `A * x`, where `x` has `ncols()` rows.
    pub fn dot_dense(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        csr_dot_dense(&self.csr, x)
    }

    /// `A^T * x`, where `x` has `nrows()` rows.
    pub fn transpose_dot_dense(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        csr_dot_dense(&self.csr_transposed, x)
    }

    /// Dense copy of the matrix. Only sensible for small inputs.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::<f64>::zeros((self.nrows(), self.ncols()));
        for (row, col, value) in self.csr.triplet_iter() {
            dense[[row, col]] += *value;
        }
        dense
    }
}

fn csr_dot_dense(csr: &CsrMatrix<f64>, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
    if x.nrows() != csr.ncols() {
        return Err(LsaError::dimension(format!(
            "cannot multiply a {} x {} sparse matrix by a {} x {} dense matrix",
            csr.nrows(),
            csr.ncols(),
            x.nrows(),
            x.ncols()
        )));
    }
    let mut product = Array2::<f64>::zeros((csr.nrows(), x.ncols()));
    let offsets = csr.row_offsets();
    let columns = csr.col_indices();
    let values = csr.values();

    product
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(row, mut product_row)| {
            for entry in offsets[row]..offsets[row + 1] {
                product_row.scaled_add(values[entry], &x.row(columns[entry]));
            }
        });
    Ok(product)
}
