// src/linalg_backends.rs

//! Dense QR and SVD used on the small sketches of the randomized SVD.
//!
//! The backend is chosen at compile time: ndarray-linalg (LAPACK) by default,
//! faer with the `backend_faer` feature.

use crate::error::{LsaError, Result};
use ndarray::{Array1, Array2};
use ndarray_linalg::{JobSvd, SVDDCInto as NdLinalgSVDDCInto, QR as NdLinalgQR};

/// Output of a thin dense Singular Value Decomposition.
///
/// For an `m x n` input with `r = min(m, n)`, `u` is `m x r`, `s` has `r`
/// values in descending order and `vt` is `r x n`.
#[derive(Debug)]
pub struct SVDOutput {
    pub u: Option<Array2<f64>>,
    pub s: Array1<f64>,
    pub vt: Option<Array2<f64>>,
}

/// QR decomposition, retrieving only the thin Q factor.
pub trait BackendQR {
    fn qr_q_factor(&self, matrix: &Array2<f64>) -> Result<Array2<f64>>;
}

/// Thin Singular Value Decomposition consuming its input.
pub trait BackendSVD {
    fn svd_into(&self, matrix: Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput>;
}

/// LAPACK through ndarray-linalg.
#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

impl BackendQR for NdarrayLinAlgBackend {
    fn qr_q_factor(&self, matrix: &Array2<f64>) -> Result<Array2<f64>> {
        let (q_factor, _r) = matrix
            .qr()
            .map_err(|e| LsaError::Linalg(format!("QR of a {:?} matrix failed: {}", matrix.dim(), e)))?;
        Ok(q_factor)
    }
}

impl BackendSVD for NdarrayLinAlgBackend {
    fn svd_into(&self, matrix: Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput> {
        let dim = matrix.dim();
        // Divide and conquer with thin factors; a full V^T would be n x n.
        let job = if compute_u || compute_v { JobSvd::Some } else { JobSvd::None };
        let (u, s, vt) = matrix
            .svddc_into(job)
            .map_err(|e| LsaError::Linalg(format!("SVD of a {:?} matrix failed: {}", dim, e)))?;
        Ok(SVDOutput {
            u: u.filter(|_| compute_u),
            s,
            vt: vt.filter(|_| compute_v),
        })
    }
}

#[cfg(feature = "backend_faer")]
mod faer_specific_code {
    use super::{BackendQR, BackendSVD, SVDOutput};
    use crate::error::{LsaError, Result};
    use faer::linalg::solvers::Svd as FaerSolverSvd;
    use faer::MatRef;
    use ndarray::{Array1, Array2, ShapeBuilder};

    #[derive(Debug, Default, Copy, Clone)]
    pub struct FaerLinAlgBackend;

    fn faer_mat_to_ndarray(faer_mat: MatRef<'_, f64>) -> Array2<f64> {
        let (nrows, ncols) = (faer_mat.nrows(), faer_mat.ncols());
        Array2::from_shape_fn((nrows, ncols).f(), |(i, j)| faer_mat[(i, j)])
    }

    /// Views a contiguous ndarray matrix as a faer matrix without copying.
    fn view_as_faer(matrix: &Array2<f64>) -> Result<MatRef<'_, f64>> {
        let (nrows, ncols) = matrix.dim();
        let slice = matrix.as_slice_memory_order().ok_or_else(|| {
            LsaError::Linalg(format!("{}x{} matrix is not contiguous and cannot be viewed by faer", nrows, ncols))
        })?;
        if matrix.is_standard_layout() {
            Ok(MatRef::from_row_major_slice(slice, nrows, ncols))
        } else {
            Ok(MatRef::from_column_major_slice(slice, nrows, ncols))
        }
    }

    impl BackendQR for FaerLinAlgBackend {
        fn qr_q_factor(&self, matrix: &Array2<f64>) -> Result<Array2<f64>> {
            let (nrows, ncols) = matrix.dim();
            if nrows == 0 {
                return Ok(Array2::zeros((0, nrows.min(ncols))));
            }
            let qr_decomp = view_as_faer(matrix)?.qr();
            Ok(faer_mat_to_ndarray(qr_decomp.compute_thin_q().as_ref()))
        }
    }

    impl BackendSVD for FaerLinAlgBackend {
        fn svd_into(&self, matrix: Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput> {
            let (nrows, ncols) = matrix.dim();
            if matrix.is_empty() {
                let k_dim = nrows.min(ncols);
                return Ok(SVDOutput {
                    u: compute_u.then(|| Array2::zeros((nrows, k_dim))),
                    s: Array1::zeros(k_dim),
                    vt: compute_v.then(|| Array2::zeros((k_dim, ncols))),
                });
            }
            let svd = FaerSolverSvd::new_thin(view_as_faer(&matrix)?)
                .map_err(|e| LsaError::Linalg(format!("faer SVD of a {}x{} matrix failed: {:?}", nrows, ncols, e)))?;

            let diagonal = svd.S().diagonal();
            let s = Array1::from_shape_fn(diagonal.nrows(), |i| diagonal[i]);
            let u = compute_u.then(|| faer_mat_to_ndarray(svd.U()));
            let vt = compute_v.then(|| faer_mat_to_ndarray(svd.V()).t().into_owned());
            Ok(SVDOutput { u, s, vt })
        }
    }
}

/// Dispatches to the backend selected by feature flags.
#[derive(Debug, Default, Copy, Clone)]
pub struct LinAlgBackendProvider;

impl LinAlgBackendProvider {
    pub fn new() -> Self {
        Self
    }
}

impl BackendQR for LinAlgBackendProvider {
    fn qr_q_factor(&self, matrix: &Array2<f64>) -> Result<Array2<f64>> {
        #[cfg(feature = "backend_faer")]
        {
            faer_specific_code::FaerLinAlgBackend.qr_q_factor(matrix)
        }
        #[cfg(not(feature = "backend_faer"))]
        {
            NdarrayLinAlgBackend.qr_q_factor(matrix)
        }
    }
}

impl BackendSVD for LinAlgBackendProvider {
    fn svd_into(&self, matrix: Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput> {
        #[cfg(feature = "backend_faer")]
        {
            faer_specific_code::FaerLinAlgBackend.svd_into(matrix, compute_u, compute_v)
        }
        #[cfg(not(feature = "backend_faer"))]
        {
            NdarrayLinAlgBackend.svd_into(matrix, compute_u, compute_v)
        }
    }
}
