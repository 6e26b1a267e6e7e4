// src/projection.rs

//! Serialization of the left factor `U`, optionally weighted by powers of
//! the singular values.

use crate::error::{LsaError, Result};
use crate::factor_format::{write_reduced_factors, write_singular_values, RowLayout};
use crate::output::{write_atomically, write_pair_line};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Output shape of the projection writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionFormat {
    /// Singular value line followed by the rows of `U` in the given layout.
    ReducedFactors(RowLayout),
    /// A sparse matrix file with header `rows k rows*k` and paired rows.
    SparseMatrix,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub format: ProjectionFormat,
    /// When set, column `i` of `U` is multiplied by `s[i]^sig_power` before writing.
    pub sig_power: Option<f64>,
    /// In `SparseMatrix` mode, also store the singular values in `<output>_singVal`.
    pub write_singular_value_file: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ProjectionConfig {
            format: ProjectionFormat::ReducedFactors(RowLayout::Positional),
            sig_power: None,
            write_singular_value_file: false,
        }
    }
}

/// What a projection run wrote.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionSummary {
    pub output_path: PathBuf,
    pub singular_value_path: Option<PathBuf>,
    pub rows: usize,
    pub k: usize,
}

/// Computes `s[i]^power` for every singular value.
///
/// # Errors
/// `Divergence` for a zero singular value under a negative power, for a
/// negative singular value under a non-integer power, or whenever the
/// result is not finite.
pub fn singular_value_weights(singular_values: ArrayView1<f64>, power: f64) -> Result<Array1<f64>> {
    singular_values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            let diverges = (value == 0.0 && power < 0.0) || (value < 0.0 && power.fract() != 0.0);
            let weight = value.powf(power);
            if diverges || !weight.is_finite() {
                return Err(LsaError::Divergence { index, value, power });
            }
            Ok(weight)
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}

/// Multiplies column `j` of `u` by `weights[j]`.
pub fn scale_columns(u: ArrayView2<f64>, weights: ArrayView1<f64>) -> Result<Array2<f64>> {
    if u.ncols() != weights.len() {
        return Err(LsaError::dimension(format!(
            "cannot scale {} columns with {} weights",
            u.ncols(),
            weights.len()
        )));
    }
    let mut scaled = u.to_owned();
    for (mut column, &weight) in scaled.axis_iter_mut(Axis(1)).zip(weights.iter()) {
        column *= weight;
    }
    Ok(scaled)
}

/// `<output>_singVal`, next to the projection output.
pub fn singular_value_path(output_path: &Path) -> PathBuf {
    let mut name = OsString::from(output_path.as_os_str());
    name.push("_singVal");
    PathBuf::from(name)
}

/// Writes reduced factors in the configured [`ProjectionFormat`].
#[derive(Clone, Debug, Default)]
pub struct ProjectionWriter {
    config: ProjectionConfig,
}

impl ProjectionWriter {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Writes `u` (rows x k) and `singular_values` (k) to `output_path`.
    ///
    /// The singular value line always holds the unweighted values; only the
    /// rows of `u` are affected by `sig_power`.
    ///
    /// # Errors
    /// `Dimension` if `u` and `singular_values` disagree on `k`, `Divergence`
    /// if the weights cannot be computed, `Io` on write failure.
    pub fn write<P: AsRef<Path>>(
        &self,
        u: ArrayView2<f64>,
        singular_values: ArrayView1<f64>,
        output_path: P,
    ) -> Result<ProjectionSummary> {
        let output_path = output_path.as_ref();
        let (rows, k) = u.dim();
        if singular_values.len() != k {
            return Err(LsaError::dimension(format!(
                "U has {} columns but {} singular values were given",
                k,
                singular_values.len()
            )));
        }

        let weighted;
        let rows_to_write = match self.config.sig_power {
            Some(power) => {
                let weights = singular_value_weights(singular_values, power)?;
                debug!("Weighting {} factor columns by s^{}", k, power);
                weighted = scale_columns(u, weights.view())?;
                weighted.view()
            }
            None => u,
        };

        let mut singular_value_file = None;
        match self.config.format {
            ProjectionFormat::ReducedFactors(layout) => {
                write_reduced_factors(output_path, singular_values, rows_to_write, layout)?;
            }
            ProjectionFormat::SparseMatrix => {
                write_atomically(output_path, |out| {
                    writeln!(out, "{} {} {}", rows, k, rows * k)?;
                    for row in rows_to_write.rows() {
                        write_pair_line(out, row.iter().copied().enumerate())?;
                    }
                    Ok(())
                })?;
                if self.config.write_singular_value_file {
                    let sidecar = singular_value_path(output_path);
                    write_singular_values(&sidecar, singular_values)?;
                    singular_value_file = Some(sidecar);
                }
            }
        }

        info!("Wrote {} x {} projection to {:?}", rows, k, output_path);
        Ok(ProjectionSummary {
            output_path: output_path.to_path_buf(),
            singular_value_path: singular_value_file,
            rows,
            k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor_format::{read_reduced_factors, read_singular_values};
    use crate::sparse_format::{read_sparse_matrix, ReaderConfig};
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::fs;

    #[test]
    fn weights_follow_the_power() {
        let s = array![4.0, 2.0, 0.25];
        assert_eq!(singular_value_weights(s.view(), 2.0).unwrap(), array![16.0, 4.0, 0.0625]);
        assert_eq!(singular_value_weights(s.view(), 0.0).unwrap(), array![1.0, 1.0, 1.0]);
        assert_abs_diff_eq!(
            singular_value_weights(s.view(), -0.5).unwrap(),
            array![0.5, 1.0 / 2.0f64.sqrt(), 2.0],
            epsilon = 1e-12
        );
    }

    #[test]
    fn zero_singular_value_under_negative_power_diverges() {
        let err = singular_value_weights(array![3.0, 0.0].view(), -1.0).unwrap_err();
        assert!(matches!(err, LsaError::Divergence { index: 1, .. }));
        // A zero value under a non-negative power is fine.
        assert_eq!(singular_value_weights(array![0.0].view(), 0.5).unwrap(), array![0.0]);
    }

    #[test]
    fn negative_singular_value_needs_an_integer_power() {
        assert!(matches!(
            singular_value_weights(array![-2.0].view(), 0.5),
            Err(LsaError::Divergence { index: 0, .. })
        ));
        assert_eq!(singular_value_weights(array![-2.0].view(), 3.0).unwrap(), array![-8.0]);
    }

    #[test]
    fn reduced_factor_output_keeps_unweighted_singular_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.2.LSA_matrices");
        let writer = ProjectionWriter::new(ProjectionConfig {
            sig_power: Some(1.0),
            ..ProjectionConfig::default()
        });
        let u = array![[1.0, 1.0], [0.5, -1.0]];
        let summary = writer.write(u.view(), array![4.0, 2.0].view(), &path).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.k, 2);
        assert_eq!(summary.singular_value_path, None);
        assert_eq!(fs::read_to_string(&path).unwrap(), "4.0 2.0 \n4.0 2.0 \n2.0 -2.0 \n");

        let factors = read_reduced_factors(&path, RowLayout::Positional).unwrap();
        assert_eq!(factors.singular_values, array![4.0, 2.0]);
    }

    #[test]
    fn sparse_output_has_dense_header_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.2.LSA");
        let writer = ProjectionWriter::new(ProjectionConfig {
            format: ProjectionFormat::SparseMatrix,
            sig_power: None,
            write_singular_value_file: true,
        });
        let u = array![[1.0, 0.0], [0.5, -1.0], [0.0, 2.0]];
        let summary = writer.write(u.view(), array![3.0, 1.0].view(), &path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "3 2 6\n0 1.0 1 0.0 \n0 0.5 1 -1.0 \n0 0.0 1 2.0 \n"
        );
        let sidecar = summary.singular_value_path.unwrap();
        assert_eq!(sidecar, dir.path().join("m.2.LSA_singVal"));
        assert_eq!(read_singular_values(&sidecar).unwrap(), array![3.0, 1.0]);

        let reread = read_sparse_matrix(&path, &ReaderConfig::default()).unwrap();
        assert_eq!(reread.header.rows, 3);
        assert_eq!(reread.header.declared_nonzero, 6);
        assert_eq!(reread.triplets.len(), 6);
    }

    #[test]
    fn diverging_weights_leave_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.1.LSA");
        let writer = ProjectionWriter::new(ProjectionConfig {
            format: ProjectionFormat::SparseMatrix,
            sig_power: Some(-1.0),
            write_singular_value_file: true,
        });
        let err = writer.write(array![[1.0]].view(), array![0.0].view(), &path).unwrap_err();
        assert!(matches!(err, LsaError::Divergence { .. }));
        assert!(!path.exists());
        assert!(!singular_value_path(&path).exists());
    }

    #[test]
    fn mismatched_rank_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectionWriter::default()
            .write(array![[1.0, 2.0]].view(), array![1.0].view(), dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, LsaError::Dimension(_)));
    }
}
