// src/rescale.rs

//! Post-hoc rescaling of stored reduced factors.
//!
//! Reuses a finished factorization: the stored rows of `U` are truncated to
//! the first `entries` values and weighted by `s[i]^sig_power`, producing a
//! sparse matrix file without recomputing the SVD.

use crate::error::{LsaError, Result};
use crate::factor_format::{read_singular_values, FactorRowReader, RowLayout};
use crate::output::{write_atomically, write_pair_line, FloatToken};
use crate::projection::{singular_value_path, singular_value_weights};
use log::{debug, info};
use ndarray::s;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Greedy prefix up to the last `.<digits>.LSA`; anything after it is dropped.
static REDUCED_PATH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)\.\d+\.LSA").expect("reduced path pattern is a valid regex"));

/// Where the rescaler finds the singular values of its input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SingularValueSource {
    /// First line of a reduced factor file.
    FirstLine,
    /// `<input>_singVal`, next to a sparse projection whose first line is a
    /// `rows k nnz` header.
    Sidecar,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RescaleConfig {
    /// Number of leading reduced dimensions to keep.
    pub entries: usize,
    /// Exponent applied to each kept singular value.
    pub sig_power: f64,
    /// Row layout of the input file. Ignored with `SingularValueSource::Sidecar`,
    /// whose rows are always paired.
    pub input_layout: RowLayout,
    pub singular_value_source: SingularValueSource,
    /// Emit a progress line every this many rows. Zero disables progress output.
    pub progress_interval: usize,
}

impl Default for RescaleConfig {
    fn default() -> Self {
        RescaleConfig {
            entries: 100,
            sig_power: 1.0,
            input_layout: RowLayout::Paired,
            singular_value_source: SingularValueSource::FirstLine,
            progress_interval: 1000,
        }
    }
}

/// What a rescaling run wrote.
#[derive(Clone, Debug, PartialEq)]
pub struct RescaleSummary {
    pub output_path: PathBuf,
    pub rows: usize,
    pub entries: usize,
    /// Header non-zero count, always `rows * entries`.
    pub declared_nonzero: usize,
}

/// Derives `<prefix>.LSA_<entries>_<sig_power>` from an input path of the
/// form `<prefix>.<digits>.LSA[...]`.
///
/// # Errors
/// `PathFormat` if the path has no `.<digits>.LSA` component or is not valid UTF-8.
pub fn derive_output_path<P: AsRef<Path>>(input: P, entries: usize, sig_power: f64) -> Result<PathBuf> {
    let input = input.as_ref();
    let text = input.to_str().ok_or_else(|| LsaError::PathFormat(input.to_path_buf()))?;
    let prefix = REDUCED_PATH_PATTERN
        .captures(text)
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| LsaError::PathFormat(input.to_path_buf()))?;
    Ok(PathBuf::from(format!(
        "{}.LSA_{}_{}",
        prefix.as_str(),
        entries,
        FloatToken(sig_power)
    )))
}

/// Regenerates a truncated, singular-value-weighted sparse matrix from a
/// stored reduced factor file.
#[derive(Clone, Debug, Default)]
pub struct PostHocRescaler {
    config: RescaleConfig,
}

impl PostHocRescaler {
    pub fn new(config: RescaleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RescaleConfig {
        &self.config
    }

    /// Rescales `input` into the path given by [`derive_output_path`].
    pub fn run<P: AsRef<Path>>(&self, input: P) -> Result<RescaleSummary> {
        let output = derive_output_path(&input, self.config.entries, self.config.sig_power)?;
        self.run_to(input, output)
    }

    /// Rescales `input` into `output`.
    ///
    /// Row `r` of the output holds `(i, value[r][i] * s[i]^sig_power)` for the
    /// first `min(row length, entries)` values of input row `r`, taken by
    /// position. Nothing is written unless every row is processed.
    ///
    /// # Errors
    /// `Format` if a reduced factor file does not start with descending
    /// singular values, `Index` if fewer than `entries` are stored, `Divergence`
    /// if a kept singular value cannot be raised to the power, `Format` or
    /// `Io` for unreadable input.
    pub fn run_to<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output: Q) -> Result<RescaleSummary> {
        let input = input.as_ref();
        let output = output.as_ref();
        let entries = self.config.entries;
        let start_time = Instant::now();

        let mut reader = match self.config.singular_value_source {
            SingularValueSource::FirstLine => FactorRowReader::open(input, self.config.input_layout)?,
            SingularValueSource::Sidecar => {
                let singular_values = read_singular_values(singular_value_path(input))?;
                FactorRowReader::open_sparse_projection(input, singular_values)?
            }
        };
        let available = reader.singular_values().len();
        if available < entries {
            return Err(LsaError::Index {
                requested: entries,
                available,
            });
        }
        let weights = singular_value_weights(
            reader.singular_values().slice(s![..entries]),
            self.config.sig_power,
        )?;
        info!(
            "Rescaling {:?}: keeping {} of {} dimensions, power {}",
            reader.path(),
            entries,
            available,
            self.config.sig_power
        );

        let mut scaled_rows: Vec<Vec<f64>> = Vec::new();
        while let Some(row) = reader.next() {
            let row = row?;
            if row.len() < entries {
                debug!(
                    "{:?} row {} holds only {} values",
                    reader.path(),
                    reader.rows_read() - 1,
                    row.len()
                );
            }
            scaled_rows.push(
                row.iter()
                    .zip(weights.iter())
                    .map(|(value, weight)| value * weight)
                    .collect(),
            );
            let rows = scaled_rows.len();
            if self.config.progress_interval > 0 && rows % self.config.progress_interval == 0 {
                info!("Rescaled {} rows", rows);
            }
        }

        let rows = scaled_rows.len();
        let declared_nonzero = rows * entries;
        write_atomically(output, |out| {
            writeln!(out, "{} {} {}", rows, entries, declared_nonzero)?;
            for row in &scaled_rows {
                write_pair_line(out, row.iter().copied().enumerate())?;
            }
            Ok(())
        })?;
        info!(
            "Wrote {} rescaled rows to {:?} in {:?}",
            rows,
            output,
            start_time.elapsed()
        );

        Ok(RescaleSummary {
            output_path: output.to_path_buf(),
            rows,
            entries,
            declared_nonzero,
        })
    }
}
