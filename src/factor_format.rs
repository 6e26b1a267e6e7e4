// src/factor_format.rs

//! Reduced factor files: a singular-value line followed by one line per row
//! of the left factor `U`.
//!
//! Two row layouts exist and are not interchangeable; callers always name the
//! one they expect.

use crate::error::{LsaError, Result};
use crate::output::{write_atomically, write_pair_line, write_value_line};
use crate::sparse_format::parse_header;
use crate::tokenize::split_line;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// How the values of one factor row are laid out on its line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowLayout {
    /// `v0 v1 v2 ...`; the column index is the position.
    Positional,
    /// `0 v0 1 v1 2 v2 ...`; explicit column index before each value.
    Paired,
}

/// In-memory content of a reduced factor file.
#[derive(Clone, Debug, PartialEq)]
pub struct ReducedFactors {
    pub singular_values: Array1<f64>,
    /// Shape: `(rows, k)`.
    pub u: Array2<f64>,
}

/// Parses a single line of whitespace-separated singular values.
pub(crate) fn parse_singular_values(path: &Path, line_number: usize, line: &str) -> Result<Array1<f64>> {
    let tokens = split_line(line).map_err(|e| LsaError::format(path, line_number, e))?;
    tokens
        .iter()
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                LsaError::format(path, line_number, format!("singular value '{}' is not a number", token))
            })
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}

/// Parses the values of one factor row according to `layout`.
///
/// With `Paired`, stored column indices must be integers but are otherwise
/// ignored: values are returned in the order they appear.
pub(crate) fn parse_row_values(
    path: &Path,
    line_number: usize,
    line: &str,
    layout: RowLayout,
) -> Result<Vec<f64>> {
    let tokens = split_line(line).map_err(|e| LsaError::format(path, line_number, e))?;
    let parse_value = |token: &str| {
        token
            .parse::<f64>()
            .map_err(|_| LsaError::format(path, line_number, format!("value '{}' is not a number", token)))
    };
    match layout {
        RowLayout::Positional => tokens.iter().map(|token| parse_value(token.as_ref())).collect(),
        RowLayout::Paired => {
            if tokens.len() % 2 != 0 {
                return Err(LsaError::format(
                    path,
                    line_number,
                    format!("odd number of tokens ({}): column index without a value", tokens.len()),
                ));
            }
            tokens
                .chunks_exact(2)
                .map(|pair| {
                    pair[0].parse::<usize>().map_err(|_| {
                        LsaError::format(
                            path,
                            line_number,
                            format!("column index '{}' is not a non-negative integer", pair[0]),
                        )
                    })?;
                    parse_value(pair[1].as_ref())
                })
                .collect()
        }
    }
}

/// Streams a reduced factor file: the singular values up front, then rows on demand.
pub struct FactorRowReader {
    path: PathBuf,
    layout: RowLayout,
    singular_values: Array1<f64>,
    lines: Lines<BufReader<File>>,
    rows_read: usize,
}

impl FactorRowReader {
    /// Opens `path` and parses its singular-value line.
    pub fn open<P: AsRef<Path>>(path: P, layout: RowLayout) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| LsaError::io(&path, e))?;
        let mut lines = BufReader::new(file).lines();
        let first_line = match lines.next() {
            Some(line) => line.map_err(|e| LsaError::io(&path, e))?,
            None => return Err(LsaError::format(&path, 1, "file is empty, expected a singular value line")),
        };
        let singular_values = parse_singular_values(&path, 1, &first_line)?;
        if let Some(position) = singular_values
            .windows(2)
            .into_iter()
            .position(|pair| pair[0] < pair[1])
        {
            return Err(LsaError::format(
                &path,
                1,
                format!(
                    "singular values must be in descending order but value {} follows {}; \
                     a sparse matrix header is not a singular value line",
                    singular_values[position + 1],
                    singular_values[position]
                ),
            ));
        }
        Ok(Self {
            path,
            layout,
            singular_values,
            lines,
            rows_read: 0,
        })
    }

    /// Opens a sparse projection file (`rows k nnz` header, paired rows) whose
    /// singular values are stored separately.
    ///
    /// # Errors
    /// `Format` for a malformed header, `Dimension` if the header width differs
    /// from the number of singular values.
    pub fn open_sparse_projection<P: AsRef<Path>>(path: P, singular_values: Array1<f64>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| LsaError::io(&path, e))?;
        let mut lines = BufReader::new(file).lines();
        let header = match lines.next() {
            Some(line) => parse_header(&path, &line.map_err(|e| LsaError::io(&path, e))?)?,
            None => return Err(LsaError::format(&path, 1, "file is empty, expected a header line")),
        };
        if header.cols != singular_values.len() {
            return Err(LsaError::dimension(format!(
                "{:?} holds {} columns but {} singular values were given",
                path,
                header.cols,
                singular_values.len()
            )));
        }
        Ok(Self {
            path,
            layout: RowLayout::Paired,
            singular_values,
            lines,
            rows_read: 0,
        })
    }

    pub fn singular_values(&self) -> ArrayView1<'_, f64> {
        self.singular_values.view()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }
}

impl Iterator for FactorRowReader {
    type Item = Result<Vec<f64>>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(LsaError::io(&self.path, e))),
        };
        self.rows_read += 1;
        Some(parse_row_values(&self.path, self.rows_read + 1, &line, self.layout))
    }
}

/// Reads a whole reduced factor file, requiring every row to hold exactly
/// one value per singular value.
pub fn read_reduced_factors<P: AsRef<Path>>(path: P, layout: RowLayout) -> Result<ReducedFactors> {
    let mut reader = FactorRowReader::open(path, layout)?;
    let k = reader.singular_values.len();
    let mut flat_values = Vec::new();
    let mut rows = 0usize;
    while let Some(row) = reader.next() {
        let row = row?;
        if row.len() != k {
            return Err(LsaError::format(
                reader.path(),
                rows + 2,
                format!("row holds {} values, expected {}", row.len(), k),
            ));
        }
        flat_values.extend(row);
        rows += 1;
    }
    let u = Array2::from_shape_vec((rows, k), flat_values)
        .map_err(|e| LsaError::dimension(format!("factor rows do not form a {} x {} matrix: {}", rows, k, e)))?;
    Ok(ReducedFactors {
        singular_values: reader.singular_values,
        u,
    })
}

/// Writes `singular_values` followed by the rows of `u` in the given layout.
///
/// # Errors
/// `Dimension` if `u` does not have one column per singular value.
pub fn write_reduced_factors<P: AsRef<Path>>(
    path: P,
    singular_values: ArrayView1<f64>,
    u: ArrayView2<f64>,
    layout: RowLayout,
) -> Result<()> {
    if u.ncols() != singular_values.len() {
        return Err(LsaError::dimension(format!(
            "factor matrix has {} columns but {} singular values were given",
            u.ncols(),
            singular_values.len()
        )));
    }
    write_atomically(path, |out| {
        write_value_line(out, singular_values.iter().copied())?;
        for row in u.rows() {
            match layout {
                RowLayout::Positional => write_value_line(out, row.iter().copied())?,
                RowLayout::Paired => write_pair_line(out, row.iter().copied().enumerate())?,
            }
        }
        Ok(())
    })
}

/// Writes a singular value vector on its own, as a single line.
pub fn write_singular_values<P: AsRef<Path>>(path: P, singular_values: ArrayView1<f64>) -> Result<()> {
    write_atomically(path, |out| write_value_line(out, singular_values.iter().copied()))
}

/// Reads a singular value vector stored on the first line of `path`.
pub fn read_singular_values<P: AsRef<Path>>(path: P) -> Result<Array1<f64>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LsaError::io(path, e))?;
    match BufReader::new(file).lines().next() {
        Some(line) => parse_singular_values(path, 1, &line.map_err(|e| LsaError::io(path, e))?),
        None => Err(LsaError::format(path, 1, "file is empty, expected a singular value line")),
    }
}
