// src/sparse_format.rs

//! The sparse matrix text format.
//!
//! ```text
//! rows cols nnz
//! col value col value ...     <- row 0
//!                             <- row 1 (no entries)
//! col value ...               <- row 2
//! ```
//!
//! Rows are implicit: the n-th line after the header is row n-1.

use crate::error::{LsaError, Result};
use crate::output::{write_atomically, write_pair_line};
use crate::tokenize::split_line;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Instant;

/// Dimensions declared on the first line of a sparse matrix file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixHeader {
    pub rows: usize,
    pub cols: usize,
    /// Advisory only; never checked against the data lines.
    pub declared_nonzero: usize,
}

/// Parallel (row, column, value) sequences, built incrementally while reading.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TripletList {
    pub row_indices: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl TripletList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            row_indices: Vec::with_capacity(capacity),
            col_indices: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        self.row_indices.push(row);
        self.col_indices.push(col);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(row, col, value)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.row_indices
            .iter()
            .zip(&self.col_indices)
            .zip(&self.values)
            .map(|((&row, &col), &value)| (row, col, value))
    }
}

/// A fully materialized sparse matrix file.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrixFile {
    pub header: MatrixHeader,
    pub triplets: TripletList,
}

/// Controls how strictly the reader checks the file against its header.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Reject column indices `>= cols` and a data line count different from `rows`.
    /// When false, the file is read as-is and inconsistencies surface later,
    /// at sparse matrix assembly.
    pub strict_dimensions: bool,
    /// Emit a progress line every this many rows. Zero disables progress output.
    pub progress_interval: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            strict_dimensions: true,
            progress_interval: 1000,
        }
    }
}

/// Parses the `rows cols nnz` header line.
pub(crate) fn parse_header(path: &Path, line: &str) -> Result<MatrixHeader> {
    let tokens = split_line(line).map_err(|e| LsaError::format(path, 1, e))?;
    if tokens.len() < 3 {
        return Err(LsaError::format(
            path,
            1,
            format!("header needs 'rows cols nnz', found {} token(s)", tokens.len()),
        ));
    }
    let parse = |token: &str, name: &str| -> Result<usize> {
        token.parse::<usize>().map_err(|_| {
            LsaError::format(path, 1, format!("header {} '{}' is not a non-negative integer", name, token))
        })
    };
    Ok(MatrixHeader {
        rows: parse(tokens[0].as_ref(), "row count")?,
        cols: parse(tokens[1].as_ref(), "column count")?,
        declared_nonzero: parse(tokens[2].as_ref(), "non-zero count")?,
    })
}

/// Parses one data line into `(column, value)` pairs.
pub(crate) fn parse_pairs(path: &Path, line_number: usize, line: &str) -> Result<Vec<(usize, f64)>> {
    let tokens = split_line(line).map_err(|e| LsaError::format(path, line_number, e))?;
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
            let column = pair[0].parse::<usize>().map_err(|_| {
                LsaError::format(path, line_number, format!("column index '{}' is not a non-negative integer", pair[0]))
            })?;
            let value = pair[1].parse::<f64>().map_err(|_| {
                LsaError::format(path, line_number, format!("value '{}' is not a number", pair[1]))
            })?;
            Ok((column, value))
        })
        .collect()
}

/// Reads a sparse matrix file into its header and triplet list.
///
/// # Errors
/// - `Format` for a header with fewer than three tokens, an odd-length data
///   line, an unparsable token, or (strict mode) a data line count that
///   differs from the declared row count.
/// - `Dimension` (strict mode) for a column index outside the declared width.
/// - `Io` when the file cannot be read.
pub fn read_sparse_matrix<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> Result<SparseMatrixFile> {
    let path = path.as_ref();
    let start_time = Instant::now();
    let file = File::open(path).map_err(|e| LsaError::io(path, e))?;
    let mut lines = BufReader::new(file).lines();

    let header_line = match lines.next() {
        Some(line) => line.map_err(|e| LsaError::io(path, e))?,
        None => return Err(LsaError::format(path, 1, "file is empty, expected a header line")),
    };
    let header = parse_header(path, &header_line)?;
    info!(
        "Reading sparse matrix {:?}: {} rows x {} cols, {} declared non-zeros",
        path, header.rows, header.cols, header.declared_nonzero
    );

    let mut triplets = TripletList::with_capacity(header.declared_nonzero.min(1 << 20));
    let mut row = 0usize;
    for line in lines {
        let line = line.map_err(|e| LsaError::io(path, e))?;
        let line_number = row + 2;
        if config.strict_dimensions && row >= header.rows {
            return Err(LsaError::format(
                path,
                line_number,
                format!("more data lines than the {} rows declared in the header", header.rows),
            ));
        }
        for (column, value) in parse_pairs(path, line_number, &line)? {
            if config.strict_dimensions && column >= header.cols {
                return Err(LsaError::dimension(format!(
                    "{:?} line {}: column index {} out of range for {} columns",
                    path, line_number, column, header.cols
                )));
            }
            triplets.push(row, column, value);
        }

        row += 1;
        if config.progress_interval > 0 && row % config.progress_interval == 0 {
            info!("Read {} rows of {:?}", row, path);
        }
    }

    if config.strict_dimensions && row != header.rows {
        return Err(LsaError::format(
            path,
            row + 2,
            format!("found {} data lines but the header declares {} rows", row, header.rows),
        ));
    }
    if triplets.len() != header.declared_nonzero {
        debug!(
            "{:?}: header declares {} non-zeros, read {}",
            path,
            header.declared_nonzero,
            triplets.len()
        );
    }
    info!(
        "Loaded {} entries from {} rows of {:?} in {:?}",
        triplets.len(),
        row,
        path,
        start_time.elapsed()
    );

    Ok(SparseMatrixFile { header, triplets })
}

/// Writes `triplets` as a sparse matrix file with `rows` data lines.
///
/// Entries are written in row order, keeping their relative order within a
/// row. The header's non-zero count is the number of triplets.
///
/// # Errors
/// `Dimension` if a triplet lies outside `rows x cols`; `Io` on write failure.
pub fn write_sparse_matrix<P: AsRef<Path>>(
    path: P,
    rows: usize,
    cols: usize,
    triplets: &TripletList,
) -> Result<()> {
    let mut row_entries: Vec<Vec<(usize, f64)>> = vec![Vec::new(); rows];
    for (row, col, value) in triplets.iter() {
        if row >= rows || col >= cols {
            return Err(LsaError::dimension(format!(
                "triplet ({}, {}) outside a {} x {} matrix",
                row, col, rows, cols
            )));
        }
        row_entries[row].push((col, value));
    }

    write_atomically(path, |out| {
        writeln!(out, "{} {} {}", rows, cols, triplets.len())?;
        for entries in &row_entries {
            write_pair_line(out, entries.iter().copied())?;
        }
        Ok(())
    })
}
