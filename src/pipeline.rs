// src/pipeline.rs

//! End-to-end LSA: read the sparse matrix, reduce it to rank `k`, write the projection.

use crate::error::Result;
use crate::projection::{ProjectionConfig, ProjectionFormat, ProjectionSummary, ProjectionWriter};
use crate::rank_reducer::{RandomizedSvd, RandomizedSvdConfig, RankReducer, TruncatedSvdSolver};
use crate::sparse_format::{read_sparse_matrix, ReaderConfig};
use log::info;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Settings for every stage of an LSA run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LsaPipelineConfig {
    pub reader: ReaderConfig,
    pub svd: RandomizedSvdConfig,
    pub projection: ProjectionConfig,
}

/// `<input>.<k>.LSA_matrices` for reduced factors, `<input>.<k>.LSA` for the
/// sparse variant.
pub fn default_output_path<P: AsRef<Path>>(input: P, k: usize, format: ProjectionFormat) -> PathBuf {
    let suffix = match format {
        ProjectionFormat::ReducedFactors(_) => "LSA_matrices",
        ProjectionFormat::SparseMatrix => "LSA",
    };
    let mut name = OsString::from(input.as_ref().as_os_str());
    name.push(format!(".{}.{}", k, suffix));
    PathBuf::from(name)
}

/// Runs the full pipeline with the randomized SVD configured in `config.svd`.
///
/// When `output` is `None` the path comes from [`default_output_path`].
pub fn run_lsa<P: AsRef<Path>>(
    input: P,
    k: usize,
    output: Option<&Path>,
    config: &LsaPipelineConfig,
) -> Result<ProjectionSummary> {
    let solver = RandomizedSvd::new(config.svd.clone());
    run_lsa_with_solver(input, k, output, &config.reader, &config.projection, solver)
}

/// Runs the full pipeline with any truncated SVD solver.
pub fn run_lsa_with_solver<P: AsRef<Path>, S: TruncatedSvdSolver>(
    input: P,
    k: usize,
    output: Option<&Path>,
    reader_config: &ReaderConfig,
    projection_config: &ProjectionConfig,
    solver: S,
) -> Result<ProjectionSummary> {
    let input = input.as_ref();
    let start_time = Instant::now();
    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => default_output_path(input, k, projection_config.format),
    };

    let matrix_file = read_sparse_matrix(input, reader_config)?;
    let header = matrix_file.header;
    let factors = RankReducer::new(solver).reduce_triplets(header.rows, header.cols, matrix_file.triplets, k)?;
    let summary = ProjectionWriter::new(projection_config.clone()).write(
        factors.u.view(),
        factors.singular_values.view(),
        &output_path,
    )?;

    info!("LSA of {:?} finished in {:?}", input, start_time.elapsed());
    Ok(summary)
}
