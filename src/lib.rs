// Latent semantic analysis (LSA)

#![doc = include_str!("../README.md")]

pub mod error;
pub mod factor_format;
pub mod linalg_backends;
pub mod output;
pub mod pipeline;
pub mod projection;
pub mod rank_reducer;
pub mod rescale;
pub mod sparse;
pub mod sparse_format;
pub mod tokenize;

#[cfg(test)]
mod rank_reducer_tests;

pub use error::{LsaError, Result};
pub use factor_format::{ReducedFactors, RowLayout};
pub use pipeline::{run_lsa, LsaPipelineConfig};
pub use projection::{ProjectionConfig, ProjectionFormat, ProjectionWriter};
pub use rank_reducer::{DenseSvd, RandomizedSvd, RandomizedSvdConfig, RankReducer, TruncatedSvd, TruncatedSvdSolver};
pub use rescale::{PostHocRescaler, RescaleConfig, SingularValueSource};
pub use sparse::SparseMatrix;
pub use sparse_format::{read_sparse_matrix, write_sparse_matrix, ReaderConfig, TripletList};
