// src/bin/lsa_reduce.rs

//! Reduces a sparse matrix file to its rank-`k` LSA projection.

use clap::{Parser, ValueEnum};
use efficient_lsa::factor_format::RowLayout;
use efficient_lsa::pipeline::{run_lsa, run_lsa_with_solver, LsaPipelineConfig};
use efficient_lsa::projection::{ProjectionConfig, ProjectionFormat};
use efficient_lsa::rank_reducer::{DenseSvd, RandomizedSvdConfig};
use efficient_lsa::sparse_format::ReaderConfig;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Singular values, then one line of k values per row.
    Factors,
    /// Singular values, then `index value` pairs per row.
    PairedFactors,
    /// Sparse matrix file with header `rows k rows*k`.
    Sparse,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Solver {
    Randomized,
    Dense,
}

#[derive(Parser, Debug)]
#[command(name = "lsa_reduce")]
#[command(about = "Truncated SVD of a sparse matrix file, written as an LSA projection")]
struct Args {
    /// Sparse matrix file (`rows cols nnz` header, `col value` pairs per row)
    input: PathBuf,

    /// Number of singular vectors to keep
    rank: usize,

    /// Output path [default: <input>.<rank>.LSA_matrices, or <input>.<rank>.LSA for --format sparse]
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "factors")]
    format: OutputFormat,

    /// Weight column i of U by s[i]^POWER before writing
    #[arg(long, allow_negative_numbers = true)]
    sig_power: Option<f64>,

    /// With --format sparse, also write the singular values to <output>_singVal
    #[arg(long)]
    sing_val_file: bool,

    /// Accept files whose rows or columns disagree with the header
    #[arg(long)]
    lenient: bool,

    #[arg(long, value_enum, default_value = "randomized")]
    solver: Solver,

    #[arg(long, default_value_t = RandomizedSvdConfig::default().oversampling)]
    oversampling: usize,

    #[arg(long, default_value_t = RandomizedSvdConfig::default().power_iterations)]
    power_iterations: usize,

    #[arg(long, default_value_t = RandomizedSvdConfig::default().random_seed)]
    seed: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let format = match args.format {
        OutputFormat::Factors => ProjectionFormat::ReducedFactors(RowLayout::Positional),
        OutputFormat::PairedFactors => ProjectionFormat::ReducedFactors(RowLayout::Paired),
        OutputFormat::Sparse => ProjectionFormat::SparseMatrix,
    };
    let config = LsaPipelineConfig {
        reader: ReaderConfig {
            strict_dimensions: !args.lenient,
            ..ReaderConfig::default()
        },
        svd: RandomizedSvdConfig {
            oversampling: args.oversampling,
            power_iterations: args.power_iterations,
            random_seed: args.seed,
        },
        projection: ProjectionConfig {
            format,
            sig_power: args.sig_power,
            write_singular_value_file: args.sing_val_file,
        },
    };

    let result = match args.solver {
        Solver::Randomized => run_lsa(&args.input, args.rank, args.output.as_deref(), &config),
        Solver::Dense => run_lsa_with_solver(
            &args.input,
            args.rank,
            args.output.as_deref(),
            &config.reader,
            &config.projection,
            DenseSvd,
        ),
    };

    match result {
        Ok(summary) => {
            info!("Wrote {:?}", summary.output_path);
            if let Some(path) = summary.singular_value_path {
                info!("Wrote {:?}", path);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("LSA of {:?} failed: {}", args.input, e);
            ExitCode::FAILURE
        }
    }
}
