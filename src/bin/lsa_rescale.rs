// src/bin/lsa_rescale.rs

//! Truncates and reweights stored reduced factors without recomputing the SVD.

use clap::{Parser, ValueEnum};
use efficient_lsa::factor_format::RowLayout;
use efficient_lsa::rescale::{PostHocRescaler, RescaleConfig, SingularValueSource};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InputLayout {
    /// `index value` pairs per row
    Paired,
    /// One value per column, no indices
    Positional,
}

#[derive(Parser, Debug)]
#[command(name = "lsa_rescale")]
#[command(about = "Rescale stored LSA factors by powers of their singular values")]
struct Args {
    /// Reduced factor file named `<prefix>.<k>.LSA...`
    input: PathBuf,

    /// Number of leading dimensions to keep
    entries: usize,

    /// Exponent applied to each kept singular value
    #[arg(allow_negative_numbers = true)]
    sig_power: f64,

    /// Output path [default: <prefix>.LSA_<entries>_<sig_power>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "paired")]
    layout: InputLayout,

    /// Input is a sparse projection; read singular values from `<input>_singVal`
    #[arg(long)]
    sing_val_file: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let rescaler = PostHocRescaler::new(RescaleConfig {
        entries: args.entries,
        sig_power: args.sig_power,
        input_layout: match args.layout {
            InputLayout::Paired => RowLayout::Paired,
            InputLayout::Positional => RowLayout::Positional,
        },
        singular_value_source: if args.sing_val_file {
            SingularValueSource::Sidecar
        } else {
            SingularValueSource::FirstLine
        },
        ..RescaleConfig::default()
    });

    let result = match &args.output {
        Some(output) => rescaler.run_to(&args.input, output),
        None => rescaler.run(&args.input),
    };

    match result {
        Ok(summary) => {
            info!(
                "Wrote {} rows x {} entries to {:?}",
                summary.rows, summary.entries, summary.output_path
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Rescaling {:?} failed: {}", args.input, e);
            ExitCode::FAILURE
        }
    }
}
