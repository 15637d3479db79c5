//! LensJoint CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod run;
mod tablefile;

#[derive(Parser)]
#[command(name = "lj")]
#[command(about = "LensJoint - joint posterior combination for lensed compact-binary mergers")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine per-image posterior tables into a joint density estimate
    Joint {
        /// Run configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory for pooled samples and log-weights
        #[arg(short, long)]
        out: PathBuf,

        /// Also write this many draws from the fitted joint density (0 = skip)
        #[arg(long, default_value = "0")]
        joint_draws: usize,
    },

    /// Apparent parameters of one lensed image from source parameters
    Effective {
        /// Magnification mu (sign encodes parity)
        #[arg(long)]
        magnification: f64,

        /// Time delay relative to the unlensed arrival
        #[arg(long)]
        time_delay: f64,

        /// Image type: 1, 2 or 3 (Morse index 0, 1/2, 1)
        #[arg(long)]
        image_type: u8,

        /// Source luminosity distance
        #[arg(long)]
        luminosity_distance: f64,

        /// Source coalescence time
        #[arg(long)]
        geocent_time: f64,

        /// Source coalescence phase
        #[arg(long)]
        phase: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Joint { config, out, joint_draws } => run::joint(&config, &out, joint_draws),
        Commands::Effective {
            magnification,
            time_delay,
            image_type,
            luminosity_distance,
            geocent_time,
            phase,
        } => run::effective(
            magnification,
            time_delay,
            image_type,
            luminosity_distance,
            geocent_time,
            phase,
        ),
    }
}
