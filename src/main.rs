//! Trains a Faster R-CNN detector with the simulated solver.
//!
//! Usage:
//!   frcnn-train --cfg train.json --solver solver.json --roidb roidb.json \
//!               [--weights init.model] [--stage stage1_rpn] [--log-dir runs]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use frcnn_train::roidb::{get_training_roidb, load_roidb};
use frcnn_train::{
    train_net, EventFileSink, ShutdownSignal, SimSolver, SimSolverConfig, TrainConfig,
    TrainOptions, TrainOutcome,
};

#[derive(Parser)]
#[command(name = "frcnn-train")]
#[command(about = "Train a two-stage object detector until the learning rate plateaus")]
struct Args {
    /// Training configuration (JSON, upper-case keys)
    #[arg(long)]
    cfg: PathBuf,

    /// Solver definition (JSON)
    #[arg(long)]
    solver: PathBuf,

    /// Region-of-interest database (JSON array of entries)
    #[arg(long)]
    roidb: PathBuf,

    /// Initialize from these model weights
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Alternating-optimization stage name; omit for end-to-end training
    #[arg(long)]
    stage: Option<String>,

    /// Directory for telemetry events and images
    #[arg(long, default_value = "runs")]
    log_dir: PathBuf,
}

fn run(args: Args) -> frcnn_train::Result<()> {
    let config = TrainConfig::load_json(&args.cfg)?;
    let solver = SimSolver::new(SimSolverConfig::load_json(&args.solver)?)?;

    let roidb = get_training_roidb(load_roidb(&args.roidb)?, &config);
    info!("{} roidb entries", roidb.len());

    let shutdown = ShutdownSignal::new();
    shutdown.install()?;

    let sink = EventFileSink::create(&args.log_dir)?;
    let options = TrainOptions {
        pretrained_model: args.weights,
        stage_name: args.stage,
    };

    match train_net(solver, roidb, &config, &options, sink, shutdown)? {
        TrainOutcome::Converged { final_iteration, checkpoints } => {
            info!("Training converged at iteration {}", final_iteration);
            for checkpoint in checkpoints.unwrap_or_default() {
                info!("  {}", checkpoint.model_path.display());
            }
        }
        TrainOutcome::Interrupted { iteration, checkpoint } => {
            info!("Interrupted at iteration {}", iteration);
            if let Some(checkpoint) = checkpoint {
                info!("  {}", checkpoint.model_path.display());
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
