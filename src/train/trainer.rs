use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::roidb::bbox_stats::add_bbox_regression_targets;
use crate::roidb::entry::RoiEntry;
use crate::roidb::filter::filter_roidb;
use crate::solver::solver::Solver;
use crate::telemetry::sink::TelemetrySink;
use crate::train::interrupt::ShutdownSignal;
use crate::train::loop_fn::{TrainOutcome, TrainingModeController};
use crate::train::stage::TrainingStage;
use crate::train::train_config::TrainConfig;

/// Per-run options that are not part of the static configuration.
#[derive(Debug, Clone, Default)]
pub struct TrainOptions {
    /// Weights to initialize from before training.
    pub pretrained_model: Option<PathBuf>,
    /// Name of the alternating-optimization stage; `None` for end-to-end.
    pub stage_name: Option<String>,
}

/// Prepares the solver for training and builds the controller.
///
/// Computes box-regression statistics (normalizing the roidb targets),
/// loads pretrained weights, binds the roidb and selects the loop variant.
pub fn build_controller<S: Solver, K: TelemetrySink>(
    mut solver: S,
    mut roidb: Vec<RoiEntry>,
    config: &TrainConfig,
    options: &TrainOptions,
    sink: K,
    shutdown: ShutdownSignal,
) -> Result<TrainingModeController<S, K>> {
    config.validate()?;

    let stats = if config.bbox_reg {
        info!("Computing bounding-box regression targets...");
        let stats = add_bbox_regression_targets(&mut roidb, config)?;
        info!("done");
        Some(stats)
    } else {
        None
    };

    if let Some(path) = &options.pretrained_model {
        info!("Loading pretrained model weights from {}", path.display());
        solver.load_pretrained(path)?;
    }
    solver.bind_roidb(roidb);

    let stage_name = options.stage_name.as_deref();
    let stage = TrainingStage::select(config.has_rpn, stage_name);
    let namespace = stage.namespace(stage_name);
    TrainingModeController::new(solver, config.clone(), stage, namespace, stats, sink, shutdown)
}

/// Trains a Faster R-CNN network (or one stage of it) on `roidb`.
pub fn train_net<S: Solver, K: TelemetrySink>(
    solver: S,
    roidb: Vec<RoiEntry>,
    config: &TrainConfig,
    options: &TrainOptions,
    sink: K,
    shutdown: ShutdownSignal,
) -> Result<TrainOutcome> {
    let roidb = filter_roidb(roidb, config);
    let mut controller = build_controller(solver, roidb, config, options, sink, shutdown)?;
    info!("Solving...");
    controller.train_model()
}
