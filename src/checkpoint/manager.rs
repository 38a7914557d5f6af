use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::checkpoint::bbox_transform::BBoxNormalizationTransform;
use crate::error::Result;
use crate::roidb::bbox_stats::BBoxNormalizationStats;
use crate::solver::solver::Solver;
use crate::train::train_config::TrainConfig;

pub const MODEL_EXTENSION: &str = "model";
pub const SOLVER_STATE_EXTENSION: &str = "solverstate";

/// A written checkpoint. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Iteration whose body produced the checkpoint.
    ///
    /// Periodic checkpoints are written before that iteration's update, so
    /// the files hold the state at `iteration`. The trailing and shutdown
    /// checkpoints are written after it, so their files hold the state at
    /// `iteration + 1`, the solver's count when they were saved. If the loop
    /// never ran a body, the trailing checkpoint holds the state at
    /// `iteration`.
    pub iteration: u64,
    /// Base filename, `{prefix}[_{infix}]_iter_{iteration}`.
    pub name: String,
    pub model_path: PathBuf,
    pub solver_state_path: PathBuf,
}

/// Writes model and solver state at a fixed cadence and at loop termination.
#[derive(Debug)]
pub struct CheckpointManager {
    snapshot_dir: PathBuf,
    snapshot_iters: u64,
    infix: String,
    transform: Option<BBoxNormalizationTransform>,
    last_iteration: Option<u64>,
}

impl CheckpointManager {
    /// `stats` are only used when both `BBOX_REG` and
    /// `BBOX_NORMALIZE_TARGETS` are enabled.
    pub fn new(config: &TrainConfig, stats: Option<BBoxNormalizationStats>) -> Self {
        let transform = if config.bbox_reg && config.bbox_normalize_targets {
            stats.map(BBoxNormalizationTransform::new)
        } else {
            None
        };
        CheckpointManager {
            snapshot_dir: config.snapshot_dir.clone(),
            snapshot_iters: config.snapshot_iters,
            infix: config.snapshot_infix.clone(),
            transform,
            last_iteration: None,
        }
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Iteration of the most recent checkpoint, `None` before the first one.
    pub fn last_checkpoint_iteration(&self) -> Option<u64> {
        self.last_iteration
    }

    /// Whether `iteration` falls on the periodic cadence.
    pub fn is_due(&self, iteration: u64) -> bool {
        iteration != 0 && self.snapshot_iters > 0 && iteration % self.snapshot_iters == 0
    }

    /// Whether a checkpoint still has to be written for `iteration`.
    pub fn needs_checkpoint_at(&self, iteration: u64) -> bool {
        self.last_iteration != Some(iteration)
    }

    pub fn filename(&self, prefix: &str, iteration: u64) -> String {
        if self.infix.is_empty() {
            format!("{}_iter_{}", prefix, iteration)
        } else {
            format!("{}_{}_iter_{}", prefix, self.infix, iteration)
        }
    }

    /// Persists model and solver state for `iteration`.
    ///
    /// When the regression layer exists and normalization is enabled, the
    /// written weights are de-normalized. The live parameters are restored
    /// before returning, whether or not the writes succeeded.
    pub fn checkpoint<S: Solver>(&mut self, solver: &mut S, iteration: u64) -> Result<Checkpoint> {
        let original = match (&self.transform, solver.bbox_pred()) {
            (Some(transform), Some(params)) => {
                let scaled = transform.denormalize(&params)?;
                debug!(
                    normalized = params.weight.l1_norm(),
                    denormalized = scaled.weight.l1_norm(),
                    "Denormalizing bbox_pred for snapshot"
                );
                solver.set_bbox_pred(scaled)?;
                Some(params)
            }
            _ => None,
        };

        let name = self.filename(solver.snapshot_prefix(), iteration);
        let written = self.persist(solver, &name, iteration);

        if let Some(params) = original {
            debug!("Restoring normalized bbox_pred parameters");
            solver.set_bbox_pred(params)?;
        }

        let checkpoint = written?;
        self.last_iteration = Some(iteration);
        info!("Wrote snapshot to: {}", checkpoint.model_path.display());
        Ok(checkpoint)
    }

    fn persist<S: Solver>(&self, solver: &S, name: &str, iteration: u64) -> Result<Checkpoint> {
        std::fs::create_dir_all(&self.snapshot_dir)?;
        let solver_state_path = self
            .snapshot_dir
            .join(format!("{}.{}", name, SOLVER_STATE_EXTENSION));
        let model_path = self.snapshot_dir.join(format!("{}.{}", name, MODEL_EXTENSION));

        solver.save_optimizer_state(&solver_state_path)?;
        solver.save_model(&model_path)?;

        Ok(Checkpoint {
            iteration,
            name: name.to_string(),
            model_path,
            solver_state_path,
        })
    }
}
