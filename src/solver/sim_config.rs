use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{Result, TrainError};

/// Solver definition for `SimSolver`.
///
/// Plays the role of a solver prototxt: learning-rate policy, gradient
/// accumulation, loss smoothing, snapshot prefix, plus the shape of the
/// simulated network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSolverConfig {
    pub base_lr: f64,
    /// Multiplier applied every `stepsize` iterations ("step" policy).
    pub gamma: f64,
    pub stepsize: u64,
    pub iter_size: usize,
    pub average_loss: usize,
    pub snapshot_prefix: String,
    pub num_classes: usize,
    /// Fan-in of the `bbox_pred` layer.
    pub feature_dim: usize,
    pub rois_per_image: usize,
    pub image_width: usize,
    pub image_height: usize,
    pub seed: u64,
    /// Network carries RPN loss layers.
    pub has_rpn: bool,
    /// Network carries the Fast R-CNN head (`bbox_pred`, hard-example outputs).
    pub has_detector: bool,
}

impl Default for SimSolverConfig {
    fn default() -> Self {
        SimSolverConfig {
            base_lr: 0.001,
            gamma: 0.1,
            stepsize: 50_000,
            iter_size: 1,
            average_loss: 100,
            snapshot_prefix: "sim_faster_rcnn".to_string(),
            num_classes: 21,
            feature_dim: 16,
            rois_per_image: 16,
            image_width: 64,
            image_height: 48,
            seed: 0,
            has_rpn: true,
            has_detector: true,
        }
    }
}

impl SimSolverConfig {
    pub fn load_json(path: &Path) -> Result<SimSolverConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: SimSolverConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iter_size == 0 {
            return Err(TrainError::Config("iter_size must be at least 1".into()));
        }
        if self.num_classes == 0 || self.feature_dim == 0 {
            return Err(TrainError::Config(
                "num_classes and feature_dim must be positive".into(),
            ));
        }
        if self.image_width < 2 || self.image_height < 2 {
            return Err(TrainError::Config("simulated image must be at least 2x2".into()));
        }
        Ok(())
    }

    /// "step" policy: `base_lr * gamma ^ floor(iter / stepsize)`.
    pub fn learning_rate_at(&self, iteration: u64) -> f64 {
        if self.stepsize == 0 {
            return self.base_lr;
        }
        let steps = (iteration / self.stepsize).min(i32::MAX as u64) as i32;
        self.base_lr * self.gamma.powi(steps)
    }
}
