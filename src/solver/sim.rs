use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::error::{Result, TrainError};
use crate::math::matrix::Matrix;
use crate::roidb::entry::RoiEntry;
use crate::solver::sim_config::SimSolverConfig;
use crate::solver::smoothing::SmoothedLossTracker;
use crate::solver::solver::{BatchOutputs, BBoxPredParams, ImageBlob, Solver};
use crate::train::loss_sample::LossSample;

/// Model file written by `SimSolver::save_model`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimModel {
    pub iteration: u64,
    pub bbox_pred: Option<BBoxPredParams>,
}

/// Solver-state file written by `SimSolver::save_optimizer_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSolverState {
    pub iteration: u64,
    pub learning_rate: f64,
    pub smoothed_loss: f64,
}

/// Deterministic in-process stand-in for the external optimizer.
///
/// Losses decay with the iteration count plus seeded noise, hard examples
/// are sampled uniformly, and the `bbox_pred` layer receives pseudo-gradients
/// that are accumulated per sub-batch and averaged on update.
pub struct SimSolver {
    config: SimSolverConfig,
    iteration: u64,
    rng: StdRng,
    bbox_pred: Option<BBoxPredParams>,
    weight_grad: Matrix,
    bias_grad: Vec<f64>,
    pending_subbatches: usize,
    smoothing: SmoothedLossTracker,
    outputs: Option<BatchOutputs>,
    roidb_len: usize,
}

impl SimSolver {
    pub fn new(config: SimSolverConfig) -> Result<SimSolver> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let rows = 4 * config.num_classes;
        let bbox_pred = config.has_detector.then(|| BBoxPredParams {
            weight: Matrix::random(rows, config.feature_dim, 0.001, &mut rng),
            bias: vec![0.0; rows],
        });
        Ok(SimSolver {
            weight_grad: Matrix::zeros(rows, config.feature_dim),
            bias_grad: vec![0.0; rows],
            config,
            iteration: 0,
            rng,
            bbox_pred,
            pending_subbatches: 0,
            smoothing: SmoothedLossTracker::new(),
            outputs: None,
            roidb_len: 0,
        })
    }

    pub fn config(&self) -> &SimSolverConfig {
        &self.config
    }

    pub fn roidb_len(&self) -> usize {
        self.roidb_len
    }

    fn sample_losses(&mut self) -> LossSample {
        let decay = 1.0 / (1.0 + self.iteration as f64 / 1000.0);
        let (has_rpn, has_detector) = (self.config.has_rpn, self.config.has_detector);
        let rng = &mut self.rng;
        let mut term = |scale: f64, enabled: bool| {
            if enabled {
                scale * decay * rng.gen_range(0.9..1.1)
            } else {
                0.0
            }
        };
        let rpn_cls = term(0.69, has_rpn);
        let rpn_bbox = term(0.25, has_rpn);
        let cls = term(1.2, has_detector);
        let bbox = term(0.45, has_detector);
        LossSample {
            total: rpn_cls + rpn_bbox + cls + bbox,
            rpn_cls,
            rpn_bbox,
            bbox,
            cls,
        }
    }

    fn sample_outputs(&mut self) -> BatchOutputs {
        let (w, h) = (self.config.image_width, self.config.image_height);
        let n = self.config.rois_per_image;

        let labels_hard = (0..n)
            .map(|_| self.rng.gen_range(0..self.config.num_classes))
            .collect();
        let rois_hard = (0..n)
            .map(|_| {
                let x1 = self.rng.gen_range(0..w / 2) as f64;
                let y1 = self.rng.gen_range(0..h / 2) as f64;
                let x2 = x1 + self.rng.gen_range(1..=w / 2) as f64 - 1.0;
                let y2 = y1 + self.rng.gen_range(1..=h / 2) as f64 - 1.0;
                vec![0.0, x1, y1, x2, y2]
            })
            .collect();
        let data = (0..3 * w * h)
            .map(|_| self.rng.gen_range(-100.0f32..100.0))
            .collect();

        BatchOutputs {
            labels_hard,
            data: ImageBlob {
                num: 1,
                channels: 3,
                height: h,
                width: w,
                data,
            },
            rois_hard,
        }
    }

    fn accumulate_gradients(&mut self, loss: f64) {
        if self.bbox_pred.is_none() {
            return;
        }
        let rows = self.bias_grad.len();
        let step = Matrix::random(rows, self.config.feature_dim, 0.01 * loss, &mut self.rng);
        self.weight_grad = std::mem::take(&mut self.weight_grad) + step;
        for g in self.bias_grad.iter_mut() {
            *g += self.rng.gen_range(-0.01..0.01) * loss;
        }
    }
}

impl Solver for SimSolver {
    fn iteration(&self) -> u64 {
        self.iteration
    }

    fn learning_rate(&self) -> f64 {
        self.config.learning_rate_at(self.iteration)
    }

    fn iter_size(&self) -> usize {
        self.config.iter_size
    }

    fn average_loss(&self) -> usize {
        self.config.average_loss
    }

    fn snapshot_prefix(&self) -> &str {
        &self.config.snapshot_prefix
    }

    fn compute_subbatch(&mut self) -> Result<LossSample> {
        let sample = self.sample_losses();
        self.outputs = if self.config.has_detector {
            Some(self.sample_outputs())
        } else {
            None
        };
        self.accumulate_gradients(sample.total);
        self.pending_subbatches += 1;
        Ok(sample)
    }

    fn batch_outputs(&self) -> Option<&BatchOutputs> {
        self.outputs.as_ref()
    }

    fn apply_update(&mut self) -> Result<()> {
        let lr = self.learning_rate();
        let scale = lr / self.pending_subbatches.max(1) as f64;
        if let Some(params) = self.bbox_pred.as_mut() {
            let weight_step = self.weight_grad.map(|g| g * scale);
            params.weight = std::mem::take(&mut params.weight) - weight_step;
            for (b, g) in params.bias.iter_mut().zip(&self.bias_grad) {
                *b -= g * scale;
            }
        }
        self.weight_grad = Matrix::zeros(self.weight_grad.rows, self.weight_grad.cols);
        self.bias_grad.iter_mut().for_each(|g| *g = 0.0);
        self.pending_subbatches = 0;
        self.iteration += 1;
        Ok(())
    }

    fn smooth(&mut self, loss: f64, start_iteration: u64, window: usize) -> f64 {
        self.smoothing.update(loss, self.iteration, start_iteration, window)
    }

    fn bbox_pred(&self) -> Option<BBoxPredParams> {
        self.bbox_pred.clone()
    }

    fn set_bbox_pred(&mut self, params: BBoxPredParams) -> Result<()> {
        let current = self
            .bbox_pred
            .as_mut()
            .ok_or(TrainError::MissingOutput("bbox_pred"))?;
        if current.weight.shape() != params.weight.shape() || current.bias.len() != params.bias.len() {
            return Err(TrainError::shape(
                format!("{:?} / {}", current.weight.shape(), current.bias.len()),
                format!("{:?} / {}", params.weight.shape(), params.bias.len()),
            ));
        }
        *current = params;
        Ok(())
    }

    fn save_model(&self, path: &Path) -> Result<()> {
        let model = SimModel {
            iteration: self.iteration,
            bbox_pred: self.bbox_pred.clone(),
        };
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &model)?;
        Ok(())
    }

    fn save_optimizer_state(&self, path: &Path) -> Result<()> {
        let state = SimSolverState {
            iteration: self.iteration,
            learning_rate: self.learning_rate(),
            smoothed_loss: self.smoothing.value(),
        };
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &state)?;
        Ok(())
    }

    fn load_pretrained(&mut self, path: &Path) -> Result<()> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let model: SimModel = serde_json::from_reader(reader)?;
        match (model.bbox_pred, self.bbox_pred.is_some()) {
            (Some(params), true) => self.set_bbox_pred(params)?,
            (Some(_), false) => warn!("Pretrained model has bbox_pred but this network does not; skipping"),
            (None, _) => info!("Pretrained model has no bbox_pred; keeping initialization"),
        }
        Ok(())
    }

    fn bind_roidb(&mut self, roidb: Vec<RoiEntry>) {
        info!("Bound roidb with {} entries", roidb.len());
        self.roidb_len = roidb.len();
    }
}
