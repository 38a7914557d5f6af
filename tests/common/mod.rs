#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use frcnn_train::solver::SmoothedLossTracker;
use frcnn_train::{
    BBoxPredParams, BatchOutputs, ImageBlob, LossSample, Matrix, RoiEntry, ShutdownSignal,
    Solver, TrainConfig, TrainError,
};

/// Solver whose schedule, losses and failures are set by the test.
pub struct ScriptedSolver {
    pub iteration: u64,
    pub lr_schedule: Box<dyn Fn(u64) -> f64>,
    pub iter_size: usize,
    /// Cycled, one value per sub-batch call.
    pub subbatch_losses: Vec<f64>,
    pub subbatch_calls: usize,
    pub bbox_pred: Option<BBoxPredParams>,
    pub outputs: Option<BatchOutputs>,
    pub fail_model_save: bool,
    /// Requests shutdown while computing this iteration.
    pub interrupt_at: Option<(u64, ShutdownSignal)>,
    /// `(path, bbox_pred as written)` for every saved model.
    pub saved_models: RefCell<Vec<(PathBuf, Option<BBoxPredParams>)>>,
    smoothing: SmoothedLossTracker,
}

impl ScriptedSolver {
    pub fn new(lr_schedule: impl Fn(u64) -> f64 + 'static) -> Self {
        ScriptedSolver {
            iteration: 0,
            lr_schedule: Box::new(lr_schedule),
            iter_size: 1,
            subbatch_losses: vec![1.0],
            subbatch_calls: 0,
            bbox_pred: None,
            outputs: None,
            fail_model_save: false,
            interrupt_at: None,
            saved_models: RefCell::new(Vec::new()),
            smoothing: SmoothedLossTracker::new(),
        }
    }

    /// Learning rate `high` before `drop_at`, then `low`.
    pub fn step_schedule(drop_at: u64, high: f64, low: f64) -> Self {
        Self::new(move |it| if it < drop_at { high } else { low })
    }

    pub fn with_bbox_pred(mut self, params: BBoxPredParams) -> Self {
        self.bbox_pred = Some(params);
        self
    }

    pub fn with_outputs(mut self, outputs: BatchOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saved_models.borrow().iter().map(|(p, _)| p.clone()).collect()
    }
}

impl Solver for ScriptedSolver {
    fn iteration(&self) -> u64 {
        self.iteration
    }

    fn learning_rate(&self) -> f64 {
        (self.lr_schedule)(self.iteration)
    }

    fn iter_size(&self) -> usize {
        self.iter_size
    }

    fn average_loss(&self) -> usize {
        20
    }

    fn snapshot_prefix(&self) -> &str {
        "scripted"
    }

    fn compute_subbatch(&mut self) -> frcnn_train::Result<LossSample> {
        let loss = self.subbatch_losses[self.subbatch_calls % self.subbatch_losses.len()];
        self.subbatch_calls += 1;
        if let Some((at, signal)) = &self.interrupt_at {
            if *at == self.iteration {
                signal.request();
            }
        }
        Ok(LossSample::uniform(loss))
    }

    fn batch_outputs(&self) -> Option<&BatchOutputs> {
        self.outputs.as_ref()
    }

    fn apply_update(&mut self) -> frcnn_train::Result<()> {
        self.iteration += 1;
        Ok(())
    }

    fn smooth(&mut self, loss: f64, start_iteration: u64, window: usize) -> f64 {
        self.smoothing.update(loss, self.iteration, start_iteration, window)
    }

    fn bbox_pred(&self) -> Option<BBoxPredParams> {
        self.bbox_pred.clone()
    }

    fn set_bbox_pred(&mut self, params: BBoxPredParams) -> frcnn_train::Result<()> {
        self.bbox_pred = Some(params);
        Ok(())
    }

    fn save_model(&self, path: &Path) -> frcnn_train::Result<()> {
        if self.fail_model_save {
            return Err(TrainError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        std::fs::write(path, b"model")?;
        self.saved_models
            .borrow_mut()
            .push((path.to_path_buf(), self.bbox_pred.clone()));
        Ok(())
    }

    fn save_optimizer_state(&self, path: &Path) -> frcnn_train::Result<()> {
        std::fs::write(path, b"state")?;
        Ok(())
    }

    fn load_pretrained(&mut self, _path: &Path) -> frcnn_train::Result<()> {
        Ok(())
    }

    fn bind_roidb(&mut self, _roidb: Vec<RoiEntry>) {}
}

pub fn bbox_params(rows: usize, cols: usize) -> BBoxPredParams {
    let data = (0..rows)
        .map(|r| (0..cols).map(|c| 0.013 * (r * cols + c) as f64 - 0.2).collect())
        .collect();
    BBoxPredParams {
        weight: Matrix::from_data(data),
        bias: (0..rows).map(|r| 0.37 * r as f64 - 1.1).collect(),
    }
}

/// One-image batch of zeros with the given hard labels, one small box each.
pub fn batch_outputs(labels: Vec<usize>) -> BatchOutputs {
    let rois_hard = labels.iter().map(|_| vec![0.0, 1.0, 1.0, 4.0, 4.0]).collect();
    BatchOutputs {
        labels_hard: labels,
        data: ImageBlob {
            num: 1,
            channels: 3,
            height: 8,
            width: 8,
            data: vec![0.0; 3 * 8 * 8],
        },
        rois_hard,
    }
}

pub fn config(snapshot_dir: &Path) -> TrainConfig {
    TrainConfig {
        plateau_lr: 0.001,
        snapshot_iters: 100,
        snapshot_dir: snapshot_dir.to_path_buf(),
        classes: vec!["__background__".into(), "person".into(), "car".into()],
        colors: vec![[0, 0, 0], [0, 255, 0], [0, 0, 255]],
        batch_size: 4,
        ..TrainConfig::default()
    }
}

/// Weight and bias as raw bit patterns, for exact comparisons.
pub fn bits(params: &BBoxPredParams) -> (Vec<u64>, Vec<u64>) {
    (
        params.weight.data.iter().flatten().map(|x| x.to_bits()).collect(),
        params.bias.iter().map(|x| x.to_bits()).collect(),
    )
}
