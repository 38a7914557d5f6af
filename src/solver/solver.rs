use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::math::matrix::Matrix;
use crate::roidb::entry::RoiEntry;
use crate::train::loss_sample::LossSample;

// ---------------------------------------------------------------------------
// Named solver outputs
// ---------------------------------------------------------------------------

/// Input image blob of the current batch, laid out `N x C x H x W` in BGR
/// channel order with the per-channel pixel means already subtracted.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlob {
    pub num: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl ImageBlob {
    /// Value at (`n`, `c`, `y`, `x`).
    pub fn at(&self, n: usize, c: usize, y: usize, x: usize) -> f32 {
        let idx = ((n * self.channels + c) * self.height + y) * self.width + x;
        self.data[idx]
    }
}

/// Hard-example outputs of the most recent sub-batch of a detector network.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutputs {
    /// Class index assigned to each hard RoI.
    pub labels_hard: Vec<usize>,
    /// The network input image.
    pub data: ImageBlob,
    /// One row per hard RoI: `[batch_index, x1, y1, x2, y2]`.
    pub rois_hard: Vec<Vec<f64>>,
}

/// Weight and bias of the `bbox_pred` regression layer.
///
/// `weight` has one row per regression output (`4 * num_classes`), and
/// `bias` has the same number of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBoxPredParams {
    pub weight: Matrix,
    pub bias: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Solver trait
// ---------------------------------------------------------------------------

/// Adapter around the external optimizer that owns the network.
///
/// The training controller never touches tensors by name; everything it
/// observes flows through these methods.
pub trait Solver {
    /// Current iteration counter. Advanced only by `apply_update`.
    fn iteration(&self) -> u64;

    /// Learning rate the next update will use.
    fn learning_rate(&self) -> f64;

    /// Number of sub-batches accumulated into one update.
    fn iter_size(&self) -> usize;

    /// Window size of the smoothed loss.
    fn average_loss(&self) -> usize;

    /// Prefix for checkpoint filenames, taken from the solver definition.
    fn snapshot_prefix(&self) -> &str;

    /// Runs one forward/backward pass, accumulating parameter gradients.
    fn compute_subbatch(&mut self) -> Result<LossSample>;

    /// Hard-example outputs of the most recent `compute_subbatch`, or `None`
    /// when the network has no detector head.
    fn batch_outputs(&self) -> Option<&BatchOutputs>;

    /// Applies the accumulated gradients and advances the iteration counter.
    fn apply_update(&mut self) -> Result<()>;

    /// Folds `loss` into the running average and returns the smoothed value.
    fn smooth(&mut self, loss: f64, start_iteration: u64, window: usize) -> f64;

    /// Copy of the `bbox_pred` parameters, or `None` if the layer is absent.
    fn bbox_pred(&self) -> Option<BBoxPredParams>;

    /// Overwrites the `bbox_pred` parameters.
    fn set_bbox_pred(&mut self, params: BBoxPredParams) -> Result<()>;

    fn save_model(&self, path: &Path) -> Result<()>;

    fn save_optimizer_state(&self, path: &Path) -> Result<()>;

    /// Copies matching layers from a previously saved model.
    fn load_pretrained(&mut self, path: &Path) -> Result<()>;

    /// Hands the training roidb to the input layer.
    fn bind_roidb(&mut self, roidb: Vec<RoiEntry>);
}
