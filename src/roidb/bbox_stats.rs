use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::error::{Result, TrainError};
use crate::roidb::entry::RoiEntry;
use crate::train::train_config::TrainConfig;

const EPS: f64 = 1e-14;
/// Smallest std a foreground target coordinate may be normalized by.
const MIN_STD: f64 = 1e-6;

/// Per-class means and standard deviations of the box-regression targets.
///
/// Both vectors are flattened to `4 * num_classes` entries, in the same
/// order as the rows of the `bbox_pred` layer. Fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBoxNormalizationStats {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl BBoxNormalizationStats {
    /// Tiles fixed 4-vectors over every class.
    pub fn precomputed(num_classes: usize, means: [f64; 4], stds: [f64; 4]) -> Self {
        BBoxNormalizationStats {
            means: means.iter().copied().cycle().take(4 * num_classes).collect(),
            stds: stds.iter().copied().cycle().take(4 * num_classes).collect(),
        }
    }

    /// Computes statistics over the targets carried by the roidb.
    ///
    /// Background (class 0) rows are left at mean 0 and std 0.
    pub fn from_targets(roidb: &[RoiEntry], num_classes: usize) -> Result<Self> {
        let mut counts = vec![EPS; num_classes];
        let mut sums = vec![[0.0f64; 4]; num_classes];
        let mut squared_sums = vec![[0.0f64; 4]; num_classes];

        for entry in roidb {
            for target in &entry.bbox_targets {
                let cls = target_class(target, num_classes)?;
                if cls == 0 {
                    continue;
                }
                counts[cls] += 1.0;
                for k in 0..4 {
                    sums[cls][k] += target[k + 1];
                    squared_sums[cls][k] += target[k + 1] * target[k + 1];
                }
            }
        }

        let mut means = Vec::with_capacity(4 * num_classes);
        let mut stds = Vec::with_capacity(4 * num_classes);
        for cls in 0..num_classes {
            for k in 0..4 {
                let mean = sums[cls][k] / counts[cls];
                let var = squared_sums[cls][k] / counts[cls] - mean * mean;
                means.push(mean);
                stds.push(var.max(0.0).sqrt());
            }
        }
        Ok(BBoxNormalizationStats { means, stds })
    }

    pub fn num_classes(&self) -> usize {
        self.means.len() / 4
    }

    fn class_slice(v: &[f64], cls: usize) -> &[f64] {
        &v[4 * cls..4 * cls + 4]
    }
}

fn target_class(target: &[f64; 5], num_classes: usize) -> Result<usize> {
    let cls = target[0];
    if cls < 0.0 || cls.fract() != 0.0 || cls as usize >= num_classes {
        return Err(TrainError::invariant(format!(
            "regression target class {} outside 0..{}",
            cls, num_classes
        )));
    }
    Ok(cls as usize)
}

/// Computes the normalization statistics for the run and, when
/// `BBOX_NORMALIZE_TARGETS` is set, normalizes the roidb targets in place.
pub fn add_bbox_regression_targets(
    roidb: &mut [RoiEntry],
    config: &TrainConfig,
) -> Result<BBoxNormalizationStats> {
    let num_classes = config.num_classes();
    let stats = if config.bbox_normalize_targets_precomputed {
        debug!("Using precomputed bbox normalization statistics");
        BBoxNormalizationStats::precomputed(
            num_classes,
            config.bbox_normalize_means,
            config.bbox_normalize_stds,
        )
    } else {
        BBoxNormalizationStats::from_targets(roidb, num_classes)?
    };

    if config.bbox_normalize_targets {
        check_normalizable(roidb, &stats, num_classes)?;
        info!("Normalizing targets");
        for entry in roidb.iter_mut() {
            for target in entry.bbox_targets.iter_mut() {
                let cls = target_class(target, num_classes)?;
                if cls == 0 {
                    continue;
                }
                let means = BBoxNormalizationStats::class_slice(&stats.means, cls);
                let stds = BBoxNormalizationStats::class_slice(&stats.stds, cls);
                for k in 0..4 {
                    target[k + 1] = (target[k + 1] - means[k]) / stds[k];
                }
            }
        }
    } else {
        info!("NOT normalizing targets");
    }

    Ok(stats)
}

/// Fails if a foreground class that carries targets has a degenerate std,
/// which would turn its normalized targets into NaN or huge values.
fn check_normalizable(
    roidb: &[RoiEntry],
    stats: &BBoxNormalizationStats,
    num_classes: usize,
) -> Result<()> {
    for entry in roidb {
        for target in &entry.bbox_targets {
            let cls = target_class(target, num_classes)?;
            if cls == 0 {
                continue;
            }
            let stds = BBoxNormalizationStats::class_slice(&stats.stds, cls);
            if let Some(k) = stds.iter().position(|&s| !(s > MIN_STD)) {
                return Err(TrainError::Config(format!(
                    "class {} has regression target std {} for coordinate {}; \
                     it needs at least two distinct targets or precomputed stats",
                    cls, stds[k], k
                )));
            }
        }
    }
    Ok(())
}
