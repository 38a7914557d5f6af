use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::{Result, TrainError};

/// Static training configuration.
///
/// Loaded from JSON with the upper-case key names used by the detector
/// configs (`PLATEAU_LR`, `SNAPSHOT_ITERS`, ...). Every key is optional.
///
/// # Cadences
/// - `snapshot_iters`       — periodic checkpoint interval; `0` disables
/// - `monitor_batch`        — class-ratio emission interval; `0` disables
/// - `scalar_summary_iters` — loss/lr scalar interval; `0` disables
/// - `image_summary_iters`  — overlay image interval; `0` disables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TrainConfig {
    /// Training stops once the learning rate drops below this value.
    pub plateau_lr: f64,
    pub snapshot_iters: u64,
    pub snapshot_infix: String,
    /// RoIs per image in a minibatch.
    pub batch_size: usize,
    pub monitor_batch: u64,
    pub monitor_roi: bool,
    pub use_rcnn_ohem: bool,
    pub scalar_summary_iters: u64,
    pub image_summary_iters: u64,
    /// Class names, index 0 being background.
    pub classes: Vec<String>,
    /// Overlay color per class index, BGR.
    pub colors: Vec<[u8; 3]>,
    /// Per-channel means subtracted from the input image, BGR.
    pub pixel_means: [f64; 3],
    pub bbox_reg: bool,
    pub bbox_normalize_targets: bool,
    pub bbox_normalize_targets_precomputed: bool,
    pub bbox_normalize_means: [f64; 4],
    pub bbox_normalize_stds: [f64; 4],
    pub has_rpn: bool,
    pub fg_thresh: f64,
    pub bg_thresh_lo: f64,
    pub bg_thresh_hi: f64,
    pub use_flipped: bool,
    pub snapshot_dir: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            plateau_lr: 1e-5,
            snapshot_iters: 10_000,
            snapshot_infix: String::new(),
            batch_size: 128,
            monitor_batch: 100,
            monitor_roi: false,
            use_rcnn_ohem: false,
            scalar_summary_iters: 20,
            image_summary_iters: 0,
            classes: vec!["__background__".to_string()],
            colors: Vec::new(),
            pixel_means: [102.9801, 115.9465, 122.7717],
            bbox_reg: true,
            bbox_normalize_targets: true,
            bbox_normalize_targets_precomputed: false,
            bbox_normalize_means: [0.0, 0.0, 0.0, 0.0],
            bbox_normalize_stds: [0.1, 0.1, 0.2, 0.2],
            has_rpn: false,
            fg_thresh: 0.5,
            bg_thresh_lo: 0.1,
            bg_thresh_hi: 0.5,
            use_flipped: true,
            snapshot_dir: PathBuf::from("output"),
        }
    }
}

impl TrainConfig {
    /// Deserializes a config from a JSON file and validates it.
    pub fn load_json(path: &Path) -> Result<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Whether hard-example class ratios are emitted at all.
    pub fn monitors_classes(&self) -> bool {
        self.use_rcnn_ohem && self.monitor_roi && self.monitor_batch > 0
    }

    pub fn validate(&self) -> Result<()> {
        // RPN has no fixed statistics to compute a priori.
        if self.has_rpn
            && self.bbox_reg
            && self.bbox_normalize_targets
            && !self.bbox_normalize_targets_precomputed
        {
            return Err(TrainError::Config(
                "HAS_RPN with BBOX_NORMALIZE_TARGETS requires BBOX_NORMALIZE_TARGETS_PRECOMPUTED"
                    .into(),
            ));
        }
        if !(self.plateau_lr >= 0.0) {
            return Err(TrainError::Config(format!(
                "PLATEAU_LR must be non-negative, got {}",
                self.plateau_lr
            )));
        }
        if self.batch_size == 0 {
            return Err(TrainError::Config("BATCH_SIZE must be at least 1".into()));
        }
        if self.bg_thresh_lo > self.bg_thresh_hi {
            return Err(TrainError::Config(format!(
                "BG_THRESH_LO ({}) exceeds BG_THRESH_HI ({})",
                self.bg_thresh_lo, self.bg_thresh_hi
            )));
        }
        if self.classes.is_empty() {
            return Err(TrainError::Config("CLASSES must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let cfg: TrainConfig =
            serde_json::from_str(r#"{ "PLATEAU_LR": 0.0001, "SNAPSHOT_INFIX": "stage1" }"#).unwrap();
        assert_eq!(cfg.plateau_lr, 0.0001);
        assert_eq!(cfg.snapshot_infix, "stage1");
        assert_eq!(cfg.snapshot_iters, 10_000);
        assert_eq!(cfg.batch_size, 128);
        assert!(cfg.use_flipped);
    }

    #[test]
    fn rpn_normalization_requires_precomputed_stats() {
        let cfg = TrainConfig { has_rpn: true, ..TrainConfig::default() };
        assert!(matches!(cfg.validate(), Err(TrainError::Config(_))));

        let ok = TrainConfig {
            has_rpn: true,
            bbox_normalize_targets_precomputed: true,
            ..TrainConfig::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_background_band() {
        let cfg = TrainConfig { bg_thresh_lo: 0.6, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn class_monitoring_needs_ohem_roi_and_cadence() {
        let mut cfg = TrainConfig {
            use_rcnn_ohem: true,
            monitor_roi: true,
            ..TrainConfig::default()
        };
        assert!(cfg.monitors_classes());
        cfg.monitor_batch = 0;
        assert!(!cfg.monitors_classes());
    }
}
