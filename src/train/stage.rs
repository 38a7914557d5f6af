use std::fmt;

use serde::{Serialize, Deserialize};

use crate::train::loss_sample::LossSample;

/// Component loss reported alongside the smoothed total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossTerm {
    RpnCls,
    RpnBbox,
    Cls,
    Bbox,
}

impl LossTerm {
    pub fn tag(self) -> &'static str {
        match self {
            LossTerm::RpnCls  => "rpn_cls_loss",
            LossTerm::RpnBbox => "rpn_bbox_loss",
            LossTerm::Cls     => "cls_loss",
            LossTerm::Bbox    => "bbox_loss",
        }
    }

    pub fn value(self, sample: &LossSample) -> f64 {
        match self {
            LossTerm::RpnCls  => sample.rpn_cls,
            LossTerm::RpnBbox => sample.rpn_bbox,
            LossTerm::Cls     => sample.cls,
            LossTerm::Bbox    => sample.bbox,
        }
    }
}

/// Which part of the detector a run trains. Chosen once, before the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingStage {
    /// End-to-end training of RPN and detector together.
    Joint,
    /// RPN stage of alternating optimization.
    RpnOnly,
    /// Fast R-CNN stage of alternating optimization.
    DetectorOnly,
}

impl TrainingStage {
    /// No stage name means end-to-end training; otherwise `has_rpn` picks
    /// which half of the alternating schedule this run is.
    pub fn select(has_rpn: bool, stage_name: Option<&str>) -> TrainingStage {
        match stage_name.filter(|s| !s.is_empty()) {
            None => TrainingStage::Joint,
            Some(_) if has_rpn => TrainingStage::RpnOnly,
            Some(_) => TrainingStage::DetectorOnly,
        }
    }

    pub fn loss_terms(self) -> &'static [LossTerm] {
        match self {
            TrainingStage::Joint => &[LossTerm::RpnCls, LossTerm::RpnBbox, LossTerm::Cls, LossTerm::Bbox],
            TrainingStage::RpnOnly => &[LossTerm::RpnCls, LossTerm::RpnBbox],
            TrainingStage::DetectorOnly => &[LossTerm::Cls, LossTerm::Bbox],
        }
    }

    /// Whether the network produces hard-example labels and RoIs.
    pub fn has_hard_examples(self) -> bool {
        !matches!(self, TrainingStage::RpnOnly)
    }

    /// Staged runs hand their checkpoint list back to the caller.
    pub fn returns_checkpoints(self) -> bool {
        !matches!(self, TrainingStage::Joint)
    }

    /// Telemetry tag prefix.
    pub fn namespace(self, stage_name: Option<&str>) -> String {
        match (self, stage_name) {
            (TrainingStage::Joint, _) | (_, None) => "data".to_string(),
            (_, Some(name)) => name.to_string(),
        }
    }
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingStage::Joint => "joint",
            TrainingStage::RpnOnly => "rpn",
            TrainingStage::DetectorOnly => "fast-rcnn",
        };
        f.write_str(name)
    }
}
