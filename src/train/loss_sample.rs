use std::ops::{Add, AddAssign, Div};

use serde::{Serialize, Deserialize};

/// Loss terms reported for one (sub-)batch.
///
/// The solver produces one of these per forward/backward call; the
/// accumulator averages `iter_size` of them into the sample for one
/// effective iteration. Terms a network does not have are reported as `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossSample {
    /// Sum of all weighted loss layers, as returned by the forward pass.
    pub total: f64,
    /// RPN objectness classification loss.
    pub rpn_cls: f64,
    /// RPN anchor box-regression loss.
    pub rpn_bbox: f64,
    /// Detector box-regression loss.
    pub bbox: f64,
    /// Detector classification loss.
    pub cls: f64,
}

impl LossSample {
    /// A sample with every term set to `value`.
    pub fn uniform(value: f64) -> Self {
        LossSample {
            total: value,
            rpn_cls: value,
            rpn_bbox: value,
            bbox: value,
            cls: value,
        }
    }
}

impl Add for LossSample {
    type Output = LossSample;

    fn add(self, rhs: Self) -> Self::Output {
        LossSample {
            total: self.total + rhs.total,
            rpn_cls: self.rpn_cls + rhs.rpn_cls,
            rpn_bbox: self.rpn_bbox + rhs.rpn_bbox,
            bbox: self.bbox + rhs.bbox,
            cls: self.cls + rhs.cls,
        }
    }
}

impl AddAssign for LossSample {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Div<f64> for LossSample {
    type Output = LossSample;

    fn div(self, rhs: f64) -> Self::Output {
        LossSample {
            total: self.total / rhs,
            rpn_cls: self.rpn_cls / rhs,
            rpn_bbox: self.rpn_bbox / rhs,
            bbox: self.bbox / rhs,
            cls: self.cls / rhs,
        }
    }
}
