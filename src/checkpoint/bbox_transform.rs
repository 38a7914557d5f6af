use crate::error::{Result, TrainError};
use crate::roidb::bbox_stats::BBoxNormalizationStats;
use crate::solver::solver::BBoxPredParams;

/// Scale-and-shift that turns `bbox_pred` parameters trained on normalized
/// targets into parameters that predict raw deltas:
///
/// ```text
/// weight[i, :] := weight[i, :] * stds[i]
/// bias[i]      := bias[i] * stds[i] + means[i]
/// ```
///
/// The transform is applied only to the copy that gets written to disk; the
/// caller keeps the originals and puts them back afterwards.
#[derive(Debug, Clone)]
pub struct BBoxNormalizationTransform {
    stats: BBoxNormalizationStats,
}

impl BBoxNormalizationTransform {
    pub fn new(stats: BBoxNormalizationStats) -> Self {
        BBoxNormalizationTransform { stats }
    }

    pub fn stats(&self) -> &BBoxNormalizationStats {
        &self.stats
    }

    /// Returns the de-normalized parameters, leaving `params` untouched.
    pub fn denormalize(&self, params: &BBoxPredParams) -> Result<BBoxPredParams> {
        let outputs = self.stats.stds.len();
        if params.bias.len() != outputs || self.stats.means.len() != outputs {
            return Err(TrainError::shape(
                format!("{} bbox_pred outputs", outputs),
                format!("{} biases, {} means", params.bias.len(), self.stats.means.len()),
            ));
        }
        let weight = params.weight.scale_rows(&self.stats.stds).ok_or_else(|| {
            TrainError::shape(
                format!("{} bbox_pred weight rows", outputs),
                format!("{:?}", params.weight.shape()),
            )
        })?;
        let bias = params
            .bias
            .iter()
            .zip(self.stats.stds.iter().zip(&self.stats.means))
            .map(|(&b, (&s, &m))| b * s + m)
            .collect();
        Ok(BBoxPredParams { weight, bias })
    }
}
