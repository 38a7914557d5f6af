use crate::error::{Result, TrainError};
use crate::solver::solver::Solver;
use crate::train::loss_sample::LossSample;

/// Turns `iter_size` sub-batch passes into one effective iteration.
///
/// Each pass adds its gradients to the solver's accumulators; the reported
/// loss terms are summed and divided by `iter_size`. Nothing else in the
/// loop runs between the passes.
#[derive(Debug, Clone, Copy)]
pub struct IterationAccumulator {
    iter_size: usize,
}

impl IterationAccumulator {
    pub fn new(iter_size: usize) -> Result<Self> {
        if iter_size == 0 {
            return Err(TrainError::Config("iter_size must be at least 1".into()));
        }
        Ok(IterationAccumulator { iter_size })
    }

    pub fn iter_size(&self) -> usize {
        self.iter_size
    }

    /// Runs the sub-batches and returns their averaged losses.
    pub fn accumulate<S: Solver>(&self, solver: &mut S) -> Result<LossSample> {
        let mut sum = LossSample::default();
        for _ in 0..self.iter_size {
            sum += solver.compute_subbatch()?;
        }
        Ok(sum / self.iter_size as f64)
    }
}
