/// Windowed running average of the total loss.
///
/// Until the window fills, the value is the plain mean of every loss seen.
/// Afterwards each new loss replaces the slot `(iteration - start) % window`
/// and the mean is updated incrementally, so the cost per step is constant.
#[derive(Debug, Clone, Default)]
pub struct SmoothedLossTracker {
    losses: Vec<f64>,
    smoothed: f64,
}

impl SmoothedLossTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds `loss` observed at `iteration` into the average.
    ///
    /// A `window` of 0 is treated as 1.
    pub fn update(&mut self, loss: f64, iteration: u64, start_iteration: u64, window: usize) -> f64 {
        let window = window.max(1);
        if self.losses.len() < window {
            self.losses.push(loss);
            let size = self.losses.len() as f64;
            self.smoothed = (self.smoothed * (size - 1.0) + loss) / size;
        } else {
            let idx = (iteration.saturating_sub(start_iteration) % window as u64) as usize;
            self.smoothed += (loss - self.losses[idx]) / window as f64;
            self.losses[idx] = loss;
        }
        self.smoothed
    }

    pub fn value(&self) -> f64 {
        self.smoothed
    }
}
