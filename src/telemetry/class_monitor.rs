use crate::train::train_config::TrainConfig;

/// Result of one monitoring window.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRatios {
    /// `(class name, count / total)` per class. Empty when `total == 0`.
    pub ratios: Vec<(String, f64)>,
    /// Hard RoIs per image averaged over the window.
    pub rois_per_image: f64,
    pub total: u64,
}

/// Counts hard-example labels per class over a monitoring window.
///
/// Counting happens every iteration; `drain` is called on the window cadence
/// and leaves every count at zero.
#[derive(Debug, Clone)]
pub struct ClassDistributionMonitor {
    classes: Vec<String>,
    counts: Vec<u64>,
    images_per_window: f64,
    monitor_batch: u64,
    enabled: bool,
}

impl ClassDistributionMonitor {
    pub fn new(config: &TrainConfig) -> Self {
        ClassDistributionMonitor {
            classes: config.classes.clone(),
            counts: vec![0; config.classes.len()],
            images_per_window: (config.batch_size as u64 * config.monitor_batch) as f64,
            monitor_batch: config.monitor_batch,
            enabled: config.monitors_classes(),
        }
    }

    /// Adds the labels of one batch. Labels outside the class list are ignored.
    pub fn observe(&mut self, labels: &[usize]) {
        for &label in labels {
            if let Some(count) = self.counts.get_mut(label) {
                *count += 1;
            }
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn is_due(&self, iteration: u64) -> bool {
        self.enabled && iteration != 0 && iteration % self.monitor_batch == 0
    }

    /// Computes the window's ratios and resets the counts.
    pub fn drain(&mut self) -> ClassRatios {
        let total = self.total();
        let ratios = if total == 0 {
            Vec::new()
        } else {
            self.classes
                .iter()
                .zip(&self.counts)
                .map(|(name, &count)| (name.clone(), count as f64 / total as f64))
                .collect()
        };
        let rois_per_image = if self.images_per_window > 0.0 {
            total as f64 / self.images_per_window
        } else {
            0.0
        };
        self.reset();
        ClassRatios {
            ratios,
            rois_per_image,
            total,
        }
    }

    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }
}
