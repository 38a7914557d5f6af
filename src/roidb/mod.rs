pub mod bbox_stats;
pub mod entry;
pub mod filter;

pub use bbox_stats::{add_bbox_regression_targets, BBoxNormalizationStats};
pub use entry::{load_roidb, save_roidb, RoiEntry};
pub use filter::{filter_roidb, get_training_roidb};
