pub mod bbox_transform;
pub mod manager;

pub use bbox_transform::BBoxNormalizationTransform;
pub use manager::{Checkpoint, CheckpointManager, MODEL_EXTENSION, SOLVER_STATE_EXTENSION};
