pub mod error;
pub mod math;
pub mod solver;
pub mod roidb;
pub mod checkpoint;
pub mod telemetry;
pub mod train;

// Convenience re-exports
pub use error::{Result, TrainError};
pub use math::matrix::Matrix;
pub use solver::solver::{BatchOutputs, BBoxPredParams, ImageBlob, Solver};
pub use solver::sim::SimSolver;
pub use solver::sim_config::SimSolverConfig;
pub use roidb::entry::RoiEntry;
pub use roidb::bbox_stats::BBoxNormalizationStats;
pub use checkpoint::manager::{Checkpoint, CheckpointManager};
pub use checkpoint::bbox_transform::BBoxNormalizationTransform;
pub use telemetry::sink::{ChannelSink, EventFileSink, TelemetryEvent, TelemetrySink};
pub use train::loss_sample::LossSample;
pub use train::loop_fn::{TrainOutcome, TrainingModeController};
pub use train::stage::TrainingStage;
pub use train::train_config::TrainConfig;
pub use train::interrupt::ShutdownSignal;
pub use train::trainer::{train_net, TrainOptions};
