pub mod accumulator;
pub mod convergence;
pub mod interrupt;
pub mod loop_fn;
pub mod loss_sample;
pub mod stage;
pub mod train_config;
pub mod trainer;

pub use accumulator::IterationAccumulator;
pub use convergence::ConvergenceController;
pub use interrupt::ShutdownSignal;
pub use loop_fn::{TrainOutcome, TrainingModeController};
pub use loss_sample::LossSample;
pub use stage::{LossTerm, TrainingStage};
pub use train_config::TrainConfig;
pub use trainer::{build_controller, train_net, TrainOptions};
