pub mod sim;
pub mod sim_config;
pub mod smoothing;
pub mod solver;

pub use sim::{SimModel, SimSolver, SimSolverState};
pub use sim_config::SimSolverConfig;
pub use smoothing::SmoothedLossTracker;
pub use solver::{BatchOutputs, BBoxPredParams, ImageBlob, Solver};
