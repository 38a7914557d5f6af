use tracing::{debug, info, warn};

use crate::checkpoint::manager::{Checkpoint, CheckpointManager};
use crate::error::{Result, TrainError};
use crate::roidb::bbox_stats::BBoxNormalizationStats;
use crate::solver::solver::Solver;
use crate::telemetry::class_monitor::ClassDistributionMonitor;
use crate::telemetry::emitter::TelemetryEmitter;
use crate::telemetry::sink::TelemetrySink;
use crate::train::accumulator::IterationAccumulator;
use crate::train::convergence::ConvergenceController;
use crate::train::interrupt::ShutdownSignal;
use crate::train::stage::TrainingStage;
use crate::train::train_config::TrainConfig;

/// How a training run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainOutcome {
    /// The learning rate reached the plateau.
    ///
    /// `checkpoints` lists every checkpoint of the run (periodic, then the
    /// trailing one) for staged runs, and is `None` for joint training.
    Converged {
        final_iteration: u64,
        checkpoints: Option<Vec<Checkpoint>>,
    },
    /// A shutdown was requested. `checkpoint` is the one written on the way
    /// out, or `None` if the final iteration was already checkpointed.
    Interrupted {
        iteration: u64,
        checkpoint: Option<Checkpoint>,
    },
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives the solver until the learning rate plateaus.
///
/// The stage is fixed at construction and decides which loss terms are
/// reported, whether hard-example monitoring runs, and whether the
/// checkpoint list is returned.
pub struct TrainingModeController<S: Solver, K: TelemetrySink> {
    solver: S,
    config: TrainConfig,
    stage: TrainingStage,
    accumulator: IterationAccumulator,
    convergence: ConvergenceController,
    checkpoints: CheckpointManager,
    monitor: ClassDistributionMonitor,
    telemetry: TelemetryEmitter<K>,
    shutdown: ShutdownSignal,
}

impl<S: Solver, K: TelemetrySink> TrainingModeController<S, K> {
    /// # Arguments
    /// - `solver`    — optimizer adapter, already holding the roidb
    /// - `config`    — validated training configuration
    /// - `stage`     — which loop variant to run
    /// - `namespace` — telemetry tag prefix
    /// - `stats`     — box-regression statistics, if `BBOX_REG` is enabled
    /// - `sink`      — telemetry destination, closed when the run ends
    /// - `shutdown`  — cooperative interrupt flag
    pub fn new(
        solver: S,
        config: TrainConfig,
        stage: TrainingStage,
        namespace: impl Into<String>,
        stats: Option<BBoxNormalizationStats>,
        sink: K,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let accumulator = IterationAccumulator::new(solver.iter_size())?;
        Ok(TrainingModeController {
            accumulator,
            convergence: ConvergenceController::new(config.plateau_lr),
            checkpoints: CheckpointManager::new(&config, stats),
            monitor: ClassDistributionMonitor::new(&config),
            telemetry: TelemetryEmitter::new(sink, namespace, &config),
            solver,
            config,
            stage,
            shutdown,
        })
    }

    pub fn stage(&self) -> TrainingStage {
        self.stage
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    pub fn telemetry(&self) -> &TelemetryEmitter<K> {
        &self.telemetry
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn into_parts(self) -> (S, K) {
        (self.solver, self.telemetry.into_sink())
    }

    /// Runs the loop to convergence or until a shutdown is requested.
    ///
    /// A checkpoint always exists for the terminating iteration when this
    /// returns `Ok`. The telemetry sink is closed in both outcomes.
    pub fn train_model(&mut self) -> Result<TrainOutcome> {
        info!(
            stage = %self.stage,
            lr = self.solver.learning_rate(),
            plateau_lr = self.convergence.plateau_lr(),
            "Starting training loop"
        );
        let start_iteration = self.solver.iteration();
        let mut produced = Vec::new();
        let mut last_executed: Option<u64> = None;

        loop {
            // ── Safe point: previous iteration fully applied ───────────────
            if self.shutdown.is_requested() {
                let iteration = last_executed.unwrap_or_else(|| self.solver.iteration());
                return self.shut_down(iteration);
            }

            let iteration = self.solver.iteration();
            if !self
                .convergence
                .should_continue(iteration, self.solver.learning_rate())
            {
                break;
            }

            if let Some(checkpoint) = self.run_iteration(start_iteration)? {
                produced.push(checkpoint);
            }
            last_executed = Some(iteration);
        }

        let final_iteration = last_executed.unwrap_or_else(|| self.solver.iteration());
        if self.checkpoints.needs_checkpoint_at(final_iteration) {
            produced.push(self.checkpoints.checkpoint(&mut self.solver, final_iteration)?);
        }
        self.telemetry.close()?;

        info!(
            final_iteration,
            checkpoints = produced.len(),
            "Learning rate reached plateau; training finished"
        );
        Ok(TrainOutcome::Converged {
            final_iteration,
            checkpoints: self.stage.returns_checkpoints().then_some(produced),
        })
    }

    /// One effective iteration. Returns the periodic checkpoint, if one was
    /// written.
    fn run_iteration(&mut self, start_iteration: u64) -> Result<Option<Checkpoint>> {
        let iteration = self.solver.iteration();
        let learning_rate = self.solver.learning_rate();

        // ── Forward/backward over iter_size sub-batches ────────────────────
        let sample = self.accumulator.accumulate(&mut self.solver)?;
        let window = self.solver.average_loss();
        let smoothed = self.solver.smooth(sample.total, start_iteration, window);

        // ── Hard-example class distribution ───────────────────────────────
        if self.stage.has_hard_examples() {
            if let Some(outputs) = self.solver.batch_outputs() {
                self.monitor.observe(&outputs.labels_hard);
            }
            if self.monitor.is_due(iteration) {
                let ratios = self.monitor.drain();
                debug!(iteration, total = ratios.total, "Emitting hard RoI class ratios");
                self.telemetry.emit_class_ratios(iteration, &ratios)?;
            }
        }

        // ── Scalar and image summaries ────────────────────────────────────
        if self.telemetry.scalars_due(iteration) {
            self.telemetry
                .emit_losses(iteration, self.stage, smoothed, &sample, learning_rate)?;
        }
        if self.stage.has_hard_examples() && self.telemetry.image_due(iteration) {
            let outputs = self
                .solver
                .batch_outputs()
                .ok_or(TrainError::MissingOutput("rois_hard"))?;
            self.telemetry.emit_overlay(iteration, outputs, &self.config)?;
        }

        // ── Periodic checkpoint, before the update ────────────────────────
        let checkpoint = if self.checkpoints.is_due(iteration) {
            Some(self.checkpoints.checkpoint(&mut self.solver, iteration)?)
        } else {
            None
        };

        self.solver.apply_update()?;
        debug!(iteration, loss = sample.total, smoothed, lr = learning_rate, "iteration done");
        Ok(checkpoint)
    }

    fn shut_down(&mut self, iteration: u64) -> Result<TrainOutcome> {
        warn!(iteration, "Shutdown requested");
        let checkpoint = if self.checkpoints.needs_checkpoint_at(iteration) {
            Some(self.checkpoints.checkpoint(&mut self.solver, iteration)?)
        } else {
            None
        };
        self.telemetry.close()?;
        Ok(TrainOutcome::Interrupted { iteration, checkpoint })
    }
}
