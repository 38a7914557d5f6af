/// Stop rule driven by the solver's learning-rate schedule.
///
/// Training continues while `iteration == 0` or `learning_rate >= plateau_lr`,
/// so iteration 0 always runs. If the schedule never decays below the
/// plateau the loop never ends; that is the schedule's responsibility.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceController {
    plateau_lr: f64,
}

impl ConvergenceController {
    pub fn new(plateau_lr: f64) -> Self {
        ConvergenceController { plateau_lr }
    }

    pub fn plateau_lr(&self) -> f64 {
        self.plateau_lr
    }

    pub fn should_continue(&self, iteration: u64, learning_rate: f64) -> bool {
        iteration == 0 || learning_rate >= self.plateau_lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_iteration_always_runs() {
        let c = ConvergenceController::new(0.01);
        assert!(c.should_continue(0, 0.0));
        assert!(!c.should_continue(1, 0.0));
    }

    #[test]
    fn plateau_threshold_is_inclusive() {
        let c = ConvergenceController::new(0.001);
        assert!(c.should_continue(10, 0.001));
        assert!(!c.should_continue(10, 0.000_999));
    }

    #[test]
    fn decaying_schedule_stops_at_first_decayed_iteration() {
        let c = ConvergenceController::new(1e-4);
        let lr = |it: u64| if it < 300 { 1e-3 } else { 1e-5 };
        let executed: Vec<u64> = (0..).take_while(|&it| c.should_continue(it, lr(it))).collect();
        assert_eq!(executed.len(), 300);
        assert_eq!(executed.last(), Some(&299));
    }
}
