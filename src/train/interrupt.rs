use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, TrainError};

/// Cooperative shutdown request.
///
/// The signal handler only sets the flag. The training loop checks it once
/// per iteration, between the parameter update and the next stop-rule
/// evaluation, and performs the final checkpoint on its own stack.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes SIGINT, SIGTERM and SIGHUP to this signal. Can only be
    /// installed once per process.
    pub fn install(&self) -> Result<()> {
        let flag = Arc::clone(&self.flag);
        ctrlc::set_handler(move || {
            warn!("Received termination signal; stopping after the current iteration");
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| TrainError::Signal(e.to_string()))
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
