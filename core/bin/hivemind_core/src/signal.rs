//! Process-wide shutdown latch.
//!
//! The producer and consumer check the latch between batches; a latched
//! signal never interrupts a running database statement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches the flag on Ctrl+C / SIGTERM.
    pub fn install_ctrlc_handler(&self) -> anyhow::Result<()> {
        let flag = self.0.clone();
        ctrlc::set_handler(move || {
            log::warn!("Stop signal received, shutting down at the next batch boundary");
            flag.store(true, Ordering::SeqCst);
        })?;
        Ok(())
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
