//! Capability trait for holding the device awake while a session runs

use crate::error::Result;

/// Keeps the platform from suspending while the session is active
///
/// Acquisition failure is a resource error: retrying cannot fix a
/// permission problem, so the session goes straight to `Error`.
pub trait WakeLock: Send + Sync {
    fn acquire(&self) -> Result<()>;
    fn release(&self);
}

/// Wake lock for platforms that never suspend a foreground process
pub struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn acquire(&self) -> Result<()> {
        Ok(())
    }

    fn release(&self) {}
}
