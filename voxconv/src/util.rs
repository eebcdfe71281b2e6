//! Miscellaneous utilities shared by long-running operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shareable flag that asks a long-running operation to stop early.
///
/// Clones share the same flag. Operations poll [`StopSignal::should_stop()`] between units of
/// work; once raised, the flag cannot be lowered again.
///
/// ```
/// use voxconv::util::StopSignal;
///
/// let signal = StopSignal::new();
/// let observer = signal.clone();
/// assert!(!observer.should_stop());
/// signal.stop();
/// assert!(observer.should_stop());
/// ```
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Constructs a signal that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns whether [`StopSignal::stop()`] has been called on this signal or a clone of it.
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
