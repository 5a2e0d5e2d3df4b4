use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot stop flag shared between a stage owner and the worker doing the I/O.
///
/// Raising is sticky; there is no reset. Create a fresh signal per stage.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
