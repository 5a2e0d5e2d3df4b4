//! Cancellation shared by a scan session and whoever may abort it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel as xch;

/// Cloneable cancel handle.
///
/// Cancelling drops the only sender, so every clone of the receiver sees a
/// disconnect and any `select!` waiting on it wakes at once.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    tx: Arc<Mutex<Option<xch::Sender<()>>>>,
    rx: xch::Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = xch::bounded(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::debug!("scan cancellation requested");
        }
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Becomes ready (disconnected) once cancelled. Never yields a message.
    pub fn receiver(&self) -> &xch::Receiver<()> {
        &self.rx
    }
}
