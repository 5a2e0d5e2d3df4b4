//! Background load-cell sampling.
//!
//! Spawns a thread that owns the `SignalSource`, pushes every good reading
//! into the shared rolling window, offers it to the burst channel used by
//! tare/calibrate, and tracks the last-ok timestamp for staleness checks.
//!
//! Each `Sampler` owns exactly one thread; it is stopped and joined when the
//! `Sampler` is dropped, and the source is shut down on the thread's way out.
use crossbeam_channel as xch;
use nutriscale_traits::SignalSource;
use nutriscale_traits::clock::Clock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::calibration::CalibrationState;
use crate::hw_error::map_hw_error;

/// Capacity of the raw-sample side channel read by tare and calibrate.
pub const BURST_CAPACITY: usize = 64;

/// State shared between the sampler thread and readers. Window and calibration
/// sit behind one lock so a reader never pairs a new offset with an old gain.
#[derive(Debug)]
pub struct Shared {
    inner: Mutex<WeightState>,
    last_ok_ms: AtomicU64,
    have_sample: AtomicBool,
}

#[derive(Debug)]
pub(crate) struct WeightState {
    pub(crate) window: VecDeque<i32>,
    pub(crate) capacity: usize,
    pub(crate) calibration: CalibrationState,
    pub(crate) scratch: Vec<i32>,
}

impl Shared {
    pub(crate) fn new(window: usize, calibration: CalibrationState) -> Self {
        let capacity = window.max(1);
        Self {
            inner: Mutex::new(WeightState {
                window: VecDeque::with_capacity(capacity),
                capacity,
                calibration,
                scratch: Vec::with_capacity(capacity),
            }),
            last_ok_ms: AtomicU64::new(0),
            have_sample: AtomicBool::new(false),
        }
    }

    /// Lock the weight state. A panic while holding the lock leaves the data
    /// consistent (every write is a single push or field store), so poison is
    /// ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, WeightState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, raw: i32) {
        let mut st = self.lock();
        if st.window.len() == st.capacity {
            st.window.pop_front();
        }
        st.window.push_back(raw);
    }

    pub(crate) fn has_sample(&self) -> bool {
        self.have_sample.load(Ordering::Acquire)
    }
}

pub struct Sampler {
    shutdown: Arc<AtomicBool>,
    shared: Arc<Shared>,
    epoch: Instant,
    clock: Arc<dyn Clock + Send + Sync>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Sampler {
    /// Start polling `source` at `hz`, waiting at most `timeout` per read.
    /// Returns the sampler and the receiving end of the burst channel.
    pub fn spawn<S>(
        mut source: S,
        shared: Arc<Shared>,
        hz: u32,
        timeout: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> std::io::Result<(Self, xch::Receiver<i32>)>
    where
        S: SignalSource + Send + 'static,
    {
        let (burst_tx, burst_rx) = xch::bounded(BURST_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let shared_clone = shared.clone();
        let thread_clock = clock.clone();
        let period = Duration::from_micros(crate::util::period_us(hz));
        let epoch = clock.now();

        let join_handle = std::thread::Builder::new()
            .name("weight-sampler".into())
            .spawn(move || {
                let mut consecutive_errors: u32 = 0;
                loop {
                    if shutdown_clone.load(Ordering::Relaxed) {
                        tracing::debug!("sampler thread received shutdown signal");
                        break;
                    }

                    let started = thread_clock.now();
                    match source.read(timeout) {
                        Ok(raw) => {
                            if consecutive_errors > 0 {
                                tracing::info!(
                                    after = consecutive_errors,
                                    "load cell reads recovered"
                                );
                            }
                            consecutive_errors = 0;
                            shared_clone.push(raw);
                            shared_clone
                                .last_ok_ms
                                .store(thread_clock.ms_since(epoch), Ordering::Release);
                            shared_clone.have_sample.store(true, Ordering::Release);
                            // Nobody bursting: the channel fills up and we drop samples.
                            let _ = burst_tx.try_send(raw);
                        }
                        Err(e) => {
                            let err = map_hw_error(e.as_ref());
                            consecutive_errors = consecutive_errors.saturating_add(1);
                            if consecutive_errors == 1 {
                                tracing::warn!(error = %err, "load cell read failed; keeping last weight");
                            } else {
                                tracing::debug!(error = %err, consecutive = consecutive_errors, "load cell read failed");
                            }
                        }
                    }

                    if shutdown_clone.load(Ordering::Relaxed) {
                        break;
                    }
                    let spent = thread_clock.now().saturating_duration_since(started);
                    thread_clock.sleep(period.saturating_sub(spent));
                }
                source.shutdown();
                tracing::trace!("sampler thread exiting cleanly");
            })?;

        Ok((
            Self {
                shutdown,
                shared,
                epoch,
                clock,
                join_handle: Some(join_handle),
            },
            burst_rx,
        ))
    }

    /// Milliseconds since the last successful read (since start if none yet).
    pub fn stalled_for_ms(&self) -> u64 {
        let now = self.clock.ms_since(self.epoch);
        now.saturating_sub(self.shared.last_ok_ms.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.join_handle.is_some()
    }

    /// Signal the thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits after its current read returns, bounded by the read timeout.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sampler thread joined"),
                Err(e) => tracing::warn!(?e, "sampler thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}
