//! Continuous, calibrated weight acquisition.
//!
//! `WeightAcquirer` owns the load cell through a `Sampler` thread and exposes
//! a non-blocking `read_weight()`. Tare and calibrate average a fresh burst of
//! raw samples from the running sampler and swap the calibration in one locked
//! store, so a reader sees either the old offset/gain pair or the new one.
//!
//! If the hardware source cannot be opened the acquirer runs on a simulated
//! source in `AcquireMode::Simulated`: reads report 0 g and tare/calibrate
//! leave the calibration untouched.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel as xch;
use nutriscale_hardware::SimulatedSource;
use nutriscale_traits::SignalSource;
use nutriscale_traits::clock::{Clock, MonotonicClock};
use serde::Serialize;

use crate::calibration::{CalibrationState, check_gain};
use crate::config::SamplingCfg;
use crate::error::ScaleError;
use crate::sampler::{Sampler, Shared, WeightState};
use crate::util::{mean_i32, median_i32};

/// Longest single wait for a burst sample before the clock is checked again.
const BURST_POLL: Duration = Duration::from_millis(5);

/// Which source is feeding the acquirer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquireMode {
    Hardware,
    Simulated,
}

/// Weight as seen by consumers. `grams` is always `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AcquiredWeight {
    pub grams: u32,
    pub mode: AcquireMode,
    /// Reading exceeds the configured capacity of the load cell.
    pub overloaded: bool,
}

/// Non-blocking access to the latest weight.
pub trait WeightReader: Send + Sync {
    fn read_weight(&self) -> AcquiredWeight;
}

/// Cloneable read-only view of a running acquirer.
#[derive(Debug, Clone)]
pub struct WeightHandle {
    shared: Arc<Shared>,
    mode: AcquireMode,
    max_weight_g: u32,
}

impl WeightReader for WeightHandle {
    fn read_weight(&self) -> AcquiredWeight {
        if self.mode == AcquireMode::Simulated {
            return AcquiredWeight {
                grams: 0,
                mode: self.mode,
                overloaded: false,
            };
        }
        let grams = {
            let mut st = self.shared.lock();
            let WeightState {
                window,
                scratch,
                calibration,
                ..
            } = &mut *st;
            median_i32(window.iter().copied(), scratch).map_or(0, |raw| calibration.grams(raw))
        };
        AcquiredWeight {
            grams,
            mode: self.mode,
            overloaded: grams > self.max_weight_g,
        }
    }
}

pub struct WeightAcquirer {
    shared: Arc<Shared>,
    sampler: Option<Sampler>,
    burst_rx: xch::Receiver<i32>,
    mode: AcquireMode,
    cfg: SamplingCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    /// Serializes tare/calibrate; both read the same burst channel.
    calib_lock: Mutex<()>,
}

impl std::fmt::Debug for WeightAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightAcquirer")
            .field("mode", &self.mode)
            .field("running", &self.is_running())
            .field("calibration", &self.calibration())
            .finish_non_exhaustive()
    }
}

impl WeightAcquirer {
    /// Open the hardware source with `open` and start sampling. An `open`
    /// failure is logged and the acquirer runs simulated; this never fails.
    pub fn start<F, E>(open: F, cfg: SamplingCfg, calibration: CalibrationState) -> Self
    where
        F: FnOnce() -> Result<Box<dyn SignalSource + Send>, E>,
        E: std::fmt::Display,
    {
        Self::start_with_clock(open, cfg, calibration, Arc::new(MonotonicClock::new()))
    }

    pub fn start_with_clock<F, E>(
        open: F,
        cfg: SamplingCfg,
        calibration: CalibrationState,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self
    where
        F: FnOnce() -> Result<Box<dyn SignalSource + Send>, E>,
        E: std::fmt::Display,
    {
        let (source, mode): (Box<dyn SignalSource + Send>, _) = match open() {
            Ok(s) => (s, AcquireMode::Hardware),
            Err(e) => {
                tracing::warn!(error = %e, "load cell unavailable; running simulated");
                (Box::new(SimulatedSource::new()), AcquireMode::Simulated)
            }
        };
        Self::spawn(source, mode, cfg, calibration, clock)
    }

    /// Run on an already-open source in hardware mode.
    pub fn from_source<S>(source: S, cfg: SamplingCfg, calibration: CalibrationState) -> Self
    where
        S: SignalSource + Send + 'static,
    {
        Self::spawn(
            Box::new(source),
            AcquireMode::Hardware,
            cfg,
            calibration,
            Arc::new(MonotonicClock::new()),
        )
    }

    /// Run without a load cell.
    pub fn simulated(cfg: SamplingCfg, calibration: CalibrationState) -> Self {
        Self::spawn(
            Box::new(SimulatedSource::new()),
            AcquireMode::Simulated,
            cfg,
            calibration,
            Arc::new(MonotonicClock::new()),
        )
    }

    fn spawn(
        source: Box<dyn SignalSource + Send>,
        mode: AcquireMode,
        cfg: SamplingCfg,
        mut calibration: CalibrationState,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        if check_gain(calibration.gain).is_err() {
            tracing::warn!(gain = calibration.gain, "invalid calibration gain; using default");
            calibration = CalibrationState {
                offset: calibration.offset,
                ..CalibrationState::default()
            };
        }
        let shared = Arc::new(Shared::new(cfg.window, calibration));
        let (sampler, burst_rx) = match Sampler::spawn(
            source,
            shared.clone(),
            cfg.sample_rate_hz,
            cfg.read_timeout(),
            clock.clone(),
        ) {
            Ok((s, rx)) => (Some(s), rx),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn sampler thread; weight stays at 0");
                (None, xch::never())
            }
        };
        tracing::info!(
            ?mode,
            hz = cfg.sample_rate_hz,
            window = cfg.window,
            offset = calibration.offset,
            gain = calibration.gain,
            "weight acquisition started"
        );
        Self {
            shared,
            sampler,
            burst_rx,
            mode,
            cfg,
            clock,
            calib_lock: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> AcquireMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.sampler.as_ref().is_some_and(Sampler::is_running)
    }

    /// Latest calibrated weight. Never blocks on the sensor.
    pub fn read_weight(&self) -> AcquiredWeight {
        self.handle().read_weight()
    }

    /// A cloneable reader for consumers on other threads.
    pub fn handle(&self) -> WeightHandle {
        WeightHandle {
            shared: self.shared.clone(),
            mode: self.mode,
            max_weight_g: self.cfg.max_weight_g,
        }
    }

    /// Whether at least one sample has been read since start.
    pub fn has_sample(&self) -> bool {
        self.shared.has_sample()
    }

    /// Snapshot of the current calibration.
    pub fn calibration(&self) -> CalibrationState {
        self.shared.lock().calibration
    }

    /// Milliseconds since the last successful read.
    pub fn stalled_for_ms(&self) -> u64 {
        self.sampler.as_ref().map_or(u64::MAX, Sampler::stalled_for_ms)
    }

    /// Average a fresh burst and make it the zero point. Returns the new
    /// calibration. In simulated mode nothing changes.
    pub fn tare(&self) -> Result<CalibrationState, ScaleError> {
        if self.mode == AcquireMode::Simulated {
            tracing::info!("tare ignored in simulated mode");
            return Ok(self.calibration());
        }
        let _guard = self.calib_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let avg = self.burst_average()?;
        let wall = self.clock.wall();
        let snapshot = {
            let mut st = self.shared.lock();
            st.calibration.offset = avg;
            st.calibration.calibrated_at = Some(wall);
            st.calibration
        };
        tracing::info!(offset = avg, "tare complete");
        Ok(snapshot)
    }

    /// With `known_grams` resting on the scale, set `gain = (avg - offset) / known_grams`
    /// and return it. In simulated mode the current gain is returned unchanged.
    pub fn calibrate(&self, known_grams: f32) -> Result<f32, ScaleError> {
        if !(known_grams.is_finite() && known_grams > 0.0) {
            return Err(ScaleError::InvalidReference(known_grams));
        }
        if self.mode == AcquireMode::Simulated {
            tracing::info!("calibrate ignored in simulated mode");
            return Ok(self.calibration().gain);
        }
        let _guard = self.calib_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let avg = self.burst_average()?;
        let wall = self.clock.wall();
        let (gain, offset) = {
            let mut st = self.shared.lock();
            let delta = f64::from(avg) - f64::from(st.calibration.offset);
            let gain = (delta / f64::from(known_grams)) as f32;
            check_gain(gain)?;
            st.calibration.gain = gain;
            st.calibration.calibrated_at = Some(wall);
            (gain, st.calibration.offset)
        };
        tracing::info!(gain, offset, known_grams, raw_avg = avg, "calibration complete");
        Ok(gain)
    }

    fn burst_average(&self) -> Result<i32, ScaleError> {
        if !self.is_running() {
            return Err(ScaleError::Stopped);
        }
        let wanted = self.cfg.burst_samples.max(1);
        // Samples queued before the request may predate a change on the platter.
        while self.burst_rx.try_recv().is_ok() {}
        // Elapsed time is measured on the acquirer's clock; the receive is
        // sliced so a clock that jumps ahead is noticed promptly.
        let timeout = self.cfg.burst_timeout();
        let started = self.clock.now();
        let mut got = Vec::with_capacity(wanted);
        while got.len() < wanted {
            if self.clock.now().saturating_duration_since(started) >= timeout {
                tracing::warn!(got = got.len(), wanted, "calibration burst timed out");
                return Err(ScaleError::BurstTimeout {
                    got: got.len(),
                    wanted,
                });
            }
            match self.burst_rx.recv_timeout(BURST_POLL.min(timeout)) {
                Ok(raw) => got.push(raw),
                Err(xch::RecvTimeoutError::Timeout) => {}
                Err(xch::RecvTimeoutError::Disconnected) => return Err(ScaleError::Stopped),
            }
        }
        mean_i32(&got).ok_or(ScaleError::BurstTimeout { got: 0, wanted })
    }

    /// Stop sampling and release the source. Idempotent; the last weight stays readable.
    pub fn stop(&mut self) {
        if let Some(s) = self.sampler.as_mut()
            && s.is_running()
        {
            s.stop();
            tracing::info!("weight acquisition stopped");
        }
    }
}

impl Drop for WeightAcquirer {
    fn drop(&mut self) {
        self.stop();
    }
}
