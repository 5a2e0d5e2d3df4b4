use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use nutriscale_traits::{BoxError, SignalSource};

use crate::Hx711Pins;
use crate::error::{HwError, Result};
use crate::util::wait_until_low_with_timeout;

/// Bit-banged HX711 24-bit load-cell converter.
pub struct Hx711 {
    dt: rppal::gpio::InputPin,
    sck: rppal::gpio::OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
}

impl Hx711 {
    pub fn new(
        dt_pin: rppal::gpio::InputPin,
        mut sck_pin: rppal::gpio::OutputPin,
        gain_pulses: u8,
    ) -> Self {
        sck_pin.set_low(); // clock idle low, also powers the chip up
        Self {
            dt: dt_pin,
            sck: sck_pin,
            gain_pulses,
        }
    }

    /// Block until DT goes low (conversion ready) or `timeout` passes.
    pub fn wait_ready(&self, timeout: Duration) -> Result<()> {
        wait_until_low_with_timeout(|| self.dt.is_high(), timeout, Duration::from_micros(200))
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        let deadline = Instant::now() + timeout;
        while self.dt.is_high() {
            if Instant::now() >= deadline {
                return Err(HwError::Timeout);
            }
            std::thread::sleep(Duration::from_micros(200));
        }

        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Extra pulses select gain/channel for the next conversion
        for _ in 0..self.gain_pulses.saturating_sub(24) {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Sign extend 24-bit
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }

    /// SCK held high for more than 60 µs puts the chip in power-down.
    pub fn power_down(&mut self) {
        self.sck.set_low();
        self.sck.set_high();
        std::thread::sleep(Duration::from_micros(100));
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}

/// HX711 exposed as a `SignalSource`, retrying per-read timeouts a few times.
pub struct Hx711Source {
    hx711: Hx711,
    max_attempts: u8,
    powered_down: bool,
}

impl Hx711Source {
    /// Claim the pins and wait up to `probe_timeout` for a first conversion.
    ///
    /// A chip that never signals data-ready is reported as `NotReady` so the
    /// caller can fall back to simulation.
    pub fn open(pins: &Hx711Pins, probe_timeout: Duration) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(pins.dt)
            .map_err(|e| HwError::Gpio(format!("open hx711 dt pin {}: {e}", pins.dt)))?
            .into_input();
        let sck = gpio
            .get(pins.sck)
            .map_err(|e| HwError::Gpio(format!("open hx711 sck pin {}: {e}", pins.sck)))?
            .into_output();
        let hx711 = Hx711::new(dt, sck, pins.gain_pulses);
        debug!(dt = pins.dt, sck = pins.sck, "probing hx711");
        hx711.wait_ready(probe_timeout).map_err(|e| match e {
            HwError::DataReadyTimeout => HwError::NotReady(probe_timeout.as_millis() as u64),
            other => other,
        })?;
        Ok(Self {
            hx711,
            max_attempts: 3,
            powered_down: false,
        })
    }
}

impl SignalSource for Hx711Source {
    fn read(&mut self, timeout: Duration) -> std::result::Result<i32, BoxError> {
        let mut attempts = 0;
        loop {
            match self.hx711.read_with_timeout(timeout) {
                Ok(raw) => return Ok(raw),
                Err(HwError::Timeout) if attempts < self.max_attempts => {
                    attempts += 1;
                    warn!(retries = attempts, "scale timeout, retrying");
                }
                Err(e) => return Err(Box::new(e)),
            }
        }
    }

    fn shutdown(&mut self) {
        if !self.powered_down {
            self.hx711.power_down();
            self.powered_down = true;
            debug!("hx711 powered down");
        }
    }
}
