#![cfg(all(feature = "hardware", target_os = "linux"))]

use std::time::Duration;

use nutriscale_hardware::{Hx711Pins, open_hx711};
use nutriscale_traits::SignalSource;

// These only mean something on a Pi with an HX711 wired to the pins below.
// On an unwired rig the probe must fail fast with an "unavailable" error
// instead of hanging.

const PINS: Hx711Pins = Hx711Pins {
    dt: 5,
    sck: 6,
    gain_pulses: 25,
};

#[test]
fn hx711_open_or_report_unavailable() {
    match open_hx711(&PINS, Duration::from_millis(50)) {
        Ok(mut source) => {
            let _ = source.read(Duration::from_millis(150));
            source.shutdown();
        }
        Err(e) => assert!(e.is_unavailable(), "unexpected error: {e}"),
    }
}
