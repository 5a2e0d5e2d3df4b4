//! Still-capture backends: the Raspberry Pi camera CLI and a simulated camera.
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use nutriscale_traits::{AbortSignal, BoxError, Camera, Frame};
use tracing::{debug, info, warn};

use crate::error::{HwError, Result};
use crate::util::poll_until;

/// Geometry and timing shared by both camera backends.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    /// Counter-clockwise rotation applied after capture: 0, 90, 180 or 270.
    pub rotation: u16,
    /// Exposure/white-balance settle time handed to the still command.
    pub warmup_ms: u64,
    /// Where the still command writes its JPEG.
    pub capture_path: PathBuf,
    /// Upper bound on a single still-command run.
    pub max_capture: Duration,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            rotation: 0,
            warmup_ms: 200,
            capture_path: std::env::temp_dir().join("nutriscale_capture.jpg"),
            max_capture: Duration::from_secs(10),
        }
    }
}

const CLI_TOOLS: [(&str, &str); 2] = [
    ("rpicam-still", "rpicam-vid"),
    ("libcamera-still", "libcamera-vid"),
];

/// Camera driven through `rpicam-still` (or the older `libcamera-still`).
pub struct CliCamera {
    still_cmd: &'static str,
    vid_cmd: &'static str,
    settings: CameraSettings,
    preview: Option<Child>,
}

impl CliCamera {
    /// Find a usable still-capture tool on `PATH`.
    pub fn probe(settings: CameraSettings) -> Result<Self> {
        for (still, vid) in CLI_TOOLS {
            let ok = Command::new(still)
                .arg("--help")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            if ok {
                info!(tool = still, "camera cli found");
                return Ok(Self {
                    still_cmd: still,
                    vid_cmd: vid,
                    settings,
                    preview: None,
                });
            }
            debug!(tool = still, "camera cli not usable");
        }
        Err(HwError::CameraUnavailable(
            "neither rpicam-still nor libcamera-still is available".into(),
        ))
    }

    pub fn tool(&self) -> &'static str {
        self.still_cmd
    }

    fn still_args(&self) -> Vec<String> {
        let s = &self.settings;
        vec![
            "-n".into(),
            "-t".into(),
            s.warmup_ms.to_string(),
            "--width".into(),
            s.width.to_string(),
            "--height".into(),
            s.height.to_string(),
            "-o".into(),
            s.capture_path.display().to_string(),
        ]
    }

    fn run_still(&mut self, abort: &AbortSignal) -> Result<()> {
        let mut child = Command::new(self.still_cmd)
            .args(self.still_args())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let mut status = None;
        let waited = poll_until(
            || {
                status = child.try_wait()?;
                Ok(status.is_some())
            },
            Some(abort),
            self.settings.max_capture,
            Duration::from_millis(10),
        );
        if let Err(e) = waited {
            // Aborted or overran: the still process must not outlive the stage.
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
        match status {
            Some(s) if s.success() => Ok(()),
            Some(s) => Err(HwError::Capture(format!("{} exited with {s}", self.still_cmd))),
            None => Err(HwError::Capture(format!("{} did not finish", self.still_cmd))),
        }
    }
}

impl Camera for CliCamera {
    fn capture(&mut self, abort: &AbortSignal) -> std::result::Result<Frame, BoxError> {
        // The sensor is exclusive; a running preview would make the still fail.
        self.stop_preview();
        self.run_still(abort)?;
        if abort.is_raised() {
            return Err(Box::new(HwError::Aborted));
        }
        let img = image::open(&self.settings.capture_path)
            .map_err(|e| HwError::Decode(e.to_string()))?;
        Ok(to_frame(img, self.settings.rotation)?)
    }

    fn start_preview(&mut self) -> std::result::Result<(), BoxError> {
        if self.preview.is_some() {
            return Ok(());
        }
        let child = Command::new(self.vid_cmd)
            .args([
                "-t".to_string(),
                "0".to_string(),
                "--width".to_string(),
                self.settings.width.to_string(),
                "--height".to_string(),
                self.settings.height.to_string(),
                "--fullscreen".to_string(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(HwError::from)?;
        info!(pid = child.id(), "camera preview started");
        self.preview = Some(child);
        Ok(())
    }

    fn stop_preview(&mut self) {
        if let Some(mut child) = self.preview.take() {
            if let Err(e) = child.kill() {
                warn!(error = %e, "failed to stop camera preview");
            }
            let _ = child.wait();
            info!("camera preview stopped");
        }
    }
}

impl Drop for CliCamera {
    fn drop(&mut self) {
        self.stop_preview();
        let _ = std::fs::remove_file(&self.settings.capture_path);
    }
}

/// Convert a decoded image into a packed RGB frame, applying rotation.
pub fn to_frame(img: image::DynamicImage, rotation: u16) -> Result<Frame> {
    let img = match rotation {
        90 => img.rotate270(),
        180 => img.rotate180(),
        270 => img.rotate90(),
        _ => img,
    };
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width(), rgb.height());
    Frame::from_rgb(w, h, rgb.into_raw())
        .ok_or_else(|| HwError::Decode(format!("buffer does not match {w}x{h}")))
}

/// Camera stand-in that renders a fixed gradient test pattern.
#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    width: u32,
    height: u32,
}

impl SimulatedCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Vertical blue-to-pink gradient.
    pub fn pattern(&self) -> Option<Frame> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut rgb = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            let t = y as f32 / h as f32;
            let px = [
                (100.0 + t * 155.0) as u8,
                (50.0 + t * 100.0) as u8,
                (200.0 - t * 50.0) as u8,
            ];
            for _ in 0..w {
                rgb.extend_from_slice(&px);
            }
        }
        Frame::from_rgb(self.width, self.height, rgb)
    }
}

impl Camera for SimulatedCamera {
    fn capture(&mut self, abort: &AbortSignal) -> std::result::Result<Frame, BoxError> {
        if abort.is_raised() {
            return Err(Box::new(HwError::Aborted));
        }
        debug!(width = self.width, height = self.height, "simulated capture");
        self.pattern()
            .ok_or_else(|| HwError::Capture("test pattern size overflow".into()).into())
    }
}
