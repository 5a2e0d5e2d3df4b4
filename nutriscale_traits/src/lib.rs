//! Capability seams shared by the scale stack.
//!
//! Every piece of hardware the appliance talks to sits behind one of these
//! traits so the core can be driven by the real device, a simulated variant,
//! or a test double without knowing which.
pub mod abort;
pub mod clock;
pub mod frame;

pub use abort::AbortSignal;
pub use clock::{Clock, MonotonicClock};
pub use frame::{Candidate, Frame};

/// Error type crossing the trait boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raw load-cell ADC access.
pub trait SignalSource {
    /// Read one raw signed sample, waiting at most `timeout` for the converter.
    fn read(&mut self, timeout: std::time::Duration) -> Result<i32, BoxError>;

    /// Release the device (power down, free pins). Called once sampling stops.
    fn shutdown(&mut self) {}
}

/// Still-image capture.
pub trait Camera {
    /// Capture one RGB frame. Implementations poll `abort` while waiting on the
    /// device and give up promptly once it is raised.
    fn capture(&mut self, abort: &AbortSignal) -> Result<Frame, BoxError>;

    /// Start a live preview, if the backend has one.
    fn start_preview(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Stop a running preview; no-op when none is running.
    fn stop_preview(&mut self) {}
}

/// Opaque image classifier.
pub trait Classifier {
    /// Return up to `top_k` candidates ordered by descending confidence.
    /// Long-running implementations check `abort` and bail out once raised.
    fn classify(
        &mut self,
        frame: &Frame,
        top_k: usize,
        abort: &AbortSignal,
    ) -> Result<Vec<Candidate>, BoxError>;
}

/// Raw model runtime: one score per class for a preprocessed input tensor.
pub trait ScoreModel {
    fn scores(&mut self, input: &[f32], abort: &AbortSignal) -> Result<Vec<f32>, BoxError>;
}

impl<S: SignalSource + ?Sized> SignalSource for Box<S> {
    fn read(&mut self, timeout: std::time::Duration) -> Result<i32, BoxError> {
        (**self).read(timeout)
    }
    fn shutdown(&mut self) {
        (**self).shutdown();
    }
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn capture(&mut self, abort: &AbortSignal) -> Result<Frame, BoxError> {
        (**self).capture(abort)
    }
    fn start_preview(&mut self) -> Result<(), BoxError> {
        (**self).start_preview()
    }
    fn stop_preview(&mut self) {
        (**self).stop_preview();
    }
}

impl<K: Classifier + ?Sized> Classifier for Box<K> {
    fn classify(
        &mut self,
        frame: &Frame,
        top_k: usize,
        abort: &AbortSignal,
    ) -> Result<Vec<Candidate>, BoxError> {
        (**self).classify(frame, top_k, abort)
    }
}

impl<M: ScoreModel + ?Sized> ScoreModel for Box<M> {
    fn scores(&mut self, input: &[f32], abort: &AbortSignal) -> Result<Vec<f32>, BoxError> {
        (**self).scores(input, abort)
    }
}
