//! Sensor backends behind one capability trait.
//!
//! Real pad hardware (USB/CAN wire protocols) lives outside this crate; the
//! daemon talks to whatever implements `SensorDriver`. The bundled backend
//! is a simulator good enough to exercise the whole pipeline.

use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;

use crate::frame::{PressureFrame, gaussian_bump};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver is not connected")]
    NotConnected,
    #[error("failed to open sensor port {port}: {reason}")]
    Open { port: String, reason: String },
}

/// Capability every pad backend provides.
pub trait SensorDriver: Send {
    fn connect(&mut self, port: &str) -> Result<(), DriverError>;
    fn disconnect(&mut self);
    /// Next unseen frame, if one arrived since the last call.
    fn get(&mut self) -> Result<Option<PressureFrame>, DriverError>;
    /// Most recent frame, regardless of whether it was already seen.
    fn get_last(&self) -> Option<PressureFrame>;
    fn kind(&self) -> &'static str;
}

/// Simulated pressure pad: a Gaussian bump random-walking over the field,
/// with additive noise and occasional lift-offs.
pub struct SimulatedPad {
    connected: bool,
    rows: usize,
    cols: usize,
    center: (f32, f32),
    touching: bool,
    last: Option<PressureFrame>,
    rng: StdRng,
}

impl SimulatedPad {
    pub fn new() -> Self {
        Self {
            connected: false,
            rows: 64,
            cols: 64,
            center: (32.0, 32.0),
            touching: true,
            last: None,
            rng: StdRng::from_entropy(),
        }
    }

    fn generate(&mut self) -> PressureFrame {
        // 10% chance per frame of toggling touch state
        if self.rng.gen_range(0.0..1.0f32) < 0.1 {
            self.touching = !self.touching;
        }
        if !self.touching {
            return PressureFrame::zeros(self.rows, self.cols);
        }

        let (mut cy, mut cx) = self.center;
        cy = (cy + self.rng.gen_range(-0.3..0.3)).clamp(5.0, self.rows as f32 - 5.0);
        cx = (cx + self.rng.gen_range(-0.3..0.3)).clamp(5.0, self.cols as f32 - 5.0);
        self.center = (cy, cx);

        let clean = gaussian_bump(self.rows, self.cols, cy, cx, 3.0, 0.8);
        let mut noisy = clean.data().clone();
        for v in noisy.iter_mut() {
            *v = (*v + self.rng.gen_range(-0.01..0.01)).max(0.0);
        }
        PressureFrame::new(noisy)
    }
}

impl Default for SimulatedPad {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDriver for SimulatedPad {
    fn connect(&mut self, _port: &str) -> Result<(), DriverError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.last = None;
    }

    fn get(&mut self) -> Result<Option<PressureFrame>, DriverError> {
        if !self.connected {
            return Err(DriverError::NotConnected);
        }
        let frame = self.generate();
        self.last = Some(frame.clone());
        Ok(Some(frame))
    }

    fn get_last(&self) -> Option<PressureFrame> {
        self.last.clone()
    }

    fn kind(&self) -> &'static str {
        "simulated"
    }
}
