//! Arming gesture detector: shake hard, then hold still.
//!
//! The gate keeps incidental motion and sensor noise from starting a
//! measurement. It waits without a timeout and arms at most once per
//! activation.

use log::{debug, info};

use crate::{config::MeterConfig, sample::Sample};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateState {
    pub shake_observed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateStep {
    /// Gate is not attached to the sample stream.
    Ignored,
    Waiting,
    ShakeObserved,
    /// Still-after-shake edge seen; the gate has already detached itself.
    Armed,
}

pub struct ArmingGate {
    shake_threshold: f32,
    still_threshold: f32,
    state: GateState,
    active: bool,
}

impl ArmingGate {
    pub fn new(shake_threshold: f32, still_threshold: f32) -> Self {
        Self {
            shake_threshold,
            still_threshold,
            state: GateState::default(),
            active: false,
        }
    }

    pub fn from_config(config: &MeterConfig) -> Self {
        Self::new(config.shake_threshold, config.still_threshold)
    }

    pub fn activate(&mut self) {
        self.state = GateState::default();
        self.active = true;
        debug!("gate: waiting for shake");
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Sensor fault: stop listening. The next `activate` starts over.
    pub fn on_error(&mut self) {
        self.deactivate();
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn shake_observed(&self) -> bool {
        self.state.shake_observed
    }

    pub fn on_reading(&mut self, sample: &Sample) -> GateStep {
        if !self.active {
            return GateStep::Ignored;
        }

        let magnitude = sample.magnitude();
        if magnitude > self.shake_threshold {
            if !self.state.shake_observed {
                debug!("gate: shake observed ({} m/s²)", magnitude);
            }
            self.state.shake_observed = true;
            GateStep::ShakeObserved
        } else if magnitude < self.still_threshold && self.state.shake_observed {
            // Detach before the caller hands the stream to the estimator.
            self.deactivate();
            info!("gate: armed at t={} ms", sample.timestamp_ms);
            GateStep::Armed
        } else {
            GateStep::Waiting
        }
    }
}
