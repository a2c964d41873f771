//! Top-level punch meter flow.
//!
//! `PunchMeter` owns everything that used to be ambient state: the arming
//! gate, the speed estimator and the cooldown timer. It routes every sensor
//! notification to exactly one listener:
//!
//! ```text
//! Inactive --activated--> Arming --armed--> Measuring --result--> Cooldown
//!                            ^                                       |
//!                            +---------------- cooldown -------------+
//! any --sensor error--> Faulted --activated--> Arming
//! ```

use log::{info, warn};

use crate::{
    config::{ConfigError, MeterConfig},
    estimator::{Flow, SessionObserver, SpeedEstimator},
    gate::{ArmingGate, GateStep},
    sample::Sample,
    sensor::SensorEvent,
    timer::OneShotTimer,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Sensor has not reported activation yet.
    Inactive,
    Arming,
    Measuring,
    Cooldown,
    /// Sensor faulted; waiting for it to activate again.
    Faulted,
}

pub struct PunchMeter<O> {
    config: MeterConfig,
    gate: ArmingGate,
    estimator: SpeedEstimator<O>,
    cooldown: OneShotTimer,
    stage: Stage,
}

impl<O: SessionObserver> PunchMeter<O> {
    pub fn new(observer: O, config: MeterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            gate: ArmingGate::from_config(&config),
            estimator: SpeedEstimator::from_config(observer, &config),
            cooldown: OneShotTimer::new(),
            stage: Stage::Inactive,
            config,
        })
    }

    pub fn handle(&mut self, event: &SensorEvent, now_ms: u64) {
        match event {
            SensorEvent::Activated => {
                if matches!(self.stage, Stage::Inactive | Stage::Faulted) {
                    info!("meter: sensor active");
                    self.rearm();
                }
            }
            SensorEvent::Reading(sample) => self.on_reading(sample, now_ms),
            SensorEvent::Error => self.on_error(),
        }
    }

    /// Drive the session timeout and the cooldown.
    pub fn tick(&mut self, now_ms: u64) {
        match self.stage {
            Stage::Measuring => {
                if self.estimator.poll_timeout(now_ms).is_some() {
                    self.enter_cooldown(now_ms);
                }
            }
            Stage::Cooldown => {
                if self.cooldown.fire(now_ms) {
                    self.rearm();
                }
            }
            Stage::Inactive | Stage::Arming | Stage::Faulted => {}
        }
    }

    /// User stop: drop the running session without a result and re-arm.
    pub fn cancel(&mut self) {
        match self.stage {
            Stage::Measuring | Stage::Cooldown => {
                self.estimator.stop();
                self.cooldown.cancel();
                self.rearm();
            }
            Stage::Arming => self.rearm(),
            Stage::Inactive | Stage::Faulted => {}
        }
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn gate(&self) -> &ArmingGate {
        &self.gate
    }

    pub fn estimator(&self) -> &SpeedEstimator<O> {
        &self.estimator
    }

    pub fn observer_mut(&mut self) -> &mut O {
        self.estimator.observer_mut()
    }

    fn on_reading(&mut self, sample: &Sample, now_ms: u64) {
        match self.stage {
            Stage::Arming => {
                if self.gate.on_reading(sample) == GateStep::Armed {
                    // Gate already detached; hand the stream to the estimator.
                    match self.estimator.start(Some(sample), now_ms) {
                        Ok(()) => self.stage = Stage::Measuring,
                        Err(_) => self.rearm(),
                    }
                }
            }
            Stage::Measuring => {
                if let Flow::Finished(_) = self.estimator.on_reading(sample) {
                    self.enter_cooldown(now_ms);
                }
            }
            Stage::Inactive | Stage::Cooldown | Stage::Faulted => {}
        }
    }

    fn on_error(&mut self) {
        warn!("meter: cannot fetch data from sensor");
        match self.stage {
            Stage::Arming => self.gate.on_error(),
            Stage::Measuring => self.estimator.on_error(),
            Stage::Cooldown => self.cooldown.cancel(),
            Stage::Inactive | Stage::Faulted => {}
        }
        self.stage = Stage::Faulted;
    }

    fn enter_cooldown(&mut self, now_ms: u64) {
        self.cooldown.arm(now_ms, self.config.cooldown_ms);
        self.stage = Stage::Cooldown;
    }

    fn rearm(&mut self) {
        self.gate.activate();
        self.stage = Stage::Arming;
    }
}
