//! Linear acceleration sample source.
//!
//! Wraps any raw accelerometer behind [`AccelSource`], paces reads at the
//! configured frequency, strips gravity and turns the result into the
//! notifications the meter consumes: `Activated` once sampling begins,
//! `Reading` per sample and `Error` when the device faults.

use core::fmt::Debug;

use heapless::Vec;
use log::{debug, warn};

use crate::{config::MeterConfig, gravity::GravityFilter, sample::Sample};

/// Raw accelerometer, m/s² with gravity included.
pub trait AccelSource {
    type Error: Debug;

    fn read_accel(&mut self) -> Result<[f32; 3], Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorEvent {
    Activated,
    Reading(Sample),
    Error,
}

/// Events produced by one `poll`: at most an activation and a reading.
pub type SensorEvents = Vec<SensorEvent, 2>;

pub struct LinearAccelerationSensor<S> {
    source: S,
    gravity: GravityFilter,
    period_ms: f64,
    next_read_ms: f64,
    latest: Option<Sample>,
    running: bool,
    activated: bool,
}

impl<S: AccelSource> LinearAccelerationSensor<S> {
    pub fn new(source: S, config: &MeterConfig) -> Self {
        Self {
            source,
            gravity: GravityFilter::from_config(config),
            period_ms: config.sample_period_ms(),
            next_read_ms: 0.0,
            latest: None,
            running: false,
            activated: false,
        }
    }

    /// Begin sampling. `Activated` follows with the first good reading.
    pub fn start(&mut self, now_ms: f64) {
        self.running = true;
        self.activated = false;
        self.next_read_ms = now_ms;
        self.gravity.reset();
        debug!("sensor: started, period {} ms", self.period_ms);
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Most recent reading, `None` until the first one arrives.
    pub fn latest(&self) -> Option<Sample> {
        self.latest
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn poll(&mut self, now_ms: f64) -> SensorEvents {
        let mut events = SensorEvents::new();
        if !self.running || now_ms < self.next_read_ms {
            return events;
        }

        self.next_read_ms += self.period_ms;
        if self.next_read_ms <= now_ms {
            // Fell behind (slow loop iteration); resync instead of bursting.
            self.next_read_ms = now_ms + self.period_ms;
        }

        let raw = match self.source.read_accel() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("sensor: read failed: {:?}", e);
                self.running = false;
                let _ = events.push(SensorEvent::Error);
                return events;
            }
        };

        let [x, y, z] = self.gravity.update(raw);
        let sample = Sample::new(x, y, z, now_ms);
        self.latest = Some(sample);

        if !self.activated {
            self.activated = true;
            let _ = events.push(SensorEvent::Activated);
        }
        let _ = events.push(SensorEvent::Reading(sample));
        events
    }
}
