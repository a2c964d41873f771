//! Gravity separation for raw accelerometer data.
//!
//! The meter works on linear acceleration. The QMI8658 reports specific
//! force (gravity included), so a slow low-pass estimate of gravity is
//! subtracted from every reading. The estimate only moves while the raw
//! magnitude sits near 1 g, so a shake or a punch does not drag it along.

use crate::config::{MeterConfig, STANDARD_GRAVITY};

#[derive(Clone, Copy, Debug)]
pub struct GravityFilter {
    alpha: f32,
    window: f32,
    gravity: Option<[f32; 3]>,
}

impl GravityFilter {
    pub fn new(alpha: f32, window: f32) -> Self {
        Self {
            alpha,
            window,
            gravity: None,
        }
    }

    pub fn from_config(config: &MeterConfig) -> Self {
        Self::new(config.gravity_alpha, config.gravity_window)
    }

    /// Current gravity estimate, once seeded.
    pub fn gravity(&self) -> Option<[f32; 3]> {
        self.gravity
    }

    pub fn reset(&mut self) {
        self.gravity = None;
    }

    /// Feed one raw reading (m/s²) and return the linear part.
    pub fn update(&mut self, raw: [f32; 3]) -> [f32; 3] {
        if self.gravity.is_none() {
            // Seed from the first reading; the device is assumed at rest.
            self.gravity = Some(raw);
            return [0.0; 3];
        }
        let g = self.gravity.get_or_insert(raw);

        let magnitude = libm::sqrtf(raw[0] * raw[0] + raw[1] * raw[1] + raw[2] * raw[2]);
        if libm::fabsf(magnitude - STANDARD_GRAVITY) <= self.window {
            for i in 0..3 {
                g[i] += self.alpha * (raw[i] - g[i]);
            }
        }

        [raw[0] - g[0], raw[1] - g[1], raw[2] - g[2]]
    }
}
