//! Meter tunables.
//!
//! Defaults are tuned for a wrist-worn QMI8658 sampled at 60 Hz. Every
//! threshold is in SI units (m/s² for acceleration, m/s for speed).

use core::fmt;

/// Standard gravity, m/s².
pub const STANDARD_GRAVITY: f32 = 9.80665;

// Shake level used by the arming gesture: roughly three g.
pub const DEFAULT_SHAKE_THRESHOLD: f32 = 3.0 * 9.8;
pub const DEFAULT_STILL_THRESHOLD: f32 = 1.0;
pub const DEFAULT_PUNCH_THRESHOLD: f32 = 3.0; // m/s
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_COOLDOWN_MS: u64 = 1_000;
pub const DEFAULT_FREQUENCY_HZ: u32 = 60;
pub const DEFAULT_GRAVITY_ALPHA: f32 = 0.02;
pub const DEFAULT_GRAVITY_WINDOW: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeterConfig {
    /// Linear acceleration magnitude that counts as a shake.
    pub shake_threshold: f32,
    /// Linear acceleration magnitude below which the arm counts as still.
    pub still_threshold: f32,
    /// Minimum speed before a sample can register as a peak.
    pub punch_threshold: f32,
    /// Session timeout when no velocity peak is observed.
    pub timeout_ms: u64,
    /// Delay between a reported result and re-arming the gate.
    pub cooldown_ms: u64,
    /// Sensor sampling frequency.
    pub frequency_hz: u32,
    /// Low-pass coefficient of the gravity estimate.
    pub gravity_alpha: f32,
    /// Gravity is only tracked while `| |raw| - g |` stays inside this window.
    pub gravity_window: f32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            shake_threshold: DEFAULT_SHAKE_THRESHOLD,
            still_threshold: DEFAULT_STILL_THRESHOLD,
            punch_threshold: DEFAULT_PUNCH_THRESHOLD,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            gravity_alpha: DEFAULT_GRAVITY_ALPHA,
            gravity_window: DEFAULT_GRAVITY_WINDOW,
        }
    }
}

impl MeterConfig {
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    pub fn with_frequency_hz(mut self, frequency_hz: u32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    /// Nominal spacing between samples. Readings are never assumed to arrive
    /// exactly on this grid.
    pub fn sample_period_ms(&self) -> f64 {
        1000.0 / self.frequency_hz.max(1) as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for value in [
            self.shake_threshold,
            self.still_threshold,
            self.punch_threshold,
            self.gravity_window,
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositiveThreshold);
            }
        }
        if self.still_threshold >= self.shake_threshold {
            return Err(ConfigError::StillAboveShake);
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.frequency_hz == 0 {
            return Err(ConfigError::ZeroFrequency);
        }
        if !(self.gravity_alpha > 0.0 && self.gravity_alpha <= 1.0) {
            return Err(ConfigError::GravityAlphaOutOfRange);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    NonPositiveThreshold,
    StillAboveShake,
    ZeroTimeout,
    ZeroFrequency,
    GravityAlphaOutOfRange,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositiveThreshold => f.write_str("thresholds must be positive and finite"),
            ConfigError::StillAboveShake => {
                f.write_str("still threshold must be below the shake threshold")
            }
            ConfigError::ZeroTimeout => f.write_str("session timeout must be non-zero"),
            ConfigError::ZeroFrequency => f.write_str("sampling frequency must be non-zero"),
            ConfigError::GravityAlphaOutOfRange => f.write_str("gravity alpha must be in (0, 1]"),
        }
    }
}
