//! Punch speed estimator.
//!
//! Integrates forward (x axis) acceleration into velocity with the
//! trapezoidal rule and ends the session at the first local maximum of
//! |velocity|, or when the session timeout fires.
//!
//! Session lifecycle:
//!
//! ```text
//! Idle --start--> Measuring --decay--> Idle (reported)
//!                           --timeout-> Idle (reported)
//!                           --error---> Idle (silent)
//! ```
//!
//! Every exit cancels the timeout and detaches from the sample stream before
//! the observer runs.

use core::fmt;

use log::{debug, error, info, warn};

use crate::{
    config::{MeterConfig, DEFAULT_PUNCH_THRESHOLD, DEFAULT_TIMEOUT_MS},
    sample::Sample,
    timer::OneShotTimer,
};

const KM_PER_HOUR_PER_MPS: f32 = 3.6;

/// Convert m/s to whole km/h.
#[inline]
pub fn to_kmh(speed_mps: f32) -> u32 {
    libm::roundf(speed_mps * KM_PER_HOUR_PER_MPS) as u32
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IntegrationState {
    pub last_velocity: f32,
    pub last_accel_x: f32,
    pub last_timestamp_ms: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PeakTracker {
    pub max_speed: f32,
    pub threshold_crossed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimatorState {
    Idle,
    Measuring,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// Speed dropped below the best value seen.
    Decay,
    Timeout,
    /// Sensor fault or external stop; nothing was reported.
    Aborted,
}

/// Final state of a reported session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionReport {
    pub end: SessionEnd,
    /// Peak speed in m/s.
    pub max_speed: f32,
    pub speed_kmh: u32,
    /// Readings integrated during the session.
    pub samples: u32,
    pub punch_detected: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartError {
    NoInitialSample,
    AlreadyMeasuring,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::NoInitialSample => f.write_str("accelerometer must have initial values"),
            StartError::AlreadyMeasuring => f.write_str("already measuring"),
        }
    }
}

/// Outcome of feeding one reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Flow {
    /// Estimator is idle; the reading was not consumed.
    Ignored,
    Continue,
    Finished(SessionReport),
}

/// Receives session notifications.
pub trait SessionObserver {
    fn on_result(&mut self, report: &SessionReport);

    /// Fired once per session when speed first reaches the punch threshold.
    fn on_punch_detected(&mut self) {}
}

/// Closure adapter for [`SessionObserver`].
pub struct Callbacks<R, P = fn()> {
    on_result: R,
    on_punch_detected: Option<P>,
}

impl<R> Callbacks<R, fn()>
where
    R: FnMut(&SessionReport),
{
    pub fn new(on_result: R) -> Self {
        Self {
            on_result,
            on_punch_detected: None,
        }
    }
}

impl<R, P> Callbacks<R, P> {
    pub fn with_punch_detected<P2: FnMut()>(self, on_punch_detected: P2) -> Callbacks<R, P2> {
        Callbacks {
            on_result: self.on_result,
            on_punch_detected: Some(on_punch_detected),
        }
    }
}

impl<R, P> SessionObserver for Callbacks<R, P>
where
    R: FnMut(&SessionReport),
    P: FnMut(),
{
    fn on_result(&mut self, report: &SessionReport) {
        (self.on_result)(report)
    }

    fn on_punch_detected(&mut self) {
        if let Some(f) = self.on_punch_detected.as_mut() {
            f()
        }
    }
}

pub struct SpeedEstimator<O> {
    observer: O,
    punch_threshold: f32,
    timeout_ms: u64,
    state: EstimatorState,
    integration: IntegrationState,
    peak: PeakTracker,
    timeout: OneShotTimer,
    samples: u32,
    last_end: Option<SessionEnd>,
}

impl<O: SessionObserver> SpeedEstimator<O> {
    pub fn new(observer: O, punch_threshold: f32, timeout_ms: u64) -> Self {
        Self {
            observer,
            punch_threshold,
            timeout_ms,
            state: EstimatorState::Idle,
            integration: IntegrationState::default(),
            peak: PeakTracker::default(),
            timeout: OneShotTimer::new(),
            samples: 0,
            last_end: None,
        }
    }

    pub fn with_default_timeout(observer: O) -> Self {
        Self::new(observer, DEFAULT_PUNCH_THRESHOLD, DEFAULT_TIMEOUT_MS)
    }

    pub fn from_config(observer: O, config: &MeterConfig) -> Self {
        Self::new(observer, config.punch_threshold, config.timeout_ms)
    }

    /// Begin a session seeded from `latest`, the most recent reading.
    ///
    /// Rejections are logged and leave every field untouched.
    pub fn start(&mut self, latest: Option<&Sample>, now_ms: u64) -> Result<(), StartError> {
        let Some(seed) = latest else {
            error!("estimator: {}", StartError::NoInitialSample);
            return Err(StartError::NoInitialSample);
        };
        if self.state == EstimatorState::Measuring {
            error!("estimator: {}", StartError::AlreadyMeasuring);
            return Err(StartError::AlreadyMeasuring);
        }

        self.state = EstimatorState::Measuring;
        self.peak = PeakTracker::default();
        self.integration = IntegrationState {
            last_velocity: 0.0,
            last_accel_x: seed.x,
            last_timestamp_ms: seed.timestamp_ms,
        };
        self.samples = 0;
        self.timeout.arm(now_ms, self.timeout_ms);
        debug!(
            "estimator: session started at t={} ms, timeout {} ms",
            seed.timestamp_ms, self.timeout_ms
        );
        Ok(())
    }

    pub fn on_reading(&mut self, sample: &Sample) -> Flow {
        if self.state != EstimatorState::Measuring {
            return Flow::Ignored;
        }
        self.samples = self.samples.saturating_add(1);

        let last = self.integration;
        let dt = sample.elapsed_secs_since(last.last_timestamp_ms);
        let velocity = last.last_velocity + ((sample.x + last.last_accel_x) / 2.0) * dt;
        let speed = libm::fabsf(velocity);

        if speed > self.peak.max_speed && speed >= self.punch_threshold {
            self.peak.max_speed = speed;
            if !self.peak.threshold_crossed {
                self.peak.threshold_crossed = true;
                info!("estimator: punch detected ({} m/s)", speed);
                self.observer.on_punch_detected();
            }
        }

        // First local maximum of |v|: the best value seen now beats this sample.
        if self.peak.max_speed > speed {
            return Flow::Finished(self.finish(SessionEnd::Decay));
        }

        self.integration = IntegrationState {
            last_velocity: velocity,
            last_accel_x: sample.x,
            last_timestamp_ms: sample.timestamp_ms,
        };
        Flow::Continue
    }

    /// Drive the session timeout. Reports whatever peak has accumulated.
    pub fn poll_timeout(&mut self, now_ms: u64) -> Option<SessionReport> {
        if !self.timeout.fire(now_ms) {
            return None;
        }
        if self.state != EstimatorState::Measuring {
            return None;
        }
        Some(self.finish(SessionEnd::Timeout))
    }

    /// Sensor fault: abort without reporting.
    pub fn on_error(&mut self) {
        if self.state == EstimatorState::Measuring {
            warn!("estimator: sensor error, session aborted");
            self.abort();
        }
    }

    /// External stop control; same as a silent abort.
    pub fn stop(&mut self) {
        if self.state == EstimatorState::Measuring {
            debug!("estimator: session stopped");
            self.abort();
        }
    }

    /// Peak speed in whole km/h.
    #[inline]
    pub fn result(&self) -> u32 {
        to_kmh(self.peak.max_speed)
    }

    #[inline]
    pub fn state(&self) -> EstimatorState {
        self.state
    }

    #[inline]
    pub fn is_measuring(&self) -> bool {
        self.state == EstimatorState::Measuring
    }

    pub fn max_speed(&self) -> f32 {
        self.peak.max_speed
    }

    /// Velocity after the last accepted reading.
    pub fn velocity(&self) -> f32 {
        self.integration.last_velocity
    }

    pub fn punch_detected(&self) -> bool {
        self.peak.threshold_crossed
    }

    pub fn integration(&self) -> &IntegrationState {
        &self.integration
    }

    pub fn peak(&self) -> &PeakTracker {
        &self.peak
    }

    pub fn last_end(&self) -> Option<SessionEnd> {
        self.last_end
    }

    pub fn timeout_armed(&self) -> bool {
        self.timeout.is_armed()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    fn detach(&mut self, end: SessionEnd) {
        self.state = EstimatorState::Idle;
        self.timeout.cancel();
        self.last_end = Some(end);
    }

    fn abort(&mut self) {
        self.detach(SessionEnd::Aborted);
    }

    fn finish(&mut self, end: SessionEnd) -> SessionReport {
        self.detach(end);
        let report = SessionReport {
            end,
            max_speed: self.peak.max_speed,
            speed_kmh: self.result(),
            samples: self.samples,
            punch_detected: self.peak.threshold_crossed,
        };
        info!(
            "estimator: session ended ({:?}), {} km/h over {} samples",
            end, report.speed_kmh, report.samples
        );
        self.observer.on_result(&report);
        report
    }
}
