/// One timestamped linear acceleration reading.
///
/// Axes are in m/s² with gravity removed. `timestamp_ms` is monotonic and
/// kept as f64: an f32 millisecond clock loses sub-millisecond resolution
/// after a few hours of uptime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub timestamp_ms: f64,
}

impl Sample {
    pub const fn new(x: f32, y: f32, z: f32, timestamp_ms: f64) -> Self {
        Self { x, y, z, timestamp_ms }
    }

    #[inline]
    pub fn magnitude(&self) -> f32 {
        libm::sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }

    /// Seconds elapsed since `earlier_ms`. Equal timestamps give zero.
    #[inline]
    pub fn elapsed_secs_since(&self, earlier_ms: f64) -> f32 {
        ((self.timestamp_ms - earlier_ms) * 0.001) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_is_euclidean() {
        let s = Sample::new(3.0, 4.0, 12.0, 0.0);
        assert!((s.magnitude() - 13.0).abs() < 1e-5);
    }

    #[test]
    fn elapsed_uses_actual_spacing() {
        let s = Sample::new(0.0, 0.0, 0.0, 1_016.5);
        assert!((s.elapsed_secs_since(1_000.0) - 0.0165).abs() < 1e-6);
        assert_eq!(s.elapsed_secs_since(1_016.5), 0.0);
    }
}
