//! Exponential smoothing of the expected-label confidence.
//!
//! Damps single-frame classifier noise.  The first sample after a reset
//! is taken as-is so the estimate doesn't ramp up from zero.

/// Default weight given to the running estimate.
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.8;

/// Running EMA of one label's probability.
#[derive(Debug, Clone)]
pub struct ConfidenceSmoother {
    /// Weight of history (0.0 = no smoothing, close to 1.0 = very slow).
    alpha: f64,
    /// Current estimate; 0.0 means "no samples yet".
    smoothed: f64,
}

impl ConfidenceSmoother {
    /// Create a smoother.  `alpha` is clamped to [0, 1].
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            smoothed: 0.0,
        }
    }

    /// Feed one raw confidence sample and return the updated estimate.
    pub fn update(&mut self, raw_confidence: f64) -> f64 {
        let raw = if raw_confidence.is_nan() {
            0.0
        } else {
            raw_confidence.clamp(0.0, 1.0)
        };

        self.smoothed = if self.smoothed == 0.0 {
            raw
        } else {
            self.smoothed * self.alpha + raw * (1.0 - self.alpha)
        };
        self.smoothed
    }

    /// Current estimate without feeding a sample.
    pub fn value(&self) -> f64 {
        self.smoothed
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.smoothed = 0.0;
    }
}

impl Default for ConfidenceSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_ALPHA)
    }
}
