//! Pipeline configuration and validation.

use crate::error::ConfigError;
use crate::gesture::hold::{
    derived_keep_threshold, HoldConfig, DEFAULT_HOLD_DURATION_MS, DEFAULT_START_THRESHOLD,
};
use crate::gesture::smoothing::DEFAULT_SMOOTHING_ALPHA;

/// Tunables for one detection session.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Smoothed confidence needed to begin a hold.
    pub start_threshold: f64,
    /// Smoothed confidence needed to keep a hold.  `None` derives
    /// `max(0.5, start_threshold - 0.1)`.
    pub keep_threshold: Option<f64>,
    /// EMA weight on history.
    pub smoothing_alpha: f64,
    /// Time (ms) a hold must last before it is confirmed.
    pub hold_duration_ms: f64,
    /// Gate holds on the per-label hand-count policy.
    pub hand_count_policy_enabled: bool,
    /// Also classify the mirrored pose and keep the better orientation.
    pub evaluate_mirrored: bool,
    /// Time (ms) after a confirmation before a new hold may start.
    pub confirm_cooldown_ms: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::lesson()
    }
}

impl PipelineConfig {
    /// Guided lesson: 3 second hold.
    pub fn lesson() -> Self {
        Self {
            start_threshold: DEFAULT_START_THRESHOLD,
            keep_threshold: None,
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
            hold_duration_ms: DEFAULT_HOLD_DURATION_MS,
            hand_count_policy_enabled: false,
            evaluate_mirrored: true,
            confirm_cooldown_ms: 0.0,
        }
    }

    /// Timed quiz: shorter hold.
    pub fn quiz() -> Self {
        Self {
            hold_duration_ms: 2000.0,
            ..Self::lesson()
        }
    }

    /// Quick review round: shortest hold.
    pub fn review() -> Self {
        Self {
            hold_duration_ms: 1500.0,
            ..Self::lesson()
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "lesson" => Some(Self::lesson()),
            "quiz" => Some(Self::quiz()),
            "review" => Some(Self::review()),
            _ => None,
        }
    }

    /// Keep threshold in effect, explicit or derived.
    pub fn effective_keep_threshold(&self) -> f64 {
        self.keep_threshold
            .unwrap_or_else(|| derived_keep_threshold(self.start_threshold))
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("start_threshold", self.start_threshold)?;
        let keep = self.effective_keep_threshold();
        check_unit("keep_threshold", keep)?;
        if keep > self.start_threshold {
            return Err(ConfigError::KeepAboveStart {
                keep,
                start: self.start_threshold,
            });
        }
        if !(0.0..1.0).contains(&self.smoothing_alpha) {
            return Err(ConfigError::InvalidAlpha(self.smoothing_alpha));
        }
        check_duration("hold_duration", self.hold_duration_ms)?;
        check_duration("confirm_cooldown", self.confirm_cooldown_ms)?;
        Ok(())
    }

    /// Hold machine settings derived from this config.
    pub fn hold_config(&self) -> HoldConfig {
        HoldConfig {
            start_threshold: self.start_threshold,
            keep_threshold: self.effective_keep_threshold(),
            hold_duration_ms: self.hold_duration_ms,
            cooldown_ms: self.confirm_cooldown_ms,
        }
    }

    /// Generate s-expression for IPC config.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:start-threshold {:.2} :keep-threshold {:.2} :smoothing-alpha {:.2} :hold-duration-ms {:.0} :hand-count-policy {} :evaluate-mirrored {} :confirm-cooldown-ms {:.0})",
            self.start_threshold,
            self.effective_keep_threshold(),
            self.smoothing_alpha,
            self.hold_duration_ms,
            if self.hand_count_policy_enabled { "t" } else { "nil" },
            if self.evaluate_mirrored { "t" } else { "nil" },
            self.confirm_cooldown_ms,
        )
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}

fn check_duration(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDuration { name, value })
    }
}
