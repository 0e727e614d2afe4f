//! Hold-to-confirm state machine with hysteresis.
//!
//! A hold starts when the classifier's best label matches the expected
//! label with smoothed confidence at or above `start_threshold`, and is
//! kept alive while confidence stays at or above the lower
//! `keep_threshold`.  Once the hold has lasted `hold_duration_ms` it is
//! confirmed.  The timer is a stored deadline checked on every call;
//! cancelling a hold clears it.

use tracing::{debug, info, warn};

/// Default confidence needed to begin a hold.
pub const DEFAULT_START_THRESHOLD: f64 = 0.75;

/// Gap between start and keep thresholds when keep isn't configured.
pub const DEFAULT_HYSTERESIS_GAP: f64 = 0.1;

/// Lowest keep threshold derived from the start threshold.
pub const MIN_DERIVED_KEEP_THRESHOLD: f64 = 0.5;

/// Default hold duration for guided lessons.
pub const DEFAULT_HOLD_DURATION_MS: f64 = 3000.0;

/// Keep threshold derived from a start threshold: `max(0.5, start - 0.1)`.
pub fn derived_keep_threshold(start_threshold: f64) -> f64 {
    (start_threshold - DEFAULT_HYSTERESIS_GAP).max(MIN_DERIVED_KEEP_THRESHOLD)
}

// ── State ──────────────────────────────────────────────────

/// Current hold state.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldState {
    /// No hold in progress.
    Idle,
    /// A hold is active for `label`.
    Holding {
        label: String,
        started_at_ms: f64,
        last_confidence: f64,
    },
}

impl HoldState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Holding { .. } => "holding",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Why an active hold ended without confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Smoothed confidence fell below the keep threshold.
    ConfidenceDropped,
    /// Detected hand count no longer satisfies the label's policy.
    HandCountInvalid,
    /// No hand / no classification this frame.
    LostDetection,
    /// Caller switched to a different target gesture.
    ExpectedLabelChanged,
    /// Detection was stopped (camera disabled).
    Stopped,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfidenceDropped => "confidence-dropped",
            Self::HandCountInvalid => "hand-count-invalid",
            Self::LostDetection => "lost-detection",
            Self::ExpectedLabelChanged => "expected-label-changed",
            Self::Stopped => "stopped",
        }
    }
}

// ── Events ─────────────────────────────────────────────────

/// Transitions reported by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldEvent {
    /// A hold began.
    Started { label: String, confidence: f64 },
    /// An active hold ended early.
    Cancelled {
        label: String,
        reason: CancelReason,
        elapsed_ms: f64,
    },
    /// The hold lasted the full duration.
    Confirmed {
        label: String,
        confidence: f64,
        elapsed_ms: f64,
    },
}

// ── Config ─────────────────────────────────────────────────

/// Thresholds and timing for the hold machine.
#[derive(Debug, Clone)]
pub struct HoldConfig {
    /// Confidence needed to begin a hold.
    pub start_threshold: f64,
    /// Confidence needed to keep an active hold.
    pub keep_threshold: f64,
    /// Time (ms) a hold must last to be confirmed.
    pub hold_duration_ms: f64,
    /// Time (ms) after a confirmation before a new hold may start.
    pub cooldown_ms: f64,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            start_threshold: DEFAULT_START_THRESHOLD,
            keep_threshold: derived_keep_threshold(DEFAULT_START_THRESHOLD),
            hold_duration_ms: DEFAULT_HOLD_DURATION_MS,
            cooldown_ms: 0.0,
        }
    }
}

/// One frame's inputs to the state machine.
#[derive(Debug, Clone, Copy)]
pub struct HoldInput<'a> {
    /// Classifier's top label this frame, if any.
    pub best_label: Option<&'a str>,
    /// The gesture the user is asked to perform.
    pub expected_label: &'a str,
    /// Smoothed confidence for the expected label.
    pub confidence: f64,
    /// Whether the detected hand count satisfies the policy.
    pub hand_count_valid: bool,
    /// Frame timestamp (ms, monotonic).
    pub now_ms: f64,
}

// ── Machine ────────────────────────────────────────────────

/// Hold-to-confirm state machine.
#[derive(Debug, Clone)]
pub struct HoldMachine {
    config: HoldConfig,
    state: HoldState,
    /// Pending confirmation time; `Some` only while holding.
    deadline_ms: Option<f64>,
    /// No hold may start before this time.
    cooldown_until_ms: Option<f64>,
    /// Latest timestamp seen, to guard against regressions.
    last_now_ms: Option<f64>,
}

impl HoldMachine {
    pub fn new(config: HoldConfig) -> Self {
        Self {
            config,
            state: HoldState::Idle,
            deadline_ms: None,
            cooldown_until_ms: None,
            last_now_ms: None,
        }
    }

    pub fn config(&self) -> &HoldConfig {
        &self.config
    }

    pub fn state(&self) -> &HoldState {
        &self.state
    }

    pub fn is_holding(&self) -> bool {
        !self.state.is_idle()
    }

    /// Pending confirmation deadline, if a hold is active.
    pub fn deadline_ms(&self) -> Option<f64> {
        self.deadline_ms
    }

    /// Milliseconds since the active hold started, or 0 when idle.
    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        match &self.state {
            HoldState::Holding { started_at_ms, .. } => (now_ms - started_at_ms).max(0.0),
            HoldState::Idle => 0.0,
        }
    }

    /// Process one frame.
    ///
    /// The deadline is checked first: a hold whose time ran out before
    /// this frame arrived is confirmed with the confidence it last saw,
    /// and the frame is not evaluated further.
    pub fn step(&mut self, input: HoldInput<'_>) -> Option<HoldEvent> {
        let now = self.observe_time(input.now_ms);

        if let Some(event) = self.fire_if_due(now) {
            return Some(event);
        }

        let detected = input.best_label.is_some();
        let confidence = input.confidence;

        match &mut self.state {
            HoldState::Holding { last_confidence, .. } => {
                if detected && input.hand_count_valid && confidence >= self.config.keep_threshold {
                    *last_confidence = confidence;
                    return None;
                }
                let reason = if !detected {
                    CancelReason::LostDetection
                } else if !input.hand_count_valid {
                    CancelReason::HandCountInvalid
                } else {
                    CancelReason::ConfidenceDropped
                };
                self.cancel_at(reason, now)
            }
            HoldState::Idle => {
                if self.cooling_down(now) {
                    return None;
                }
                let matches = input.best_label == Some(input.expected_label);
                if matches && input.hand_count_valid && confidence >= self.config.start_threshold {
                    self.begin(input.expected_label, confidence, now)
                } else {
                    None
                }
            }
        }
    }

    /// Check the deadline without a new frame.
    pub fn poll(&mut self, now_ms: f64) -> Option<HoldEvent> {
        let now = self.observe_time(now_ms);
        self.fire_if_due(now)
    }

    /// Cancel any active hold.  A no-op when idle.
    pub fn cancel(&mut self, reason: CancelReason) -> Option<HoldEvent> {
        let now = self.last_now_ms.unwrap_or(0.0);
        self.cancel_at(reason, now)
    }

    /// Return to the initial state, dropping any hold and cooldown.
    pub fn reset(&mut self) {
        self.state = HoldState::Idle;
        self.deadline_ms = None;
        self.cooldown_until_ms = None;
    }

    fn begin(&mut self, label: &str, confidence: f64, now: f64) -> Option<HoldEvent> {
        self.state = HoldState::Holding {
            label: label.to_string(),
            started_at_ms: now,
            last_confidence: confidence,
        };
        self.deadline_ms = Some(now + self.config.hold_duration_ms);
        info!(
            "Hold started: {} at {:.0}ms (confidence {:.2})",
            label, now, confidence
        );
        Some(HoldEvent::Started {
            label: label.to_string(),
            confidence,
        })
    }

    fn cancel_at(&mut self, reason: CancelReason, now: f64) -> Option<HoldEvent> {
        self.deadline_ms = None;
        let elapsed_ms = self.elapsed_ms(now);
        match std::mem::replace(&mut self.state, HoldState::Idle) {
            HoldState::Holding { label, .. } => {
                debug!(
                    "Hold cancelled: {} after {:.0}ms ({})",
                    label,
                    elapsed_ms,
                    reason.as_str()
                );
                Some(HoldEvent::Cancelled {
                    label,
                    reason,
                    elapsed_ms,
                })
            }
            HoldState::Idle => None,
        }
    }

    fn fire_if_due(&mut self, now: f64) -> Option<HoldEvent> {
        let deadline = self.deadline_ms?;
        if now < deadline {
            return None;
        }
        let elapsed_ms = self.elapsed_ms(now);
        self.deadline_ms = None;
        match std::mem::replace(&mut self.state, HoldState::Idle) {
            HoldState::Holding {
                label,
                last_confidence,
                ..
            } => {
                if self.config.cooldown_ms > 0.0 {
                    self.cooldown_until_ms = Some(now + self.config.cooldown_ms);
                }
                info!(
                    "Hold confirmed: {} after {:.0}ms (confidence {:.2})",
                    label, elapsed_ms, last_confidence
                );
                Some(HoldEvent::Confirmed {
                    label,
                    confidence: last_confidence,
                    elapsed_ms,
                })
            }
            HoldState::Idle => None,
        }
    }

    fn cooling_down(&mut self, now: f64) -> bool {
        match self.cooldown_until_ms {
            Some(until) if now < until => true,
            Some(_) => {
                self.cooldown_until_ms = None;
                false
            }
            None => false,
        }
    }

    /// Record a timestamp, refusing to move backwards.
    fn observe_time(&mut self, now_ms: f64) -> f64 {
        match self.last_now_ms {
            Some(last) if now_ms < last => {
                warn!(
                    "Hold machine: timestamp went backwards ({:.1}ms < {:.1}ms), using last",
                    now_ms, last
                );
                last
            }
            _ => {
                self.last_now_ms = Some(now_ms);
                now_ms
            }
        }
    }
}

impl Default for HoldMachine {
    fn default() -> Self {
        Self::new(HoldConfig::default())
    }
}

// ── Tests ──────────────────────────────────────────────────
