//! Frame pipeline driver.
//!
//! Owns the per-session state (smoother, hold machine, expected label)
//! and runs one camera frame at a time through normalize → classify →
//! smooth → hold.  Every frame yields a live update; hold transitions
//! and confirmations are reported as additional events.

mod config;

pub use config::PipelineConfig;

use tracing::{debug, info, warn};

use crate::error::{ClassifyError, ConfigError};
use crate::gesture::classifier::{ClassProbabilities, Classifier};
use crate::gesture::features::{normalize, Orientation};
use crate::gesture::hold::{CancelReason, HoldEvent, HoldInput, HoldMachine, HoldState};
use crate::gesture::landmarks::HandObservation;
use crate::gesture::policy::HandCountPolicy;
use crate::gesture::smoothing::ConfidenceSmoother;
use crate::ipc::escape_string;

/// Convert a [0, 1] confidence to a whole percentage.
pub fn confidence_percent(confidence: f64) -> u8 {
    if confidence.is_nan() {
        return 0;
    }
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u8
}

// ── Events ─────────────────────────────────────────────────

/// Observable pipeline output.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Emitted every processed frame.
    LiveUpdate {
        best_label: Option<String>,
        confidence_percent: u8,
    },
    /// A hold began for the expected label.
    HoldStarted { label: String, confidence_percent: u8 },
    /// An active hold ended without confirmation.
    HoldCancelled { label: String, reason: CancelReason },
    /// The gesture was held for the full duration.
    Confirmed { label: String, confidence_percent: u8 },
}

impl PipelineEvent {
    /// Short name used in logs and event output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LiveUpdate { .. } => "live-update",
            Self::HoldStarted { .. } => "hold-started",
            Self::HoldCancelled { .. } => "hold-cancelled",
            Self::Confirmed { .. } => "confirmed",
        }
    }

    /// Forward this event to the matching listener callback.
    pub fn deliver<L: PipelineListener + ?Sized>(&self, listener: &mut L) {
        match self {
            Self::LiveUpdate {
                best_label,
                confidence_percent,
            } => listener.on_live_update(best_label.as_deref(), *confidence_percent),
            Self::HoldStarted {
                label,
                confidence_percent,
            } => listener.on_hold_started(label, *confidence_percent),
            Self::HoldCancelled { label, reason } => listener.on_hold_cancelled(label, *reason),
            Self::Confirmed {
                label,
                confidence_percent,
            } => listener.on_confirmed(label, *confidence_percent),
        }
    }

    fn from_hold(event: HoldEvent) -> Self {
        match event {
            HoldEvent::Started { label, confidence } => Self::HoldStarted {
                label,
                confidence_percent: confidence_percent(confidence),
            },
            HoldEvent::Cancelled { label, reason, .. } => Self::HoldCancelled { label, reason },
            HoldEvent::Confirmed {
                label, confidence, ..
            } => Self::Confirmed {
                label,
                confidence_percent: confidence_percent(confidence),
            },
        }
    }
}

/// Downstream consumer of pipeline output.
pub trait PipelineListener {
    /// Called once per processed frame.
    fn on_live_update(&mut self, best_label: Option<&str>, confidence_percent: u8);

    /// Called at most once per successful hold.
    fn on_confirmed(&mut self, label: &str, confidence_percent: u8);

    fn on_hold_started(&mut self, _label: &str, _confidence_percent: u8) {}

    fn on_hold_cancelled(&mut self, _label: &str, _reason: CancelReason) {}
}

// ── State ──────────────────────────────────────────────────

/// Classifier output for the orientation that was kept.
#[derive(Debug, Clone)]
struct Evaluation {
    orientation: Orientation,
    probabilities: ClassProbabilities,
}

/// All mutable state of one detection session.
pub struct PipelineState {
    config: PipelineConfig,
    policy: HandCountPolicy,
    smoother: ConfidenceSmoother,
    hold: HoldMachine,
    /// Gesture the user is currently asked to perform.
    expected_label: Option<String>,
    /// False after `stop()` until `start()`.
    active: bool,
    /// Frames processed since creation.
    frames: u64,
}

impl PipelineState {
    /// Create a pipeline, rejecting invalid configuration.
    ///
    /// The policy's `enabled` flag is overridden by
    /// `config.hand_count_policy_enabled`.
    pub fn new(config: PipelineConfig, mut policy: HandCountPolicy) -> Result<Self, ConfigError> {
        config.validate()?;
        policy.enabled = config.hand_count_policy_enabled;
        info!(
            "Pipeline created: start {:.2} keep {:.2} hold {:.0}ms",
            config.start_threshold,
            config.effective_keep_threshold(),
            config.hold_duration_ms
        );
        Ok(Self {
            smoother: ConfidenceSmoother::new(config.smoothing_alpha),
            hold: HoldMachine::new(config.hold_config()),
            config,
            policy,
            expected_label: None,
            active: true,
            frames: 0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn policy(&self) -> &HandCountPolicy {
        &self.policy
    }

    /// Mutable access to the label table; the enabled flag stays as configured.
    pub fn policy_mut(&mut self) -> &mut HandCountPolicy {
        &mut self.policy
    }

    pub fn expected_label(&self) -> Option<&str> {
        self.expected_label.as_deref()
    }

    pub fn smoothed_confidence(&self) -> f64 {
        self.smoother.value()
    }

    pub fn hold_state(&self) -> &HoldState {
        self.hold.state()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Switch to a new target gesture.
    ///
    /// Any active hold is cancelled and the smoothed confidence is reset.
    /// Setting the same label again changes nothing.
    pub fn set_expected_label(&mut self, label: &str) -> Vec<PipelineEvent> {
        if self.expected_label.as_deref() == Some(label) {
            return Vec::new();
        }
        info!(
            "Expected label: {} -> {}",
            self.expected_label.as_deref().unwrap_or("nil"),
            label
        );
        self.expected_label = Some(label.to_string());
        self.smoother.reset();
        let cancelled = self.hold.cancel(CancelReason::ExpectedLabelChanged);
        self.hold.reset();
        cancelled.map(PipelineEvent::from_hold).into_iter().collect()
    }

    /// Stop detection (camera disabled).  Cancels any hold; frames are
    /// ignored until [`start`](Self::start).
    pub fn stop(&mut self) -> Vec<PipelineEvent> {
        if !self.active {
            return Vec::new();
        }
        info!("Pipeline stopped");
        self.active = false;
        self.smoother.reset();
        let cancelled = self.hold.cancel(CancelReason::Stopped);
        self.hold.reset();
        cancelled.map(PipelineEvent::from_hold).into_iter().collect()
    }

    /// Resume detection after [`stop`](Self::stop).
    pub fn start(&mut self) {
        if !self.active {
            info!("Pipeline started");
            self.active = true;
        }
    }

    /// Run one camera frame through the pipeline.
    ///
    /// `now_ms` must be monotonic across calls.
    pub fn process_frame<C: Classifier + ?Sized>(
        &mut self,
        observation: &HandObservation,
        classifier: &mut C,
        now_ms: f64,
    ) -> Vec<PipelineEvent> {
        if !self.active {
            return Vec::new();
        }
        self.frames += 1;

        let hand_count = observation.valid_hand_count();
        let evaluation = self.evaluate(observation, classifier);
        let best_label = evaluation
            .as_ref()
            .and_then(|e| e.probabilities.best())
            .map(|(label, _)| label.to_string());

        let mut events = Vec::new();

        let Some(expected) = self.expected_label.clone() else {
            events.push(PipelineEvent::LiveUpdate {
                best_label,
                confidence_percent: 0,
            });
            return events;
        };

        let raw = evaluation
            .as_ref()
            .map(|e| e.probabilities.probability(&expected))
            .unwrap_or(0.0);
        let smoothed = self.smoother.update(raw);

        if let Some(e) = &evaluation {
            debug!(
                "Frame {}: best {:?} raw {:.3} smoothed {:.3} ({}, {} hand(s))",
                self.frames,
                best_label,
                raw,
                smoothed,
                e.orientation.as_str(),
                hand_count
            );
        }

        events.push(PipelineEvent::LiveUpdate {
            best_label: best_label.clone(),
            confidence_percent: confidence_percent(smoothed),
        });

        let input = HoldInput {
            best_label: best_label.as_deref(),
            expected_label: &expected,
            confidence: smoothed,
            hand_count_valid: self.policy.is_valid(&expected, hand_count),
            now_ms,
        };
        if let Some(event) = self.hold.step(input) {
            events.push(PipelineEvent::from_hold(event));
        }
        events
    }

    /// Check the hold deadline between frames.
    pub fn poll(&mut self, now_ms: f64) -> Vec<PipelineEvent> {
        if !self.active {
            return Vec::new();
        }
        self.hold
            .poll(now_ms)
            .map(PipelineEvent::from_hold)
            .into_iter()
            .collect()
    }

    /// Classify the frame, in both orientations when configured, and keep
    /// the one that scores the expected label higher.
    fn evaluate<C: Classifier + ?Sized>(
        &self,
        observation: &HandObservation,
        classifier: &mut C,
    ) -> Option<Evaluation> {
        let orientations: &[Orientation] = if self.config.evaluate_mirrored {
            &Orientation::BOTH
        } else {
            &[Orientation::Normal]
        };

        let mut kept: Option<(f64, Evaluation)> = None;
        for &orientation in orientations {
            let features = normalize(observation, orientation)?;
            let probabilities = match classifier.classify(&features) {
                Ok(p) if !p.is_empty() => p,
                Ok(_) => {
                    warn!("Classifier failed ({}): {}", orientation.as_str(), ClassifyError::EmptyOutput);
                    continue;
                }
                Err(e) => {
                    warn!("Classifier failed ({}): {}", orientation.as_str(), e);
                    continue;
                }
            };
            let score = match self.expected_label.as_deref() {
                Some(expected) => probabilities.probability(expected),
                None => probabilities.best().map(|(_, p)| p).unwrap_or(0.0),
            };
            match &kept {
                Some((best, _)) if score <= *best => {}
                _ => {
                    kept = Some((
                        score,
                        Evaluation {
                            orientation,
                            probabilities,
                        },
                    ))
                }
            }
        }
        kept.map(|(_, e)| e)
    }

    /// Generate s-expression for IPC status.
    pub fn status_sexp(&self, now_ms: f64) -> String {
        let expected = self
            .expected_label
            .as_deref()
            .map(|l| format!("\"{}\"", escape_string(l)))
            .unwrap_or_else(|| "nil".to_string());
        let hold_label = match self.hold.state() {
            HoldState::Holding { label, .. } => format!("\"{}\"", escape_string(label)),
            HoldState::Idle => "nil".to_string(),
        };
        format!(
            "(:active {} :expected {} :confidence {:.3} :state :{} :label {} :elapsed-ms {:.0} :frames {})",
            if self.active { "t" } else { "nil" },
            expected,
            self.smoother.value(),
            self.hold.state().as_str(),
            hold_label,
            self.hold.elapsed_ms(now_ms),
            self.frames,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::features::FeatureVector;
    use crate::gesture::landmarks::make_hand;
    use crate::gesture::policy::HandRequirement;

    fn one_hand() -> HandObservation {
        HandObservation::new(vec![make_hand(0.5, 0.5)])
    }

    fn two_hands() -> HandObservation {
        HandObservation::new(vec![make_hand(0.3, 0.5), make_hand(0.7, 0.5)])
    }

    /// Classifier that always reports `p` for "A" and the rest for "B".
    fn fixed(p: f64) -> impl FnMut(&FeatureVector) -> Result<ClassProbabilities, ClassifyError> {
        move |_: &FeatureVector| Ok(ClassProbabilities::from_pairs([("A", p), ("B", 1.0 - p)]))
    }

    fn pipeline(config: PipelineConfig) -> PipelineState {
        let mut p = PipelineState::new(config, HandCountPolicy::default()).unwrap();
        p.set_expected_label("A");
        p
    }

    fn confirmed(events: &[PipelineEvent]) -> bool {
        events.iter().any(|e| matches!(e, PipelineEvent::Confirmed { .. }))
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PipelineConfig {
            keep_threshold: Some(0.8),
            ..PipelineConfig::default()
        };
        assert!(PipelineState::new(config, HandCountPolicy::default()).is_err());
    }

    #[test]
    fn test_confidence_percent() {
        assert_eq!(confidence_percent(0.0), 0);
        assert_eq!(confidence_percent(0.824), 82);
        assert_eq!(confidence_percent(0.825), 83);
        assert_eq!(confidence_percent(1.5), 100);
        assert_eq!(confidence_percent(f64::NAN), 0);
    }

    #[test]
    fn test_live_update_every_frame() {
        let mut p = pipeline(PipelineConfig::default());
        let mut c = fixed(0.6);
        let events = p.process_frame(&one_hand(), &mut c, 0.0);
        assert_eq!(
            events[0],
            PipelineEvent::LiveUpdate {
                best_label: Some("A".into()),
                confidence_percent: 60,
            }
        );
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_no_detection_live_update() {
        let mut p = pipeline(PipelineConfig::default());
        let mut c = fixed(0.9);
        let events = p.process_frame(&HandObservation::empty(), &mut c, 0.0);
        assert_eq!(
            events,
            vec![PipelineEvent::LiveUpdate {
                best_label: None,
                confidence_percent: 0,
            }]
        );
    }

    #[test]
    fn test_full_hold_confirms_after_duration() {
        let mut p = pipeline(PipelineConfig::default());
        let mut c = fixed(0.9);
        let mut t = 0.0;
        let mut confirmed_at = None;
        while t <= 3500.0 {
            let events = p.process_frame(&one_hand(), &mut c, t);
            if confirmed(&events) {
                confirmed_at = Some(t);
                break;
            }
            t += 50.0;
        }
        assert_eq!(confirmed_at, Some(3000.0));
    }

    #[test]
    fn test_confirmation_percent() {
        let mut p = pipeline(PipelineConfig::default());
        let mut c = fixed(0.9);
        p.process_frame(&one_hand(), &mut c, 0.0);
        let events = p.poll(3000.0);
        assert_eq!(
            events,
            vec![PipelineEvent::Confirmed {
                label: "A".into(),
                confidence_percent: 90,
            }]
        );
    }

    #[test]
    fn test_label_change_mid_hold_never_confirms() {
        let mut p = pipeline(PipelineConfig::default());
        let mut c = fixed(0.9);
        p.process_frame(&one_hand(), &mut c, 0.0);
        p.process_frame(&one_hand(), &mut c, 2900.0);
        assert!(!p.hold_state().is_idle());

        let events = p.set_expected_label("B");
        assert_eq!(
            events,
            vec![PipelineEvent::HoldCancelled {
                label: "A".into(),
                reason: CancelReason::ExpectedLabelChanged,
            }]
        );
        assert!(p.hold_state().is_idle());
        assert_eq!(p.smoothed_confidence(), 0.0);
        assert!(p.poll(3100.0).is_empty());
    }

    #[test]
    fn test_same_label_does_not_reset() {
        let mut p = pipeline(PipelineConfig::default());
        let mut c = fixed(0.9);
        p.process_frame(&one_hand(), &mut c, 0.0);
        assert!(p.set_expected_label("A").is_empty());
        assert!(!p.hold_state().is_idle());
        assert_eq!(p.smoothed_confidence(), 0.9);
    }

    #[test]
    fn test_stop_cancels_and_ignores_frames() {
        let mut p = pipeline(PipelineConfig::default());
        let mut c = fixed(0.9);
        p.process_frame(&one_hand(), &mut c, 0.0);
        let events = p.stop();
        assert!(matches!(
            events.as_slice(),
            [PipelineEvent::HoldCancelled { reason: CancelReason::Stopped, .. }]
        ));
        assert!(p.stop().is_empty());
        assert!(p.process_frame(&one_hand(), &mut c, 100.0).is_empty());
        assert!(p.poll(5000.0).is_empty());

        p.start();
        let events = p.process_frame(&one_hand(), &mut c, 5100.0);
        assert!(events.iter().any(|e| matches!(e, PipelineEvent::HoldStarted { .. })));
    }

    #[test]
    fn test_two_hand_label_needs_two_hands() {
        let config = PipelineConfig {
            hand_count_policy_enabled: true,
            ..PipelineConfig::default()
        };
        let policy = HandCountPolicy::default().with("A", HandRequirement::Two);
        let mut p = PipelineState::new(config, policy).unwrap();
        p.set_expected_label("A");
        let mut c = fixed(0.99);

        for i in 0..10 {
            let events = p.process_frame(&one_hand(), &mut c, i as f64 * 33.0);
            assert!(!events.iter().any(|e| matches!(e, PipelineEvent::HoldStarted { .. })));
        }
        let events = p.process_frame(&two_hands(), &mut c, 400.0);
        assert!(events.iter().any(|e| matches!(e, PipelineEvent::HoldStarted { .. })));
    }

    #[test]
    fn test_policy_disabled_ignores_hand_count() {
        let policy = HandCountPolicy::new(true).with("A", HandRequirement::Two);
        let mut p = PipelineState::new(PipelineConfig::default(), policy).unwrap();
        assert!(!p.policy().enabled);
        p.set_expected_label("A");
        let mut c = fixed(0.99);
        let events = p.process_frame(&one_hand(), &mut c, 0.0);
        assert!(events.iter().any(|e| matches!(e, PipelineEvent::HoldStarted { .. })));
    }

    #[test]
    fn test_mirrored_orientation_preferred_when_better() {
        let mut p = pipeline(PipelineConfig::default());
        let hand = make_hand(0.4, 0.5);
        let normal = normalize(&HandObservation::new(vec![hand.clone()]), Orientation::Normal).unwrap();
        // Only recognizes "A" in the normal orientation
        let mut c = move |f: &FeatureVector| {
            let p = if *f == normal { 0.1 } else { 0.95 };
            Ok::<_, ClassifyError>(ClassProbabilities::from_pairs([("A", p), ("B", 1.0 - p)]))
        };
        let events = p.process_frame(&HandObservation::new(vec![hand]), &mut c, 0.0);
        assert!(events.iter().any(|e| matches!(e, PipelineEvent::HoldStarted { .. })));
        assert_eq!(p.smoothed_confidence(), 0.95);
    }

    #[test]
    fn test_mirroring_disabled() {
        let config = PipelineConfig {
            evaluate_mirrored: false,
            ..PipelineConfig::default()
        };
        let mut p = pipeline(config);
        let mut calls = 0;
        let mut c = |_: &FeatureVector| {
            calls += 1;
            Ok::<_, ClassifyError>(ClassProbabilities::from_pairs([("A", 0.5)]))
        };
        p.process_frame(&one_hand(), &mut c, 0.0);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_classifier_failure_is_no_detection() {
        let mut p = pipeline(PipelineConfig::default());
        let mut ok = fixed(0.9);
        p.process_frame(&one_hand(), &mut ok, 0.0);
        let mut failing =
            |_: &FeatureVector| Err::<ClassProbabilities, _>(ClassifyError::Backend("boom".into()));
        let events = p.process_frame(&one_hand(), &mut failing, 33.0);
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::HoldCancelled { reason: CancelReason::LostDetection, .. })
        ));
    }

    #[test]
    fn test_no_expected_label_reports_best() {
        let mut p = PipelineState::new(PipelineConfig::default(), HandCountPolicy::default()).unwrap();
        let mut c = fixed(0.2);
        let events = p.process_frame(&one_hand(), &mut c, 0.0);
        assert_eq!(
            events,
            vec![PipelineEvent::LiveUpdate {
                best_label: Some("B".into()),
                confidence_percent: 0,
            }]
        );
        assert!(p.hold_state().is_idle());
    }

    struct Recorder {
        live: usize,
        confirmed: Vec<(String, u8)>,
    }

    impl PipelineListener for Recorder {
        fn on_live_update(&mut self, _best_label: Option<&str>, _confidence_percent: u8) {
            self.live += 1;
        }

        fn on_confirmed(&mut self, label: &str, confidence_percent: u8) {
            self.confirmed.push((label.to_string(), confidence_percent));
        }
    }

    #[test]
    fn test_listener_delivery() {
        let mut p = pipeline(PipelineConfig::review());
        let mut c = fixed(0.8);
        let mut rec = Recorder {
            live: 0,
            confirmed: Vec::new(),
        };
        for i in 0..=40 {
            for e in p.process_frame(&one_hand(), &mut c, i as f64 * 40.0) {
                e.deliver(&mut rec);
            }
        }
        assert_eq!(rec.live, 41);
        assert_eq!(rec.confirmed, vec![("A".to_string(), 80)]);
    }

    #[test]
    fn test_status_sexp() {
        let mut p = pipeline(PipelineConfig::default());
        let mut c = fixed(0.9);
        p.process_frame(&one_hand(), &mut c, 0.0);
        let sexp = p.status_sexp(1200.0);
        assert!(sexp.contains(":active t"));
        assert!(sexp.contains(":expected \"A\""));
        assert!(sexp.contains(":state :holding"));
        assert!(sexp.contains(":elapsed-ms 1200"));
        assert!(sexp.contains(":frames 1"));
    }

    #[test]
    fn test_event_kind() {
        let e = PipelineEvent::Confirmed {
            label: "A".into(),
            confidence_percent: 90,
        };
        assert_eq!(e.kind(), "confirmed");
    }
}
