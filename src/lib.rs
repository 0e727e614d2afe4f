//! gesture-hold - hold-to-confirm hand gesture recognition.
//!
//! Turns per-frame hand landmarks into a stable "gesture confirmed"
//! decision: landmarks are normalized into a fixed feature vector, the
//! classifier's confidence for the expected gesture is smoothed, and a
//! hysteresis state machine confirms once the gesture has been held for
//! the configured duration.

pub mod error;
pub mod gesture;
pub mod ipc;
pub mod pipeline;

pub use error::{ClassifyError, ConfigError, ScriptError};
pub use gesture::{
    CancelReason, CentroidClassifier, ClassProbabilities, Classifier, HandCountPolicy,
    HandObservation, HandRequirement, Landmark,
};
pub use pipeline::{PipelineConfig, PipelineEvent, PipelineListener, PipelineState};
