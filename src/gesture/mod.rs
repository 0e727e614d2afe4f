//! Gesture core: landmark normalization, confidence smoothing and the
//! hold-confirmation state machine.
//!
//! Provides:
//! - `landmarks`: 21-point hand model, observations, mirror transform
//! - `features`: per-frame feature vector normalization
//! - `classifier`: classifier boundary and per-label probabilities
//! - `smoothing`: EMA of the expected-label confidence
//! - `hold`: hysteresis hold-to-confirm state machine
//! - `policy`: per-label hand-count requirements

pub mod classifier;
pub mod features;
pub mod hold;
pub mod landmarks;
pub mod policy;
pub mod smoothing;

pub use classifier::{CentroidClassifier, ClassProbabilities, Classifier};
pub use features::{normalize, FeatureVector, Orientation, FEATURE_LEN};
pub use hold::{CancelReason, HoldConfig, HoldEvent, HoldInput, HoldMachine, HoldState};
pub use landmarks::{HandLandmark, HandObservation, Landmark, LANDMARK_COUNT};
pub use policy::{HandCountPolicy, HandRequirement};
pub use smoothing::ConfidenceSmoother;
