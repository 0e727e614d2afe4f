//! Error types.

/// Rejected pipeline configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("keep threshold {keep} exceeds start threshold {start}")]
    KeepAboveStart { keep: f64, start: f64 },

    #[error("smoothing alpha must be within [0, 1), got {0}")]
    InvalidAlpha(f64),

    #[error("{name} must be a finite, non-negative duration, got {value}ms")]
    InvalidDuration { name: &'static str, value: f64 },
}

/// Classifier failure for one frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier has no labels")]
    NoLabels,

    #[error("classifier returned no probabilities")]
    EmptyOutput,

    #[error("classifier error: {0}")]
    Backend(String),
}

/// Malformed replay script message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("malformed s-expression: {0}")]
    Parse(String),

    #[error("missing :type")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("missing field :{0}")]
    MissingField(&'static str),

    #[error("invalid field :{field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
