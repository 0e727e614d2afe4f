//! Classifier boundary and per-class probability output.
//!
//! The trained model lives outside this crate; anything that maps a
//! feature vector to per-label probabilities implements [`Classifier`].
//! [`CentroidClassifier`] is a small template-matching implementation used
//! by the replay tool and tests.

use tracing::debug;

use super::features::{feature_distance, FeatureVector};
use crate::error::ClassifyError;

// ── Probabilities ──────────────────────────────────────────

/// Per-label probabilities for one frame, in the classifier's label order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassProbabilities {
    entries: Vec<(String, f64)>,
}

impl ClassProbabilities {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    /// Build from `(label, probability)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(label, p)| (label.to_string(), p))
                .collect(),
        }
    }

    /// Highest-probability label.  Ties go to the earlier label.
    pub fn best(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (label, p) in &self.entries {
            match best {
                Some((_, bp)) if *p <= bp => {}
                _ => best = Some((label.as_str(), *p)),
            }
        }
        best
    }

    /// Probability assigned to `label`, or 0.0 if the label is unknown.
    pub fn probability(&self, label: &str) -> f64 {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(l, p)| (l.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Classifier trait ───────────────────────────────────────

/// Maps a normalized feature vector to per-label probabilities.
pub trait Classifier {
    fn classify(&mut self, features: &FeatureVector) -> Result<ClassProbabilities, ClassifyError>;
}

impl<F> Classifier for F
where
    F: FnMut(&FeatureVector) -> Result<ClassProbabilities, ClassifyError>,
{
    fn classify(&mut self, features: &FeatureVector) -> Result<ClassProbabilities, ClassifyError> {
        (self)(features)
    }
}

// ── Template classifier ────────────────────────────────────

/// Default softmax temperature for [`CentroidClassifier`].
pub const DEFAULT_TEMPERATURE: f32 = 0.25;

/// Nearest-template classifier: softmax over negative distances to one
/// stored feature vector per label.
#[derive(Debug, Clone)]
pub struct CentroidClassifier {
    templates: Vec<(String, FeatureVector)>,
    /// Lower values make the output distribution sharper.
    pub temperature: f32,
}

impl CentroidClassifier {
    pub fn new() -> Self {
        Self {
            templates: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Add or replace the template for `label`.
    pub fn add_template(&mut self, label: &str, features: FeatureVector) {
        if let Some(entry) = self.templates.iter_mut().find(|(l, _)| l == label) {
            entry.1 = features;
        } else {
            self.templates.push((label.to_string(), features));
        }
        debug!("Classifier: template set for {}", label);
    }

    pub fn label_count(&self) -> usize {
        self.templates.len()
    }
}

impl Default for CentroidClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for CentroidClassifier {
    fn classify(&mut self, features: &FeatureVector) -> Result<ClassProbabilities, ClassifyError> {
        if self.templates.is_empty() {
            return Err(ClassifyError::NoLabels);
        }
        let temperature = self.temperature.max(f32::EPSILON);
        let logits: Vec<f32> = self
            .templates
            .iter()
            .map(|(_, t)| -feature_distance(features, t) / temperature)
            .collect();

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f64> = logits.iter().map(|l| f64::from(l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();

        Ok(ClassProbabilities::new(
            self.templates
                .iter()
                .zip(exps)
                .map(|((label, _), e)| (label.clone(), e / sum))
                .collect(),
        ))
    }
}
