//! Feature extraction: hand landmarks to a fixed-length classifier input.
//!
//! Each hand is made wrist-relative (translation invariance) and divided
//! by its largest wrist distance (scale invariance), then flattened.  Two
//! hand slots are always emitted; a missing second hand is zero-filled.

use tracing::debug;

use super::landmarks::{mirror_hand, HandLandmark, HandObservation, Landmark, LANDMARK_COUNT};

/// Maximum number of hands encoded in one feature vector.
pub const MAX_HANDS: usize = 2;

/// Scalars per hand (21 landmarks × xyz).
pub const HAND_FEATURE_LEN: usize = LANDMARK_COUNT * 3;

/// Total feature vector length.
pub const FEATURE_LEN: usize = HAND_FEATURE_LEN * MAX_HANDS;

/// Normalized pose for one frame, always [`FEATURE_LEN`] elements.
pub type FeatureVector = [f32; FEATURE_LEN];

/// Which hand orientation the normalizer evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Landmarks as detected.
    Normal,
    /// Landmarks mirrored left/right before normalization.
    Mirrored,
}

impl Orientation {
    pub const BOTH: [Orientation; 2] = [Self::Normal, Self::Mirrored];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Mirrored => "mirrored",
        }
    }

    pub fn is_mirrored(&self) -> bool {
        matches!(self, Self::Mirrored)
    }
}

/// Normalize one frame's hands into a feature vector.
///
/// Returns `None` when no hand with exactly 21 landmarks is present.
/// Only the first two well-formed hands are encoded.
pub fn normalize(observation: &HandObservation, orientation: Orientation) -> Option<FeatureVector> {
    let skipped = observation.hands.len() - observation.valid_hand_count();
    if skipped > 0 {
        debug!("Normalizer: skipped {} malformed hand(s)", skipped);
    }

    let mut features = [0.0f32; FEATURE_LEN];
    let mut encoded = 0;

    for (slot, hand) in observation.valid_hands().take(MAX_HANDS).enumerate() {
        let points = match orientation {
            Orientation::Normal => {
                let mut pts = [Landmark::default(); LANDMARK_COUNT];
                pts.copy_from_slice(hand);
                pts
            }
            Orientation::Mirrored => mirror_hand(hand),
        };
        let start = slot * HAND_FEATURE_LEN;
        encode_hand(&points, &mut features[start..start + HAND_FEATURE_LEN]);
        encoded += 1;
    }

    if encoded == 0 {
        return None;
    }
    Some(features)
}

/// Write one hand's normalized coordinates into a 63-element slot.
fn encode_hand(points: &[Landmark; LANDMARK_COUNT], out: &mut [f32]) {
    let wrist = points[HandLandmark::Wrist.index()];
    let relative: Vec<Landmark> = points.iter().map(|p| p.relative_to(&wrist)).collect();

    let max_dist = relative.iter().map(Landmark::norm).fold(0.0f32, f32::max);
    // Degenerate hand (all points at the wrist) stays all zeros.
    let scale = if max_dist > 0.0 { 1.0 / max_dist } else { 0.0 };

    for (i, p) in relative.iter().enumerate() {
        out[i * 3] = p.x * scale;
        out[i * 3 + 1] = p.y * scale;
        out[i * 3 + 2] = p.z * scale;
    }
}

/// Euclidean distance between two feature vectors.
pub fn feature_distance(a: &FeatureVector, b: &FeatureVector) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::landmarks::make_hand;

    fn assert_close(a: &FeatureVector, b: &FeatureVector) {
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < 1e-5, "index {}: {} vs {}", i, x, y);
        }
    }

    #[test]
    fn test_no_hands_returns_none() {
        assert!(normalize(&HandObservation::empty(), Orientation::Normal).is_none());
    }

    #[test]
    fn test_only_malformed_hands_returns_none() {
        let obs = HandObservation::new(vec![vec![Landmark::default(); 20]]);
        assert!(normalize(&obs, Orientation::Normal).is_none());
        assert!(normalize(&obs, Orientation::Mirrored).is_none());
    }

    #[test]
    fn test_single_hand_pads_second_slot() {
        let obs = HandObservation::new(vec![make_hand(0.5, 0.5)]);
        let f = normalize(&obs, Orientation::Normal).unwrap();
        assert_eq!(f.len(), FEATURE_LEN);
        assert!(f[..HAND_FEATURE_LEN].iter().any(|v| *v != 0.0));
        assert!(f[HAND_FEATURE_LEN..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_wrist_is_origin_and_max_distance_is_one() {
        let obs = HandObservation::new(vec![make_hand(0.3, 0.7)]);
        let f = normalize(&obs, Orientation::Normal).unwrap();
        assert_eq!(&f[0..3], &[0.0, 0.0, 0.0]);

        let max = (0..LANDMARK_COUNT)
            .map(|i| (f[i * 3].powi(2) + f[i * 3 + 1].powi(2) + f[i * 3 + 2].powi(2)).sqrt())
            .fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic() {
        let obs = HandObservation::new(vec![make_hand(0.4, 0.6), make_hand(0.7, 0.5)]);
        let a = normalize(&obs, Orientation::Mirrored).unwrap();
        let b = normalize(&obs, Orientation::Mirrored).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_translation_invariance() {
        let a = normalize(&HandObservation::new(vec![make_hand(0.2, 0.4)]), Orientation::Normal).unwrap();
        let b = normalize(&HandObservation::new(vec![make_hand(0.6, 0.8)]), Orientation::Normal).unwrap();
        assert_close(&a, &b);
    }

    #[test]
    fn test_scale_invariance_around_wrist() {
        let hand = make_hand(0.5, 0.5);
        let wrist = hand[0];
        let scaled: Vec<Landmark> = hand
            .iter()
            .map(|p| {
                let r = p.relative_to(&wrist);
                Landmark::new(wrist.x + r.x * 2.5, wrist.y + r.y * 2.5, wrist.z + r.z * 2.5)
            })
            .collect();

        let a = normalize(&HandObservation::new(vec![hand]), Orientation::Normal).unwrap();
        let b = normalize(&HandObservation::new(vec![scaled]), Orientation::Normal).unwrap();
        assert_close(&a, &b);
    }

    #[test]
    fn test_degenerate_hand_is_zeros() {
        let obs = HandObservation::new(vec![vec![Landmark::new(0.5, 0.5, 0.1); LANDMARK_COUNT]]);
        let f = normalize(&obs, Orientation::Normal).unwrap();
        assert!(f.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_third_hand_ignored() {
        let two = HandObservation::new(vec![make_hand(0.3, 0.5), make_hand(0.7, 0.5)]);
        let mut three = two.clone();
        three.hands.push(make_hand(0.1, 0.1));
        assert_eq!(
            normalize(&two, Orientation::Normal),
            normalize(&three, Orientation::Normal)
        );
    }

    #[test]
    fn test_malformed_first_hand_shifts_slot() {
        let obs = HandObservation::new(vec![vec![Landmark::default(); 3], make_hand(0.5, 0.5)]);
        let expected = normalize(&HandObservation::new(vec![make_hand(0.5, 0.5)]), Orientation::Normal);
        assert_eq!(normalize(&obs, Orientation::Normal), expected);
    }

    #[test]
    fn test_mirrored_differs_from_normal() {
        let obs = HandObservation::new(vec![make_hand(0.5, 0.5)]);
        let n = normalize(&obs, Orientation::Normal).unwrap();
        let m = normalize(&obs, Orientation::Mirrored).unwrap();
        assert!(feature_distance(&n, &m) > 1e-3);
    }

    #[test]
    fn test_mirrored_of_mirrored_pose_matches_normal() {
        let hand = make_hand(0.35, 0.5);
        let mirrored_pose = mirror_hand(&hand).to_vec();
        let n = normalize(&HandObservation::new(vec![hand]), Orientation::Normal).unwrap();
        let m = normalize(&HandObservation::new(vec![mirrored_pose]), Orientation::Mirrored).unwrap();
        assert_close(&n, &m);
    }

    #[test]
    fn test_orientation_as_str() {
        assert_eq!(Orientation::Normal.as_str(), "normal");
        assert_eq!(Orientation::Mirrored.as_str(), "mirrored");
        assert!(Orientation::Mirrored.is_mirrored());
    }
}
