//! Hand landmark data structures.
//!
//! Models the 21 keypoints per hand produced by the upstream landmark
//! detector, in its fixed anatomical order (wrist first, then four
//! points per finger from base to tip).  Also provides the left/right
//! mirror transform used for orientation correction.

// ── Landmark definitions ───────────────────────────────────

/// The 21 hand landmarks in detector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

impl HandLandmark {
    /// All landmarks in index order.
    pub const ALL: [HandLandmark; LANDMARK_COUNT] = [
        Self::Wrist,
        Self::ThumbCmc,
        Self::ThumbMcp,
        Self::ThumbIp,
        Self::ThumbTip,
        Self::IndexMcp,
        Self::IndexPip,
        Self::IndexDip,
        Self::IndexTip,
        Self::MiddleMcp,
        Self::MiddlePip,
        Self::MiddleDip,
        Self::MiddleTip,
        Self::RingMcp,
        Self::RingPip,
        Self::RingDip,
        Self::RingTip,
        Self::PinkyMcp,
        Self::PinkyPip,
        Self::PinkyDip,
        Self::PinkyTip,
    ];

    /// Convert landmark enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Look up a landmark by array index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// String representation for logging and status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }

    /// Fingertip landmarks for convenience.
    pub fn fingertips() -> [HandLandmark; 5] {
        [
            Self::ThumbTip,
            Self::IndexTip,
            Self::MiddleTip,
            Self::RingTip,
            Self::PinkyTip,
        ]
    }
}

/// Landmark index pairs exchanged by the mirror transform.
///
/// Thumb chain swaps with pinky chain, index with ring.  Wrist and the
/// middle finger map onto themselves.
pub const MIRROR_PAIRS: [(HandLandmark, HandLandmark); 8] = [
    (HandLandmark::ThumbCmc, HandLandmark::PinkyMcp),
    (HandLandmark::ThumbMcp, HandLandmark::PinkyPip),
    (HandLandmark::ThumbIp, HandLandmark::PinkyDip),
    (HandLandmark::ThumbTip, HandLandmark::PinkyTip),
    (HandLandmark::IndexMcp, HandLandmark::RingMcp),
    (HandLandmark::IndexPip, HandLandmark::RingPip),
    (HandLandmark::IndexDip, HandLandmark::RingDip),
    (HandLandmark::IndexTip, HandLandmark::RingTip),
];

// ── Landmark point ─────────────────────────────────────────

/// A single detected keypoint in normalized image space.
///
/// `x` and `y` are typically in [0, 1]; `z` is depth relative to the wrist.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise difference `self - origin`.
    pub fn relative_to(&self, origin: &Landmark) -> Landmark {
        Landmark {
            x: self.x - origin.x,
            y: self.y - origin.y,
            z: self.z - origin.z,
        }
    }

    /// Euclidean length of this point treated as a vector.
    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance between two landmarks.
    pub fn distance(&self, other: &Landmark) -> f32 {
        self.relative_to(other).norm()
    }
}

// ── Observation ────────────────────────────────────────────

/// One frame's detector output: zero, one or two hands.
///
/// Each hand should hold exactly [`LANDMARK_COUNT`] points; hands that
/// don't are skipped downstream rather than rejected here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandObservation {
    pub hands: Vec<Vec<Landmark>>,
}

impl HandObservation {
    /// An observation with no hands detected.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(hands: Vec<Vec<Landmark>>) -> Self {
        Self { hands }
    }

    /// Hands carrying exactly 21 landmarks, in detection order.
    pub fn valid_hands(&self) -> impl Iterator<Item = &[Landmark]> {
        self.hands
            .iter()
            .filter(|h| h.len() == LANDMARK_COUNT)
            .map(|h| h.as_slice())
    }

    /// Number of well-formed hands in this observation.
    pub fn valid_hand_count(&self) -> usize {
        self.valid_hands().count()
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}

/// Convert a hand into its left/right mirrored pose.
///
/// Flips x around the image center (`x' = 1 - x`) and exchanges the
/// landmarks listed in [`MIRROR_PAIRS`].  Applying it twice yields the
/// original points.  Input must have exactly 21 landmarks.
pub fn mirror_hand(hand: &[Landmark]) -> [Landmark; LANDMARK_COUNT] {
    let mut out = [Landmark::default(); LANDMARK_COUNT];
    for (dst, src) in out.iter_mut().zip(hand.iter()) {
        *dst = Landmark {
            x: 1.0 - src.x,
            y: src.y,
            z: src.z,
        };
    }
    for (a, b) in MIRROR_PAIRS {
        out.swap(a.index(), b.index());
    }
    out
}

// ── Test helpers ───────────────────────────────────────────

/// Build a plausible open-hand pose around `(cx, cy)`.
#[cfg(test)]
pub(crate) fn make_hand(cx: f32, cy: f32) -> Vec<Landmark> {
    (0..LANDMARK_COUNT)
        .map(|i| {
            if i == 0 {
                return Landmark::new(cx, cy, 0.0);
            }
            let finger = ((i - 1) / 4) as f32;
            let joint = ((i - 1) % 4 + 1) as f32;
            Landmark::new(
                cx + (finger - 2.0) * 0.03 + joint * 0.002,
                cy - joint * 0.04,
                -0.01 * joint,
            )
        })
        .collect()
}

// ── Tests ──────────────────────────────────────────────────
