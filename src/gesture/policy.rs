//! Per-label hand-count requirements.
//!
//! Some gestures are performed with one hand, others need both.  When the
//! policy is enabled, a hold can only start or continue while the number
//! of detected hands satisfies the expected label's requirement.

use std::collections::HashMap;

/// How many hands a gesture needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandRequirement {
    /// Exactly one hand.
    #[default]
    Single,
    /// Exactly two hands.
    Two,
    /// One or two hands.
    Flexible,
}

impl HandRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Two => "two",
            Self::Flexible => "flexible",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "single" | "one" => Some(Self::Single),
            "two" | "both" => Some(Self::Two),
            "flexible" | "any" => Some(Self::Flexible),
            _ => None,
        }
    }

    /// Whether `hand_count` detected hands satisfy this requirement.
    pub fn accepts(&self, hand_count: usize) -> bool {
        match self {
            Self::Single => hand_count == 1,
            Self::Two => hand_count == 2,
            Self::Flexible => hand_count >= 1,
        }
    }
}

/// Label-to-requirement table with an on/off switch.
#[derive(Debug, Clone, Default)]
pub struct HandCountPolicy {
    /// When false every hand count is accepted.
    pub enabled: bool,
    requirements: HashMap<String, HandRequirement>,
}

impl HandCountPolicy {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            requirements: HashMap::new(),
        }
    }

    /// Set the requirement for a label, replacing any previous entry.
    pub fn set(&mut self, label: &str, requirement: HandRequirement) {
        self.requirements.insert(label.to_string(), requirement);
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, label: &str, requirement: HandRequirement) -> Self {
        self.set(label, requirement);
        self
    }

    /// Requirement for a label; unlisted labels need a single hand.
    pub fn requirement(&self, label: &str) -> HandRequirement {
        self.requirements.get(label).copied().unwrap_or_default()
    }

    /// Whether `hand_count` is acceptable for `label` under this policy.
    pub fn is_valid(&self, label: &str, hand_count: usize) -> bool {
        if !self.enabled {
            return true;
        }
        self.requirement(label).accepts(hand_count)
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}
