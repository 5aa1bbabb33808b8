//! Threshold-based mapping from a waste quantity to a [`Label`].

use crate::model::{Label, ThresholdPolicy};

#[derive(Debug, Clone, Default, PartialEq)]
/// Applies a [`ThresholdPolicy`] to waste quantities.
pub struct Categorizer {
    policy: ThresholdPolicy,
}

impl Categorizer {
    /// Create a categorizer for the given policy.
    #[must_use]
    pub const fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use.
    #[must_use]
    pub const fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Label a quantity. `NaN` is [`Label::Unknown`]; infinities fall into the outer levels.
    #[must_use]
    pub fn categorize(&self, waste_quantity: f64) -> Label {
        if waste_quantity.is_nan() {
            Label::Unknown
        } else if waste_quantity < self.policy.low_medium {
            Label::Low
        } else if waste_quantity < self.policy.medium_high {
            Label::Medium
        } else {
            Label::High
        }
    }
}
