use serde::Serialize;

use super::error::{RoutingError, RoutingResult};
use crate::constants::{DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD};

/// Confidence gates. `high` admits knowledge-base-only answers; below `low` the
/// knowledge base is not trusted at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoutingThresholds {
    pub high: f32,
    pub low: f32,
}

impl Default for RoutingThresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_THRESHOLD,
            low: DEFAULT_LOW_THRESHOLD,
        }
    }
}

impl RoutingThresholds {
    pub fn new(low: f32, high: f32) -> RoutingResult<Self> {
        let t = Self { high, low };
        t.validate()?;
        Ok(t)
    }

    /// Replaces `high`, lowering `low` with it when needed so the pair stays ordered.
    pub fn with_high(self, high: f32) -> RoutingResult<Self> {
        Self::new(self.low.min(high), high)
    }

    pub fn validate(&self) -> RoutingResult<()> {
        let ok = self.low.is_finite()
            && self.high.is_finite()
            && 0.0 <= self.low
            && self.low <= self.high
            && self.high <= 1.0;
        if ok {
            Ok(())
        } else {
            Err(RoutingError::InvalidThresholds {
                low: self.low,
                high: self.high,
            })
        }
    }
}
