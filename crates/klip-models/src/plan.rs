//! Subscription plan tiers and their pipeline limits.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Start,
    Pro,
    Business,
}

impl PlanTier {
    /// Parse from string; unknown plans are treated as free.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "start" => PlanTier::Start,
            "pro" => PlanTier::Pro,
            "business" => PlanTier::Business,
            _ => PlanTier::Free,
        }
    }

    /// Maximum clips persisted per video for this plan.
    pub fn max_clips(self) -> usize {
        match self {
            PlanTier::Free => 3,
            PlanTier::Start => 10,
            PlanTier::Pro | PlanTier::Business => 100,
        }
    }

    /// Whether rendered clips carry the platform watermark.
    pub fn watermark_required(self) -> bool {
        matches!(self, PlanTier::Free)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Start => "start",
            PlanTier::Pro => "pro",
            PlanTier::Business => "business",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_plan_falls_back_to_free() {
        assert_eq!(PlanTier::parse("enterprise"), PlanTier::Free);
        assert_eq!(PlanTier::parse("PRO"), PlanTier::Pro);
    }

    #[test]
    fn clip_caps_by_plan() {
        assert_eq!(PlanTier::Free.max_clips(), 3);
        assert_eq!(PlanTier::Start.max_clips(), 10);
        assert_eq!(PlanTier::Business.max_clips(), 100);
    }

    #[test]
    fn only_free_gets_watermark() {
        assert!(PlanTier::Free.watermark_required());
        assert!(!PlanTier::Start.watermark_required());
        assert!(!PlanTier::Business.watermark_required());
    }
}
