//! LLM routing enums shared between the router and the analysis engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::plan::PlanTier;

/// Model routing strategy (data residency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmStrategy {
    /// Russia-hosted OpenAI-compatible endpoint
    #[default]
    Ru,
    /// Gemini/Anthropic/OpenAI
    Global,
}

impl fmt::Display for LlmStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmStrategy::Ru => write!(f, "ru"),
            LlmStrategy::Global => write!(f, "global"),
        }
    }
}

/// What the router is being asked to do. Each variant carries only the
/// routing inputs that matter for its tier selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum LlmTask {
    MomentSelection {
        /// Estimated transcript token count
        token_count: u32,
        plan: PlanTier,
    },
    ViralityScoring {
        plan: PlanTier,
        /// Total score of a previous attempt, for quality retries
        previous_score: Option<u8>,
    },
    TitleGeneration,
    CtaSuggestion,
}

impl LlmTask {
    pub fn name(&self) -> &'static str {
        match self {
            LlmTask::MomentSelection { .. } => "moment_selection",
            LlmTask::ViralityScoring { .. } => "virality_scoring",
            LlmTask::TitleGeneration => "title_generation",
            LlmTask::CtaSuggestion => "cta_suggestion",
        }
    }
}

/// A cost/quality bracket of model selection (not a subscription plan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LlmTier {
    Tier0,
    Tier1,
    Tier2,
    Tier3,
}

impl fmt::Display for LlmTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmTier::Tier0 => write!(f, "tier0"),
            LlmTier::Tier1 => write!(f, "tier1"),
            LlmTier::Tier2 => write!(f, "tier2"),
            LlmTier::Tier3 => write!(f, "tier3"),
        }
    }
}

/// Concrete model resolution for a (strategy, tier) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelConfig {
    /// Provider key ("cloudru", "google", "anthropic", "openai")
    pub provider: String,
    /// Model name passed to the provider
    pub model: String,
    /// Kopecks per million input tokens
    pub cost_input: f64,
    /// Kopecks per million output tokens
    pub cost_output: f64,
}

/// Speech-to-text model resolution per strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SttConfig {
    pub provider: String,
    pub model: String,
}
