//! Static (strategy, tier) to model resolution tables.
//!
//! Costs are kopecks per million tokens for the RU strategy and the same
//! unit converted from provider list prices for the global strategy.

use klip_models::{LlmStrategy, LlmTier, ModelConfig, SttConfig};

/// OpenAI-compatible endpoint of the RU provider.
pub const CLOUDRU_BASE_URL: &str = "https://foundation-models.api.cloud.ru/v1";

pub const GOOGLE_OPENAI_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn model(provider: &str, model: &str, cost_input: f64, cost_output: f64) -> ModelConfig {
    ModelConfig {
        provider: provider.to_string(),
        model: model.to_string(),
        cost_input,
        cost_output,
    }
}

/// Resolve the concrete model for a (strategy, tier) pair.
pub fn model_config(strategy: LlmStrategy, tier: LlmTier) -> ModelConfig {
    match (strategy, tier) {
        (LlmStrategy::Ru, LlmTier::Tier0) => {
            model("cloudru", "GigaChat3-10B-A1.8B", 10.0, 10.0)
        }
        (LlmStrategy::Ru, LlmTier::Tier1) => {
            model("cloudru", "t-tech/T-pro-it-2.1", 35.0, 70.0)
        }
        (LlmStrategy::Ru, LlmTier::Tier2) => {
            model("cloudru", "Qwen3-235B-A22B-Instruct-2507", 17.0, 70.0)
        }
        (LlmStrategy::Ru, LlmTier::Tier3) => {
            model("cloudru", "zai-org/GLM-4.6", 55.0, 220.0)
        }
        (LlmStrategy::Global, LlmTier::Tier0) => {
            model("google", "gemini-2.0-flash-lite", 0.075, 0.30)
        }
        (LlmStrategy::Global, LlmTier::Tier1) => {
            model("google", "gemini-2.0-flash", 0.10, 0.40)
        }
        (LlmStrategy::Global, LlmTier::Tier2) => {
            model("anthropic", "claude-haiku-4.5", 0.80, 4.00)
        }
        (LlmStrategy::Global, LlmTier::Tier3) => {
            model("google", "gemini-2.5-pro", 1.25, 10.00)
        }
    }
}

/// Resolve the speech-to-text model for a strategy.
pub fn stt_config(strategy: LlmStrategy) -> SttConfig {
    match strategy {
        LlmStrategy::Ru => SttConfig {
            provider: "cloudru".to_string(),
            model: "openai/whisper-large-v3".to_string(),
        },
        LlmStrategy::Global => SttConfig {
            provider: "openai".to_string(),
            model: "whisper-1".to_string(),
        },
    }
}

/// Base URL of a provider's OpenAI-compatible API.
pub fn provider_base_url(strategy: LlmStrategy, provider: &str) -> &'static str {
    if strategy == LlmStrategy::Ru {
        return CLOUDRU_BASE_URL;
    }
    match provider {
        "google" => GOOGLE_OPENAI_BASE_URL,
        "anthropic" => ANTHROPIC_BASE_URL,
        _ => OPENAI_BASE_URL,
    }
}
