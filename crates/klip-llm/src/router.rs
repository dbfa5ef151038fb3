//! Tiered model routing.
//!
//! The router owns a registry of platform-key clients, one per
//! (strategy, provider) pair, built at construction. BYOK calls never
//! touch the registry: they get a fresh client carrying the user's key,
//! which is dropped as soon as the call returns.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, warn};

use klip_models::{LlmStrategy, LlmTask, LlmTier, ModelConfig, PlanTier};

use crate::client::{ChatCompletion, ChatMessage, ChatOptions, LlmClient, Transcription};
use crate::config::{model_config, provider_base_url, stt_config};
use crate::error::{LlmError, LlmResult};

/// Platform-held provider credentials.
#[derive(Debug, Clone, Default)]
pub struct PlatformKeys {
    pub cloudru: Option<String>,
    pub gemini: Option<String>,
    pub anthropic: Option<String>,
    pub openai: Option<String>,
}

/// User-supplied provider keys for one pipeline run. Held in memory only;
/// never cached in the client registry, never logged.
#[derive(Debug, Clone, Default)]
pub struct ByokKeys {
    pub gemini: Option<String>,
    pub anthropic: Option<String>,
    pub openai: Option<String>,
}

impl ByokKeys {
    pub fn is_empty(&self) -> bool {
        self.gemini.is_none() && self.anthropic.is_none() && self.openai.is_none()
    }

    /// The user key matching a resolved provider, if any.
    fn key_for(&self, provider: &str) -> Option<&str> {
        match provider {
            "google" => self.gemini.as_deref(),
            "anthropic" => self.anthropic.as_deref(),
            "openai" => self.openai.as_deref(),
            _ => None,
        }
    }
}

/// Inputs for one routed call.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    pub task: LlmTask,
    pub strategy: LlmStrategy,
    pub byok_keys: ByokKeys,
}

/// A routed completion with cost attribution.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub tier: LlmTier,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Zero when the call went through a BYOK key
    pub cost_kopecks: u64,
    pub duration_ms: u64,
}

/// A transcription run with the model that produced it.
#[derive(Debug, Clone)]
pub struct SttResponse {
    pub transcription: Transcription,
    pub model: String,
    pub provider: String,
}

/// Map a task to its model tier.
///
/// Tier 0 covers cheap short-form tasks, tier 3 very long context, tier 2
/// top-plan users and quality retries, tier 1 everything else.
pub fn select_tier(task: &LlmTask) -> LlmTier {
    match task {
        LlmTask::TitleGeneration | LlmTask::CtaSuggestion => LlmTier::Tier0,
        LlmTask::MomentSelection { token_count, plan } => {
            if *token_count > 100_000 {
                LlmTier::Tier3
            } else if *plan == PlanTier::Business {
                LlmTier::Tier2
            } else {
                LlmTier::Tier1
            }
        }
        LlmTask::ViralityScoring {
            plan,
            previous_score,
        } => {
            if *plan == PlanTier::Business || previous_score.is_some_and(|s| s < 50) {
                LlmTier::Tier2
            } else {
                LlmTier::Tier1
            }
        }
    }
}

/// Cost of one call in kopecks, rounded up.
pub fn call_cost_kopecks(input_tokens: u64, output_tokens: u64, config: &ModelConfig) -> u64 {
    let raw = (input_tokens as f64 * config.cost_input
        + output_tokens as f64 * config.cost_output)
        / 1_000_000.0;
    raw.ceil() as u64
}

pub struct LlmRouter {
    clients: HashMap<(LlmStrategy, String), LlmClient>,
    base_url_override: Option<String>,
}

impl LlmRouter {
    pub fn new(keys: PlatformKeys) -> LlmResult<Self> {
        Self::build(keys, None)
    }

    /// Route every provider to one endpoint. Test seam for mock servers.
    pub fn with_base_url(keys: PlatformKeys, base_url: impl Into<String>) -> LlmResult<Self> {
        Self::build(keys, Some(base_url.into()))
    }

    fn build(keys: PlatformKeys, base_url_override: Option<String>) -> LlmResult<Self> {
        let pairs: [(LlmStrategy, &str, Option<&String>); 4] = [
            (LlmStrategy::Ru, "cloudru", keys.cloudru.as_ref()),
            (LlmStrategy::Global, "google", keys.gemini.as_ref()),
            (LlmStrategy::Global, "anthropic", keys.anthropic.as_ref()),
            (LlmStrategy::Global, "openai", keys.openai.as_ref()),
        ];

        let mut clients = HashMap::new();
        for (strategy, provider, key) in pairs {
            let base = base_url_override
                .clone()
                .unwrap_or_else(|| provider_base_url(strategy, provider).to_string());
            let client = LlmClient::new(base, key.map(String::as_str).unwrap_or("dummy"))?;
            clients.insert((strategy, provider.to_string()), client);
        }

        Ok(Self {
            clients,
            base_url_override,
        })
    }

    fn platform_client(&self, strategy: LlmStrategy, provider: &str) -> LlmResult<&LlmClient> {
        self.clients
            .get(&(strategy, provider.to_string()))
            .ok_or_else(|| LlmError::NoClient(provider.to_string()))
    }

    /// Build a throwaway client carrying a user's key. Deliberately not
    /// inserted into the registry.
    fn byok_client(&self, strategy: LlmStrategy, provider: &str, key: &str) -> LlmResult<LlmClient> {
        let base = self
            .base_url_override
            .clone()
            .unwrap_or_else(|| provider_base_url(strategy, provider).to_string());
        LlmClient::new(base, key)
    }

    /// Run a chat completion through tier selection, BYOK handling and
    /// the escalation retry.
    pub async fn complete(
        &self,
        context: &RoutingContext,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> LlmResult<LlmResponse> {
        let tier = select_tier(&context.task);

        match self.complete_at_tier(context, tier, messages, options).await {
            Ok(response) => Ok(response),
            Err(error) if tier < LlmTier::Tier2 => {
                warn!(
                    task = context.task.name(),
                    from = %tier,
                    error = %error,
                    "call failed, retrying at tier2"
                );
                self.complete_at_tier(context, LlmTier::Tier2, messages, options)
                    .await
            }
            Err(error) => Err(error),
        }
    }

    async fn complete_at_tier(
        &self,
        context: &RoutingContext,
        tier: LlmTier,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> LlmResult<LlmResponse> {
        let config = model_config(context.strategy, tier);
        let started = Instant::now();

        if let Some(key) = context.byok_keys.key_for(&config.provider) {
            let client = self.byok_client(context.strategy, &config.provider, key)?;
            match client.chat(&config.model, messages, options).await {
                Ok(completion) => {
                    return Ok(self.finish(context, completion, config, tier, true, started));
                }
                Err(error) if error.is_auth_rejection() => {
                    // User key rejected; the call still goes through on the
                    // platform key, only cost attribution changes.
                    warn!(
                        task = context.task.name(),
                        provider = %config.provider,
                        "BYOK key rejected, falling back to platform key"
                    );
                }
                Err(error) => return Err(error),
            }
        }

        let client = self.platform_client(context.strategy, &config.provider)?;
        let completion = client.chat(&config.model, messages, options).await?;
        Ok(self.finish(context, completion, config, tier, false, started))
    }

    fn finish(
        &self,
        context: &RoutingContext,
        completion: ChatCompletion,
        config: ModelConfig,
        tier: LlmTier,
        byok: bool,
        started: Instant,
    ) -> LlmResponse {
        let cost_kopecks = if byok {
            0
        } else {
            call_cost_kopecks(completion.input_tokens, completion.output_tokens, &config)
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        info!(
            model = %config.model,
            %tier,
            strategy = %context.strategy,
            task = context.task.name(),
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            cost_kopecks,
            byok,
            duration_ms,
            "completion finished"
        );

        LlmResponse {
            content: completion.content,
            model: config.model,
            tier,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            cost_kopecks,
            duration_ms,
        }
    }

    /// Transcribe one audio chunk with the strategy's STT model.
    pub async fn transcribe(
        &self,
        strategy: LlmStrategy,
        audio: Vec<u8>,
        file_name: &str,
        language: &str,
    ) -> LlmResult<SttResponse> {
        let config = stt_config(strategy);
        let client = self.platform_client(strategy, &config.provider)?;
        let transcription = client
            .transcribe(&config.model, audio, file_name, language)
            .await?;

        Ok(SttResponse {
            transcription,
            model: config.model,
            provider: config.provider,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_ok(content: &str, input: u64, output: u64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": content}}],
            "usage": {"prompt_tokens": input, "completion_tokens": output}
        }))
    }

    fn title_task() -> LlmTask {
        LlmTask::TitleGeneration
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let router = LlmRouter::new(PlatformKeys::default()).unwrap();
        let err = router
            .platform_client(LlmStrategy::Global, "mistral")
            .unwrap_err();
        assert!(matches!(err, LlmError::NoClient(p) if p == "mistral"));
    }

    #[test]
    fn tier_selection_table() {
        assert_eq!(select_tier(&LlmTask::TitleGeneration), LlmTier::Tier0);
        assert_eq!(select_tier(&LlmTask::CtaSuggestion), LlmTier::Tier0);

        assert_eq!(
            select_tier(&LlmTask::MomentSelection {
                token_count: 150_000,
                plan: PlanTier::Free
            }),
            LlmTier::Tier3
        );
        assert_eq!(
            select_tier(&LlmTask::MomentSelection {
                token_count: 100_000,
                plan: PlanTier::Free
            }),
            LlmTier::Tier1
        );
        assert_eq!(
            select_tier(&LlmTask::MomentSelection {
                token_count: 1_000,
                plan: PlanTier::Business
            }),
            LlmTier::Tier2
        );

        assert_eq!(
            select_tier(&LlmTask::ViralityScoring {
                plan: PlanTier::Free,
                previous_score: Some(49)
            }),
            LlmTier::Tier2
        );
        assert_eq!(
            select_tier(&LlmTask::ViralityScoring {
                plan: PlanTier::Free,
                previous_score: Some(50)
            }),
            LlmTier::Tier1
        );
        assert_eq!(
            select_tier(&LlmTask::ViralityScoring {
                plan: PlanTier::Pro,
                previous_score: None
            }),
            LlmTier::Tier1
        );
    }

    #[test]
    fn cost_rounds_up_and_scales() {
        let config = ModelConfig {
            provider: "cloudru".to_string(),
            model: "m".to_string(),
            cost_input: 35.0,
            cost_output: 70.0,
        };
        // 1000 in, 500 out: (35000 + 35000) / 1e6 = 0.07 -> 1 kopeck
        assert_eq!(call_cost_kopecks(1_000, 500, &config), 1);
        // 1M in, 1M out: 35 + 70 = 105 kopecks exactly
        assert_eq!(call_cost_kopecks(1_000_000, 1_000_000, &config), 105);
        assert_eq!(call_cost_kopecks(0, 0, &config), 0);
    }

    #[tokio::test]
    async fn platform_call_accrues_cost() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(chat_ok("Заголовок", 2_000_000, 1_000_000))
            .mount(&server)
            .await;

        let router = LlmRouter::with_base_url(PlatformKeys::default(), server.uri()).unwrap();
        let context = RoutingContext {
            task: title_task(),
            strategy: LlmStrategy::Ru,
            byok_keys: ByokKeys::default(),
        };
        let response = router
            .complete(&context, &[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap();

        assert_eq!(response.tier, LlmTier::Tier0);
        // Tier0 RU is 10/10 per 1M: 20 + 10 = 30 kopecks
        assert_eq!(response.cost_kopecks, 30);
        assert_eq!(response.content, "Заголовок");
    }

    #[tokio::test]
    async fn byok_call_is_free_and_uses_user_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer user-key"))
            .respond_with(chat_ok("ok", 1_000_000, 1_000_000))
            .expect(1)
            .mount(&server)
            .await;

        let router = LlmRouter::with_base_url(PlatformKeys::default(), server.uri()).unwrap();
        let context = RoutingContext {
            task: title_task(),
            strategy: LlmStrategy::Global,
            byok_keys: ByokKeys {
                gemini: Some("user-key".to_string()),
                ..Default::default()
            },
        };
        let response = router
            .complete(&context, &[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(response.cost_kopecks, 0);
    }

    #[tokio::test]
    async fn rejected_byok_key_falls_back_to_platform_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer bad-user-key"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer platform-key"))
            .respond_with(chat_ok("ok", 1_000_000, 0))
            .expect(1)
            .mount(&server)
            .await;

        let keys = PlatformKeys {
            gemini: Some("platform-key".to_string()),
            ..Default::default()
        };
        let router = LlmRouter::with_base_url(keys, server.uri()).unwrap();
        let context = RoutingContext {
            task: title_task(),
            strategy: LlmStrategy::Global,
            byok_keys: ByokKeys {
                gemini: Some("bad-user-key".to_string()),
                ..Default::default()
            },
        };
        let response = router
            .complete(&context, &[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap();
        // Fallback means the platform paid: global tier0, 1M input at
        // 0.075 kopecks per 1M rounds up to 1.
        assert_eq!(response.cost_kopecks, 1);
    }

    #[tokio::test]
    async fn low_tier_failure_escalates_to_tier2() {
        let server = MockServer::start().await;
        // Tier0 model fails with a server error.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "GigaChat3-10B-A1.8B"})))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        // Tier2 succeeds.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "Qwen3-235B-A22B-Instruct-2507"})))
            .respond_with(chat_ok("rescued", 100, 100))
            .expect(1)
            .mount(&server)
            .await;

        let router = LlmRouter::with_base_url(PlatformKeys::default(), server.uri()).unwrap();
        let context = RoutingContext {
            task: title_task(),
            strategy: LlmStrategy::Ru,
            byok_keys: ByokKeys::default(),
        };
        let response = router
            .complete(&context, &[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(response.tier, LlmTier::Tier2);
        assert_eq!(response.content, "rescued");
    }

    #[tokio::test]
    async fn tier2_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let router = LlmRouter::with_base_url(PlatformKeys::default(), server.uri()).unwrap();
        let context = RoutingContext {
            task: LlmTask::ViralityScoring {
                plan: PlanTier::Business,
                previous_score: None,
            },
            strategy: LlmStrategy::Ru,
            byok_keys: ByokKeys::default(),
        };
        let err = router
            .complete(&context, &[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn transcribe_uses_strategy_stt_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "привет",
                "segments": []
            })))
            .mount(&server)
            .await;

        let router = LlmRouter::with_base_url(PlatformKeys::default(), server.uri()).unwrap();
        let response = router
            .transcribe(LlmStrategy::Ru, vec![0u8; 8], "chunk.mp3", "ru")
            .await
            .unwrap();
        assert_eq!(response.model, "openai/whisper-large-v3");
        assert_eq!(response.provider, "cloudru");
        assert_eq!(response.transcription.text, "привет");
    }
}
