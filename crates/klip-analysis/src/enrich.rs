//! The full analysis pass: moment selection, per-moment enrichment,
//! cost tracking and plan capping.

use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use klip_llm::{ByokKeys, ChatMessage, ChatOptions, LlmRouter, RoutingContext};
use klip_models::{
    EnrichedMoment, LlmStrategy, LlmTask, MomentCandidate, PlanTier, SubtitleSegment, Transcript,
    ViralityScore,
};

use crate::error::{AnalysisError, AnalysisResult};
use crate::moments::{
    deduplicate_moments, deduplicate_titles, generate_fallback_moments, short_transcript_moment,
    truncate_transcript, validate_moments, MAX_TRANSCRIPT_TOKENS, SHORT_TRANSCRIPT_WORDS,
};
use crate::{prompts, schema};

/// Hard ceiling on LLM spend for one video, in kopecks.
pub const COST_CAP_KOPECKS: u64 = 1000;

/// Moments enriched at once. Each moment itself fans out into three
/// parallel calls.
const MOMENT_CONCURRENCY: usize = 3;

/// Windows synthesized when selection produces nothing usable.
const FALLBACK_MOMENT_COUNT: usize = 3;

const SELECTION_TEMP: f32 = 0.7;
const SELECTION_RETRY_TEMP: f32 = 0.5;
const SCORING_TEMP: f32 = 0.3;
const TITLE_TEMP: f32 = 0.8;
const CTA_TEMP: f32 = 0.6;

/// Accumulated spend for one analysis run. The cap is checked after
/// every accrual and again before each moment's enrichment begins.
pub struct CostTracker {
    spent: AtomicU64,
    cap: u64,
}

impl CostTracker {
    pub fn new(cap: u64) -> Self {
        Self {
            spent: AtomicU64::new(0),
            cap,
        }
    }

    pub fn spent(&self) -> u64 {
        self.spent.load(Ordering::Relaxed)
    }

    /// Add a call's cost; errors once the total exceeds the cap.
    pub fn record(&self, cost_kopecks: u64) -> AnalysisResult<()> {
        self.spent.fetch_add(cost_kopecks, Ordering::Relaxed);
        self.check()
    }

    pub fn check(&self) -> AnalysisResult<()> {
        let spent = self.spent();
        if spent > self.cap {
            return Err(AnalysisError::CostCapExceeded {
                spent,
                cap: self.cap,
            });
        }
        Ok(())
    }
}

/// Everything the analysis pass needs about one video.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub transcript: Transcript,
    pub video_duration: f64,
    pub plan: PlanTier,
    pub strategy: LlmStrategy,
    pub byok_keys: ByokKeys,
}

/// Moments ready for rendering, with the run's total spend.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub moments: Vec<EnrichedMoment>,
    pub cost_kopecks: u64,
}

pub struct Analyzer<'r> {
    router: &'r LlmRouter,
}

impl<'r> Analyzer<'r> {
    pub fn new(router: &'r LlmRouter) -> Self {
        Self { router }
    }

    /// Run the whole pass: select, enrich, dedup titles, rank and cap
    /// to the plan's clip allowance.
    pub async fn analyze(&self, input: &AnalysisInput) -> AnalysisResult<AnalysisOutcome> {
        let word_count = input.transcript.full_text.split_whitespace().count();
        if word_count < SHORT_TRANSCRIPT_WORDS {
            info!(word_count, "transcript too short for selection, using midpoint window");
            let moment = short_transcript_moment(input.video_duration);
            let enriched = EnrichedMoment {
                title: moment.title.clone(),
                virality: ViralityScore::from_hook_strength(moment.hook_strength),
                cta: None,
                subtitle_segments: subtitles_for(&input.transcript, &moment),
                moment,
            };
            return Ok(AnalysisOutcome {
                moments: vec![enriched],
                cost_kopecks: 0,
            });
        }

        let costs = CostTracker::new(COST_CAP_KOPECKS);

        let candidates = self.select_moments(input, &costs).await?;
        let mut enriched = self.enrich_moments(input, candidates, &costs).await?;

        enriched = deduplicate_titles(enriched);
        enriched.sort_by(|a, b| b.virality.total.cmp(&a.virality.total));
        enriched.truncate(input.plan.max_clips());

        info!(
            moments = enriched.len(),
            cost_kopecks = costs.spent(),
            "analysis finished"
        );
        Ok(AnalysisOutcome {
            moments: enriched,
            cost_kopecks: costs.spent(),
        })
    }

    /// Select candidate windows, with one lower-temperature retry and a
    /// synthesized fallback when the model never produces valid JSON.
    async fn select_moments(
        &self,
        input: &AnalysisInput,
        costs: &CostTracker,
    ) -> AnalysisResult<Vec<MomentCandidate>> {
        let text = truncate_transcript(&input.transcript.full_text, MAX_TRANSCRIPT_TOKENS);
        let token_count = Transcript::estimate_tokens(&text);

        let context = RoutingContext {
            task: LlmTask::MomentSelection {
                token_count,
                plan: input.plan,
            },
            strategy: input.strategy,
            byok_keys: input.byok_keys.clone(),
        };
        let messages = [
            ChatMessage::system(prompts::SELECTION_SYSTEM),
            ChatMessage::user(prompts::selection_user(
                &text,
                input.video_duration,
                input.plan.max_clips().min(15),
            )),
        ];

        for temperature in [SELECTION_TEMP, SELECTION_RETRY_TEMP] {
            let options = ChatOptions {
                temperature,
                json_mode: true,
                ..Default::default()
            };
            match self.router.complete(&context, &messages, &options).await {
                Ok(response) => {
                    costs.record(response.cost_kopecks)?;
                    if let Some(parsed) = schema::parse_moments(&response.content) {
                        let validated = validate_moments(parsed, input.video_duration);
                        let deduped = deduplicate_moments(validated);
                        if !deduped.is_empty() {
                            return Ok(deduped);
                        }
                    }
                    warn!(temperature, "selection response unusable, retrying");
                }
                Err(error) => {
                    warn!(temperature, error = %error, "selection call failed");
                }
            }
            costs.check()?;
        }

        warn!("selection never produced valid moments, falling back to spaced windows");
        Ok(generate_fallback_moments(
            input.video_duration,
            FALLBACK_MOMENT_COUNT,
        ))
    }

    /// Enrich candidates a few at a time, three parallel calls each.
    async fn enrich_moments(
        &self,
        input: &AnalysisInput,
        candidates: Vec<MomentCandidate>,
        costs: &CostTracker,
    ) -> AnalysisResult<Vec<EnrichedMoment>> {
        let results: Vec<AnalysisResult<EnrichedMoment>> = stream::iter(candidates)
            .map(|candidate| self.enrich_one(input, candidate, costs))
            .buffered(MOMENT_CONCURRENCY)
            .collect()
            .await;

        results.into_iter().collect()
    }

    async fn enrich_one(
        &self,
        input: &AnalysisInput,
        candidate: MomentCandidate,
        costs: &CostTracker,
    ) -> AnalysisResult<EnrichedMoment> {
        costs.check()?;

        let subtitle_segments = subtitles_for(&input.transcript, &candidate);
        let moment_text = if subtitle_segments.is_empty() {
            candidate.title.clone()
        } else {
            subtitle_segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };

        let (virality, title, cta) = tokio::join!(
            self.score_moment(input, &candidate, &moment_text, costs),
            self.finalize_title(input, &candidate, &moment_text, costs),
            self.suggest_cta(input, &candidate, &moment_text, costs),
        );

        Ok(EnrichedMoment {
            virality: virality?,
            title: title?,
            cta: cta?,
            subtitle_segments,
            moment: candidate,
        })
    }

    async fn score_moment(
        &self,
        input: &AnalysisInput,
        candidate: &MomentCandidate,
        moment_text: &str,
        costs: &CostTracker,
    ) -> AnalysisResult<ViralityScore> {
        let context = RoutingContext {
            task: LlmTask::ViralityScoring {
                plan: input.plan,
                previous_score: None,
            },
            strategy: input.strategy,
            byok_keys: input.byok_keys.clone(),
        };
        let messages = [
            ChatMessage::system(prompts::SCORING_SYSTEM),
            ChatMessage::user(prompts::scoring_user(&candidate.title, moment_text)),
        ];
        let options = ChatOptions {
            temperature: SCORING_TEMP,
            json_mode: true,
            ..Default::default()
        };

        match self.router.complete(&context, &messages, &options).await {
            Ok(response) => {
                costs.record(response.cost_kopecks)?;
                if let Some(score) = schema::parse_virality(&response.content) {
                    return Ok(score);
                }
                warn!("virality response unusable, deriving score from hook strength");
            }
            Err(error) => warn!(error = %error, "virality scoring failed"),
        }
        Ok(ViralityScore::from_hook_strength(candidate.hook_strength))
    }

    async fn finalize_title(
        &self,
        input: &AnalysisInput,
        candidate: &MomentCandidate,
        moment_text: &str,
        costs: &CostTracker,
    ) -> AnalysisResult<String> {
        let context = RoutingContext {
            task: LlmTask::TitleGeneration,
            strategy: input.strategy,
            byok_keys: input.byok_keys.clone(),
        };
        let messages = [
            ChatMessage::system(prompts::TITLE_SYSTEM),
            ChatMessage::user(prompts::title_user(&candidate.title, moment_text)),
        ];
        let options = ChatOptions {
            temperature: TITLE_TEMP,
            json_mode: true,
            ..Default::default()
        };

        match self.router.complete(&context, &messages, &options).await {
            Ok(response) => {
                costs.record(response.cost_kopecks)?;
                if let Some(title) = schema::parse_title(&response.content) {
                    return Ok(title);
                }
                warn!("title response unusable, keeping preliminary title");
            }
            Err(error) => warn!(error = %error, "title generation failed"),
        }
        Ok(truncate_title(&candidate.title))
    }

    async fn suggest_cta(
        &self,
        input: &AnalysisInput,
        candidate: &MomentCandidate,
        moment_text: &str,
        costs: &CostTracker,
    ) -> AnalysisResult<Option<klip_models::Cta>> {
        let context = RoutingContext {
            task: LlmTask::CtaSuggestion,
            strategy: input.strategy,
            byok_keys: input.byok_keys.clone(),
        };
        let messages = [
            ChatMessage::system(prompts::CTA_SYSTEM),
            ChatMessage::user(prompts::cta_user(&candidate.title, moment_text)),
        ];
        let options = ChatOptions {
            temperature: CTA_TEMP,
            json_mode: true,
            ..Default::default()
        };

        match self.router.complete(&context, &messages, &options).await {
            Ok(response) => {
                costs.record(response.cost_kopecks)?;
                if let Some(cta) = schema::parse_cta(&response.content) {
                    return Ok(Some(cta));
                }
                warn!("CTA response unusable, clip gets none");
            }
            Err(error) => warn!(error = %error, "CTA suggestion failed"),
        }
        Ok(None)
    }
}

/// Transcript segments fully inside the window, re-based to the clip.
fn subtitles_for(transcript: &Transcript, moment: &MomentCandidate) -> Vec<SubtitleSegment> {
    transcript
        .segments_within(moment.start, moment.end)
        .into_iter()
        .map(|s| SubtitleSegment {
            start: s.start,
            end: s.end,
            text: s.text,
        })
        .collect()
}

/// Preliminary titles fall back as-is up to 60 characters, longer ones
/// are cut to 57 plus an ellipsis.
fn truncate_title(title: &str) -> String {
    if title.chars().count() <= 60 {
        return title.to_string();
    }
    let cut: String = title.chars().take(57).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use klip_llm::PlatformKeys;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transcript(words: usize) -> Transcript {
        Transcript {
            segments: Vec::new(),
            full_text: vec!["слово"; words].join(" "),
            token_count: words as u32,
            language: "ru".to_string(),
            stt_model: "openai/whisper-large-v3".to_string(),
        }
    }

    fn chat_ok(body: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": body.to_string()}}],
            "usage": {"prompt_tokens": 1000, "completion_tokens": 200}
        }))
    }

    #[tokio::test]
    async fn full_pass_enriches_ranks_and_dedups_titles() {
        let server = MockServer::start().await;
        // Each task's system prompt carries a distinctive phrase.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("эксперт по вирусному"))
            .respond_with(chat_ok(json!({"moments": [
                {"start": 10, "end": 40, "title": "Первый", "reason": "r", "hook_strength": 20},
                {"start": 100, "end": 140, "title": "Второй", "reason": "r", "hook_strength": 15}
            ]})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("потенциал короткого клипа"))
            .respond_with(chat_ok(json!(
                {"hook": 20, "engagement": 15, "flow": 10, "trend": 5, "tips": ["быстрее"]}
            )))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("цепляющие заголовки"))
            .respond_with(chat_ok(json!({"title": "Хит"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("призыв к действию"))
            .respond_with(chat_ok(json!(
                {"text": "Подпишись на наш канал", "position": "end", "duration": 4}
            )))
            .mount(&server)
            .await;

        let router = LlmRouter::with_base_url(PlatformKeys::default(), server.uri()).unwrap();
        let analyzer = Analyzer::new(&router);
        let input = AnalysisInput {
            transcript: transcript(150),
            video_duration: 300.0,
            plan: PlanTier::Free,
            strategy: LlmStrategy::Ru,
            byok_keys: ByokKeys::default(),
        };

        let outcome = analyzer.analyze(&input).await.unwrap();
        assert_eq!(outcome.moments.len(), 2);
        let titles: Vec<&str> = outcome.moments.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Хит", "Хит — Ч.2"]);
        assert_eq!(outcome.moments[0].virality.total, 50);
        assert!(outcome.moments[0].cta.is_some());
        assert!(outcome.cost_kopecks >= 1);
    }

    #[tokio::test]
    async fn short_transcript_skips_the_model_entirely() {
        let server = MockServer::start().await;
        let router = LlmRouter::with_base_url(PlatformKeys::default(), server.uri()).unwrap();
        let analyzer = Analyzer::new(&router);
        let input = AnalysisInput {
            transcript: transcript(10),
            video_duration: 90.0,
            plan: PlanTier::Free,
            strategy: LlmStrategy::Ru,
            byok_keys: ByokKeys::default(),
        };

        let outcome = analyzer.analyze(&input).await.unwrap();
        assert_eq!(outcome.moments.len(), 1);
        assert_eq!(outcome.moments[0].title, "Основной момент");
        assert_eq!(outcome.cost_kopecks, 0);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unparsable_model_output_falls_back_everywhere() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(chat_ok(json!("это не тот формат")))
            .mount(&server)
            .await;

        let router = LlmRouter::with_base_url(PlatformKeys::default(), server.uri()).unwrap();
        let analyzer = Analyzer::new(&router);
        let input = AnalysisInput {
            transcript: transcript(150),
            video_duration: 300.0,
            plan: PlanTier::Free,
            strategy: LlmStrategy::Ru,
            byok_keys: ByokKeys::default(),
        };

        let outcome = analyzer.analyze(&input).await.unwrap();
        assert_eq!(outcome.moments.len(), 3);
        let titles: Vec<&str> = outcome.moments.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Момент 1", "Момент 2", "Момент 3"]);
        for moment in &outcome.moments {
            assert_eq!(moment.virality, ViralityScore::from_hook_strength(10));
            assert!(moment.cta.is_none());
        }
    }

    #[test]
    fn tracker_allows_reaching_the_cap_exactly() {
        let costs = CostTracker::new(100);
        assert!(costs.record(60).is_ok());
        assert!(costs.record(40).is_ok());
        assert!(costs.check().is_ok());
        let err = costs.record(1).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::CostCapExceeded { spent: 101, cap: 100 }
        ));
    }

    #[test]
    fn title_fallback_truncates_long_titles() {
        assert_eq!(truncate_title("Короткий"), "Короткий");
        let long = "ы".repeat(80);
        let truncated = truncate_title(&long);
        assert_eq!(truncated.chars().count(), 60);
        assert!(truncated.ends_with("..."));
    }
}
