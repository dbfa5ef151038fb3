//! Analysis stage: turn the transcript into enriched, ranked moments,
//! persist them as clips and fan out one render job per clip.

use tracing::{info, warn};

use klip_analysis::{AnalysisInput, Analyzer};
use klip_db::{ClipRepo, NewClip, NewUsageRecord, TranscriptRepo, UsageRepo, VideoRepo};
use klip_llm::{ByokKeys, ByokProvider};
use klip_models::{ClipFormat, ClipId, LlmStrategy, VideoStatus};
use klip_queue::{AnalyzeJob, QueueError, RenderJob};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

/// Pull the user's provider keys for this run. Only the global strategy
/// can use them; the RU strategy always runs on platform keys.
async fn byok_keys_for(ctx: &WorkerContext, job: &AnalyzeJob) -> ByokKeys {
    if job.strategy != LlmStrategy::Global {
        return ByokKeys::default();
    }
    let Some(byok) = &ctx.byok else {
        return ByokKeys::default();
    };
    ByokKeys {
        gemini: byok.peek(&job.user_id, ByokProvider::Gemini).await,
        anthropic: byok.peek(&job.user_id, ByokProvider::Anthropic).await,
        openai: byok.peek(&job.user_id, ByokProvider::Openai).await,
    }
}

pub async fn run(ctx: &WorkerContext, job: &AnalyzeJob) -> WorkerResult<()> {
    let video = VideoRepo::get(&ctx.pool, &job.video_id).await?;
    match video.status() {
        VideoStatus::Analyzing => {}
        VideoStatus::GeneratingClips | VideoStatus::Completed => {
            info!(video_id = %job.video_id, "already analyzed, skipping");
            return Ok(());
        }
        other => {
            return Err(WorkerError::terminal(format!(
                "video {} not analyzable in status {}",
                job.video_id,
                other.as_str()
            )))
        }
    }

    let transcript = TranscriptRepo::find_by_video(&ctx.pool, &job.video_id)
        .await?
        .ok_or_else(|| {
            WorkerError::terminal(format!("video {} has no transcript", job.video_id))
        })?
        .to_domain()?;

    let source_path = video.file_path.clone().ok_or_else(|| {
        WorkerError::terminal(format!("video {} has no source file", job.video_id))
    })?;

    let byok_keys = byok_keys_for(ctx, job).await;
    let used_byok = !byok_keys.is_empty();

    let input = AnalysisInput {
        transcript,
        video_duration: job.input.video_duration_seconds,
        plan: job.input.plan,
        strategy: job.strategy,
        byok_keys,
    };
    let outcome = Analyzer::new(&ctx.router).analyze(&input).await?;
    info!(
        video_id = %job.video_id,
        moments = outcome.moments.len(),
        cost_kopecks = outcome.cost_kopecks,
        "analysis complete"
    );

    let clips: Vec<NewClip> = outcome
        .moments
        .iter()
        .map(|m| NewClip {
            id: ClipId::new().0,
            title: m.title.clone(),
            start_time: m.moment.start,
            end_time: m.moment.end,
            format: ClipFormat::default(),
            virality: m.virality.clone(),
            cta: m.cta.clone(),
            subtitle_segments: m.subtitle_segments.clone(),
            watermark: job.input.plan.watermark_required(),
        })
        .collect();

    ClipRepo::create_batch(&ctx.pool, &job.video_id, &job.user_id, &clips).await?;

    UsageRepo::record(
        &ctx.pool,
        &NewUsageRecord {
            user_id: job.user_id.clone(),
            video_id: job.video_id.clone(),
            task: "analysis".to_string(),
            model: job.strategy.to_string(),
            tier: "auto".to_string(),
            input_tokens: i64::from(job.input.token_count),
            output_tokens: 0,
            cost_kopecks: outcome.cost_kopecks as i64,
            byok: used_byok,
        },
    )
    .await?;

    for (clip, moment) in clips.iter().zip(&outcome.moments) {
        let render = RenderJob::new(
            &clip.id,
            &job.video_id,
            &job.user_id,
            &source_path,
            clip.start_time,
            clip.end_time,
            clip.format,
            clip.watermark,
        )
        .with_subtitles(clip.subtitle_segments.clone())
        .with_cta(moment.cta.clone());

        match ctx.queue.enqueue(&render).await {
            Ok(_) => {}
            Err(QueueError::EnqueueFailed(msg)) => {
                warn!(clip_id = %clip.id, msg, "render already queued");
            }
            Err(e) => return Err(e.into()),
        }
    }

    // User keys are per-run; drop them once the model work is done.
    if used_byok {
        if let Some(byok) = &ctx.byok {
            if let Err(e) = byok.clear(&job.user_id).await {
                warn!(user_id = %job.user_id, error = %e, "failed to clear cached user keys");
            }
        }
    }

    Ok(())
}
