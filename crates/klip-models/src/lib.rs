//! Shared data models for the KlipMaker pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video, transcript and clip records with status transition tables
//! - Moment candidates and enriched moments (ephemeral analysis types)
//! - Virality scoring and call-to-action metadata
//! - Subscription plan tiers and their clip caps
//! - LLM routing enums (task, strategy, tier, model config)

pub mod clip;
pub mod llm;
pub mod moment;
pub mod plan;
pub mod transcript;
pub mod video;

// Re-export common types
pub use clip::{ClipFormat, ClipId, ClipStatus, Cta, CtaPosition, SubtitleSegment, ViralityScore};
pub use llm::{LlmStrategy, LlmTask, LlmTier, ModelConfig, SttConfig};
pub use moment::{EnrichedMoment, MomentCandidate};
pub use plan::PlanTier;
pub use transcript::{Transcript, TranscriptSegment};
pub use video::{UserId, VideoId, VideoSourceType, VideoStatus};
