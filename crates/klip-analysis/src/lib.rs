//! Moment selection, virality scoring and enrichment for clip generation.
//!
//! The analysis pass takes a transcript, asks the routed models for the
//! best clip windows, then enriches each window with a score, a final
//! title and an optional CTA. Every structured response is validated;
//! every failure has a deterministic fallback, so the pass always yields
//! renderable moments unless the cost cap trips.

pub mod enrich;
pub mod error;
pub mod moments;
pub mod prompts;
pub mod schema;

pub use enrich::{AnalysisInput, AnalysisOutcome, Analyzer, CostTracker, COST_CAP_KOPECKS};
pub use error::{AnalysisError, AnalysisResult};
pub use moments::{
    deduplicate_moments, deduplicate_titles, generate_fallback_moments, short_transcript_moment,
    truncate_transcript, validate_moments, MAX_CLIP_SECS, MIN_CLIP_SECS,
};
