//! LLM access layer for the KlipMaker pipeline.
//!
//! Routes tasks to model tiers, tracks per-call cost in kopecks, and
//! handles user-supplied provider keys (BYOK): fresh uncached clients, a
//! one-shot platform-key fallback on credential rejection, and a
//! short-TTL encrypted Redis cache that carries keys between pipeline
//! stages without ever logging them.

pub mod byok;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod router;

pub use byok::{ByokCache, ByokProvider};
pub use client::{ChatMessage, ChatOptions, LlmClient, TranscribedSegment, Transcription};
pub use config::{model_config, provider_base_url, stt_config};
pub use error::{LlmError, LlmResult};
pub use router::{
    call_cost_kopecks, select_tier, ByokKeys, LlmResponse, LlmRouter, PlatformKeys,
    RoutingContext, SttResponse,
};
