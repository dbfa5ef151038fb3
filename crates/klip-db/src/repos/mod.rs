pub mod clip_repo;
pub mod transcript_repo;
pub mod usage_repo;
pub mod video_repo;

pub use clip_repo::ClipRepo;
pub use transcript_repo::TranscriptRepo;
pub use usage_repo::UsageRepo;
pub use video_repo::VideoRepo;
