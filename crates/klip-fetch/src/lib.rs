//! SSRF-safe video fetching for the KlipMaker pipeline.
//!
//! Every outbound URL is validated before any request: scheme and
//! credential checks, DNS resolution with private-range blocking of every
//! resolved address, and manual redirect following that re-validates each
//! hop. Downloads stream to disk under a hard byte ceiling and are
//! accepted only when the file head matches a known video container
//! signature.

pub mod download;
pub mod error;
pub mod magic;
pub mod ssrf;

pub use download::{DownloadedVideo, Fetcher, DOWNLOAD_TIMEOUT_SECS, MAX_FILE_SIZE};
pub use error::{FetchError, FetchResult};
pub use magic::detect_container;
pub use ssrf::{is_private_ip, validate_url};
