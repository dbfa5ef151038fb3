//! Streaming video download with SSRF protection and container validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::magic::{detect_container, MAGIC_READ_LEN};
use crate::ssrf::{redact, validate_url};

/// Hard ceiling on downloaded bytes.
pub const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Whole-download wall-clock timeout.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 30 * 60;

const MAX_REDIRECTS: u32 = 5;

const USER_AGENT: &str = "KlipMaker/1.0";

/// Content types we accept from upstream. Many servers serve video as
/// octet-stream, so it stays on the list.
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/quicktime",
    "video/x-msvideo",
    "video/mpeg",
    "video/x-matroska",
    "application/octet-stream",
];

const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi"];

/// A completed download, validated and sitting in a local file.
#[derive(Debug)]
pub struct DownloadedVideo {
    /// Local path of the downloaded file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Extension guessed from content-type / URL ("mp4", "webm", ...)
    pub extension: String,
    /// Container format confirmed by magic bytes
    pub container: &'static str,
}

/// SSRF-guarded HTTP fetcher. Redirects are disabled at the client level
/// so every hop goes back through validation.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    validate_targets: bool,
}

impl Fetcher {
    pub fn new() -> FetchResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            validate_targets: true,
        })
    }

    /// A fetcher that skips target validation. Only for tests against
    /// servers bound to loopback; production code must use [`Fetcher::new`].
    pub fn unvalidated_for_local_testing() -> FetchResult<Self> {
        let mut fetcher = Self::new()?;
        fetcher.validate_targets = false;
        Ok(fetcher)
    }

    /// Fetch a URL, following up to [`MAX_REDIRECTS`] redirects manually
    /// and re-validating the target of each hop.
    pub async fn fetch(&self, url: &str) -> FetchResult<Response> {
        let mut current = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let mut redirect_count = 0u32;

        loop {
            if self.validate_targets {
                validate_url(&current).await?;
            }

            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                redirect_count += 1;
                if redirect_count > MAX_REDIRECTS {
                    return Err(FetchError::TooManyRedirects(MAX_REDIRECTS));
                }

                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(FetchError::RedirectWithoutLocation {
                        status: status.as_u16(),
                    })?;

                // Relative redirects resolve against the current URL.
                let next = current
                    .join(location)
                    .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
                info!(
                    from = %redact(&current),
                    to = %redact(&next),
                    redirect_count,
                    "following redirect"
                );
                current = next;
                continue;
            }

            return Ok(response);
        }
    }

    /// Download a video URL to `dest_dir`, enforcing the size ceiling and
    /// verifying the container signature.
    pub async fn download_video(
        &self,
        url: &str,
        dest_dir: impl AsRef<Path>,
    ) -> FetchResult<DownloadedVideo> {
        let response = self.fetch(url).await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| base_content_type(ct).to_string());

        if let Some(ct) = &content_type {
            if !ALLOWED_CONTENT_TYPES.contains(&ct.as_str()) {
                return Err(FetchError::InvalidContentType(ct.clone()));
            }
        }

        // Early reject oversized declared lengths; the streamed count below
        // is authoritative since content-length can lie.
        if let Some(len) = response.content_length() {
            if len > MAX_FILE_SIZE {
                return Err(FetchError::TooLarge {
                    received: len,
                    limit: MAX_FILE_SIZE,
                });
            }
        }

        let extension = guess_extension(content_type.as_deref(), url);
        let path = dest_dir.as_ref().join(format!("source.{extension}"));

        // Any failure past this point must not leave a partial or
        // unverified file on disk.
        let (received, container) = match stream_to_file(response, &path).await {
            Ok(result) => result,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };

        info!(size = received, extension, container, "download validated");

        Ok(DownloadedVideo {
            path,
            size: received,
            extension,
            container,
        })
    }
}

/// Stream the response body into `path`, enforcing the size ceiling, then
/// verify the container signature. The caller owns cleanup on error.
async fn stream_to_file(response: Response, path: &Path) -> FetchResult<(u64, &'static str)> {
    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        received += chunk.len() as u64;
        if received > MAX_FILE_SIZE {
            return Err(FetchError::TooLarge {
                received,
                limit: MAX_FILE_SIZE,
            });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    let container = verify_magic_bytes(path).await?;
    Ok((received, container))
}

/// Read the head of the file and match it against known signatures.
async fn verify_magic_bytes(path: &Path) -> FetchResult<&'static str> {
    let mut file = File::open(path).await?;
    let mut head = [0u8; MAGIC_READ_LEN];
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    match detect_container(&head[..filled]) {
        Some(format) => Ok(format),
        None => {
            warn!(path = %path.display(), "magic bytes check failed");
            Err(FetchError::MagicBytesMismatch)
        }
    }
}

fn base_content_type(ct: &str) -> &str {
    ct.split(';').next().unwrap_or("").trim()
}

/// Guess the file extension from the content-type header, then from the
/// URL path, defaulting to "mp4".
fn guess_extension(content_type: Option<&str>, url: &str) -> String {
    if let Some(ct) = content_type {
        let ext = match ct {
            "video/mp4" | "video/mpeg" | "video/x-matroska" | "application/octet-stream" => {
                Some("mp4")
            }
            "video/webm" => Some("webm"),
            "video/quicktime" => Some("mov"),
            "video/x-msvideo" => Some("avi"),
            _ => None,
        };
        // octet-stream says nothing about the container; let the URL path
        // override it when it carries a known extension.
        if let Some(ext) = ext {
            if ct != "application/octet-stream" {
                return ext.to_string();
            }
            if let Some(from_url) = extension_from_url(url) {
                return from_url;
            }
            return ext.to_string();
        }
    }

    extension_from_url(url).unwrap_or_else(|| "mp4".to_string())
}

fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mp4_bytes() -> Vec<u8> {
        let mut data = vec![0u8; 64];
        data[4..8].copy_from_slice(b"ftyp");
        data[8..12].copy_from_slice(b"isom");
        data
    }

    #[test]
    fn extension_guessing() {
        assert_eq!(guess_extension(Some("video/webm"), "http://a/v"), "webm");
        assert_eq!(guess_extension(Some("video/quicktime"), "http://a/v"), "mov");
        assert_eq!(
            guess_extension(Some("application/octet-stream"), "http://a/video.webm"),
            "webm"
        );
        assert_eq!(
            guess_extension(Some("application/octet-stream"), "http://a/video"),
            "mp4"
        );
        assert_eq!(guess_extension(None, "http://a/clip.AVI"), "avi");
        assert_eq!(guess_extension(None, "http://a/clip.exe"), "mp4");
        assert_eq!(guess_extension(None, "not a url"), "mp4");
    }

    #[tokio::test]
    async fn downloads_and_validates_mp4() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "video/mp4")
                    .set_body_bytes(mp4_bytes()),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::unvalidated_for_local_testing().unwrap();
        let result = fetcher
            .download_video(&format!("{}/video.mp4", server.uri()), dir.path())
            .await
            .unwrap();

        assert_eq!(result.extension, "mp4");
        assert_eq!(result.container, "mp4");
        assert_eq!(result.size, 64);
        assert!(result.path.exists());
    }

    #[tokio::test]
    async fn follows_redirects_to_the_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/video.mp4"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "video/mp4")
                    .set_body_bytes(mp4_bytes()),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::unvalidated_for_local_testing().unwrap();
        let result = fetcher
            .download_video(&format!("{}/start", server.uri()), dir.path())
            .await
            .unwrap();
        assert_eq!(result.container, "mp4");
    }

    #[tokio::test]
    async fn gives_up_after_redirect_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::unvalidated_for_local_testing().unwrap();
        let err = fetcher
            .fetch(&format!("{}/loop", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::TooManyRedirects(5)));
    }

    #[tokio::test]
    async fn rejects_html_masquerading_as_video() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>not a video</body></html>", "video/mp4"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::unvalidated_for_local_testing().unwrap();
        let err = fetcher
            .download_video(&format!("{}/video.mp4", server.uri()), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MagicBytesMismatch));
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn failed_validation_leaves_no_partial_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>not a video</body></html>", "video/mp4"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::unvalidated_for_local_testing().unwrap();
        let err = fetcher
            .download_video(&format!("{}/video.mp4", server.uri()), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MagicBytesMismatch));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(entries.is_empty(), "partial file left behind: {entries:?}");
    }

    #[tokio::test]
    async fn rejects_disallowed_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::unvalidated_for_local_testing().unwrap();
        let err = fetcher
            .download_video(&format!("{}/page", server.uri()), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidContentType(_)));
    }

    #[tokio::test]
    async fn surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::unvalidated_for_local_testing().unwrap();
        let err = fetcher
            .download_video(&format!("{}/missing.mp4", server.uri()), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(404)));
    }

    #[tokio::test]
    async fn validating_fetcher_blocks_loopback_targets() {
        let fetcher = Fetcher::new().unwrap();
        let err = fetcher.fetch("http://127.0.0.1:1/x").await.unwrap_err();
        assert!(matches!(err, FetchError::Blocked(_)));
    }
}
