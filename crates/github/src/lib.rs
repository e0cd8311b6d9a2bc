//! Typed client for the two GitHub contents-API calls the relay needs:
//! fetch a file (base64 content + sha) and delete it (sha required — the
//! API's optimistic-concurrency guard; we pass the value through, the server
//! enforces it).

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use gitsms_core::FileRef;
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("file not found on GitHub")]
    NotFound,
    #[error("GitHub API returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("file content is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded file content is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Response body of `GET /repos/{owner}/{repo}/contents/{path}`.
///
/// `content` is the raw base64 as served (with embedded newlines); it is
/// kept optional because an absent body is a distinct outcome for the
/// caller, not a client error.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub sha: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl RemoteFile {
    /// Decode the base64 body (GitHub wraps it in newlines) to UTF-8 text.
    pub fn decode_body(&self) -> Result<Option<String>, GithubError> {
        let Some(raw) = &self.content else {
            return Ok(None);
        };
        let clean: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = BASE64.decode(clean)?;
        Ok(Some(String::from_utf8(bytes)?))
    }
}

pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    pub fn new(token: &str) -> Result<Self, GithubError> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Create against a non-default API base URL (tests, GitHub Enterprise).
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, GithubError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("gitsms/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Fetch the file's current revision: sha + base64 content.
    pub async fn fetch_file(&self, file: &FileRef) -> Result<RemoteFile, GithubError> {
        let url = self.contents_url(file);
        debug!("GET {url}");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Delete the file. `sha` must be the revision id from the most recent
    /// fetch; a stale sha is rejected by the API.
    pub async fn delete_file(
        &self,
        file: &FileRef,
        sha: &str,
        message: &str,
    ) -> Result<(), GithubError> {
        let url = self.contents_url(file);
        debug!("DELETE {url}");
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .query(&[("message", message), ("sha", sha)])
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    fn contents_url(&self, file: &FileRef) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url,
            urlencoding::encode(&file.owner),
            urlencoding::encode(&file.repo),
            encode_path(&file.path),
        )
    }
}

/// Percent-encode each path segment while keeping `/` separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GithubError> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(GithubError::NotFound);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GithubError::Status { status, body });
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::{encode_path, GithubClient, RemoteFile};
    use gitsms_core::FileRef;

    fn file_ref() -> FileRef {
        FileRef::parse("https://github.com/octocat/my-repo/blob/main/queue/sms list.txt")
            .expect("parse")
    }

    #[test]
    fn contents_url_encodes_segments_but_keeps_separators() {
        let client = GithubClient::new("tok").expect("client");
        assert_eq!(
            client.contents_url(&file_ref()),
            "https://api.github.com/repos/octocat/my-repo/contents/queue/sms%20list.txt"
        );
    }

    #[test]
    fn with_base_url_strips_trailing_slash() {
        let client = GithubClient::with_base_url("tok", "http://localhost:9999/").expect("client");
        assert!(
            client
                .contents_url(&file_ref())
                .starts_with("http://localhost:9999/repos/")
        );
    }

    #[test]
    fn encode_path_handles_plain_paths() {
        assert_eq!(encode_path("a/b/c.txt"), "a/b/c.txt");
    }

    #[test]
    fn decode_body_strips_embedded_newlines() {
        // "phone,message" split across base64 lines the way GitHub serves it.
        let file = RemoteFile {
            sha: "abc".to_string(),
            content: Some("cGhvbmUs\nbWVzc2FnZQ==\n".to_string()),
        };
        assert_eq!(
            file.decode_body().expect("decode").as_deref(),
            Some("phone,message")
        );
    }

    #[test]
    fn decode_body_of_absent_content_is_none() {
        let file = RemoteFile {
            sha: "abc".to_string(),
            content: None,
        };
        assert!(file.decode_body().expect("decode").is_none());
    }

    #[test]
    fn decode_body_rejects_invalid_base64() {
        let file = RemoteFile {
            sha: "abc".to_string(),
            content: Some("!!! not base64 !!!".to_string()),
        };
        assert!(file.decode_body().is_err());
    }
}
