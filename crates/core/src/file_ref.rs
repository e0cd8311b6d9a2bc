use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// A file inside a GitHub repository, extracted from a web or raw URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FileRefError {
    #[error("url does not match a supported GitHub file url")]
    NoMatch,
}

static BLOB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://github\.com/([^/]+)/([^/]+)/blob/([^/]+)/(.+)$").expect("blob pattern")
});

static RAW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://raw\.githubusercontent\.com/([^/]+)/([^/]+)/([^/]+)/(.+)$")
        .expect("raw pattern")
});

impl FileRef {
    /// Parse one of the two accepted URL shapes:
    ///
    /// - `https://github.com/{owner}/{repo}/blob/{branch}/{path}`
    /// - `https://raw.githubusercontent.com/{owner}/{repo}/{branch}/{path}`
    ///
    /// The input is trimmed first. Owner, repo, and path must be non-empty;
    /// branch is captured but not used downstream.
    pub fn parse(input: &str) -> Result<Self, FileRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(FileRefError::NoMatch);
        }

        let caps = BLOB_RE
            .captures(input)
            .or_else(|| RAW_RE.captures(input))
            .ok_or(FileRefError::NoMatch)?;

        let parsed = Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            branch: caps[3].to_string(),
            path: caps[4].to_string(),
        };

        if parsed.owner.is_empty() || parsed.repo.is_empty() || parsed.path.is_empty() {
            return Err(FileRefError::NoMatch);
        }
        Ok(parsed)
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}:{}", self.owner, self.repo, self.branch, self.path)
    }
}
