pub mod client;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use client::GithubClient;

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected GitHub payload: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub content_type: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub target_commitish: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    /// Falls back to the tag when the release has no title.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.tag_name,
        }
    }

    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        let hit = |field: &str| field.to_lowercase().contains(&needle);
        self.name.as_deref().is_some_and(hit)
            || self.body.as_deref().is_some_and(hit)
            || hit(&self.tag_name)
    }

    /// The commit matches when the target is the full hash, the short hash,
    /// or begins with the short hash.
    pub fn targets_commit(&self, hash: &str, short_hash: &str) -> bool {
        let target = self.target_commitish.as_str();
        if target.is_empty() {
            return false;
        }
        (!hash.is_empty() && target == hash)
            || (!short_hash.is_empty() && (target == short_hash || target.starts_with(short_hash)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCommit {
    pub sha: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub commit: TagCommit,
    #[serde(default)]
    pub zipball_url: String,
    #[serde(default)]
    pub tarball_url: String,
}

impl Tag {
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        self.name.to_lowercase().contains(&keyword.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetail,
    pub author: Option<Author>,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub html_url: String,
    pub default_branch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteSummary {
    pub success: bool,
    pub message: String,
    pub deleted_count: usize,
}

impl DeleteSummary {
    pub fn tally(kind: &str, deleted: usize, requested: usize) -> Self {
        Self {
            success: deleted > 0,
            message: format!("Successfully deleted {deleted}/{requested} {kind}"),
            deleted_count: deleted,
        }
    }

    pub fn is_partial(&self, requested: usize) -> bool {
        self.success && self.deleted_count < requested
    }
}
