use std::fs;
use std::io;
use std::path::Path;

use super::Changelog;
use super::assets::DownloadFile;

/// Values substituted into a release page template. Each field fills the
/// `{{NAME}}` placeholder of the same name and is read from `REPLACE_NAME`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleasePageData {
    pub version: String,
    pub created_at: String,
    pub commit_hash: String,
    pub private_branch: String,
    pub trigger_event: String,
    pub trigger_repo: String,
    pub trigger_branch: String,
    pub trigger_commit: String,
    pub trigger_author: String,
    pub commit_message: String,
    pub github_base_url: String,
    pub repo_path: String,
    /// Pre-serialized JSON array.
    pub download_files: String,
    /// Raw changelog text; rendered to HTML on substitution.
    pub changelog: String,
}

impl ReleasePageData {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("REPLACE_{name}")).unwrap_or_default();
        let download_files = lookup("REPLACE_DOWNLOAD_FILES")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "[]".to_string());

        Self {
            version: get("VERSION"),
            created_at: get("CREATED_AT"),
            commit_hash: get("COMMIT_HASH"),
            private_branch: get("PRIVATE_BRANCH"),
            trigger_event: get("TRIGGER_EVENT"),
            trigger_repo: get("TRIGGER_REPO"),
            trigger_branch: get("TRIGGER_BRANCH"),
            trigger_commit: get("TRIGGER_COMMIT"),
            trigger_author: get("TRIGGER_AUTHOR"),
            commit_message: get("COMMIT_MESSAGE"),
            github_base_url: get("GITHUB_BASE_URL"),
            repo_path: get("REPO_PATH"),
            download_files,
            changelog: get("CHANGELOG"),
        }
    }

    pub fn with_download_files(mut self, files: &[DownloadFile]) -> Result<Self, serde_json::Error> {
        self.download_files = serde_json::to_string(files)?;
        Ok(self)
    }

    fn replacements(&self) -> Vec<(&'static str, String)> {
        vec![
            ("VERSION", self.version.clone()),
            ("CREATED_AT", self.created_at.clone()),
            ("COMMIT_HASH", self.commit_hash.clone()),
            ("PRIVATE_BRANCH", self.private_branch.clone()),
            ("TRIGGER_EVENT", self.trigger_event.clone()),
            ("TRIGGER_REPO", self.trigger_repo.clone()),
            ("TRIGGER_BRANCH", self.trigger_branch.clone()),
            ("TRIGGER_COMMIT", self.trigger_commit.clone()),
            ("TRIGGER_AUTHOR", self.trigger_author.clone()),
            ("COMMIT_MESSAGE", self.commit_message.clone()),
            ("GITHUB_BASE_URL", self.github_base_url.clone()),
            ("REPO_PATH", self.repo_path.clone()),
            ("DOWNLOAD_FILES", self.download_files.clone()),
            ("CHANGELOG", Changelog::parse(&self.changelog).to_html()),
        ]
    }
}

/// Replaces every `{{NAME}}` placeholder. Unknown placeholders are left alone
/// and substituted values are never rescanned.
pub fn render_template(template: &str, data: &ReleasePageData) -> String {
    let replacements = data.replacements();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            let name = &after[..end];
            replacements
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (value, end))
        });

        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders the template at `path` in place.
pub fn process_file(path: &Path, data: &ReleasePageData) -> io::Result<()> {
    let template = fs::read_to_string(path)?;
    let rendered = render_template(&template, data);
    fs::write(path, rendered)?;
    log::info!("Rendered release page {}", path.display());
    Ok(())
}
