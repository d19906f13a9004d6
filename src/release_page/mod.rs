pub mod assets;
pub mod render;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::utils::html_escape;

/// Phrase that closes a branch header line ("branch's latest commits").
pub const BRANCH_MARKER: &str = "分支最新提交";

static BRANCH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"####.*`([^`]+)`.*{BRANCH_MARKER}")).expect("branch header pattern")
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-\s+").expect("bullet pattern"));

static LEADING_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s*").expect("leading bullet pattern"));

static COMMIT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(.*?)\s*\(<a[^>]*href="([^"]*)"[^>]*>([^<]*)</a>\)"#).expect("commit link pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchCommits {
    pub branch: String,
    pub commits: Vec<String>,
}

/// Commit lists per branch, in the order the branch headers first appear.
/// Branches without commit lines are never present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Changelog {
    sections: Vec<BranchCommits>,
}

impl Changelog {
    pub fn parse(text: &str) -> Self {
        let mut changelog = Changelog::default();
        let mut current: Option<(String, Vec<String>)> = None;

        for line in text.lines() {
            if let Some(caps) = BRANCH_HEADER.captures(line) {
                if let Some((branch, commits)) = current.take() {
                    changelog.flush(branch, commits);
                }
                current = Some((caps[1].to_string(), Vec::new()));
                continue;
            }

            let Some((_, commits)) = current.as_mut() else {
                continue;
            };
            if BULLET.is_match(line.trim()) {
                let entry = LEADING_BULLET.replace(line, "");
                let entry = entry.trim();
                if !entry.is_empty() {
                    commits.push(entry.to_string());
                }
            }
        }

        if let Some((branch, commits)) = current {
            changelog.flush(branch, commits);
        }
        log::debug!("Parsed changelog with {} branches", changelog.len());
        changelog
    }

    /// A repeated header replaces the earlier section but keeps its position.
    fn flush(&mut self, branch: String, commits: Vec<String>) {
        if commits.is_empty() {
            return;
        }
        match self.sections.iter_mut().find(|s| s.branch == branch) {
            Some(section) => section.commits = commits,
            None => self.sections.push(BranchCommits { branch, commits }),
        }
    }

    pub fn get(&self, branch: &str) -> Option<&[String]> {
        self.sections
            .iter()
            .find(|s| s.branch == branch)
            .map(|s| s.commits.as_slice())
    }

    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.branch.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// HTML for the release page: one section per branch with a list of
    /// commits. All text taken from the changelog is escaped.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for section in &self.sections {
            html.push_str(&format!(
                "<section class=\"branch\"><h4>{}</h4><ul>",
                html_escape(&section.branch)
            ));
            for commit in &section.commits {
                html.push_str("<li>");
                html.push_str(&CommitEntry::parse(commit).to_html());
                html.push_str("</li>");
            }
            html.push_str("</ul></section>");
        }
        html
    }
}

/// One commit line of a changelog section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CommitEntry {
    /// `message (<a href="url">hash</a>)`
    Linked {
        message: String,
        url: String,
        short_hash: String,
    },
    Plain(String),
}

impl CommitEntry {
    pub fn parse(text: &str) -> Self {
        match COMMIT_LINK.captures(text) {
            Some(caps) => CommitEntry::Linked {
                message: caps[1].trim().to_string(),
                url: caps[2].to_string(),
                short_hash: caps[3].trim().to_string(),
            },
            None => CommitEntry::Plain(text.to_string()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CommitEntry::Linked { message, .. } => message,
            CommitEntry::Plain(text) => text,
        }
    }

    fn to_html(&self) -> String {
        match self {
            CommitEntry::Linked { message, url, short_hash } => format!(
                "{} (<a href=\"{}\"><code>{}</code></a>)",
                html_escape(message),
                html_escape(url),
                html_escape(short_hash)
            ),
            CommitEntry::Plain(text) => html_escape(text).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BRANCHES: &str = "\
### 更新内容

#### 📋 `dev` 分支最新提交
  - feat: add login (<a href=\"https://github.com/o/r/commit/aaa1111\">aaa1111</a>)
  - fix: typo
  - chore: bump deps

#### 📋 `main` 分支最新提交
- merge dev
-   release v1.0
  - docs: readme

Some trailing text
";

    #[test]
    fn parses_two_branches_with_three_commits_each() {
        let changelog = Changelog::parse(TWO_BRANCHES);

        assert_eq!(changelog.len(), 2);
        assert_eq!(changelog.branches().collect::<Vec<_>>(), vec!["dev", "main"]);
        assert_eq!(
            changelog.get("dev").unwrap(),
            [
                "feat: add login (<a href=\"https://github.com/o/r/commit/aaa1111\">aaa1111</a>)",
                "fix: typo",
                "chore: bump deps",
            ]
        );
        assert_eq!(
            changelog.get("main").unwrap(),
            ["merge dev", "release v1.0", "docs: readme"]
        );
    }

    #[test]
    fn branch_without_commits_is_omitted() {
        let text = "#### `dev` 分支最新提交\n\n#### `main` 分支最新提交\n- one\n";
        let changelog = Changelog::parse(text);

        assert_eq!(changelog.len(), 1);
        assert!(changelog.get("dev").is_none());
        assert_eq!(changelog.get("main").unwrap(), ["one"]);
    }

    #[test]
    fn bullets_outside_a_section_are_ignored() {
        let text = "- stray\n#### `dev` 分支最新提交\n- kept\n-\n-nospace\n";
        let changelog = Changelog::parse(text);
        assert_eq!(changelog.get("dev").unwrap(), ["kept"]);
    }

    #[test]
    fn repeated_branch_replaces_in_place() {
        let text = "\
#### `dev` 分支最新提交
- old
#### `main` 分支最新提交
- m
#### `dev` 分支最新提交
- new
";
        let changelog = Changelog::parse(text);
        assert_eq!(changelog.branches().collect::<Vec<_>>(), vec!["dev", "main"]);
        assert_eq!(changelog.get("dev").unwrap(), ["new"]);
    }

    #[test]
    fn headers_without_marker_do_not_start_sections() {
        let changelog = Changelog::parse("#### `dev` notes\n- one\n");
        assert!(changelog.is_empty());
    }

    #[test]
    fn commit_entry_splits_link() {
        let entry = CommitEntry::parse(
            "fix: crash on start (<a href=\"https://github.com/o/r/commit/abc1234\">abc1234</a>)",
        );
        assert_eq!(
            entry,
            CommitEntry::Linked {
                message: "fix: crash on start".to_string(),
                url: "https://github.com/o/r/commit/abc1234".to_string(),
                short_hash: "abc1234".to_string(),
            }
        );
        assert_eq!(CommitEntry::parse("plain text"), CommitEntry::Plain("plain text".into()));
        assert_eq!(CommitEntry::parse("plain text").message(), "plain text");
    }

    #[test]
    fn html_escapes_changelog_text() {
        let changelog = Changelog::parse(
            "#### `dev` 分支最新提交\n- <script> & co (<a href=\"https://x/c/1\">1234567</a>)\n",
        );
        assert_eq!(
            changelog.to_html(),
            "<section class=\"branch\"><h4>dev</h4><ul><li>&lt;script&gt; &amp; co \
             (<a href=\"https://x/c/1\"><code>1234567</code></a>)</li></ul></section>"
        );
    }
}
