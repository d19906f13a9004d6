//! Plain-text rendering of the list store for the terminal.

use std::collections::HashSet;
use std::fmt::Write;

use crate::github::{Release, Tag};
use crate::store::{CollectionView, ItemId};
use crate::utils::{short_sha, truncate};

const NAME_WIDTH: usize = 32;
const MESSAGE_WIDTH: usize = 48;

fn mark(selected: bool) -> &'static str {
    if selected { "[x]" } else { "[ ]" }
}

pub fn releases_table(view: &CollectionView<Release>, selection: &HashSet<ItemId>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "    {:<12} {:<20} {:<NAME_WIDTH$} {:<12} {:<16} {:<17} {:>6}",
        "ID", "TAG", "NAME", "FLAGS", "AUTHOR", "PUBLISHED", "ASSETS"
    );

    for release in &view.items {
        let mut flags = Vec::new();
        if release.draft {
            flags.push("draft");
        }
        if release.prerelease {
            flags.push("pre");
        }
        let author = release.author.as_ref().map(|a| a.login.as_str()).unwrap_or("-");
        let published = release
            .published_at
            .or(release.created_at)
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        let _ = writeln!(
            out,
            "{} {:<12} {:<20} {:<NAME_WIDTH$} {:<12} {:<16} {:<17} {:>6}",
            mark(selection.contains(&ItemId::from(release))),
            release.id,
            truncate(&release.tag_name, 20),
            truncate(release.display_name(), NAME_WIDTH),
            flags.join(","),
            truncate(author, 16),
            published,
            release.assets.len()
        );
    }

    if view.items.is_empty() && !view.loading {
        out.push_str("    (no releases)\n");
    }
    out.push_str(&status_line(view));
    out
}

pub fn tags_table(view: &CollectionView<Tag>, selection: &HashSet<ItemId>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "    {:<NAME_WIDTH$} {:<8} {}", "NAME", "COMMIT", "MESSAGE");

    for tag in &view.items {
        let message = tag
            .commit
            .message
            .as_deref()
            .and_then(|m| m.lines().next())
            .unwrap_or("");
        let _ = writeln!(
            out,
            "{} {:<NAME_WIDTH$} {:<8} {}",
            mark(selection.contains(&ItemId::from(tag))),
            truncate(&tag.name, NAME_WIDTH),
            short_sha(&tag.commit.sha),
            truncate(message, MESSAGE_WIDTH)
        );
    }

    if view.items.is_empty() && !view.loading {
        out.push_str("    (no tags)\n");
    }
    out.push_str(&status_line(view));
    out
}

pub fn status_line<T>(view: &CollectionView<T>) -> String {
    let mut line = format!("page {}", view.page);
    if view.has_next_page {
        line.push_str(" | more available");
    }
    if view.loading {
        line.push_str(" | loading");
    }
    if let Some(error) = &view.error {
        let _ = write!(line, " | error: {error}");
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::TagCommit;

    fn view<T>(items: Vec<T>) -> CollectionView<T> {
        CollectionView { items, page: 2, has_next_page: true, loading: false, error: None }
    }

    #[test]
    fn tag_rows_show_selection_and_short_sha() {
        let tag = Tag {
            name: "v1.0.0".to_string(),
            commit: TagCommit {
                sha: "0123456789abcdef".to_string(),
                url: String::new(),
                message: Some("release 1.0\n\nlong body".to_string()),
            },
            zipball_url: String::new(),
            tarball_url: String::new(),
        };
        let selection = HashSet::from([ItemId::Tag("v1.0.0".to_string())]);
        let out = tags_table(&view(vec![tag]), &selection);

        let row = out.lines().nth(1).unwrap();
        assert!(row.starts_with("[x] v1.0.0"));
        assert!(row.contains("0123456 "));
        assert!(row.ends_with("release 1.0"));
        assert_eq!(out.lines().last(), Some("page 2 | more available"));
    }

    #[test]
    fn empty_collection_says_so() {
        let mut v: CollectionView<Release> = view(Vec::new());
        v.has_next_page = false;
        v.error = Some("rate limited".to_string());
        let out = releases_table(&v, &HashSet::new());
        assert!(out.contains("(no releases)"));
        assert!(out.ends_with("page 2 | error: rate limited\n"));
    }
}
