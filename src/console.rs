use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::store::{CollectionKind, FetchOutcome, ItemId, ListStore, MutationState};
use crate::view;

pub const HELP: &str = "\
commands:
  l            show the current page
  n / p        next / previous page
  g <page>     go to page
  /<keyword>   search (a bare / clears it)
  x <id>       toggle selection of a release id or tag name
  a            toggle selection of every visible row
  c            clear selection
  d [<id>]     delete the selection, or one item
  r            refresh, bypassing the cache
  C            drop every cached page and reload
  t            switch between releases and tags
  h            help
  q            quit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Next,
    Previous,
    GoTo(u32),
    Search(String),
    Toggle(String),
    ToggleAll,
    ClearSelection,
    Delete(Option<String>),
    Refresh,
    ClearCache,
    Switch,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if let Some(keyword) = line.strip_prefix('/') {
            return Ok(Command::Search(keyword.trim().to_string()));
        }

        let (head, arg) = match line.split_once(char::is_whitespace) {
            Some((head, arg)) => (head, Some(arg.trim())),
            None => (line, None),
        };

        match (head, arg) {
            ("" | "l", None) => Ok(Command::Show),
            ("n", None) => Ok(Command::Next),
            ("p", None) => Ok(Command::Previous),
            ("g", Some(page)) => page
                .parse::<u32>()
                .ok()
                .filter(|p| *p > 0)
                .map(Command::GoTo)
                .ok_or_else(|| format!("Invalid page {page:?}")),
            ("x", Some(id)) => Ok(Command::Toggle(id.to_string())),
            ("a", None) => Ok(Command::ToggleAll),
            ("c", None) => Ok(Command::ClearSelection),
            ("d", id) => Ok(Command::Delete(id.map(str::to_string))),
            ("r", None) => Ok(Command::Refresh),
            ("C", None) => Ok(Command::ClearCache),
            ("t", None) => Ok(Command::Switch),
            ("h" | "?", None) => Ok(Command::Help),
            ("q", None) => Ok(Command::Quit),
            _ => Err(format!("Unknown command {line:?}, type h for help")),
        }
    }
}

/// Line-driven front end over a shared list store.
pub struct Console {
    store: Arc<ListStore>,
}

impl Console {
    pub fn new(store: Arc<ListStore>) -> Self {
        Self { store }
    }

    fn item_id(&self, raw: &str) -> Result<ItemId, String> {
        match self.store.active() {
            CollectionKind::Releases => raw
                .parse::<u64>()
                .map(ItemId::Release)
                .map_err(|_| format!("Invalid release id {raw:?}")),
            CollectionKind::Tags => Ok(ItemId::Tag(raw.to_string())),
        }
    }

    fn current_page(&self) -> (u32, bool) {
        match self.store.active() {
            CollectionKind::Releases => {
                let view = self.store.releases();
                (view.page, view.has_next_page)
            }
            CollectionKind::Tags => {
                let view = self.store.tags();
                (view.page, view.has_next_page)
            }
        }
    }

    async fn go_to(&self, page: u32) -> FetchOutcome {
        let keyword = self.store.debounced_keyword();
        self.store.fetch_page(self.store.active(), page, &keyword).await
    }

    pub fn render(&self) -> String {
        let selection = self.store.selection();
        let kind = self.store.active();
        let mut out = format!("== {kind}");
        let keyword = self.store.search_keyword();
        if self.store.debounced_keyword() != keyword {
            out.push_str(&format!(" (search {keyword:?} pending)"));
        } else if self.store.is_searching() {
            out.push_str(&format!(" matching {keyword:?}"));
        }
        match self.store.last_mutation() {
            MutationState::Pending => out.push_str(" | deleting"),
            MutationState::RolledBack { .. } => out.push_str(" | last delete rolled back"),
            MutationState::Idle | MutationState::Applied { .. } => {}
        }
        out.push('\n');

        out.push_str(&match kind {
            CollectionKind::Releases => view::releases_table(&self.store.releases(), &selection),
            CollectionKind::Tags => view::tags_table(&self.store.tags(), &selection),
        });
        out
    }

    /// Runs one command and returns the text to show. `None` means quit.
    pub async fn execute(&self, command: Command) -> Option<String> {
        let notice = match command {
            Command::Quit => return None,
            Command::Help => return Some(HELP.to_string()),
            Command::Show => None,
            Command::Next => {
                let (page, has_next) = self.current_page();
                if has_next {
                    self.go_to(page + 1).await;
                    None
                } else {
                    Some("Already on the last page".to_string())
                }
            }
            Command::Previous => {
                let (page, _) = self.current_page();
                if page > 1 {
                    self.go_to(page - 1).await;
                    None
                } else {
                    Some("Already on the first page".to_string())
                }
            }
            Command::GoTo(page) => {
                self.go_to(page).await;
                None
            }
            Command::Search(keyword) => {
                self.store.search(keyword);
                Some("Searching, press enter to refresh the view".to_string())
            }
            Command::Toggle(raw) => match self.item_id(&raw) {
                Ok(id) => {
                    self.store.toggle_select(id);
                    None
                }
                Err(e) => Some(e),
            },
            Command::ToggleAll => {
                self.store.toggle_select_all_visible();
                None
            }
            Command::ClearSelection => {
                self.store.clear_selection();
                None
            }
            Command::Delete(target) => {
                let outcome = match target {
                    Some(raw) => match self.item_id(&raw) {
                        Ok(id) => self.store.delete_single(id).await,
                        Err(e) => return Some(e),
                    },
                    None => self.store.delete_selected().await,
                };
                Some(match outcome {
                    MutationState::Applied { deleted } => {
                        format!("Deleted {deleted} {}", self.store.active())
                    }
                    MutationState::RolledBack { error } => format!("Delete failed: {error}"),
                    MutationState::Idle | MutationState::Pending => "Nothing selected".to_string(),
                })
            }
            Command::Refresh => {
                self.store.force_refresh(self.store.active()).await;
                None
            }
            Command::ClearCache => {
                self.store.clear_cache();
                let (page, _) = self.current_page();
                self.go_to(page).await;
                Some("Cache cleared".to_string())
            }
            Command::Switch => {
                let next = match self.store.active() {
                    CollectionKind::Releases => CollectionKind::Tags,
                    CollectionKind::Tags => CollectionKind::Releases,
                };
                self.store.set_active(next);
                self.go_to(1).await;
                None
            }
        };

        let mut out = self.render();
        if let Some(notice) = notice {
            out.push_str(&notice);
            out.push('\n');
        }
        Some(out)
    }

    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.go_to(1).await;
        output.write_all(self.render().as_bytes()).await?;

        let mut lines = input.lines();
        loop {
            output.write_all(b"> ").await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let text = match line.parse::<Command>() {
                Ok(command) => match self.execute(command).await {
                    Some(text) => text,
                    None => break,
                },
                Err(e) => format!("{e}\n"),
            };
            output.write_all(text.as_bytes()).await?;
        }

        output.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, Page, ReleasesApi};
    use crate::github::{DeleteSummary, Release, Tag};
    use crate::store::StoreOptions;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Releases(Mutex<Vec<u64>>);

    fn release(id: u64) -> Release {
        serde_json::from_value(serde_json::json!({ "id": id, "tag_name": format!("v{id}") })).unwrap()
    }

    #[async_trait]
    impl ReleasesApi for Releases {
        async fn list_releases(&self, page: u32, per_page: u32) -> ApiResponse<Page<Release>> {
            let items: Vec<Release> = self
                .0
                .lock()
                .iter()
                .skip(((page - 1) * per_page) as usize)
                .take(per_page as usize)
                .map(|id| release(*id))
                .collect();
            ApiResponse::ok(Page::from_listing(items, per_page))
        }

        async fn list_tags(&self, _page: u32, per_page: u32) -> ApiResponse<Page<Tag>> {
            ApiResponse::ok(Page::from_listing(Vec::new(), per_page))
        }

        async fn delete_release(&self, id: u64) -> ApiResponse<DeleteSummary> {
            self.delete_releases(&[id]).await
        }

        async fn delete_tag(&self, _name: &str) -> ApiResponse<DeleteSummary> {
            ApiResponse::failure("no tags")
        }

        async fn delete_releases(&self, ids: &[u64]) -> ApiResponse<DeleteSummary> {
            let mut all = self.0.lock();
            let before = all.len();
            all.retain(|id| !ids.contains(id));
            DeleteSummary::tally("releases", before - all.len(), ids.len()).into()
        }

        async fn delete_tags(&self, _names: &[String]) -> ApiResponse<DeleteSummary> {
            ApiResponse::failure("no tags")
        }
    }

    fn console(ids: impl IntoIterator<Item = u64>) -> Console {
        let api = Arc::new(Releases(Mutex::new(ids.into_iter().collect())));
        let options = StoreOptions { page_size: 3, ..StoreOptions::default() };
        Console::new(Arc::new(ListStore::new(api, options)))
    }

    #[test]
    fn parses_commands() {
        assert_eq!("".parse::<Command>(), Ok(Command::Show));
        assert_eq!("g 3".parse::<Command>(), Ok(Command::GoTo(3)));
        assert_eq!("/ beta ".parse::<Command>(), Ok(Command::Search("beta".into())));
        assert_eq!("x v1.0".parse::<Command>(), Ok(Command::Toggle("v1.0".into())));
        assert_eq!("d".parse::<Command>(), Ok(Command::Delete(None)));
        assert_eq!("C".parse::<Command>(), Ok(Command::ClearCache));
        assert_eq!("d 7".parse::<Command>(), Ok(Command::Delete(Some("7".into()))));
        assert!("g 0".parse::<Command>().is_err());
        assert!("zz".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn pages_forward_and_back() {
        let console = console(1..=5);
        console.execute(Command::Show).await;
        console.go_to(1).await;

        let out = console.execute(Command::Next).await.unwrap();
        assert!(out.contains("page 2"));
        let out = console.execute(Command::Next).await.unwrap();
        assert!(out.ends_with("Already on the last page\n"));
        let out = console.execute(Command::Previous).await.unwrap();
        assert!(out.contains("page 1 | more available"));
    }

    #[tokio::test]
    async fn selected_rows_are_deleted() {
        let console = console(1..=3);
        console.go_to(1).await;

        console.execute(Command::Toggle("2".into())).await;
        let out = console.execute(Command::Delete(None)).await.unwrap();

        assert!(out.ends_with("Deleted 1 releases\n"));
        assert!(!out.contains("[x]"));
        assert_eq!(console.store.visible_ids(), vec![ItemId::Release(1), ItemId::Release(3)]);
    }

    #[tokio::test]
    async fn clearing_the_cache_shows_upstream_changes() {
        let api = Arc::new(Releases(Mutex::new(vec![1, 2, 3])));
        let store = Arc::new(ListStore::new(api.clone(), StoreOptions::default()));
        let console = Console::new(store);
        console.go_to(1).await;

        api.0.lock().retain(|id| *id != 2);
        console.execute(Command::Show).await;
        assert_eq!(console.store.visible_ids().len(), 3);

        let out = console.execute(Command::ClearCache).await.unwrap();
        assert!(out.ends_with("Cache cleared\n"));
        assert_eq!(console.store.visible_ids(), vec![ItemId::Release(1), ItemId::Release(3)]);
    }

    #[tokio::test]
    async fn failed_delete_is_flagged_in_the_header() {
        let console = console(1..=2);
        console.go_to(1).await;

        let out = console.execute(Command::Delete(Some("x1".into()))).await.unwrap();
        assert_eq!(out, "Invalid release id \"x1\"");

        console.store.set_active(CollectionKind::Tags);
        let out = console.execute(Command::Delete(Some("v1".into()))).await.unwrap();
        assert!(out.starts_with("== tags | last delete rolled back\n"));
        assert!(out.ends_with("Delete failed: no tags\n"));
    }

    #[tokio::test]
    async fn quit_ends_the_session() {
        let console = console(1..=2);
        let input: &[u8] = b"a\nq\nl\n";
        let mut output = Vec::new();

        console.run(input, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches("[x]").count(), 2);
        assert_eq!(text.matches("> ").count(), 2);
    }
}
