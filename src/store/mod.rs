pub mod cache;
pub mod debounce;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::{ApiResponse, Page, ReleasesApi};
use crate::configuration::Configuration;
use crate::github::{DeleteSummary, Release, Tag};
use cache::{CacheKey, PageCache};
use debounce::Debouncer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Releases,
    Tags,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Releases => f.write_str("releases"),
            CollectionKind::Tags => f.write_str("tags"),
        }
    }
}

/// Releases are identified by numeric id, tags by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
    Release(u64),
    Tag(String),
}

impl ItemId {
    pub fn kind(&self) -> CollectionKind {
        match self {
            ItemId::Release(_) => CollectionKind::Releases,
            ItemId::Tag(_) => CollectionKind::Tags,
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Release(id) => write!(f, "{id}"),
            ItemId::Tag(name) => f.write_str(name),
        }
    }
}

impl From<&Release> for ItemId {
    fn from(release: &Release) -> Self {
        ItemId::Release(release.id)
    }
}

impl From<&Tag> for ItemId {
    fn from(tag: &Tag) -> Self {
        ItemId::Tag(tag.name.clone())
    }
}

/// How deletions reach the visible collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Delete first, then drop the cache and fetch the current page again.
    #[default]
    Refetch,
    /// Remove rows immediately and restore rows and selection on failure.
    Optimistic,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refetch" => Ok(DeletePolicy::Refetch),
            "optimistic" => Ok(DeletePolicy::Optimistic),
            other => Err(format!("Unknown DELETE_POLICY {other:?}, expected refetch or optimistic")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Applied { deleted: usize },
    RolledBack { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Cached,
    Fetched,
    /// A newer fetch or an invalidation superseded this one; its result was dropped.
    Stale,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub page_size: u32,
    pub cache_ttl: Duration,
    pub search_delay: Duration,
    pub delete_policy: DeletePolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            cache_ttl: cache::DEFAULT_TTL,
            search_delay: debounce::DEFAULT_DELAY,
            delete_policy: DeletePolicy::default(),
        }
    }
}

impl StoreOptions {
    pub fn from_configuration(config: &Configuration) -> Self {
        Self {
            page_size: config.page_size,
            cache_ttl: config.cache_ttl,
            delete_policy: config.delete_policy,
            ..Self::default()
        }
    }
}

/// Read-only copy of one collection for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionView<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub has_next_page: bool,
    pub loading: bool,
    pub error: Option<String>,
}

struct Collection<T> {
    items: Vec<T>,
    page: u32,
    has_next_page: bool,
    loading: bool,
    error: Option<String>,
    cache: PageCache<T>,
    generation: u64,
}

impl<T: Clone> Collection<T> {
    fn new(ttl: Duration) -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            has_next_page: false,
            loading: false,
            error: None,
            cache: PageCache::new(ttl),
            generation: 0,
        }
    }

    fn view(&self) -> CollectionView<T> {
        CollectionView {
            items: self.items.clone(),
            page: self.page,
            has_next_page: self.has_next_page,
            loading: self.loading,
            error: self.error.clone(),
        }
    }

    fn show(&mut self, page: u32, result: Page<T>) {
        self.items = result.items;
        self.has_next_page = result.has_next_page;
        self.page = page;
        self.loading = false;
    }

    /// Any fetch still in flight is orphaned by this.
    fn supersede_in_flight(&mut self) {
        self.generation += 1;
        self.loading = false;
    }

    fn invalidate(&mut self) {
        self.cache.clear();
        self.supersede_in_flight();
    }
}

struct StoreState {
    active: CollectionKind,
    releases: Collection<Release>,
    tags: Collection<Tag>,
    keyword: String,
    debounced_keyword: String,
    selection: HashSet<ItemId>,
    mutation: MutationState,
}

#[async_trait]
trait Listing: Clone + Send + Sync + 'static {
    const KIND: CollectionKind;

    fn item_id(&self) -> ItemId;

    fn collection(state: &mut StoreState) -> &mut Collection<Self>;

    async fn request(
        api: &dyn ReleasesApi,
        page: u32,
        per_page: u32,
        keyword: &str,
    ) -> ApiResponse<Page<Self>>;

    async fn remove(api: &dyn ReleasesApi, ids: &[ItemId]) -> ApiResponse<DeleteSummary>;
}

#[async_trait]
impl Listing for Release {
    const KIND: CollectionKind = CollectionKind::Releases;

    fn item_id(&self) -> ItemId {
        ItemId::from(self)
    }

    fn collection(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.releases
    }

    async fn request(
        api: &dyn ReleasesApi,
        page: u32,
        per_page: u32,
        keyword: &str,
    ) -> ApiResponse<Page<Self>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            api.list_releases(page, per_page).await
        } else {
            api.search_releases(keyword, page, per_page).await
        }
    }

    async fn remove(api: &dyn ReleasesApi, ids: &[ItemId]) -> ApiResponse<DeleteSummary> {
        let ids: Vec<u64> = ids
            .iter()
            .filter_map(|id| match id {
                ItemId::Release(n) => Some(*n),
                ItemId::Tag(_) => None,
            })
            .collect();
        match ids.as_slice() {
            [single] => api.delete_release(*single).await,
            many => api.delete_releases(many).await,
        }
    }
}

#[async_trait]
impl Listing for Tag {
    const KIND: CollectionKind = CollectionKind::Tags;

    fn item_id(&self) -> ItemId {
        ItemId::from(self)
    }

    fn collection(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.tags
    }

    async fn request(
        api: &dyn ReleasesApi,
        page: u32,
        per_page: u32,
        keyword: &str,
    ) -> ApiResponse<Page<Self>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            api.list_tags(page, per_page).await
        } else {
            api.search_tags(keyword, page, per_page).await
        }
    }

    async fn remove(api: &dyn ReleasesApi, ids: &[ItemId]) -> ApiResponse<DeleteSummary> {
        let names: Vec<String> = ids
            .iter()
            .filter_map(|id| match id {
                ItemId::Tag(name) => Some(name.clone()),
                ItemId::Release(_) => None,
            })
            .collect();
        match names.as_slice() {
            [single] => api.delete_tag(single).await,
            many => api.delete_tags(many).await,
        }
    }
}

/// Paginated, searchable, multi-selectable view over the releases and tags of
/// one repository. Created once per session and shared behind an `Arc`.
pub struct ListStore {
    api: Arc<dyn ReleasesApi>,
    options: StoreOptions,
    state: Mutex<StoreState>,
    debouncer: Debouncer,
}

impl ListStore {
    pub fn new(api: Arc<dyn ReleasesApi>, options: StoreOptions) -> Self {
        let state = StoreState {
            active: CollectionKind::Releases,
            releases: Collection::new(options.cache_ttl),
            tags: Collection::new(options.cache_ttl),
            keyword: String::new(),
            debounced_keyword: String::new(),
            selection: HashSet::new(),
            mutation: MutationState::Idle,
        };

        Self {
            api,
            debouncer: Debouncer::new(options.search_delay),
            options,
            state: Mutex::new(state),
        }
    }

    pub fn active(&self) -> CollectionKind {
        self.state.lock().active
    }

    pub fn set_active(&self, kind: CollectionKind) {
        let mut state = self.state.lock();
        if state.active != kind {
            log::debug!("Switching to {kind}");
        }
        state.active = kind;
        state.selection.clear();
    }

    pub fn releases(&self) -> CollectionView<Release> {
        self.state.lock().releases.view()
    }

    pub fn tags(&self) -> CollectionView<Tag> {
        self.state.lock().tags.view()
    }

    pub fn selection(&self) -> HashSet<ItemId> {
        self.state.lock().selection.clone()
    }

    pub fn search_keyword(&self) -> String {
        self.state.lock().keyword.clone()
    }

    pub fn debounced_keyword(&self) -> String {
        self.state.lock().debounced_keyword.clone()
    }

    pub fn is_searching(&self) -> bool {
        !self.state.lock().debounced_keyword.trim().is_empty()
    }

    pub fn last_mutation(&self) -> MutationState {
        self.state.lock().mutation.clone()
    }

    /// Ids of the rows currently shown for the active collection.
    pub fn visible_ids(&self) -> Vec<ItemId> {
        let state = self.state.lock();
        match state.active {
            CollectionKind::Releases => state.releases.items.iter().map(ItemId::from).collect(),
            CollectionKind::Tags => state.tags.items.iter().map(ItemId::from).collect(),
        }
    }

    pub async fn fetch_page(&self, kind: CollectionKind, page: u32, keyword: &str) -> FetchOutcome {
        match kind {
            CollectionKind::Releases => self.fetch::<Release>(page, keyword).await,
            CollectionKind::Tags => self.fetch::<Tag>(page, keyword).await,
        }
    }

    async fn fetch<T: Listing>(&self, page: u32, keyword: &str) -> FetchOutcome {
        let page = page.max(1);
        let key = CacheKey::new(page, keyword);

        let generation = {
            let mut state = self.state.lock();
            let collection = T::collection(&mut state);
            collection.generation += 1;

            if let Some(cached) = collection.cache.get(&key) {
                log::debug!("Serving {} page {page} {keyword:?} from cache", T::KIND);
                collection.show(page, cached);
                collection.error = None;
                return FetchOutcome::Cached;
            }

            collection.loading = true;
            collection.error = None;
            collection.generation
        };

        log::debug!("Fetching {} page {page} {keyword:?}", T::KIND);
        let response = T::request(self.api.as_ref(), page, self.options.page_size, keyword).await;

        let mut state = self.state.lock();
        let collection = T::collection(&mut state);
        if collection.generation != generation {
            log::debug!("Discarding stale {} response for page {page}", T::KIND);
            return FetchOutcome::Stale;
        }

        match response.into_result() {
            Ok(result) => {
                collection.cache.insert(key, result.clone());
                collection.show(page, result);
                FetchOutcome::Fetched
            }
            Err(error) => {
                log::warn!("Failed to fetch {}: {error}", T::KIND);
                collection.loading = false;
                collection.error = Some(error.clone());
                FetchOutcome::Failed(error)
            }
        }
    }

    /// Updates the visible keyword now and fetches page 1 of the active
    /// collection once the keyword has been stable for the search delay.
    pub fn search(self: &Arc<Self>, keyword: impl Into<String>) {
        let keyword = keyword.into();
        self.state.lock().keyword = keyword.clone();

        let store = Arc::clone(self);
        self.debouncer.schedule(async move {
            store.apply_search(keyword).await;
        });
    }

    /// The debounced half of `search`, callable directly when no delay is wanted.
    pub async fn apply_search(&self, keyword: String) -> FetchOutcome {
        let kind = {
            let mut state = self.state.lock();
            state.debounced_keyword = keyword.clone();
            state.active
        };
        self.fetch_page(kind, 1, &keyword).await
    }

    pub fn toggle_select(&self, id: ItemId) {
        let mut state = self.state.lock();
        if !state.selection.remove(&id) {
            state.selection.insert(id);
        }
    }

    /// Selects every given id unless all are already selected, in which case
    /// the whole selection is cleared.
    pub fn toggle_select_all(&self, ids: &[ItemId]) {
        let mut state = self.state.lock();
        let all_selected = ids.iter().all(|id| state.selection.contains(id));
        if all_selected {
            state.selection.clear();
        } else {
            state.selection.extend(ids.iter().cloned());
        }
    }

    pub fn toggle_select_all_visible(&self) {
        let ids = self.visible_ids();
        self.toggle_select_all(&ids);
    }

    pub fn clear_selection(&self) {
        self.state.lock().selection.clear();
    }

    /// Drops every cached page of both collections.
    pub fn clear_cache(&self) {
        let mut state = self.state.lock();
        log::debug!(
            "Dropping {} cached release pages and {} cached tag pages",
            state.releases.cache.len(),
            state.tags.cache.len()
        );
        state.releases.invalidate();
        state.tags.invalidate();
    }

    pub async fn force_refresh(&self, kind: CollectionKind) -> FetchOutcome {
        match kind {
            CollectionKind::Releases => self.refresh::<Release>().await,
            CollectionKind::Tags => self.refresh::<Tag>().await,
        }
    }

    async fn refresh<T: Listing>(&self) -> FetchOutcome {
        let (page, keyword) = {
            let mut state = self.state.lock();
            let keyword = state.debounced_keyword.clone();
            let collection = T::collection(&mut state);
            collection.invalidate();
            (collection.page, keyword)
        };
        self.fetch::<T>(page, &keyword).await
    }

    pub async fn delete_single(&self, id: ItemId) -> MutationState {
        self.delete_many(vec![id]).await
    }

    /// Ids must belong to one collection; those of another kind than the
    /// first id are ignored.
    pub async fn delete_many(&self, ids: Vec<ItemId>) -> MutationState {
        let Some(kind) = ids.first().map(ItemId::kind) else {
            return MutationState::Idle;
        };
        match kind {
            CollectionKind::Releases => self.delete::<Release>(ids).await,
            CollectionKind::Tags => self.delete::<Tag>(ids).await,
        }
    }

    /// Deletes the selected items of the active collection.
    pub async fn delete_selected(&self) -> MutationState {
        let ids: Vec<ItemId> = {
            let state = self.state.lock();
            let active = state.active;
            state
                .selection
                .iter()
                .filter(|id| id.kind() == active)
                .cloned()
                .collect()
        };
        self.delete_many(ids).await
    }

    async fn delete<T: Listing>(&self, ids: Vec<ItemId>) -> MutationState {
        let mut unique = HashSet::new();
        let ids: Vec<ItemId> = ids
            .into_iter()
            .filter(|id| id.kind() == T::KIND && unique.insert(id.clone()))
            .collect();
        if ids.is_empty() {
            return MutationState::Idle;
        }

        let policy = self.options.delete_policy;
        let (rollback, selected_targets) = {
            let mut state = self.state.lock();
            state.mutation = MutationState::Pending;
            let previous_selection = state.selection.clone();
            let selected_targets: Vec<ItemId> =
                ids.iter().filter(|id| previous_selection.contains(*id)).cloned().collect();

            let collection = T::collection(&mut state);
            collection.supersede_in_flight();
            collection.error = None;
            let previous_items = match policy {
                DeletePolicy::Optimistic => {
                    let previous = collection.items.clone();
                    collection.items.retain(|item| !ids.contains(&item.item_id()));
                    Some(previous)
                }
                DeletePolicy::Refetch => {
                    collection.loading = true;
                    None
                }
            };

            if policy == DeletePolicy::Optimistic {
                state.selection.retain(|id| !ids.contains(id));
            }
            (previous_items.map(|items| (items, previous_selection)), selected_targets)
        };

        log::info!("Deleting {} {}: {:?}", ids.len(), T::KIND, ids);
        let response = T::remove(self.api.as_ref(), &ids).await;

        match response.into_result() {
            Ok(summary) => {
                let partial = summary.is_partial(ids.len());
                let (page, keyword) = {
                    let mut state = self.state.lock();
                    state.selection.retain(|id| !ids.contains(id));
                    state.mutation = MutationState::Applied { deleted: summary.deleted_count };
                    let keyword = state.debounced_keyword.clone();
                    let collection = T::collection(&mut state);
                    // Which rows survived is unknown until the page is fetched again.
                    if partial {
                        if let Some((items, _)) = rollback {
                            collection.items = items;
                        }
                    }
                    collection.invalidate();
                    (collection.page, keyword)
                };

                if policy == DeletePolicy::Refetch || partial {
                    self.fetch::<T>(page, &keyword).await;
                }

                if partial {
                    log::warn!("Partial delete of {}: {}", T::KIND, summary.message);
                    let mut state = self.state.lock();
                    let survivors: Vec<ItemId> = T::collection(&mut state)
                        .items
                        .iter()
                        .map(T::item_id)
                        .filter(|id| selected_targets.contains(id))
                        .collect();
                    state.selection.extend(survivors);

                    let collection = T::collection(&mut state);
                    collection.error = Some(match collection.error.take() {
                        Some(fetch_error) => format!("{fetch_error}; {}", summary.message),
                        None => summary.message.clone(),
                    });
                } else {
                    log::info!("{}", summary.message);
                }

                MutationState::Applied { deleted: summary.deleted_count }
            }
            Err(error) => {
                log::warn!("Failed to delete {}: {error}", T::KIND);
                let mut state = self.state.lock();
                if let Some((items, selection)) = rollback {
                    T::collection(&mut state).items = items;
                    state.selection = selection;
                }
                let collection = T::collection(&mut state);
                collection.loading = false;
                collection.error = Some(error.clone());

                let outcome = MutationState::RolledBack { error };
                state.mutation = outcome.clone();
                outcome
            }
        }
    }
}
