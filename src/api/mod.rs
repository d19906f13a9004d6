pub mod github;
pub mod proxy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::github::{DeleteSummary, GithubError, Release, Tag};

pub use proxy::ProxyApi;

/// Uniform result shape shared by every backend and by the proxy server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ApiResponse<U> {
        ApiResponse { success: self.success, data: self.data.map(f), error: self.error }
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err("response carried no data".to_string()),
            (false, _) => Err(self.error.unwrap_or_else(|| "Unknown error".to_string())),
        }
    }
}

impl<T> From<Result<T, GithubError>> for ApiResponse<T> {
    fn from(result: Result<T, GithubError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

impl From<DeleteSummary> for ApiResponse<DeleteSummary> {
    fn from(summary: DeleteSummary) -> Self {
        if summary.success {
            Self::ok(summary)
        } else {
            Self {
                success: false,
                error: Some(summary.message.clone()),
                data: Some(summary),
            }
        }
    }
}

/// One page of a collection. `has_next_page` is inferred from a full page,
/// never from a total-count header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn from_listing(items: Vec<T>, per_page: u32) -> Self {
        let has_next_page = items.len() == per_page as usize;
        Self { items, has_next_page }
    }

    /// Search pages never report a next page: only the fetched page is filtered.
    pub fn filtered<F: Fn(&T) -> bool>(self, keep: F) -> Self {
        Self {
            items: self.items.into_iter().filter(|item| keep(item)).collect(),
            has_next_page: false,
        }
    }
}

/// A backend the list store can talk to: GitHub itself or the local proxy.
#[async_trait]
pub trait ReleasesApi: Send + Sync {
    async fn list_releases(&self, page: u32, per_page: u32) -> ApiResponse<Page<Release>>;
    async fn list_tags(&self, page: u32, per_page: u32) -> ApiResponse<Page<Tag>>;
    async fn delete_release(&self, id: u64) -> ApiResponse<DeleteSummary>;
    async fn delete_tag(&self, name: &str) -> ApiResponse<DeleteSummary>;
    async fn delete_releases(&self, ids: &[u64]) -> ApiResponse<DeleteSummary>;
    async fn delete_tags(&self, names: &[String]) -> ApiResponse<DeleteSummary>;

    async fn search_releases(
        &self,
        keyword: &str,
        page: u32,
        per_page: u32,
    ) -> ApiResponse<Page<Release>> {
        self.list_releases(page, per_page)
            .await
            .map(|p| p.filtered(|r| r.matches_keyword(keyword)))
    }

    async fn search_tags(&self, keyword: &str, page: u32, per_page: u32) -> ApiResponse<Page<Tag>> {
        self.list_tags(page, per_page)
            .await
            .map(|p| p.filtered(|t| t.matches_keyword(keyword)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_page_signals_next_page() {
        assert!(Page::from_listing(vec![1, 2, 3], 3).has_next_page);
        assert!(!Page::from_listing(vec![1, 2], 3).has_next_page);
    }

    #[test]
    fn filtered_page_never_has_next() {
        let page = Page::from_listing(vec![1, 2, 3, 4], 4).filtered(|n| n % 2 == 0);
        assert_eq!(page.items, vec![2, 4]);
        assert!(!page.has_next_page);
    }

    #[test]
    fn into_result_reports_error_message() {
        let failed: ApiResponse<u32> = ApiResponse::failure("rate limited");
        assert_eq!(failed.into_result(), Err("rate limited".to_string()));
        assert_eq!(ApiResponse::ok(5).into_result(), Ok(5));
    }

    #[test]
    fn failed_delete_summary_is_a_failed_response() {
        let resp: ApiResponse<DeleteSummary> = DeleteSummary::tally("tags", 0, 2).into();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Successfully deleted 0/2 tags"));
    }

    #[test]
    fn response_serializes_without_empty_fields() {
        let json = serde_json::to_value(ApiResponse::ok(vec!["a"])).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": ["a"] }));

        let parsed: ApiResponse<Vec<String>> =
            serde_json::from_str(r#"{"success":false,"error":"nope"}"#).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("nope"));
        assert!(parsed.data.is_none());

        let summary: ApiResponse<DeleteSummary> =
            serde_json::from_str(r#"{"success":false,"error":"forbidden"}"#).unwrap();
        assert_eq!(summary.into_result(), Err("forbidden".to_string()));
    }
}
