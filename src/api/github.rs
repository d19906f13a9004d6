use async_trait::async_trait;

use crate::api::{ApiResponse, Page, ReleasesApi};
use crate::github::{DeleteSummary, GithubClient, Release, Tag};

/// Talks to GitHub directly with the configured token.
#[async_trait]
impl ReleasesApi for GithubClient {
    async fn list_releases(&self, page: u32, per_page: u32) -> ApiResponse<Page<Release>> {
        GithubClient::list_releases(self, page, per_page)
            .await
            .map(|items| Page::from_listing(items, per_page))
            .into()
    }

    async fn list_tags(&self, page: u32, per_page: u32) -> ApiResponse<Page<Tag>> {
        GithubClient::list_tags(self, page, per_page)
            .await
            .map(|items| Page::from_listing(items, per_page))
            .into()
    }

    async fn delete_release(&self, id: u64) -> ApiResponse<DeleteSummary> {
        GithubClient::delete_release(self, id)
            .await
            .map(|()| DeleteSummary::tally("releases", 1, 1))
            .into()
    }

    async fn delete_tag(&self, name: &str) -> ApiResponse<DeleteSummary> {
        GithubClient::delete_tag(self, name)
            .await
            .map(|()| DeleteSummary::tally("tags", 1, 1))
            .into()
    }

    async fn delete_releases(&self, ids: &[u64]) -> ApiResponse<DeleteSummary> {
        GithubClient::delete_releases(self, ids).await.into()
    }

    async fn delete_tags(&self, names: &[String]) -> ApiResponse<DeleteSummary> {
        GithubClient::delete_tags(self, names).await.into()
    }
}
