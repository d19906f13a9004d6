use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::{ApiResponse, Page, ReleasesApi};
use crate::github::{DeleteSummary, Release, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchTarget {
    Releases,
    Tags,
    Both,
}

/// Body of `DELETE /api/releases/batch`. Release ids travel as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    #[serde(rename = "type")]
    pub target: BatchTarget,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Talks to a running `release-console serve` instance.
#[derive(Clone)]
pub struct ProxyApi {
    http: reqwest::Client,
    base_url: String,
}

impl ProxyApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResponse<T> {
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                log::warn!("Proxy request failed: {e}");
                return ApiResponse::failure(e.to_string());
            }
        };

        let status = resp.status();
        match resp.json::<ApiResponse<T>>().await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Proxy returned an unreadable body (status {status}): {e}");
                ApiResponse::failure(format!("Unexpected proxy response ({status})"))
            }
        }
    }

    async fn batch(&self, request: BatchDeleteRequest) -> ApiResponse<DeleteSummary> {
        let req = self.http.delete(self.url("/releases/batch")).json(&request);
        let resp: ApiResponse<DeleteSummary> = self.call(req).await;
        // The proxy reports the request itself as successful; the summary decides.
        match resp.into_result() {
            Ok(summary) => summary.into(),
            Err(e) => ApiResponse::failure(e),
        }
    }
}

#[async_trait]
impl ReleasesApi for ProxyApi {
    async fn list_releases(&self, page: u32, per_page: u32) -> ApiResponse<Page<Release>> {
        let req = self
            .http
            .get(self.url("/releases"))
            .query(&[("page", page), ("per_page", per_page)]);
        let resp: ApiResponse<Vec<Release>> = self.call(req).await;
        resp.map(|items| Page::from_listing(items, per_page))
    }

    async fn list_tags(&self, page: u32, per_page: u32) -> ApiResponse<Page<Tag>> {
        let req = self
            .http
            .get(self.url("/tags"))
            .query(&[("page", page), ("per_page", per_page)]);
        let resp: ApiResponse<Vec<Tag>> = self.call(req).await;
        resp.map(|items| Page::from_listing(items, per_page))
    }

    async fn delete_release(&self, id: u64) -> ApiResponse<DeleteSummary> {
        self.call(self.http.delete(self.url(&format!("/releases/{id}"))))
            .await
    }

    async fn delete_tag(&self, name: &str) -> ApiResponse<DeleteSummary> {
        let path = format!("/tags/{}", urlencoding::encode(name));
        self.call(self.http.delete(self.url(&path))).await
    }

    async fn delete_releases(&self, ids: &[u64]) -> ApiResponse<DeleteSummary> {
        self.batch(BatchDeleteRequest {
            target: BatchTarget::Releases,
            items: ids.iter().map(u64::to_string).collect(),
        })
        .await
    }

    async fn delete_tags(&self, names: &[String]) -> ApiResponse<DeleteSummary> {
        self.batch(BatchDeleteRequest { target: BatchTarget::Tags, items: names.to_vec() })
            .await
    }
}
