use futures_util::future::join_all;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::configuration::Configuration;
use crate::github::{
    Asset, Author, Commit, CommitAuthor, CommitDetail, DeleteSummary, GithubError, Release,
    RepositoryInfo, Tag,
};

/// Page size used when walking a whole collection.
pub const FULL_LISTING_PAGE_SIZE: u32 = 100;

/// How many recent releases are scanned when a tag lookup misses.
pub const COMMIT_FALLBACK_WINDOW: u32 = 50;

#[derive(Deserialize)]
struct RepositoryResponse {
    owner: Author,
    name: String,
    full_name: String,
    description: Option<String>,
    html_url: String,
    default_branch: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetailResponse,
    author: Option<Author>,
    html_url: String,
}

#[derive(Deserialize)]
struct CommitDetailResponse {
    message: String,
    author: Option<CommitAuthorResponse>,
}

#[derive(Deserialize)]
struct CommitAuthorResponse {
    name: Option<String>,
    email: Option<String>,
    date: Option<String>,
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(
        base_url: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token,
        }
    }

    pub fn from_configuration(config: &Configuration) -> Self {
        Self::new(
            config.api_url.clone(),
            config.owner.clone(),
            config.repo.clone(),
            Some(config.github_token.clone()),
        )
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.base_url, self.owner, self.repo, path)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .header("User-Agent", "release-console/0.1")
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(t) = self.token.as_deref() {
            req = req.bearer_auth(t);
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, GithubError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        log::warn!(
            "GitHub request failed for {}: status={} body={}",
            self.full_name(),
            status,
            body
        );
        Err(GithubError::Api { status: status.as_u16(), body })
    }

    async fn get_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GithubError> {
        let resp = self.send(req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| GithubError::Decode(e.to_string()))
    }

    pub async fn repository(&self) -> Result<RepositoryInfo, GithubError> {
        log::debug!("Fetching repository info for {}", self.full_name());
        let raw: RepositoryResponse = self
            .get_json(self.request(Method::GET, self.repo_url("")))
            .await?;

        Ok(RepositoryInfo {
            owner: raw.owner.login,
            name: raw.name,
            full_name: raw.full_name,
            description: raw.description.unwrap_or_default(),
            html_url: raw.html_url,
            default_branch: raw.default_branch,
        })
    }

    pub async fn list_releases(&self, page: u32, per_page: u32) -> Result<Vec<Release>, GithubError> {
        log::debug!("Listing releases for {} page={page} per_page={per_page}", self.full_name());
        let req = self
            .request(Method::GET, self.repo_url("/releases"))
            .query(&[("page", page), ("per_page", per_page)]);
        self.get_json(req).await
    }

    pub async fn list_tags(&self, page: u32, per_page: u32) -> Result<Vec<Tag>, GithubError> {
        log::debug!("Listing tags for {} page={page} per_page={per_page}", self.full_name());
        let req = self
            .request(Method::GET, self.repo_url("/tags"))
            .query(&[("page", page), ("per_page", per_page)]);
        self.get_json(req).await
    }

    /// Walks every page until GitHub returns a short one.
    pub async fn list_all_releases(&self) -> Result<Vec<Release>, GithubError> {
        let mut releases = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_releases(page, FULL_LISTING_PAGE_SIZE).await?;
            let done = (batch.len() as u32) < FULL_LISTING_PAGE_SIZE;
            releases.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        Ok(releases)
    }

    pub async fn list_all_tags(&self) -> Result<Vec<Tag>, GithubError> {
        let mut tags = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_tags(page, FULL_LISTING_PAGE_SIZE).await?;
            let done = (batch.len() as u32) < FULL_LISTING_PAGE_SIZE;
            tags.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        Ok(tags)
    }

    /// `Ok(None)` when GitHub has no release for the tag.
    pub async fn release_by_tag(&self, tag: &str) -> Result<Option<Release>, GithubError> {
        let url = self.repo_url(&format!("/releases/tags/{}", encode_ref(tag)));
        log::debug!("Fetching release by tag {tag}");
        match self.get_json(self.request(Method::GET, url)).await {
            Ok(release) => Ok(Some(release)),
            Err(GithubError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn commit(&self, sha: &str) -> Result<Commit, GithubError> {
        let url = self.repo_url(&format!("/commits/{}", urlencoding::encode(sha)));
        let raw: CommitResponse = self.get_json(self.request(Method::GET, url)).await?;
        let author = raw.commit.author;

        Ok(Commit {
            sha: raw.sha,
            commit: CommitDetail {
                message: raw.commit.message,
                author: CommitAuthor {
                    name: author
                        .as_ref()
                        .and_then(|a| a.name.clone())
                        .unwrap_or_else(|| "unknown".to_string()),
                    email: author.as_ref().and_then(|a| a.email.clone()).unwrap_or_default(),
                    date: author.and_then(|a| a.date).unwrap_or_default(),
                },
            },
            author: raw.author,
            html_url: raw.html_url,
        })
    }

    pub async fn delete_release(&self, id: u64) -> Result<(), GithubError> {
        log::info!("Deleting release {id} from {}", self.full_name());
        let url = self.repo_url(&format!("/releases/{id}"));
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    /// Tags are removed through the git ref, which leaves any release in place.
    pub async fn delete_tag(&self, name: &str) -> Result<(), GithubError> {
        log::info!("Deleting tag {name} from {}", self.full_name());
        let url = self.repo_url(&format!("/git/refs/tags/{}", encode_ref(name)));
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    pub async fn delete_releases(&self, ids: &[u64]) -> DeleteSummary {
        let results = join_all(ids.iter().map(|id| self.delete_release(*id))).await;
        let deleted = count_successes(results, |i| ids[i].to_string());
        DeleteSummary::tally("releases", deleted, ids.len())
    }

    pub async fn delete_tags(&self, names: &[String]) -> DeleteSummary {
        let results = join_all(names.iter().map(|name| self.delete_tag(name))).await;
        let deleted = count_successes(results, |i| names[i].clone());
        DeleteSummary::tally("tags", deleted, names.len())
    }

    /// Assets of the release published for `tag`. When no release carries the
    /// tag, the most recent releases are searched for one built from the
    /// given commit. No match yields an empty list.
    pub async fn find_release_assets(
        &self,
        tag: &str,
        hash: &str,
        short_hash: &str,
    ) -> Result<Vec<Asset>, GithubError> {
        if let Some(release) = self.release_by_tag(tag).await? {
            log::debug!(
                "Found release {} by tag, target commit {}",
                release.id,
                release.target_commitish
            );
            return Ok(release.assets);
        }

        log::debug!("No release for tag {tag}, searching recent releases for commit {hash}");
        let recent = self.list_releases(1, COMMIT_FALLBACK_WINDOW).await?;
        match recent.into_iter().find(|r| r.targets_commit(hash, short_hash)) {
            Some(release) => {
                log::debug!("Matched release {} by commit", release.tag_name);
                Ok(release.assets)
            }
            None => {
                log::debug!("No release matches commit {hash}");
                Ok(Vec::new())
            }
        }
    }
}

fn count_successes<F>(results: Vec<Result<(), GithubError>>, label: F) -> usize
where
    F: Fn(usize) -> String,
{
    results
        .into_iter()
        .enumerate()
        .filter(|(i, result)| match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to delete {}: {}", label(*i), e);
                false
            }
        })
        .count()
}

/// Percent-encodes each segment of a ref name, keeping `/` separators.
fn encode_ref(name: &str) -> String {
    name.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
