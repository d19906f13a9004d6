use serde::Serialize;
use warp::path::Tail;
use warp::{Rejection, Reply};

use super::{Backend, ListQuery, ProxyError};
use crate::api::ApiResponse;
use crate::api::proxy::{BatchDeleteRequest, BatchTarget};
use crate::github::{DeleteSummary, GithubError};

fn respond<T: Serialize>(
    result: Result<T, GithubError>,
    context: &str,
) -> Result<warp::reply::Json, Rejection> {
    match result {
        Ok(data) => Ok(warp::reply::json(&ApiResponse::ok(data))),
        Err(e) => {
            log::error!("{context}: {e}");
            Err(warp::reject::custom(ProxyError::internal(format!("{context}: {e}"))))
        }
    }
}

pub async fn repository(github: Backend) -> Result<impl Reply, Rejection> {
    respond(github.repository().await, "Failed to fetch repository info")
}

pub async fn list_releases(query: ListQuery, github: Backend) -> Result<impl Reply, Rejection> {
    let result = match query.page_request() {
        Some((page, per_page)) => github.list_releases(page, per_page).await,
        None => github.list_all_releases().await,
    };
    respond(result, "Failed to fetch releases")
}

pub async fn list_tags(query: ListQuery, github: Backend) -> Result<impl Reply, Rejection> {
    let result = match query.page_request() {
        Some((page, per_page)) => github.list_tags(page, per_page).await,
        None => github.list_all_tags().await,
    };
    respond(result, "Failed to fetch tags")
}

pub async fn commit(sha: String, github: Backend) -> Result<impl Reply, Rejection> {
    let is_hex = !sha.is_empty() && sha.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'));
    if !is_hex {
        return Err(warp::reject::not_found());
    }
    let result = github.commit(&sha).await;
    respond(result, &format!("Failed to fetch commit {sha}"))
}

pub async fn delete_release(id: u64, github: Backend) -> Result<impl Reply, Rejection> {
    let result = github
        .delete_release(id)
        .await
        .map(|()| DeleteSummary::tally("releases", 1, 1));
    respond(result, &format!("Failed to delete release {id}"))
}

pub async fn delete_tag(tail: Tail, github: Backend) -> Result<impl Reply, Rejection> {
    if tail.as_str().is_empty() {
        return Err(warp::reject::not_found());
    }
    let name = urlencoding::decode(tail.as_str())
        .map_err(|e| warp::reject::custom(ProxyError::bad_request(format!("Invalid tag name: {e}"))))?
        .into_owned();

    let result = github
        .delete_tag(&name)
        .await
        .map(|()| DeleteSummary::tally("tags", 1, 1));
    respond(result, &format!("Failed to delete tag {name}"))
}

pub async fn batch_delete(
    request: BatchDeleteRequest,
    github: Backend,
) -> Result<impl Reply, Rejection> {
    log::info!(
        "Batch delete of {:?} with {} items",
        request.target,
        request.items.len()
    );

    let summary = match request.target {
        BatchTarget::Releases => {
            let ids = parse_release_ids(&request.items)?;
            github.delete_releases(&ids).await
        }
        BatchTarget::Tags => github.delete_tags(&request.items).await,
        BatchTarget::Both => delete_everything(&github).await.map_err(|e| {
            log::error!("Failed to batch delete: {e}");
            warp::reject::custom(ProxyError::internal(format!("Failed to batch delete: {e}")))
        })?,
    };

    // The summary, not the envelope, says whether anything was deleted.
    Ok(warp::reply::json(&ApiResponse::ok(summary)))
}

fn parse_release_ids(items: &[String]) -> Result<Vec<u64>, Rejection> {
    items
        .iter()
        .map(|item| {
            item.trim().parse::<u64>().map_err(|_| {
                warp::reject::custom(ProxyError::bad_request(format!("Invalid release id {item:?}")))
            })
        })
        .collect()
}

async fn delete_everything(github: &Backend) -> Result<DeleteSummary, GithubError> {
    let (releases, tags) = tokio::try_join!(github.list_all_releases(), github.list_all_tags())?;
    let ids: Vec<u64> = releases.iter().map(|r| r.id).collect();
    let names: Vec<String> = tags.into_iter().map(|t| t.name).collect();

    let (releases, tags) = tokio::join!(github.delete_releases(&ids), github.delete_tags(&names));
    Ok(DeleteSummary {
        success: releases.success || tags.success,
        message: format!("Releases: {}, Tags: {}", releases.message, tags.message),
        deleted_count: releases.deleted_count + tags.deleted_count,
    })
}
