mod handlers;

use std::convert::Infallible;
use std::error::Error;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Filter, Rejection, Reply};

use crate::api::ApiResponse;
use crate::api::proxy::BatchDeleteRequest;
use crate::github::GithubClient;
use crate::github::client::FULL_LISTING_PAGE_SIZE;

pub type Backend = Arc<GithubClient>;

/// Optional paging for the list routes. Without it the whole collection is returned.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListQuery {
    fn page_request(&self) -> Option<(u32, u32)> {
        if self.page.is_none() && self.per_page.is_none() {
            return None;
        }
        Some((
            self.page.unwrap_or(1).max(1),
            self.per_page.unwrap_or(FULL_LISTING_PAGE_SIZE).clamp(1, FULL_LISTING_PAGE_SIZE),
        ))
    }
}

#[derive(Debug)]
pub struct ProxyError {
    status: StatusCode,
    message: String,
}

impl ProxyError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl Reject for ProxyError {}

pub fn routes(
    github: Backend,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone + Send + Sync + 'static {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allow_headers(vec!["Content-Type"]);

    api(github)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::log("release_console::server"))
}

fn api(github: Backend) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let repository = warp::path!("api" / "repository")
        .and(warp::get())
        .and(with_github(github.clone()))
        .and_then(handlers::repository);

    let releases = warp::path!("api" / "releases")
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_github(github.clone()))
        .and_then(handlers::list_releases);

    let batch = warp::path!("api" / "releases" / "batch")
        .and(warp::delete())
        .and(json_body::<BatchDeleteRequest>())
        .and(with_github(github.clone()))
        .and_then(handlers::batch_delete);

    let delete_release = warp::path!("api" / "releases" / u64)
        .and(warp::delete())
        .and(with_github(github.clone()))
        .and_then(handlers::delete_release);

    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_github(github.clone()))
        .and_then(handlers::list_tags);

    // Tag names may contain encoded slashes, so the whole tail is the name.
    let delete_tag = warp::path!("api" / "tags" / ..)
        .and(warp::path::tail())
        .and(warp::delete())
        .and(with_github(github.clone()))
        .and_then(handlers::delete_tag);

    let commit = warp::path!("api" / "commits" / String)
        .and(warp::get())
        .and(with_github(github))
        .and_then(handlers::commit);

    repository
        .or(releases)
        .or(batch)
        .or(delete_release)
        .or(tags)
        .or(delete_tag)
        .or(commit)
}

fn with_github(github: Backend) -> impl Filter<Extract = (Backend,), Error = Infallible> + Clone {
    warp::any().map(move || github.clone())
}

fn json_body<T: Send + DeserializeOwned>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(1024 * 64).and(warp::body::json())
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<ProxyError>() {
        (e.status, e.message.clone())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        let cause = e.source().map(|c| c.to_string()).unwrap_or_else(|| e.to_string());
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {cause}"))
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    let body: ApiResponse<()> = ApiResponse::failure(message);
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

pub async fn serve(github: GithubClient, port: u16) {
    log::info!("Proxy listening on http://localhost:{port}");
    log::info!("Managing repository {}", github.full_name());
    warp::serve(routes(Arc::new(github)))
        .run(([0, 0, 0, 0], port))
        .await;
}
